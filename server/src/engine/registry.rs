use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;
use uuid::Uuid;

use super::events::{ConnectionId, RelayEvent};

/// Default number of queued outbound events per connection. A slow client
/// that falls this far behind starts losing events instead of growing memory.
pub const MAX_OUTBOUND_QUEUE: usize = 1024;

/// One live transport session. The registry never inspects the transport;
/// it only holds the sending half of the connection's outbound queue.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    /// Username claimed at the last join. Unauthenticated, not unique.
    pub username: Option<String>,
    /// Channel named by the last join, cleared when the connection is kicked from it.
    pub channel: Option<String>,
    /// Channels whose broadcasts reach this connection.
    scopes: HashSet<String>,
    outbound: mpsc::Sender<RelayEvent>,
    /// Registration order, used to break ties between connections sharing a username.
    seq: u64,
}

impl Connection {
    /// Queue an event for this connection. Returns false if the queue is full
    /// or the transport has gone away; the event is dropped in both cases.
    pub fn send(&self, event: RelayEvent) -> bool {
        self.outbound.try_send(event).is_ok()
    }

    /// Whether broadcasts to `channel` reach this connection.
    pub fn in_scope(&self, channel: &str) -> bool {
        self.scopes.contains(channel)
    }
}

/// Identity a connection held at the moment it was unregistered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Departed {
    pub username: Option<String>,
    pub channel: Option<String>,
}

/// Passive store of live connections. Performs no broadcasting itself.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
    next_seq: u64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty record for a freshly established connection.
    pub fn register(&mut self, outbound: mpsc::Sender<RelayEvent>) -> ConnectionId {
        let id = Uuid::new_v4();
        let seq = self.next_seq;
        self.next_seq += 1;

        self.connections.insert(
            id,
            Connection {
                id,
                username: None,
                channel: None,
                scopes: HashSet::new(),
                outbound,
                seq,
            },
        );
        id
    }

    /// Record the identity chosen at join time and subscribe the connection to
    /// the channel's broadcasts. Earlier channel subscriptions are kept.
    /// Returns false if the connection is not registered.
    pub fn set_identity(&mut self, id: ConnectionId, username: &str, channel: &str) -> bool {
        let Some(conn) = self.connections.get_mut(&id) else {
            return false;
        };
        conn.username = Some(username.to_string());
        conn.channel = Some(channel.to_string());
        conn.scopes.insert(channel.to_string());
        true
    }

    /// Find the live connection holding `username`. When several connections
    /// share the name, the one registered first wins.
    pub fn resolve_by_username(&self, username: &str) -> Option<ConnectionId> {
        self.connections
            .values()
            .filter(|c| c.username.as_deref() == Some(username))
            .min_by_key(|c| c.seq)
            .map(|c| c.id)
    }

    /// Stop delivering `channel` broadcasts to a connection. If it was the
    /// connection's current channel, the connection goes back to unjoined.
    pub fn leave_scope(&mut self, id: ConnectionId, channel: &str) {
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.scopes.remove(channel);
            if conn.channel.as_deref() == Some(channel) {
                conn.channel = None;
            }
        }
    }

    /// Remove a connection, returning its last-known identity so the caller
    /// can run leave cleanup. Returns None if it was never registered.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<Departed> {
        self.connections.remove(&id).map(|conn| Departed {
            username: conn.username,
            channel: conn.channel,
        })
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Whether any live connection currently holds `username`.
    pub fn is_username_live(&self, username: &str) -> bool {
        self.connections
            .values()
            .any(|c| c.username.as_deref() == Some(username))
    }

    /// Live connections subscribed to `channel`.
    pub fn channel_scope<'a>(&'a self, channel: &'a str) -> impl Iterator<Item = &'a Connection> {
        self.connections.values().filter(move |c| c.in_scope(channel))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
