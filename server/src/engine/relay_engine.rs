use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::directory::ChannelDirectory;
use super::events::{ChatMessage, ClientCommand, ConnectionId, RelayEvent};
use super::online::OnlineUsers;
use super::registry::{Connection, ConnectionRegistry, MAX_OUTBOUND_QUEUE};

/// Which connections a broadcast reaches.
#[derive(Debug, Clone, Copy)]
enum Scope<'a> {
    /// Every connection subscribed to the channel.
    Channel(&'a str),
    /// Every live connection, joined or not.
    All,
}

fn deliver(conn: &Connection, event: &RelayEvent) {
    if !conn.send(event.clone()) {
        warn!(connection_id = %conn.id, "dropped event for connection (queue full or closed)");
    }
}

/// All mutable relay state. Lives for the lifetime of the server process.
#[derive(Debug, Default)]
struct RelayState {
    registry: ConnectionRegistry,
    directory: ChannelDirectory,
    online: OnlineUsers,
}

impl RelayState {
    /// Fire-and-forget fan-out. A recipient whose queue is full or closed
    /// misses the event; nothing is reported back to the caller.
    fn broadcast(&self, scope: Scope<'_>, event: &RelayEvent) {
        match scope {
            Scope::Channel(channel) => self
                .registry
                .channel_scope(channel)
                .for_each(|conn| deliver(conn, event)),
            Scope::All => self.registry.iter().for_each(|conn| deliver(conn, event)),
        }
    }

    fn broadcast_participants(&self, channel: &str) {
        let participants = self.directory.list_participants(channel);
        self.broadcast(Scope::Channel(channel), &RelayEvent::Participants(participants));
    }

    fn broadcast_online(&self) {
        self.broadcast(Scope::All, &RelayEvent::AllUsers(self.online.snapshot()));
    }

    fn broadcast_system(&self, channel: &str, text: String) {
        self.broadcast(
            Scope::Channel(channel),
            &RelayEvent::Message(ChatMessage::system(text)),
        );
    }

    /// Drop `username` from the online set unless another live connection still holds it.
    fn release_username(&mut self, username: &str) {
        if !self.registry.is_username_live(username) {
            self.online.remove(username);
        }
    }
}

/// Command processor over the connection registry, channel directory and
/// online set. Transport-agnostic: adapters call [`RelayEngine::connect`],
/// feed decoded commands to [`RelayEngine::handle`] and call
/// [`RelayEngine::disconnect`] when the transport goes away.
///
/// Every operation holds the state lock from its first mutation to its last
/// enqueue, so the effects of two commands never interleave.
pub struct RelayEngine {
    state: Mutex<RelayState>,
    outbound_queue: usize,
}

impl Default for RelayEngine {
    fn default() -> Self {
        Self::new(MAX_OUTBOUND_QUEUE)
    }
}

impl RelayEngine {
    /// `outbound_queue` bounds the per-connection event queue (minimum 1).
    pub fn new(outbound_queue: usize) -> Self {
        Self {
            state: Mutex::new(RelayState::default()),
            outbound_queue: outbound_queue.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RelayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Connection lifecycle ────────────────────────────────────────

    /// Register a new connection. Returns its id and the receiver the
    /// transport drains to deliver outbound events.
    pub fn connect(&self) -> (ConnectionId, mpsc::Receiver<RelayEvent>) {
        let (tx, rx) = mpsc::channel(self.outbound_queue);
        let connection_id = self.lock().registry.register(tx);
        info!(%connection_id, "connection registered");
        (connection_id, rx)
    }

    /// Tear down a connection: announce its departure if it had joined, then
    /// forget it. Unknown ids are ignored.
    pub fn disconnect(&self, connection_id: ConnectionId) {
        let mut state = self.lock();

        let Some(departed) = state.registry.unregister(connection_id) else {
            return;
        };

        if let Some(username) = departed.username {
            state.release_username(&username);
            state.broadcast_online();

            if let Some(channel) = departed.channel {
                state.directory.remove_participant(&channel, &username);
                state.broadcast_participants(&channel);
                state.broadcast_system(&channel, format!("{username} left"));
            }

            info!(%connection_id, %username, "connection closed");
        } else {
            info!(%connection_id, "connection closed before joining");
        }
    }

    // ── Commands ────────────────────────────────────────────────────

    /// Dispatch a decoded client command.
    pub fn handle(&self, connection_id: ConnectionId, command: ClientCommand) {
        match command {
            ClientCommand::Join { channel, username } => {
                self.join(connection_id, &channel, &username)
            }
            ClientCommand::Message {
                channel,
                text,
                username,
            } => self.message(connection_id, &channel, &text, &username),
            ClientCommand::Kick { channel, target } => self.kick(connection_id, &channel, &target),
        }
    }

    /// Join `channel` as `username`, creating the channel (owned by
    /// `username`) if it does not exist yet. Rejoining is harmless: the
    /// roster is unchanged but the snapshots and join notice are resent.
    pub fn join(&self, connection_id: ConnectionId, channel: &str, username: &str) {
        let mut state = self.lock();

        let previous = state
            .registry
            .get(connection_id)
            .and_then(|c| c.username.clone());

        if !state.registry.set_identity(connection_id, username, channel) {
            debug!(%connection_id, %channel, "join from unknown connection ignored");
            return;
        }

        if let Some(previous) = previous.filter(|p| p != username) {
            state.release_username(&previous);
        }

        let ensured = state.directory.ensure_channel(channel, username);
        if ensured.created {
            info!(%channel, owner = %ensured.owner, "channel created");
            state.broadcast(Scope::Channel(channel), &RelayEvent::Owner(ensured.owner));
        }

        state.directory.add_participant(channel, username);
        state.online.insert(username);

        state.broadcast_participants(channel);
        state.broadcast_online();
        state.broadcast_system(channel, format!("{username} joined"));

        info!(%connection_id, %username, %channel, "joined channel");
    }

    /// Relay a user message to everyone subscribed to `channel`. The sender
    /// does not have to be a member and `username` is taken as given.
    pub fn message(&self, connection_id: ConnectionId, channel: &str, text: &str, username: &str) {
        let state = self.lock();
        debug!(%connection_id, %channel, %username, len = text.len(), "relaying message");
        state.broadcast(
            Scope::Channel(channel),
            &RelayEvent::Message(ChatMessage::user(username, text)),
        );
    }

    /// Remove `target` from `channel`. Only the channel owner may kick;
    /// anyone else is silently ignored.
    pub fn kick(&self, connection_id: ConnectionId, channel: &str, target: &str) {
        let mut state = self.lock();

        let issuer = state
            .registry
            .get(connection_id)
            .and_then(|c| c.username.clone());
        let Some(owner) = issuer.filter(|name| state.directory.is_owner(channel, name)) else {
            warn!(%connection_id, %channel, %target, "kick by non-owner ignored");
            return;
        };

        state.directory.remove_participant(channel, target);
        state.broadcast_participants(channel);

        if let Some(target_id) = state.registry.resolve_by_username(target) {
            state.registry.leave_scope(target_id, channel);
            if let Some(conn) = state.registry.get(target_id)
                && !conn.send(RelayEvent::Kicked(channel.to_string()))
            {
                warn!(connection_id = %target_id, "failed to deliver kick notice");
            }
        }

        state.broadcast_system(channel, format!("{target} was kicked by {owner}"));
        info!(%channel, %target, %owner, "participant kicked");
    }

    // ── Snapshots ───────────────────────────────────────────────────

    pub fn participants(&self, channel: &str) -> Vec<String> {
        self.lock().directory.list_participants(channel)
    }

    pub fn owner(&self, channel: &str) -> Option<String> {
        self.lock().directory.owner(channel).map(str::to_string)
    }

    pub fn online_users(&self) -> Vec<String> {
        self.lock().online.snapshot()
    }

    #[cfg(test)]
    pub fn channel_count(&self) -> usize {
        self.lock().directory.len()
    }

    pub fn connection_count(&self) -> usize {
        self.lock().registry.len()
    }

    /// Current channel of a connection, if it is live and joined.
    pub fn current_channel(&self, connection_id: ConnectionId) -> Option<String> {
        self.lock()
            .registry
            .get(connection_id)
            .and_then(|c| c.channel.clone())
    }
}
