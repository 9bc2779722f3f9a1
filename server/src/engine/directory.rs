use std::collections::HashMap;

use super::channel::ChannelState;

/// Result of [`ChannelDirectory::ensure_channel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ensured {
    /// True only for the call that created the channel.
    pub created: bool,
    pub owner: String,
}

/// Channel name -> channel state. Channels are created lazily on first join
/// and stay in the directory for the life of the process, even when empty.
#[derive(Debug, Default)]
pub struct ChannelDirectory {
    channels: HashMap<String, ChannelState>,
}

impl ChannelDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the channel with `creator` as owner if it does not exist yet.
    /// An existing channel keeps its owner.
    pub fn ensure_channel(&mut self, name: &str, creator: &str) -> Ensured {
        if let Some(channel) = self.channels.get(name) {
            return Ensured {
                created: false,
                owner: channel.owner.clone(),
            };
        }

        self.channels.insert(
            name.to_string(),
            ChannelState::new(creator.to_string()),
        );
        Ensured {
            created: true,
            owner: creator.to_string(),
        }
    }

    /// Idempotent. Returns true if the username was newly added; false if it
    /// was already present or the channel does not exist.
    pub fn add_participant(&mut self, name: &str, username: &str) -> bool {
        self.channels
            .get_mut(name)
            .is_some_and(|channel| channel.add(username))
    }

    /// Idempotent. Returns true if the username was present and removed.
    pub fn remove_participant(&mut self, name: &str, username: &str) -> bool {
        self.channels
            .get_mut(name)
            .is_some_and(|channel| channel.remove(username))
    }

    /// Snapshot of the channel's participants in join order. Unknown channels are empty.
    pub fn list_participants(&self, name: &str) -> Vec<String> {
        self.channels
            .get(name)
            .map(|channel| channel.participants().to_vec())
            .unwrap_or_default()
    }

    pub fn is_owner(&self, name: &str, username: &str) -> bool {
        self.channels
            .get(name)
            .is_some_and(|channel| channel.owner == username)
    }

    pub fn owner(&self, name: &str) -> Option<&str> {
        self.channels.get(name).map(|channel| channel.owner.as_str())
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&ChannelState> {
        self.channels.get(name)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
