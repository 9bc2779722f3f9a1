/// In-memory state for a single channel.
#[derive(Debug)]
pub struct ChannelState {
    /// Username whose join created the channel. Never reassigned.
    pub owner: String,
    /// Usernames in join order, each at most once.
    participants: Vec<String>,
}

impl ChannelState {
    pub fn new(owner: String) -> Self {
        Self {
            owner,
            participants: Vec::new(),
        }
    }

    /// Append a participant. Returns false if the username was already present.
    pub fn add(&mut self, username: &str) -> bool {
        if self.contains(username) {
            return false;
        }
        self.participants.push(username.to_string());
        true
    }

    /// Returns false if the username was not a participant.
    pub fn remove(&mut self, username: &str) -> bool {
        let before = self.participants.len();
        self.participants.retain(|p| p != username);
        self.participants.len() != before
    }

    pub fn contains(&self, username: &str) -> bool {
        self.participants.iter().any(|p| p == username)
    }

    pub fn participants(&self) -> &[String] {
        &self.participants
    }

    #[cfg(test)]
    pub fn member_count(&self) -> usize {
        self.participants.len()
    }
}
