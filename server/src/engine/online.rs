/// Usernames currently connected anywhere, in the order they first came online.
/// Only used for the informational `allUsers` broadcast.
#[derive(Debug, Default)]
pub struct OnlineUsers {
    users: Vec<String>,
}

impl OnlineUsers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the username was already online.
    pub fn insert(&mut self, username: &str) -> bool {
        if self.contains(username) {
            return false;
        }
        self.users.push(username.to_string());
        true
    }

    pub fn remove(&mut self, username: &str) -> bool {
        let before = self.users.len();
        self.users.retain(|u| u != username);
        self.users.len() != before
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.iter().any(|u| u == username)
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.users.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_first_seen_order() {
        let mut online = OnlineUsers::new();
        assert!(online.insert("bob"));
        assert!(online.insert("alice"));
        assert!(!online.insert("bob"));
        assert_eq!(online.snapshot(), vec!["bob", "alice"]);
    }

    #[test]
    fn test_remove() {
        let mut online = OnlineUsers::new();
        online.insert("alice");
        assert!(online.remove("alice"));
        assert!(!online.remove("alice"));
        assert!(!online.contains("alice"));
    }
}
