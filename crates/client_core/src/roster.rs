#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub username: String,
    pub is_self: bool,
}

/// Online users, replaced wholesale by each server snapshot.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    users: Vec<String>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the contents changed.
    pub fn replace(&mut self, usernames: Vec<String>) -> bool {
        if self.users == usernames {
            return false;
        }
        self.users = usernames;
        true
    }

    pub fn entries(&self, local: Option<&str>) -> Vec<RosterEntry> {
        self.users
            .iter()
            .map(|username| RosterEntry {
                is_self: local == Some(username.as_str()),
                username: username.clone(),
            })
            .collect()
    }

    pub fn usernames(&self) -> &[String] {
        &self.users
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.iter().any(|u| u == username)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn clear(&mut self) {
        self.users.clear();
    }
}
