use crate::accounts::Role;

/// How many recent queries the session keeps for display.
pub const RECENT_QUERIES: usize = 5;

/// Per-session identity and running state, passed explicitly to every operation.
#[derive(Clone, Debug)]
pub struct Session {
    /// Role picked before logging in or signing up.
    pub selected_role: Role,
    pub user: Option<SessionUser>,
    pub admin: bool,
    /// Newest first.
    pub recent_queries: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionUser {
    pub username: String,
    pub role: Role,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            selected_role: Role::Student,
            user: None,
            admin: false,
            recent_queries: Vec::new(),
        }
    }
}

impl Session {
    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.username.as_str())
    }

    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|u| u.role)
    }

    pub(crate) fn remember_query(&mut self, query: &str) {
        self.recent_queries.insert(0, query.to_string());
        self.recent_queries.truncate(RECENT_QUERIES);
    }
}
