use std::net::SocketAddr;

/// Authentication state of one connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Authenticated {
        user_id: String,
    },
}

/// Per-connection session. Lives exactly as long as its connection and is
/// never shared.
#[derive(Debug, Clone, Default)]
pub struct Session {
    peer: Option<SocketAddr>,
    state: SessionState,
}

impl Session {
    pub fn new(peer: Option<SocketAddr>) -> Self {
        Self {
            peer,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated { .. })
    }

    pub fn user_id(&self) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated { user_id } => Some(user_id),
            SessionState::Unauthenticated => None,
        }
    }

    pub fn authenticate(&mut self, user_id: String) {
        self.state = SessionState::Authenticated { user_id };
    }

    /// Unbinds the session, returning the user it was bound to.
    pub fn end(&mut self) -> Option<String> {
        match std::mem::take(&mut self.state) {
            SessionState::Authenticated { user_id } => Some(user_id),
            SessionState::Unauthenticated => None,
        }
    }
}
