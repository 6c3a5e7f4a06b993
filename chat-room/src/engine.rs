//! Protocol engine: the per-connection authentication state machine.
//!
//! The engine is pure. Given the current session, a read-only view of the
//! credential store and one request, it decides the reply, whether the store
//! must change and where the session goes next. The transport applies the
//! outcome; nothing in here performs I/O.
//!
//! ```ignore
//! let outcome = engine::respond(&session, &store, "login alice secret");
//! // Transport applies outcome.effect, writes outcome.reply, follows outcome.transition.
//! ```

use std::fmt;

use crate::command::{Command, ParseError};
use crate::session::Session;
use crate::store::CredentialStore;

/// Text sent back for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    AccountCreated,
    AccountExists,
    LoginConfirmed,
    LoginDenied,
    AlreadyLoggedIn,
    Chat { user_id: String, message: String },
    LoginRequired,
    Left { user_id: String },
    NotLoggedIn,
    InvalidCommand,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::AccountCreated => f.write_str("New user account created. Please login."),
            Reply::AccountExists => f.write_str("Denied. User account already exists."),
            Reply::LoginConfirmed => f.write_str("login confirmed"),
            Reply::LoginDenied => f.write_str("Denied. User name or password incorrect."),
            Reply::AlreadyLoggedIn => f.write_str("Denied. You are already logged in."),
            Reply::Chat { user_id, message } => write!(f, "{user_id}: {message}"),
            Reply::LoginRequired => f.write_str("Denied. Please login first."),
            Reply::Left { user_id } => write!(f, "{user_id} left."),
            Reply::NotLoggedIn => f.write_str("Denied. You are not logged in."),
            Reply::InvalidCommand => f.write_str("Invalid command."),
        }
    }
}

/// Store mutation the transport must carry out before replying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Register { id: String, password: String },
}

/// Where the session goes after the reply is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Stay,
    Authenticate { user_id: String },
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub reply: Reply,
    pub effect: Option<Effect>,
    pub transition: Transition,
}

impl Outcome {
    fn reply(reply: Reply) -> Self {
        Self {
            reply,
            effect: None,
            transition: Transition::Stay,
        }
    }
}

/// Parses a raw request line and applies it.
pub fn respond(session: &Session, store: &CredentialStore, line: &str) -> Outcome {
    apply(session, store, Command::parse(line))
}

pub fn apply(
    session: &Session,
    store: &CredentialStore,
    request: Result<Command, ParseError>,
) -> Outcome {
    let Ok(command) = request else {
        return Outcome::reply(Reply::InvalidCommand);
    };

    match (command, session.user_id()) {
        (Command::NewUser { id, password }, _) => {
            if store.contains(&id) {
                return Outcome::reply(Reply::AccountExists);
            }
            Outcome {
                reply: Reply::AccountCreated,
                effect: Some(Effect::Register { id, password }),
                transition: Transition::Stay,
            }
        }
        (Command::Login { .. }, Some(_)) => Outcome::reply(Reply::AlreadyLoggedIn),
        (Command::Login { id, password }, None) => {
            if !store.verify(&id, &password) {
                return Outcome::reply(Reply::LoginDenied);
            }
            Outcome {
                reply: Reply::LoginConfirmed,
                effect: None,
                transition: Transition::Authenticate { user_id: id },
            }
        }
        (Command::Send { message }, Some(user_id)) => Outcome::reply(Reply::Chat {
            user_id: user_id.to_string(),
            message,
        }),
        (Command::Send { .. }, None) => Outcome::reply(Reply::LoginRequired),
        (Command::Logout, Some(user_id)) => Outcome {
            reply: Reply::Left {
                user_id: user_id.to_string(),
            },
            effect: None,
            transition: Transition::Disconnect,
        },
        (Command::Logout, None) => Outcome::reply(Reply::NotLoggedIn),
    }
}
