//! Request grammar shared by the client and the server.
//!
//! A request is a single line of text. The client parses it before anything
//! touches the network so malformed input is rejected locally; the server
//! parses it again because it cannot assume the peer is a well-behaved client.

use std::fmt;

use thiserror::Error;

/// Longest message, in characters, that `send` accepts.
pub const MAX_LINE: usize = 256;

/// Longest user id, in characters.
pub const MAX_USER_ID: usize = 32;

const USER_ID_LEN: std::ops::RangeInclusive<usize> = 3..=MAX_USER_ID;
const PASSWORD_LEN: std::ops::RangeInclusive<usize> = 4..=8;

/// The leading token of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    NewUser,
    Login,
    Send,
    Logout,
}

impl Keyword {
    /// Returns the keyword that opens `line`, if any.
    pub fn detect(line: &str) -> Option<Self> {
        match line.split_whitespace().next()? {
            "newuser" => Some(Keyword::NewUser),
            "login" => Some(Keyword::Login),
            "send" => Some(Keyword::Send),
            "logout" => Some(Keyword::Logout),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::NewUser => "newuser",
            Keyword::Login => "login",
            Keyword::Send => "send",
            Keyword::Logout => "logout",
        }
    }

    pub fn usage(self) -> &'static str {
        match self {
            Keyword::NewUser => "newuser [userID] [password]",
            Keyword::Login => "login [userID] [password]",
            Keyword::Send => "send [message]",
            Keyword::Logout => "logout",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request that passed both grammar and shape checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    NewUser { id: String, password: String },
    Login { id: String, password: String },
    Send { message: String },
    Logout,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("unrecognized command '{0}'")]
    UnknownCommand(String),

    #[error("invalid format, usage: {}", .0.usage())]
    Usage(Keyword),

    #[error("invalid user id or password format")]
    InvalidCredentials,

    #[error("message must be between 1 and {} characters", MAX_LINE)]
    InvalidMessage,
}

impl Command {
    /// Parses one request line.
    ///
    /// Surrounding whitespace is ignored. For `send`, everything after the
    /// keyword and a single separating whitespace character is the message,
    /// kept verbatim.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ParseError::Empty);
        }

        let Some(keyword) = Keyword::detect(line) else {
            let token = line.split_whitespace().next().unwrap_or_default();
            return Err(ParseError::UnknownCommand(token.to_string()));
        };

        match keyword {
            Keyword::NewUser | Keyword::Login => {
                let (id, password) = parse_credentials(line, keyword)?;
                Ok(if keyword == Keyword::NewUser {
                    Command::NewUser { id, password }
                } else {
                    Command::Login { id, password }
                })
            }
            Keyword::Send => {
                let message = split_message(line).ok_or(ParseError::InvalidMessage)?;
                if !validate_message(message) {
                    return Err(ParseError::InvalidMessage);
                }
                Ok(Command::Send {
                    message: message.to_string(),
                })
            }
            Keyword::Logout => {
                if line.split_whitespace().count() != 1 {
                    return Err(ParseError::Usage(Keyword::Logout));
                }
                Ok(Command::Logout)
            }
        }
    }
}

fn parse_credentials(line: &str, keyword: Keyword) -> Result<(String, String), ParseError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let [_, id, password] = parts.as_slice() else {
        return Err(ParseError::Usage(keyword));
    };

    if !validate_user_id(id) || !validate_password(password) {
        return Err(ParseError::InvalidCredentials);
    }

    Ok((id.to_string(), password.to_string()))
}

fn split_message(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(Keyword::Send.as_str())?;
    let mut chars = rest.chars();
    match chars.next() {
        Some(separator) if separator.is_whitespace() => Some(chars.as_str()),
        _ => None,
    }
}

pub fn validate_user_id(id: &str) -> bool {
    USER_ID_LEN.contains(&id.chars().count()) && !id.contains(char::is_whitespace)
}

pub fn validate_password(password: &str) -> bool {
    PASSWORD_LEN.contains(&password.chars().count()) && !password.contains(char::is_whitespace)
}

pub fn validate_message(message: &str) -> bool {
    !message.trim().is_empty() && message.chars().count() <= MAX_LINE
}
