//! Text-protocol chat room with password logins.
//!
//! A server accepts TCP connections, authenticates users against a file of
//! registered accounts and echoes each `send` back tagged with the sender's
//! user id. The client issues validated commands over the same socket.
//!
//! - [`cli`] parses the command-line interface for server and client modes.
//! - [`command`] defines the request grammar and the shape checks both sides
//!   apply.
//! - [`store`] loads and persists the credential file.
//! - [`session`] tracks whether a connection is logged in, and as whom.
//! - [`engine`] is the pure state machine deciding each reply.
//! - [`frame`] reads and writes one request or reply per socket operation.
//! - [`server`] accepts connections and runs one session task per client.
//! - [`client`] drives the console loop for a terminal user.

pub mod cli;
pub mod client;
pub mod command;
pub mod engine;
pub mod frame;
pub mod server;
pub mod session;
pub mod store;
