use std::{net::SocketAddr, path::PathBuf};

use clap::{Args, Parser, Subcommand};

/// Port the server listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 16043;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the chat server, serving login and chat requests over TCP.
    Server(ServerArgs),
    /// Connect to a server and issue commands from the console.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Socket address the server should bind to. Use port 0 for an ephemeral port.
    #[arg(long, default_value_t = SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)))]
    pub listen: SocketAddr,

    /// File holding registered users, one `(id, password)` record per line.
    #[arg(long, default_value = "users.txt")]
    pub users: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Server host name or IPv4 address.
    pub host: String,

    /// Port the server listens on.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}
