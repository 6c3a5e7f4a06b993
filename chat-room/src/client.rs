use std::io::IsTerminal;
use std::net::SocketAddr;

use anyhow::Result;
use tokio::{
    io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{self, TcpStream},
    select,
};
use tracing::{debug, warn};

use crate::{
    cli::ClientArgs,
    command::{Command, Keyword, ParseError},
    engine::Reply,
    frame::{read_frame, write_frame},
};

pub const BANNER: &str = "My chat room client. Version One.";

/// What the console loop should do with one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Nothing to do (blank input).
    Skip,
    /// Refused locally; print the notice and never touch the socket.
    Notice(String),
    /// Forward the request and print the server's reply.
    Request { line: String, keyword: Keyword },
}

/// Client-side view of the session, used to refuse requests the server
/// would reject anyway.
#[derive(Debug, Default)]
pub struct ClientSession {
    logged_in: bool,
}

impl ClientSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    /// Validates one line of console input against the grammar and the
    /// local login state.
    pub fn prepare(&self, input: &str) -> Action {
        let line = input.trim();
        if line.is_empty() {
            return Action::Skip;
        }

        let Some(keyword) = Keyword::detect(line) else {
            return notice("Invalid command.");
        };

        match (keyword, self.logged_in) {
            (Keyword::NewUser | Keyword::Login, true) => return notice("You are already logged in."),
            (Keyword::Send, false) => return notice("Denied. Please login first."),
            (Keyword::Logout, false) => return notice("You are not logged in."),
            _ => {}
        }

        match Command::parse(line) {
            Ok(_) => Action::Request {
                line: line.to_string(),
                keyword,
            },
            Err(err) => Action::Notice(describe(&err)),
        }
    }

    /// Records the server's reply. Returns false when the conversation is over.
    pub fn observe(&mut self, keyword: Keyword, reply: &str) -> bool {
        match keyword {
            Keyword::Login => {
                if reply.contains(&Reply::LoginConfirmed.to_string()) {
                    self.logged_in = true;
                }
                true
            }
            Keyword::Logout => {
                self.logged_in = false;
                false
            }
            Keyword::NewUser | Keyword::Send => true,
        }
    }
}

fn notice(text: &str) -> Action {
    Action::Notice(text.to_string())
}

fn describe(err: &ParseError) -> String {
    match err {
        ParseError::Usage(keyword @ (Keyword::NewUser | Keyword::Login)) => {
            format!("Invalid format. Usage: {}", keyword.usage())
        }
        ParseError::InvalidCredentials => "Invalid UserID or Password format.".to_string(),
        ParseError::InvalidMessage => "Invalid message length.".to_string(),
        ParseError::Usage(_) | ParseError::Empty | ParseError::UnknownCommand(_) => {
            "Invalid command.".to_string()
        }
    }
}

pub async fn run(args: ClientArgs) -> Result<()> {
    let Some(addr) = resolve(&args.host, args.port).await else {
        write_stdout("Host not found").await?;
        return Ok(());
    };

    write_stdout(BANNER).await?;

    let mut stream = match TcpStream::connect(addr).await {
        Ok(stream) => stream,
        Err(err) => {
            write_stdout(&format!("Failed to connect: {err}")).await?;
            return Ok(());
        }
    };
    debug!(%addr, "connected");

    let mut stdin = BufReader::new(tokio::io::stdin());
    run_client_loop(&mut stream, &mut stdin).await?;
    shutdown_connection(&mut stream).await;

    Ok(())
}

/// Resolves `host` to an IPv4 socket address. Literal addresses skip the
/// resolver.
async fn resolve(host: &str, port: u16) -> Option<SocketAddr> {
    if let Ok(ip) = host.parse::<std::net::Ipv4Addr>() {
        return Some(SocketAddr::from((ip, port)));
    }

    match net::lookup_host((host, port)).await {
        Ok(mut addrs) => addrs.find(SocketAddr::is_ipv4),
        Err(err) => {
            debug!(host, error = ?err, "host lookup failed");
            None
        }
    }
}

async fn run_client_loop(
    stream: &mut TcpStream,
    stdin: &mut BufReader<tokio::io::Stdin>,
) -> Result<()> {
    let interactive = std::io::stdin().is_terminal();
    let mut session = ClientSession::new();
    let mut input = String::new();

    // Registered once so an interrupt between prompts is not lost.
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        if interactive {
            write_prompt().await?;
        }

        input.clear();
        let bytes_read = select! {
            bytes_read = stdin.read_line(&mut input) => bytes_read?,
            result = &mut ctrl_c => {
                handle_ctrl_c(result);
                0
            }
        };
        if bytes_read == 0 {
            if interactive {
                write_stdout("").await?;
            }
            write_stdout("Closing connection...").await?;
            break;
        }

        let (line, keyword) = match session.prepare(&input) {
            Action::Skip => continue,
            Action::Notice(text) => {
                write_stdout(&format!("> {text}")).await?;
                continue;
            }
            Action::Request { line, keyword } => (line, keyword),
        };

        write_frame(stream, &line).await?;
        let Some(reply) = read_frame(stream).await? else {
            write_stdout("*** server closed the connection").await?;
            break;
        };
        write_stdout(&format!("> {reply}")).await?;

        if !session.observe(keyword, &reply) {
            break;
        }
    }

    Ok(())
}

fn handle_ctrl_c(result: io::Result<()>) {
    if let Err(error) = result {
        warn!(?error, "ctrl-c handler failed");
    }
}

async fn shutdown_connection(stream: &mut TcpStream) {
    if let Err(error) = stream.shutdown().await {
        warn!(?error, "failed to shutdown client connection cleanly");
    }
}

async fn write_prompt() -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"> ").await?;
    stdout.flush().await
}

async fn write_stdout(line: &str) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
