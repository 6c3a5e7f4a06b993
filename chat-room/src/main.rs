use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use chat_room::{
    cli::{Cli, Command, ServerArgs},
    client,
    server::Server,
    store::CredentialStore,
};

fn init_tracing() {
    use std::io::IsTerminal;
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(std::io::stdout().is_terminal())
        .try_init();
}

async fn run_server(args: ServerArgs) -> Result<()> {
    let store = CredentialStore::load(&args.users)
        .await
        .with_context(|| format!("failed to load users from {}", args.users.display()))?;

    info!(users = store.len(), path = %args.users.display(), "credential store loaded");

    println!("My chat room server. Version One.");

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    let server = Server::new(listener, store);
    let addr = server.local_addr()?;
    info!("server listening on {}", addr);

    if let Err(err) = server.run_until_ctrl_c().await {
        warn!("server exited with error: {err:?}");
        return Err(err);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Server(args) => run_server(args).await?,
        Command::Client(args) => client::run(args).await?,
    }

    Ok(())
}
