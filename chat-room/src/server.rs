use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::Result;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    sync::Mutex,
};
use tracing::{debug, info, warn};

use crate::{
    engine::{self, Effect, Outcome, Reply, Transition},
    frame::{read_frame, write_frame},
    session::Session,
    store::CredentialStore,
};

pub struct Server {
    listener: TcpListener,
    state: Arc<ServerState>,
}

impl Server {
    pub fn new(listener: TcpListener, store: CredentialStore) -> Self {
        Self {
            listener,
            state: Arc::new(ServerState::new(store)),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Server { listener, state } = self;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    info!("server shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    handle_accept_result(accept_result, &state);
                }
            }
        }

        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

fn handle_accept_result(
    result: std::io::Result<(TcpStream, SocketAddr)>,
    state: &Arc<ServerState>,
) {
    match result {
        Ok((stream, peer)) => spawn_connection_handler(stream, peer, state),
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

fn spawn_connection_handler(stream: TcpStream, peer: SocketAddr, state: &Arc<ServerState>) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        if let Err(err) = handle_connection(stream, peer, state).await {
            warn!(peer = %peer, error = ?err, "client connection closed with error");
        }
    });
}

/// State shared by every connection. Sessions are not in here; each
/// connection owns its own.
struct ServerState {
    store: Mutex<CredentialStore>,
}

impl ServerState {
    fn new(store: CredentialStore) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    /// Runs one request through the engine and applies its store effect.
    ///
    /// The store lock is held from the existence check through the save, so
    /// concurrent registrations of the same id cannot both succeed.
    async fn dispatch(&self, session: &Session, line: &str) -> Result<Outcome> {
        let mut store = self.store.lock().await;
        let outcome = engine::respond(session, &store, line);

        if let Some(Effect::Register { id, password }) = &outcome.effect {
            register(&mut store, id, password).await?;
            info!(peer = ?session.peer(), user_id = %id, "new user account created");
        }

        Ok(outcome)
    }
}

async fn register(store: &mut CredentialStore, id: &str, password: &str) -> Result<()> {
    store.insert(id.to_string(), password.to_string());
    if let Err(err) = store.save().await {
        store.remove(id);
        return Err(err.into());
    }
    Ok(())
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    state: Arc<ServerState>,
) -> Result<()> {
    info!(%peer, "client connected");
    let mut session = Session::new(Some(peer));

    run_client_session(&state, &mut stream, &mut session).await?;

    info!(%peer, user_id = ?session.user_id(), "client disconnected");
    Ok(())
}

async fn run_client_session(
    state: &ServerState,
    stream: &mut TcpStream,
    session: &mut Session,
) -> Result<()> {
    while let Some(line) = read_frame(stream).await? {
        debug!(peer = ?session.peer(), %line, "request received");
        let outcome = state.dispatch(session, &line).await?;
        log_reply(session, &outcome.reply);
        write_frame(stream, &outcome.reply.to_string()).await?;

        match outcome.transition {
            Transition::Stay => {}
            Transition::Authenticate { user_id } => session.authenticate(user_id),
            Transition::Disconnect => {
                session.end();
                break;
            }
        }
    }

    Ok(())
}

fn log_reply(session: &Session, reply: &Reply) {
    let peer = session.peer();
    match reply {
        Reply::LoginConfirmed => info!(?peer, "login confirmed"),
        Reply::Chat { user_id, message } => info!(?peer, %user_id, %message, "message relayed"),
        Reply::Left { user_id } => info!(?peer, %user_id, "logout"),
        other => debug!(?peer, reply = %other, "request rejected"),
    }
}
