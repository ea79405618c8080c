//! `LudoServer` builder and server loop.
//!
//! This is the entry point for running a Ludo server. It ties together all
//! the layers: transport → protocol → session → room.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ludo_protocol::{Codec, JsonCodec};
use ludo_room::{Dice, DiceFactory, MatchConfig, RoomRegistry, SettlementHook};
use ludo_session::{Authenticator, SessionConfig, SessionManager};
use ludo_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::LudoError;
use crate::handler::handle_connection;

/// How often disconnected sessions are checked for an elapsed grace window.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<A, S, C> {
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) rooms: Arc<RoomRegistry<S>>,
    pub(crate) auth: A,
    pub(crate) codec: C,
    /// Origin of every `timestamp` and `server_time` this server sends.
    pub(crate) started: Instant,
}

impl<A, S, C> ServerState<A, S, C> {
    pub(crate) fn now_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Builder for configuring and starting a Ludo server.
///
/// # Example
///
/// ```rust,ignore
/// use ludo::prelude::*;
///
/// let server = LudoServer::builder()
///     .bind("0.0.0.0:8080")
///     .match_config(MatchConfig { seats: SeatCount::Four, ..MatchConfig::default() })
///     .build(DevAuthenticator, my_settlement)
///     .await?;
/// server.run().await
/// ```
pub struct LudoServerBuilder {
    bind_addr: String,
    match_config: MatchConfig,
    session_config: SessionConfig,
    dice: Option<DiceFactory>,
}

impl LudoServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            match_config: MatchConfig::default(),
            session_config: SessionConfig::default(),
            dice: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the configuration shared by every match room.
    pub fn match_config(mut self, config: MatchConfig) -> Self {
        self.match_config = config;
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Replaces the random die given to each new room.
    pub fn dice<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Dice> + Send + Sync + 'static,
    {
        self.dice = Some(Arc::new(factory));
        self
    }

    /// Binds the listener and assembles the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<A, S>(
        self,
        auth: A,
        settlement: S,
    ) -> Result<LudoServer<A, S, JsonCodec>, LudoError>
    where
        A: Authenticator,
        S: SettlementHook,
    {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let mut rooms = RoomRegistry::new(self.match_config, settlement);
        if let Some(factory) = self.dice {
            rooms = rooms.with_dice(move || factory());
        }

        let state = Arc::new(ServerState {
            sessions: Mutex::new(SessionManager::new(self.session_config)),
            rooms: Arc::new(rooms),
            auth,
            codec: JsonCodec,
            started: Instant::now(),
        });

        Ok(LudoServer { transport, state })
    }
}

impl Default for LudoServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Ludo server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct LudoServer<A, S, C> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, S, C>>,
}

impl LudoServer<(), (), JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> LudoServerBuilder {
        LudoServerBuilder::new()
    }
}

impl<A, S, C> LudoServer<A, S, C>
where
    A: Authenticator,
    S: SettlementHook,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The room registry, for status reads by the catalog service.
    pub fn rooms(&self) -> Arc<RoomRegistry<S>> {
        Arc::clone(&self.state.rooms)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), LudoError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves, then cancels every
    /// running match.
    ///
    /// Each accepted connection gets its own handler task. A session
    /// sweeper runs alongside and stops with the loop.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), LudoError> {
        info!("Ludo server running");
        let sweeper = spawn_session_sweeper(Arc::clone(&self.state));
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "accept failed");
                    }
                },
                () = &mut shutdown => break,
            }
        }

        info!("Ludo server shutting down");
        sweeper.abort();
        self.transport.shutdown().await?;
        self.state.rooms.shutdown().await;
        Ok(())
    }
}

/// Periodically expires sessions whose grace window elapsed and drops them.
fn spawn_session_sweeper<A, S, C>(state: Arc<ServerState<A, S, C>>) -> tokio::task::JoinHandle<()>
where
    A: Send + Sync + 'static,
    S: Send + Sync + 'static,
    C: Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let mut sessions = state.sessions.lock().await;
            let expired = sessions.expire_stale();
            sessions.cleanup_expired();
            if !expired.is_empty() {
                debug!(count = expired.len(), remaining = sessions.len(), "swept sessions");
            }
        }
    })
}
