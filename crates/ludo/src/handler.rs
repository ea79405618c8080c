//! Per-connection handler: handshake, auth, and command routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake → validate version
//!   2. Authenticate the token, or resume with a resume token
//!   3. Start the writer task and send HandshakeAck
//!   4. Loop: receive envelopes → answer heartbeats, route gameplay commands
//!
//! Everything the client receives after the handshake, whether a direct
//! reply or a room broadcast, goes through one unbounded channel drained
//! by the writer task, which stamps the envelope sequence numbers.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ludo_engine::{RoomCode, UserId};
use ludo_protocol::{
    ClientMessage, Codec, Envelope, ErrorReason, PROTOCOL_VERSION, ProtocolError, ServerMessage,
};
use ludo_room::{PlayerSender, RoomError, SettlementHook};
use ludo_session::{Authenticator, PlayerIdentity, Session};
use ludo_transport::{Connection, TransportError, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::LudoError;
use crate::server::ServerState;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Silence longer than this drops the connection. Clients heartbeat well
/// inside it.
const RECV_TIMEOUT: Duration = Duration::from_secs(15);

/// Drop guard that disconnects a player's session when the handler exits.
///
/// Also tells every room this connection is seated in, so each can start
/// the seat's grace window. Since `Drop` is synchronous, the async part
/// runs on a fire-and-forget task.
struct SessionGuard<A: Authenticator, S: SettlementHook, C: Codec> {
    user_id: UserId,
    /// Identifies this connection to the room; a newer one is left alone.
    sender: PlayerSender,
    /// Rooms joined over this connection and not left since.
    joined: Mutex<HashSet<RoomCode>>,
    state: Arc<ServerState<A, S, C>>,
}

impl<A: Authenticator, S: SettlementHook, C: Codec> Drop for SessionGuard<A, S, C> {
    fn drop(&mut self) {
        let user_id = self.user_id.clone();
        let sender = self.sender.clone();
        let joined = std::mem::take(
            self.joined.get_mut().unwrap_or_else(PoisonError::into_inner),
        );
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let _ = state.sessions.lock().await.disconnect(&user_id);
            for code in joined {
                state.rooms.disconnect(&code, &user_id, sender.clone()).await;
            }
        });
    }
}

/// What a successful handshake leaves behind.
struct Admission {
    identity: PlayerIdentity,
    resume_token: String,
    room_code: Option<RoomCode>,
}

impl From<&Session> for Admission {
    fn from(session: &Session) -> Self {
        Self {
            identity: session.identity.clone(),
            resume_token: session.resume_token.clone(),
            room_code: session.room.clone(),
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, S, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, S, C>>,
) -> Result<(), LudoError>
where
    A: Authenticator,
    S: SettlementHook,
    C: Codec,
{
    let conn_id = conn.id();
    debug!(%conn_id, "handling new connection");

    // --- Step 1: Handshake ---
    let admission = match perform_handshake(&conn, &state).await {
        Ok(admission) => admission,
        Err(e) => {
            let _ = conn.close().await;
            return Err(e);
        }
    };
    let user_id = admission.identity.user_id.clone();
    info!(%conn_id, %user_id, "player authenticated");

    // The session is live from here on, so the guard must be too.
    let (outbound, receiver) = mpsc::unbounded_channel();
    let guard = SessionGuard {
        user_id: user_id.clone(),
        sender: outbound.clone(),
        joined: Mutex::default(),
        state: Arc::clone(&state),
    };
    let writer = spawn_writer(conn.clone(), Arc::clone(&state), receiver);

    let client = ClientSession {
        identity: admission.identity,
        outbound,
        joined: &guard.joined,
        state: &*state,
    };
    client.send(ServerMessage::HandshakeAck {
        user_id: user_id.clone(),
        resume_token: admission.resume_token,
        room_code: admission.room_code,
        server_time: state.now_ms(),
    });

    // --- Step 2: Message loop ---
    loop {
        let data = match tokio::time::timeout(RECV_TIMEOUT, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                info!(%user_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                debug!(%user_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                info!(%user_id, "connection timed out");
                break;
            }
        };

        let envelope: Envelope<ClientMessage> = match state.codec.decode(&data) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(%user_id, error = %e, "failed to decode envelope");
                client.reject(ErrorReason::InvalidCommand);
                continue;
            }
        };

        if let Err(reason) = client.dispatch(envelope.payload).await {
            client.reject(reason);
        }
    }

    writer.abort();
    let _ = conn.close().await;
    // guard drops here → session and seat disconnects fire.
    Ok(())
}

/// Receives the handshake, validates it and opens or resumes the session.
///
/// On failure the client has already been sent an `error` frame.
async fn perform_handshake<A, S, C>(
    conn: &WebSocketConnection,
    state: &ServerState<A, S, C>,
) -> Result<Admission, LudoError>
where
    A: Authenticator,
    C: Codec,
{
    let data = match tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage("connection closed before handshake".into()).into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let envelope: Envelope<ClientMessage> = match state.codec.decode(&data) {
        Ok(envelope) => envelope,
        Err(e) => {
            send_error(conn, state, ErrorReason::InvalidCommand).await?;
            return Err(e.into());
        }
    };

    let ClientMessage::Handshake {
        version,
        token,
        resume_token,
    } = envelope.payload
    else {
        send_error(conn, state, ErrorReason::InvalidCommand).await?;
        return Err(ProtocolError::InvalidMessage("first message must be handshake".into()).into());
    };

    if version != PROTOCOL_VERSION {
        send_error(conn, state, ErrorReason::InvalidCommand).await?;
        return Err(ProtocolError::VersionMismatch {
            expected: PROTOCOL_VERSION,
            got: version,
        }
        .into());
    }

    if let Some(resume_token) = resume_token {
        let resumed = {
            let mut sessions = state.sessions.lock().await;
            sessions.resume(&resume_token).map(Admission::from)
        };
        match resumed {
            Ok(admission) => return Ok(admission),
            Err(e) if token.is_none() => {
                send_error(conn, state, ErrorReason::Unauthorized).await?;
                return Err(e.into());
            }
            Err(e) => debug!(error = %e, "resume failed, authenticating token"),
        }
    }

    let Some(token) = token else {
        send_error(conn, state, ErrorReason::InvalidCommand).await?;
        return Err(ProtocolError::InvalidMessage("handshake carries no credential".into()).into());
    };

    let identity = match state.auth.authenticate(&token).await {
        Ok(identity) => identity,
        Err(e) => {
            send_error(conn, state, ErrorReason::Unauthorized).await?;
            return Err(e.into());
        }
    };

    let created = {
        let mut sessions = state.sessions.lock().await;
        sessions.create(identity).map(Admission::from)
    };
    match created {
        Ok(admission) => Ok(admission),
        Err(e) => {
            send_error(conn, state, ErrorReason::Unauthorized).await?;
            Err(e.into())
        }
    }
}

/// One authenticated client's view of the server.
struct ClientSession<'a, A, S, C> {
    identity: PlayerIdentity,
    outbound: PlayerSender,
    joined: &'a Mutex<HashSet<RoomCode>>,
    state: &'a ServerState<A, S, C>,
}

impl<A, S, C> ClientSession<'_, A, S, C>
where
    A: Authenticator,
    S: SettlementHook,
    C: Codec,
{
    fn user_id(&self) -> &UserId {
        &self.identity.user_id
    }

    fn send(&self, msg: ServerMessage) {
        // Closed only once the writer is gone, and then so is the socket.
        let _ = self.outbound.send(msg);
    }

    fn reject(&self, reason: ErrorReason) {
        debug!(user_id = %self.user_id(), ?reason, "command rejected");
        self.send(ServerMessage::error(reason));
    }

    fn joined(&self) -> MutexGuard<'_, HashSet<RoomCode>> {
        self.joined.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refused(&self, e: RoomError) -> ErrorReason {
        debug!(user_id = %self.user_id(), error = %e, "room refused command");
        e.reason()
    }

    /// Handles one client command. Replies and room events are queued on
    /// the outbound channel; a refusal comes back as its reason code.
    async fn dispatch(&self, msg: ClientMessage) -> Result<(), ErrorReason> {
        if let Some((_, user_id)) = msg.target() {
            if user_id != self.user_id() {
                warn!(user_id = %self.user_id(), claimed = %user_id, "command names another user");
                return Err(ErrorReason::Unauthorized);
            }
        }

        let rooms = &self.state.rooms;
        match msg {
            ClientMessage::Handshake { .. } => Err(ErrorReason::InvalidCommand),

            ClientMessage::Heartbeat { client_time } => {
                self.send(ServerMessage::HeartbeatAck {
                    client_time,
                    server_time: self.state.now_ms(),
                });
                Ok(())
            }

            ClientMessage::JoinGame { room_code, .. } => {
                let color = rooms
                    .join(&room_code, self.identity.clone(), self.outbound.clone())
                    .await
                    .map_err(|e| self.refused(e))?;
                info!(user_id = %self.user_id(), %room_code, %color, "player seated");
                self.joined().insert(room_code.clone());
                self.remember_room(Some(room_code)).await;
                Ok(())
            }

            ClientMessage::RollDice { room_code, user_id } => rooms
                .roll(&room_code, &user_id)
                .await
                .map_err(|e| self.refused(e)),

            ClientMessage::MoveToken {
                room_code,
                user_id,
                token_index,
            } => rooms
                .move_token(&room_code, &user_id, token_index)
                .await
                .map_err(|e| self.refused(e)),

            ClientMessage::LeaveGame { room_code, user_id } => {
                rooms
                    .leave(&room_code, &user_id)
                    .await
                    .map_err(|e| self.refused(e))?;
                self.joined().remove(&room_code);
                self.forget_room(&room_code).await;
                Ok(())
            }
        }
    }

    async fn remember_room(&self, room: Option<RoomCode>) {
        let mut sessions = self.state.sessions.lock().await;
        if let Err(e) = sessions.set_room(self.user_id(), room) {
            warn!(user_id = %self.user_id(), error = %e, "could not record room");
        }
    }

    async fn forget_room(&self, room_code: &RoomCode) {
        let seated_here = {
            let sessions = self.state.sessions.lock().await;
            sessions
                .get(self.user_id())
                .is_some_and(|session| session.room.as_ref() == Some(room_code))
        };
        if seated_here {
            self.remember_room(None).await;
        }
    }
}

/// Drains `receiver` onto the socket, one envelope per message.
fn spawn_writer<A, S, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, S, C>>,
    mut receiver: mpsc::UnboundedReceiver<ServerMessage>,
) -> JoinHandle<()>
where
    A: Authenticator,
    S: SettlementHook,
    C: Codec,
{
    tokio::spawn(async move {
        let mut seq: u64 = 0;
        while let Some(msg) = receiver.recv().await {
            let envelope = Envelope::new(next_seq(&mut seq), state.now_ms(), msg);
            let bytes = match state.codec.encode(&envelope) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(conn_id = %conn.id(), error = %e, "failed to encode envelope");
                    continue;
                }
            };
            if let Err(e) = send_frame(&conn, &bytes).await {
                debug!(conn_id = %conn.id(), error = %e, "writer stopped");
                break;
            }
        }
    })
}

/// Sends an `error` frame straight to the socket, before any writer exists.
async fn send_error<A, S, C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<A, S, C>,
    reason: ErrorReason,
) -> Result<(), LudoError> {
    let envelope = Envelope::new(0, state.now_ms(), ServerMessage::error(reason));
    let bytes = state.codec.encode(&envelope)?;
    send_frame(conn, &bytes).await?;
    Ok(())
}

/// Text frame when the encoding is UTF-8 (JSON always is), binary otherwise.
async fn send_frame(conn: &WebSocketConnection, bytes: &[u8]) -> Result<(), TransportError> {
    match std::str::from_utf8(bytes) {
        Ok(text) => conn.send_text(text).await,
        Err(_) => conn.send(bytes).await,
    }
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
