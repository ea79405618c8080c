//! Room actor: an isolated Tokio task that owns one match.
//!
//! Each room runs in its own task and talks to the outside world through
//! an mpsc channel. Player commands and expiring timers are drained by the
//! same `select!` loop, so a turn deadline firing is just another event in
//! the queue and can never interleave with a half-applied roll.
//!
//! ```text
//!  RoomHandle ──RoomCommand──→ ┌──────────────┐ ──ServerMessage──→ player A
//!                              │  RoomActor   │ ──ServerMessage──→ player B
//!  Deadlines ──TimerKey──────→ │ (MatchState) │
//!                              └──────────────┘ ──spawn──→ SettlementHook
//! ```

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use ludo_clock::Deadlines;
use ludo_engine::{
    Color, ConnectionState, MatchState, MatchStatus, RoomCode, SeatCount, TrackTopology,
    TurnScheduler, UserId,
};
use ludo_protocol::{CancelReason, MatchSnapshot, ServerMessage, encode_position};
use ludo_session::PlayerIdentity;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::{Dice, MatchConfig, MatchOutcome, RoomError, SettlementHook};

/// Channel for delivering events to one connected player.
pub type PlayerSender = mpsc::UnboundedSender<ServerMessage>;

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    /// Take a seat, or come back to one.
    Join {
        identity: PlayerIdentity,
        sender: PlayerSender,
        reply: Reply<Color>,
    },
    Roll {
        user_id: UserId,
        reply: Reply<()>,
    },
    Move {
        user_id: UserId,
        token: usize,
        reply: Reply<()>,
    },
    Leave {
        user_id: UserId,
        reply: Reply<()>,
    },
    /// The connection behind `sender` went away. Ignored if the user has
    /// since rejoined on another channel.
    Disconnect {
        user_id: UserId,
        sender: PlayerSender,
    },
    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },
    Shutdown,
}

impl std::fmt::Debug for RoomCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Join { .. } => "Join",
            Self::Roll { .. } => "Roll",
            Self::Move { .. } => "Move",
            Self::Leave { .. } => "Leave",
            Self::Disconnect { .. } => "Disconnect",
            Self::GetInfo { .. } => "GetInfo",
            Self::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

/// Room metadata for the catalog service. Not the board itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub room_code: RoomCode,
    pub status: MatchStatus,
    pub seats: SeatCount,
    /// Seats taken so far.
    pub seated: usize,
    /// Seated players with a live connection.
    pub connected: usize,
    pub current_turn: Option<Color>,
    pub winner: Option<Color>,
}

// ---------------------------------------------------------------------------
// RoomHandle
// ---------------------------------------------------------------------------

/// Handle to a running room actor.
///
/// Cheap to clone: it is an `mpsc::Sender` and the room code.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_code(&self) -> &RoomCode {
        &self.room_code
    }

    /// `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.room_code.clone())
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Seats the player (or reseats a returning one) and returns their
    /// color. The snapshot arrives on `sender` before this resolves.
    pub async fn join(
        &self,
        identity: PlayerIdentity,
        sender: PlayerSender,
    ) -> Result<Color, RoomError> {
        self.request(|reply| RoomCommand::Join {
            identity,
            sender,
            reply,
        })
        .await?
    }

    pub async fn roll(&self, user_id: UserId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Roll { user_id, reply })
            .await?
    }

    pub async fn move_token(&self, user_id: UserId, token: usize) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Move {
            user_id,
            token,
            reply,
        })
        .await?
    }

    pub async fn leave(&self, user_id: UserId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Leave { user_id, reply })
            .await?
    }

    /// Reports a dropped connection (fire-and-forget).
    pub async fn disconnect(&self, user_id: UserId, sender: PlayerSender) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Disconnect { user_id, sender })
            .await
            .map_err(|_| self.unavailable())
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::GetInfo { reply }).await
    }

    /// Cancels a running match and stops the actor without a retention
    /// window.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| self.unavailable())
    }
}

// ---------------------------------------------------------------------------
// RoomActor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKey {
    /// The current player's roll/move deadline.
    Turn,
    /// Reconnection window of a disconnected seat.
    Grace(Color),
    /// Teardown after the match reached a terminal status.
    Retention,
}

enum Event {
    Command(RoomCommand),
    Timer(TimerKey),
    Closed,
}

/// The internal room actor state. Runs inside a Tokio task.
pub(crate) struct RoomActor<S> {
    state: MatchState,
    config: MatchConfig,
    scheduler: TurnScheduler,
    /// Per-player outbound channels, for players currently connected.
    senders: HashMap<UserId, PlayerSender>,
    deadlines: Deadlines<TimerKey>,
    dice: Box<dyn Dice>,
    settlement: Arc<S>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl<S: SettlementHook> RoomActor<S> {
    fn new(
        room_code: RoomCode,
        config: MatchConfig,
        dice: Box<dyn Dice>,
        settlement: Arc<S>,
        channel_size: usize,
    ) -> (Self, RoomHandle) {
        let (tx, rx) = mpsc::channel(channel_size);
        let actor = Self {
            state: MatchState::new(room_code.clone(), config.seats),
            scheduler: TurnScheduler::new(
                TrackTopology::standard(),
                config.block_policy,
                config.turn_timeout,
            ),
            config,
            senders: HashMap::new(),
            deadlines: Deadlines::new(),
            dice,
            settlement,
            receiver: rx,
        };
        let handle = RoomHandle {
            room_code,
            sender: tx,
        };
        (actor, handle)
    }

    fn code(&self) -> RoomCode {
        self.state.room_code.clone()
    }

    /// Runs the actor loop until shutdown or the end of the retention
    /// window.
    async fn run(mut self) {
        info!(room_code = %self.state.room_code, seats = self.state.seats.seats(), "room actor started");

        loop {
            let event = tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => Event::Command(cmd),
                    None => Event::Closed,
                },
                key = self.deadlines.expired() => Event::Timer(key),
            };

            let now = Instant::now();
            let flow = match event {
                Event::Command(cmd) => self.handle_command(cmd, now),
                Event::Timer(key) => self.handle_timer(key, now),
                Event::Closed => ControlFlow::Break(()),
            };
            if flow.is_break() {
                break;
            }

            self.enforce_invariants(now);
            self.sync_turn_timer();
        }

        info!(room_code = %self.state.room_code, status = %self.state.status, "room actor stopped");
    }

    fn handle_command(&mut self, cmd: RoomCommand, now: Instant) -> ControlFlow<()> {
        match cmd {
            RoomCommand::Join {
                identity,
                sender,
                reply,
            } => {
                let user_id = identity.user_id.clone();
                let result = self.handle_join(identity, sender, now);
                self.log_rejection(&user_id, "join", &result);
                let _ = reply.send(result);
            }
            RoomCommand::Roll { user_id, reply } => {
                let result = self.handle_roll(&user_id, now);
                self.log_rejection(&user_id, "roll", &result);
                let _ = reply.send(result);
            }
            RoomCommand::Move {
                user_id,
                token,
                reply,
            } => {
                let result = self.handle_move(&user_id, token, now);
                self.log_rejection(&user_id, "move", &result);
                let _ = reply.send(result);
            }
            RoomCommand::Leave { user_id, reply } => {
                let result = self.handle_leave(&user_id, now);
                self.log_rejection(&user_id, "leave", &result);
                let _ = reply.send(result);
            }
            RoomCommand::Disconnect { user_id, sender } => {
                self.handle_disconnect(&user_id, &sender, now);
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown => {
                info!(room_code = %self.state.room_code, "room shutting down");
                if !self.state.status.is_terminal() {
                    self.cancel(CancelReason::Shutdown, now);
                }
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn handle_timer(&mut self, key: TimerKey, now: Instant) -> ControlFlow<()> {
        match key {
            TimerKey::Turn => {
                if let Some(passed) = self.scheduler.expire_turn(&mut self.state, now.into_std()) {
                    info!(
                        room_code = %self.state.room_code,
                        from = %passed.from,
                        to = %passed.to,
                        "turn timed out"
                    );
                    self.broadcast(ServerMessage::TurnPassed {
                        current_turn_color: passed.to,
                    });
                }
            }
            TimerKey::Grace(color) => self.grace_expired(color, now),
            TimerKey::Retention => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn log_rejection<T>(&self, user_id: &UserId, action: &str, result: &Result<T, RoomError>) {
        if let Err(e) = result {
            debug!(
                room_code = %self.state.room_code,
                %user_id,
                action,
                error = %e,
                "command rejected"
            );
        }
    }

    // -- joining and leaving ------------------------------------------------

    fn handle_join(
        &mut self,
        identity: PlayerIdentity,
        sender: PlayerSender,
        now: Instant,
    ) -> Result<Color, RoomError> {
        if self.state.status.is_terminal() {
            return Err(RoomError::NotFound(self.code()));
        }

        let user_id = identity.user_id;
        if let Some(player) = self.state.player(&user_id) {
            if player.left {
                return Err(RoomError::MatchAlreadyStarted(self.code()));
            }
            let color = player.color;
            self.rejoin(user_id, color, sender, now);
            return Ok(color);
        }

        if self.state.status == MatchStatus::InProgress {
            // Seats are never handed out again once play starts.
            return Err(if self.state.players.iter().any(|p| p.left) {
                RoomError::MatchAlreadyStarted(self.code())
            } else {
                RoomError::RoomFull(self.code())
            });
        }

        let color = self
            .state
            .seat(user_id.clone())
            .ok_or_else(|| RoomError::RoomFull(self.code()))?;
        info!(
            room_code = %self.state.room_code,
            %user_id,
            %color,
            display_name = identity.display_name.as_deref().unwrap_or(""),
            seated = self.state.players.len(),
            "player joined"
        );

        self.senders.insert(user_id.clone(), sender);
        self.send_to(&user_id, self.joined(color, now));
        self.broadcast_except(
            &user_id,
            ServerMessage::PlayerJoined {
                color,
                user_id: user_id.clone(),
            },
        );

        if self.state.is_full() {
            self.start(now);
        }
        Ok(color)
    }

    /// A seated user came back, possibly on a new connection.
    fn rejoin(&mut self, user_id: UserId, color: Color, sender: PlayerSender, now: Instant) {
        self.deadlines.disarm(TimerKey::Grace(color));
        let Some(player) = self.state.player_mut(&user_id) else {
            return;
        };
        let was_connected = player.is_connected();
        let was_abandoned = player.abandoned;
        player.connection = ConnectionState::Reconnecting;
        player.abandoned = false;

        self.senders.insert(user_id.clone(), sender);
        let delivered = self.send_to(&user_id, self.joined(color, now));
        if !delivered {
            self.mark_disconnected(&user_id, color, now);
            return;
        }

        if let Some(player) = self.state.player_mut(&user_id) {
            player.connection = ConnectionState::Connected;
        }
        info!(
            room_code = %self.state.room_code,
            %user_id,
            %color,
            was_abandoned,
            "player rejoined"
        );
        if !was_connected {
            self.broadcast_except(&user_id, ServerMessage::PlayerReconnected { color });
        }
    }

    fn handle_leave(&mut self, user_id: &UserId, now: Instant) -> Result<(), RoomError> {
        let color = self.seated_color(user_id)?;
        if let Some(player) = self.state.player_mut(user_id) {
            player.left = true;
            player.abandoned = true;
        }
        self.deadlines.disarm(TimerKey::Grace(color));
        info!(room_code = %self.state.room_code, %user_id, %color, "player left");

        self.broadcast(ServerMessage::PlayerLeft { color });
        self.senders.remove(user_id);

        match self.state.status {
            MatchStatus::Waiting => self.cancel(CancelReason::PlayerLeft, now),
            MatchStatus::InProgress => self.seat_abandoned(color, now),
            MatchStatus::Completed | MatchStatus::Cancelled => {}
        }
        Ok(())
    }

    fn handle_disconnect(&mut self, user_id: &UserId, sender: &PlayerSender, now: Instant) {
        let current = self
            .senders
            .get(user_id)
            .is_some_and(|s| s.same_channel(sender));
        if !current {
            debug!(room_code = %self.state.room_code, %user_id, "stale disconnect ignored");
            return;
        }

        let seated = self
            .state
            .player(user_id)
            .filter(|p| !p.left)
            .map(|p| p.color);
        match seated {
            Some(color) if !self.state.status.is_terminal() => {
                self.mark_disconnected(user_id, color, now);
            }
            _ => {
                self.senders.remove(user_id);
            }
        }
    }

    fn mark_disconnected(&mut self, user_id: &UserId, color: Color, now: Instant) {
        self.senders.remove(user_id);
        if let Some(player) = self.state.player_mut(user_id) {
            player.connection = ConnectionState::Disconnected {
                since: now.into_std(),
            };
        }
        info!(room_code = %self.state.room_code, %user_id, %color, "player disconnected");
        self.broadcast(ServerMessage::PlayerDisconnected { color });
        self.deadlines
            .arm(TimerKey::Grace(color), now + self.config.reconnect_grace);
    }

    fn grace_expired(&mut self, color: Color, now: Instant) {
        let Some(player) = self.state.player_by_color(color) else {
            return;
        };
        if !matches!(player.connection, ConnectionState::Disconnected { .. }) {
            return;
        }
        let user_id = player.user_id.clone();
        info!(room_code = %self.state.room_code, %user_id, %color, "reconnection grace expired");

        match self.state.status {
            MatchStatus::Waiting => self.cancel(CancelReason::ReconnectTimeout, now),
            MatchStatus::InProgress => {
                if let Some(player) = self.state.player_mut(&user_id) {
                    player.abandoned = true;
                }
                self.seat_abandoned(color, now);
            }
            MatchStatus::Completed | MatchStatus::Cancelled => {}
        }
    }

    /// A seat stopped taking part. Cancels when at most one seat is left,
    /// otherwise hands on the turn if it was theirs.
    fn seat_abandoned(&mut self, color: Color, now: Instant) {
        if self.state.active_seats() <= 1 {
            self.cancel(CancelReason::Abandoned, now);
            return;
        }
        if self.state.current_color() == Some(color) {
            if let Some(passed) = self.scheduler.pass_turn(&mut self.state, now.into_std()) {
                self.broadcast(ServerMessage::TurnPassed {
                    current_turn_color: passed.to,
                });
            }
        }
    }

    // -- play ---------------------------------------------------------------

    fn start(&mut self, now: Instant) {
        match self.scheduler.start(&mut self.state, now.into_std()) {
            Ok(first) => {
                info!(room_code = %self.state.room_code, first = %first, "match started");
                self.broadcast(ServerMessage::GameStarted {
                    turn_order: self.state.turn_order.clone(),
                    current_turn_color: first,
                });
            }
            Err(violation) => {
                warn!(room_code = %self.state.room_code, error = %violation, "match failed to start");
                self.cancel(CancelReason::Internal, now);
            }
        }
    }

    fn handle_roll(&mut self, user_id: &UserId, now: Instant) -> Result<(), RoomError> {
        let color = self.seated_color(user_id)?;
        self.scheduler.check_roll(&self.state, color)?;

        let value = self.dice.roll();
        let result = self
            .scheduler
            .roll(&mut self.state, color, value, now.into_std())?;
        debug!(
            room_code = %self.state.room_code,
            %color,
            value,
            outcome = ?result.outcome,
            "dice rolled"
        );
        self.broadcast(ServerMessage::DiceRolled {
            value,
            current_turn_color: result.current_color,
        });
        Ok(())
    }

    fn handle_move(&mut self, user_id: &UserId, token: usize, now: Instant) -> Result<(), RoomError> {
        let color = self.seated_color(user_id)?;
        let result = self
            .scheduler
            .move_token(&mut self.state, color, token, now.into_std())?;

        let outcome = result.outcome;
        self.broadcast(ServerMessage::TokenMoved {
            color,
            token_index: outcome.token,
            new_position: encode_position(color, outcome.to),
            captured_color: outcome.captured.map(|c| c.color),
            captured_token_index: outcome.captured.map(|c| c.token),
            current_turn_color: result.current_color,
        });

        if let Some(winner) = result.winner {
            self.complete(winner, now);
        }
        Ok(())
    }

    /// Color of a user who holds a seat and has not left.
    fn seated_color(&self, user_id: &UserId) -> Result<Color, RoomError> {
        if self.state.status.is_terminal() {
            return Err(RoomError::NotFound(self.code()));
        }
        self.state
            .player(user_id)
            .filter(|p| !p.left)
            .map(|p| p.color)
            .ok_or_else(|| RoomError::NotSeated(user_id.clone(), self.code()))
    }

    // -- endings ------------------------------------------------------------

    fn complete(&mut self, winner: Color, now: Instant) {
        info!(room_code = %self.state.room_code, winner = %winner, "match completed");
        self.broadcast(ServerMessage::GameEnded {
            winner_color: winner,
        });
        self.settle(winner);
        self.enter_retention(now);
    }

    fn cancel(&mut self, reason: CancelReason, now: Instant) {
        if let Err(violation) = self.state.transition(MatchStatus::Cancelled) {
            debug!(room_code = %self.state.room_code, error = %violation, "cancel ignored");
            return;
        }
        info!(room_code = %self.state.room_code, ?reason, "match cancelled");
        self.broadcast(ServerMessage::GameCancelled { reason });
        self.enter_retention(now);
    }

    fn enter_retention(&mut self, now: Instant) {
        self.deadlines.clear();
        self.deadlines
            .arm(TimerKey::Retention, now + self.config.retention);
    }

    /// Hands the result to the settlement hook on its own task.
    fn settle(&self, winner: Color) {
        let Some(player) = self.state.player_by_color(winner) else {
            error!(room_code = %self.state.room_code, %winner, "winner has no seat, not settling");
            return;
        };
        let outcome = MatchOutcome {
            room_code: self.code(),
            winner_color: winner,
            winner: player.user_id.clone(),
            players: self
                .state
                .turn_order
                .iter()
                .filter_map(|c| self.state.player_by_color(*c))
                .map(|p| (p.color, p.user_id.clone()))
                .collect(),
        };

        let hook = Arc::clone(&self.settlement);
        tokio::spawn(async move {
            let room_code = outcome.room_code.clone();
            match hook.settle(outcome).await {
                Ok(()) => info!(%room_code, "match settled"),
                Err(e) => error!(%room_code, error = %e, "settlement failed"),
            }
        });
    }

    /// Force-cancels the match if its state no longer adds up.
    fn enforce_invariants(&mut self, now: Instant) {
        let Err(violation) = self.state.check_invariants() else {
            return;
        };
        warn!(room_code = %self.state.room_code, error = %violation, "match state corrupted");
        if !self.state.status.is_terminal() {
            self.cancel(CancelReason::Internal, now);
        }
    }

    /// Mirrors the match's turn deadline into the timer set.
    fn sync_turn_timer(&mut self) {
        match self.state.turn_deadline {
            Some(at) => self.deadlines.arm(TimerKey::Turn, Instant::from_std(at)),
            None => {
                self.deadlines.disarm(TimerKey::Turn);
            }
        }
    }

    // -- output -------------------------------------------------------------

    fn joined(&self, color: Color, now: Instant) -> ServerMessage {
        ServerMessage::GameJoined {
            snapshot: MatchSnapshot::capture(&self.state, self.config.block_policy, now.into_std()),
            assigned_color: color,
        }
    }

    fn broadcast(&self, msg: ServerMessage) {
        for sender in self.senders.values() {
            let _ = sender.send(msg.clone());
        }
    }

    fn broadcast_except(&self, excluded: &UserId, msg: ServerMessage) {
        for (user_id, sender) in &self.senders {
            if user_id != excluded {
                let _ = sender.send(msg.clone());
            }
        }
    }

    /// Sends to one player. Returns `false` if they have no live channel.
    fn send_to(&self, user_id: &UserId, msg: ServerMessage) -> bool {
        self.senders
            .get(user_id)
            .is_some_and(|s| s.send(msg).is_ok())
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_code: self.code(),
            status: self.state.status,
            seats: self.state.seats,
            seated: self.state.players.len(),
            connected: self.state.players.iter().filter(|p| p.is_connected()).count(),
            current_turn: self.state.current_color(),
            winner: self.state.winner,
        }
    }
}

/// Spawns a room actor task. The returned `JoinHandle` resolves when the
/// actor stops.
pub(crate) fn spawn_room<S: SettlementHook>(
    room_code: RoomCode,
    config: MatchConfig,
    dice: Box<dyn Dice>,
    settlement: Arc<S>,
    channel_size: usize,
) -> (RoomHandle, JoinHandle<()>) {
    let (actor, handle) = RoomActor::new(room_code, config, dice, settlement, channel_size);
    let task = tokio::spawn(actor.run());
    (handle, task)
}
