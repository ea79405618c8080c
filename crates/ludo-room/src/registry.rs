//! Room registry: creates, tracks and reaps room actors by room code.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ludo_engine::{Color, RoomCode, UserId};
use ludo_session::PlayerIdentity;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::room::spawn_room;
use crate::{Dice, MatchConfig, PlayerSender, RandomDice, RoomError, RoomHandle, RoomInfo, SettlementHook};

/// Builds the die for each new room.
pub type DiceFactory = Arc<dyn Fn() -> Box<dyn Dice> + Send + Sync>;

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

struct RoomSlot {
    handle: RoomHandle,
    /// Distinguishes a room from a later one reusing its code.
    generation: u64,
}

#[derive(Default)]
struct Rooms {
    slots: HashMap<RoomCode, RoomSlot>,
    next_generation: u64,
}

/// Maps room codes to running room actors.
///
/// The map is only touched to create, look up or drop a room, always under
/// a short-lived lock that is never held across an await. Match state
/// itself lives inside the actors.
///
/// ```text
/// join(code) ──→ [no room] ──spawn──→ RoomActor ──retention over──→ reaped
///                [room]    ──────────↗
/// ```
pub struct RoomRegistry<S> {
    rooms: Arc<Mutex<Rooms>>,
    config: MatchConfig,
    settlement: Arc<S>,
    dice: DiceFactory,
}

impl<S: SettlementHook> RoomRegistry<S> {
    /// Creates an empty registry. `config` is validated once here and
    /// shared by every room.
    pub fn new(config: MatchConfig, settlement: S) -> Self {
        Self {
            rooms: Arc::default(),
            config: config.validated(),
            settlement: Arc::new(settlement),
            dice: Arc::new(|| Box::new(RandomDice::new()) as Box<dyn Dice>),
        }
    }

    /// Replaces the die given to rooms created from now on.
    pub fn with_dice<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Dice> + Send + Sync + 'static,
    {
        self.dice = Arc::new(factory);
        self
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Rooms> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        self.lock()
            .slots
            .get(code)
            .map(|slot| slot.handle.clone())
            .ok_or_else(|| RoomError::NotFound(code.clone()))
    }

    /// The live room for `code`, spawning one if there is none.
    fn get_or_spawn(&self, code: &RoomCode) -> RoomHandle {
        let mut rooms = self.lock();
        if let Some(slot) = rooms.slots.get(code) {
            if !slot.handle.is_closed() {
                return slot.handle.clone();
            }
        }

        let generation = rooms.next_generation;
        rooms.next_generation += 1;
        let (handle, task) = spawn_room(
            code.clone(),
            self.config,
            (self.dice)(),
            Arc::clone(&self.settlement),
            DEFAULT_CHANNEL_SIZE,
        );
        rooms.slots.insert(
            code.clone(),
            RoomSlot {
                handle: handle.clone(),
                generation,
            },
        );
        drop(rooms);

        info!(room_code = %code, generation, "room created");
        self.reap_when_done(code.clone(), generation, task);
        handle
    }

    /// Drops the slot once its actor stops, unless the code was reused.
    fn reap_when_done(&self, code: RoomCode, generation: u64, task: JoinHandle<()>) {
        let rooms = Arc::clone(&self.rooms);
        tokio::spawn(async move {
            if let Err(e) = task.await {
                error!(room_code = %code, error = %e, "room actor failed");
            }
            let mut guard = rooms.lock().unwrap_or_else(PoisonError::into_inner);
            if guard
                .slots
                .get(&code)
                .is_some_and(|slot| slot.generation == generation)
            {
                guard.slots.remove(&code);
                info!(room_code = %code, "room destroyed");
            }
        });
    }

    /// Joins `code`, creating the room on first use.
    ///
    /// The joiner's snapshot is already on `sender` when this returns.
    pub async fn join(
        &self,
        code: &RoomCode,
        identity: PlayerIdentity,
        sender: PlayerSender,
    ) -> Result<Color, RoomError> {
        self.get_or_spawn(code).join(identity, sender).await
    }

    pub async fn roll(&self, code: &RoomCode, user_id: &UserId) -> Result<(), RoomError> {
        self.get(code)?.roll(user_id.clone()).await
    }

    pub async fn move_token(
        &self,
        code: &RoomCode,
        user_id: &UserId,
        token: usize,
    ) -> Result<(), RoomError> {
        self.get(code)?.move_token(user_id.clone(), token).await
    }

    pub async fn leave(&self, code: &RoomCode, user_id: &UserId) -> Result<(), RoomError> {
        self.get(code)?.leave(user_id.clone()).await
    }

    /// Reports that the connection behind `sender` dropped. A room that is
    /// already gone is ignored.
    pub async fn disconnect(&self, code: &RoomCode, user_id: &UserId, sender: PlayerSender) {
        if let Ok(handle) = self.get(code) {
            let _ = handle.disconnect(user_id.clone(), sender).await;
        }
    }

    /// Status of one room, for the catalog service.
    pub async fn room_info(&self, code: &RoomCode) -> Result<RoomInfo, RoomError> {
        self.get(code)?.info().await
    }

    /// Codes of every room that has not been reaped yet.
    pub fn room_codes(&self) -> Vec<RoomCode> {
        self.lock().slots.keys().cloned().collect()
    }

    pub fn room_count(&self) -> usize {
        self.lock().slots.len()
    }

    /// Cancels every running match and stops all actors.
    pub async fn shutdown(&self) {
        let handles: Vec<RoomHandle> = self
            .lock()
            .slots
            .values()
            .map(|slot| slot.handle.clone())
            .collect();
        info!(rooms = handles.len(), "shutting down rooms");
        for handle in handles {
            let _ = handle.shutdown().await;
        }
    }
}
