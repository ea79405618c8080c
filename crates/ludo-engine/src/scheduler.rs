//! The turn state machine.
//!
//! ```text
//!               roll (legal move exists)
//! AwaitingRoll ─────────────────────────→ AwaitingMove
//!   ↑   │                                     │
//!   │   │ roll (no legal move / third six)    │ move
//!   │   ▼                                     ▼
//!   │ next color ◀──── ordinary move ──── applied
//!   │                                         │
//!   └──────── six, capture or finish ─────────┘
//! ```
//!
//! Every transition takes `now` explicitly so the scheduler stays a pure
//! function of its inputs; the room actor supplies the clock.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::{
    BlockPolicy, Color, InvariantViolation, MatchState, MatchStatus, MoveOutcome, MoveValidator,
    Position, RuleViolation, TrackTopology, TurnPhase,
};

/// Rolls of six in a row that forfeit the turn.
const MAX_CONSECUTIVE_SIXES: u8 = 3;

/// What happened to a roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollOutcome {
    /// At least one token can move; the same player must now pick one.
    AwaitingMove,
    /// No token can use the value; the turn passed automatically.
    NoLegalMove,
    /// Third six in a row; the roll was discarded and the turn passed.
    TripleSixForfeit,
}

/// Result of an accepted roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollResult {
    pub color: Color,
    pub value: u8,
    pub outcome: RollOutcome,
    /// Whose turn it is after the roll was applied.
    pub current_color: Color,
}

/// Result of an accepted move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveResult {
    pub outcome: MoveOutcome,
    /// Same player rolls again (six, capture or finished token).
    pub extra_turn: bool,
    /// Set when this move won the match.
    pub winner: Option<Color>,
    /// Whose turn it is now; `None` once the match is over.
    pub current_color: Option<Color>,
}

/// A turn that ended without a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnPassed {
    pub from: Color,
    pub to: Color,
}

/// Drives roll → move → next-turn sequencing for one board configuration.
#[derive(Debug, Clone, Copy)]
pub struct TurnScheduler {
    validator: MoveValidator<'static>,
    turn_timeout: Duration,
}

impl TurnScheduler {
    pub fn new(topology: &'static TrackTopology, policy: BlockPolicy, turn_timeout: Duration) -> Self {
        Self {
            validator: MoveValidator::new(topology, policy),
            turn_timeout,
        }
    }

    pub fn validator(&self) -> &MoveValidator<'static> {
        &self.validator
    }

    pub fn turn_timeout(&self) -> Duration {
        self.turn_timeout
    }

    /// Starts a full `Waiting` match: first color in turn order rolls first.
    pub fn start(&self, state: &mut MatchState, now: Instant) -> Result<Color, InvariantViolation> {
        if !state.is_full() {
            return Err(InvariantViolation(format!(
                "started with {} of {} seats",
                state.players.len(),
                state.seats.seats()
            )));
        }
        state.transition(MatchStatus::InProgress)?;
        state.current_turn_index = 0;
        state.consecutive_sixes = 0;
        self.begin_turn(state, now);
        state
            .current_color()
            .ok_or_else(|| InvariantViolation("empty turn order".into()))
    }

    /// Whether `color` may roll right now. Lets the caller skip drawing a
    /// die value for a roll that would be rejected anyway.
    pub fn check_roll(&self, state: &MatchState, color: Color) -> Result<Color, RuleViolation> {
        let current = self.check_turn(state, color)?;
        match state.phase {
            TurnPhase::AwaitingRoll => Ok(current),
            TurnPhase::AwaitingMove => Err(RuleViolation::RollAlreadyPending),
            TurnPhase::TurnComplete => Err(RuleViolation::MatchNotInProgress),
        }
    }

    /// Applies a roll of `value` by `color`.
    pub fn roll(
        &self,
        state: &mut MatchState,
        color: Color,
        value: u8,
        now: Instant,
    ) -> Result<RollResult, RuleViolation> {
        let current = self.check_roll(state, color)?;
        if !(1..=6).contains(&value) {
            return Err(RuleViolation::IllegalDestination);
        }

        if value == 6 {
            state.consecutive_sixes += 1;
        } else {
            state.consecutive_sixes = 0;
        }

        let outcome = if state.consecutive_sixes >= MAX_CONSECUTIVE_SIXES {
            debug!(room_code = %state.room_code, %color, "third six in a row, turn forfeited");
            self.advance(state, now);
            RollOutcome::TripleSixForfeit
        } else if !self.validator.has_legal_move(&state.board, current, value) {
            self.advance(state, now);
            RollOutcome::NoLegalMove
        } else {
            state.pending_dice = Some(value);
            state.phase = TurnPhase::AwaitingMove;
            state.turn_deadline = Some(now + self.turn_timeout);
            RollOutcome::AwaitingMove
        };

        Ok(RollResult {
            color,
            value,
            outcome,
            current_color: state.current_color().unwrap_or(color),
        })
    }

    /// Moves `color`'s `token` by the pending roll.
    pub fn move_token(
        &self,
        state: &mut MatchState,
        color: Color,
        token: usize,
        now: Instant,
    ) -> Result<MoveResult, RuleViolation> {
        self.check_turn(state, color)?;
        let dice = match (state.phase, state.pending_dice) {
            (TurnPhase::AwaitingMove, Some(dice)) => dice,
            _ => return Err(RuleViolation::NoPendingRoll),
        };

        let outcome = self.validator.check_move(&state.board, color, token, dice)?;

        state.board.place(color, token, outcome.to);
        if let Some(captured) = outcome.captured {
            state.board.place(captured.color, captured.token, Position::AtHome);
        }
        state.pending_dice = None;

        if state.board.all_finished(color) {
            state.winner = Some(color);
            // InProgress → Completed is always a legal edge.
            let _ = state.transition(MatchStatus::Completed);
            return Ok(MoveResult {
                outcome,
                extra_turn: false,
                winner: Some(color),
                current_color: None,
            });
        }

        let extra_turn = dice == 6 || outcome.captured.is_some() || outcome.to.is_finished();
        if extra_turn {
            self.begin_turn(state, now);
        } else {
            self.advance(state, now);
        }

        Ok(MoveResult {
            outcome,
            extra_turn,
            winner: None,
            current_color: state.current_color(),
        })
    }

    /// Passes the turn if its deadline has elapsed. A roll is never made
    /// on the idle player's behalf.
    pub fn expire_turn(&self, state: &mut MatchState, now: Instant) -> Option<TurnPassed> {
        let deadline = state.turn_deadline?;
        if now < deadline {
            return None;
        }
        self.pass_turn(state, now)
    }

    /// Unconditionally ends the current turn and hands it on.
    pub fn pass_turn(&self, state: &mut MatchState, now: Instant) -> Option<TurnPassed> {
        let from = state.current_color()?;
        self.advance(state, now);
        let to = state.current_color()?;
        Some(TurnPassed { from, to })
    }

    /// Whether the turn pointer should jump over `color`.
    pub fn is_skipped(&self, state: &MatchState, color: Color) -> bool {
        state.board.all_finished(color)
            || state.player_by_color(color).is_none_or(|p| p.abandoned)
    }

    fn check_turn(&self, state: &MatchState, color: Color) -> Result<Color, RuleViolation> {
        let current = state.current_color().ok_or(RuleViolation::MatchNotInProgress)?;
        if current != color {
            return Err(RuleViolation::NotYourTurn(color));
        }
        Ok(current)
    }

    /// Hands the turn to the next color that is neither finished nor
    /// abandoned. If every other color is skipped the turn stays put.
    fn advance(&self, state: &mut MatchState, now: Instant) {
        state.pending_dice = None;
        state.consecutive_sixes = 0;
        let n = state.turn_order.len();
        for step in 1..=n {
            let idx = (state.current_turn_index + step) % n;
            if !self.is_skipped(state, state.turn_order[idx]) {
                state.current_turn_index = idx;
                break;
            }
        }
        self.begin_turn(state, now);
    }

    fn begin_turn(&self, state: &mut MatchState, now: Instant) {
        state.phase = TurnPhase::AwaitingRoll;
        state.turn_deadline = Some(now + self.turn_timeout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RoomCode, SeatCount, UserId};

    const TIMEOUT: Duration = Duration::from_secs(30);

    fn scheduler() -> TurnScheduler {
        TurnScheduler::new(TrackTopology::standard(), BlockPolicy::Open, TIMEOUT)
    }

    fn started(seats: SeatCount) -> (TurnScheduler, MatchState, Instant) {
        let sched = scheduler();
        let mut state = MatchState::new(RoomCode::new("T"), seats);
        for i in 0..seats.seats() {
            state.seat(UserId::new(format!("u{i}")));
        }
        let now = Instant::now();
        sched.start(&mut state, now).unwrap();
        (sched, state, now)
    }

    #[test]
    fn test_start_gives_first_color_awaiting_roll() {
        let (_, state, now) = started(SeatCount::Two);
        assert_eq!(state.status, MatchStatus::InProgress);
        assert_eq!(state.current_color(), Some(Color::Red));
        assert_eq!(state.phase, TurnPhase::AwaitingRoll);
        assert_eq!(state.turn_deadline, Some(now + TIMEOUT));
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn test_start_requires_full_table() {
        let sched = scheduler();
        let mut state = MatchState::new(RoomCode::new("T"), SeatCount::Two);
        state.seat(UserId::new("a"));
        assert!(sched.start(&mut state, Instant::now()).is_err());
        assert_eq!(state.status, MatchStatus::Waiting);
    }

    #[test]
    fn test_six_then_enter_grants_extra_turn() {
        let (sched, mut state, now) = started(SeatCount::Two);

        let roll = sched.roll(&mut state, Color::Red, 6, now).unwrap();
        assert_eq!(roll.outcome, RollOutcome::AwaitingMove);
        assert_eq!(roll.current_color, Color::Red);
        assert_eq!(state.pending_dice, Some(6));

        let mv = sched.move_token(&mut state, Color::Red, 0, now).unwrap();
        assert_eq!(mv.outcome.to, Position::OnRing(1));
        assert!(mv.extra_turn);
        assert_eq!(mv.current_color, Some(Color::Red));
        assert_eq!(state.phase, TurnPhase::AwaitingRoll);
        assert_eq!(state.pending_dice, None);
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn test_no_legal_move_auto_advances() {
        let (sched, mut state, now) = started(SeatCount::Two);
        let roll = sched.roll(&mut state, Color::Red, 3, now).unwrap();
        assert_eq!(roll.outcome, RollOutcome::NoLegalMove);
        assert_eq!(roll.current_color, Color::Green);
        assert_eq!(state.pending_dice, None);
        assert_eq!(state.phase, TurnPhase::AwaitingRoll);
    }

    #[test]
    fn test_ordinary_move_advances_turn() {
        let (sched, mut state, now) = started(SeatCount::Two);
        state.board.place(Color::Red, 0, Position::OnRing(5));
        sched.roll(&mut state, Color::Red, 3, now).unwrap();
        let mv = sched.move_token(&mut state, Color::Red, 0, now).unwrap();
        assert!(!mv.extra_turn);
        assert_eq!(mv.current_color, Some(Color::Green));
        assert_eq!(state.board.position(Color::Red, 0), Some(Position::OnRing(8)));
    }

    #[test]
    fn test_capture_grants_extra_turn() {
        let (sched, mut state, now) = started(SeatCount::Two);
        state.board.place(Color::Red, 0, Position::OnRing(5));
        state.board.place(Color::Green, 2, Position::OnRing(8));
        sched.roll(&mut state, Color::Red, 3, now).unwrap();

        let mv = sched.move_token(&mut state, Color::Red, 0, now).unwrap();
        assert!(mv.extra_turn);
        assert_eq!(mv.outcome.captured.map(|c| c.color), Some(Color::Green));
        assert_eq!(state.board.position(Color::Green, 2), Some(Position::AtHome));
        assert_eq!(state.current_color(), Some(Color::Red));
    }

    #[test]
    fn test_finishing_token_grants_extra_turn() {
        let (sched, mut state, now) = started(SeatCount::Two);
        state.board.place(Color::Red, 0, Position::OnHomeStretch(3));
        state.board.place(Color::Red, 1, Position::OnRing(20));
        sched.roll(&mut state, Color::Red, 3, now).unwrap();

        let mv = sched.move_token(&mut state, Color::Red, 0, now).unwrap();
        assert_eq!(mv.outcome.to, Position::Finished);
        assert!(mv.extra_turn);
        assert_eq!(state.current_color(), Some(Color::Red));
    }

    #[test]
    fn test_triple_six_forfeits_turn() {
        let (sched, mut state, now) = started(SeatCount::Two);

        sched.roll(&mut state, Color::Red, 6, now).unwrap();
        sched.move_token(&mut state, Color::Red, 0, now).unwrap();
        sched.roll(&mut state, Color::Red, 6, now).unwrap();
        sched.move_token(&mut state, Color::Red, 0, now).unwrap();
        let before = state.board.clone();

        let roll = sched.roll(&mut state, Color::Red, 6, now).unwrap();
        assert_eq!(roll.outcome, RollOutcome::TripleSixForfeit);
        assert_eq!(roll.current_color, Color::Green);
        assert_eq!(state.board, before);
        assert_eq!(state.pending_dice, None);
        assert_eq!(state.consecutive_sixes, 0);
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn test_non_six_resets_six_streak() {
        let (sched, mut state, now) = started(SeatCount::Two);
        state.board.place(Color::Red, 0, Position::OnRing(10));
        state.board.place(Color::Green, 0, Position::OnRing(14));

        sched.roll(&mut state, Color::Red, 6, now).unwrap();
        sched.move_token(&mut state, Color::Red, 0, now).unwrap();
        assert_eq!(state.consecutive_sixes, 1);
        sched.roll(&mut state, Color::Red, 4, now).unwrap();
        assert_eq!(state.consecutive_sixes, 0);
    }

    #[test]
    fn test_out_of_turn_commands_rejected_without_mutation() {
        let (sched, mut state, now) = started(SeatCount::Two);
        let before = state.clone();

        assert_eq!(
            sched.roll(&mut state, Color::Green, 6, now),
            Err(RuleViolation::NotYourTurn(Color::Green))
        );
        assert_eq!(
            sched.move_token(&mut state, Color::Green, 0, now),
            Err(RuleViolation::NotYourTurn(Color::Green))
        );
        assert_eq!(state.board, before.board);
        assert_eq!(state.phase, before.phase);
        assert_eq!(state.pending_dice, before.pending_dice);
    }

    #[test]
    fn test_move_without_roll_and_double_roll_rejected() {
        let (sched, mut state, now) = started(SeatCount::Two);
        assert_eq!(
            sched.move_token(&mut state, Color::Red, 0, now),
            Err(RuleViolation::NoPendingRoll)
        );

        sched.roll(&mut state, Color::Red, 6, now).unwrap();
        assert_eq!(
            sched.roll(&mut state, Color::Red, 6, now),
            Err(RuleViolation::RollAlreadyPending)
        );
        assert_eq!(state.pending_dice, Some(6));
        assert_eq!(state.consecutive_sixes, 1);
    }

    #[test]
    fn test_illegal_token_choice_keeps_pending_roll() {
        let (sched, mut state, now) = started(SeatCount::Two);
        state.board.place(Color::Red, 0, Position::OnRing(10));
        sched.roll(&mut state, Color::Red, 2, now).unwrap();

        assert_eq!(
            sched.move_token(&mut state, Color::Red, 1, now),
            Err(RuleViolation::IllegalDestination)
        );
        assert_eq!(
            sched.move_token(&mut state, Color::Red, 7, now),
            Err(RuleViolation::NoSuchToken(7))
        );
        assert_eq!(state.pending_dice, Some(2));
        assert!(sched.move_token(&mut state, Color::Red, 0, now).is_ok());
    }

    #[test]
    fn test_winning_move_completes_match() {
        let (sched, mut state, now) = started(SeatCount::Two);
        for token in 0..3 {
            state.board.place(Color::Red, token, Position::Finished);
        }
        state.board.place(Color::Red, 3, Position::OnHomeStretch(4));

        sched.roll(&mut state, Color::Red, 2, now).unwrap();
        let mv = sched.move_token(&mut state, Color::Red, 3, now).unwrap();

        assert_eq!(mv.winner, Some(Color::Red));
        assert_eq!(mv.current_color, None);
        assert_eq!(state.status, MatchStatus::Completed);
        assert_eq!(state.turn_deadline, None);
        assert!(state.check_invariants().is_ok());

        assert_eq!(
            sched.roll(&mut state, Color::Green, 6, now),
            Err(RuleViolation::MatchNotInProgress)
        );
    }

    #[test]
    fn test_expire_turn_respects_deadline() {
        let (sched, mut state, now) = started(SeatCount::Two);
        assert_eq!(sched.expire_turn(&mut state, now + Duration::from_secs(5)), None);

        let late = now + TIMEOUT;
        let passed = sched.expire_turn(&mut state, late).unwrap();
        assert_eq!(passed, TurnPassed { from: Color::Red, to: Color::Green });
        assert_eq!(state.turn_deadline, Some(late + TIMEOUT));
    }

    #[test]
    fn test_expire_turn_discards_pending_roll() {
        let (sched, mut state, now) = started(SeatCount::Two);
        sched.roll(&mut state, Color::Red, 6, now).unwrap();

        let passed = sched.expire_turn(&mut state, now + TIMEOUT).unwrap();
        assert_eq!(passed.to, Color::Green);
        assert_eq!(state.pending_dice, None);
        assert_eq!(state.phase, TurnPhase::AwaitingRoll);
        assert!(state.board.tokens(Color::Red).iter().all(|p| p.is_home()));
    }

    #[test]
    fn test_advance_skips_abandoned_seats() {
        let (sched, mut state, now) = started(SeatCount::Four);
        state.players[1].abandoned = true; // blue

        sched.roll(&mut state, Color::Red, 2, now).unwrap();
        assert_eq!(state.current_color(), Some(Color::Green));
    }

    #[test]
    fn test_advance_stays_when_everyone_else_skipped() {
        let (sched, mut state, now) = started(SeatCount::Two);
        state.players[1].abandoned = true;
        let passed = sched.pass_turn(&mut state, now).unwrap();
        assert_eq!(passed.to, Color::Red);
    }
}
