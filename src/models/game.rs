//! Game controller - owns the session and drives the turn sequence.
//!
//! Turn flow: user move, terminal checks, oracle move, terminal checks, back
//! to the user. A draw never ends the game: it triggers piece insertion
//! instead. Checkmate is detected and announced but play is not stopped.
//!
//! The only suspension point is the oracle call. Every operation takes
//! `&mut self`, so a second user move cannot arrive while a reply is pending.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::domain::history::{CapturePool, MoveHistory, Mover, Placement};
use crate::domain::insertion::{Infeasible, Insertion, InsertionEngine};
use crate::domain::rules::{AppliedMove, DrawReason, MoveRequest, Rules};
use crate::domain::PieceColor;
use crate::error::{GameError, RulesError};
use crate::models::clock::{ClockEvent, ClockSignal, GameClock};
use crate::models::engine::MoveOracle;

/// Draw checks after insertion before giving up on the current position
const MAX_DRAW_ROUNDS: usize = 3;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GamePhase {
    Idle,
    AwaitingUserMove,
    ApplyingUserMove,
    CheckingTerminal,
    /// Waiting on the oracle, or stalled after it failed to answer
    AwaitingOracleMove,
    ApplyingOracleMove,
    Resetting,
    ReorientingColors,
}

/// Things the presentation layer should tell the user about
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    Check(PieceColor),
    Checkmate { winner: PieceColor },
    DrawDetected(DrawReason),
    PiecesInserted { white: Placement, black: Placement },
    InsertionInfeasible(Infeasible),
    OracleUnavailable,
    IllegalMove(String),
    TimeExpired(PieceColor),
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Check(color) => write!(f, "{} is in check", color),
            Notification::Checkmate { winner } => write!(f, "checkmate, {} wins", winner),
            Notification::DrawDetected(reason) => write!(f, "draw by {} detected", reason),
            Notification::PiecesInserted { white, black } => write!(
                f,
                "pieces inserted: white {} at {}, black {} at {}",
                white.kind, white.square, black.kind, black.square
            ),
            Notification::InsertionInfeasible(reason) => write!(f, "no pieces inserted: {}", reason),
            Notification::OracleUnavailable => f.write_str("the opponent did not answer"),
            Notification::IllegalMove(text) => write!(f, "illegal move: {}", text),
            Notification::TimeExpired(color) => write!(f, "{} ran out of time", color),
        }
    }
}

/// Everything that is reset together
#[derive(Clone, Debug)]
pub struct GameSession {
    rules: Rules,
    history: MoveHistory,
    user_color: PieceColor,
    clock: GameClock,
}

impl GameSession {
    pub fn new(user_color: PieceColor, clock: GameClock) -> Self {
        Self {
            rules: Rules::new(),
            history: MoveHistory::new(),
            user_color,
            clock,
        }
    }

    /// Session starting from an arbitrary position
    pub fn from_fen(fen: &str, user_color: PieceColor, clock: GameClock) -> Result<Self, RulesError> {
        Ok(Self {
            rules: Rules::from_fen(fen)?,
            ..Self::new(user_color, clock)
        })
    }

    fn restart(&mut self) {
        self.rules.reset();
        self.history.clear();
        self.clock.reset();
    }
}

pub struct GameModel {
    session: GameSession,
    phase: GamePhase,
    oracle: Arc<dyn MoveOracle>,
    insertion: InsertionEngine,
    rng: Box<dyn RngCore + Send>,
    /// Search depth passed to the oracle; `None` leaves it to the oracle
    depth: Option<u8>,
    /// Winner of the current checkmate, if the side to move is mated
    checkmate: Option<PieceColor>,
    notifications: Vec<Notification>,
    clock_signal: ClockSignal,
}

impl GameModel {
    pub fn new(oracle: Arc<dyn MoveOracle>, user_color: PieceColor) -> Self {
        Self {
            session: GameSession::new(user_color, GameClock::default()),
            phase: GamePhase::Idle,
            oracle,
            insertion: InsertionEngine::default(),
            rng: Box::new(StdRng::from_os_rng()),
            depth: None,
            checkmate: None,
            notifications: Vec::new(),
            clock_signal: ClockSignal::new(),
        }
    }

    /// Use a specific random source for insertions
    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn with_insertion_engine(mut self, engine: InsertionEngine) -> Self {
        self.insertion = engine;
        self
    }

    pub fn with_depth(mut self, depth: u8) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_clock(mut self, clock: GameClock) -> Self {
        self.session.clock = clock;
        self
    }

    /// Start from a position other than the initial one
    pub fn with_position(mut self, fen: &str) -> Result<Self, RulesError> {
        let session = GameSession::from_fen(fen, self.session.user_color, self.session.clock.clone())?;
        self.session = session;
        Ok(self)
    }

    // Accessors

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn fen(&self) -> String {
        self.session.rules.fen()
    }

    pub fn rules(&self) -> &Rules {
        &self.session.rules
    }

    pub fn turn(&self) -> PieceColor {
        self.session.rules.turn()
    }

    pub fn user_color(&self) -> PieceColor {
        self.session.user_color
    }

    pub fn is_user_turn(&self) -> bool {
        self.turn() == self.session.user_color
    }

    pub fn history(&self) -> &MoveHistory {
        &self.session.history
    }

    pub fn capture_pool(&self) -> CapturePool {
        self.session.history.capture_pool()
    }

    pub fn checkmate_winner(&self) -> Option<PieceColor> {
        self.checkmate
    }

    pub fn clock(&self) -> &GameClock {
        &self.session.clock
    }

    pub fn subscribe_clock(&self) -> broadcast::Receiver<ClockEvent> {
        self.clock_signal.subscribe()
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    // Operations

    /// Begin play. If the oracle holds the side to move it answers first.
    pub async fn start(&mut self) {
        info!(user = %self.session.user_color, fen = %self.fen(), "game started");
        self.clock_signal.emit(ClockEvent::Reset {
            initial: self.session.clock.initial(),
        });
        self.check_terminal();
        self.continue_play().await;
    }

    /// Play a move for the user, then let the oracle answer.
    ///
    /// Nothing changes when the move is rejected.
    pub async fn play_user_move(&mut self, text: &str) -> Result<AppliedMove, GameError> {
        if self.phase != GamePhase::AwaitingUserMove || !self.is_user_turn() {
            return Err(GameError::NotYourTurn);
        }

        let applied = match MoveRequest::parse(text).and_then(|request| {
            self.phase = GamePhase::ApplyingUserMove;
            self.session.rules.apply_move(&request)
        }) {
            Ok(applied) => applied,
            Err(e) => {
                debug!(move_text = text, error = %e, "user move rejected");
                self.phase = GamePhase::AwaitingUserMove;
                self.notify(Notification::IllegalMove(text.trim().to_string()));
                return Err(e.into());
            }
        };

        debug!(mv = %applied.notation, san = %applied.san, "user moved");
        self.session.history.push_move(Mover::User, applied.clone());
        self.check_terminal();
        self.continue_play().await;
        Ok(applied)
    }

    /// Ask the oracle for its move and apply it. Returns whether a move was
    /// played; on failure the turn stalls until this is called again.
    pub async fn request_oracle_move(&mut self) -> bool {
        if self.is_user_turn() || self.phase == GamePhase::Idle {
            return false;
        }
        if !self.session.rules.has_legal_moves() {
            debug!("oracle has no legal move to play");
            return false;
        }

        self.phase = GamePhase::AwaitingOracleMove;
        let fen = self.fen();
        let started = Instant::now();
        let reply = self.oracle.suggest_move(&fen, self.depth).await;
        // The oracle's clock runs while it thinks
        self.tick_clock(started.elapsed());
        let reply = match reply {
            Ok(Some(reply)) => reply,
            Ok(None) => {
                warn!(%fen, "oracle returned no move");
                self.notify(Notification::OracleUnavailable);
                return false;
            }
            Err(e) => {
                warn!(%fen, error = %e, "oracle request failed");
                self.notify(Notification::OracleUnavailable);
                return false;
            }
        };

        self.phase = GamePhase::ApplyingOracleMove;
        let applied = match MoveRequest::parse(&reply).and_then(|r| self.session.rules.apply_move(&r)) {
            Ok(applied) => applied,
            Err(e) => {
                warn!(%fen, %reply, error = %e, "oracle suggested an unplayable move");
                self.phase = GamePhase::AwaitingOracleMove;
                self.notify(Notification::OracleUnavailable);
                return false;
            }
        };

        debug!(mv = %applied.notation, san = %applied.san, "oracle moved");
        self.session.history.push_move(Mover::Oracle, applied);
        self.check_terminal();
        self.settle();
        true
    }

    /// Insert captured pieces on demand, without waiting for a draw
    pub fn trigger_insertion(&mut self) -> Result<Insertion, Infeasible> {
        let result = self.insert_pieces();
        if result.is_ok() {
            self.check_terminal();
            self.settle();
        }
        result
    }

    /// New game from the starting position, same user color
    pub async fn reset(&mut self) {
        self.phase = GamePhase::Resetting;
        self.restart();
        info!(user = %self.session.user_color, "game reset");
        self.continue_play().await;
    }

    /// Switch the user's color and start over. Playing Black makes the
    /// oracle open the game.
    pub async fn change_side(&mut self, color: PieceColor) {
        self.phase = GamePhase::ReorientingColors;
        self.session.user_color = color;
        self.restart();
        info!(user = %color, "sides changed");
        self.continue_play().await;
    }

    /// Advance the running clock. Returns the side whose time just ran out.
    pub fn tick_clock(&mut self, elapsed: Duration) -> Option<PieceColor> {
        let expired = self.session.clock.tick(elapsed)?;
        info!(color = %expired, "time expired");
        self.notify(Notification::TimeExpired(expired));
        Some(expired)
    }

    // Internals

    fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    fn restart(&mut self) {
        self.session.restart();
        self.checkmate = None;
        self.notifications.clear();
        self.clock_signal.emit(ClockEvent::Reset {
            initial: self.session.clock.initial(),
        });
    }

    /// Hand the turn to whoever is to move, consulting the oracle if needed
    async fn continue_play(&mut self) {
        self.settle();
        if self.phase == GamePhase::AwaitingOracleMove && self.checkmate.is_none() {
            self.request_oracle_move().await;
        }
    }

    /// Set the waiting phase and the running clock for the side to move
    fn settle(&mut self) {
        let turn = self.turn();
        self.phase = if turn == self.session.user_color {
            GamePhase::AwaitingUserMove
        } else {
            GamePhase::AwaitingOracleMove
        };

        if self.checkmate.is_some() || !self.session.rules.has_legal_moves() {
            self.session.clock.pause();
        } else if self.session.clock.running() != Some(turn) {
            self.session.clock.switch_to(turn);
            self.clock_signal.emit(ClockEvent::Switched(turn));
        }
    }

    /// Check, then draws (resolved by insertion), then checkmate
    fn check_terminal(&mut self) {
        self.phase = GamePhase::CheckingTerminal;

        if let Some(color) = self.session.rules.in_check() {
            if !self.session.rules.is_checkmate() {
                self.notify(Notification::Check(color));
            }
        }

        for _ in 0..MAX_DRAW_ROUNDS {
            let Some(reason) = self.session.rules.draw_reason() else {
                break;
            };
            info!(%reason, fen = %self.fen(), "draw detected");
            self.notify(Notification::DrawDetected(reason));
            if self.insert_pieces().is_err() {
                break;
            }
            if let Some(color) = self.session.rules.in_check() {
                self.notify(Notification::Check(color));
            }
        }

        self.checkmate = if self.session.rules.is_checkmate() {
            let winner = self.turn().opposite();
            info!(%winner, "checkmate");
            self.notify(Notification::Checkmate { winner });
            Some(winner)
        } else {
            None
        };
    }

    /// Run the insertion engine on the current position and install the
    /// result
    fn insert_pieces(&mut self) -> Result<Insertion, Infeasible> {
        let pool = self.session.history.capture_pool();
        let result = self
            .insertion
            .insert(self.session.rules.position(), &pool, &mut self.rng);

        match result {
            Ok(insertion) => {
                self.session.rules.replace_position(insertion.position.clone());
                self.session.history.push_insertion(insertion.white);
                self.session.history.push_insertion(insertion.black);
                info!(
                    white = %format!("{} at {}", insertion.white.kind, insertion.white.square),
                    black = %format!("{} at {}", insertion.black.kind, insertion.black.square),
                    attempts = insertion.attempts,
                    "pieces inserted"
                );
                self.notify(Notification::PiecesInserted {
                    white: insertion.white,
                    black: insertion.black,
                });
                Ok(insertion)
            }
            Err(reason) => {
                warn!(%reason, "piece insertion infeasible");
                self.notify(Notification::InsertionInfeasible(reason.clone()));
                Err(reason)
            }
        }
    }
}
