//! Stateful application layer: game controller, move oracles, clock.

pub mod clock;
pub mod engine;
pub mod game;

pub use clock::{ClockEvent, ClockSignal, GameClock};
pub use engine::{HttpOracle, MoveOracle, UciOracle};
pub use game::{GameModel, GamePhase, GameSession, Notification};
