//! Chess domain layer: no I/O, no async.

pub mod chess;
pub mod history;
pub mod insertion;
pub mod oracle;
pub mod rules;
pub mod uci;

pub use chess::{Piece, PieceColor, PieceKind, shakmaty_to_piece, to_square};
pub use history::{CapturePool, HistoryEntry, MoveHistory, Mover, Placement};
pub use insertion::{Infeasible, Insertion, InsertionCandidate, InsertionEngine};
pub use rules::{AppliedMove, DrawReason, LegalMove, MoveRequest, Rules};
