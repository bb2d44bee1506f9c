//! Rules adapter over shakmaty.
//!
//! Everything that needs to know chess legality goes through [`Rules`]:
//! legal move generation, move application with capture metadata,
//! check/checkmate/draw detection and FEN serialization. Nothing in this crate
//! re-implements move generation.

use std::collections::HashMap;
use std::fmt;

use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::{CastlingMode, Chess, EnPassantMode, File, Move, Position, Role, Square};

use crate::domain::chess::{Piece, PieceColor, PieceKind, shakmaty_to_piece};
use crate::error::RulesError;

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Halfmove clock value at which the fifty-move rule applies
const FIFTY_MOVE_HALFMOVES: u32 = 100;

/// A move as requested in coordinate notation (`e2e4`, `e7e8q`)
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MoveRequest {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
}

impl MoveRequest {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    /// Parse coordinate notation. Castling is written as the king's move (`e1g1`).
    pub fn parse(text: &str) -> Result<Self, RulesError> {
        let text = text.trim();
        let invalid = || RulesError::InvalidNotation(text.to_string());

        if !text.is_ascii() || !(4..=5).contains(&text.len()) {
            return Err(invalid());
        }

        let from: Square = text[0..2].parse().map_err(|_| invalid())?;
        let to: Square = text[2..4].parse().map_err(|_| invalid())?;
        let promotion = match text[4..].chars().next() {
            None => None,
            Some(c) => match Role::from_char(c.to_ascii_lowercase()) {
                Some(role) if !matches!(role, Role::Pawn | Role::King) => Some(role.into()),
                _ => return Err(invalid()),
            },
        };

        Ok(Self {
            from,
            to,
            promotion,
        })
    }
}

impl fmt::Display for MoveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(kind) = self.promotion {
            write!(f, "{}", Role::from(kind).char())?;
        }
        Ok(())
    }
}

/// A legal move in the current position, described by its coordinates
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LegalMove {
    pub request: MoveRequest,
    pub kind: PieceKind,
    pub capture: Option<PieceKind>,
}

/// The result of applying a move: what moved, what it took, what it did
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedMove {
    /// Coordinate notation of the move as played
    pub notation: String,
    pub san: String,
    pub color: PieceColor,
    pub kind: PieceKind,
    /// Kind of the piece removed from the board (en passant counts as a pawn)
    pub captured: Option<PieceKind>,
    pub promotion: Option<PieceKind>,
    pub gives_check: bool,
}

/// Why the position is drawn
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DrawReason {
    Stalemate,
    InsufficientMaterial,
    FiftyMoveRule,
    ThreefoldRepetition,
}

impl fmt::Display for DrawReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DrawReason::Stalemate => "stalemate",
            DrawReason::InsufficientMaterial => "insufficient material",
            DrawReason::FiftyMoveRule => "fifty-move rule",
            DrawReason::ThreefoldRepetition => "threefold repetition",
        };
        f.write_str(text)
    }
}

/// Serialize a position to FEN
pub fn fen_of(position: &Chess) -> String {
    Fen::from_position(position, EnPassantMode::Legal).to_string()
}

/// Parse and legality-check position text
pub fn validate(fen: &str) -> Result<Chess, RulesError> {
    let invalid = |reason: String| RulesError::InvalidPosition {
        fen: fen.to_string(),
        reason,
    };
    let parsed: Fen = fen.trim().parse().map_err(|e| invalid(format!("{}", e)))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|e| invalid(e.to_string()))
}

/// Draws that can be read off a single position, without game history
pub fn static_draw_reason(position: &Chess) -> Option<DrawReason> {
    if position.is_checkmate() {
        None
    } else if position.is_stalemate() {
        Some(DrawReason::Stalemate)
    } else if position.is_insufficient_material() {
        Some(DrawReason::InsufficientMaterial)
    } else {
        None
    }
}

/// Repetition key: placement, side to move, castling rights and en passant
fn position_key(position: &Chess) -> String {
    fen_of(position)
        .split_whitespace()
        .take(4)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Origin and destination of a move as a player would drag it
fn move_coords(m: &Move) -> Option<(Square, Square)> {
    match m {
        Move::Normal { from, to, .. } => Some((*from, *to)),
        Move::EnPassant { from, to, .. } => Some((*from, *to)),
        Move::Castle { king, rook } => {
            // King lands on the g- or c-file
            let king_dest = if rook.file() == File::H {
                Square::from_coords(File::G, rook.rank())
            } else {
                Square::from_coords(File::C, rook.rank())
            };
            Some((*king, king_dest))
        }
        Move::Put { .. } => None,
    }
}

/// A chess position plus the bookkeeping needed for repetition draws
#[derive(Clone, Debug)]
pub struct Rules {
    position: Chess,
    repetitions: HashMap<String, u32>,
}

impl Rules {
    pub fn new() -> Self {
        Self::with_position(Chess::default())
    }

    pub fn from_fen(fen: &str) -> Result<Self, RulesError> {
        Ok(Self::with_position(validate(fen)?))
    }

    fn with_position(position: Chess) -> Self {
        let mut rules = Self {
            position,
            repetitions: HashMap::new(),
        };
        rules.record_repetition();
        rules
    }

    pub fn position(&self) -> &Chess {
        &self.position
    }

    pub fn turn(&self) -> PieceColor {
        self.position.turn().into()
    }

    /// Legal moves, optionally only those starting on `from`
    pub fn legal_moves(&self, from: Option<Square>) -> Vec<LegalMove> {
        self.position
            .legal_moves()
            .iter()
            .filter_map(|m| {
                let (origin, dest) = move_coords(m)?;
                if from.is_some_and(|sq| sq != origin) {
                    return None;
                }
                Some(LegalMove {
                    request: MoveRequest {
                        from: origin,
                        to: dest,
                        promotion: m.promotion().map(PieceKind::from),
                    },
                    kind: m.role().into(),
                    capture: m.capture().map(PieceKind::from),
                })
            })
            .collect()
    }

    pub fn has_legal_moves(&self) -> bool {
        !self.position.legal_moves().is_empty()
    }

    /// Find the legal move matching a request. A promotion without an
    /// explicit piece promotes to a queen.
    fn find_move(&self, request: &MoveRequest) -> Option<Move> {
        self.position.legal_moves().iter().find_map(|m| {
            let (from, to) = move_coords(m)?;
            if from != request.from || to != request.to {
                return None;
            }
            let promotion = m.promotion().map(PieceKind::from);
            let wanted = match (m.promotion(), request.promotion) {
                (Some(_), None) => Some(PieceKind::Queen),
                (_, requested) => requested,
            };
            (promotion == wanted).then(|| m.clone())
        })
    }

    /// Validate and apply a move. The position is untouched on error.
    pub fn apply_move(&mut self, request: &MoveRequest) -> Result<AppliedMove, RulesError> {
        let m = self
            .find_move(request)
            .ok_or_else(|| RulesError::IllegalMove(request.to_string()))?;

        let color = self.turn();
        let san = San::from_move(&self.position, m.clone()).to_string();
        let next = self
            .position
            .clone()
            .play(m.clone())
            .map_err(|_| RulesError::IllegalMove(request.to_string()))?;

        let applied = AppliedMove {
            notation: MoveRequest {
                promotion: m.promotion().map(PieceKind::from),
                ..*request
            }
            .to_string(),
            san,
            color,
            kind: m.role().into(),
            captured: m.capture().map(PieceKind::from),
            promotion: m.promotion().map(PieceKind::from),
            gives_check: next.is_check(),
        };

        if m.is_zeroing() {
            self.repetitions.clear();
        }
        self.position = next;
        self.record_repetition();

        Ok(applied)
    }

    /// Side currently in check, if any
    pub fn in_check(&self) -> Option<PieceColor> {
        self.position.is_check().then(|| self.turn())
    }

    pub fn is_checkmate(&self) -> bool {
        self.position.is_checkmate()
    }

    pub fn draw_reason(&self) -> Option<DrawReason> {
        if let Some(reason) = static_draw_reason(&self.position) {
            return Some(reason);
        }
        if self.position.is_checkmate() {
            return None;
        }
        if self.position.halfmoves() >= FIFTY_MOVE_HALFMOVES {
            return Some(DrawReason::FiftyMoveRule);
        }
        let seen = self
            .repetitions
            .get(&position_key(&self.position))
            .copied()
            .unwrap_or(0);
        if seen >= 3 {
            return Some(DrawReason::ThreefoldRepetition);
        }
        None
    }

    pub fn is_draw(&self) -> bool {
        self.draw_reason().is_some()
    }

    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.position.board().piece_at(sq).map(shakmaty_to_piece)
    }

    pub fn fen(&self) -> String {
        fen_of(&self.position)
    }

    /// Back to the standard starting position
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Install a position that did not arise from a move (piece insertion).
    /// Counts as irreversible, so earlier positions cannot repeat.
    pub fn replace_position(&mut self, position: Chess) {
        self.position = position;
        self.repetitions.clear();
        self.record_repetition();
    }

    fn record_repetition(&mut self) {
        *self
            .repetitions
            .entry(position_key(&self.position))
            .or_insert(0) += 1;
    }
}

impl Default for Rules {
    fn default() -> Self {
        Self::new()
    }
}
