//! Piece insertion: resurrecting one captured piece per side to break a draw.
//!
//! Each attempt draws a piece kind from what each side has lost and an empty
//! square in that side's half of the board (White ranks 1-4, Black ranks 5-8).
//! The pair is accepted only if the resulting position validates, neither new
//! piece can be captured straight away, and the position is no longer drawn.
//! Kinds and squares are both redrawn on every attempt; the number of attempts
//! is capped.

use std::fmt;

use rand::Rng;
use shakmaty::{Board, Chess, Position, Square};
use thiserror::Error;
use tracing::{debug, trace};

use crate::domain::chess::{Piece, PieceColor};
use crate::domain::history::{CapturePool, Placement};
use crate::domain::rules::{DrawReason, fen_of, static_draw_reason, validate};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 200;

/// Why no pieces were inserted
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum Infeasible {
    /// Counts of pieces each side could get back
    #[error("not enough captures yet (white could get back {white}, black {black})")]
    EmptyPool { white: usize, black: usize },

    #[error("no empty square left in {0}'s half of the board")]
    NoEmptySquare(PieceColor),

    #[error("no safe placement found after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

/// A proposed pair of placements, discarded unless every check passes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InsertionCandidate {
    pub white: Placement,
    pub black: Placement,
}

/// An accepted insertion and the position it produces
#[derive(Clone, Debug)]
pub struct Insertion {
    pub white: Placement,
    pub black: Placement,
    pub position: Chess,
    pub fen: String,
    /// Attempts used, including the successful one
    pub attempts: u32,
}

enum Rejection {
    SameSquare,
    Occupied(Square),
    WrongHalf(Placement),
    Invalid(String),
    Capturable(Placement),
    StillDrawn(DrawReason),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::SameSquare => f.write_str("both pieces on one square"),
            Rejection::Occupied(sq) => write!(f, "{} is occupied", sq),
            Rejection::WrongHalf(p) => write!(f, "{} {} outside its half at {}", p.color, p.kind, p.square),
            Rejection::Invalid(reason) => write!(f, "invalid position: {}", reason),
            Rejection::Capturable(p) => write!(f, "{} {} at {} can be captured", p.color, p.kind, p.square),
            Rejection::StillDrawn(reason) => write!(f, "still drawn by {}", reason),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct InsertionEngine {
    max_attempts: u32,
}

impl InsertionEngine {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Search for a valid insertion. Never touches `position`; the caller
    /// installs [`Insertion::position`] on success.
    pub fn insert<R: Rng>(
        &self,
        position: &Chess,
        pool: &CapturePool,
        rng: &mut R,
    ) -> Result<Insertion, Infeasible> {
        if !pool.is_feasible() {
            return Err(Infeasible::EmptyPool {
                white: pool.losses_of(PieceColor::White).len(),
                black: pool.losses_of(PieceColor::Black).len(),
            });
        }

        let white_squares = empty_squares(position.board(), PieceColor::White);
        if white_squares.is_empty() {
            return Err(Infeasible::NoEmptySquare(PieceColor::White));
        }
        let black_squares = empty_squares(position.board(), PieceColor::Black);
        if black_squares.is_empty() {
            return Err(Infeasible::NoEmptySquare(PieceColor::Black));
        }

        let base_fen = fen_of(position);

        for attempt in 1..=self.max_attempts {
            let candidate = InsertionCandidate {
                white: Placement {
                    color: PieceColor::White,
                    kind: pick(rng, pool.losses_of(PieceColor::White)),
                    square: pick(rng, &white_squares),
                },
                black: Placement {
                    color: PieceColor::Black,
                    kind: pick(rng, pool.losses_of(PieceColor::Black)),
                    square: pick(rng, &black_squares),
                },
            };

            match evaluate(position, &base_fen, &candidate) {
                Ok((next, fen)) => {
                    debug!(attempt, %fen, "insertion candidate accepted");
                    return Ok(Insertion {
                        white: candidate.white,
                        black: candidate.black,
                        position: next,
                        fen,
                        attempts: attempt,
                    });
                }
                Err(rejection) => trace!(attempt, %rejection, "insertion candidate rejected"),
            }
        }

        Err(Infeasible::RetriesExhausted {
            attempts: self.max_attempts,
        })
    }
}

impl Default for InsertionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

fn pick<R: Rng, T: Copy>(rng: &mut R, items: &[T]) -> T {
    items[rng.random_range(0..items.len())]
}

fn empty_squares(board: &Board, color: PieceColor) -> Vec<Square> {
    color
        .half_squares()
        .filter(|sq| board.piece_at(*sq).is_none())
        .collect()
}

/// Rebuild FEN text around a new board. Side to move and castling rights
/// carry over (the side may be overridden); the en passant target is dropped
/// and the halfmove clock restarts, since insertion is irreversible.
fn compose_fen(base_fen: &str, board: &Board, turn: Option<PieceColor>) -> String {
    let mut fields = base_fen.split_whitespace().skip(1);
    let side = fields.next().unwrap_or("w");
    let castling = fields.next().unwrap_or("-");
    let fullmoves = fields.nth(2).unwrap_or("1");

    let side = match turn {
        Some(PieceColor::White) => "w",
        Some(PieceColor::Black) => "b",
        None => side,
    };
    format!("{} {} {} - 0 {}", board, side, castling, fullmoves)
}

/// Whether `attacker` could take whatever stands on `square` right now.
///
/// Uses the attacker's legal moves with the attacker to move. When that
/// position cannot exist (the other side would be in check) the raw attack
/// set is used instead.
fn is_capturable(position: &Chess, fen: &str, square: Square, attacker: PieceColor) -> bool {
    let to_move = if PieceColor::from(position.turn()) == attacker {
        Some(position.clone())
    } else {
        validate(&compose_fen(fen, position.board(), Some(attacker))).ok()
    };

    match to_move {
        Some(pos) => pos
            .legal_moves()
            .iter()
            .any(|m| m.is_capture() && m.to() == square),
        None => {
            let board = position.board();
            !board
                .attacks_to(square, attacker.into(), board.occupied())
                .is_empty()
        }
    }
}

fn evaluate(
    position: &Chess,
    base_fen: &str,
    candidate: &InsertionCandidate,
) -> Result<(Chess, String), Rejection> {
    let placements = [candidate.white, candidate.black];

    if candidate.white.square == candidate.black.square {
        return Err(Rejection::SameSquare);
    }
    for p in placements {
        if !p.color.owns_half(p.square) {
            return Err(Rejection::WrongHalf(p));
        }
        if position.board().piece_at(p.square).is_some() {
            return Err(Rejection::Occupied(p.square));
        }
    }

    let mut board = position.board().clone();
    for p in placements {
        board.set_piece_at(
            p.square,
            Piece {
                kind: p.kind,
                color: p.color,
            }
            .into(),
        );
    }

    let fen = compose_fen(base_fen, &board, None);
    let next = validate(&fen).map_err(|e| Rejection::Invalid(e.to_string()))?;

    for p in placements {
        if is_capturable(&next, &fen, p.square, p.color.opposite()) {
            return Err(Rejection::Capturable(p));
        }
    }

    if let Some(reason) = static_draw_reason(&next) {
        return Err(Rejection::StillDrawn(reason));
    }

    Ok((next, fen))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chess::{PieceKind, shakmaty_to_piece};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const MIDGAME: &str = "r3k2r/ppp2ppp/8/8/8/8/PPP2PPP/R3K2R w KQkq - 4 20";

    fn pool(white: &[PieceKind], black: &[PieceKind]) -> CapturePool {
        CapturePool {
            white: white.to_vec(),
            black: black.to_vec(),
        }
    }

    #[test]
    fn test_empty_pool_is_infeasible() {
        let position = validate(MIDGAME).unwrap();
        let before = fen_of(&position);
        let engine = InsertionEngine::default();
        let mut rng = StdRng::seed_from_u64(1);

        // Black captured a pawn, White captured nothing: only White has a loss
        let result = engine.insert(&position, &pool(&[], &[PieceKind::Pawn]), &mut rng);
        assert_eq!(result.unwrap_err(), Infeasible::EmptyPool { white: 1, black: 0 });

        let result = engine.insert(&position, &pool(&[PieceKind::Pawn], &[]), &mut rng);
        assert!(matches!(result, Err(Infeasible::EmptyPool { .. })));
        assert_eq!(fen_of(&position), before);
    }

    #[test]
    fn test_knight_and_bishop_insertion() {
        let position = validate(MIDGAME).unwrap();
        let engine = InsertionEngine::default();

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let insertion = engine
                .insert(
                    &position,
                    &pool(&[PieceKind::Knight], &[PieceKind::Bishop]),
                    &mut rng,
                )
                .unwrap();

            // Each side gets back what the other side took
            assert_eq!(insertion.white.kind, PieceKind::Bishop);
            assert_eq!(insertion.black.kind, PieceKind::Knight);
            assert_ne!(insertion.white.square, insertion.black.square);
            assert!(PieceColor::White.owns_half(insertion.white.square));
            assert!(PieceColor::Black.owns_half(insertion.black.square));
            assert!(position.board().piece_at(insertion.white.square).is_none());
            assert!(position.board().piece_at(insertion.black.square).is_none());
            assert!(validate(&insertion.fen).is_ok());
            assert!(static_draw_reason(&insertion.position).is_none());
            assert!(insertion.attempts >= 1 && insertion.attempts <= DEFAULT_MAX_ATTEMPTS);

            // Only the two new pieces differ
            for sq in (0..64u32).map(Square::new) {
                let after = insertion.position.board().piece_at(sq).map(shakmaty_to_piece);
                if sq == insertion.white.square {
                    assert_eq!(after.map(|p| (p.kind, p.color)), Some((PieceKind::Bishop, PieceColor::White)));
                } else if sq == insertion.black.square {
                    assert_eq!(after.map(|p| (p.kind, p.color)), Some((PieceKind::Knight, PieceColor::Black)));
                } else {
                    assert_eq!(insertion.position.board().piece_at(sq), position.board().piece_at(sq));
                }
            }

            // Side to move, castling rights and move number carry over
            let fields: Vec<&str> = insertion.fen.split_whitespace().collect();
            assert_eq!(fields[1], "w");
            assert_eq!(fields[2], "KQkq");
            assert_eq!(fields[4], "0");
            assert_eq!(fields[5], "20");
        }
    }

    #[test]
    fn test_losses_come_back_with_full_pawn_ranks() {
        // White traded its f1 bishop for the b8 knight; both sides keep all pawns
        let position =
            validate("r1bqkb1r/pppppppp/5n2/8/8/5N2/PPPPPPPP/RNBQK2R w KQkq - 0 5").unwrap();
        let engine = InsertionEngine::default();
        let pools = pool(&[PieceKind::Knight], &[PieceKind::Bishop]);

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let insertion = engine.insert(&position, &pools, &mut rng).unwrap();

            assert_eq!(insertion.white.kind, PieceKind::Bishop);
            assert_eq!(insertion.black.kind, PieceKind::Knight);
            assert!(validate(&insertion.fen).is_ok());

            let count = |kind: PieceKind, color: PieceColor| {
                (0..64u32)
                    .map(Square::new)
                    .filter_map(|sq| insertion.position.board().piece_at(sq))
                    .map(shakmaty_to_piece)
                    .filter(|p| p.kind == kind && p.color == color)
                    .count()
            };
            assert_eq!(count(PieceKind::Bishop, PieceColor::White), 2);
            assert_eq!(count(PieceKind::Knight, PieceColor::White), 2);
            assert_eq!(count(PieceKind::Knight, PieceColor::Black), 2);
            assert_eq!(count(PieceKind::Bishop, PieceColor::Black), 2);
        }
    }

    #[test]
    fn test_inserted_pieces_are_not_capturable() {
        // Black queen in the centre covers much of the board
        let position = validate("4k3/8/8/8/3q4/8/8/4K3 w - - 0 1").unwrap();
        let engine = InsertionEngine::default();

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let insertion = engine
                .insert(
                    &position,
                    &pool(&[PieceKind::Knight], &[PieceKind::Rook]),
                    &mut rng,
                )
                .unwrap();

            // White to move cannot take the black piece
            assert!(!insertion
                .position
                .legal_moves()
                .iter()
                .any(|m| m.is_capture() && m.to() == insertion.black.square));

            // Black to move cannot take the white piece
            let flipped = insertion.fen.replacen(" w ", " b ", 1);
            if let Ok(as_black) = validate(&flipped) {
                assert!(!as_black
                    .legal_moves()
                    .iter()
                    .any(|m| m.is_capture() && m.to() == insertion.white.square));
            }
        }
    }

    #[test]
    fn test_retry_cap_is_reported() {
        // A second black king can never validate
        let position = validate(MIDGAME).unwrap();
        let engine = InsertionEngine::new(25);
        let mut rng = StdRng::seed_from_u64(3);

        let result = engine.insert(
            &position,
            &pool(&[PieceKind::King], &[PieceKind::Pawn]),
            &mut rng,
        );
        assert_eq!(result.unwrap_err(), Infeasible::RetriesExhausted { attempts: 25 });
    }

    #[test]
    fn test_insertion_breaks_stalemate() {
        // Black to move, stalemated
        let position = validate("k7/2Q5/1K6/8/8/8/8/8 b - - 0 1").unwrap();
        assert!(static_draw_reason(&position).is_some());

        let engine = InsertionEngine::default();
        let mut rng = StdRng::seed_from_u64(11);
        let insertion = engine
            .insert(
                &position,
                &pool(&[PieceKind::Rook], &[PieceKind::Knight]),
                &mut rng,
            )
            .unwrap();
        assert!(static_draw_reason(&insertion.position).is_none());
    }

    #[test]
    fn test_same_seed_same_insertion() {
        let position = validate(MIDGAME).unwrap();
        let engine = InsertionEngine::default();
        let pools = pool(&[PieceKind::Knight, PieceKind::Rook], &[PieceKind::Bishop, PieceKind::Pawn]);

        let a = engine.insert(&position, &pools, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = engine.insert(&position, &pools, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a.white, b.white);
        assert_eq!(a.black, b.black);
        assert_eq!(a.fen, b.fen);
    }
}
