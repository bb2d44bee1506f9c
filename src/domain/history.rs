//! Linear game record: played moves interleaved with piece insertions.
//!
//! The capture pools used by piece insertion are derived from this record.
//! Only captures made after the most recent insertion count, so material
//! spent on one insertion can never be resurrected twice. A side gets back
//! what it lost, i.e. what the opponent captured.

use shakmaty::Square;

use crate::domain::chess::{PieceColor, PieceKind};
use crate::domain::rules::AppliedMove;

/// Who produced a move
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mover {
    User,
    Oracle,
}

/// A piece placed on the board by the insertion engine
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Placement {
    pub color: PieceColor,
    pub kind: PieceKind,
    pub square: Square,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HistoryEntry {
    Move { mover: Mover, applied: AppliedMove },
    Insertion(Placement),
}

impl HistoryEntry {
    /// Text shown in the move list
    pub fn notation(&self) -> String {
        match self {
            HistoryEntry::Move { applied, .. } => applied.notation.clone(),
            HistoryEntry::Insertion(placement) => {
                format!("Added {} at {}", placement.kind, placement.square)
            }
        }
    }

    pub fn is_insertion(&self) -> bool {
        matches!(self, HistoryEntry::Insertion(_))
    }
}

/// Pieces captured by each side since the last insertion
///
/// - `white`: kinds White captured (Black's losses)
/// - `black`: kinds Black captured (White's losses)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CapturePool {
    pub white: Vec<PieceKind>,
    pub black: Vec<PieceKind>,
}

impl CapturePool {
    /// Record a capture made by `capturer`
    pub fn add_capture(&mut self, capturer: PieceColor, kind: PieceKind) {
        match capturer {
            PieceColor::White => self.white.push(kind),
            PieceColor::Black => self.black.push(kind),
        }
    }

    pub fn captures_by(&self, capturer: PieceColor) -> &[PieceKind] {
        match capturer {
            PieceColor::White => &self.white,
            PieceColor::Black => &self.black,
        }
    }

    /// Kinds `color` lost, which are the kinds it can get back
    pub fn losses_of(&self, color: PieceColor) -> &[PieceKind] {
        self.captures_by(color.opposite())
    }

    /// Both sides have something to resurrect
    pub fn is_feasible(&self) -> bool {
        !self.white.is_empty() && !self.black.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.white.is_empty() && self.black.is_empty()
    }

    /// Positive when White has taken more material, in pawns
    pub fn material_advantage(&self) -> i32 {
        let white: i32 = self.white.iter().map(|k| k.value()).sum();
        let black: i32 = self.black.iter().map(|k| k.value()).sum();
        white - black
    }
}

#[derive(Clone, Debug, Default)]
pub struct MoveHistory {
    entries: Vec<HistoryEntry>,
}

impl MoveHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push_move(&mut self, mover: Mover, applied: AppliedMove) {
        self.entries.push(HistoryEntry::Move { mover, applied });
    }

    pub fn push_insertion(&mut self, placement: Placement) {
        self.entries.push(HistoryEntry::Insertion(placement));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of played moves (insertions excluded)
    pub fn move_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_insertion()).count()
    }

    /// Capture pools, re-derived from the entries after the last insertion
    pub fn capture_pool(&self) -> CapturePool {
        let since = self
            .entries
            .iter()
            .rposition(HistoryEntry::is_insertion)
            .map_or(0, |i| i + 1);

        let mut pool = CapturePool::default();
        for entry in &self.entries[since..] {
            if let HistoryEntry::Move { applied, .. } = entry {
                if let Some(kind) = applied.captured {
                    pool.add_capture(applied.color, kind);
                }
            }
        }
        pool
    }

    /// Move list lines, numbered per full move ("1. e2e4 e7e5").
    /// Insertions get their own line.
    pub fn display_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = String::new();
        let mut ply = 0usize;

        for entry in &self.entries {
            match entry {
                HistoryEntry::Move { applied, .. } => {
                    if applied.color == PieceColor::White || current.is_empty() {
                        if !current.is_empty() {
                            lines.push(std::mem::take(&mut current));
                        }
                        let number = ply / 2 + 1;
                        current = match applied.color {
                            PieceColor::White => format!("{}. {}", number, applied.notation),
                            PieceColor::Black => format!("{}... {}", number, applied.notation),
                        };
                    } else {
                        current.push(' ');
                        current.push_str(&applied.notation);
                    }
                    ply += 1;
                }
                HistoryEntry::Insertion(_) => {
                    if !current.is_empty() {
                        lines.push(std::mem::take(&mut current));
                    }
                    lines.push(format!("   {}", entry.notation()));
                }
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applied(color: PieceColor, notation: &str, captured: Option<PieceKind>) -> AppliedMove {
        AppliedMove {
            notation: notation.to_string(),
            san: notation.to_string(),
            color,
            kind: PieceKind::Pawn,
            captured,
            promotion: None,
            gives_check: false,
        }
    }

    fn placement(color: PieceColor, kind: PieceKind, square: Square) -> Placement {
        Placement { color, kind, square }
    }

    #[test]
    fn test_empty_history_has_empty_pool() {
        let history = MoveHistory::new();
        assert!(history.capture_pool().is_empty());
        assert!(!history.capture_pool().is_feasible());
    }

    #[test]
    fn test_pool_partitioned_by_capturer() {
        let mut history = MoveHistory::new();
        history.push_move(Mover::User, applied(PieceColor::White, "e4d5", Some(PieceKind::Pawn)));
        history.push_move(Mover::Oracle, applied(PieceColor::Black, "d8d5", Some(PieceKind::Pawn)));
        history.push_move(Mover::User, applied(PieceColor::White, "c3d5", Some(PieceKind::Queen)));

        let pool = history.capture_pool();
        assert_eq!(pool.white, vec![PieceKind::Pawn, PieceKind::Queen]);
        assert_eq!(pool.black, vec![PieceKind::Pawn]);
        assert_eq!(pool.losses_of(PieceColor::Black), &[PieceKind::Pawn, PieceKind::Queen]);
        assert_eq!(pool.losses_of(PieceColor::White), &[PieceKind::Pawn]);
        assert!(pool.is_feasible());
        assert_eq!(pool.material_advantage(), 9);
    }

    #[test]
    fn test_pool_resets_after_insertion() {
        let mut history = MoveHistory::new();
        history.push_move(Mover::User, applied(PieceColor::White, "e4d5", Some(PieceKind::Knight)));
        history.push_move(Mover::Oracle, applied(PieceColor::Black, "d8d5", Some(PieceKind::Bishop)));
        history.push_insertion(placement(PieceColor::White, PieceKind::Knight, Square::C3));
        history.push_insertion(placement(PieceColor::Black, PieceKind::Bishop, Square::F6));

        assert!(history.capture_pool().is_empty());

        history.push_move(Mover::User, applied(PieceColor::White, "a1a8", Some(PieceKind::Rook)));
        let pool = history.capture_pool();
        assert_eq!(pool.white, vec![PieceKind::Rook]);
        assert!(pool.black.is_empty());
        assert!(!pool.is_feasible());
    }

    #[test]
    fn test_insertion_notation() {
        let entry = HistoryEntry::Insertion(placement(PieceColor::Black, PieceKind::Bishop, Square::F6));
        assert_eq!(entry.notation(), "Added bishop at f6");
    }

    #[test]
    fn test_display_lines() {
        let mut history = MoveHistory::new();
        history.push_move(Mover::User, applied(PieceColor::White, "e2e4", None));
        history.push_move(Mover::Oracle, applied(PieceColor::Black, "e7e5", None));
        history.push_move(Mover::User, applied(PieceColor::White, "g1f3", None));
        history.push_insertion(placement(PieceColor::White, PieceKind::Pawn, Square::A3));
        history.push_move(Mover::Oracle, applied(PieceColor::Black, "b8c6", None));

        assert_eq!(
            history.display_lines(),
            vec![
                "1. e2e4 e7e5".to_string(),
                "2. g1f3".to_string(),
                "   Added pawn at a3".to_string(),
                "2... b8c6".to_string(),
            ]
        );
        assert_eq!(history.move_count(), 4);
    }
}
