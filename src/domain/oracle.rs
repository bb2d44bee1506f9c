//! Reply format of the HTTP move oracle.
//!
//! ```json
//! {"success": true, "evaluation": 0.35, "mate": null,
//!  "bestmove": "bestmove e2e4 ponder e7e5", "continuation": "e2e4 e7e5 g1f3"}
//! ```

use serde::Deserialize;

use crate::domain::uci::{Score, best_move_from};

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OracleResponse {
    pub success: bool,
    #[serde(default)]
    pub bestmove: Option<String>,
    /// Evaluation in pawns, White's point of view
    #[serde(default)]
    pub evaluation: Option<f64>,
    #[serde(default)]
    pub mate: Option<i32>,
    #[serde(default)]
    pub continuation: Option<String>,
}

impl OracleResponse {
    /// The suggested move in coordinate notation, if the oracle gave one
    pub fn best_move(&self) -> Option<String> {
        if !self.success {
            return None;
        }
        self.bestmove.as_deref().and_then(best_move_from)
    }

    pub fn score(&self) -> Option<Score> {
        match (self.mate, self.evaluation) {
            (Some(m), _) => Some(Score::Mate(m)),
            (None, Some(pawns)) => Some(Score::Centipawns((pawns * 100.0).round() as i32)),
            (None, None) => None,
        }
    }
}
