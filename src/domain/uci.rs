//! UCI (Universal Chess Interface) vocabulary used by the move oracles.
//!
//! Commands we send to a local engine and the output lines we care about:
//! `bestmove` answers and the `info` lines that precede them. The HTTP oracle
//! wraps the same `bestmove ...` text in its JSON reply, so both share the
//! parsing here. Process handling lives in the models layer.

/// What we send to an engine, in the order of one search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciCommand {
    Uci,
    IsReady,
    UciNewGame,
    /// Positions are always sent as FEN: after an insertion there is no
    /// move sequence leading to them
    Position(String),
    GoDepth(u32),
    Quit,
}

impl UciCommand {
    pub fn to_uci_string(&self) -> String {
        match self {
            UciCommand::Uci => "uci".into(),
            UciCommand::IsReady => "isready".into(),
            UciCommand::UciNewGame => "ucinewgame".into(),
            UciCommand::Position(fen) => format!("position fen {}", fen),
            UciCommand::GoDepth(depth) => format!("go depth {}", depth),
            UciCommand::Quit => "quit".into(),
        }
    }

    /// The full exchange for a fixed-depth search from `fen`
    pub fn search(fen: &str, depth: u32) -> Vec<UciCommand> {
        vec![
            UciCommand::Uci,
            UciCommand::IsReady,
            UciCommand::UciNewGame,
            UciCommand::Position(fen.to_string()),
            UciCommand::GoDepth(depth),
        ]
    }
}

/// Engine output lines, categorized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciOutputKind {
    UciOk,
    ReadyOk,
    /// "info ..." - payload after the keyword
    Info(String),
    /// "bestmove ..." - payload after the keyword
    BestMove(String),
    Other(String),
}

impl UciOutputKind {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line.split_once(' ') {
            _ if line == "uciok" => UciOutputKind::UciOk,
            _ if line == "readyok" => UciOutputKind::ReadyOk,
            Some(("info", rest)) => UciOutputKind::Info(rest.trim_start().to_string()),
            Some(("bestmove", rest)) => UciOutputKind::BestMove(rest.trim_start().to_string()),
            _ => UciOutputKind::Other(line.to_string()),
        }
    }
}

/// Extract the move from a `bestmove` answer.
///
/// Accepts the whole line (`bestmove e2e4 ponder e7e5`) or just its payload.
/// `(none)` and `0000` mean the engine has no move.
pub fn best_move_from(text: &str) -> Option<String> {
    let payload = match UciOutputKind::parse(text) {
        UciOutputKind::BestMove(rest) => rest,
        UciOutputKind::Other(rest) => rest,
        _ => return None,
    };
    let mv = payload.split_whitespace().next()?;
    match mv {
        "(none)" | "0000" | "bestmove" => None,
        _ => Some(mv.to_string()),
    }
}

/// Evaluation, positive when the side it favours is White
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    Centipawns(i32),
    /// Moves until mate
    Mate(i32),
}

impl Score {
    /// `+0.35`, `M3`, `-M2`
    pub fn display(&self) -> String {
        match self {
            Score::Centipawns(cp) => format!("{:+.2}", *cp as f64 / 100.0),
            Score::Mate(moves) if *moves > 0 => format!("M{}", moves),
            Score::Mate(moves) => format!("-M{}", moves.abs()),
        }
    }
}

/// The parts of an `info` line worth logging
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UciInfo {
    pub depth: Option<u32>,
    pub score: Option<Score>,
    /// Expected continuation, coordinate notation
    pub line: Vec<String>,
}

impl UciInfo {
    /// Parse the part after "info "
    pub fn parse(info_str: &str) -> Self {
        let mut info = UciInfo::default();
        let mut tokens = info_str.split_whitespace();

        while let Some(token) = tokens.next() {
            match token {
                "depth" => info.depth = tokens.next().and_then(|t| t.parse().ok()),
                "score" => {
                    let kind = tokens.next();
                    let value = tokens.next().and_then(|t| t.parse::<i32>().ok());
                    info.score = match (kind, value) {
                        (Some("cp"), Some(cp)) => Some(Score::Centipawns(cp)),
                        (Some("mate"), Some(m)) => Some(Score::Mate(m)),
                        _ => info.score,
                    };
                }
                // pv runs to the end of the line
                "pv" => info.line = tokens.by_ref().map(str::to_string).collect(),
                _ => {}
            }
        }

        info
    }

    /// A finished search line rather than a progress report
    pub fn is_complete(&self) -> bool {
        matches!((self.depth, self.score), (Some(_), Some(_))) && !self.line.is_empty()
    }
}
