//! Error types shared across the domain and models layers.

use thiserror::Error;

/// Errors raised by the rules adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RulesError {
    /// Text that is not coordinate move notation (e.g. "e2e4", "e7e8q")
    #[error("invalid move notation: {0}")]
    InvalidNotation(String),

    /// Well-formed move that is not legal in the current position
    #[error("illegal move: {0}")]
    IllegalMove(String),

    /// Position text that does not describe a legal position
    #[error("invalid position '{fen}': {reason}")]
    InvalidPosition { fen: String, reason: String },
}

/// Errors returned by game controller operations
#[derive(Error, Debug)]
pub enum GameError {
    /// A user move arrived while the turn belongs to the oracle
    #[error("it is not your turn")]
    NotYourTurn,

    #[error(transparent)]
    Rules(#[from] RulesError),
}

/// Errors from move oracle clients
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid oracle endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine pipe unavailable: {0}")]
    Pipe(&'static str),

    #[error("oracle timed out")]
    Timeout,

    #[error("engine exited before answering")]
    EngineExited,
}

/// Errors while loading settings
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
