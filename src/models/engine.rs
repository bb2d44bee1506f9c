//! Move oracles - where the opponent's moves come from.
//!
//! Two backends behind one trait:
//! - [`HttpOracle`] asks a remote search service over HTTP
//! - [`UciOracle`] spawns a local UCI engine for each request
//!
//! Either may fail or come back empty; callers treat both as "no move".

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

use crate::domain::oracle::OracleResponse;
use crate::domain::uci::{UciCommand, UciInfo, UciOutputKind, best_move_from};
use crate::error::OracleError;

/// Search depth used when the caller does not ask for one
pub const DEFAULT_DEPTH: u8 = 15;

pub const DEFAULT_ENDPOINT: &str = "https://stockfish.online/api/s/v2.php";

#[async_trait]
pub trait MoveOracle: Send + Sync {
    /// Suggest a move in coordinate notation for the position, or `None`
    async fn suggest_move(&self, fen: &str, depth: Option<u8>)
    -> Result<Option<String>, OracleError>;
}

/// Remote oracle: `GET <endpoint>?fen=<fen>&depth=<n>` answering JSON
#[derive(Debug, Clone)]
pub struct HttpOracle {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpOracle {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: Url::parse(endpoint)?,
        })
    }

    /// Request URL with the position and depth as query parameters
    pub fn request_url(&self, fen: &str, depth: u8) -> Result<Url, OracleError> {
        let depth = depth.to_string();
        Ok(Url::parse_with_params(
            self.endpoint.as_str(),
            &[("fen", fen), ("depth", depth.as_str())],
        )?)
    }
}

#[async_trait]
impl MoveOracle for HttpOracle {
    async fn suggest_move(
        &self,
        fen: &str,
        depth: Option<u8>,
    ) -> Result<Option<String>, OracleError> {
        let url = self.request_url(fen, depth.unwrap_or(DEFAULT_DEPTH))?;
        debug!(%url, "querying move oracle");

        let reply: OracleResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let best = reply.best_move();
        match (&best, reply.score()) {
            (Some(mv), Some(score)) => info!(%mv, eval = %score.display(), "oracle answered"),
            (Some(mv), None) => info!(%mv, "oracle answered"),
            (None, _) => debug!(success = reply.success, "oracle returned no move"),
        }
        Ok(best)
    }
}

/// Local oracle: one engine process per request
#[derive(Debug, Clone)]
pub struct UciOracle {
    path: PathBuf,
    timeout: Duration,
}

impl UciOracle {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }

    async fn search(&self, fen: &str, depth: u8) -> Result<Option<String>, OracleError> {
        let mut child = Command::new(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child.stdin.take().ok_or(OracleError::Pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(OracleError::Pipe("stdout"))?;

        for cmd in UciCommand::search(fen, depth.into()) {
            stdin.write_all(cmd.to_uci_string().as_bytes()).await?;
            stdin.write_all(b"\n").await?;
        }
        stdin.flush().await?;

        let mut lines = BufReader::new(stdout).lines();
        let mut last_info: Option<UciInfo> = None;

        while let Some(line) = lines.next_line().await? {
            match UciOutputKind::parse(&line) {
                UciOutputKind::Info(payload) => {
                    let info = UciInfo::parse(&payload);
                    if info.is_complete() {
                        last_info = Some(info);
                    }
                }
                UciOutputKind::BestMove(payload) => {
                    if let Some(info) = &last_info {
                        debug!(
                            depth = info.depth,
                            eval = %info.score.map(|s| s.display()).unwrap_or_default(),
                            "engine search finished"
                        );
                    }
                    let quit = format!("{}\n", UciCommand::Quit.to_uci_string());
                    // The engine may already be gone
                    let _ = stdin.write_all(quit.as_bytes()).await;
                    let _ = child.wait().await;
                    return Ok(best_move_from(&payload));
                }
                _ => {}
            }
        }

        Err(OracleError::EngineExited)
    }
}

#[async_trait]
impl MoveOracle for UciOracle {
    async fn suggest_move(
        &self,
        fen: &str,
        depth: Option<u8>,
    ) -> Result<Option<String>, OracleError> {
        let depth = depth.unwrap_or(DEFAULT_DEPTH);
        debug!(engine = %self.path.display(), depth, "starting engine search");
        tokio::time::timeout(self.timeout, self.search(fen, depth))
            .await
            .map_err(|_| OracleError::Timeout)?
    }
}
