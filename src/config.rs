//! Settings, loaded from an optional JSON file.
//!
//! Every field has a default, so a settings file only needs the values it
//! changes. Command-line flags are applied on top by the binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::PieceColor;
use crate::domain::insertion::DEFAULT_MAX_ATTEMPTS;
use crate::error::{ConfigError, OracleError};
use crate::models::clock::GameClock;
use crate::models::engine::{DEFAULT_ENDPOINT, HttpOracle, MoveOracle, UciOracle};

/// Where opponent moves come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OracleBackend {
    /// Remote search service answering `GET ?fen=..&depth=..`
    Http { endpoint: String },
    /// Local UCI engine binary
    Uci { path: PathBuf },
}

impl Default for OracleBackend {
    fn default() -> Self {
        OracleBackend::Http {
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct OracleSettings {
    pub backend: OracleBackend,
    /// Search depth requested from the oracle
    pub depth: u8,
    /// Give up on a reply after this many seconds
    pub timeout_secs: u64,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            backend: OracleBackend::default(),
            depth: 10,
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct InsertionSettings {
    /// Candidate placements tried before giving up
    pub max_attempts: u32,
}

impl Default for InsertionSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ClockSettings {
    pub initial_minutes: u64,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self { initial_minutes: 10 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Settings {
    /// Side the user plays
    pub user_color: PieceColor,
    pub oracle: OracleSettings,
    pub insertion: InsertionSettings,
    pub clock: ClockSettings,
}

impl Settings {
    /// Read settings from `path`, or use the defaults when there is none
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("no settings file given, using defaults");
            return Ok(Self::default());
        };
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        info!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.oracle.timeout_secs)
    }

    pub fn clock(&self) -> GameClock {
        GameClock::from_minutes(self.clock.initial_minutes)
    }

    pub fn build_oracle(&self) -> Result<Arc<dyn MoveOracle>, OracleError> {
        let oracle: Arc<dyn MoveOracle> = match &self.oracle.backend {
            OracleBackend::Http { endpoint } => Arc::new(HttpOracle::new(endpoint, self.timeout())?),
            OracleBackend::Uci { path } => Arc::new(UciOracle::new(path.clone(), self.timeout())),
        };
        Ok(oracle)
    }
}

/// JSON schema of the settings file
pub fn schema_json() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(Settings);
    serde_json::to_string_pretty(&schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.user_color, PieceColor::White);
        assert_eq!(settings.oracle.depth, 10);
        assert_eq!(settings.timeout(), Duration::from_secs(20));
        assert_eq!(settings.insertion.max_attempts, 200);
        assert_eq!(settings.clock().display(PieceColor::Black), "10:00");
        assert_eq!(
            settings.oracle.backend,
            OracleBackend::Http { endpoint: DEFAULT_ENDPOINT.to_string() }
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"user_color": "black", "oracle": {"depth": 4}}"#).unwrap();
        assert_eq!(settings.user_color, PieceColor::Black);
        assert_eq!(settings.oracle.depth, 4);
        assert_eq!(settings.oracle.timeout_secs, 20);
        assert_eq!(settings.clock.initial_minutes, 10);
    }

    #[test]
    fn test_uci_backend() {
        let settings: Settings = serde_json::from_str(
            r#"{"oracle": {"backend": {"kind": "uci", "path": "/usr/bin/stockfish"}}}"#,
        )
        .unwrap();
        assert_eq!(
            settings.oracle.backend,
            OracleBackend::Uci { path: PathBuf::from("/usr/bin/stockfish") }
        );
        assert!(settings.build_oracle().is_ok());
    }

    #[test]
    fn test_bad_endpoint_fails_to_build() {
        let mut settings = Settings::default();
        settings.oracle.backend = OracleBackend::Http { endpoint: "nowhere".to_string() };
        assert!(matches!(settings.build_oracle(), Err(OracleError::Endpoint(_))));
    }

    #[test]
    fn test_load() {
        assert_eq!(Settings::load(None).unwrap(), Settings::default());

        let missing = Settings::load(Some(Path::new("/nonexistent/drawless.json")));
        assert!(matches!(missing, Err(ConfigError::Io(_))));

        let path = std::env::temp_dir().join(format!("drawless-settings-{}.json", std::process::id()));
        fs::write(&path, r#"{"insertion": {"max_attempts": 50}}"#).unwrap();
        let loaded = Settings::load(Some(&path)).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(loaded.insertion.max_attempts, 50);

        let path = std::env::temp_dir().join(format!("drawless-broken-{}.json", std::process::id()));
        fs::write(&path, "{ not json").unwrap();
        let broken = Settings::load(Some(&path));
        fs::remove_file(&path).unwrap();
        assert!(matches!(broken, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_schema_lists_sections() {
        let schema = schema_json().unwrap();
        for key in ["user_color", "oracle", "insertion", "clock"] {
            assert!(schema.contains(key), "schema is missing {key}");
        }
    }
}
