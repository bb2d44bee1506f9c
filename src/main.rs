use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use drawless::config::{OracleBackend, Settings, schema_json};
use drawless::domain::PieceColor;

/// Chess without draws: when the game would be drawn, captured pieces come back.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Settings file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Side to play
    #[arg(long, value_parser = parse_color)]
    color: Option<PieceColor>,

    /// Search depth requested from the opponent
    #[arg(long)]
    depth: Option<u8>,

    /// Use a local UCI engine as the opponent
    #[arg(long, conflicts_with = "oracle_url")]
    engine_path: Option<PathBuf>,

    /// HTTP move oracle endpoint
    #[arg(long)]
    oracle_url: Option<String>,

    /// Placement attempts per piece insertion
    #[arg(long)]
    max_insert_attempts: Option<u32>,

    /// Print the settings file schema and exit
    #[arg(long)]
    print_config_schema: bool,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if let Some(color) = self.color {
            settings.user_color = color;
        }
        if let Some(depth) = self.depth {
            settings.oracle.depth = depth;
        }
        if let Some(path) = &self.engine_path {
            settings.oracle.backend = OracleBackend::Uci { path: path.clone() };
        }
        if let Some(endpoint) = &self.oracle_url {
            settings.oracle.backend = OracleBackend::Http {
                endpoint: endpoint.clone(),
            };
        }
        if let Some(attempts) = self.max_insert_attempts {
            settings.insertion.max_attempts = attempts;
        }
    }
}

fn parse_color(text: &str) -> Result<PieceColor, String> {
    match text.to_ascii_lowercase().as_str() {
        "white" | "w" => Ok(PieceColor::White),
        "black" | "b" => Ok(PieceColor::Black),
        other => Err(format!("expected white or black, got '{}'", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config_schema {
        println!("{}", schema_json()?);
        return Ok(());
    }

    // stdout belongs to the board
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("drawless=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut settings = Settings::load(args.config.as_deref()).context("failed to load settings")?;
    args.apply(&mut settings);

    drawless::app::run(settings).await
}
