//! Terminal front end: board, clock and move list as text, commands on stdin.

use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::config::Settings;
use crate::domain::insertion::InsertionEngine;
use crate::domain::{PieceColor, to_square};
use crate::error::GameError;
use crate::models::{GameModel, GamePhase};

const HELP: &str = "\
commands:
  e2e4, e7e8q     play a move in coordinate notation
  insert          resurrect one captured piece per side now
  reset           start a new game
  side white|black  switch sides and start over
  retry           ask the opponent again after it failed to answer
  fen             print the current position
  moves           print the move list
  help            show this text
  quit            leave";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Move(String),
    Insert,
    Reset,
    Side(PieceColor),
    Retry,
    Fen,
    Moves,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    /// `None` for a blank line
    fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let first = words.next()?.to_ascii_lowercase();
        let command = match first.as_str() {
            "insert" => Command::Insert,
            "reset" => Command::Reset,
            "side" => match words.next().map(str::to_ascii_lowercase).as_deref() {
                Some("white" | "w") => Command::Side(PieceColor::White),
                Some("black" | "b") => Command::Side(PieceColor::Black),
                _ => Command::Unknown(line.trim().to_string()),
            },
            "retry" => Command::Retry,
            "fen" => Command::Fen,
            "moves" => Command::Moves,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            _ if (4..=5).contains(&first.len()) => Command::Move(first),
            _ => Command::Unknown(line.trim().to_string()),
        };
        Some(command)
    }
}

/// Board as text, from the user's side
fn render_board(game: &GameModel) -> String {
    let flipped = game.user_color() == PieceColor::Black;
    let index = |i: usize| if flipped { 7 - i } else { i };

    let mut out = String::new();
    for r in 0..8 {
        let row = index(r);
        out.push_str(&format!("{} ", 8 - row));
        for c in 0..8 {
            let symbol = game
                .rules()
                .piece_at(to_square(row, index(c)))
                .map_or('.', |p| p.symbol());
            out.push(' ');
            out.push(symbol);
        }
        out.push('\n');
    }
    let files: String = (0..8)
        .map(|c| format!(" {}", (b'a' + index(c) as u8) as char))
        .collect();
    out.push_str(&format!("  {}", files));
    out
}

fn render_clock(game: &GameModel) -> String {
    let side = |color: PieceColor| {
        let marker = if game.clock().running() == Some(color) { "*" } else { " " };
        format!("{}{} {}", marker, color, game.clock().display(color))
    };
    format!("{}   {}", side(PieceColor::White), side(PieceColor::Black))
}

fn render_status(game: &GameModel) -> String {
    if let Some(winner) = game.checkmate_winner() {
        return format!("checkmate, {} wins (reset to play again)", winner);
    }
    if !game.rules().has_legal_moves() {
        return format!("no legal move for {} (insert or reset)", game.turn());
    }
    match game.phase() {
        GamePhase::AwaitingOracleMove => "waiting for the opponent (retry to ask again)".to_string(),
        _ if game.is_user_turn() => format!("your move ({})", game.turn()),
        _ => format!("{} to move", game.turn()),
    }
}

/// Captures since the last insertion; each side gets back what the other took
fn render_pool(game: &GameModel) -> String {
    let pool = game.capture_pool();
    let kinds = |color: PieceColor| {
        let names: Vec<&str> = pool.captures_by(color).iter().map(|k| k.name()).collect();
        if names.is_empty() { "-".to_string() } else { names.join(" ") }
    };
    format!(
        "captured by white: {}   by black: {}   material {:+}",
        kinds(PieceColor::White),
        kinds(PieceColor::Black),
        pool.material_advantage()
    )
}

fn show(game: &mut GameModel) {
    for notification in game.drain_notifications() {
        println!("! {}", notification);
    }
    println!(
        "{}\n{}\n{}\n{}",
        render_board(game),
        render_clock(game),
        render_pool(game),
        render_status(game)
    );
}

/// Run the interactive game until `quit` or end of input
pub async fn run(settings: Settings) -> Result<()> {
    let oracle = settings
        .build_oracle()
        .context("failed to set up the move oracle")?;
    let mut game = GameModel::new(oracle, settings.user_color)
        .with_insertion_engine(InsertionEngine::new(settings.insertion.max_attempts))
        .with_depth(settings.oracle.depth)
        .with_clock(settings.clock());
    let mut clock_events = game.subscribe_clock();

    println!("{}\n", HELP);
    game.start().await;
    show(&mut game);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut waiting_since = Instant::now();

    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        // The user's clock ran while they typed
        game.tick_clock(waiting_since.elapsed());

        let Some(command) = Command::parse(&line) else {
            waiting_since = Instant::now();
            continue;
        };
        debug!(?command, "command");

        match command {
            Command::Move(text) => match game.play_user_move(&text).await {
                Ok(_) => {}
                // Reported through the notifications
                Err(GameError::Rules(_)) => {}
                Err(e) => println!("! {}", e),
            },
            Command::Insert => {
                // Outcome arrives as a notification
                let _ = game.trigger_insertion();
            }
            Command::Reset => game.reset().await,
            Command::Side(color) => game.change_side(color).await,
            Command::Retry => {
                if !game.request_oracle_move().await {
                    if !game.rules().has_legal_moves() {
                        println!("! {} has no legal move, insert or reset", game.turn());
                    } else if game.is_user_turn() {
                        println!("! it is your move");
                    }
                }
            }
            Command::Fen => {
                println!("{}", game.fen());
                waiting_since = Instant::now();
                continue;
            }
            Command::Moves => {
                for line in game.history().display_lines() {
                    println!("{}", line);
                }
                waiting_since = Instant::now();
                continue;
            }
            Command::Help => {
                println!("{}", HELP);
                waiting_since = Instant::now();
                continue;
            }
            Command::Quit => break,
            Command::Unknown(text) => {
                println!("! unknown command: {} (try help)", text);
                waiting_since = Instant::now();
                continue;
            }
        }

        while let Ok(event) = clock_events.try_recv() {
            debug!(?event, "clock event");
        }
        show(&mut game);
        waiting_since = Instant::now();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::error::OracleError;
    use crate::models::MoveOracle;

    struct SilentOracle;

    #[async_trait]
    impl MoveOracle for SilentOracle {
        async fn suggest_move(
            &self,
            _fen: &str,
            _depth: Option<u8>,
        ) -> Result<Option<String>, OracleError> {
            Ok(None)
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("   "), None);
        assert_eq!(Command::parse("e2e4"), Some(Command::Move("e2e4".to_string())));
        assert_eq!(Command::parse("E7E8Q"), Some(Command::Move("e7e8q".to_string())));
        assert_eq!(Command::parse("insert"), Some(Command::Insert));
        assert_eq!(Command::parse("side black"), Some(Command::Side(PieceColor::Black)));
        assert_eq!(Command::parse("side w"), Some(Command::Side(PieceColor::White)));
        assert_eq!(Command::parse("Quit"), Some(Command::Quit));
        assert!(matches!(Command::parse("side green"), Some(Command::Unknown(_))));
        assert!(matches!(Command::parse("castle"), Some(Command::Unknown(_))));
    }

    #[test]
    fn test_board_from_white() {
        let game = GameModel::new(Arc::new(SilentOracle), PieceColor::White);
        let board = render_board(&game);
        let lines: Vec<&str> = board.lines().collect();
        assert_eq!(lines[0], "8  r n b q k b n r");
        assert_eq!(lines[7], "1  R N B Q K B N R");
        assert_eq!(lines[8], "   a b c d e f g h");
    }

    #[test]
    fn test_board_from_black() {
        let game = GameModel::new(Arc::new(SilentOracle), PieceColor::Black);
        let board = render_board(&game);
        let lines: Vec<&str> = board.lines().collect();
        assert_eq!(lines[0], "1  R N B K Q B N R");
        assert_eq!(lines[7], "8  r n b k q b n r");
        assert_eq!(lines[8], "   h g f e d c b a");
    }

    #[tokio::test]
    async fn test_status_after_stall() {
        let mut game = GameModel::new(Arc::new(SilentOracle), PieceColor::White);
        game.start().await;
        assert_eq!(render_status(&game), "your move (white)");
        assert!(render_clock(&game).starts_with("*white 10:00"));

        game.play_user_move("e2e4").await.unwrap();
        assert_eq!(render_status(&game), "waiting for the opponent (retry to ask again)");
        assert_eq!(render_pool(&game), "captured by white: -   by black: -   material +0");
    }

    #[tokio::test]
    async fn test_status_when_opponent_is_stuck() {
        // Black is stalemated and nothing has been captured to put back
        let mut game = GameModel::new(Arc::new(SilentOracle), PieceColor::White)
            .with_position("k7/2Q5/1K6/8/8/8/8/8 b - - 0 1")
            .unwrap();
        game.start().await;

        assert!(!game.rules().has_legal_moves());
        assert_eq!(game.phase(), GamePhase::AwaitingOracleMove);
        assert_eq!(render_status(&game), "no legal move for black (insert or reset)");
        assert!(!game.request_oracle_move().await);
        assert_eq!(render_status(&game), "no legal move for black (insert or reset)");
    }
}
