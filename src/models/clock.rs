//! Chess clock and its reset signal.
//!
//! Each side counts down from the same initial time; only the side to move
//! runs. Clock widgets learn about resets and side switches by subscribing to
//! the [`ClockSignal`] owned by the game controller.

use std::time::Duration;

use tokio::sync::broadcast;

use crate::domain::PieceColor;

/// Capacity of the broadcast channel; slow subscribers skip old events
const SIGNAL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    /// Both sides back to the initial time
    Reset { initial: Duration },
    /// The given side's clock is now running
    Switched(PieceColor),
}

/// Broadcast handle for clock events
#[derive(Debug, Clone)]
pub struct ClockSignal {
    sender: broadcast::Sender<ClockEvent>,
}

impl ClockSignal {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClockEvent> {
        self.sender.subscribe()
    }

    /// Returns how many subscribers received the event
    pub fn emit(&self, event: ClockEvent) -> usize {
        // No subscribers is fine
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for ClockSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct GameClock {
    initial: Duration,
    white: Duration,
    black: Duration,
    /// Side whose time is running
    running: Option<PieceColor>,
}

impl GameClock {
    pub fn new(initial: Duration) -> Self {
        Self {
            initial,
            white: initial,
            black: initial,
            running: None,
        }
    }

    pub fn from_minutes(minutes: u64) -> Self {
        Self::new(Duration::from_secs(minutes * 60))
    }

    pub fn initial(&self) -> Duration {
        self.initial
    }

    pub fn remaining(&self, color: PieceColor) -> Duration {
        match color {
            PieceColor::White => self.white,
            PieceColor::Black => self.black,
        }
    }

    pub fn running(&self) -> Option<PieceColor> {
        self.running
    }

    /// Start (or hand over) the clock to `color`
    pub fn switch_to(&mut self, color: PieceColor) {
        self.running = Some(color);
    }

    pub fn pause(&mut self) {
        self.running = None;
    }

    pub fn reset(&mut self) {
        self.white = self.initial;
        self.black = self.initial;
        self.running = None;
    }

    /// Run the active side's time down. Returns the side whose flag fell
    /// during this tick.
    pub fn tick(&mut self, elapsed: Duration) -> Option<PieceColor> {
        let color = self.running?;
        let left = match color {
            PieceColor::White => &mut self.white,
            PieceColor::Black => &mut self.black,
        };
        if left.is_zero() {
            return None;
        }
        *left = left.saturating_sub(elapsed);
        if left.is_zero() {
            self.running = None;
            Some(color)
        } else {
            None
        }
    }

    /// Remaining time as mm:ss
    pub fn display(&self, color: PieceColor) -> String {
        let secs = self.remaining(color).as_secs();
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}

impl Default for GameClock {
    fn default() -> Self {
        Self::from_minutes(10)
    }
}
