use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_WIDTH: u16 = 60;
pub const DEFAULT_HEIGHT: u16 = 20;
pub const DEFAULT_PADDLE_SIZE: u16 = 4;
pub const DEFAULT_WIN_SCORE: u32 = 5;

/// the narrowest playfield that still leaves room between the two paddle columns.
pub const MIN_WIDTH: u16 = 8;
pub const MIN_HEIGHT: u16 = 2;

/// Settings for a single session. Built once before the session starts and passed into it; nothing
/// here changes while the session runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameConfig {
    pub width: u16,
    pub height: u16,
    pub paddle_size: u16,
    pub win_score: u32,
    /// minimum gap between two ball steps.
    pub tick_interval: Duration,
    /// how long the loop yields between ticks.
    pub frame_interval: Duration,
    /// upper bound on a single keyboard poll.
    pub input_timeout: Duration,
    /// read/write timeout applied to the peer connection.
    pub net_timeout: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            paddle_size: DEFAULT_PADDLE_SIZE,
            win_score: DEFAULT_WIN_SCORE,
            tick_interval: Duration::from_millis(80),
            frame_interval: Duration::from_millis(30),
            input_timeout: Duration::from_millis(10),
            net_timeout: Duration::from_secs(2),
        }
    }
}

impl GameConfig {
    /// Sizes the playfield to a terminal of `columns` x `rows`, leaving a margin for the score line
    /// and borders.
    pub fn fit_to(mut self, columns: u16, rows: u16) -> Self {
        self.width = columns.saturating_sub(10).max(30);
        self.height = rows.saturating_sub(10).max(10);
        self
    }


    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width < MIN_WIDTH {
            return Err(ConfigError::TooNarrow(self.width));
        }
        if self.height < MIN_HEIGHT {
            return Err(ConfigError::TooShort(self.height));
        }
        if self.paddle_size == 0 || self.paddle_size > self.height {
            return Err(ConfigError::PaddleSize {
                paddle_size: self.paddle_size,
                height: self.height,
            });
        }
        if self.win_score == 0 {
            return Err(ConfigError::ZeroWinScore);
        }
        for (name, interval) in [
            ("tick interval", self.tick_interval),
            ("frame interval", self.frame_interval),
            ("input timeout", self.input_timeout),
            ("network timeout", self.net_timeout),
        ] {
            if interval.is_zero() {
                return Err(ConfigError::ZeroInterval(name));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("playfield width {0} is below the minimum of {min}", min = MIN_WIDTH)]
    TooNarrow(u16),
    #[error("playfield height {0} is below the minimum of {min}", min = MIN_HEIGHT)]
    TooShort(u16),
    #[error("paddle size {paddle_size} must be between 1 and the playfield height {height}")]
    PaddleSize { paddle_size: u16, height: u16 },
    #[error("win score must be positive")]
    ZeroWinScore,
    #[error("{0} must be non-zero")]
    ZeroInterval(&'static str),
}
