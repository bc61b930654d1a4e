//! Application-wide run state and error types for the solar monitor

use core::fmt::Write;

use thiserror_no_std::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRunState {
    Booting,
    WifiConnecting,
    Running,
    WifiFailed,
}

impl AppRunState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Booting => "booting",
            Self::WifiConnecting => "wifi connecting",
            Self::Running => "running",
            Self::WifiFailed => "wifi failed",
        }
    }
}

/// Tracks the coarse lifecycle of the device and logs every transition.
#[derive(Debug)]
pub struct AppState {
    run_state: AppRunState,
}

impl AppState {
    pub const fn new() -> Self {
        Self {
            run_state: AppRunState::Booting,
        }
    }

    pub fn run_state(&self) -> AppRunState {
        self.run_state
    }

    /// Move to `next`, returning `true` when the state actually changed.
    pub fn transition(&mut self, next: AppRunState) -> bool {
        if self.run_state == next {
            return false;
        }
        log::info!("Run state: {} -> {}", self.run_state.label(), next.label());
        self.run_state = next;
        true
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("WiFi connection failed: {0}")]
    Wifi(heapless::String<64>),
}

/// Builds a bounded string, cutting the input at the last char that fits.
pub trait FromTruncated<T> {
    fn from_truncated(value: T) -> Self;
}

impl<'a, const N: usize> FromTruncated<&'a str> for heapless::String<N> {
    fn from_truncated(value: &'a str) -> Self {
        let mut out = heapless::String::<N>::new();
        for ch in value.chars() {
            if out.write_char(ch).is_err() {
                break;
            }
        }
        out
    }
}
