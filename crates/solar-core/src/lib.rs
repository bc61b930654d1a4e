//! Hardware-independent core library for solar-monitor
//!
//! This crate contains all platform-agnostic logic for the solar power
//! monitor: analog sensor conversion, the DHT11 and LCD1602 drivers written
//! against `embedded-hal`, the display pages, the ThingSpeak telemetry
//! publisher, the Telegram command dispatcher and the deadline-driven monitor
//! loop that ties them together.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both the
//! ESP32 firmware and desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod app_state;
pub mod bot;
pub mod config;
pub mod display;
pub mod monitor;
pub mod net;
pub mod retry;
pub mod schedule;
pub mod sensors;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;
