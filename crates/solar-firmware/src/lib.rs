//! ESP32 firmware-specific modules for solar-monitor
//!
//! Concrete adapters for the `solar-core` ports: the ADC1 sampler, the
//! interrupt-guarded DHT11, the embassy-net TCP and TLS connectors and the
//! esp-radio WiFi join. None of this compiles for desktop targets.

#![no_std]

extern crate alloc;

pub mod adc;
pub mod dht;
pub mod net;
pub mod secrets;
pub mod wifi;

pub use solar_core::app_state::*;
