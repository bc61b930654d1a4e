use embassy_time::Duration;
use serde::{Deserialize, Serialize};

use crate::sensors::Calibration;

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct Config<'a> {
    pub internet: InternetConfig<'a>,
    pub telemetry: TelemetryConfig<'a>,
    pub bot: BotConfig<'a>,
    #[serde(default)]
    pub calibration: Calibration,
    #[serde(default)]
    pub timing: TimingConfig,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy)]
pub struct InternetConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

/// ThingSpeak collector settings.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct TelemetryConfig<'a> {
    #[serde(default = "default_telemetry_host")]
    pub host: &'a str,
    #[serde(default = "default_telemetry_port")]
    pub port: u16,
    pub api_key: &'a str,
    /// The collector rejects updates closer together than 15 s.
    #[serde(default = "default_publish_interval_ms")]
    pub publish_interval_ms: u64,
}

impl TelemetryConfig<'_> {
    pub const fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }
}

impl Default for TelemetryConfig<'_> {
    fn default() -> Self {
        Self {
            host: default_telemetry_host(),
            port: default_telemetry_port(),
            api_key: "",
            publish_interval_ms: default_publish_interval_ms(),
        }
    }
}

/// Telegram bot settings.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct BotConfig<'a> {
    pub token: &'a str,
    /// Only this chat may query the monitor.
    pub authorized_chat_id: &'a str,
    /// Greeting name used when the sender has no display name.
    #[serde(default = "default_fallback_name")]
    pub fallback_name: &'a str,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_update_limit")]
    pub update_limit: u8,
}

impl BotConfig<'_> {
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for BotConfig<'_> {
    fn default() -> Self {
        Self {
            token: "",
            authorized_chat_id: "",
            fallback_name: default_fallback_name(),
            poll_interval_ms: default_poll_interval_ms(),
            update_limit: default_update_limit(),
        }
    }
}

/// Loop pacing. All values in milliseconds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    /// DHT11 needs at least a second between reads.
    pub sample_interval_ms: u64,
    pub power_page_ms: u64,
    pub environment_page_ms: u64,
    pub splash_ms: u64,
}

impl TimingConfig {
    pub const fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub const fn power_page(&self) -> Duration {
        Duration::from_millis(self.power_page_ms)
    }

    pub const fn environment_page(&self) -> Duration {
        Duration::from_millis(self.environment_page_ms)
    }

    pub const fn splash(&self) -> Duration {
        Duration::from_millis(self.splash_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 2_000,
            power_page_ms: 5_000,
            environment_page_ms: 500,
            splash_ms: 2_000,
        }
    }
}

const fn default_telemetry_host() -> &'static str {
    crate::telemetry::THINGSPEAK_HOST
}

const fn default_telemetry_port() -> u16 {
    80
}

const fn default_publish_interval_ms() -> u64 {
    20_000
}

const fn default_fallback_name() -> &'static str {
    "Guest"
}

const fn default_poll_interval_ms() -> u64 {
    500
}

const fn default_update_limit() -> u8 {
    1
}
