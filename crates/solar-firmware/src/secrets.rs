//! Station secrets baked in at build time by `build.rs`

use solar_core::config::{BotConfig, Config, InternetConfig, TelemetryConfig};

pub const WIFI_SSID: &str = env!("SOLAR_WIFI_SSID");
pub const WIFI_PASSWORD: &str = env!("SOLAR_WIFI_PASSWORD");
pub const THINGSPEAK_API_KEY: &str = env!("SOLAR_THINGSPEAK_API_KEY");
pub const BOT_TOKEN: &str = env!("SOLAR_BOT_TOKEN");
pub const BOT_CHAT_ID: &str = env!("SOLAR_BOT_CHAT_ID");

pub fn config() -> Config<'static> {
    let mut bot = BotConfig {
        token: BOT_TOKEN,
        authorized_chat_id: BOT_CHAT_ID,
        ..BotConfig::default()
    };
    if let Some(name) = option_env!("SOLAR_BOT_FALLBACK_NAME") {
        bot.fallback_name = name;
    }

    Config {
        internet: InternetConfig {
            ssid: WIFI_SSID,
            password: WIFI_PASSWORD,
        },
        telemetry: TelemetryConfig {
            api_key: THINGSPEAK_API_KEY,
            ..TelemetryConfig::default()
        },
        bot,
        ..Config::default()
    }
}
