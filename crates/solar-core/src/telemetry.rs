//! ThingSpeak channel updates
//!
//! Readings are posted as a form body to `/update`. The collector answers with
//! the new entry id, or `0` when it rejected the update (bad key, or less than
//! 15 s since the previous one).

use alloc::string::String;
use core::fmt::Write;

use log::{info, warn};
use thiserror_no_std::Error;

use crate::config::TelemetryConfig;
use crate::net::http::{self, Request};
use crate::net::{Connector, NetError};
use crate::sensors::SensorReading;

pub const THINGSPEAK_HOST: &str = "api.thingspeak.com";
pub const UPDATE_PATH: &str = "/update";
pub const API_KEY_HEADER: &str = "X-THINGSPEAKAPIKEY";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// An update response is a short entry id.
const MAX_RESPONSE_LEN: usize = 2048;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("telemetry transport: {0}")]
    Net(#[from] NetError),
    #[error("collector answered HTTP {0}")]
    Status(u16),
    #[error("collector rejected the update")]
    Rejected,
}

/// `<key>&field1=<V>&field2=<A>&field3=<C>&field4=<light>`
///
/// Floats carry two decimals. A temperature that was never read leaves
/// `field3` empty so the collector skips it.
pub fn encode_payload(api_key: &str, reading: &SensorReading) -> String {
    let mut body = String::with_capacity(api_key.len() + 64);
    body.push_str(api_key);
    let _ = write!(body, "&field1={:.2}", reading.panel_voltage);
    let _ = write!(body, "&field2={:.2}", reading.current);
    body.push_str("&field3=");
    if let Some(celsius) = reading.temperature {
        let _ = write!(body, "{:.2}", celsius);
    }
    let _ = write!(body, "&field4={}", reading.light_level);
    body
}

pub struct TelemetryPublisher<'a, C> {
    connector: C,
    config: TelemetryConfig<'a>,
}

impl<'a, C: Connector> TelemetryPublisher<'a, C> {
    pub fn new(connector: C, config: TelemetryConfig<'a>) -> Self {
        Self { connector, config }
    }

    pub fn config(&self) -> &TelemetryConfig<'a> {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Post one reading. Returns the entry id the collector assigned, if it
    /// sent one back.
    pub async fn publish(&mut self, reading: &SensorReading) -> Result<Option<u32>, TelemetryError> {
        let body = encode_payload(self.config.api_key, reading);
        let headers = [(API_KEY_HEADER, self.config.api_key)];
        let request = Request::post(UPDATE_PATH, FORM_CONTENT_TYPE, body.as_bytes()).with_headers(&headers);

        let response = http::exchange(
            &mut self.connector,
            self.config.host,
            self.config.port,
            &request,
            MAX_RESPONSE_LEN,
        )
        .await
        .inspect_err(|e| warn!("ThingSpeak request failed: {}", e))?;

        if !response.is_success() {
            warn!("ThingSpeak answered HTTP {}", response.status);
            return Err(TelemetryError::Status(response.status));
        }

        let text = response.body_str().map(str::trim).unwrap_or("");
        if text == "0" {
            warn!("ThingSpeak rejected the update");
            return Err(TelemetryError::Rejected);
        }

        info!("Data sent to ThingSpeak");
        Ok(text.parse::<u32>().ok())
    }
}
