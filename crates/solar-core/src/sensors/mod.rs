mod acquisition;
mod calibration;
pub mod dht11;
mod reading;

use thiserror_no_std::Error;

pub use acquisition::Acquisition;
pub use calibration::*;
pub use dht11::{Dht11, Dht11Measurement, DhtError};
pub use reading::SensorReading;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor}: failed to {operation}")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
    },
    #[error("{sensor}: channel not configured")]
    NotConfigured { sensor: &'static str },
}

/// Analog inputs wired to the station's ADC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogChannel {
    /// Output of the R1/R2 panel voltage divider module.
    PanelVoltage,
    /// Hall-effect current sensor output behind the R3/R4 divider.
    Current,
    /// Light-dependent resistor divider.
    Light,
}

impl AnalogChannel {
    pub const ALL: [AnalogChannel; 3] = [Self::PanelVoltage, Self::Current, Self::Light];

    pub const fn label(self) -> &'static str {
        match self {
            Self::PanelVoltage => "panel voltage",
            Self::Current => "current",
            Self::Light => "light",
        }
    }
}

/// Source of raw ADC samples, one conversion per call.
pub trait AnalogSampler {
    fn read(&mut self, channel: AnalogChannel) -> impl Future<Output = Result<u16, SensorError>>;
}

/// Single-shot digital temperature source.
pub trait TemperatureProbe {
    /// Read the temperature in whole degrees Celsius.
    fn read_celsius(&mut self) -> impl Future<Output = Result<i16, DhtError>>;
}
