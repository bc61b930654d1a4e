use log::{error, info, warn};

use super::{AnalogChannel, AnalogSampler, Calibration, SensorError, SensorReading, TemperatureProbe};

/// Reads every station sensor and converts the samples into a [`SensorReading`].
pub struct Acquisition<A, T> {
    sampler: A,
    probe: T,
    calibration: Calibration,
}

impl<A, T> Acquisition<A, T>
where
    A: AnalogSampler,
    T: TemperatureProbe,
{
    pub fn new(sampler: A, probe: T, calibration: Calibration) -> Self {
        Self {
            sampler,
            probe,
            calibration,
        }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Refresh `reading` in place.
    ///
    /// A failed analog channel keeps its previous value and the remaining
    /// channels are still read; the first such failure is returned. A failed
    /// temperature read is only logged and leaves the last good value (or
    /// `None`) untouched.
    pub async fn sample(&mut self, reading: &mut SensorReading) -> Result<(), SensorError> {
        let mut first_error = None;

        for channel in AnalogChannel::ALL {
            match self.sampler.read(channel).await {
                Ok(raw) => self.apply(channel, raw, reading),
                Err(e) => {
                    error!("Failed to sample {}: {}", channel.label(), e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match self.probe.read_celsius().await {
            Ok(celsius) => {
                reading.temperature = Some(celsius as f32);
                info!("Temperature: {} °C", celsius);
            }
            Err(e) => warn!("{}", e.as_str()),
        }

        first_error.map_or(Ok(()), Err)
    }

    fn apply(&self, channel: AnalogChannel, raw: u16, reading: &mut SensorReading) {
        match channel {
            AnalogChannel::PanelVoltage => {
                reading.panel_voltage = self.calibration.panel_voltage(raw);
                reading.mcu_voltage = self.calibration.mcu_voltage(raw);
                info!(
                    "Solar Panel Voltage: {:.2} V (ADC side {:.2} V, raw {})",
                    reading.panel_voltage, reading.mcu_voltage, raw
                );
            }
            AnalogChannel::Current => {
                reading.current = self.calibration.current(raw);
                info!("Current: {:.2} A (raw {})", reading.current, raw);
            }
            AnalogChannel::Light => {
                reading.light_level = raw;
                info!("Light Intensity: {}", raw);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::DhtError;
    use crate::testing::{FixedSampler, ScriptedProbe};
    use embassy_futures::block_on;

    #[test]
    fn test_sample_converts_all_channels() {
        let sampler = FixedSampler::new(1165, 2200, 1234);
        let probe = ScriptedProbe::new(&[Ok(24)]);
        let mut acquisition = Acquisition::new(sampler, probe, Calibration::DEFAULT);
        let mut reading = SensorReading::default();

        block_on(acquisition.sample(&mut reading)).unwrap();

        assert_eq!(reading.panel_voltage, 5.0);
        assert!((reading.current - 1.4966).abs() < 0.01);
        assert_eq!(reading.light_level, 1234);
        assert_eq!(reading.temperature, Some(24.0));
    }

    #[test]
    fn test_temperature_failure_keeps_previous_value() {
        let sampler = FixedSampler::new(0, 0, 0);
        let probe = ScriptedProbe::new(&[Ok(21), Err(DhtError::Checksum), Err(DhtError::Timeout)]);
        let mut acquisition = Acquisition::new(sampler, probe, Calibration::DEFAULT);
        let mut reading = SensorReading::default();

        block_on(acquisition.sample(&mut reading)).unwrap();
        assert_eq!(reading.temperature, Some(21.0));

        block_on(acquisition.sample(&mut reading)).unwrap();
        assert_eq!(reading.temperature, Some(21.0));

        block_on(acquisition.sample(&mut reading)).unwrap();
        assert_eq!(reading.temperature, Some(21.0));
    }

    #[test]
    fn test_temperature_absent_until_first_success() {
        let sampler = FixedSampler::new(0, 0, 0);
        let probe = ScriptedProbe::new(&[Err(DhtError::Timeout)]);
        let mut acquisition = Acquisition::new(sampler, probe, Calibration::DEFAULT);
        let mut reading = SensorReading::default();

        block_on(acquisition.sample(&mut reading)).unwrap();
        assert_eq!(reading.temperature, None);
    }

    #[test]
    fn test_failed_channel_keeps_value_and_reports_error() {
        let mut sampler = FixedSampler::new(1165, 2200, 800);
        let probe = ScriptedProbe::new(&[Ok(20), Ok(20)]);
        sampler.fail(AnalogChannel::Current);
        let mut acquisition = Acquisition::new(sampler, probe, Calibration::DEFAULT);
        let mut reading = SensorReading {
            current: 3.5,
            ..SensorReading::default()
        };

        let result = block_on(acquisition.sample(&mut reading));

        assert!(matches!(result, Err(SensorError::ReadFailed { .. })));
        assert_eq!(reading.current, 3.5);
        assert_eq!(reading.panel_voltage, 5.0);
        assert_eq!(reading.light_level, 800);
        assert_eq!(reading.temperature, Some(20.0));
    }
}
