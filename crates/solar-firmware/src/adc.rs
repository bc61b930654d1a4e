//! ADC1 sampler for the three analog station inputs
//!
//! | channel       | pin    |
//! |---------------|--------|
//! | panel voltage | GPIO35 |
//! | current       | GPIO36 |
//! | light (LDR)   | GPIO34 |
//!
//! All pins use 11 dB attenuation so the full 0-3.3 V range maps onto
//! 0-4095 counts.

use esp_hal::Blocking;
use esp_hal::analog::adc::{Adc, AdcConfig, AdcPin, Attenuation};
use esp_hal::peripherals::{ADC1, GPIO34, GPIO35, GPIO36};
use solar_core::sensors::{AnalogChannel, AnalogSampler, SensorError};

pub type StationAdc = Adc<'static, ADC1<'static>, Blocking>;

pub struct Esp32Sampler {
    adc: StationAdc,
    voltage: AdcPin<GPIO35<'static>, ADC1<'static>>,
    current: AdcPin<GPIO36<'static>, ADC1<'static>>,
    light: AdcPin<GPIO34<'static>, ADC1<'static>>,
}

impl Esp32Sampler {
    pub fn new(
        adc1: ADC1<'static>,
        voltage: GPIO35<'static>,
        current: GPIO36<'static>,
        light: GPIO34<'static>,
    ) -> Self {
        let mut config = AdcConfig::new();
        let voltage = config.enable_pin(voltage, Attenuation::_11dB);
        let current = config.enable_pin(current, Attenuation::_11dB);
        let light = config.enable_pin(light, Attenuation::_11dB);
        Self {
            adc: Adc::new(adc1, config),
            voltage,
            current,
            light,
        }
    }
}

impl AnalogSampler for Esp32Sampler {
    async fn read(&mut self, channel: AnalogChannel) -> Result<u16, SensorError> {
        // A conversion takes a few microseconds; not worth yielding for.
        let raw = match channel {
            AnalogChannel::PanelVoltage => self.adc.read_blocking(&mut self.voltage),
            AnalogChannel::Current => self.adc.read_blocking(&mut self.current),
            AnalogChannel::Light => self.adc.read_blocking(&mut self.light),
        };
        Ok(raw)
    }
}
