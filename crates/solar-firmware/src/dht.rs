//! DHT11 on an open-drain GPIO with the bit phase run inside a critical section
//!
//! The WiFi driver's interrupts can stretch the 1 us polling loop enough to
//! misread bits, so the 40-bit read runs with interrupts masked. The 20 ms
//! start pulse does not need precise timing and stays interruptible.

use esp_hal::delay::Delay;
use esp_hal::gpio::{AnyPin, DriveMode, Flex, OutputConfig, Pull};
use log::debug;
use solar_core::sensors::{Dht11, DhtError, TemperatureProbe};

pub struct GuardedDht {
    sensor: Dht11<Flex<'static>, Delay>,
}

impl GuardedDht {
    pub fn new(pin: AnyPin<'static>) -> Self {
        let mut line = Flex::new(pin);
        line.apply_output_config(
            &OutputConfig::default()
                .with_drive_mode(DriveMode::OpenDrain)
                .with_pull(Pull::Up),
        );
        line.set_high();
        line.set_input_enable(true);
        line.set_output_enable(true);

        Self {
            sensor: Dht11::new(line, Delay::new()),
        }
    }
}

impl TemperatureProbe for GuardedDht {
    async fn read_celsius(&mut self) -> Result<i16, DhtError> {
        self.sensor.start()?;
        let measurement = critical_section::with(|_| self.sensor.read_frame())?;
        debug!(
            "DHT11: {}.{} C, {}% RH",
            measurement.temperature_celsius,
            measurement.temperature_tenths,
            measurement.humidity_percent
        );
        Ok(measurement.temperature_celsius)
    }
}
