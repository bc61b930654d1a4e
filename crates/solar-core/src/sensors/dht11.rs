//! DHT11 temperature/humidity sensor driver
//!
//! Bit-banged single-wire protocol over one open-drain GPIO with a pull-up.
//! The host pulls the line low for at least 18 ms, releases it, and the sensor
//! answers with an 80 us low / 80 us high preamble followed by 40 data bits.
//! Every bit starts with a ~50 us low pulse; the length of the following high
//! pulse encodes the value (26-28 us for `0`, ~70 us for `1`).
//!
//! Timing is measured by polling the pin once per microsecond, so callers on
//! real hardware should run [`Dht11::measure`] with interrupts masked.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use thiserror_no_std::Error;

use super::TemperatureProbe;

/// Bytes per frame: humidity, humidity decimal, temperature, temperature decimal, checksum.
pub const FRAME_LEN: usize = 5;

const FRAME_BITS: usize = FRAME_LEN * 8;
const START_SIGNAL_MS: u32 = 20;
const RESPONSE_TIMEOUT_US: u32 = 200;
const BIT_TIMEOUT_US: u32 = 120;
/// High pulses longer than this decode as `1`.
const ONE_THRESHOLD_US: u32 = 40;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhtError {
    #[error("DHT11 checksum mismatch")]
    Checksum,
    #[error("DHT11 read timed out")]
    Timeout,
}

impl DhtError {
    /// Numeric sentinel commonly used by DHT11 libraries.
    pub const fn code(self) -> u8 {
        match self {
            Self::Checksum => 254,
            Self::Timeout => 253,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Checksum => "Error 254: checksum mismatch while reading from DHT11",
            Self::Timeout => "Error 253: reading from DHT11 timed out",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dht11Measurement {
    pub humidity_percent: u8,
    pub temperature_celsius: i16,
    pub temperature_tenths: u8,
}

/// Validate the checksum and unpack a raw frame.
pub fn decode_frame(frame: &[u8; FRAME_LEN]) -> Result<Dht11Measurement, DhtError> {
    let sum = frame[..4]
        .iter()
        .fold(0u8, |acc, byte| acc.wrapping_add(*byte));
    if sum != frame[4] {
        return Err(DhtError::Checksum);
    }

    // Newer DHT11 revisions flag sub-zero readings in bit 7 of the decimal byte.
    let negative = frame[3] & 0x80 != 0;
    let magnitude = frame[2] as i16;

    Ok(Dht11Measurement {
        humidity_percent: frame[0],
        temperature_celsius: if negative { -magnitude } else { magnitude },
        temperature_tenths: frame[3] & 0x0F,
    })
}

pub struct Dht11<P, D> {
    pin: P,
    delay: D,
}

impl<P, D> Dht11<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    pub fn new(pin: P, delay: D) -> Self {
        Self { pin, delay }
    }

    /// Run one complete start/response/data exchange.
    pub fn measure(&mut self) -> Result<Dht11Measurement, DhtError> {
        self.start()?;
        self.read_frame()
    }

    /// Hold the line low long enough to wake the sensor.
    pub fn start(&mut self) -> Result<(), DhtError> {
        self.pin.set_low().map_err(|_| DhtError::Timeout)?;
        self.delay.delay_ms(START_SIGNAL_MS);
        self.pin.set_high().map_err(|_| DhtError::Timeout)
    }

    /// Release phase: sample the response preamble and the 40 data bits.
    ///
    /// Must follow [`Dht11::start`] immediately. This is the timing-critical
    /// part of the exchange (about 5 ms).
    pub fn read_frame(&mut self) -> Result<Dht11Measurement, DhtError> {
        // Response preamble
        self.wait_while(true, RESPONSE_TIMEOUT_US)?;
        self.wait_while(false, RESPONSE_TIMEOUT_US)?;
        self.wait_while(true, RESPONSE_TIMEOUT_US)?;

        let mut frame = [0u8; FRAME_LEN];
        for bit in 0..FRAME_BITS {
            self.wait_while(false, BIT_TIMEOUT_US)?;
            let high_us = self.wait_while(true, BIT_TIMEOUT_US)?;
            if high_us > ONE_THRESHOLD_US {
                frame[bit / 8] |= 0x80 >> (bit % 8);
            }
        }

        decode_frame(&frame)
    }

    /// Spin while the line sits at `level`, returning how many microseconds it stayed there.
    fn wait_while(&mut self, level: bool, timeout_us: u32) -> Result<u32, DhtError> {
        let mut elapsed_us = 0;
        loop {
            let high = self.pin.is_high().map_err(|_| DhtError::Timeout)?;
            if high != level {
                return Ok(elapsed_us);
            }
            if elapsed_us >= timeout_us {
                return Err(DhtError::Timeout);
            }
            self.delay.delay_us(1);
            elapsed_us += 1;
        }
    }
}

impl<P, D> TemperatureProbe for Dht11<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    async fn read_celsius(&mut self) -> Result<i16, DhtError> {
        self.measure().map(|m| m.temperature_celsius)
    }
}
