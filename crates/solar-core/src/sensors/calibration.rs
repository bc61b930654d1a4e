//! Analog front-end calibration
//!
//! Converts raw ADC counts into physical units for the panel voltage divider
//! and the current sensor. Every conversion is a plain linear formula; nothing
//! is clamped except the current noise floor.

use serde::{Deserialize, Serialize};

/// Volts at the divider module input per ADC count, as `5.0 / 1165.0`.
///
/// The module reports 5 V at 1165 counts on this board.
pub const VOLTAGE_SCALE_VOLTS: f32 = 5.0;
pub const VOLTAGE_SCALE_COUNTS: f32 = 1165.0;

/// ADC reference voltage and full-scale count.
pub const ADC_REFERENCE_VOLTS: f32 = 3.3;
pub const ADC_FULL_SCALE_COUNTS: f32 = 4096.0;

/// Current sensor output at 0 A.
pub const CURRENT_ZERO_OFFSET_VOLTS: f32 = 2.5;
/// Current sensor sensitivity (5 A module).
pub const CURRENT_SENSITIVITY_VOLTS_PER_AMP: f32 = 0.185;
/// Currents below this are reported as exactly zero.
pub const CURRENT_NOISE_FLOOR_AMPS: f32 = 0.1;

/// Resistor values of the two voltage dividers, in ohms.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Panel divider, high side.
    pub r1: f32,
    /// Panel divider, low side.
    pub r2: f32,
    /// Current sensor divider, high side.
    pub r3: f32,
    /// Current sensor divider, low side.
    pub r4: f32,
}

impl Calibration {
    pub const DEFAULT: Self = Self {
        r1: 30_000.0,
        r2: 7_500.0,
        r3: 6_800.0,
        r4: 12_000.0,
    };

    /// `R2 / (R1 + R2)`
    #[inline]
    pub fn voltage_divider_ratio(&self) -> f32 {
        self.r2 / (self.r1 + self.r2)
    }

    /// `(R3 + R4) / R4`, undoing the divider in front of the current sensor.
    #[inline]
    pub fn current_bridge_ratio(&self) -> f32 {
        (self.r3 + self.r4) / self.r4
    }

    /// Panel voltage at the sensor input.
    #[inline]
    pub fn panel_voltage(&self, raw: u16) -> f32 {
        raw as f32 * VOLTAGE_SCALE_VOLTS / VOLTAGE_SCALE_COUNTS
    }

    /// Voltage after the panel divider, on the microcontroller side.
    #[inline]
    pub fn mcu_voltage(&self, raw: u16) -> f32 {
        self.panel_voltage(raw) * self.voltage_divider_ratio()
    }

    /// Current in amperes before the noise floor is applied. Can be negative.
    pub fn current_unclamped(&self, raw: u16) -> f32 {
        let adc_voltage = raw as f32 * (ADC_REFERENCE_VOLTS / ADC_FULL_SCALE_COUNTS);
        let sensor_voltage = adc_voltage * self.current_bridge_ratio();
        (sensor_voltage - CURRENT_ZERO_OFFSET_VOLTS) / CURRENT_SENSITIVITY_VOLTS_PER_AMP
    }

    /// Current in amperes with small and negative values forced to zero.
    pub fn current(&self, raw: u16) -> f32 {
        apply_noise_floor(self.current_unclamped(raw))
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Dead-zone filter: anything strictly below the noise floor reads as 0 A.
#[inline]
pub fn apply_noise_floor(amps: f32) -> f32 {
    if amps < CURRENT_NOISE_FLOOR_AMPS {
        0.0
    } else {
        amps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sample_is_zero_volts() {
        let cal = Calibration::DEFAULT;
        assert_eq!(cal.panel_voltage(0), 0.0);
        assert_eq!(cal.mcu_voltage(0), 0.0);
    }

    #[test]
    fn test_reference_sample_reads_five_volts() {
        let cal = Calibration::DEFAULT;
        assert_eq!(cal.panel_voltage(1165), 5.0);
        // 7.5k / 37.5k divider
        assert!((cal.mcu_voltage(1165) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_voltage_is_not_clamped_above_full_scale() {
        let cal = Calibration::DEFAULT;
        let v = cal.panel_voltage(4095);
        assert!((v - 4095.0 * 5.0 / 1165.0).abs() < 1e-4);
        assert!(v > 17.0);
    }

    #[test]
    fn test_divider_ratios() {
        let cal = Calibration::DEFAULT;
        assert!((cal.voltage_divider_ratio() - 0.2).abs() < 1e-6);
        assert!((cal.current_bridge_ratio() - 18_800.0 / 12_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_current_conversion() {
        let cal = Calibration::DEFAULT;
        // 2200 counts -> 1.772 V at the pin -> 2.777 V at the sensor
        let amps = cal.current(2200);
        assert!((amps - 1.4966).abs() < 0.01, "got {}", amps);
    }

    #[test]
    fn test_current_inside_dead_zone_is_zero() {
        let cal = Calibration::DEFAULT;
        let raw = cal.current_unclamped(1985);
        assert!(raw > 0.0 && raw < CURRENT_NOISE_FLOOR_AMPS, "got {}", raw);
        assert_eq!(cal.current(1985), 0.0);
    }

    #[test]
    fn test_negative_current_is_zero() {
        let cal = Calibration::DEFAULT;
        assert!(cal.current_unclamped(1900) < 0.0);
        assert_eq!(cal.current(1900), 0.0);
        assert_eq!(cal.current(0), 0.0);
    }

    #[test]
    fn test_noise_floor_boundary_is_exclusive() {
        assert_eq!(apply_noise_floor(0.1), 0.1);
        assert_eq!(apply_noise_floor(0.099_99), 0.0);
        assert_eq!(apply_noise_floor(0.0), 0.0);
        assert_eq!(apply_noise_floor(-3.0), 0.0);
        assert_eq!(apply_noise_floor(2.25), 2.25);
    }
}
