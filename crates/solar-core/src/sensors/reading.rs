/// Latest converted readings of every station sensor.
///
/// There is exactly one of these, owned by the monitor and overwritten in
/// place on every acquisition pass. Every stage that runs after acquisition
/// reads the same snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorReading {
    /// Panel voltage at the divider module input, in volts.
    pub panel_voltage: f32,
    /// Divider output seen by the ADC pin, in volts.
    pub mcu_voltage: f32,
    /// Panel current in amperes, already clamped to the noise floor.
    pub current: f32,
    /// Degrees Celsius; `None` until the first successful DHT11 read.
    pub temperature: Option<f32>,
    /// Raw light-dependent resistor sample.
    pub light_level: u16,
}
