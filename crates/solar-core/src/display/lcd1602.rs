//! HD44780 16x2 LCD behind a PCF8574 I2C backpack
//!
//! The backpack exposes the LCD in 4-bit mode. Each I2C byte maps to:
//!
//! | bit | signal    |
//! |-----|-----------|
//! | 0   | RS        |
//! | 1   | RW        |
//! | 2   | EN        |
//! | 3   | backlight |
//! | 4-7 | D4-D7     |

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use log::error;

use super::{COLUMNS, CharDisplay, DisplayError, ROWS};

// =============================================================================
// I2C Address
// =============================================================================

/// Default backpack address (A0-A2 open).
pub const I2C_ADDR: u8 = 0x27;

// =============================================================================
// Backpack bits
// =============================================================================

pub const RS: u8 = 0x01;
pub const EN: u8 = 0x04;
pub const BACKLIGHT: u8 = 0x08;

// =============================================================================
// HD44780 commands
// =============================================================================

pub const CMD_CLEAR: u8 = 0x01;
pub const CMD_ENTRY_MODE_INCREMENT: u8 = 0x06;
pub const CMD_DISPLAY_ON: u8 = 0x0C;
pub const CMD_FUNCTION_4BIT_2LINE: u8 = 0x28;
pub const CMD_SET_DDRAM: u8 = 0x80;

/// DDRAM address of the first column of each row.
const ROW_OFFSETS: [u8; ROWS as usize] = [0x00, 0x40];

/// Character ROM code for the degree sign.
const DEGREE_SIGN: u8 = 0xDF;

pub struct Lcd1602<I, D> {
    i2c: I,
    delay: D,
    address: u8,
    backlight: u8,
    column: u8,
}

impl<I: I2c, D: DelayNs> Lcd1602<I, D> {
    pub fn new(i2c: I, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
            backlight: BACKLIGHT,
            column: 0,
        }
    }

    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }

    async fn write_raw(&mut self, byte: u8) -> Result<(), DisplayError> {
        self.i2c.write(self.address, &[byte]).await.map_err(|e| {
            error!("LCD I2C write to 0x{:02X} failed: {:?}", self.address, e);
            DisplayError::Bus
        })
    }

    /// Clock one nibble (already in the high four bits) into the controller.
    async fn pulse(&mut self, nibble: u8, mode: u8) -> Result<(), DisplayError> {
        let byte = (nibble & 0xF0) | mode | self.backlight;
        self.write_raw(byte | EN).await?;
        self.delay.delay_us(1).await;
        self.write_raw(byte).await?;
        self.delay.delay_us(50).await;
        Ok(())
    }

    async fn send(&mut self, value: u8, mode: u8) -> Result<(), DisplayError> {
        self.pulse(value & 0xF0, mode).await?;
        self.pulse(value << 4, mode).await
    }

    async fn command(&mut self, command: u8) -> Result<(), DisplayError> {
        self.send(command, 0).await
    }

    async fn data(&mut self, value: u8) -> Result<(), DisplayError> {
        self.send(value, RS).await
    }
}

/// Map a char onto the HD44780 A00 character ROM.
fn rom_code(ch: char) -> u8 {
    match ch {
        '°' => DEGREE_SIGN,
        ' '..='}' => ch as u8,
        _ => b'?',
    }
}

impl<I: I2c, D: DelayNs> CharDisplay for Lcd1602<I, D> {
    async fn init(&mut self) -> Result<(), DisplayError> {
        // Power-on settling time
        self.delay.delay_ms(50).await;
        self.write_raw(self.backlight).await?;

        // Force 8-bit mode three times, then switch to 4-bit.
        self.pulse(0x30, 0).await?;
        self.delay.delay_us(4_500).await;
        self.pulse(0x30, 0).await?;
        self.delay.delay_us(4_500).await;
        self.pulse(0x30, 0).await?;
        self.delay.delay_us(150).await;
        self.pulse(0x20, 0).await?;

        self.command(CMD_FUNCTION_4BIT_2LINE).await?;
        self.command(CMD_DISPLAY_ON).await?;
        self.clear().await?;
        self.command(CMD_ENTRY_MODE_INCREMENT).await
    }

    async fn clear(&mut self) -> Result<(), DisplayError> {
        self.command(CMD_CLEAR).await?;
        self.delay.delay_ms(2).await;
        self.column = 0;
        Ok(())
    }

    async fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), DisplayError> {
        if col >= COLUMNS || row >= ROWS {
            return Err(DisplayError::OutOfBounds { col, row });
        }
        self.column = col;
        self.command(CMD_SET_DDRAM | (col + ROW_OFFSETS[row as usize])).await
    }

    async fn print(&mut self, text: &str) -> Result<(), DisplayError> {
        for ch in text.chars() {
            if self.column >= COLUMNS {
                break;
            }
            self.data(rom_code(ch)).await?;
            self.column += 1;
        }
        Ok(())
    }
}
