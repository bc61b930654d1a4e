//! Character display abstraction and the station's LCD pages

pub mod lcd1602;
mod presenter;

use core::fmt::Write;

use thiserror_no_std::Error;

pub use lcd1602::Lcd1602;
pub use presenter::{Page, Presenter};

/// Visible columns of the 16x2 module.
pub const COLUMNS: u8 = 16;
/// Visible rows of the 16x2 module.
pub const ROWS: u8 = 2;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayError {
    #[error("I2C write to display failed")]
    Bus,
    #[error("cursor ({col}, {row}) is outside the 16x2 grid")]
    OutOfBounds { col: u8, row: u8 },
}

/// Text-mode display with a fixed [`COLUMNS`] x [`ROWS`] grid.
///
/// Text printed past the last column is dropped.
pub trait CharDisplay {
    fn init(&mut self) -> impl Future<Output = Result<(), DisplayError>>;

    fn clear(&mut self) -> impl Future<Output = Result<(), DisplayError>>;

    fn set_cursor(&mut self, col: u8, row: u8) -> impl Future<Output = Result<(), DisplayError>>;

    fn print(&mut self, text: &str) -> impl Future<Output = Result<(), DisplayError>>;

    /// Print a number with a fixed count of decimal places.
    fn print_float(
        &mut self,
        value: f32,
        precision: usize,
    ) -> impl Future<Output = Result<(), DisplayError>> {
        async move {
            let mut text: heapless::String<{ COLUMNS as usize }> = heapless::String::new();
            // Anything wider than the grid would be clipped anyway.
            let _ = write!(text, "{:.*}", precision, value);
            self.print(&text).await
        }
    }

    /// Called once a full screen has been drawn.
    fn flush(&mut self) -> impl Future<Output = Result<(), DisplayError>> {
        async { Ok(()) }
    }
}
