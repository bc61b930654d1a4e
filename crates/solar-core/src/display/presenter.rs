use core::fmt::Write;

use embassy_time::{Duration, Instant};
use log::debug;

use super::{CharDisplay, DisplayError};
use crate::config::TimingConfig;
use crate::sensors::SensorReading;

/// The two data pages, shown in alternation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    /// Panel voltage and current.
    Power,
    /// Temperature and light level.
    Environment,
}

impl Page {
    pub const fn next(self) -> Self {
        match self {
            Self::Power => Self::Environment,
            Self::Environment => Self::Power,
        }
    }
}

/// Alternates the data pages on an explicit flip deadline.
///
/// [`Presenter::tick`] never sleeps; the caller wakes it at
/// [`Presenter::next_due`].
pub struct Presenter<D> {
    display: D,
    shown: Option<Page>,
    next_flip: Option<Instant>,
    power_dwell: Duration,
    environment_dwell: Duration,
}

impl<D: CharDisplay> Presenter<D> {
    pub fn new(display: D, timing: &TimingConfig) -> Self {
        Self {
            display,
            shown: None,
            next_flip: None,
            power_dwell: timing.power_page(),
            environment_dwell: timing.environment_page(),
        }
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn current_page(&self) -> Option<Page> {
        self.shown
    }

    /// `None` until the first page has been drawn, meaning "due now".
    pub fn next_due(&self) -> Option<Instant> {
        self.next_flip
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_flip.is_none_or(|at| now >= at)
    }

    pub fn dwell(&self, page: Page) -> Duration {
        match page {
            Page::Power => self.power_dwell,
            Page::Environment => self.environment_dwell,
        }
    }

    pub async fn init(&mut self) -> Result<(), DisplayError> {
        self.display.init().await
    }

    pub async fn show_splash(&mut self) -> Result<(), DisplayError> {
        self.two_lines((2, "Solar Power"), (4, "Monitor")).await
    }

    pub async fn show_connecting(&mut self) -> Result<(), DisplayError> {
        self.two_lines((6, "Wifi"), (1, "Connecting....")).await
    }

    pub async fn show_wifi_failed(&mut self) -> Result<(), DisplayError> {
        self.two_lines((2, "Wifi failed"), (0, "Running offline")).await
    }

    /// Draw the next page if its predecessor has had its dwell time.
    ///
    /// Returns `Ok(true)` when a page was drawn. The next deadline is armed
    /// before drawing, so a failing display does not redraw on every call.
    pub async fn tick(&mut self, now: Instant, reading: &SensorReading) -> Result<bool, DisplayError> {
        if !self.is_due(now) {
            return Ok(false);
        }

        let page = self.shown.map_or(Page::Power, Page::next);
        self.shown = Some(page);
        self.next_flip = Some(now + self.dwell(page));
        debug!("Showing {:?} page", page);

        match page {
            Page::Power => self.draw_power(reading).await?,
            Page::Environment => self.draw_environment(reading).await?,
        }
        Ok(true)
    }

    async fn draw_power(&mut self, reading: &SensorReading) -> Result<(), DisplayError> {
        let lcd = &mut self.display;
        lcd.clear().await?;
        lcd.set_cursor(3, 0).await?;
        lcd.print("Voltage:").await?;
        lcd.print_float(reading.panel_voltage, 1).await?;
        lcd.print("V").await?;
        lcd.set_cursor(3, 1).await?;
        lcd.print("Current:").await?;
        lcd.print_float(reading.current, 1).await?;
        lcd.print("A").await?;
        lcd.flush().await
    }

    async fn draw_environment(&mut self, reading: &SensorReading) -> Result<(), DisplayError> {
        let lcd = &mut self.display;
        lcd.clear().await?;
        lcd.set_cursor(0, 0).await?;
        lcd.print("Temperature:").await?;
        match reading.temperature {
            Some(celsius) => lcd.print_float(celsius, 1).await?,
            None => lcd.print("--").await?,
        }
        lcd.print("C").await?;
        lcd.set_cursor(3, 1).await?;
        lcd.print("Light:").await?;
        let mut light: heapless::String<6> = heapless::String::new();
        // u16 always fits
        let _ = write!(light, "{}", reading.light_level);
        lcd.print(&light).await?;
        lcd.flush().await
    }

    async fn two_lines(&mut self, top: (u8, &str), bottom: (u8, &str)) -> Result<(), DisplayError> {
        let lcd = &mut self.display;
        lcd.clear().await?;
        lcd.set_cursor(top.0, 0).await?;
        lcd.print(top.1).await?;
        lcd.set_cursor(bottom.0, 1).await?;
        lcd.print(bottom.1).await?;
        lcd.flush().await
    }
}
