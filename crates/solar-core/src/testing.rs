//! Hand-written fakes shared by the unit tests

use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::Cell;

use embassy_time::{Duration, Instant};
use embedded_hal::i2c::ErrorKind as I2cErrorKind;
use embedded_hal_async::i2c::{ErrorType, I2c, Operation};
use embedded_io::ErrorKind;
use embedded_io_async::{Read, Write};

use crate::bot::{BotError, BotTransport, Update};
use crate::display::{COLUMNS, CharDisplay, DisplayError, ROWS};
use crate::net::{Connection, Connector, NetError};
use crate::schedule::Clock;
use crate::sensors::{AnalogChannel, AnalogSampler, DhtError, SensorError, TemperatureProbe};

// =============================================================================
// Sensors
// =============================================================================

pub struct FixedSampler {
    voltage: u16,
    current: u16,
    light: u16,
    failing: Option<AnalogChannel>,
}

impl FixedSampler {
    pub fn new(voltage: u16, current: u16, light: u16) -> Self {
        Self {
            voltage,
            current,
            light,
            failing: None,
        }
    }

    pub fn fail(&mut self, channel: AnalogChannel) {
        self.failing = Some(channel);
    }
}

impl AnalogSampler for FixedSampler {
    async fn read(&mut self, channel: AnalogChannel) -> Result<u16, SensorError> {
        if self.failing == Some(channel) {
            return Err(SensorError::ReadFailed {
                sensor: channel.label(),
                operation: "sample",
            });
        }
        Ok(match channel {
            AnalogChannel::PanelVoltage => self.voltage,
            AnalogChannel::Current => self.current,
            AnalogChannel::Light => self.light,
        })
    }
}

/// Replays results in order, then times out forever.
pub struct ScriptedProbe {
    results: VecDeque<Result<i16, DhtError>>,
}

impl ScriptedProbe {
    pub fn new(results: &[Result<i16, DhtError>]) -> Self {
        Self {
            results: results.iter().copied().collect(),
        }
    }
}

impl TemperatureProbe for ScriptedProbe {
    async fn read_celsius(&mut self) -> Result<i16, DhtError> {
        self.results.pop_front().unwrap_or(Err(DhtError::Timeout))
    }
}

// =============================================================================
// Display
// =============================================================================

#[derive(Default)]
pub struct NoopDelay;

impl embedded_hal_async::delay::DelayNs for NoopDelay {
    async fn delay_ns(&mut self, _ns: u32) {}
}

/// Records every byte written over I2C.
#[derive(Default)]
pub struct RecordingI2c {
    bytes: Vec<u8>,
    addresses: Vec<u8>,
    fail: bool,
}

impl RecordingI2c {
    pub fn fail_writes(&mut self) {
        self.fail = true;
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    pub fn addresses(&self) -> &[u8] {
        &self.addresses
    }
}

impl ErrorType for RecordingI2c {
    type Error = I2cErrorKind;
}

impl I2c for RecordingI2c {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.fail {
            return Err(I2cErrorKind::Bus);
        }
        for operation in operations {
            if let Operation::Write(bytes) = operation {
                self.addresses.push(address);
                self.bytes.extend_from_slice(bytes);
            }
        }
        Ok(())
    }
}

/// In-memory 16x2 character grid.
pub struct GridDisplay {
    cells: [[char; COLUMNS as usize]; ROWS as usize],
    col: u8,
    row: u8,
    flushes: usize,
    ops: usize,
    fail_after: Option<usize>,
}

impl Default for GridDisplay {
    fn default() -> Self {
        Self {
            cells: [[' '; COLUMNS as usize]; ROWS as usize],
            col: 0,
            row: 0,
            flushes: 0,
            ops: 0,
            fail_after: None,
        }
    }
}

impl GridDisplay {
    /// Every operation after the first `ops` fails with a bus error.
    pub fn fail_after(&mut self, ops: usize) {
        self.fail_after = Some(ops);
    }

    pub fn row(&self, row: usize) -> String {
        let line: String = self.cells[row].iter().collect();
        String::from(line.trim_end())
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    fn op(&mut self) -> Result<(), DisplayError> {
        self.ops += 1;
        match self.fail_after {
            Some(limit) if self.ops > limit => Err(DisplayError::Bus),
            _ => Ok(()),
        }
    }
}

impl CharDisplay for GridDisplay {
    async fn init(&mut self) -> Result<(), DisplayError> {
        self.op()
    }

    async fn clear(&mut self) -> Result<(), DisplayError> {
        self.op()?;
        self.cells = [[' '; COLUMNS as usize]; ROWS as usize];
        self.col = 0;
        self.row = 0;
        Ok(())
    }

    async fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), DisplayError> {
        self.op()?;
        if col >= COLUMNS || row >= ROWS {
            return Err(DisplayError::OutOfBounds { col, row });
        }
        self.col = col;
        self.row = row;
        Ok(())
    }

    async fn print(&mut self, text: &str) -> Result<(), DisplayError> {
        self.op()?;
        for ch in text.chars() {
            if self.col >= COLUMNS {
                break;
            }
            self.cells[self.row as usize][self.col as usize] = ch;
            self.col += 1;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), DisplayError> {
        self.op()?;
        self.flushes += 1;
        Ok(())
    }
}

// =============================================================================
// Network
// =============================================================================

/// A byte stream that replays a canned reply and records what was written.
pub struct MockStream {
    reply: Vec<u8>,
    pos: usize,
    read_chunk: usize,
    fail_reads: bool,
    written: Vec<u8>,
}

impl MockStream {
    pub fn replying(reply: &[u8]) -> Self {
        Self {
            reply: reply.to_vec(),
            pos: 0,
            read_chunk: usize::MAX,
            fail_reads: false,
            written: Vec::new(),
        }
    }

    fn failing() -> Self {
        let mut stream = Self::replying(&[]);
        stream.fail_reads = true;
        stream
    }

    /// Hand out at most `len` bytes per read.
    pub fn set_read_chunk(&mut self, len: usize) {
        self.read_chunk = len;
    }

    pub fn unread(&self) -> usize {
        self.reply.len() - self.pos
    }
}

impl embedded_io_async::ErrorType for MockStream {
    type Error = ErrorKind;
}

impl Read for MockStream {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.fail_reads {
            return Err(ErrorKind::ConnectionReset);
        }
        let n = buf.len().min(self.read_chunk).min(self.unread());
        buf[..n].copy_from_slice(&self.reply[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Write for MockStream {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Hands out one [`MockStream`] per connect, in the order replies were queued.
#[derive(Default)]
pub struct MockConnector {
    replies: VecDeque<MockStream>,
    refuse: bool,
    attempts: usize,
    connected_to: Vec<(String, u16)>,
    sent: Vec<String>,
    closed: usize,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&mut self, reply: &[u8]) {
        self.replies.push_back(MockStream::replying(reply));
    }

    pub fn push_read_error(&mut self) {
        self.replies.push_back(MockStream::failing());
    }

    pub fn refuse_connections(&mut self) {
        self.refuse = true;
    }

    pub fn connect_attempts(&self) -> usize {
        self.attempts
    }

    pub fn connected_to(&self) -> &[(String, u16)] {
        &self.connected_to
    }

    /// Everything written, one entry per connection.
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    pub fn closed(&self) -> usize {
        self.closed
    }
}

pub struct MockConnection<'a> {
    owner: &'a mut MockConnector,
    stream: MockStream,
}

impl embedded_io_async::ErrorType for MockConnection<'_> {
    type Error = ErrorKind;
}

impl Read for MockConnection<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.stream.read(buf).await
    }
}

impl Write for MockConnection<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.stream.write(buf).await
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Connection for MockConnection<'_> {
    async fn close(&mut self) {
        let written = core::mem::take(&mut self.stream.written);
        self.owner.sent.push(String::from_utf8_lossy(&written).into_owned());
        self.owner.closed += 1;
    }
}

impl Connector for MockConnector {
    type Connection<'a> = MockConnection<'a>;

    async fn connect<'a>(&'a mut self, host: &str, port: u16) -> Result<MockConnection<'a>, NetError> {
        self.attempts += 1;
        if self.refuse {
            return Err(NetError::Connect);
        }
        self.connected_to.push((String::from(host), port));
        let stream = self
            .replies
            .pop_front()
            .unwrap_or_else(|| MockStream::replying(&[]));
        Ok(MockConnection { owner: self, stream })
    }
}

// =============================================================================
// Bot
// =============================================================================

pub struct ScriptedBot {
    batches: VecDeque<Vec<Update>>,
    offsets: Vec<i64>,
    sent: Vec<(String, String)>,
    failing_sends: usize,
    fetch_error: Option<BotError>,
}

impl ScriptedBot {
    pub fn new(batches: Vec<Vec<Update>>) -> Self {
        Self {
            batches: batches.into(),
            offsets: Vec::new(),
            sent: Vec::new(),
            failing_sends: 0,
            fetch_error: None,
        }
    }

    /// The next `count` sends fail.
    pub fn fail_sends(&mut self, count: usize) {
        self.failing_sends = count;
    }

    pub fn fail_next_fetch(&mut self, error: BotError) {
        self.fetch_error = Some(error);
    }

    pub fn offsets(&self) -> &[i64] {
        &self.offsets
    }

    pub fn sent(&self) -> &[(String, String)] {
        &self.sent
    }
}

impl BotTransport for ScriptedBot {
    async fn get_updates(&mut self, offset: i64) -> Result<Vec<Update>, BotError> {
        self.offsets.push(offset);
        if let Some(error) = self.fetch_error.take() {
            return Err(error);
        }
        Ok(self.batches.pop_front().unwrap_or_default())
    }

    async fn send_message(&mut self, chat_id: &str, text: &str) -> Result<(), BotError> {
        if self.failing_sends > 0 {
            self.failing_sends -= 1;
            return Err(BotError::Net(NetError::Io(ErrorKind::TimedOut)));
        }
        self.sent.push((String::from(chat_id), String::from(text)));
        Ok(())
    }
}

// =============================================================================
// Time
// =============================================================================

pub struct ManualClock {
    now: Cell<Instant>,
}

impl ManualClock {
    pub fn new(millis: u64) -> Self {
        Self {
            now: Cell::new(Instant::from_millis(millis)),
        }
    }

    pub fn set_millis(&self, millis: u64) {
        self.now.set(Instant::from_millis(millis));
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}
