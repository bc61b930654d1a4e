//! Desktop simulator for the solar-monitor power station.
//!
//! Runs the `solar-core` monitor loop against synthetic hardware so the
//! display pages, bot replies and telemetry payloads can be exercised
//! without a board.
//!
//! # Inputs
//!
//! | Source            | Effect                                              |
//! |-------------------|-----------------------------------------------------|
//! | stdin line        | chat message from the authorized chat               |
//! | `@<id> <text>`    | chat message from chat `<id>`                       |
//! | `SOLAR_CONFIG`    | path to a JSON station config                       |
//! | `SOLAR_*` vars    | individual settings (see `.env.example`)            |
//! | `SOLAR_LIVE=1`    | post telemetry to the real collector over TCP       |
//!
//! The LCD is rendered to the log after every page flip.

use std::collections::VecDeque;
use std::io::BufRead;
use std::net::TcpStream;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use embassy_futures::block_on;
use embassy_time::Instant;
use embedded_io_async::{ErrorType, Read, Write};
use log::{error, info, warn};

use solar_core::bot::{BotError, BotTransport, CommandMessage, Update};
use solar_core::config::{BotConfig, Config, InternetConfig, TelemetryConfig};
use solar_core::display::{COLUMNS, CharDisplay, DisplayError, Presenter, ROWS};
use solar_core::monitor::Monitor;
use solar_core::net::{Connection, Connector, NetError};
use solar_core::schedule::SystemClock;
use solar_core::sensors::{
    ADC_FULL_SCALE_COUNTS, Acquisition, AnalogChannel, AnalogSampler, DhtError, SensorError,
    TemperatureProbe,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Every fifth DHT11 read fails, like a marginal wire.
const PROBE_FAILURE_PERIOD: u32 = 5;

const DEMO_CHAT_ID: &str = "1000";

/// Config strings borrow from leaked buffers so they live for the whole run.
fn leak(value: String) -> &'static str {
    Box::leak(value.into_boxed_str())
}

fn env_or(name: &str, fallback: &'static str) -> &'static str {
    std::env::var(name).map(leak).unwrap_or(fallback)
}

fn load_config() -> Config<'static> {
    if let Ok(path) = std::env::var("SOLAR_CONFIG") {
        match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<Config<'static>>(leak(text)) {
                Ok(config) => {
                    info!("Loaded station config from {}", path);
                    return config;
                }
                Err(e) => error!("Invalid config {}: {}", path, e),
            },
            Err(e) => error!("Cannot read {}: {}", path, e),
        }
    }

    let mut config = Config {
        internet: InternetConfig {
            ssid: env_or("SOLAR_WIFI_SSID", "simulated"),
            password: env_or("SOLAR_WIFI_PASSWORD", ""),
        },
        telemetry: TelemetryConfig {
            api_key: env_or("SOLAR_THINGSPEAK_API_KEY", "DEMOKEY"),
            ..TelemetryConfig::default()
        },
        bot: BotConfig {
            token: env_or("SOLAR_BOT_TOKEN", "demo-token"),
            authorized_chat_id: env_or("SOLAR_BOT_CHAT_ID", DEMO_CHAT_ID),
            ..BotConfig::default()
        },
        ..Config::default()
    };
    if let Ok(name) = std::env::var("SOLAR_BOT_FALLBACK_NAME") {
        config.bot.fallback_name = leak(name);
    }
    config
}

// ---------------------------------------------------------------------------
// Synthetic sensors
// ---------------------------------------------------------------------------

/// ADC counts that follow a compressed day: the panel voltage and light level
/// rise and fall together, the current follows with some ripple.
struct DaylightSampler {
    started: Instant,
}

impl DaylightSampler {
    fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// 0.0 at night, 1.0 at noon. One simulated day lasts ten minutes.
    fn sun(&self) -> f64 {
        let t = self.started.elapsed().as_millis() as f64 / 600_000.0;
        (t * core::f64::consts::TAU).sin().max(0.0)
    }
}

impl AnalogSampler for DaylightSampler {
    async fn read(&mut self, channel: AnalogChannel) -> Result<u16, SensorError> {
        let sun = self.sun();
        let ripple = (self.started.elapsed().as_millis() as f64 / 3_700.0).sin();
        let counts = match channel {
            // Up to roughly 20 V at the panel
            AnalogChannel::PanelVoltage => 200.0 + 4_400.0 * sun,
            // 2.5 V zero point through the 6k8/12k divider, up to ~1.2 A
            AnalogChannel::Current => 1_985.0 + 180.0 * sun + 8.0 * ripple,
            AnalogChannel::Light => 150.0 + 3_600.0 * sun + 40.0 * ripple,
        };
        Ok(counts.clamp(0.0, ADC_FULL_SCALE_COUNTS as f64 - 1.0) as u16)
    }
}

struct FlakyProbe {
    reads: u32,
}

impl TemperatureProbe for FlakyProbe {
    async fn read_celsius(&mut self) -> Result<i16, DhtError> {
        self.reads += 1;
        if self.reads % PROBE_FAILURE_PERIOD == 0 {
            return Err(if self.reads % 2 == 0 {
                DhtError::Checksum
            } else {
                DhtError::Timeout
            });
        }
        Ok(24 + (self.reads % 4) as i16)
    }
}

// ---------------------------------------------------------------------------
// Terminal LCD
// ---------------------------------------------------------------------------

/// 16x2 character grid dumped to the log on every flush.
struct TerminalLcd {
    cells: [[char; COLUMNS as usize]; ROWS as usize],
    col: u8,
    row: u8,
}

impl TerminalLcd {
    fn new() -> Self {
        Self {
            cells: [[' '; COLUMNS as usize]; ROWS as usize],
            col: 0,
            row: 0,
        }
    }
}

impl CharDisplay for TerminalLcd {
    async fn init(&mut self) -> Result<(), DisplayError> {
        info!("LCD {}x{} ready", COLUMNS, ROWS);
        Ok(())
    }

    async fn clear(&mut self) -> Result<(), DisplayError> {
        self.cells = [[' '; COLUMNS as usize]; ROWS as usize];
        self.col = 0;
        self.row = 0;
        Ok(())
    }

    async fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), DisplayError> {
        if col >= COLUMNS || row >= ROWS {
            return Err(DisplayError::OutOfBounds { col, row });
        }
        self.col = col;
        self.row = row;
        Ok(())
    }

    async fn print(&mut self, text: &str) -> Result<(), DisplayError> {
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
        let border: String = "-".repeat(COLUMNS as usize);
        info!("+{}+", border);
        for row in &self.cells {
            info!("|{}|", row.iter().collect::<String>());
        }
        info!("+{}+", border);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Console bot
// ---------------------------------------------------------------------------

/// Turns stdin lines into bot updates and prints the replies.
struct ConsoleBot {
    lines: Receiver<String>,
    pending: VecDeque<Update>,
    next_id: i64,
    default_chat: &'static str,
}

impl ConsoleBot {
    fn spawn(default_chat: &'static str) -> Self {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self {
            lines: rx,
            pending: VecDeque::new(),
            next_id: 1,
            default_chat,
        }
    }

    fn parse(&self, line: &str) -> CommandMessage {
        let (chat_id, text) = match line.strip_prefix('@').and_then(|rest| rest.split_once(' ')) {
            Some((chat, text)) => (chat.to_owned(), text.trim().to_owned()),
            None => (self.default_chat.to_owned(), line.trim().to_owned()),
        };
        CommandMessage {
            chat_id,
            sender_name: String::from("Operator"),
            text,
        }
    }
}

impl BotTransport for ConsoleBot {
    async fn get_updates(&mut self, offset: i64) -> Result<Vec<Update>, BotError> {
        while let Ok(line) = self.lines.try_recv() {
            if line.trim().is_empty() {
                continue;
            }
            let message = self.parse(&line);
            self.pending.push_back(Update {
                id: self.next_id,
                message: Some(message),
            });
            self.next_id += 1;
        }

        // Confirmed updates are forgotten, as the real API does
        self.pending.retain(|update| update.id >= offset);
        Ok(self.pending.iter().take(1).cloned().collect())
    }

    async fn send_message(&mut self, chat_id: &str, text: &str) -> Result<(), BotError> {
        println!("[bot -> {}]\n{}", chat_id, text);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Telemetry transport
// ---------------------------------------------------------------------------

/// Stands in for the collector, answering every update with a fresh entry id.
struct LoopbackCollector {
    entries: u32,
}

struct LoopbackExchange<'a> {
    entries: &'a mut u32,
    request: Vec<u8>,
    reply: Vec<u8>,
    pos: usize,
}

impl ErrorType for LoopbackExchange<'_> {
    type Error = embedded_io::ErrorKind;
}

impl Read for LoopbackExchange<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.reply.is_empty() {
            *self.entries += 1;
            let body = self.entries.to_string();
            self.reply = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            )
            .into_bytes();
        }
        let n = buf.len().min(self.reply.len() - self.pos);
        buf[..n].copy_from_slice(&self.reply[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Write for LoopbackExchange<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.request.extend_from_slice(buf);
        Ok(buf.len())
    }
}

impl Connection for LoopbackExchange<'_> {
    async fn close(&mut self) {
        let request = String::from_utf8_lossy(&self.request);
        if let Some((_, body)) = request.split_once("\r\n\r\n") {
            info!("Collector received: {}", body);
        }
    }
}

/// Plain blocking sockets; the simulator runs one exchange at a time.
struct StdConnector;

struct StdConnection(TcpStream);

impl ErrorType for StdConnection {
    type Error = std::io::Error;
}

impl Read for StdConnection {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(&mut self.0, buf)
    }
}

impl Write for StdConnection {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.0, buf)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0)
    }
}

impl Connection for StdConnection {
    async fn close(&mut self) {
        let _ = self.0.shutdown(std::net::Shutdown::Both);
    }
}

/// Either transport, picked at startup.
enum Collector {
    Loopback(LoopbackCollector),
    Live(StdConnector),
}

enum CollectorConnection<'a> {
    Loopback(LoopbackExchange<'a>),
    Live(StdConnection),
}

#[derive(Debug)]
struct CollectorIoError(embedded_io::ErrorKind);

impl core::fmt::Display for CollectorIoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl std::error::Error for CollectorIoError {}

impl embedded_io::Error for CollectorIoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        self.0
    }
}

impl ErrorType for CollectorConnection<'_> {
    type Error = CollectorIoError;
}

impl Read for CollectorConnection<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match self {
            Self::Loopback(c) => c.read(buf).await.map_err(CollectorIoError),
            Self::Live(c) => c
                .read(buf)
                .await
                .map_err(|e| CollectorIoError(embedded_io::Error::kind(&e))),
        }
    }
}

impl Write for CollectorConnection<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        match self {
            Self::Loopback(c) => c.write(buf).await.map_err(CollectorIoError),
            Self::Live(c) => c
                .write(buf)
                .await
                .map_err(|e| CollectorIoError(embedded_io::Error::kind(&e))),
        }
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        match self {
            Self::Loopback(_) => Ok(()),
            Self::Live(c) => c
                .flush()
                .await
                .map_err(|e| CollectorIoError(embedded_io::Error::kind(&e))),
        }
    }
}

impl Connection for CollectorConnection<'_> {
    async fn close(&mut self) {
        match self {
            Self::Loopback(c) => c.close().await,
            Self::Live(c) => c.close().await,
        }
    }
}

impl Connector for Collector {
    type Connection<'a> = CollectorConnection<'a>;

    async fn connect<'a>(
        &'a mut self,
        host: &str,
        port: u16,
    ) -> Result<CollectorConnection<'a>, NetError> {
        match self {
            Self::Loopback(collector) => Ok(CollectorConnection::Loopback(LoopbackExchange {
                entries: &mut collector.entries,
                request: Vec::new(),
                reply: Vec::new(),
                pos: 0,
            })),
            Self::Live(StdConnector) => {
                let stream = TcpStream::connect((host, port)).map_err(|e| {
                    warn!("TCP connect to {}:{} failed: {}", host, port, e);
                    NetError::Connect
                })?;
                let timeout = Some(Duration::from_secs(10));
                stream
                    .set_read_timeout(timeout)
                    .and_then(|_| stream.set_write_timeout(timeout))
                    .map_err(|_| NetError::Connect)?;
                Ok(CollectorConnection::Live(StdConnection(stream)))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = dotenvy::dotenv() {
        info!("No .env loaded ({}); using SOLAR_* from the environment", e);
    }

    info!("Starting solar-monitor simulator");
    let config = load_config();
    info!(
        "Type a command (e.g. /status) to message the bot as chat {}; prefix with @<id> to use another chat",
        config.bot.authorized_chat_id
    );

    let mut presenter = Presenter::new(TerminalLcd::new(), &config.timing);
    block_on(async {
        if let Err(e) = presenter.init().await {
            error!("LCD init failed: {}", e);
        }
        let _ = presenter.show_splash().await;
    });
    std::thread::sleep(config.timing.splash().into());

    let collector = if std::env::var("SOLAR_LIVE").is_ok_and(|v| v == "1") {
        info!("Posting telemetry to {}:{}", config.telemetry.host, config.telemetry.port);
        Collector::Live(StdConnector)
    } else {
        Collector::Loopback(LoopbackCollector { entries: 0 })
    };

    let acquisition = Acquisition::new(
        DaylightSampler::new(),
        FlakyProbe { reads: 0 },
        config.calibration,
    );
    let bot = ConsoleBot::spawn(config.bot.authorized_chat_id);
    let mut monitor = Monitor::new(&config, SystemClock, acquisition, presenter, bot, collector);

    loop {
        let wake = block_on(monitor.step());
        let now = Instant::now();
        if wake > now {
            std::thread::sleep((wake - now).into());
        }
    }
}
