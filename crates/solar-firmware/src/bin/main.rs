#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_net::StackResources;
use embassy_sync::mutex::Mutex;
use embassy_time::Timer;
use esp_hal::clock::CpuClock;
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::rng::Rng;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info, warn};
use static_cell::{ConstStaticCell, StaticCell};

use solar_core::bot::TelegramClient;
use solar_core::display::{Lcd1602, Presenter, lcd1602};
use solar_core::monitor::Monitor;
use solar_core::retry::RetryPolicy;
use solar_core::schedule::SystemClock;
use solar_core::sensors::Acquisition;
use solar_firmware::adc::Esp32Sampler;
use solar_firmware::dht::GuardedDht;
use solar_firmware::net::{
    EspRng, TCP_BUFFER_LEN, TLS_READ_RECORD_LEN, TLS_WRITE_RECORD_LEN, TcpConnector, TlsConnector,
};
use solar_firmware::wifi::{self, WifiMutex};
use solar_firmware::{AppRunState, AppState, secrets};

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

// =============================================================================
// Static resources
// =============================================================================

static RADIO_CONTROLLER: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
static WIFI_CONTROLLER: StaticCell<WifiMutex> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();

static TELEMETRY_RX: ConstStaticCell<[u8; TCP_BUFFER_LEN]> = ConstStaticCell::new([0; TCP_BUFFER_LEN]);
static TELEMETRY_TX: ConstStaticCell<[u8; TCP_BUFFER_LEN]> = ConstStaticCell::new([0; TCP_BUFFER_LEN]);
static BOT_RX: ConstStaticCell<[u8; TCP_BUFFER_LEN]> = ConstStaticCell::new([0; TCP_BUFFER_LEN]);
static BOT_TX: ConstStaticCell<[u8; TCP_BUFFER_LEN]> = ConstStaticCell::new([0; TCP_BUFFER_LEN]);
static TLS_READ_RECORD: ConstStaticCell<[u8; TLS_READ_RECORD_LEN]> =
    ConstStaticCell::new([0; TLS_READ_RECORD_LEN]);
static TLS_WRITE_RECORD: ConstStaticCell<[u8; TLS_WRITE_RECORD_LEN]> =
    ConstStaticCell::new([0; TLS_WRITE_RECORD_LEN]);

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!(log::LevelFilter::Info);

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(size: 96 * 1024);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    let station = secrets::config();
    let mut app = AppState::new();

    // =========================================================================
    // Display
    // =========================================================================

    let i2c = I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(100)),
    )
    .expect("Failed to create I2C0")
    .with_sda(peripherals.GPIO21)
    .with_scl(peripherals.GPIO22)
    .into_async();

    let lcd = Lcd1602::new(i2c, embassy_time::Delay, lcd1602::I2C_ADDR);
    let mut presenter = Presenter::new(lcd, &station.timing);
    if let Err(e) = presenter.init().await {
        error!("LCD init failed: {}", e);
    }
    if let Err(e) = presenter.show_splash().await {
        warn!("Splash screen failed: {}", e);
    }
    Timer::after(station.timing.splash()).await;

    // =========================================================================
    // Sensors
    // =========================================================================

    let sampler = Esp32Sampler::new(
        peripherals.ADC1,
        peripherals.GPIO35,
        peripherals.GPIO36,
        peripherals.GPIO34,
    );
    let dht = GuardedDht::new(peripherals.GPIO2.into());
    let acquisition = Acquisition::new(sampler, dht, station.calibration);

    // =========================================================================
    // Network
    // =========================================================================

    app.transition(AppRunState::WifiConnecting);
    if let Err(e) = presenter.show_connecting().await {
        warn!("Connecting screen failed: {}", e);
    }

    let radio = RADIO_CONTROLLER.init(esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller"));
    let (wifi_controller, interfaces) = esp_radio::wifi::new(radio, peripherals.WIFI, Default::default())
        .expect("Failed to initialize Wi-Fi controller");
    let wifi_controller = WIFI_CONTROLLER.init(Mutex::new(wifi_controller));

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        NET_RESOURCES.init(StackResources::new()),
        seed,
    );
    spawner.spawn(wifi::net_task(runner)).expect("net_task spawn");

    match wifi::join(wifi_controller, stack, &station.internet, &RetryPolicy::WIFI_JOIN).await {
        Ok(()) => {
            app.transition(AppRunState::Running);
        }
        Err(e) => {
            error!("{}", e);
            app.transition(AppRunState::WifiFailed);
            if let Err(e) = presenter.show_wifi_failed().await {
                warn!("WiFi failure screen failed: {}", e);
            }
            Timer::after(station.timing.splash()).await;
        }
    }
    spawner
        .spawn(wifi::link_supervisor(wifi_controller, stack, station.internet))
        .expect("link_supervisor spawn");

    let telemetry = TcpConnector::new(stack, TELEMETRY_RX.take(), TELEMETRY_TX.take());
    let bot = TlsConnector::new(
        TcpConnector::new(stack, BOT_RX.take(), BOT_TX.take()),
        TLS_READ_RECORD.take(),
        TLS_WRITE_RECORD.take(),
        EspRng::new(),
    );

    // =========================================================================
    // Monitor loop
    // =========================================================================

    let mut monitor = Monitor::new(
        &station,
        SystemClock,
        acquisition,
        presenter,
        TelegramClient::new(bot, &station.bot),
        telemetry,
    );

    info!("Solar monitor running");
    loop {
        monitor.set_online(stack.is_config_up());
        let wake = monitor.step().await;
        Timer::at(wake).await;
    }
}
