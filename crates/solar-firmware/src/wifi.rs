//! Station-mode WiFi join and link supervision
//!
//! The boot path calls [`join`] once and waits for the outcome so the LCD can
//! report it. After that [`link_supervisor`] owns reconnection: it parks on the
//! disconnect event and rejoins with backoff.

use alloc::format;
use alloc::string::String;

use embassy_net::{Runner, Stack};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Timer, with_timeout};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiDevice, WifiError, WifiEvent};
use log::{info, warn};
use solar_core::app_state::{AppError, FromTruncated};
use solar_core::config::InternetConfig;
use solar_core::retry::{RetryPolicy, run_with_retry};
use thiserror_no_std::Error;

/// Shared between the boot-time join and the supervisor task.
pub type WifiMutex = Mutex<CriticalSectionRawMutex, WifiController<'static>>;

/// Pause after the supervisor exhausts a whole retry policy.
const REJOIN_PAUSE: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
enum JoinError {
    #[error("radio: {0:?}")]
    Radio(WifiError),
    #[error("association timed out")]
    AssociationTimeout,
    #[error("no DHCP lease")]
    DhcpTimeout,
}

/// Configure the station, start the radio and connect, retrying per `policy`.
///
/// Returns once the stack holds an IPv4 lease.
pub async fn join(
    wifi: &WifiMutex,
    stack: Stack<'static>,
    internet: &InternetConfig<'_>,
    policy: &RetryPolicy,
) -> Result<(), AppError> {
    {
        let mut controller = wifi.lock().await;
        let client = ModeConfig::Client(
            ClientConfig::default()
                .with_ssid(String::from(internet.ssid))
                .with_password(String::from(internet.password)),
        );
        controller.set_config(&client).map_err(|e| radio_error(&e))?;

        if !matches!(controller.is_started(), Ok(true)) {
            info!("Starting WiFi station");
            controller.start_async().await.map_err(|e| radio_error(&e))?;
        }
    }

    info!("Connecting to WiFi SSID \"{}\"", internet.ssid);
    run_with_retry(
        policy,
        |_| connect_once(wifi, stack, policy.attempt_timeout),
        Timer::after,
    )
    .await
    .map_err(|e| AppError::Wifi(FromTruncated::from_truncated(format!("{}", e).as_str())))?;

    if let Some(v4) = stack.config_v4() {
        info!("WiFi up, address {}", v4.address);
    }
    Ok(())
}

async fn connect_once(
    wifi: &WifiMutex,
    stack: Stack<'static>,
    timeout: Duration,
) -> Result<(), JoinError> {
    {
        let mut controller = wifi.lock().await;
        with_timeout(timeout, controller.connect_async())
            .await
            .map_err(|_| JoinError::AssociationTimeout)?
            .map_err(JoinError::Radio)?;
    }

    with_timeout(timeout, stack.wait_config_up())
        .await
        .map_err(|_| JoinError::DhcpTimeout)
}

fn radio_error(e: &WifiError) -> AppError {
    AppError::Wifi(FromTruncated::from_truncated(format!("{:?}", e).as_str()))
}

/// Waits for the link to drop and brings it back.
#[embassy_executor::task]
pub async fn link_supervisor(
    wifi: &'static WifiMutex,
    stack: Stack<'static>,
    internet: InternetConfig<'static>,
) {
    loop {
        {
            let mut controller = wifi.lock().await;
            if matches!(controller.is_connected(), Ok(true)) {
                controller.wait_for_event(WifiEvent::StaDisconnected).await;
            }
        }
        warn!("WiFi link lost; rejoining");

        match join(wifi, stack, &internet, &RetryPolicy::WIFI_JOIN).await {
            Ok(()) => info!("WiFi link restored"),
            Err(e) => {
                warn!("{}; next attempt in {} s", e, REJOIN_PAUSE.as_secs());
                Timer::after(REJOIN_PAUSE).await;
            }
        }
    }
}

#[embassy_executor::task]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}
