//! embassy-net backed connectors
//!
//! [`TcpConnector`] serves the plain-HTTP telemetry endpoint and
//! [`TlsConnector`] wraps it in TLS 1.3 for the bot API. Both resolve the host
//! with the stack's DNS client and put a timeout on the socket so a stalled
//! peer cannot hold the monitor loop indefinitely.

use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_net::Stack;
use embassy_time::Duration;
use embedded_io_async::{ErrorType, Read, Write};
use embedded_tls::{Aes128GcmSha256, TlsConfig, TlsConnection, TlsContext, TlsError, UnsecureProvider};
use esp_hal::rng::Rng;
use log::{debug, error, warn};
use solar_core::net::{Connection, Connector, NetError};

/// Inactivity timeout applied to every socket.
pub const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

pub const TCP_BUFFER_LEN: usize = 4096;
/// Large enough for one full TLS record.
pub const TLS_READ_RECORD_LEN: usize = 16_640;
pub const TLS_WRITE_RECORD_LEN: usize = 4096;

// =============================================================================
// Plain TCP
// =============================================================================

pub struct TcpConnector<'s> {
    stack: Stack<'static>,
    rx_buffer: &'s mut [u8],
    tx_buffer: &'s mut [u8],
}

impl<'s> TcpConnector<'s> {
    pub fn new(stack: Stack<'static>, rx_buffer: &'s mut [u8], tx_buffer: &'s mut [u8]) -> Self {
        Self {
            stack,
            rx_buffer,
            tx_buffer,
        }
    }
}

pub struct TcpConnection<'a> {
    socket: TcpSocket<'a>,
}

impl ErrorType for TcpConnection<'_> {
    type Error = embassy_net::tcp::Error;
}

impl Read for TcpConnection<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.socket.read(buf).await
    }
}

impl Write for TcpConnection<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.socket.write(buf).await
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.socket.flush().await
    }
}

impl Connection for TcpConnection<'_> {
    async fn close(&mut self) {
        self.socket.close();
        if let Err(e) = self.socket.flush().await {
            debug!("TCP flush on close failed: {:?}", e);
        }
    }
}

impl Connector for TcpConnector<'_> {
    type Connection<'a>
        = TcpConnection<'a>
    where
        Self: 'a;

    async fn connect<'a>(&'a mut self, host: &str, port: u16) -> Result<TcpConnection<'a>, NetError> {
        if !self.stack.is_config_up() {
            return Err(NetError::NotConnected);
        }

        let addresses = self
            .stack
            .dns_query(host, DnsQueryType::A)
            .await
            .map_err(|e| {
                error!("DNS lookup for {} failed: {:?}", host, e);
                NetError::Dns
            })?;
        let address = addresses.first().copied().ok_or(NetError::Dns)?;

        let mut socket = TcpSocket::new(self.stack, self.rx_buffer, self.tx_buffer);
        socket.set_timeout(Some(SOCKET_TIMEOUT));
        socket.connect((address, port)).await.map_err(|e| {
            warn!("TCP connect to {}:{} failed: {:?}", host, port, e);
            NetError::Connect
        })?;

        debug!("Connected to {} ({}) port {}", host, address, port);
        Ok(TcpConnection { socket })
    }
}

// =============================================================================
// TLS
// =============================================================================

/// `rand_core` view of the hardware RNG. Only random once the radio is up.
#[derive(Clone, Copy)]
pub struct EspRng(Rng);

impl EspRng {
    pub fn new() -> Self {
        Self(Rng::new())
    }
}

impl Default for EspRng {
    fn default() -> Self {
        Self::new()
    }
}

impl rand_core::RngCore for EspRng {
    fn next_u32(&mut self) -> u32 {
        self.0.random()
    }

    fn next_u64(&mut self) -> u64 {
        ((self.0.random() as u64) << 32) | self.0.random() as u64
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let word = self.0.random().to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl rand_core::CryptoRng for EspRng {}

/// TLS over [`TcpConnector`].
///
/// The server certificate is not verified; the session is encrypted but not
/// authenticated.
pub struct TlsConnector<'s> {
    tcp: TcpConnector<'s>,
    read_record: &'s mut [u8],
    write_record: &'s mut [u8],
    rng: EspRng,
}

impl<'s> TlsConnector<'s> {
    pub fn new(
        tcp: TcpConnector<'s>,
        read_record: &'s mut [u8],
        write_record: &'s mut [u8],
        rng: EspRng,
    ) -> Self {
        Self {
            tcp,
            read_record,
            write_record,
            rng,
        }
    }
}

type Session<'a> = TlsConnection<'a, TcpConnection<'a>, Aes128GcmSha256>;

pub struct TlsStream<'a> {
    session: Option<Session<'a>>,
}

impl<'a> TlsStream<'a> {
    fn session(&mut self) -> Result<&mut Session<'a>, TlsError> {
        self.session.as_mut().ok_or(TlsError::ConnectionClosed)
    }
}

impl ErrorType for TlsStream<'_> {
    type Error = TlsError;
}

impl Read for TlsStream<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.session()?.read(buf).await
    }
}

impl Write for TlsStream<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.session()?.write(buf).await
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.session()?.flush().await
    }
}

impl Connection for TlsStream<'_> {
    async fn close(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        match session.close().await {
            Ok(mut tcp) => tcp.close().await,
            Err((mut tcp, e)) => {
                debug!("TLS close_notify failed: {:?}", e);
                tcp.close().await;
            }
        }
    }
}

impl Connector for TlsConnector<'_> {
    type Connection<'a>
        = TlsStream<'a>
    where
        Self: 'a;

    async fn connect<'a>(&'a mut self, host: &str, port: u16) -> Result<TlsStream<'a>, NetError> {
        let Self {
            tcp,
            read_record,
            write_record,
            rng,
        } = self;

        let socket = tcp.connect(host, port).await?;
        let config = TlsConfig::new().with_server_name(host);
        let mut session: Session<'a> =
            TlsConnection::new(socket, &mut **read_record, &mut **write_record);

        let provider = UnsecureProvider::new::<Aes128GcmSha256>(*rng);
        if let Err(e) = session.open(TlsContext::new(&config, provider)).await {
            // Dropping the session drops the socket with it
            error!("TLS handshake with {} failed: {:?}", host, e);
            return Err(NetError::Tls);
        }

        Ok(TlsStream {
            session: Some(session),
        })
    }
}
