//! Outbound connections used by the telemetry publisher and the bot client
//!
//! The core only sees byte streams. Address resolution, sockets and TLS are
//! provided by the platform through [`Connector`].

pub mod http;

use embedded_io_async::{Read, Write};
use thiserror_no_std::Error;

pub use embedded_io::ErrorKind;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetError {
    #[error("network link is down")]
    NotConnected,
    #[error("DNS lookup failed")]
    Dns,
    #[error("TCP connect failed")]
    Connect,
    #[error("socket I/O failed: {0:?}")]
    Io(ErrorKind),
    #[error("TLS handshake or record failure")]
    Tls,
    #[error("malformed HTTP response")]
    MalformedResponse,
    #[error("HTTP response exceeds buffer")]
    ResponseTooLarge,
}

impl NetError {
    /// Map any `embedded-io` error onto [`NetError::Io`].
    pub fn io<E: embedded_io::Error>(error: E) -> Self {
        Self::Io(error.kind())
    }
}

/// An open, bidirectional byte stream to one remote host.
pub trait Connection: Read + Write {
    /// Shut the stream down. Errors while closing are not reported.
    fn close(&mut self) -> impl Future<Output = ()>;
}

/// Opens [`Connection`]s by host name.
///
/// A connector hands out one connection at a time; the connection borrows
/// the connector's socket buffers until it is dropped.
pub trait Connector {
    type Connection<'a>: Connection
    where
        Self: 'a;

    fn connect<'a>(
        &'a mut self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = Result<Self::Connection<'a>, NetError>>;
}
