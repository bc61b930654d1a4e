//! Minimal HTTP/1.1 client over a [`Connection`]
//!
//! One request per connection, always with `Connection: close`. Responses are
//! read into memory up to a caller-supplied limit; both `Content-Length` and
//! chunked bodies are understood.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write as _;

use embedded_io_async::{Read, Write};
use log::debug;

use super::{Connection, Connector, NetError};

const READ_CHUNK: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub method: Method,
    pub path: &'a str,
    pub headers: &'a [(&'a str, &'a str)],
    pub content_type: Option<&'a str>,
    pub body: &'a [u8],
}

impl<'a> Request<'a> {
    pub const fn get(path: &'a str) -> Self {
        Self {
            method: Method::Get,
            path,
            headers: &[],
            content_type: None,
            body: &[],
        }
    }

    pub const fn post(path: &'a str, content_type: &'a str, body: &'a [u8]) -> Self {
        Self {
            method: Method::Post,
            path,
            headers: &[],
            content_type: Some(content_type),
            body,
        }
    }

    pub const fn with_headers(mut self, headers: &'a [(&'a str, &'a str)]) -> Self {
        self.headers = headers;
        self
    }

    /// Request line and headers, terminated by the blank line.
    pub fn head(&self, host: &str) -> String {
        let mut head = String::new();
        // Writing into a String cannot fail
        let _ = write!(head, "{} {} HTTP/1.1\r\n", self.method.as_str(), self.path);
        let _ = write!(head, "Host: {}\r\n", host);
        head.push_str("Connection: close\r\n");
        for (name, value) in self.headers {
            let _ = write!(head, "{}: {}\r\n", name, value);
        }
        if let Some(content_type) = self.content_type {
            let _ = write!(head, "Content-Type: {}\r\n", content_type);
        }
        if self.method == Method::Post || !self.body.is_empty() {
            let _ = write!(head, "Content-Length: {}\r\n", self.body.len());
        }
        head.push_str("\r\n");
        head
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_str(&self) -> Result<&str, NetError> {
        core::str::from_utf8(&self.body).map_err(|_| NetError::MalformedResponse)
    }
}

/// Write `request` to `conn`.
pub async fn send<W: Write>(conn: &mut W, host: &str, request: &Request<'_>) -> Result<(), NetError> {
    let head = request.head(host);
    conn.write_all(head.as_bytes()).await.map_err(NetError::io)?;
    if !request.body.is_empty() {
        conn.write_all(request.body).await.map_err(NetError::io)?;
    }
    conn.flush().await.map_err(NetError::io)
}

/// Read one response of at most `max_len` bytes (head and body together).
pub async fn receive<R: Read>(conn: &mut R, max_len: usize) -> Result<Response, NetError> {
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        if response_complete(&buf) {
            break;
        }
        let n = conn.read(&mut chunk).await.map_err(NetError::io)?;
        if n == 0 {
            break;
        }
        if buf.len() + n > max_len {
            return Err(NetError::ResponseTooLarge);
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    parse_response(&buf)
}

/// Open a connection, run one request/response exchange and close it again.
///
/// The connection is closed on every path, including errors.
pub async fn exchange<C: Connector>(
    connector: &mut C,
    host: &str,
    port: u16,
    request: &Request<'_>,
    max_len: usize,
) -> Result<Response, NetError> {
    let mut conn = connector.connect(host, port).await?;
    let result = async {
        send(&mut conn, host, request).await?;
        receive(&mut conn, max_len).await
    }
    .await;
    conn.close().await;

    if let Ok(response) = &result {
        debug!("{} {}{} -> {}", request.method.as_str(), host, request.path, response.status);
    }
    result
}

pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|window| window == b"\r\n\r\n")
}

/// Status code from `HTTP/1.x <code> <reason>`.
pub fn parse_status_line(line: &str) -> Result<u16, NetError> {
    let mut parts = line.split_ascii_whitespace();
    let version = parts.next().ok_or(NetError::MalformedResponse)?;
    if !version.starts_with("HTTP/1.") {
        return Err(NetError::MalformedResponse);
    }
    parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or(NetError::MalformedResponse)
}

fn header_value<'h>(head: &'h str, wanted: &str) -> Option<&'h str> {
    head.lines().skip(1).find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case(wanted)
            .then(|| value.trim())
    })
}

pub fn parse_content_length(head: &str) -> Result<Option<usize>, NetError> {
    header_value(head, "content-length")
        .map(|value| value.parse::<usize>().map_err(|_| NetError::MalformedResponse))
        .transpose()
}

fn is_chunked(head: &str) -> bool {
    header_value(head, "transfer-encoding").is_some_and(|v| v.eq_ignore_ascii_case("chunked"))
}

/// Whether `buf` already holds a whole response, so no more reads are needed.
fn response_complete(buf: &[u8]) -> bool {
    let Some(end) = find_header_end(buf) else {
        return false;
    };
    let Ok(head) = core::str::from_utf8(&buf[..end]) else {
        return false;
    };
    let body = &buf[end + 4..];
    if is_chunked(head) {
        return decode_chunked(body).is_ok();
    }
    match parse_content_length(head) {
        Ok(Some(len)) => body.len() >= len,
        _ => false,
    }
}

pub fn parse_response(buf: &[u8]) -> Result<Response, NetError> {
    let end = find_header_end(buf).ok_or(NetError::MalformedResponse)?;
    let head = core::str::from_utf8(&buf[..end]).map_err(|_| NetError::MalformedResponse)?;
    let status = parse_status_line(head.lines().next().unwrap_or(""))?;
    let raw_body = &buf[end + 4..];

    let body = if is_chunked(head) {
        decode_chunked(raw_body)?
    } else {
        match parse_content_length(head)? {
            Some(len) if raw_body.len() < len => return Err(NetError::MalformedResponse),
            Some(len) => raw_body[..len].to_vec(),
            // Body runs until the peer closed the connection
            None => raw_body.to_vec(),
        }
    };

    Ok(Response { status, body })
}

/// Reassemble a `Transfer-Encoding: chunked` body.
pub fn decode_chunked(mut raw: &[u8]) -> Result<Vec<u8>, NetError> {
    let mut body = Vec::new();
    loop {
        let line_end = raw
            .windows(2)
            .position(|w| w == b"\r\n")
            .ok_or(NetError::MalformedResponse)?;
        let size_line =
            core::str::from_utf8(&raw[..line_end]).map_err(|_| NetError::MalformedResponse)?;
        let size_hex = size_line.split(';').next().unwrap_or("").trim();
        let size =
            usize::from_str_radix(size_hex, 16).map_err(|_| NetError::MalformedResponse)?;
        raw = &raw[line_end + 2..];

        if size == 0 {
            return Ok(body);
        }
        // The size comes from the peer; never trust it for arithmetic
        let chunk_end = size.checked_add(2).ok_or(NetError::MalformedResponse)?;
        if raw.len() < chunk_end || &raw[size..chunk_end] != b"\r\n" {
            return Err(NetError::MalformedResponse);
        }
        body.extend_from_slice(&raw[..size]);
        raw = &raw[chunk_end..];
    }
}
