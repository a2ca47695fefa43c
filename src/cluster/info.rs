//! Info protocol client
//!
//! One framed round trip per request over a fresh TCP connection:
//!
//! ```text
//! ┌─────────┬──────┬──────────────────┬────────────────────┐
//! │ version │ type │ length (48 bit)  │ body               │
//! │   0x02  │ 0x01 │ big endian       │ "command\n"        │
//! └─────────┴──────┴──────────────────┴────────────────────┘
//! ```
//!
//! The node answers with the same header and a body of
//! `command\tvalue\n`; the echoed command and the newline are stripped.
//! No retries here: callers decide whether a failure is fatal.

use crate::cluster::handle::ClusterNode;
use crate::common::{Error, Result};
use bytes::{BufMut, BytesMut};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const PROTO_VERSION: u8 = 2;
const INFO_TYPE: u8 = 1;
const HEADER_LEN: usize = 8;
const LENGTH_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;
const MAX_RESPONSE_BYTES: u64 = 64 * 1024 * 1024;

/// Stateless info client; every request opens and closes its own connection
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpInfoClient;

impl TcpInfoClient {
    pub fn new() -> Self {
        Self
    }

    /// Send `command` to `node` and return the value part of the answer
    ///
    /// Connect, write and read share one `timeout`.
    pub async fn request(
        &self,
        node: &ClusterNode,
        command: &str,
        timeout: Duration,
    ) -> Result<String> {
        let address = node.address();
        let response = tokio::time::timeout(timeout, round_trip(&address, command))
            .await
            .map_err(|_| Error::protocol(&address, format!("no answer within {:?}", timeout)))?
            .map_err(|e| match e {
                Error::Io(io) => Error::protocol(&address, io),
                other => other,
            })?;

        tracing::debug!("Info request {} on {}: {}", command, address, response);
        Ok(response)
    }
}

pub(crate) fn encode_request(command: &str) -> BytesMut {
    let body_len = command.len() + 1;
    let mut buf = BytesMut::with_capacity(HEADER_LEN + body_len);
    buf.put_u8(PROTO_VERSION);
    buf.put_u8(INFO_TYPE);
    buf.put_uint(body_len as u64, 6);
    buf.put_slice(command.as_bytes());
    buf.put_u8(b'\n');
    buf
}

/// Body length announced by a response header
pub(crate) fn decode_header(address: &str, header: [u8; HEADER_LEN]) -> Result<usize> {
    let raw = u64::from_be_bytes(header);
    let version = header[0];
    let kind = header[1];
    if version != PROTO_VERSION || kind != INFO_TYPE {
        return Err(Error::protocol(
            address,
            format!("unexpected header version={} type={}", version, kind),
        ));
    }
    let len = raw & LENGTH_MASK;
    if len > MAX_RESPONSE_BYTES {
        return Err(Error::protocol(
            address,
            format!("response of {} bytes exceeds limit", len),
        ));
    }
    Ok(len as usize)
}

/// Strip the echoed `command\t` prefix and the trailing newline
pub(crate) fn extract_value<'a>(command: &str, body: &'a str) -> &'a str {
    let body = body.trim_end_matches('\n');
    body.strip_prefix(command)
        .and_then(|rest| rest.strip_prefix('\t'))
        .unwrap_or(body)
}

async fn round_trip(address: &str, command: &str) -> Result<String> {
    let mut stream = TcpStream::connect(address).await?;
    stream.set_nodelay(true)?;
    stream.write_all(&encode_request(command)).await?;

    let mut header = [0u8; HEADER_LEN];
    stream.read_exact(&mut header).await?;
    let len = decode_header(address, header)?;

    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;

    let body = String::from_utf8(body)
        .map_err(|e| Error::protocol(address, format!("response is not UTF-8: {}", e)))?;
    Ok(extract_value(command, &body).to_string())
}
