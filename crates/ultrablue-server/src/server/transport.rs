//! The seam to the BLE stack.
//!
//! A real adapter turns ATT write and read requests into [`GattRequest`]s.
//! [`LoopbackTransport`] is a line-based stand-in for bench work: it reads
//! `write <uuid> [hex]` and `read <uuid>` commands and answers `ok`,
//! `ok <hex>` or `err <att-code>`.

use anyhow::{anyhow, bail, Context, Result};
use tokio::io::{
    stdin, stdout, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin,
    Stdout,
};
use tracing::warn;
use ultrablue::AttErrorCode;
use uuid::Uuid;
use zeroize::Zeroizing;

/// An ATT request from the peer, addressed to a characteristic by UUID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattRequest {
    /// Write request carrying the raw attribute value.
    Write { uuid: Uuid, payload: Vec<u8> },
    /// Read request.
    Read { uuid: Uuid },
}

/// The answer sent back for one [`GattRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattResponse {
    /// The write was accepted.
    WriteAck,
    /// The attribute value for a read. Wiped from memory once dropped.
    Value(Zeroizing<Vec<u8>>),
    /// The request failed with this ATT error code.
    Error(AttErrorCode),
}

/// Source of peer requests and sink for the answers.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// The next request, or `None` once the peer has disconnected.
    async fn next_request(&mut self) -> Result<Option<GattRequest>>;

    async fn respond(&mut self, response: GattResponse) -> Result<()>;
}

/// Parses one loopback command line.
pub fn parse_request(line: &str) -> Result<GattRequest> {
    let mut words = line.split_whitespace();
    let verb = words.next().ok_or_else(|| anyhow!("Empty request"))?;
    if !matches!(verb, "write" | "read") {
        bail!("Unknown request {verb:?}");
    }
    let uuid = words
        .next()
        .ok_or_else(|| anyhow!("Missing characteristic UUID"))
        .and_then(|s| Uuid::parse_str(s).with_context(|| format!("Invalid UUID {s:?}")))?;

    let request = if verb == "write" {
        let payload = match words.next() {
            Some(hex_payload) => hex::decode(hex_payload).context("Payload is not valid hex")?,
            None => Vec::new(),
        };
        GattRequest::Write { uuid, payload }
    } else {
        GattRequest::Read { uuid }
    };
    if words.next().is_some() {
        bail!("Trailing input after request");
    }
    Ok(request)
}

/// Line-based transport over any async reader and writer. Lines that are not
/// valid requests, including lines that are not UTF-8, are answered with
/// `err <reason>` and skipped.
#[derive(Debug)]
pub struct LoopbackTransport<R, W> {
    reader: R,
    writer: W,
}

impl LoopbackTransport<BufReader<Stdin>, Stdout> {
    /// Requests on stdin, answers on stdout.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(stdin()), stdout())
    }
}

impl<R, W> LoopbackTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}

impl<R, W> Transport for LoopbackTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    async fn next_request(&mut self) -> Result<Option<GattRequest>> {
        let mut raw = Vec::new();
        loop {
            raw.clear();
            if self.reader.read_until(b'\n', &mut raw).await? == 0 {
                return Ok(None);
            }
            let parsed = match std::str::from_utf8(&raw) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    parse_request(line)
                }
                Err(e) => Err(anyhow::Error::new(e).context("Request is not valid UTF-8")),
            };
            match parsed {
                Ok(request) => return Ok(Some(request)),
                Err(e) => {
                    let input = String::from_utf8_lossy(&raw);
                    warn!("Ignoring loopback input {:?}: {e:#}", input.trim());
                    self.write_line(&format!("err {e}")).await?;
                }
            }
        }
    }

    async fn respond(&mut self, response: GattResponse) -> Result<()> {
        let line = match response {
            GattResponse::WriteAck => "ok".to_string(),
            GattResponse::Value(value) => format!("ok {}", hex::encode(value.as_slice())),
            GattResponse::Error(code) => format!("err {code}"),
        };
        self.write_line(&line).await
    }
}
