//! Serial line transport: open/close, buffer resets, and a
//! read-until-handshake primitive with a caller-supplied deadline.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{sleep, timeout};
use tokio_serial::{ClearBuffer, DataBits, Parity, SerialPort, SerialPortBuilderExt, SerialStream, StopBits};

use crate::frame::HANDSHAKE;

const BAUD_RATE: u32 = 9600;
const INTER_BYTE_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("read timed out after {0:?} waiting for the handshake block")]
    Timeout(Duration),
    #[error("transport is not open")]
    NotOpen,
}

/// Owns an (optional) open serial handle. Single-consumer, single-producer:
/// callers are responsible for not overlapping requests.
pub struct Transport {
    port: String,
    settle_delay: Duration,
    stream: Option<SerialStream>,
}

impl Transport {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            stream: None,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Open the serial line at 9600 8N1. If already open, closes first.
    /// Sleeps the settle delay before returning and flushes both buffers.
    pub async fn open(&mut self) -> Result<(), TransportError> {
        self.close();

        let mut stream = tokio_serial::new(&self.port, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(INTER_BYTE_TIMEOUT)
            .open_native_async()?;

        stream.clear(ClearBuffer::All)?;
        self.stream = Some(stream);

        sleep(self.settle_delay).await;

        if let Some(stream) = self.stream.as_mut() {
            stream.clear(ClearBuffer::All)?;
        }

        Ok(())
    }

    /// Flush buffers, write all bytes, flush.
    pub async fn write_command(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        stream.clear(ClearBuffer::All)?;
        stream.write_all(bytes).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Read bytes until the trailing 15 bytes equal the Handshake sequence,
    /// or `deadline` elapses.
    pub async fn read_until_handshake(&mut self, deadline: Duration) -> Result<Vec<u8>, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;

        let read_loop = async {
            let mut buf = Vec::new();
            let mut chunk = [0u8; 64];
            loop {
                if buf.len() >= 15 && buf[buf.len() - 15..] == HANDSHAKE {
                    return Ok(buf);
                }
                let n = stream.read(&mut chunk).await?;
                if n == 0 {
                    continue;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
        };

        match timeout(deadline, read_loop).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(deadline)),
        }
    }

    /// Idempotent; safe to call repeatedly or from a `Drop` impl.
    pub fn close(&mut self) {
        self.stream = None;
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}
