//! TCP link, for meters behind a serial-to-network modem.
//!
//! One long-lived connection per client. The modem relays raw bytes;
//! there is no TLS and no framing beyond the meter protocol itself, so
//! a mid-frame connection loss surfaces as a short read.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time;
use tracing::debug;

use super::{read_exact_deadline, Transport, TransportError};

/// Port the common modem firmware listens on.
pub const DEFAULT_PORT: u16 = 5009;

/// Connect and per-operation read deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TcpLink {
    stream: Option<TcpStream>,
    timeout: Duration,
}

impl TcpLink {
    /// Connect to `host:port` within `timeout`.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, TransportError> {
        let stream = match time::timeout(timeout, TcpStream::connect((host, port))).await {
            Err(_) => return Err(TransportError::Timeout(timeout)),
            Ok(Err(err)) => return Err(TransportError::Connect(err)),
            Ok(Ok(stream)) => stream,
        };
        // Request frames are a handful of bytes; do not let Nagle sit on
        // them.
        stream.set_nodelay(true)?;
        debug!(host, port, "tcp link connected");
        Ok(Self {
            stream: Some(stream),
            timeout,
        })
    }

    fn stream(&mut self) -> Result<&mut TcpStream, TransportError> {
        self.stream.as_mut().ok_or(TransportError::Closed)
    }
}

#[async_trait]
impl Transport for TcpLink {
    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.stream()?.write_all(bytes).await?;
        Ok(())
    }

    async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        let deadline = self.timeout;
        read_exact_deadline(self.stream()?, n, deadline).await
    }

    async fn discard_input(&mut self) -> Result<(), TransportError> {
        // The modem only ever sends in response to a request; there is
        // no input buffer to drain on a stream socket.
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn shutdown(&mut self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            debug!("tcp link closed");
        }
        Ok(())
    }
}
