//! Local serial link.
//!
//! The meters speak 8N1 with no flow control at a handful of fixed baud
//! rates, 9600 by default. The receive buffer is drained before each
//! request so that leftovers from an aborted exchange cannot shift the
//! length-driven reader off frame boundaries.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::debug;

use super::{read_exact_deadline, Transport, TransportError};

/// Baud rates the meter family is shipped with.
pub const SUPPORTED_BAUDS: [u32; 8] = [1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200];

/// Factory-default line speed.
pub const DEFAULT_BAUD: u32 = 9600;

/// Per-operation read deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

pub struct SerialLink {
    stream: Option<SerialStream>,
    timeout: Duration,
}

impl SerialLink {
    /// Open `device` at `baud`, 8N1 with no flow control.
    pub async fn open(device: &str, baud: u32, timeout: Duration) -> Result<Self, TransportError> {
        let stream = tokio_serial::new(device, baud)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|err| TransportError::Connect(io::Error::other(err)))?;
        debug!(device, baud, "serial link open");
        Ok(Self {
            stream: Some(stream),
            timeout,
        })
    }

    fn stream(&mut self) -> Result<&mut SerialStream, TransportError> {
        self.stream.as_mut().ok_or(TransportError::Closed)
    }
}

#[async_trait]
impl Transport for SerialLink {
    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream()?;
        stream.write_all(bytes).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        let deadline = self.timeout;
        read_exact_deadline(self.stream()?, n, deadline).await
    }

    async fn discard_input(&mut self) -> Result<(), TransportError> {
        self.stream()?
            .clear(ClearBuffer::Input)
            .map_err(|err| TransportError::Io(io::Error::other(err)))
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn shutdown(&mut self) -> Result<(), TransportError> {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            debug!("serial link closed");
        }
        Ok(())
    }
}
