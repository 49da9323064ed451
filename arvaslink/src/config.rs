//! Session configuration.
//!
//! Configuration mistakes fail eagerly at [`crate::Meter::connect`];
//! nothing is sent on the wire with an address or line speed the
//! protocol cannot carry.

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::transport::serial::{DEFAULT_BAUD, SUPPORTED_BAUDS};
use crate::transport::{serial, tcp};
use crate::variant::Variant;

/// Network addresses the frame format can carry.
pub const MIN_ADDRESS: u8 = 1;
pub const MAX_ADDRESS: u8 = 247;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("device address {0} outside {MIN_ADDRESS}..={MAX_ADDRESS}")]
    InvalidAddress(u8),

    #[error("unsupported baud rate {0}")]
    UnsupportedBaud(u32),

    #[error("serial device name is empty")]
    EmptyDevice,

    #[error("tcp host is empty")]
    EmptyHost,
}

/// How to reach the meter.
#[derive(Debug, Clone)]
pub enum Link {
    Serial {
        device: String,
        baud: u32,
        timeout: Duration,
    },
    Tcp {
        host: String,
        port: u16,
        timeout: Duration,
    },
}

impl Link {
    /// Serial link with the default baud rate and timeout.
    pub fn serial(device: impl Into<String>) -> Self {
        Link::Serial {
            device: device.into(),
            baud: DEFAULT_BAUD,
            timeout: serial::DEFAULT_TIMEOUT,
        }
    }

    /// TCP link with the default port and timeout.
    pub fn tcp(host: impl Into<String>) -> Self {
        Link::Tcp {
            host: host.into(),
            port: tcp::DEFAULT_PORT,
            timeout: tcp::DEFAULT_TIMEOUT,
        }
    }
}

/// Everything needed to open a meter session.
#[derive(Debug, Clone)]
pub struct MeterConfig {
    pub link: Link,

    /// Network address of the meter on the link.
    pub address: u8,

    /// Pre-declare the firmware variant to skip identification.
    pub variant: Option<Variant>,

    /// Checked at every suspension point; a poll stops promptly once
    /// the token is cancelled and reports a partial reading.
    pub cancel: Option<CancellationToken>,
}

impl MeterConfig {
    pub fn new(link: Link) -> Self {
        Self {
            link,
            address: 1,
            variant: None,
            cancel: None,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_ADDRESS..=MAX_ADDRESS).contains(&self.address) {
            return Err(ConfigError::InvalidAddress(self.address));
        }
        match &self.link {
            Link::Serial { device, baud, .. } => {
                if device.is_empty() {
                    return Err(ConfigError::EmptyDevice);
                }
                if !SUPPORTED_BAUDS.contains(baud) {
                    return Err(ConfigError::UnsupportedBaud(*baud));
                }
            }
            Link::Tcp { host, .. } => {
                if host.is_empty() {
                    return Err(ConfigError::EmptyHost);
                }
            }
        }
        Ok(())
    }
}
