//! Polling client for Arvas and Tesmart heat meters.
//!
//! The meters speak a half-duplex request/response byte protocol over a
//! local serial line or a TCP-attached modem. This crate frames and
//! checksums the requests, reads the length-prefixed responses,
//! identifies the firmware variant from the device's ASCII token, and
//! decodes that variant's memory layout into a normalized [`Reading`].
//!
//! ```no_run
//! use arvaslink::{Link, Meter, MeterConfig};
//!
//! # async fn poll() -> Result<(), arvaslink::MeterError> {
//! let mut meter = Meter::connect(MeterConfig::new(Link::tcp("10.0.0.17"))).await?;
//! let reading = meter.read_all().await?;
//! println!("Q = {:?}", reading.energy_q);
//! meter.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod command;
pub mod config;
pub mod decode;
pub mod exchange;
pub mod frame;
pub mod layout;
pub mod record;
pub mod transport;
pub mod variant;

pub use client::{Meter, MeterError};
pub use config::{ConfigError, Link, MeterConfig};
pub use record::{Reading, Status};
pub use variant::Variant;
