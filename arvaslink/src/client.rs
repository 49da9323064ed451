//! Meter session: identification, block reads, and the full poll.
//!
//! A session owns its link for its whole life. The firmware variant is
//! detected once and kept for the rest of the session; a failed block
//! read never poisons the session, it only leaves the affected fields
//! absent in that poll's reading.

use std::time::Duration;

use thiserror::Error;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::config::{ConfigError, Link, MeterConfig};
use crate::decode;
use crate::exchange::{exchange, ExchangeError};
use crate::layout::tesmart;
use crate::record::{Reading, Status};
use crate::transport::{SerialLink, TcpLink, Transport, TransportError};
use crate::variant::Variant;

/// Pause after a successful identification. The slowest firmware needs
/// this long before it will answer a data read.
pub const POST_IDENT_PAUSE: Duration = Duration::from_millis(500);

/// Pause between consecutive exchanges. Some firmware revisions drop
/// back-to-back requests; this is part of the wire contract, not tuning.
pub const INTER_EXCHANGE_PAUSE: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum MeterError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("identification exchange failed")]
    Identify(#[source] ExchangeError),

    #[error("unknown identification token {0:?}")]
    UnknownVariant(String),
}

/// Per-poll accounting feeding the reading's final status.
#[derive(Default)]
struct Tally {
    /// Blocks this variant defines.
    expected: usize,
    /// Blocks whose bytes actually arrived.
    fetched: usize,
    /// Whether every field defined by the fetched blocks decoded.
    complete: bool,
}

impl Tally {
    fn new() -> Self {
        Tally {
            complete: true,
            ..Tally::default()
        }
    }
}

/// A session with one meter over one link.
pub struct Meter {
    link: Box<dyn Transport>,
    address: u8,
    variant: Option<Variant>,
    cancel: CancellationToken,
}

impl Meter {
    /// Validate `config` and open the link.
    pub async fn connect(config: MeterConfig) -> Result<Self, MeterError> {
        config.validate()?;
        let link: Box<dyn Transport> = match &config.link {
            Link::Serial {
                device,
                baud,
                timeout,
            } => Box::new(SerialLink::open(device, *baud, *timeout).await?),
            Link::Tcp {
                host,
                port,
                timeout,
            } => Box::new(TcpLink::connect(host, *port, *timeout).await?),
        };
        Ok(Self {
            link,
            address: config.address,
            variant: config.variant,
            cancel: config.cancel.unwrap_or_default(),
        })
    }

    /// Close the link. The session cannot be used afterwards.
    pub async fn disconnect(&mut self) -> Result<(), MeterError> {
        Ok(self.link.shutdown().await?)
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_open()
    }

    /// Variant detected (or pre-declared) so far.
    pub fn variant(&self) -> Option<Variant> {
        self.variant
    }

    /// Identify the device. Idempotent: once a variant is known, no
    /// further Identify is put on the wire.
    pub async fn identify(&mut self) -> Result<Variant, MeterError> {
        match self.variant {
            Some(variant) => Ok(variant),
            None => self.reidentify().await,
        }
    }

    /// Force a fresh Identify exchange, replacing any cached variant.
    pub async fn reidentify(&mut self) -> Result<Variant, MeterError> {
        let payload = exchange(self.link.as_mut(), self.address, Command::Identify)
            .await
            .map_err(MeterError::Identify)?;
        let token: String = payload
            .iter()
            .filter(|b| b.is_ascii())
            .map(|&b| char::from(b))
            .collect();
        let token = token.trim().to_owned();
        let variant =
            Variant::from_ident(&token).ok_or_else(|| MeterError::UnknownVariant(token.clone()))?;
        info!(%variant, %token, "device identified");
        self.variant = Some(variant);
        time::sleep(POST_IDENT_PAUSE).await;
        Ok(variant)
    }

    /// Poll everything the variant defines: clock, totals, live values.
    ///
    /// Block-level failures are absorbed: the affected fields stay
    /// `None` and the status says so. Only an unidentifiable device is
    /// an error.
    pub async fn read_all(&mut self) -> Result<Reading, MeterError> {
        if self.cancel.is_cancelled() {
            return Ok(self.cancelled_reading());
        }
        let variant = self.identify().await?;
        let mut reading = Reading::new(variant);
        let mut tally = Tally::new();

        if variant == Variant::Tesmart {
            // Everything lives in the one assembled image; fetch it
            // once and decode all three aspects from it.
            tally.expected = 1;
            if let Some(image) = self.fetch_tesmart_image().await {
                tally.fetched = 1;
                tally.complete &= decode::tesmart_totals(&image, &mut reading);
                tally.complete &= decode::tesmart_instantaneous(&image, &mut reading);
                reading.time = decode::tesmart_time(&image);
                tally.complete &= reading.time.is_some();
            }
        } else {
            self.poll_rtc(variant, &mut reading, &mut tally).await;
            if self.cancel.is_cancelled() {
                reading.status = Status::PartialDecode;
                return Ok(reading);
            }
            self.pause().await;

            self.poll_totals(variant, &mut reading, &mut tally).await;
            if self.cancel.is_cancelled() {
                reading.status = Status::PartialDecode;
                return Ok(reading);
            }
            self.pause().await;

            self.poll_instantaneous(variant, &mut reading, &mut tally)
                .await;
        }

        finish(&mut reading, &tally);
        info!(%variant, status = %reading.status, "poll complete");
        Ok(reading)
    }

    /// Read only the device clock.
    pub async fn read_rtc(&mut self) -> Result<Reading, MeterError> {
        let variant = self.identify().await?;
        let mut reading = Reading::new(variant);
        let mut tally = Tally::new();
        self.poll_rtc(variant, &mut reading, &mut tally).await;
        finish(&mut reading, &tally);
        Ok(reading)
    }

    /// Read only the cumulative totals.
    pub async fn read_totals(&mut self) -> Result<Reading, MeterError> {
        let variant = self.identify().await?;
        let mut reading = Reading::new(variant);
        let mut tally = Tally::new();
        self.poll_totals(variant, &mut reading, &mut tally).await;
        finish(&mut reading, &tally);
        Ok(reading)
    }

    /// Read only the live temperatures and flows.
    pub async fn read_instantaneous(&mut self) -> Result<Reading, MeterError> {
        let variant = self.identify().await?;
        let mut reading = Reading::new(variant);
        let mut tally = Tally::new();
        self.poll_instantaneous(variant, &mut reading, &mut tally)
            .await;
        finish(&mut reading, &tally);
        Ok(reading)
    }

    async fn poll_rtc(&mut self, variant: Variant, reading: &mut Reading, tally: &mut Tally) {
        tally.expected += 1;
        match variant.rtc() {
            Some(layout) => {
                let command = Command::ReadRtc {
                    addr: layout.addr,
                    len: layout.len,
                };
                if let Some(payload) = self.fetch(command).await {
                    tally.fetched += 1;
                    reading.time = decode::rtc(&payload, &layout.format);
                    tally.complete &= reading.time.is_some();
                }
            }
            None => {
                if let Some(image) = self.fetch_tesmart_image().await {
                    tally.fetched += 1;
                    reading.time = decode::tesmart_time(&image);
                    tally.complete &= reading.time.is_some();
                }
            }
        }
    }

    async fn poll_totals(&mut self, variant: Variant, reading: &mut Reading, tally: &mut Tally) {
        tally.expected += 1;
        match variant.totals() {
            Some(layout) => {
                let command = Command::ReadFlash {
                    addr: layout.base,
                    len: 0xFF,
                };
                if let Some(payload) = self.fetch(command).await {
                    tally.fetched += 1;
                    tally.complete &= decode::totals(&payload, layout, reading);
                }
            }
            None => {
                if let Some(image) = self.fetch_tesmart_image().await {
                    tally.fetched += 1;
                    tally.complete &= decode::tesmart_totals(&image, reading);
                }
            }
        }
    }

    async fn poll_instantaneous(
        &mut self,
        variant: Variant,
        reading: &mut Reading,
        tally: &mut Tally,
    ) {
        tally.expected += 1;
        match variant.instantaneous() {
            Some(layout) => {
                let command = Command::ReadRam {
                    addr: layout.base,
                    len: 0xFF,
                };
                if let Some(payload) = self.fetch(command).await {
                    tally.fetched += 1;
                    tally.complete &= decode::instantaneous(&payload, layout, reading);
                }
            }
            None => {
                if let Some(image) = self.fetch_tesmart_image().await {
                    tally.fetched += 1;
                    tally.complete &= decode::tesmart_instantaneous(&image, reading);
                }
            }
        }
    }

    /// Assemble the five consecutive flash windows into one image. A
    /// failed window invalidates the whole image: decoding a misaligned
    /// concatenation would produce plausible-looking garbage.
    async fn fetch_tesmart_image(&mut self) -> Option<Vec<u8>> {
        let mut image = Vec::with_capacity(tesmart::IMAGE_LEN);
        for (index, base) in tesmart::WINDOW_BASES.iter().enumerate() {
            if index > 0 {
                self.pause().await;
            }
            let command = Command::ReadFlash {
                addr: *base,
                len: tesmart::WINDOW_LEN,
            };
            let window = self.fetch(command).await?;
            image.extend_from_slice(&window);
        }
        Some(image)
    }

    /// One exchange, with failures absorbed into `None` and the
    /// cancellation token honored while waiting on the device.
    async fn fetch(&mut self, command: Command) -> Option<Vec<u8>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let cancel = self.cancel.clone();
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(?command, "poll cancelled mid-exchange");
                None
            }
            result = exchange(self.link.as_mut(), self.address, command) => match result {
                Ok(payload) => Some(payload),
                Err(err) => {
                    warn!(?command, %err, "exchange failed");
                    None
                }
            }
        }
    }

    /// Inter-exchange pause, cut short by cancellation.
    async fn pause(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = time::sleep(INTER_EXCHANGE_PAUSE) => {}
        }
    }

    fn cancelled_reading(&self) -> Reading {
        let mut reading = self.variant.map(Reading::new).unwrap_or_default();
        reading.status = Status::PartialDecode;
        reading
    }
}

fn finish(reading: &mut Reading, tally: &Tally) {
    reading.status = if tally.fetched == tally.expected && tally.complete {
        Status::Ok
    } else if tally.fetched > 0 && !has_any_field(reading) {
        Status::ParseError
    } else {
        Status::PartialDecode
    };
}

fn has_any_field(reading: &Reading) -> bool {
    reading.time.is_some()
        || reading.energy_q.is_some()
        || reading.mass_m1.is_some()
        || reading.volume_v1.is_some()
        || reading.volume_v2.is_some()
        || reading.temp_t1.is_some()
        || reading.temp_t2.is_some()
        || reading.flow_g1.is_some()
        || reading.flow_g2.is_some()
        || reading.op_seconds.is_some()
}
