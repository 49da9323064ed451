//! Normalized result of polling a meter.

use serde::Serialize;
use strum::Display;
use time::PrimitiveDateTime;

use crate::variant::Variant;

/// Decode outcome of a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Display)]
pub enum Status {
    /// Every block was read and every field the variant defines decoded.
    Ok,
    /// At least one block was missing or short, a field failed to
    /// decode, or the poll was cancelled part-way.
    PartialDecode,
    /// Blocks arrived but no measurement field could be parsed from
    /// them.
    ParseError,
    /// Nothing has been decoded yet.
    #[default]
    Unknown,
}

/// One poll of a meter.
///
/// Fields the variant does not define, or whose block could not be read
/// or decoded, are `None`. Absence is never encoded as zero: a zero is a
/// legitimate reading for stopped flow.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Reading {
    /// Device wall-clock at poll time.
    pub time: Option<PrimitiveDateTime>,
    /// Accumulated thermal energy (Gcal or MWh, per device setup).
    pub energy_q: Option<f64>,
    /// Accumulated mass, channel 1 (t).
    pub mass_m1: Option<f64>,
    /// Accumulated volume, channel 1 (m³).
    pub volume_v1: Option<f64>,
    /// Accumulated volume, channel 2 (m³).
    pub volume_v2: Option<f64>,
    /// Supply temperature (°C).
    pub temp_t1: Option<f64>,
    /// Return temperature (°C).
    pub temp_t2: Option<f64>,
    /// Instantaneous flow, channel 1 (m³/h).
    pub flow_g1: Option<f64>,
    /// Instantaneous flow, channel 2 (m³/h).
    pub flow_g2: Option<f64>,
    /// Operating time counter (s).
    pub op_seconds: Option<u32>,
    /// Firmware dialect the values were decoded with.
    pub variant: Option<Variant>,
    pub status: Status,
}

impl Reading {
    /// Empty reading tagged with the variant it will be decoded as.
    pub fn new(variant: Variant) -> Self {
        Self {
            variant: Some(variant),
            ..Self::default()
        }
    }

    /// Operating time in whole hours, if the meter reported it.
    pub fn op_hours(&self) -> Option<u32> {
        self.op_seconds.map(|s| s / 3600)
    }
}
