//! Per-variant memory maps.
//!
//! Every variant stores cumulative values as a whole/fractional pair: a
//! big-endian u32 integer part and a big-endian f32 remainder at
//! separate offsets within a block. The tables below are the single
//! authoritative description of where each field lives; the decoders
//! carry no offsets of their own.
//!
//! Offsets are relative to the start of the block payload as returned by
//! the device, not to absolute device memory.

use crate::variant::Variant;

/// Offsets of one whole/fractional pair.
#[derive(Debug, Clone, Copy)]
pub struct Pair {
    pub whole: usize,
    pub frac: usize,
}

/// Totals block, read from flash: base address plus field offsets.
#[derive(Debug, Clone)]
pub struct TotalsLayout {
    pub base: u16,
    pub v1: Pair,
    /// Second volume channel, absent on single-channel models.
    pub v2: Option<Pair>,
    pub m1: Pair,
    pub q: Pair,
    pub op_seconds: usize,
}

/// Instantaneous block, read from RAM: base address plus f32 offsets.
#[derive(Debug, Clone)]
pub struct InstantLayout {
    pub base: u16,
    pub t1: usize,
    pub t2: usize,
    pub g1: usize,
    /// Second flow channel, absent on single-channel models.
    pub g2: Option<usize>,
}

/// Encoding of the RTC byte string.
#[derive(Debug, Clone)]
pub enum RtcFormat {
    /// Plain binary `[ss, mm, hh, dd, MM, YY]`.
    Decimal,
    /// Packed BCD `[ss, mm, hh, _, dd, MM, YY]`.
    Bcd,
    /// Packed BCD with the time of day at stride 2 (`ss` at 0, `mm` at
    /// 2, `hh` at 4) and the date dense at 7..10.
    BcdStride2,
}

/// RTC read: region address, byte count, encoding.
#[derive(Debug, Clone)]
pub struct RtcLayout {
    pub addr: u16,
    pub len: u8,
    pub format: RtcFormat,
}

const ARVAS_M1_TOTALS: TotalsLayout = TotalsLayout {
    base: 0x0180,
    v1: Pair { whole: 0x08, frac: 0x18 },
    v2: None,
    m1: Pair { whole: 0x0C, frac: 0x1C },
    q: Pair { whole: 0x10, frac: 0x20 },
    op_seconds: 0x30,
};

const ARVAS_M1_INSTANT: InstantLayout = InstantLayout {
    base: 0x4000,
    t1: 0x00,
    t2: 0x04,
    g1: 0x20,
    g2: Some(0x24),
};

const ARVAS_M_TOTALS: TotalsLayout = TotalsLayout {
    base: 0x0800,
    v1: Pair { whole: 0x08, frac: 0x48 },
    v2: Some(Pair { whole: 0x0C, frac: 0x4C }),
    m1: Pair { whole: 0x18, frac: 0x58 },
    q: Pair { whole: 0x28, frac: 0x68 },
    op_seconds: 0xA0,
};

const ARVAS_M_INSTANT: InstantLayout = InstantLayout {
    base: 0x0000,
    t1: 0x00,
    t2: 0x04,
    g1: 0x40,
    g2: Some(0x44),
};

/// Shared by both M-series models: seven plain binary bytes at address
/// zero of the clock region.
const ARVAS_M_RTC: RtcLayout = RtcLayout {
    addr: 0x0000,
    len: 7,
    format: RtcFormat::Decimal,
};

const ARVAS_LEGACY_1_TOTALS: TotalsLayout = TotalsLayout {
    base: 0x0100,
    v1: Pair { whole: 0x44, frac: 0x48 },
    v2: None,
    m1: Pair { whole: 0x4C, frac: 0x50 },
    q: Pair { whole: 0x54, frac: 0x58 },
    op_seconds: 0x60,
};

const ARVAS_LEGACY_1_INSTANT: InstantLayout = InstantLayout {
    base: 0x00B8,
    t1: 0x08,
    t2: 0x0C,
    g1: 0x00,
    g2: None,
};

const ARVAS_LEGACY_1_RTC: RtcLayout = RtcLayout {
    addr: 0x0000,
    len: 7,
    format: RtcFormat::Bcd,
};

// The legacy layout keeps whole and fractional parts in two separate
// regions of the block rather than interleaved per field.
const ARVAS_LEGACY_TOTALS: TotalsLayout = TotalsLayout {
    base: 0x0200,
    v1: Pair { whole: 0x38, frac: 0x08 },
    v2: Some(Pair { whole: 0x3C, frac: 0x0C }),
    m1: Pair { whole: 0x48, frac: 0x18 },
    q: Pair { whole: 0x58, frac: 0x28 },
    op_seconds: 0x6C,
};

const ARVAS_LEGACY_INSTANT: InstantLayout = InstantLayout {
    base: 0x2200,
    t1: 0x00,
    t2: 0x04,
    g1: 0x40,
    g2: Some(0x44),
};

const ARVAS_LEGACY_RTC: RtcLayout = RtcLayout {
    addr: 0x0010,
    len: 10,
    format: RtcFormat::BcdStride2,
};

impl Variant {
    /// Totals layout, or `None` for Tesmart, which decodes totals out of
    /// the assembled flash image instead.
    pub fn totals(&self) -> Option<&'static TotalsLayout> {
        match self {
            Variant::ArvasM1 => Some(&ARVAS_M1_TOTALS),
            Variant::ArvasM => Some(&ARVAS_M_TOTALS),
            Variant::ArvasLegacy1 => Some(&ARVAS_LEGACY_1_TOTALS),
            Variant::ArvasLegacy => Some(&ARVAS_LEGACY_TOTALS),
            Variant::Tesmart => None,
        }
    }

    /// Instantaneous layout, or `None` for Tesmart.
    pub fn instantaneous(&self) -> Option<&'static InstantLayout> {
        match self {
            Variant::ArvasM1 => Some(&ARVAS_M1_INSTANT),
            Variant::ArvasM => Some(&ARVAS_M_INSTANT),
            Variant::ArvasLegacy1 => Some(&ARVAS_LEGACY_1_INSTANT),
            Variant::ArvasLegacy => Some(&ARVAS_LEGACY_INSTANT),
            Variant::Tesmart => None,
        }
    }

    /// RTC layout, or `None` for Tesmart.
    pub fn rtc(&self) -> Option<&'static RtcLayout> {
        match self {
            Variant::ArvasM1 | Variant::ArvasM => Some(&ARVAS_M_RTC),
            Variant::ArvasLegacy1 => Some(&ARVAS_LEGACY_1_RTC),
            Variant::ArvasLegacy => Some(&ARVAS_LEGACY_RTC),
            Variant::Tesmart => None,
        }
    }
}

/// Tesmart keeps everything in one ~2 KiB flash image assembled from
/// five consecutive 255-byte windows. Offsets here index the assembled
/// buffer.
pub mod tesmart {
    use super::Pair;

    /// Window base addresses, read in order with a pause in between.
    pub const WINDOW_BASES: [u16; 5] = [0x0000, 0x0100, 0x0200, 0x0300, 0x0400];
    /// Bytes requested per window (0xFF means 255).
    pub const WINDOW_LEN: u8 = 0xFF;
    /// Assembled image size.
    pub const IMAGE_LEN: usize = WINDOW_BASES.len() * WINDOW_LEN as usize;

    pub const T1: usize = 0x0200;
    pub const T2: usize = 0x0204;
    pub const G1: usize = 0x0288;
    pub const G2: usize = 0x028C;

    /// Channel scale codes selecting the decimal-point divisor.
    pub const SCALE_CH1: usize = 0x02FA;
    pub const SCALE_CH2: usize = 0x02FB;

    pub const V1: Pair = Pair { whole: 0x0318, frac: 0x0300 };
    pub const V2: Pair = Pair { whole: 0x031C, frac: 0x0304 };
    pub const M1: Pair = Pair { whole: 0x0348, frac: 0x0330 };
    pub const Q: Pair = Pair { whole: 0x0378, frac: 0x0360 };

    pub const OP_SECONDS: usize = 0x0404;

    /// Six dense BCD bytes `[ss, mm, hh, dd, MM, YY]`.
    pub const RTC: usize = 0x0482;
}
