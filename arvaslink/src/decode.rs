//! Decoding of raw memory blocks into measurement fields.
//!
//! All numeric material is big-endian. Cumulative values arrive as a
//! u32 whole part plus an f32 fractional remainder at separate offsets;
//! the reading is their sum as f64, never rounded. An offset outside
//! the block makes that one field absent, as does a non-finite float or
//! a BCD nibble above nine. Decoding never panics and never substitutes
//! zero for a value it could not read.

use time::{Date, Month, PrimitiveDateTime, Time};

use crate::layout::{tesmart, InstantLayout, Pair, RtcFormat, TotalsLayout};
use crate::record::Reading;

/// Big-endian u32 at `offset`, or `None` past the end of the block.
pub fn u32_be(block: &[u8], offset: usize) -> Option<u32> {
    let b = block.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

/// Big-endian finite f32 at `offset`.
pub fn f32_be(block: &[u8], offset: usize) -> Option<f32> {
    let b = block.get(offset..offset.checked_add(4)?)?;
    let value = f32::from_be_bytes([b[0], b[1], b[2], b[3]]);
    value.is_finite().then_some(value)
}

/// Whole/fractional pair summed as f64.
pub fn pair_value(block: &[u8], pair: Pair) -> Option<f64> {
    let whole = u32_be(block, pair.whole)?;
    let frac = f32_be(block, pair.frac)?;
    Some(f64::from(whole) + f64::from(frac))
}

/// Packed BCD byte to its decimal value; nibbles above 9 are invalid.
pub fn bcd(byte: u8) -> Option<u8> {
    let (hi, lo) = (byte >> 4, byte & 0x0F);
    if hi > 9 || lo > 9 {
        return None;
    }
    Some(hi * 10 + lo)
}

/// Timestamp from raw component values; the year is 2000-based.
/// Out-of-range components are rejected by the date/time constructors.
fn timestamp(ss: u8, mm: u8, hh: u8, dd: u8, month: u8, yy: u8) -> Option<PrimitiveDateTime> {
    let month = Month::try_from(month).ok()?;
    let date = Date::from_calendar_date(2000 + i32::from(yy), month, dd).ok()?;
    let time = Time::from_hms(hh, mm, ss).ok()?;
    Some(PrimitiveDateTime::new(date, time))
}

/// Decode an RTC payload in the given encoding.
pub fn rtc(payload: &[u8], format: &RtcFormat) -> Option<PrimitiveDateTime> {
    match format {
        RtcFormat::Decimal => {
            let p = payload.get(..6)?;
            timestamp(p[0], p[1], p[2], p[3], p[4], p[5])
        }
        RtcFormat::Bcd => {
            let p = payload.get(..7)?;
            timestamp(bcd(p[0])?, bcd(p[1])?, bcd(p[2])?, bcd(p[4])?, bcd(p[5])?, bcd(p[6])?)
        }
        RtcFormat::BcdStride2 => {
            let p = payload.get(..10)?;
            timestamp(bcd(p[0])?, bcd(p[2])?, bcd(p[4])?, bcd(p[7])?, bcd(p[8])?, bcd(p[9])?)
        }
    }
}

/// Decode a totals block into `reading`. Returns `true` when every field
/// the layout defines was decoded.
pub fn totals(block: &[u8], layout: &TotalsLayout, reading: &mut Reading) -> bool {
    reading.volume_v1 = pair_value(block, layout.v1);
    reading.volume_v2 = layout.v2.and_then(|pair| pair_value(block, pair));
    reading.mass_m1 = pair_value(block, layout.m1);
    reading.energy_q = pair_value(block, layout.q);
    reading.op_seconds = u32_be(block, layout.op_seconds);

    reading.volume_v1.is_some()
        && (layout.v2.is_none() || reading.volume_v2.is_some())
        && reading.mass_m1.is_some()
        && reading.energy_q.is_some()
        && reading.op_seconds.is_some()
}

/// Decode an instantaneous block into `reading`. Returns `true` when
/// every field the layout defines was decoded.
pub fn instantaneous(block: &[u8], layout: &InstantLayout, reading: &mut Reading) -> bool {
    reading.temp_t1 = f32_be(block, layout.t1).map(f64::from);
    reading.temp_t2 = f32_be(block, layout.t2).map(f64::from);
    reading.flow_g1 = f32_be(block, layout.g1).map(f64::from);
    reading.flow_g2 = layout.g2.and_then(|offset| f32_be(block, offset)).map(f64::from);

    reading.temp_t1.is_some()
        && reading.temp_t2.is_some()
        && reading.flow_g1.is_some()
        && (layout.g2.is_none() || reading.flow_g2.is_some())
}

/// Divisor positioning the decimal point of Tesmart volume and mass
/// totals. Codes outside the documented range leave the value unscaled.
pub fn volume_scale(code: u8) -> u32 {
    match code {
        3 => 10,
        4 => 100,
        5 => 1000,
        _ => 1,
    }
}

/// Divisor for Tesmart energy totals.
pub fn energy_scale(code: u8) -> u32 {
    match code {
        2 => 10,
        3 => 100,
        4 => 1000,
        5 => 10_000,
        6 => 100_000,
        _ => 1,
    }
}

fn scaled(image: &[u8], pair: Pair, code: Option<u8>, scale: fn(u8) -> u32) -> Option<f64> {
    Some(pair_value(image, pair)? / f64::from(scale(code?)))
}

/// Decode totals from an assembled Tesmart image. Returns `true` when
/// all of them decoded.
pub fn tesmart_totals(image: &[u8], reading: &mut Reading) -> bool {
    let ch1 = image.get(tesmart::SCALE_CH1).copied();
    let ch2 = image.get(tesmart::SCALE_CH2).copied();

    reading.volume_v1 = scaled(image, tesmart::V1, ch1, volume_scale);
    reading.volume_v2 = scaled(image, tesmart::V2, ch2, volume_scale);
    reading.mass_m1 = scaled(image, tesmart::M1, ch1, volume_scale);
    reading.energy_q = scaled(image, tesmart::Q, ch1, energy_scale);
    reading.op_seconds = u32_be(image, tesmart::OP_SECONDS);

    reading.volume_v1.is_some()
        && reading.volume_v2.is_some()
        && reading.mass_m1.is_some()
        && reading.energy_q.is_some()
        && reading.op_seconds.is_some()
}

/// Decode temperatures and flows from an assembled Tesmart image.
pub fn tesmart_instantaneous(image: &[u8], reading: &mut Reading) -> bool {
    reading.temp_t1 = f32_be(image, tesmart::T1).map(f64::from);
    reading.temp_t2 = f32_be(image, tesmart::T2).map(f64::from);
    reading.flow_g1 = f32_be(image, tesmart::G1).map(f64::from);
    reading.flow_g2 = f32_be(image, tesmart::G2).map(f64::from);

    reading.temp_t1.is_some()
        && reading.temp_t2.is_some()
        && reading.flow_g1.is_some()
        && reading.flow_g2.is_some()
}

/// Wall clock from an assembled Tesmart image: six dense BCD bytes.
pub fn tesmart_time(image: &[u8]) -> Option<PrimitiveDateTime> {
    let p = image.get(tesmart::RTC..tesmart::RTC.checked_add(6)?)?;
    timestamp(bcd(p[0])?, bcd(p[1])?, bcd(p[2])?, bcd(p[3])?, bcd(p[4])?, bcd(p[5])?)
}
