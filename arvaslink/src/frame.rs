//! Request/response framing for the meter wire protocol.
//!
//! Both directions share one shape: a start byte, the device address, a
//! third byte (the inverted address on requests, ignored on responses),
//! a command group, a command, a one-byte payload length, the payload,
//! and a trailing checksum. The checksum completes the frame so that the
//! unsigned 8-bit sum of every byte in a well-formed frame is `0xFF`;
//! checking the whole-frame sum avoids treating the checksum byte as a
//! special case.
//!
//! This module performs no I/O.

use thiserror::Error;

/// First byte of every request frame.
pub const REQUEST_START: u8 = 0x55;

/// First byte of every response frame.
pub const RESPONSE_START: u8 = 0xAA;

/// Fixed-size prefix before the payload: start byte, address, inverted
/// address, command group, command, payload length.
pub const HEADER_LEN: usize = 6;

/// Smallest well-formed frame: header plus checksum, empty payload.
pub const MIN_FRAME_LEN: usize = HEADER_LEN + 1;

/// Longest parameter block a request may carry (total frame <= 259).
pub const MAX_PARAMS: usize = 252;

/// Whole-frame sum of a valid frame, modulo 256.
const FRAME_SUM: u8 = 0xFF;

/// Why an inbound frame was rejected. None of these are retriable at
/// this layer; the caller decides what to do with the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame too short: {0} bytes")]
    TooShort(usize),

    #[error("bad start byte {0:#04x}")]
    BadStart(u8),

    #[error("address mismatch: expected {expected}, got {actual}")]
    BadAddress { expected: u8, actual: u8 },

    #[error("declared payload length {declared} does not match frame of {frame_len} bytes")]
    BadLength { declared: u8, frame_len: usize },

    #[error("checksum mismatch")]
    BadChecksum,
}

/// Checksum byte that completes `bytes` to a whole-frame sum of `0xFF`.
pub fn checksum(bytes: &[u8]) -> u8 {
    !sum(bytes)
}

fn sum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Build a request frame for the device at `address`.
///
/// # Panics
///
/// Panics if `params` exceeds [`MAX_PARAMS`] bytes. The command catalog
/// never produces such a request.
pub fn build(address: u8, group: u8, command: u8, params: &[u8]) -> Vec<u8> {
    assert!(params.len() <= MAX_PARAMS, "request parameters too long");
    let mut frame = Vec::with_capacity(MIN_FRAME_LEN + params.len());
    frame.push(REQUEST_START);
    frame.push(address);
    frame.push(!address);
    frame.push(group);
    frame.push(command);
    frame.push(params.len() as u8);
    frame.extend_from_slice(params);
    frame.push(checksum(&frame));
    frame
}

/// Validate a response frame and return its payload.
pub fn validate_and_strip(frame: &[u8], expected_address: u8) -> Result<&[u8], FrameError> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(FrameError::TooShort(frame.len()));
    }
    if frame[0] != RESPONSE_START {
        return Err(FrameError::BadStart(frame[0]));
    }
    if frame[1] != expected_address {
        return Err(FrameError::BadAddress {
            expected: expected_address,
            actual: frame[1],
        });
    }
    if frame[5] as usize != frame.len() - MIN_FRAME_LEN {
        return Err(FrameError::BadLength {
            declared: frame[5],
            frame_len: frame.len(),
        });
    }
    if sum(frame) != FRAME_SUM {
        return Err(FrameError::BadChecksum);
    }
    Ok(&frame[HEADER_LEN..frame.len() - 1])
}

/// Response-shaped frame for tests: the request layout with the response
/// start byte and a recomputed checksum.
#[cfg(test)]
pub(crate) fn build_response(address: u8, group: u8, command: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(MIN_FRAME_LEN + payload.len());
    frame.push(RESPONSE_START);
    frame.push(address);
    frame.push(!address);
    frame.push(group);
    frame.push(command);
    frame.push(payload.len() as u8);
    frame.extend_from_slice(payload);
    frame.push(checksum(&frame));
    frame
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    // Golden request frames, checked byte for byte against the wire
    // protocol. The last byte of each is the checksum.
    #[test_case(1, 0x00, 0x00, &[], &[0x55, 0x01, 0xFE, 0x00, 0x00, 0x00, 0xAB]; "identify_addr_1")]
    #[test_case(1, 0x0F, 0x01, &[0x01, 0x80, 0xFF], &[0x55, 0x01, 0xFE, 0x0F, 0x01, 0x03, 0x01, 0x80, 0xFF, 0x18]; "read_flash_0180")]
    #[test_case(1, 0x0C, 0x01, &[0x40, 0x00, 0xFF], &[0x55, 0x01, 0xFE, 0x0C, 0x01, 0x03, 0x40, 0x00, 0xFF, 0x5C]; "read_ram_4000")]
    #[test_case(247, 0x0F, 0x02, &[0x00, 0x00, 0x07], &[0x55, 0xF7, 0x08, 0x0F, 0x02, 0x03, 0x00, 0x00, 0x07, 0x90]; "read_rtc_addr_247")]
    fn golden_requests(address: u8, group: u8, command: u8, params: &[u8], expect: &[u8]) {
        assert_eq!(build(address, group, command, params), expect);
    }

    #[test_case(1, 0x00, 0x00, &[])]
    #[test_case(17, 0x0F, 0x01, &[0x02, 0x00, 0xFF])]
    #[test_case(247, 0x0C, 0x01, &[0x22, 0x00, 0x74])]
    fn whole_frame_sums_to_ff(address: u8, group: u8, command: u8, params: &[u8]) {
        let frame = build(address, group, command, params);
        assert_eq!(sum(&frame), 0xFF);
    }

    #[test_case(1)]
    #[test_case(100)]
    #[test_case(247)]
    fn address_byte_pair_is_complementary(address: u8) {
        let frame = build(address, 0x00, 0x00, &[]);
        assert_eq!(frame[1].wrapping_add(frame[2]), 0xFF);
    }

    #[test]
    fn validate_strips_payload() {
        // AA 01 FE 00 00 04 41 42 43 44 48
        let frame = build_response(1, 0x00, 0x00, b"ABCD");
        assert_eq!(frame.last(), Some(&0x48));
        assert_eq!(validate_and_strip(&frame, 1).unwrap(), b"ABCD");
    }

    #[test]
    fn validate_rejects_corrupted_checksum() {
        let mut frame = build_response(1, 0x00, 0x00, b"ABCD");
        *frame.last_mut().unwrap() ^= 0x01;
        assert_eq!(validate_and_strip(&frame, 1), Err(FrameError::BadChecksum));
    }

    #[test]
    fn validate_rejects_request_start_byte() {
        let frame = build(1, 0x00, 0x00, &[]);
        assert_eq!(
            validate_and_strip(&frame, 1),
            Err(FrameError::BadStart(REQUEST_START))
        );
    }

    #[test]
    fn validate_rejects_wrong_address() {
        let frame = build_response(2, 0x00, 0x00, &[0x11]);
        assert_eq!(
            validate_and_strip(&frame, 1),
            Err(FrameError::BadAddress {
                expected: 1,
                actual: 2
            })
        );
    }

    #[test]
    fn validate_rejects_length_mismatch() {
        let mut frame = build_response(1, 0x00, 0x00, &[0x11, 0x22]);
        // Claim three payload bytes while carrying two; fix the sum so
        // only the length check can fire.
        frame[5] = 3;
        let len = frame.len();
        frame[len - 1] = frame[len - 1].wrapping_sub(1);
        assert_eq!(
            validate_and_strip(&frame, 1),
            Err(FrameError::BadLength {
                declared: 3,
                frame_len: len,
            })
        );
    }

    #[test]
    fn validate_rejects_truncated_frame() {
        assert_eq!(
            validate_and_strip(&[0xAA, 0x01, 0xFE], 1),
            Err(FrameError::TooShort(3))
        );
    }

    #[test]
    fn round_trip_payload_sizes() {
        for len in [0usize, 1, 16, 255] {
            let payload: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let frame = build_response(5, 0x0F, 0x01, &payload);
            assert_eq!(validate_and_strip(&frame, 5).unwrap(), &payload[..]);
        }
    }
}
