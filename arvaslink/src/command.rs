//! Catalog of requests the meters answer.
//!
//! The polling core uses exactly four commands. Memory reads carry a
//! three-byte parameter block `[addr_hi, addr_lo, len]`; a length of
//! `0xFF` asks for 255 bytes, the largest single response. Regions
//! bigger than that are assembled from consecutive reads at contiguous
//! addresses.

/// One request to a meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Ask the device for its ASCII identification token.
    Identify,
    /// Read `len` bytes of flash (configuration and totals) at `addr`.
    ReadFlash { addr: u16, len: u8 },
    /// Read `len` bytes of the real-time clock region at `addr`.
    ReadRtc { addr: u16, len: u8 },
    /// Read `len` bytes of RAM (live values) at `addr`.
    ReadRam { addr: u16, len: u8 },
}

impl Command {
    /// Command group byte.
    pub fn group(&self) -> u8 {
        match self {
            Command::Identify => 0x00,
            Command::ReadFlash { .. } | Command::ReadRtc { .. } => 0x0F,
            Command::ReadRam { .. } => 0x0C,
        }
    }

    /// Command byte within the group.
    pub fn code(&self) -> u8 {
        match self {
            Command::Identify => 0x00,
            Command::ReadFlash { .. } => 0x01,
            Command::ReadRtc { .. } => 0x02,
            Command::ReadRam { .. } => 0x01,
        }
    }

    /// Parameter bytes carried by the request.
    pub fn params(&self) -> Vec<u8> {
        match self {
            Command::Identify => Vec::new(),
            Command::ReadFlash { addr, len }
            | Command::ReadRtc { addr, len }
            | Command::ReadRam { addr, len } => {
                vec![(addr >> 8) as u8, *addr as u8, *len]
            }
        }
    }

    /// Payload length the device is expected to answer with, where the
    /// command pins one down. Identification tokens vary by model.
    pub fn expected_len(&self) -> Option<usize> {
        match self {
            Command::Identify => None,
            Command::ReadFlash { len, .. }
            | Command::ReadRtc { len, .. }
            | Command::ReadRam { len, .. } => Some(*len as usize),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(Command::Identify, 0x00, 0x00; "identify")]
    #[test_case(Command::ReadFlash { addr: 0x0180, len: 0xFF }, 0x0F, 0x01; "read_flash")]
    #[test_case(Command::ReadRtc { addr: 0x0010, len: 0x0A }, 0x0F, 0x02; "read_rtc")]
    #[test_case(Command::ReadRam { addr: 0x4000, len: 0xFF }, 0x0C, 0x01; "read_ram")]
    fn group_and_code(command: Command, group: u8, code: u8) {
        assert_eq!(command.group(), group);
        assert_eq!(command.code(), code);
    }

    #[test]
    fn memory_reads_encode_address_big_endian() {
        let command = Command::ReadFlash {
            addr: 0x0180,
            len: 0xFF,
        };
        assert_eq!(command.params(), vec![0x01, 0x80, 0xFF]);
        assert_eq!(command.expected_len(), Some(255));
    }

    #[test]
    fn identify_carries_no_params() {
        assert_eq!(Command::Identify.params(), Vec::<u8>::new());
        assert_eq!(Command::Identify.expected_len(), None);
    }
}
