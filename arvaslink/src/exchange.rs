//! One request/response exchange over a link.
//!
//! Responses carry no end-of-message marker and range from one byte to a
//! full 255-byte memory window, so the reader is driven by the length
//! byte in the response header: read the fixed six-byte header, then
//! exactly the declared payload plus the trailing checksum. Nothing past
//! the checksum is consumed, and a silent or truncated device fails the
//! read within the link's deadline instead of hanging.

use thiserror::Error;
use tracing::{debug, trace};

use crate::command::Command;
use crate::frame::{self, FrameError, HEADER_LEN};
use crate::transport::{Transport, TransportError};

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Send `command` to the device at `address` and return the response
/// payload.
pub async fn exchange(
    link: &mut dyn Transport,
    address: u8,
    command: Command,
) -> Result<Vec<u8>, ExchangeError> {
    let request = frame::build(address, command.group(), command.code(), &command.params());

    link.discard_input().await?;
    trace!("-> {request:02X?}");
    link.write_all(&request).await?;

    let mut response = link.read_exact(HEADER_LEN).await?;
    let payload_len = response[5] as usize;
    response.extend_from_slice(&link.read_exact(payload_len + 1).await?);
    trace!("<- {response:02X?}");

    let payload = frame::validate_and_strip(&response, address)?;
    if let Some(expected) = command.expected_len() {
        if payload.len() != expected {
            debug!(
                expected,
                actual = payload.len(),
                "response payload length differs from request"
            );
        }
    }
    Ok(payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::ScriptedLink;

    #[tokio::test]
    async fn returns_validated_payload() {
        let response = frame::build_response(1, 0x00, 0x00, b"TEM-104M");
        let (mut link, state) = ScriptedLink::new([response]);

        let payload = exchange(&mut link, 1, Command::Identify).await.unwrap();
        assert_eq!(payload, b"TEM-104M");

        let state = state.lock().unwrap();
        assert_eq!(state.requests.len(), 1);
        assert_eq!(state.requests[0], frame::build(1, 0x00, 0x00, &[]));
        assert!(state.discards >= 1);
    }

    #[tokio::test]
    async fn consumes_nothing_past_the_checksum() {
        let mut scripted = frame::build_response(1, 0x0F, 0x02, &[1, 2, 3, 4, 5, 6, 7]);
        // Stale bytes behind the frame must stay unread.
        scripted.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let (mut link, state) = ScriptedLink::new([scripted]);

        let command = Command::ReadRtc { addr: 0x0000, len: 7 };
        let payload = exchange(&mut link, 1, command).await.unwrap();
        assert_eq!(payload, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(state.lock().unwrap().pending, vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[tokio::test]
    async fn truncated_response_is_a_short_read() {
        let mut response = frame::build_response(1, 0x0F, 0x01, &[0u8; 200]);
        response.truncate(80);
        let (mut link, _state) = ScriptedLink::new([response]);

        let command = Command::ReadFlash { addr: 0x0100, len: 0xFF };
        let err = exchange(&mut link, 1, command).await.unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::Transport(TransportError::ShortRead { .. })
        ));
    }

    #[tokio::test]
    async fn silent_device_is_a_short_read() {
        let (mut link, _state) = ScriptedLink::new([]);
        let err = exchange(&mut link, 1, Command::Identify).await.unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::Transport(TransportError::ShortRead { wanted: 6, got: 0 })
        ));
    }

    #[tokio::test]
    async fn corrupted_frame_is_a_frame_error() {
        let mut response = frame::build_response(1, 0x00, 0x00, b"TSM104");
        let len = response.len();
        response[len - 1] ^= 0xFF;
        let (mut link, _state) = ScriptedLink::new([response]);

        let err = exchange(&mut link, 1, Command::Identify).await.unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::Frame(FrameError::BadChecksum)
        ));
    }

    #[tokio::test]
    async fn response_for_another_address_is_rejected() {
        let response = frame::build_response(2, 0x00, 0x00, b"TEM-104");
        let (mut link, _state) = ScriptedLink::new([response]);

        let err = exchange(&mut link, 1, Command::Identify).await.unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::Frame(FrameError::BadAddress { expected: 1, actual: 2 })
        ));
    }
}
