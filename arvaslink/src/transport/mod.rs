//! Byte links carrying the framed protocol.
//!
//! A link delivers bytes faithfully in both directions and knows nothing
//! about frames; parsing and line-ending translation do not belong at
//! this layer. The protocol is half-duplex with exactly one exchange in
//! flight, so a link is owned by one client for its whole life and is
//! never shared between concurrent callers.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time;

pub mod serial;
pub mod tcp;

pub use serial::SerialLink;
pub use tcp::TcpLink;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),

    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),

    #[error("read timed out after {0:?}")]
    Timeout(Duration),

    #[error("short read: wanted {wanted} bytes, got {got}")]
    ShortRead { wanted: usize, got: usize },

    #[error("link is closed")]
    Closed,
}

/// Stream abstraction the protocol core reads and writes through.
#[async_trait]
pub trait Transport: Send {
    /// Write the whole buffer.
    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Read exactly `n` bytes within the link's per-operation deadline.
    async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, TransportError>;

    /// Drop any bytes already buffered on the receive side. Stale bytes
    /// from an aborted exchange would desynchronize the reader.
    async fn discard_input(&mut self) -> Result<(), TransportError>;

    fn is_open(&self) -> bool;

    /// Close the link. Further operations return [`TransportError::Closed`].
    async fn shutdown(&mut self) -> Result<(), TransportError>;
}

/// Fill exactly `n` bytes from `stream` or fail with `Timeout` or
/// `ShortRead`. Shared by both concrete links.
pub(crate) async fn read_exact_deadline<S>(
    stream: &mut S,
    n: usize,
    deadline: Duration,
) -> Result<Vec<u8>, TransportError>
where
    S: AsyncRead + Unpin + Send,
{
    let mut buf = vec![0u8; n];
    let mut filled = 0usize;

    let outcome = time::timeout(deadline, async {
        while filled < n {
            let read = stream.read(&mut buf[filled..]).await?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        Ok::<_, io::Error>(())
    })
    .await;

    match outcome {
        Err(_) => Err(TransportError::Timeout(deadline)),
        Ok(Err(err)) => Err(err.into()),
        Ok(Ok(())) if filled < n => Err(TransportError::ShortRead { wanted: n, got: filled }),
        Ok(Ok(())) => Ok(buf),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::{Transport, TransportError};

    /// What a [`ScriptedLink`] has seen and what it still has queued.
    #[derive(Default)]
    pub(crate) struct ScriptState {
        /// Canned response bytes, one buffer consumed per request.
        pub responses: VecDeque<Vec<u8>>,
        /// Every request frame written by the code under test.
        pub requests: Vec<Vec<u8>>,
        pub discards: usize,
        /// Unread remainder of the current response buffer.
        pub pending: Vec<u8>,
    }

    /// In-memory link replaying canned responses, for exchange and
    /// client tests.
    pub(crate) struct ScriptedLink {
        state: Arc<Mutex<ScriptState>>,
        open: bool,
    }

    impl ScriptedLink {
        pub(crate) fn new(
            responses: impl IntoIterator<Item = Vec<u8>>,
        ) -> (Self, Arc<Mutex<ScriptState>>) {
            let state = Arc::new(Mutex::new(ScriptState {
                responses: responses.into_iter().collect(),
                ..ScriptState::default()
            }));
            (
                Self {
                    state: Arc::clone(&state),
                    open: true,
                },
                state,
            )
        }
    }

    #[async_trait]
    impl Transport for ScriptedLink {
        async fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
            let mut state = self.state.lock().unwrap();
            state.requests.push(bytes.to_vec());
            state.pending = state.responses.pop_front().unwrap_or_default();
            Ok(())
        }

        async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
            let mut state = self.state.lock().unwrap();
            if state.pending.len() < n {
                let got = state.pending.len();
                state.pending.clear();
                return Err(TransportError::ShortRead { wanted: n, got });
            }
            Ok(state.pending.drain(..n).collect())
        }

        async fn discard_input(&mut self) -> Result<(), TransportError> {
            self.state.lock().unwrap().discards += 1;
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.open
        }

        async fn shutdown(&mut self) -> Result<(), TransportError> {
            self.open = false;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn read_exact_times_out_on_silence() {
        let (mut near, _far) = tokio::io::duplex(64);
        let deadline = Duration::from_secs(2);
        let result = read_exact_deadline(&mut near, 6, deadline).await;
        assert!(matches!(result, Err(TransportError::Timeout(d)) if d == deadline));
    }

    #[tokio::test(start_paused = true)]
    async fn read_exact_reports_short_stream() {
        let (mut near, mut far) = tokio::io::duplex(64);
        far.write_all(&[1, 2, 3]).await.unwrap();
        drop(far);
        let result = read_exact_deadline(&mut near, 6, Duration::from_secs(2)).await;
        assert!(matches!(
            result,
            Err(TransportError::ShortRead { wanted: 6, got: 3 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn read_exact_assembles_fragmented_input() {
        let (mut near, mut far) = tokio::io::duplex(64);
        let reader = tokio::spawn(async move {
            read_exact_deadline(&mut near, 4, Duration::from_secs(2)).await
        });
        far.write_all(&[0xAA, 0x01]).await.unwrap();
        tokio::task::yield_now().await;
        far.write_all(&[0xFE, 0x00]).await.unwrap();
        let bytes = reader.await.unwrap().unwrap();
        assert_eq!(bytes, vec![0xAA, 0x01, 0xFE, 0x00]);
    }
}
