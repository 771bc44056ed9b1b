//! I/O utilities and shared state for the bridge loop.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use mcpbridge_core::JsonRpcId;

use crate::error::FramingError;

/// Upper bound on skipping the rest of an oversized line.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

// ─────────────────────────────────────────────────────────────────────────────
// Request ID Allocation
// ─────────────────────────────────────────────────────────────────────────────

/// Next id handed to a request that arrived without one. Starts at 1 and is
/// never reset, so assigned ids are unique for the life of the process.
static NEXT_ASSIGNED_ID: AtomicI64 = AtomicI64::new(1);

/// Allocate an id for an id-less request.
pub(super) fn assign_request_id() -> JsonRpcId {
    JsonRpcId::Number(NEXT_ASSIGNED_ID.fetch_add(1, Ordering::Relaxed))
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared Output Writer
// ─────────────────────────────────────────────────────────────────────────────

/// Write one complete line to the shared output and flush.
///
/// Every dispatch task writes through the same `Mutex`, so NDJSON lines are
/// never interleaved.
pub(super) async fn write_line<W: AsyncWrite + Unpin>(
    writer: &Mutex<W>,
    line: &[u8],
) -> Result<(), std::io::Error> {
    let mut guard = writer.lock().await;
    guard.write_all(line).await?;
    guard.flush().await
}

// ─────────────────────────────────────────────────────────────────────────────
// Bounded Line Reading (DoS Protection)
// ─────────────────────────────────────────────────────────────────────────────

/// Read a single line from an async buffered reader, enforcing a byte limit.
///
/// Unlike bare `read_line`, this function will not allocate unbounded memory
/// if the peer sends a continuous stream of bytes without a newline delimiter.
/// If the accumulated bytes exceed `max_bytes` before a newline is found, the
/// rest of the line is drained and `FramingError::MessageTooLarge` is returned.
///
/// Raw bytes are accumulated into a `Vec<u8>` so multi-byte UTF-8 characters
/// that straddle internal buffer boundaries stay intact. UTF-8 validation
/// happens once the whole line is assembled.
///
/// # Returns
///
/// - `Ok(n)` where `n > 0`: a complete line (or a final unterminated one) is in `buf`
/// - `Ok(0)`: EOF reached
/// - `Err(FramingError::MessageTooLarge)`: line exceeded `max_bytes`
/// - `Err(FramingError::Io)`: underlying I/O error
pub(super) async fn bounded_read_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_bytes: usize,
) -> Result<usize, FramingError> {
    let mut total = 0usize;
    loop {
        let available = reader.fill_buf().await.map_err(FramingError::Io)?;

        if available.is_empty() {
            return Ok(total);
        }

        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                let to_consume = pos + 1;
                // The delimiter itself does not count against the limit.
                if total + pos > max_bytes {
                    reader.consume(to_consume);
                    return Err(FramingError::MessageTooLarge { max_bytes });
                }

                buf.extend_from_slice(&available[..to_consume]);
                total += to_consume;
                reader.consume(to_consume);
                return Ok(total);
            }
            None => {
                let len = available.len();
                if total + len > max_bytes {
                    reader.consume(len);
                    drain_until_newline(reader).await;
                    return Err(FramingError::MessageTooLarge { max_bytes });
                }

                buf.extend_from_slice(available);
                total += len;
                reader.consume(len);
            }
        }
    }
}

/// Drain bytes from a reader until a newline or EOF is reached.
///
/// Positions the reader at the start of the next line after an oversized one.
/// Bounded by [`DRAIN_TIMEOUT`] so a stalled peer cannot hang the loop.
async fn drain_until_newline<R: AsyncBufRead + Unpin>(reader: &mut R) {
    let drain = async {
        loop {
            match reader.fill_buf().await {
                Ok([]) => return,
                Ok(buf) => {
                    if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                        reader.consume(pos + 1);
                        return;
                    }
                    let len = buf.len();
                    reader.consume(len);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "IO error while draining oversized message");
                    return;
                }
            }
        }
    };
    if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
        tracing::warn!(
            timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "timed out draining oversized message"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_bounded_read_line_splits_lines() {
        let mut reader = BufReader::new(&b"first\nsecond\nlast"[..]);
        let mut buf = Vec::new();

        assert_eq!(bounded_read_line(&mut reader, &mut buf, 64).await.unwrap(), 6);
        assert_eq!(buf, b"first\n");

        buf.clear();
        bounded_read_line(&mut reader, &mut buf, 64).await.unwrap();
        assert_eq!(buf, b"second\n");

        buf.clear();
        assert_eq!(bounded_read_line(&mut reader, &mut buf, 64).await.unwrap(), 4);
        assert_eq!(buf, b"last");

        buf.clear();
        assert_eq!(bounded_read_line(&mut reader, &mut buf, 64).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bounded_read_line_rejects_and_skips_oversized() {
        let mut input = vec![b'x'; 100];
        input.extend_from_slice(b"\nok\n");
        // Small internal buffer forces the no-newline-yet path.
        let mut reader = BufReader::with_capacity(16, &input[..]);
        let mut buf = Vec::new();

        let err = bounded_read_line(&mut reader, &mut buf, 32)
            .await
            .unwrap_err();
        assert!(matches!(err, FramingError::MessageTooLarge { max_bytes: 32 }));

        buf.clear();
        bounded_read_line(&mut reader, &mut buf, 32).await.unwrap();
        assert_eq!(buf, b"ok\n");
    }

    #[tokio::test]
    async fn test_bounded_read_line_limit_is_inclusive() {
        let mut reader = BufReader::new(&b"abcd\n"[..]);
        let mut buf = Vec::new();
        assert_eq!(bounded_read_line(&mut reader, &mut buf, 4).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_write_line_flushes_whole_line() {
        let writer = Mutex::new(Vec::new());
        write_line(&writer, b"{\"a\":1}\n").await.unwrap();
        write_line(&writer, b"{\"b\":2}\n").await.unwrap();
        assert_eq!(writer.into_inner(), b"{\"a\":1}\n{\"b\":2}\n");
    }

    #[test]
    fn test_assigned_ids_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| (0..100).map(|_| assign_request_id()).collect::<Vec<_>>()))
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(matches!(id, JsonRpcId::Number(n) if n >= 1));
                assert!(seen.insert(id), "duplicate assigned id");
            }
        }
        assert_eq!(seen.len(), 800);
    }
}
