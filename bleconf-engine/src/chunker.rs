//! Outbound chunking.
//!
//! Finished frames leave the engine through an unbounded channel; the
//! pump splits each into transport-sized chunks and writes them in
//! order with a pacing delay after every write. There is no per-chunk
//! acknowledgement: a lost chunk corrupts the frame on the peer, whose
//! CRC check rejects it.

use bytes::Bytes;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, trace};

/// Splits a frame into in-order chunks of at most `limit` bytes.
pub fn split(frame: &Bytes, limit: usize) -> Vec<Bytes> {
    assert!(limit > 0);
    let mut chunks = Vec::with_capacity(frame.len().div_ceil(limit));
    let mut offset = 0;
    while offset < frame.len() {
        let end = (offset + limit).min(frame.len());
        chunks.push(frame.slice(offset..end));
        offset = end;
    }
    chunks
}

/// Drains the outbound channel, writing paced chunks through `send`.
/// Runs until the channel closes or a write fails. The engine lock is
/// never held here; handlers finish their frames before queueing them.
pub async fn pump<F, Fut>(
    mut rx: UnboundedReceiver<Bytes>,
    chunk_size: usize,
    delay: Duration,
    mut send: F,
) where
    F: FnMut(Bytes) -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    while let Some(frame) = rx.recv().await {
        let chunks = split(&frame, chunk_size);
        trace!(frame_len = frame.len(), chunks = chunks.len(), "sending frame");
        for chunk in chunks {
            if let Err(e) = send(chunk).await {
                debug!(error = %e, "transport write failed, stopping pump");
                return;
            }
            tokio::time::sleep(delay).await;
        }
    }
}
