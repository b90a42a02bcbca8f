//! Upstream event decoding.
//!
//! OpenAI-compatible servers stream `data: {json}` lines and finish with
//! `data: [DONE]`. Chunks from the wire do not respect line boundaries, so
//! bytes are buffered until a full line is available.

use async_stream::stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use log::debug;
use serde_json::Value;

use super::events::UpstreamEvent;
use crate::upstream::UpstreamError;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Byte buffer that hands out complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    // Bytes of `pending` already known to hold no `\n`.
    scanned: usize,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Next complete line, without its `\n` (or `\r\n`).
    pub fn next_line(&mut self) -> Option<String> {
        let Some(offset) = self.pending[self.scanned..].iter().position(|&b| b == b'\n') else {
            self.scanned = self.pending.len();
            return None;
        };
        let newline = self.scanned + offset;
        self.scanned = 0;

        let mut line: Vec<u8> = self.pending.drain(..=newline).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Whatever is left once the input has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        self.scanned = 0;
        let rest = std::mem::take(&mut self.pending);
        let rest = String::from_utf8_lossy(&rest);
        Some(rest.trim_end_matches('\r').to_string())
    }
}

/// Decode one line. `None` means the line carries no event.
pub fn decode_line(line: &str) -> Option<UpstreamEvent> {
    let data = line.strip_prefix(DATA_PREFIX)?;
    if data == DONE_SENTINEL {
        return Some(UpstreamEvent::Done);
    }

    let Ok(chunk) = serde_json::from_str::<Value>(data) else {
        return Some(UpstreamEvent::Malformed);
    };

    let content = chunk
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(|content| content.as_str())
        .filter(|content| !content.is_empty())?;

    Some(UpstreamEvent::Delta {
        content: content.to_string(),
    })
}

/// Turn upstream body chunks into events.
///
/// Ends after `Done`, after the first transport error (yielded as `Err`), or
/// when the input ends. Chunks are pulled one at a time, only when the
/// consumer asks for the next event.
pub fn decode_events<S>(mut chunks: S) -> impl Stream<Item = Result<UpstreamEvent, UpstreamError>>
where
    S: Stream<Item = Result<Bytes, UpstreamError>> + Unpin,
{
    stream! {
        let mut lines = LineBuffer::default();

        while let Some(chunk) = chunks.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            lines.push(&chunk);

            while let Some(line) = lines.next_line() {
                match decode_line(&line) {
                    Some(UpstreamEvent::Done) => {
                        yield Ok(UpstreamEvent::Done);
                        return;
                    }
                    Some(UpstreamEvent::Malformed) => {
                        debug!("Skipping malformed upstream frame: {}", line);
                        yield Ok(UpstreamEvent::Malformed);
                    }
                    Some(event) => {
                        yield Ok(event);
                    }
                    None => {}
                }
            }
        }

        if let Some(event) = lines.finish().as_deref().and_then(decode_line) {
            yield Ok(event);
        }
    }
}
