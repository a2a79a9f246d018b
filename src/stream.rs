//! Incremental decoder for the assistant's streaming response body.
//!
//! The wire format is a sequence of UTF-8 text blocks separated by a blank
//! line (`\n\n`). Each block is a run of lines:
//!
//! ```text
//! id: <opaque-conversation-id>
//! data: <JSON-encoded string>
//! ```
//!
//! A block may span several chunk reads, so the bytes after the last
//! separator stay buffered until the next chunk (or [`StreamDecoder::finish`])
//! completes them. Splitting happens at the byte level *before* UTF-8
//! decoding: the separator is ASCII, so a multi-byte character broken
//! across two reads never corrupts a completed block.
//!
//! Malformed payloads are dropped, never propagated - a broken block must
//! not abort decoding of the blocks that follow it.

use tracing::debug;

/// One decoded unit of server-pushed stream data.
///
/// A frame carries an id update, a text increment, or both; a block that
/// contributes neither produces no frame at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamFrame {
    /// New conversation identifier announced by this block, if any.
    pub id_update: Option<String>,
    /// Text to append to the in-progress assistant message, if any.
    pub text_increment: Option<String>,
}

impl StreamFrame {
    /// Whether the frame carries no information at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id_update.is_none() && self.text_increment.is_none()
    }
}

/// Classification of a single line inside a block.
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    /// `id: <rest>` - conversation id announcement.
    Id(&'a str),
    /// `data: <rest>` - candidate JSON string payload.
    Data(&'a str),
    /// Anything else; skipped.
    Ignored,
}

fn classify(line: &str) -> Line<'_> {
    if let Some(rest) = line.strip_prefix("id: ") {
        Line::Id(rest)
    } else if let Some(rest) = line.strip_prefix("data: ") {
        Line::Data(rest)
    } else {
        Line::Ignored
    }
}

/// Incremental frame decoder for one in-flight response stream.
///
/// Feed raw chunks in arrival order with [`feed`](Self::feed); call
/// [`finish`](Self::finish) exactly once when the underlying stream signals
/// completion. `finish` consumes the decoder, so reuse after completion is
/// a compile error.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Bytes after the last observed separator. Never contains a complete
    /// block: completed blocks are drained as soon as their separator lands.
    pending: Vec<u8>,
}

impl StreamDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode all blocks completed by `chunk`, in arrival order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamFrame> {
        self.pending.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = find_separator(&self.pending) {
            let block: Vec<u8> = self.pending.drain(..pos + 2).collect();
            let text = String::from_utf8_lossy(&block);
            if let Some(frame) = parse_block(&text) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush the trailing block, if any.
    ///
    /// The final block of a stream is not guaranteed to carry a
    /// terminating separator.
    #[must_use]
    pub fn finish(self) -> Option<StreamFrame> {
        if self.pending.is_empty() {
            return None;
        }
        let text = String::from_utf8_lossy(&self.pending);
        parse_block(&text)
    }
}

/// Position of the first `\n\n` separator in `buf`.
fn find_separator(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

/// Assemble one frame from the lines of a block.
///
/// Multiple `data:` lines in one block concatenate into the single text
/// increment; for `id:` lines the last announcement wins.
fn parse_block(block: &str) -> Option<StreamFrame> {
    let mut frame = StreamFrame::default();

    for line in block.lines() {
        match classify(line) {
            Line::Id(rest) => {
                let id = rest.trim();
                // The conversation id only ever moves forward; an empty
                // announcement cannot un-set it.
                if !id.is_empty() {
                    frame.id_update = Some(id.to_string());
                }
            }
            Line::Data(rest) => match serde_json::from_str::<String>(rest) {
                Ok(text) => match frame.text_increment.as_mut() {
                    Some(existing) => existing.push_str(&text),
                    None => frame.text_increment = Some(text),
                },
                Err(error) => {
                    debug!(%error, payload = rest, "dropping malformed data payload");
                }
            },
            Line::Ignored => {}
        }
    }

    if frame.is_empty() { None } else { Some(frame) }
}
