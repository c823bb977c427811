//! Reassembly of the chunked streaming response body.
//!
//! The body is a sequence of newline-delimited frames, each optionally
//! prefixed `data: `. Frames arrive split across network chunks however the
//! transport pleases (a boundary may even fall inside a multi-byte
//! character), so the assembler buffers raw bytes between reads and decodes
//! only whole lines. A literal `[DONE]` line ends the stream; lines that
//! fail to parse as JSON are noise, not errors.

use tracing::trace;

use crate::frame::{FrameUpdate, interpret_frame};

/// Stream-end sentinel. Carries no payload.
const DONE_SENTINEL: &str = "[DONE]";

/// The finished result of one streamed completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledCompletion {
    /// Concatenated text fragments, in arrival order.
    pub text: String,
    /// Prompt-side token count, if any frame reported one.
    pub input_tokens: Option<u64>,
    /// Completion-side token count, if any frame reported one.
    pub output_tokens: Option<u64>,
}

/// Accumulates network chunks into whole frames and frames into a completion.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    buf: Vec<u8>,
    text: String,
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
    done: bool,
}

impl StreamAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the stream-end sentinel has been seen. Nothing past it is
    /// interpreted.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one network chunk, interpreting any lines it completes.
    pub fn push_chunk(&mut self, chunk: &[u8]) {
        if self.done {
            return;
        }
        self.buf.extend_from_slice(chunk);

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line = String::from_utf8_lossy(&self.buf[..pos]).into_owned();
            self.buf.drain(..=pos);
            self.consume_line(&line);
            if self.done {
                return;
            }
        }
    }

    /// Consume the stream: any still-buffered partial line gets one last
    /// parse attempt before being discarded.
    #[must_use]
    pub fn finish(mut self) -> AssembledCompletion {
        if !self.done && !self.buf.is_empty() {
            let tail = std::mem::take(&mut self.buf);
            let tail = String::from_utf8_lossy(&tail);
            self.consume_line(&tail);
        }
        AssembledCompletion {
            text: self.text,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
        }
    }

    fn consume_line(&mut self, line: &str) {
        let line = line.trim_end_matches('\r');
        let data = line.strip_prefix("data:").unwrap_or(line).trim();
        if data.is_empty() {
            return;
        }
        if data == DONE_SENTINEL {
            self.done = true;
            return;
        }
        let Ok(frame) = serde_json::from_str::<serde_json::Value>(data) else {
            trace!(line = %data, "skipping unparseable frame");
            return;
        };
        if let Some(update) = interpret_frame(&frame) {
            self.apply(update);
        }
    }

    fn apply(&mut self, update: FrameUpdate) {
        if let Some(fragment) = update.text {
            self.text.push_str(&fragment);
        }
        if update.input_tokens.is_some() {
            self.input_tokens = update.input_tokens;
        }
        if update.output_tokens.is_some() {
            self.output_tokens = update.output_tokens;
        }
    }
}
