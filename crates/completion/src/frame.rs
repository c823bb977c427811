//! Frame interpreters for the two streaming payload dialects.
//!
//! Each interpreter is a pure function from a parsed frame to the text or
//! usage it contributes, keyed on the frame's shape rather than a version
//! flag. Interpreters are tried in order; the first one that recognizes the
//! shape wins. Supporting a third dialect means adding a function to the
//! table, not touching the stream loop.

use serde_json::Value;

/// One frame's contribution to the assembled completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameUpdate {
    /// Text fragment to append, in arrival order.
    pub text: Option<String>,
    /// Prompt-side token count, when the frame carries one.
    pub input_tokens: Option<u64>,
    /// Completion-side token count, when the frame carries one.
    pub output_tokens: Option<u64>,
}

impl FrameUpdate {
    fn is_empty(&self) -> bool {
        self.text.is_none() && self.input_tokens.is_none() && self.output_tokens.is_none()
    }
}

type FrameInterpreter = fn(&Value) -> Option<FrameUpdate>;

/// Dialect probes in priority order.
const FRAME_INTERPRETERS: &[FrameInterpreter] = &[interpret_event_frame, interpret_choice_frame];

/// Run a parsed frame through the interpreter table.
///
/// `None` means no dialect recognized the frame; the caller treats it as
/// protocol noise and moves on.
#[must_use]
pub fn interpret_frame(frame: &Value) -> Option<FrameUpdate> {
    FRAME_INTERPRETERS.iter().find_map(|probe| probe(frame))
}

/// Incremental-delta dialect: `content_block_delta` frames carry
/// `delta.text`, `message_start` carries `message.usage.input_tokens`, and
/// `message_delta` carries `usage.output_tokens`.
fn interpret_event_frame(frame: &Value) -> Option<FrameUpdate> {
    let mut update = FrameUpdate::default();

    if let Some(text) = frame["delta"]["text"].as_str()
        && !text.is_empty()
    {
        update.text = Some(text.to_string());
    }
    if let Some(v) = frame["message"]["usage"]["input_tokens"].as_u64() {
        update.input_tokens = Some(v);
    }
    if let Some(v) = frame["usage"]["output_tokens"].as_u64() {
        update.output_tokens = Some(v);
    }

    if update.is_empty() { None } else { Some(update) }
}

/// Choice-list dialect: `choices[0].delta.content` carries text and a
/// top-level `usage` object carries `prompt_tokens` / `completion_tokens`.
fn interpret_choice_frame(frame: &Value) -> Option<FrameUpdate> {
    let mut update = FrameUpdate::default();

    if let Some(content) = frame["choices"][0]["delta"]["content"].as_str()
        && !content.is_empty()
    {
        update.text = Some(content.to_string());
    }
    let usage = &frame["usage"];
    if let Some(v) = usage["prompt_tokens"].as_u64() {
        update.input_tokens = Some(v);
    }
    if let Some(v) = usage["completion_tokens"].as_u64() {
        update.output_tokens = Some(v);
    }

    if update.is_empty() { None } else { Some(update) }
}
