use serde_json::json;

use super::sse;
use crate::stream_event::IntermediateEvent;

#[derive(Clone, Copy, PartialEq)]
enum OpenKind {
    Text,
    Thinking,
    Tool,
}

/// Re-frames the protocol-neutral `IntermediateEvent` stream back into
/// Anthropic's `message_start`/`content_block_*`/`message_delta`/
/// `message_stop` SSE shape, for callers that spoke the Anthropic
/// protocol talking to an upstream that doesn't (or vice versa via the
/// Router's cross-protocol bridge). Mirrors
/// `stream_decode::anthropic::AnthropicStreamDecoder` in reverse.
#[derive(Default)]
pub struct AnthropicStreamEncoder {
    next_index: u32,
    open: Option<(u32, OpenKind)>,
    pending_usage: Option<(Option<u64>, Option<u64>)>,
}

impl AnthropicStreamEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encode(&mut self, event: &IntermediateEvent) -> String {
        match event {
            IntermediateEvent::MessageStart { model } => sse(
                Some("message_start"),
                &json!({"type": "message_start", "message": {"role": "assistant", "model": model}}),
            ),
            IntermediateEvent::TextDelta { text } => self.append(OpenKind::Text, |idx| {
                json!({"type": "content_block_delta", "index": idx, "delta": {"type": "text_delta", "text": text}})
            }, |idx| json!({"type": "content_block_start", "index": idx, "content_block": {"type": "text", "text": ""}})),
            IntermediateEvent::ThinkingDelta { text } => self.append(OpenKind::Thinking, |idx| {
                json!({"type": "content_block_delta", "index": idx, "delta": {"type": "thinking_delta", "thinking": text}})
            }, |idx| json!({"type": "content_block_start", "index": idx, "content_block": {"type": "thinking", "thinking": ""}})),
            IntermediateEvent::ToolCallDelta { id, name, args_chunk } => {
                if id.is_some() {
                    let mut out = String::new();
                    if let Some((idx, _)) = self.open.take() {
                        out.push_str(&sse(
                            Some("content_block_stop"),
                            &json!({"type": "content_block_stop", "index": idx}),
                        ));
                    }
                    let idx = self.next_index;
                    self.next_index += 1;
                    self.open = Some((idx, OpenKind::Tool));
                    out.push_str(&sse(
                        Some("content_block_start"),
                        &json!({"type": "content_block_start", "index": idx, "content_block": {"type": "tool_use", "id": id, "name": name}}),
                    ));
                    if let Some(chunk) = args_chunk {
                        out.push_str(&sse(
                            Some("content_block_delta"),
                            &json!({"type": "content_block_delta", "index": idx, "delta": {"type": "input_json_delta", "partial_json": chunk}}),
                        ));
                    }
                    out
                } else {
                    let idx = self.open.map(|(i, _)| i).unwrap_or(0);
                    sse(
                        Some("content_block_delta"),
                        &json!({"type": "content_block_delta", "index": idx, "delta": {"type": "input_json_delta", "partial_json": args_chunk}}),
                    )
                }
            }
            IntermediateEvent::Usage { input_tokens, output_tokens, .. } => {
                self.pending_usage = Some((*input_tokens, *output_tokens));
                String::new()
            }
            IntermediateEvent::MessageStop { stop_reason } => {
                let mut out = String::new();
                if let Some((idx, _)) = self.open.take() {
                    out.push_str(&sse(
                        Some("content_block_stop"),
                        &json!({"type": "content_block_stop", "index": idx}),
                    ));
                }
                let (input_tokens, output_tokens) = self.pending_usage.take().unwrap_or((None, None));
                out.push_str(&sse(
                    Some("message_delta"),
                    &json!({"type": "message_delta", "delta": {"stop_reason": stop_reason}, "usage": {"input_tokens": input_tokens, "output_tokens": output_tokens}}),
                ));
                out.push_str(&sse(Some("message_stop"), &json!({"type": "message_stop"})));
                out
            }
            IntermediateEvent::Error { message } => {
                sse(Some("error"), &json!({"type": "error", "error": {"message": message}}))
            }
        }
    }

    fn append(
        &mut self,
        kind: OpenKind,
        delta: impl Fn(u32) -> serde_json::Value,
        start: impl Fn(u32) -> serde_json::Value,
    ) -> String {
        let mut out = String::new();
        let needs_new = match self.open {
            Some((_, open_kind)) => open_kind != kind,
            None => true,
        };
        if needs_new {
            if let Some((idx, _)) = self.open.take() {
                out.push_str(&sse(
                    Some("content_block_stop"),
                    &json!({"type": "content_block_stop", "index": idx}),
                ));
            }
            let idx = self.next_index;
            self.next_index += 1;
            self.open = Some((idx, kind));
            out.push_str(&sse(Some("content_block_start"), &start(idx)));
        }
        let idx = self.open.map(|(i, _)| i).unwrap_or(0);
        out.push_str(&sse(Some("content_block_delta"), &delta(idx)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_then_stop_closes_block() {
        let mut enc = AnthropicStreamEncoder::new();
        let start_and_delta = enc.encode(&IntermediateEvent::TextDelta { text: "hi".into() });
        assert!(start_and_delta.contains("content_block_start"));
        assert!(start_and_delta.contains("content_block_delta"));
        let stop = enc.encode(&IntermediateEvent::MessageStop { stop_reason: Some("end_turn".into()) });
        assert!(stop.contains("content_block_stop"));
        assert!(stop.contains("message_stop"));
    }

    #[test]
    fn switching_kinds_closes_prior_block() {
        let mut enc = AnthropicStreamEncoder::new();
        enc.encode(&IntermediateEvent::TextDelta { text: "a".into() });
        let switch = enc.encode(&IntermediateEvent::ToolCallDelta {
            id: Some("t1".into()),
            name: Some("search".into()),
            args_chunk: None,
        });
        assert!(switch.contains("content_block_stop"));
        assert!(switch.contains("tool_use"));
    }
}
