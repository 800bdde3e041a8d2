use serde_json::Value;

use super::{drain_blocks, parse_block};
use crate::stream_event::IntermediateEvent;

/// Stateful decoder for an Anthropic `/v1/messages` SSE stream. Grounded
/// on `skynet_agent::anthropic_stream::process_stream`'s state machine
/// (named-event dispatch, cross-chunk line buffering), extended to split
/// `message_start` and tool-call argument deltas into their own
/// `IntermediateEvent` variants instead of folding them into `ToolUse`.
#[derive(Default)]
pub struct AnthropicStreamDecoder {
    buf: String,
    pending_stop_reason: Option<String>,
}

impl AnthropicStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &str) -> Vec<IntermediateEvent> {
        self.buf.push_str(chunk);
        let blocks = drain_blocks(&mut self.buf);
        blocks
            .into_iter()
            .flat_map(|b| self.process_block(&b))
            .collect()
    }

    /// Flush any partial trailing block left in the buffer at stream
    /// close, so a chunk that arrived without its terminating blank line
    /// is still surfaced before `message_stop`.
    pub fn flush(&mut self) -> Vec<IntermediateEvent> {
        if self.buf.trim().is_empty() {
            return Vec::new();
        }
        let block = std::mem::take(&mut self.buf);
        self.process_block(&block)
    }

    fn process_block(&mut self, block: &str) -> Vec<IntermediateEvent> {
        let (event_type, data) = parse_block(block);
        let Some(event_type) = event_type else {
            return Vec::new();
        };
        let parsed: Value = match serde_json::from_str(&data) {
            Ok(v) => v,
            Err(_) => return Vec::new(),
        };

        match event_type.as_str() {
            "message_start" => {
                let model = parsed
                    .get("message")
                    .and_then(|m| m.get("model"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                vec![IntermediateEvent::MessageStart { model }]
            }
            "content_block_start" => {
                let block_type = parsed
                    .get("content_block")
                    .and_then(|b| b.get("type"))
                    .and_then(Value::as_str)
                    .unwrap_or("");
                if block_type == "tool_use" {
                    let id = parsed
                        .get("content_block")
                        .and_then(|b| b.get("id"))
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    let name = parsed
                        .get("content_block")
                        .and_then(|b| b.get("name"))
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    return vec![IntermediateEvent::ToolCallDelta {
                        id,
                        name,
                        args_chunk: None,
                    }];
                }
                Vec::new()
            }
            "content_block_delta" => {
                let delta = parsed.get("delta");
                let delta_type = delta
                    .and_then(|d| d.get("type"))
                    .and_then(Value::as_str)
                    .unwrap_or("");
                match delta_type {
                    "text_delta" => {
                        let text = delta
                            .and_then(|d| d.get("text"))
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        vec![IntermediateEvent::TextDelta { text }]
                    }
                    "thinking_delta" => {
                        let text = delta
                            .and_then(|d| d.get("thinking"))
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        vec![IntermediateEvent::ThinkingDelta { text }]
                    }
                    "input_json_delta" => {
                        let chunk = delta
                            .and_then(|d| d.get("partial_json"))
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        vec![IntermediateEvent::ToolCallDelta {
                            id: None,
                            name: None,
                            args_chunk: Some(chunk),
                        }]
                    }
                    _ => Vec::new(),
                }
            }
            "message_delta" => {
                let stop_reason = parsed
                    .get("delta")
                    .and_then(|d| d.get("stop_reason"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                self.pending_stop_reason = stop_reason;
                let output_tokens = parsed
                    .get("usage")
                    .and_then(|u| u.get("output_tokens"))
                    .and_then(Value::as_u64);
                if output_tokens.is_some() {
                    vec![IntermediateEvent::Usage {
                        input_tokens: None,
                        output_tokens,
                        cached_tokens: None,
                    }]
                } else {
                    Vec::new()
                }
            }
            "message_stop" => {
                vec![IntermediateEvent::MessageStop {
                    stop_reason: self.pending_stop_reason.take(),
                }]
            }
            "error" => {
                let message = parsed
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("upstream error")
                    .to_string();
                vec![IntermediateEvent::Error { message }]
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_delta_round_trip() {
        let mut dec = AnthropicStreamDecoder::new();
        let events = dec.feed(
            "event: message_start\ndata: {\"message\":{\"model\":\"claude-3-7\"}}\n\n\
             event: content_block_delta\ndata: {\"delta\":{\"type\":\"text_delta\",\"text\":\"hi\"}}\n\n",
        );
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], IntermediateEvent::MessageStart { .. }));
        match &events[1] {
            IntermediateEvent::TextDelta { text } => assert_eq!(text, "hi"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn tool_use_args_stitch_across_chunks() {
        let mut dec = AnthropicStreamDecoder::new();
        let mut events = dec.feed(
            "event: content_block_start\ndata: {\"content_block\":{\"type\":\"tool_use\",\"id\":\"t1\",\"name\":\"search\"}}\n\n",
        );
        events.extend(dec.feed(
            "event: content_block_delta\ndata: {\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{\\\"q\\\":\"}}\n\n",
        ));
        events.extend(dec.feed(
            "event: content_block_delta\ndata: {\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"\\\"rust\\\"}\"}}\n\n",
        ));
        assert_eq!(events.len(), 3);
        match &events[0] {
            IntermediateEvent::ToolCallDelta { id, name, .. } => {
                assert_eq!(id.as_deref(), Some("t1"));
                assert_eq!(name.as_deref(), Some("search"));
            }
            other => panic!("unexpected {other:?}"),
        }
        match &events[1] {
            IntermediateEvent::ToolCallDelta { id, args_chunk, .. } => {
                assert!(id.is_none());
                assert!(args_chunk.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn partial_trailing_block_flushed_before_stop() {
        let mut dec = AnthropicStreamDecoder::new();
        let mut events = dec.feed("event: content_block_delta\ndata: {\"delta\":{\"type\":\"text_delta\",\"text\":\"partial\"}}");
        assert!(events.is_empty());
        events = dec.flush();
        assert_eq!(events.len(), 1);
    }
}
