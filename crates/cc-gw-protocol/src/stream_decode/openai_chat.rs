use serde_json::Value;

use super::{drain_blocks, parse_block};
use crate::stream_event::IntermediateEvent;

/// Stateful decoder for an OpenAI `chat/completions` SSE stream. Grounded
/// on `skynet_agent::openai::process_openai_stream`'s `data:`-line
/// buffering and `[DONE]` sentinel handling, extended to emit
/// `ToolCallDelta` events (the teacher's decoder only handled
/// `delta.content` and silently dropped `delta.tool_calls`).
#[derive(Default)]
pub struct OpenAiChatStreamDecoder {
    buf: String,
    sent_message_start: bool,
    pending_stop_reason: Option<String>,
}

impl OpenAiChatStreamDecoder {
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

    pub fn flush(&mut self) -> Vec<IntermediateEvent> {
        if self.buf.trim().is_empty() {
            return Vec::new();
        }
        let block = std::mem::take(&mut self.buf);
        self.process_block(&block)
    }

    fn process_block(&mut self, block: &str) -> Vec<IntermediateEvent> {
        let (_event, data) = parse_block(block);
        if data.trim() == "[DONE]" {
            return vec![IntermediateEvent::MessageStop {
                stop_reason: self.pending_stop_reason.take(),
            }];
        }
        let parsed: Value = match serde_json::from_str(&data) {
            Ok(v) => v,
            Err(_) => return Vec::new(),
        };

        let mut events = Vec::new();

        if !self.sent_message_start {
            self.sent_message_start = true;
            let model = parsed.get("model").and_then(Value::as_str).map(str::to_string);
            events.push(IntermediateEvent::MessageStart { model });
        }

        if let Some(choice) = parsed.get("choices").and_then(|c| c.get(0)) {
            if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
                self.pending_stop_reason = Some(reason.to_string());
            }

            if let Some(delta) = choice.get("delta") {
                if let Some(text) = delta.get("content").and_then(Value::as_str) {
                    if !text.is_empty() {
                        events.push(IntermediateEvent::TextDelta {
                            text: text.to_string(),
                        });
                    }
                }

                if let Some(calls) = delta.get("tool_calls").and_then(Value::as_array) {
                    for call in calls {
                        let id = call.get("id").and_then(Value::as_str).map(str::to_string);
                        let function = call.get("function");
                        let name = function
                            .and_then(|f| f.get("name"))
                            .and_then(Value::as_str)
                            .map(str::to_string);
                        let args_chunk = function
                            .and_then(|f| f.get("arguments"))
                            .and_then(Value::as_str)
                            .filter(|s| !s.is_empty())
                            .map(str::to_string);
                        events.push(IntermediateEvent::ToolCallDelta {
                            id,
                            name,
                            args_chunk,
                        });
                    }
                }
            }
        }

        if let Some(usage) = parsed.get("usage") {
            events.push(IntermediateEvent::Usage {
                input_tokens: usage.get("prompt_tokens").and_then(Value::as_u64),
                output_tokens: usage.get("completion_tokens").and_then(Value::as_u64),
                cached_tokens: usage
                    .get("prompt_tokens_details")
                    .and_then(|d| d.get("cached_tokens"))
                    .and_then(Value::as_u64),
            });
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_deltas_concatenate_to_full_text() {
        let mut dec = OpenAiChatStreamDecoder::new();
        let mut text = String::new();
        for chunk in [
            "data: {\"model\":\"gpt-4o\",\"choices\":[{\"delta\":{\"content\":\"hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
        ] {
            for ev in dec.feed(chunk) {
                if let IntermediateEvent::TextDelta { text: t } = ev {
                    text.push_str(&t);
                }
            }
        }
        assert_eq!(text, "hello");
    }

    #[test]
    fn tool_call_delta_first_chunk_carries_id_and_name() {
        let mut dec = OpenAiChatStreamDecoder::new();
        let events = dec.feed(
            "data: {\"model\":\"gpt-4o\",\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\"function\":{\"name\":\"search\",\"arguments\":\"\"}}]}}]}\n\n",
        );
        let tool_event = events
            .iter()
            .find(|e| matches!(e, IntermediateEvent::ToolCallDelta { .. }))
            .unwrap();
        match tool_event {
            IntermediateEvent::ToolCallDelta { id, name, .. } => {
                assert_eq!(id.as_deref(), Some("call_1"));
                assert_eq!(name.as_deref(), Some("search"));
            }
            _ => unreachable!(),
        }
    }
}
