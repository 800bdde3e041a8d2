use serde_json::Value;

use super::{drain_blocks, parse_block};
use crate::stream_event::IntermediateEvent;

/// Stateful decoder for an OpenAI `responses` SSE stream. No teacher
/// precedent; built directly from the typed-event shape described in
/// the spec (`response.output_text.delta`,
/// `response.function_call_arguments.delta`, `response.completed`),
/// following the same block-buffering shape as the other two decoders.
#[derive(Default)]
pub struct OpenAiResponsesStreamDecoder {
    buf: String,
}

impl OpenAiResponsesStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &str) -> Vec<IntermediateEvent> {
        self.buf.push_str(chunk);
        let blocks = drain_blocks(&mut self.buf);
        blocks.into_iter().flat_map(|b| process_block(&b)).collect()
    }

    pub fn flush(&mut self) -> Vec<IntermediateEvent> {
        if self.buf.trim().is_empty() {
            return Vec::new();
        }
        let block = std::mem::take(&mut self.buf);
        process_block(&block)
    }
}

fn process_block(block: &str) -> Vec<IntermediateEvent> {
    let (event_type, data) = parse_block(block);
    let Some(event_type) = event_type else {
        return Vec::new();
    };
    let parsed: Value = match serde_json::from_str(&data) {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    match event_type.as_str() {
        "response.created" => {
            let model = parsed
                .get("response")
                .and_then(|r| r.get("model"))
                .and_then(Value::as_str)
                .map(str::to_string);
            vec![IntermediateEvent::MessageStart { model }]
        }
        "response.output_text.delta" => {
            let text = parsed
                .get("delta")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            vec![IntermediateEvent::TextDelta { text }]
        }
        "response.reasoning_summary_text.delta" | "response.reasoning_text.delta" => {
            let text = parsed
                .get("delta")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            vec![IntermediateEvent::ThinkingDelta { text }]
        }
        "response.output_item.added" => {
            let item = parsed.get("item");
            let item_type = item
                .and_then(|i| i.get("type"))
                .and_then(Value::as_str)
                .unwrap_or("");
            if item_type == "function_call" {
                let id = item
                    .and_then(|i| i.get("call_id"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let name = item
                    .and_then(|i| i.get("name"))
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
        "response.function_call_arguments.delta" => {
            let chunk = parsed
                .get("delta")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            vec![IntermediateEvent::ToolCallDelta {
                id: None,
                name: None,
                args_chunk: Some(chunk),
            }]
        }
        "response.completed" => {
            let usage = parsed.get("response").and_then(|r| r.get("usage"));
            let mut events = Vec::new();
            if let Some(usage) = usage {
                events.push(IntermediateEvent::Usage {
                    input_tokens: usage.get("input_tokens").and_then(Value::as_u64),
                    output_tokens: usage.get("output_tokens").and_then(Value::as_u64),
                    cached_tokens: usage
                        .get("input_tokens_details")
                        .and_then(|d| d.get("cached_tokens"))
                        .and_then(Value::as_u64),
                });
            }
            events.push(IntermediateEvent::MessageStop { stop_reason: None });
            events
        }
        "error" | "response.failed" => {
            let message = parsed
                .get("error")
                .and_then(|e| e.get("message"))
                .or_else(|| parsed.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("upstream error")
                .to_string();
            vec![IntermediateEvent::Error { message }]
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_delta_and_completed_flow() {
        let mut dec = OpenAiResponsesStreamDecoder::new();
        let mut events = dec.feed(
            "event: response.created\ndata: {\"response\":{\"model\":\"gpt-4o\"}}\n\n",
        );
        events.extend(dec.feed(
            "event: response.output_text.delta\ndata: {\"delta\":\"hi\"}\n\n",
        ));
        events.extend(dec.feed(
            "event: response.completed\ndata: {\"response\":{\"usage\":{\"input_tokens\":3,\"output_tokens\":1}}}\n\n",
        ));
        assert!(matches!(events[0], IntermediateEvent::MessageStart { .. }));
        assert!(matches!(events[1], IntermediateEvent::TextDelta { .. }));
        assert!(events.iter().any(|e| matches!(e, IntermediateEvent::Usage { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, IntermediateEvent::MessageStop { .. })));
    }

    #[test]
    fn function_call_tool_events_carry_id_then_args() {
        let mut dec = OpenAiResponsesStreamDecoder::new();
        let mut events = dec.feed(
            "event: response.output_item.added\ndata: {\"item\":{\"type\":\"function_call\",\"call_id\":\"c1\",\"name\":\"search\"}}\n\n",
        );
        events.extend(dec.feed(
            "event: response.function_call_arguments.delta\ndata: {\"delta\":\"{\\\"q\\\":1}\"}\n\n",
        ));
        match &events[0] {
            IntermediateEvent::ToolCallDelta { id, name, .. } => {
                assert_eq!(id.as_deref(), Some("c1"));
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
}
