use serde_json::json;

use super::sse;
use crate::stream_event::IntermediateEvent;

/// Re-frames `IntermediateEvent`s into OpenAI `responses` typed SSE
/// events. Mirrors `stream_decode::openai_responses` in reverse; no
/// teacher precedent, built from the spec's description of the wire
/// shape.
#[derive(Default)]
pub struct OpenAiResponsesStreamEncoder {
    model: Option<String>,
    open_tool_call_id: Option<String>,
}

impl OpenAiResponsesStreamEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encode(&mut self, event: &IntermediateEvent) -> String {
        match event {
            IntermediateEvent::MessageStart { model } => {
                self.model = model.clone();
                sse(
                    Some("response.created"),
                    &json!({"type": "response.created", "response": {"model": model}}),
                )
            }
            IntermediateEvent::TextDelta { text } => sse(
                Some("response.output_text.delta"),
                &json!({"type": "response.output_text.delta", "delta": text}),
            ),
            IntermediateEvent::ThinkingDelta { text } => sse(
                Some("response.reasoning_text.delta"),
                &json!({"type": "response.reasoning_text.delta", "delta": text}),
            ),
            IntermediateEvent::ToolCallDelta { id, name, args_chunk } => {
                if let Some(id) = id {
                    self.open_tool_call_id = Some(id.clone());
                    sse(
                        Some("response.output_item.added"),
                        &json!({"type": "response.output_item.added", "item": {"type": "function_call", "call_id": id, "name": name}}),
                    )
                } else {
                    sse(
                        Some("response.function_call_arguments.delta"),
                        &json!({"type": "response.function_call_arguments.delta", "call_id": self.open_tool_call_id, "delta": args_chunk}),
                    )
                }
            }
            IntermediateEvent::Usage { input_tokens, output_tokens, cached_tokens } => sse(
                Some("response.completed"),
                &json!({"type": "response.completed", "response": {"usage": {"input_tokens": input_tokens, "output_tokens": output_tokens, "input_tokens_details": {"cached_tokens": cached_tokens}}}}),
            ),
            IntermediateEvent::MessageStop { .. } => sse(
                Some("response.completed"),
                &json!({"type": "response.completed", "response": {}}),
            ),
            IntermediateEvent::Error { message } => sse(
                Some("response.failed"),
                &json!({"type": "response.failed", "error": {"message": message}}),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_call_delta_uses_last_open_call_id() {
        let mut enc = OpenAiResponsesStreamEncoder::new();
        enc.encode(&IntermediateEvent::ToolCallDelta {
            id: Some("c1".into()),
            name: Some("search".into()),
            args_chunk: None,
        });
        let out = enc.encode(&IntermediateEvent::ToolCallDelta {
            id: None,
            name: None,
            args_chunk: Some("{}".into()),
        });
        assert!(out.contains("c1"));
    }
}
