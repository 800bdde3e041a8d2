use serde_json::json;

use super::sse;
use crate::stream_event::IntermediateEvent;

/// Re-frames `IntermediateEvent`s into OpenAI `chat/completions` stream
/// chunks, terminated by the `data: [DONE]` sentinel. Mirrors
/// `stream_decode::openai_chat::OpenAiChatStreamDecoder` in reverse.
#[derive(Default)]
pub struct OpenAiChatStreamEncoder {
    model: Option<String>,
    tool_call_index: Option<u32>,
    next_tool_index: u32,
}

impl OpenAiChatStreamEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encode(&mut self, event: &IntermediateEvent) -> String {
        match event {
            IntermediateEvent::MessageStart { model } => {
                self.model = model.clone();
                sse(
                    None,
                    &json!({"object": "chat.completion.chunk", "model": model, "choices": [{"index": 0, "delta": {"role": "assistant"}, "finish_reason": null}]}),
                )
            }
            IntermediateEvent::TextDelta { text } => sse(
                None,
                &json!({"object": "chat.completion.chunk", "model": self.model, "choices": [{"index": 0, "delta": {"content": text}, "finish_reason": null}]}),
            ),
            IntermediateEvent::ThinkingDelta { .. } => String::new(),
            IntermediateEvent::ToolCallDelta { id, name, args_chunk } => {
                let idx = if id.is_some() {
                    let idx = self.next_tool_index;
                    self.next_tool_index += 1;
                    self.tool_call_index = Some(idx);
                    idx
                } else {
                    self.tool_call_index.unwrap_or(0)
                };
                let mut function = serde_json::Map::new();
                if let Some(name) = name {
                    function.insert("name".to_string(), json!(name));
                }
                if let Some(chunk) = args_chunk {
                    function.insert("arguments".to_string(), json!(chunk));
                }
                let mut call = json!({"index": idx, "function": function});
                if let Some(id) = id {
                    call["id"] = json!(id);
                    call["type"] = json!("function");
                }
                sse(
                    None,
                    &json!({"object": "chat.completion.chunk", "model": self.model, "choices": [{"index": 0, "delta": {"tool_calls": [call]}, "finish_reason": null}]}),
                )
            }
            IntermediateEvent::Usage { input_tokens, output_tokens, cached_tokens } => sse(
                None,
                &json!({"object": "chat.completion.chunk", "model": self.model, "choices": [], "usage": {"prompt_tokens": input_tokens, "completion_tokens": output_tokens, "prompt_tokens_details": {"cached_tokens": cached_tokens}}}),
            ),
            IntermediateEvent::MessageStop { stop_reason } => {
                let finish = stop_reason.clone().unwrap_or_else(|| "stop".to_string());
                let mut out = sse(
                    None,
                    &json!({"object": "chat.completion.chunk", "model": self.model, "choices": [{"index": 0, "delta": {}, "finish_reason": finish}]}),
                );
                out.push_str("data: [DONE]\n\n");
                out
            }
            IntermediateEvent::Error { message } => sse(
                None,
                &json!({"error": {"message": message, "type": "upstream_error"}}),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_event_emits_done_sentinel() {
        let mut enc = OpenAiChatStreamEncoder::new();
        let out = enc.encode(&IntermediateEvent::MessageStop { stop_reason: Some("stop".into()) });
        assert!(out.contains("[DONE]"));
    }

    #[test]
    fn tool_call_start_carries_id_then_continuation_reuses_index() {
        let mut enc = OpenAiChatStreamEncoder::new();
        let first = enc.encode(&IntermediateEvent::ToolCallDelta {
            id: Some("call_1".into()),
            name: Some("search".into()),
            args_chunk: None,
        });
        assert!(first.contains("call_1"));
        let second = enc.encode(&IntermediateEvent::ToolCallDelta {
            id: None,
            name: None,
            args_chunk: Some("{}".into()),
        });
        assert!(second.contains("\"index\":0"));
    }
}
