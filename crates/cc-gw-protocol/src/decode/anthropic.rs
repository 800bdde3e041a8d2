use serde_json::Value;

use crate::error::{ProtocolError, Result};
use crate::normalized::{
    NormalizedMessage, NormalizedPayload, Role, SamplingParams, SourceProtocol, ToolCall,
    ToolResult, ToolSchema,
};

/// Decode an Anthropic `/v1/messages` request body into the normalized
/// model. Content blocks within one message collapse into one
/// `NormalizedMessage`; the top-level `system` field becomes a leading
/// system message. Grounded on `skynet-agent::anthropic::AnthropicProvider`'s
/// `ContentBlock` handling, run in reverse (building the normalized model
/// from caller content instead of an outbound `ChatRequest`).
pub fn decode(body: &Value) -> Result<NormalizedPayload> {
    let model = body
        .get("model")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::Malformed("missing model".into()))?
        .to_string();

    let mut messages = Vec::new();

    if let Some(system) = body.get("system") {
        if let Some(text) = system_to_text(system) {
            messages.push(NormalizedMessage {
                role: Role::System,
                text,
                ..Default::default()
            });
        }
    }

    let raw_messages = body
        .get("messages")
        .and_then(Value::as_array)
        .ok_or_else(|| ProtocolError::Malformed("missing messages".into()))?;

    for raw in raw_messages {
        messages.push(decode_message(raw)?);
    }

    let tools = body
        .get("tools")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(decode_tool).collect())
        .unwrap_or_default();

    let sampling = SamplingParams {
        temperature: body.get("temperature").and_then(Value::as_f64),
        top_p: body.get("top_p").and_then(Value::as_f64),
        max_tokens: body
            .get("max_tokens")
            .and_then(Value::as_u64)
            .map(|v| v as u32),
        stop: body
            .get("stop_sequences")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    };

    let thinking = body
        .get("thinking")
        .and_then(|t| t.get("type"))
        .and_then(Value::as_str)
        .map(|t| t == "enabled")
        .unwrap_or(false);

    let stream = body.get("stream").and_then(Value::as_bool).unwrap_or(false);

    Ok(NormalizedPayload {
        source_protocol: SourceProtocol::Anthropic,
        model,
        messages,
        tools,
        sampling,
        stream,
        thinking,
        original: body.clone(),
    })
}

fn system_to_text(system: &Value) -> Option<String> {
    match system {
        Value::String(s) => Some(s.clone()),
        Value::Array(blocks) => {
            let joined: Vec<String> = blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .map(str::to_string)
                .collect();
            if joined.is_empty() {
                None
            } else {
                Some(joined.join("\n"))
            }
        }
        _ => None,
    }
}

fn decode_message(raw: &Value) -> Result<NormalizedMessage> {
    let role_str = raw
        .get("role")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::Malformed("message missing role".into()))?;
    let role = match role_str {
        "user" => Role::User,
        "assistant" => Role::Assistant,
        other => return Err(ProtocolError::Malformed(format!("unknown role: {other}"))),
    };

    let mut msg = NormalizedMessage {
        role,
        ..Default::default()
    };

    match raw.get("content") {
        Some(Value::String(s)) => msg.text = s.clone(),
        Some(Value::Array(blocks)) => {
            let mut text_parts = Vec::new();
            for block in blocks {
                let block_type = block.get("type").and_then(Value::as_str).unwrap_or("");
                match block_type {
                    "text" => {
                        if let Some(t) = block.get("text").and_then(Value::as_str) {
                            text_parts.push(t.to_string());
                        }
                    }
                    "thinking" => {
                        if let Some(t) = block.get("thinking").and_then(Value::as_str) {
                            msg.thinking_text
                                .get_or_insert_with(String::new)
                                .push_str(t);
                        }
                    }
                    "tool_use" => {
                        let id = block
                            .get("id")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        let name = block
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        let arguments = block.get("input").cloned().unwrap_or(Value::Null);
                        msg.tool_calls.push(ToolCall {
                            id,
                            name,
                            arguments,
                        });
                    }
                    "tool_result" => {
                        let tool_call_id = block
                            .get("tool_use_id")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        let content = tool_result_content_to_text(block.get("content"));
                        let is_error = block
                            .get("is_error")
                            .and_then(Value::as_bool)
                            .unwrap_or(false);
                        msg.tool_results.push(ToolResult {
                            tool_call_id,
                            content,
                            is_error,
                        });
                    }
                    "image" => {
                        text_parts.push("[image omitted]".to_string());
                    }
                    _ => {}
                }
            }
            msg.text = text_parts.join("\n");
        }
        _ => {}
    }

    Ok(msg)
}

fn tool_result_content_to_text(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn decode_tool(raw: &Value) -> Option<ToolSchema> {
    Some(ToolSchema {
        name: raw.get("name")?.as_str()?.to_string(),
        description: raw
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        input_schema: raw.get("input_schema").cloned().unwrap_or(Value::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collapses_blocks_into_one_message() {
        let body = json!({
            "model": "claude-3-7-sonnet-20250219",
            "system": "be terse",
            "messages": [
                {"role": "user", "content": [{"type": "text", "text": "hi"}]},
                {"role": "assistant", "content": [
                    {"type": "text", "text": "thinking about it"},
                    {"type": "tool_use", "id": "t1", "name": "search", "input": {"q": "rust"}}
                ]}
            ]
        });
        let payload = decode(&body).unwrap();
        assert_eq!(payload.messages.len(), 3);
        assert_eq!(payload.messages[0].role as u8, Role::System as u8);
        let assistant = &payload.messages[2];
        assert_eq!(assistant.tool_calls.len(), 1);
        assert_eq!(assistant.tool_calls[0].name, "search");
    }

    #[test]
    fn thinking_block_sets_flag_and_retains_text() {
        let body = json!({
            "model": "claude-3-7-sonnet-20250219",
            "thinking": {"type": "enabled", "budget_tokens": 1024},
            "messages": [
                {"role": "assistant", "content": [
                    {"type": "thinking", "thinking": "step one"},
                    {"type": "text", "text": "answer"}
                ]}
            ]
        });
        let payload = decode(&body).unwrap();
        assert!(payload.thinking);
        assert_eq!(
            payload.messages[0].thinking_text.as_deref(),
            Some("step one")
        );
    }

    #[test]
    fn missing_model_is_malformed() {
        let body = json!({"messages": []});
        assert!(decode(&body).is_err());
    }
}
