use serde_json::Value;

use crate::error::{ProtocolError, Result};
use crate::normalized::{
    NormalizedMessage, NormalizedPayload, Role, SamplingParams, SourceProtocol, ToolCall,
    ToolResult, ToolSchema,
};

/// Decode an OpenAI `responses` request body. No direct teacher precedent
/// (`skynet-agent` only speaks chat/completions) — built from the public
/// Responses API shape, following the same per-item collapsing discipline
/// as the chat and Anthropic decoders: one `input` item becomes one
/// normalized message (or one tool call / tool result).
pub fn decode(body: &Value) -> Result<NormalizedPayload> {
    let model = body
        .get("model")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::Malformed("missing model".into()))?
        .to_string();

    let mut messages = Vec::new();

    if let Some(instructions) = body.get("instructions").and_then(Value::as_str) {
        messages.push(NormalizedMessage {
            role: Role::System,
            text: instructions.to_string(),
            ..Default::default()
        });
    }

    let input = body
        .get("input")
        .and_then(Value::as_array)
        .ok_or_else(|| ProtocolError::Malformed("missing input".into()))?;

    for item in input {
        messages.push(decode_item(item)?);
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
            .get("max_output_tokens")
            .and_then(Value::as_u64)
            .map(|v| v as u32),
        stop: Vec::new(),
    };

    let thinking = body
        .get("reasoning")
        .and_then(|r| r.get("effort"))
        .and_then(Value::as_str)
        .map(|e| e != "none")
        .unwrap_or(false);

    let stream = body.get("stream").and_then(Value::as_bool).unwrap_or(false);

    Ok(NormalizedPayload {
        source_protocol: SourceProtocol::OpenaiResponses,
        model,
        messages,
        tools,
        sampling,
        stream,
        thinking,
        original: body.clone(),
    })
}

fn decode_item(item: &Value) -> Result<NormalizedMessage> {
    let item_type = item.get("type").and_then(Value::as_str).unwrap_or("message");

    match item_type {
        "message" => {
            let role_str = item.get("role").and_then(Value::as_str).unwrap_or("user");
            let role = match role_str {
                "system" | "developer" => Role::System,
                "assistant" => Role::Assistant,
                _ => Role::User,
            };
            let text = item_content_to_text(item.get("content"));
            Ok(NormalizedMessage {
                role,
                text,
                ..Default::default()
            })
        }
        "function_call" => {
            let id = item
                .get("call_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let name = item
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let arguments = item
                .get("arguments")
                .and_then(Value::as_str)
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or(Value::Null);
            Ok(NormalizedMessage {
                role: Role::Assistant,
                tool_calls: vec![ToolCall {
                    id,
                    name,
                    arguments,
                }],
                ..Default::default()
            })
        }
        "function_call_output" => {
            let tool_call_id = item
                .get("call_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let content = item
                .get("output")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Ok(NormalizedMessage {
                role: Role::Tool,
                tool_results: vec![ToolResult {
                    tool_call_id,
                    content,
                    is_error: false,
                }],
                ..Default::default()
            })
        }
        other => Err(ProtocolError::Unsupported(format!(
            "unsupported input item type: {other}"
        ))),
    }
}

fn item_content_to_text(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| {
                p.get("text")
                    .or_else(|| p.get("input_text"))
                    .and_then(Value::as_str)
            })
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
        input_schema: raw.get("parameters").cloned().unwrap_or(Value::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn function_call_and_output_decode() {
        let body = json!({
            "model": "gpt-4o",
            "instructions": "be helpful",
            "input": [
                {"type": "message", "role": "user", "content": "search rust"},
                {"type": "function_call", "call_id": "c1", "name": "search", "arguments": "{\"q\":\"rust\"}"},
                {"type": "function_call_output", "call_id": "c1", "output": "results"}
            ]
        });
        let payload = decode(&body).unwrap();
        assert_eq!(payload.messages.len(), 4);
        assert_eq!(payload.messages[2].tool_calls[0].name, "search");
        assert_eq!(payload.messages[3].tool_results[0].content, "results");
    }

    #[test]
    fn unsupported_item_type_errors() {
        let body = json!({
            "model": "gpt-4o",
            "input": [{"type": "reasoning"}]
        });
        assert!(decode(&body).is_err());
    }
}
