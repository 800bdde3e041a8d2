use serde_json::{json, Value};

use crate::normalized::{NormalizedPayload, Role, SourceProtocol};

/// Encode a normalized payload into an Anthropic `/v1/messages` request
/// body targeting `upstream_model`. When the caller already spoke
/// Anthropic, this takes the fast passthrough path: the original document
/// is forwarded with only the model id and stream flag substituted,
/// per spec §4.6.
pub fn encode(payload: &NormalizedPayload, upstream_model: &str) -> Value {
    if payload.source_protocol == SourceProtocol::Anthropic {
        let mut body = payload.original.clone();
        if let Some(obj) = body.as_object_mut() {
            obj.insert("model".to_string(), json!(upstream_model));
            obj.insert("stream".to_string(), json!(payload.stream));
        }
        return body;
    }

    let mut system_parts = Vec::new();
    let mut messages = Vec::new();

    for msg in &payload.messages {
        if msg.role == Role::System {
            if !msg.text.is_empty() {
                system_parts.push(msg.text.clone());
            }
            continue;
        }

        let role = match msg.role {
            Role::Assistant => "assistant",
            Role::Tool => "user",
            _ => "user",
        };

        let mut blocks = Vec::new();
        if !msg.text.is_empty() {
            blocks.push(json!({"type": "text", "text": msg.text}));
        }
        for call in &msg.tool_calls {
            blocks.push(json!({
                "type": "tool_use",
                "id": call.id,
                "name": call.name,
                "input": call.arguments,
            }));
        }
        for result in &msg.tool_results {
            blocks.push(json!({
                "type": "tool_result",
                "tool_use_id": result.tool_call_id,
                "content": result.content,
                "is_error": result.is_error,
            }));
        }
        if blocks.is_empty() {
            continue;
        }
        messages.push(json!({"role": role, "content": blocks}));
    }

    let tools: Vec<Value> = payload
        .tools
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.input_schema,
            })
        })
        .collect();

    let mut body = json!({
        "model": upstream_model,
        "messages": messages,
        "stream": payload.stream,
        "max_tokens": payload.sampling.max_tokens.unwrap_or(4096),
    });

    let obj = body.as_object_mut().unwrap();
    if !system_parts.is_empty() {
        obj.insert("system".to_string(), json!(system_parts.join("\n")));
    }
    if !tools.is_empty() {
        obj.insert("tools".to_string(), json!(tools));
    }
    if let Some(t) = payload.sampling.temperature {
        obj.insert("temperature".to_string(), json!(t));
    }
    if let Some(p) = payload.sampling.top_p {
        obj.insert("top_p".to_string(), json!(p));
    }
    if !payload.sampling.stop.is_empty() {
        obj.insert("stop_sequences".to_string(), json!(payload.sampling.stop));
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode;
    use serde_json::json;

    #[test]
    fn anthropic_source_takes_passthrough_path() {
        let body = json!({
            "model": "claude-3-5-sonnet",
            "messages": [{"role": "user", "content": "hi"}]
        });
        let payload = decode::anthropic::decode(&body).unwrap();
        let encoded = encode(&payload, "claude-3-7-sonnet-20250219");
        assert_eq!(encoded["model"], "claude-3-7-sonnet-20250219");
        assert_eq!(encoded["messages"][0]["content"], "hi");
    }

    #[test]
    fn openai_source_bridges_into_anthropic_blocks() {
        let body = json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": null, "tool_calls": [
                    {"id": "c1", "type": "function", "function": {"name": "f", "arguments": "{}"}}
                ]}
            ]
        });
        let payload = decode::openai_chat::decode(&body).unwrap();
        let encoded = encode(&payload, "claude-3-7-sonnet-20250219");
        assert_eq!(encoded["messages"][1]["content"][0]["type"], "tool_use");
    }
}
