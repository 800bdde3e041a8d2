use serde_json::{json, Value};

use crate::normalized::{NormalizedPayload, Role, SourceProtocol};

/// Encode a normalized payload into an OpenAI `chat/completions` request
/// body targeting `upstream_model`. Takes the fast passthrough path when
/// the caller already spoke OpenAI chat. Grounded on
/// `skynet-agent::openai::OpenAiProvider::build_request_body`, run in
/// reverse (normalized model -> OpenAI wire shape instead of the other
/// way around).
pub fn encode(payload: &NormalizedPayload, upstream_model: &str) -> Value {
    if payload.source_protocol == SourceProtocol::OpenaiChat {
        let mut body = payload.original.clone();
        if let Some(obj) = body.as_object_mut() {
            obj.insert("model".to_string(), json!(upstream_model));
            obj.insert("stream".to_string(), json!(payload.stream));
        }
        return body;
    }

    let mut messages = Vec::new();

    for msg in &payload.messages {
        match msg.role {
            Role::System => {
                messages.push(json!({"role": "system", "content": msg.text}));
            }
            Role::User => {
                messages.push(json!({"role": "user", "content": msg.text}));
            }
            Role::Assistant => {
                let mut entry = json!({
                    "role": "assistant",
                    "content": if msg.text.is_empty() { Value::Null } else { json!(msg.text) },
                });
                if !msg.tool_calls.is_empty() {
                    let calls: Vec<Value> = msg
                        .tool_calls
                        .iter()
                        .map(|c| {
                            json!({
                                "id": c.id,
                                "type": "function",
                                "function": {
                                    "name": c.name,
                                    "arguments": serde_json::to_string(&c.arguments).unwrap_or_default(),
                                },
                            })
                        })
                        .collect();
                    entry
                        .as_object_mut()
                        .unwrap()
                        .insert("tool_calls".to_string(), json!(calls));
                }
                messages.push(entry);
            }
            Role::Tool => {}
        }

        // Tool results ride on whatever role the source protocol attaches
        // them to (a `Role::User` turn for Anthropic, `Role::Tool` for
        // OpenAI chat) — emit them role-agnostically, same as
        // `encode::anthropic`'s block loop.
        for result in &msg.tool_results {
            messages.push(json!({
                "role": "tool",
                "tool_call_id": result.tool_call_id,
                "content": result.content,
            }));
        }
    }

    let tools: Vec<Value> = payload
        .tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema,
                },
            })
        })
        .collect();

    let mut body = json!({
        "model": upstream_model,
        "messages": messages,
        "stream": payload.stream,
    });

    let obj = body.as_object_mut().unwrap();
    if !tools.is_empty() {
        obj.insert("tools".to_string(), json!(tools));
    }
    if let Some(t) = payload.sampling.temperature {
        obj.insert("temperature".to_string(), json!(t));
    }
    if let Some(p) = payload.sampling.top_p {
        obj.insert("top_p".to_string(), json!(p));
    }
    if let Some(m) = payload.sampling.max_tokens {
        obj.insert("max_tokens".to_string(), json!(m));
    }
    if !payload.sampling.stop.is_empty() {
        obj.insert("stop".to_string(), json!(payload.sampling.stop));
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode;
    use serde_json::json;

    #[test]
    fn anthropic_source_bridges_into_openai_messages() {
        let body = json!({
            "model": "claude-3-7-sonnet-20250219",
            "messages": [
                {"role": "user", "content": [{"type": "text", "text": "hi"}]},
                {"role": "assistant", "content": [
                    {"type": "tool_use", "id": "t1", "name": "search", "input": {"q": "x"}}
                ]}
            ]
        });
        let payload = decode::anthropic::decode(&body).unwrap();
        let encoded = encode(&payload, "gpt-4o");
        assert_eq!(encoded["model"], "gpt-4o");
        assert_eq!(encoded["messages"][1]["tool_calls"][0]["function"]["name"], "search");
    }
}
