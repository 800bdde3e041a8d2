use serde_json::Value;

use crate::error::{ProtocolError, Result};
use crate::normalized::{
    NormalizedMessage, NormalizedPayload, Role, SamplingParams, SourceProtocol, ToolCall,
    ToolResult, ToolSchema,
};

/// Decode an OpenAI `chat/completions` request body. Messages are taken
/// close to verbatim; assistant `tool_calls` become `ToolCall` records
/// and `role: "tool"` messages become `ToolResult`s on the following
/// normalized turn. Grounded on
/// `skynet-agent::openai::OpenAiProvider::convert_raw_message_to_openai`,
/// run in the opposite direction (OpenAI wire shape -> normalized model).
pub fn decode(body: &Value) -> Result<NormalizedPayload> {
    let model = body
        .get("model")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::Malformed("missing model".into()))?
        .to_string();

    let raw_messages = body
        .get("messages")
        .and_then(Value::as_array)
        .ok_or_else(|| ProtocolError::Malformed("missing messages".into()))?;

    let mut messages = Vec::with_capacity(raw_messages.len());
    for raw in raw_messages {
        messages.push(decode_message(raw)?);
    }

    let tools = body
        .get("tools")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(decode_tool).collect())
        .unwrap_or_default();

    let stop = match body.get("stop") {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    let sampling = SamplingParams {
        temperature: body.get("temperature").and_then(Value::as_f64),
        top_p: body.get("top_p").and_then(Value::as_f64),
        max_tokens: body
            .get("max_tokens")
            .or_else(|| body.get("max_completion_tokens"))
            .and_then(Value::as_u64)
            .map(|v| v as u32),
        stop,
    };

    let thinking = body
        .get("reasoning_effort")
        .and_then(Value::as_str)
        .map(|v| v != "none")
        .unwrap_or(false);

    let stream = body.get("stream").and_then(Value::as_bool).unwrap_or(false);

    Ok(NormalizedPayload {
        source_protocol: SourceProtocol::OpenaiChat,
        model,
        messages,
        tools,
        sampling,
        stream,
        thinking,
        original: body.clone(),
    })
}

fn decode_message(raw: &Value) -> Result<NormalizedMessage> {
    let role_str = raw
        .get("role")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::Malformed("message missing role".into()))?;

    let role = match role_str {
        "system" | "developer" => Role::System,
        "user" => Role::User,
        "assistant" => Role::Assistant,
        "tool" => Role::Tool,
        other => return Err(ProtocolError::Malformed(format!("unknown role: {other}"))),
    };

    let mut msg = NormalizedMessage {
        role,
        ..Default::default()
    };

    if role == Role::Tool {
        let tool_call_id = raw
            .get("tool_call_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let content = content_to_text(raw.get("content"));
        msg.tool_results.push(ToolResult {
            tool_call_id,
            content,
            is_error: false,
        });
        return Ok(msg);
    }

    msg.text = content_to_text(raw.get("content"));

    if let Some(calls) = raw.get("tool_calls").and_then(Value::as_array) {
        for call in calls {
            let id = call
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let function = call.get("function");
            let name = function
                .and_then(|f| f.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let arguments = function
                .and_then(|f| f.get("arguments"))
                .and_then(Value::as_str)
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or(Value::Null);
            msg.tool_calls.push(ToolCall {
                id,
                name,
                arguments,
            });
        }
    }

    Ok(msg)
}

fn content_to_text(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn decode_tool(raw: &Value) -> Option<ToolSchema> {
    let function = raw.get("function")?;
    Some(ToolSchema {
        name: function.get("name")?.as_str()?.to_string(),
        description: function
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        input_schema: function.get("parameters").cloned().unwrap_or(Value::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_call_and_result_round_trip() {
        let body = json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "user", "content": "what's the weather"},
                {"role": "assistant", "content": null, "tool_calls": [
                    {"id": "call_1", "type": "function", "function": {"name": "weather", "arguments": "{\"city\":\"nyc\"}"}}
                ]},
                {"role": "tool", "tool_call_id": "call_1", "content": "sunny"}
            ]
        });
        let payload = decode(&body).unwrap();
        assert_eq!(payload.messages.len(), 3);
        assert_eq!(payload.messages[1].tool_calls[0].name, "weather");
        assert_eq!(payload.messages[2].tool_results[0].content, "sunny");
    }

    #[test]
    fn stop_string_normalized_to_vec() {
        let body = json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}],
            "stop": "STOP"
        });
        let payload = decode(&body).unwrap();
        assert_eq!(payload.sampling.stop, vec!["STOP".to_string()]);
    }
}
