use cc_gw_core::config::WireFamily;
use cc_gw_protocol::SourceProtocol;
use serde_json::{json, Value};

/// A non-streaming upstream response, reduced to the handful of fields
/// every caller-facing shape needs. Built once per buffered response,
/// then re-emitted in whichever protocol the caller is speaking.
#[derive(Debug, Default)]
pub struct ParsedUpstreamResponse {
    pub text: String,
    pub tool_calls: Vec<(String, String, Value)>,
    pub stop_reason: String,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    pub cached_tokens: Option<i64>,
}

/// Does the upstream's wire shape already match what the caller is
/// speaking, so the body can be forwarded near-verbatim? Mirrors
/// `cc_gw_protocol::encode`'s fast-passthrough check for the inbound
/// direction.
pub fn wire_matches_caller(upstream: &WireFamily, caller: SourceProtocol) -> bool {
    match upstream {
        WireFamily::Anthropic => caller == SourceProtocol::Anthropic,
        _ => caller == SourceProtocol::OpenaiChat,
    }
}

pub fn parse_upstream(body: &Value, upstream_family: &WireFamily) -> ParsedUpstreamResponse {
    match upstream_family {
        WireFamily::Anthropic => parse_anthropic(body),
        _ => parse_openai_chat(body),
    }
}

fn parse_anthropic(body: &Value) -> ParsedUpstreamResponse {
    let mut out = ParsedUpstreamResponse {
        stop_reason: body
            .get("stop_reason")
            .and_then(Value::as_str)
            .unwrap_or("end_turn")
            .to_string(),
        input_tokens: body
            .get("usage")
            .and_then(|u| u.get("input_tokens"))
            .and_then(Value::as_i64),
        output_tokens: body
            .get("usage")
            .and_then(|u| u.get("output_tokens"))
            .and_then(Value::as_i64),
        cached_tokens: body
            .get("usage")
            .and_then(|u| u.get("cache_read_input_tokens"))
            .and_then(Value::as_i64),
        ..Default::default()
    };

    let mut text_parts = Vec::new();
    if let Some(blocks) = body.get("content").and_then(Value::as_array) {
        for block in blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    if let Some(t) = block.get("text").and_then(Value::as_str) {
                        text_parts.push(t.to_string());
                    }
                }
                Some("tool_use") => {
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
                    let input = block.get("input").cloned().unwrap_or(Value::Null);
                    out.tool_calls.push((id, name, input));
                }
                _ => {}
            }
        }
    }
    out.text = text_parts.join("\n");
    out
}

fn parse_openai_chat(body: &Value) -> ParsedUpstreamResponse {
    let choice = body.get("choices").and_then(|c| c.get(0));
    let message = choice.and_then(|c| c.get("message"));

    let finish_reason = choice
        .and_then(|c| c.get("finish_reason"))
        .and_then(Value::as_str)
        .unwrap_or("stop");

    let mut tool_calls = Vec::new();
    if let Some(calls) = message.and_then(|m| m.get("tool_calls")).and_then(Value::as_array) {
        for call in calls {
            let id = call
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let name = call
                .get("function")
                .and_then(|f| f.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let args_str = call
                .get("function")
                .and_then(|f| f.get("arguments"))
                .and_then(Value::as_str)
                .unwrap_or("{}");
            let args = serde_json::from_str(args_str).unwrap_or(Value::Null);
            tool_calls.push((id, name, args));
        }
    }

    ParsedUpstreamResponse {
        text: message
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        tool_calls,
        stop_reason: openai_to_anthropic_stop_reason(finish_reason).to_string(),
        input_tokens: body
            .get("usage")
            .and_then(|u| u.get("prompt_tokens"))
            .and_then(Value::as_i64),
        output_tokens: body
            .get("usage")
            .and_then(|u| u.get("completion_tokens"))
            .and_then(Value::as_i64),
        cached_tokens: body
            .get("usage")
            .and_then(|u| u.get("prompt_tokens_details"))
            .and_then(|d| d.get("cached_tokens"))
            .and_then(Value::as_i64),
    }
}

fn openai_to_anthropic_stop_reason(reason: &str) -> &'static str {
    match reason {
        "tool_calls" => "tool_use",
        "length" => "max_tokens",
        _ => "end_turn",
    }
}

fn anthropic_to_openai_finish_reason(reason: &str) -> &'static str {
    match reason {
        "tool_use" => "tool_calls",
        "max_tokens" => "length",
        _ => "stop",
    }
}

/// Re-emit a parsed upstream response in the caller's protocol shape.
/// Used whenever `wire_matches_caller` is false.
pub fn render(parsed: &ParsedUpstreamResponse, caller: SourceProtocol, model: &str) -> Value {
    match caller {
        SourceProtocol::Anthropic => render_anthropic(parsed, model),
        SourceProtocol::OpenaiChat => render_openai_chat(parsed, model),
        SourceProtocol::OpenaiResponses => render_openai_responses(parsed, model),
    }
}

fn render_anthropic(parsed: &ParsedUpstreamResponse, model: &str) -> Value {
    let mut content = Vec::new();
    if !parsed.text.is_empty() {
        content.push(json!({"type": "text", "text": parsed.text}));
    }
    for (id, name, input) in &parsed.tool_calls {
        content.push(json!({"type": "tool_use", "id": id, "name": name, "input": input}));
    }
    json!({
        "id": format!("msg_{}", uuid::Uuid::now_v7()),
        "type": "message",
        "role": "assistant",
        "model": model,
        "content": content,
        "stop_reason": parsed.stop_reason,
        "usage": {
            "input_tokens": parsed.input_tokens.unwrap_or(0),
            "output_tokens": parsed.output_tokens.unwrap_or(0),
        },
    })
}

fn render_openai_chat(parsed: &ParsedUpstreamResponse, model: &str) -> Value {
    let tool_calls: Vec<Value> = parsed
        .tool_calls
        .iter()
        .map(|(id, name, args)| {
            json!({
                "id": id,
                "type": "function",
                "function": {"name": name, "arguments": args.to_string()},
            })
        })
        .collect();

    let mut message = json!({
        "role": "assistant",
        "content": if parsed.text.is_empty() { Value::Null } else { Value::String(parsed.text.clone()) },
    });
    if !tool_calls.is_empty() {
        message["tool_calls"] = Value::Array(tool_calls);
    }

    json!({
        "id": format!("chatcmpl-{}", uuid::Uuid::now_v7()),
        "object": "chat.completion",
        "model": model,
        "choices": [{
            "index": 0,
            "message": message,
            "finish_reason": anthropic_to_openai_finish_reason(&parsed.stop_reason),
        }],
        "usage": {
            "prompt_tokens": parsed.input_tokens.unwrap_or(0),
            "completion_tokens": parsed.output_tokens.unwrap_or(0),
            "total_tokens": parsed.input_tokens.unwrap_or(0) + parsed.output_tokens.unwrap_or(0),
        },
    })
}

fn render_openai_responses(parsed: &ParsedUpstreamResponse, model: &str) -> Value {
    let mut output = Vec::new();
    if !parsed.text.is_empty() {
        output.push(json!({
            "type": "message",
            "role": "assistant",
            "content": [{"type": "output_text", "text": parsed.text}],
        }));
    }
    for (id, name, args) in &parsed.tool_calls {
        output.push(json!({
            "type": "function_call",
            "call_id": id,
            "name": name,
            "arguments": args.to_string(),
        }));
    }
    json!({
        "id": format!("resp_{}", uuid::Uuid::now_v7()),
        "object": "response",
        "model": model,
        "status": "completed",
        "output": output,
        "usage": {
            "input_tokens": parsed.input_tokens.unwrap_or(0),
            "output_tokens": parsed.output_tokens.unwrap_or(0),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn openai_chat_upstream_renders_as_anthropic_for_anthropic_caller() {
        let upstream = json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1},
        });
        assert!(!wire_matches_caller(&WireFamily::Kimi, SourceProtocol::Anthropic));
        let parsed = parse_upstream(&upstream, &WireFamily::Kimi);
        let rendered = render(&parsed, SourceProtocol::Anthropic, "claude-3-5-sonnet-latest");
        assert_eq!(rendered["content"][0]["type"], "text");
        assert_eq!(rendered["content"][0]["text"], "hello");
        assert_eq!(rendered["stop_reason"], "end_turn");
    }

    #[test]
    fn anthropic_tool_use_upstream_renders_as_openai_tool_calls() {
        let upstream = json!({
            "content": [{"type": "tool_use", "id": "toolu_1", "name": "search", "input": {"q": "rust"}}],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 5, "output_tokens": 2},
        });
        let parsed = parse_upstream(&upstream, &WireFamily::Anthropic);
        let rendered = render(&parsed, SourceProtocol::OpenaiChat, "gpt-4o");
        assert_eq!(rendered["choices"][0]["finish_reason"], "tool_calls");
        assert_eq!(
            rendered["choices"][0]["message"]["tool_calls"][0]["function"]["name"],
            "search"
        );
    }

    #[test]
    fn matching_wire_family_is_a_passthrough() {
        assert!(wire_matches_caller(&WireFamily::Anthropic, SourceProtocol::Anthropic));
        assert!(wire_matches_caller(&WireFamily::Openai, SourceProtocol::OpenaiChat));
        assert!(!wire_matches_caller(&WireFamily::Openai, SourceProtocol::OpenaiResponses));
    }
}
