use crate::normalized::NormalizedPayload;

/// Flatten tool calls, tool results, and thinking text into plain
/// human-readable text for route targets that don't support tools or
/// structured thinking (spec §4.6: route targets lacking tool/metadata
/// support still receive an intelligible prompt). Generalizes
/// `skynet_agent::thinking::strip_thinking_blocks`'s "drop the block,
/// keep the surrounding text" idiom to all structured content, not just
/// thinking blocks.
pub fn strip_unsupported(payload: &mut NormalizedPayload) {
    for msg in &mut payload.messages {
        let mut parts = Vec::new();
        if let Some(thinking) = msg.thinking_text.take() {
            if !thinking.is_empty() {
                parts.push(format!("[thinking]\n{thinking}"));
            }
        }
        if !msg.text.is_empty() {
            parts.push(msg.text.clone());
        }
        for call in msg.tool_calls.drain(..) {
            parts.push(format!(
                "[tool call: {} {}]",
                call.name,
                call.arguments
            ));
        }
        for result in msg.tool_results.drain(..) {
            parts.push(format!("[tool result: {}]", result.content));
        }
        msg.text = parts.join("\n\n");
    }
    payload.tools.clear();
}

/// Drop the Anthropic-specific `metadata` field when bridging to a
/// non-Anthropic wire family during passthrough encoding (spec §9 open
/// question (a)).
pub fn strip_metadata_field(doc: &mut serde_json::Value) {
    if let Some(obj) = doc.as_object_mut() {
        obj.remove("metadata");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode;
    use serde_json::json;

    #[test]
    fn tool_calls_flattened_to_text() {
        let body = json!({
            "model": "claude-3-7-sonnet-20250219",
            "messages": [
                {"role": "assistant", "content": [
                    {"type": "tool_use", "id": "t1", "name": "search", "input": {"q": "rust"}}
                ]}
            ]
        });
        let mut payload = decode::anthropic::decode(&body).unwrap();
        strip_unsupported(&mut payload);
        assert!(payload.messages[0].tool_calls.is_empty());
        assert!(payload.messages[0].text.contains("search"));
    }

    #[test]
    fn metadata_field_removed() {
        let mut doc = json!({"model": "x", "metadata": {"user_id": "abc"}});
        strip_metadata_field(&mut doc);
        assert!(doc.get("metadata").is_none());
    }
}
