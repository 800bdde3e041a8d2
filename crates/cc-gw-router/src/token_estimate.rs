use cc_gw_protocol::NormalizedPayload;

/// Default average bytes-per-token used when no family-specific constant
/// applies (spec §4.7: "a per-family average-bytes-per-token constant
/// (default 4)").
pub const DEFAULT_AVG_BYTES_PER_TOKEN: u64 = 4;

/// Heuristic token estimate: sum of UTF-8 byte lengths of all message
/// text, divided by the average-bytes-per-token constant.
pub fn estimate_tokens(payload: &NormalizedPayload) -> u64 {
    estimate_tokens_with_constant(payload, DEFAULT_AVG_BYTES_PER_TOKEN)
}

pub fn estimate_tokens_with_constant(payload: &NormalizedPayload, avg_bytes_per_token: u64) -> u64 {
    let avg = avg_bytes_per_token.max(1);
    let total_bytes: u64 = payload
        .messages
        .iter()
        .map(|m| {
            let mut len = m.text.len() as u64;
            if let Some(thinking) = &m.thinking_text {
                len += thinking.len() as u64;
            }
            for call in &m.tool_calls {
                len += call.arguments.to_string().len() as u64;
            }
            for result in &m.tool_results {
                len += result.content.len() as u64;
            }
            len
        })
        .sum();
    total_bytes / avg
}

#[cfg(test)]
mod tests {
    use super::*;
    use cc_gw_protocol::normalized::{NormalizedMessage, Role, SourceProtocol};

    #[test]
    fn estimate_scales_with_avg_bytes_per_token() {
        let payload = NormalizedPayload {
            source_protocol: SourceProtocol::Anthropic,
            model: "m".to_string(),
            messages: vec![NormalizedMessage {
                role: Role::User,
                text: "a".repeat(400),
                ..Default::default()
            }],
            tools: Vec::new(),
            sampling: Default::default(),
            stream: false,
            thinking: false,
            original: serde_json::json!({}),
        };
        assert_eq!(estimate_tokens(&payload), 100);
        assert_eq!(estimate_tokens_with_constant(&payload, 2), 200);
    }
}
