use cc_gw_core::config::ProviderConfig;
use reqwest::RequestBuilder;
use serde_json::{json, Value};

use super::join_suffixed;

/// Covers OpenAI, DeepSeek, Kimi (Moonshot), Huawei, and any other
/// OpenAI-compatible wire family: `…/v1/chat/completions` unless already
/// present. Grounded on `skynet_agent::openai::OpenAiProvider::send`.
pub fn build_url(provider: &ProviderConfig) -> String {
    join_suffixed(&provider.base_url, "/v1/chat/completions")
}

pub fn apply_auth(builder: RequestBuilder, provider: &ProviderConfig) -> RequestBuilder {
    let builder = builder.header("Authorization", format!("Bearer {}", provider.credential));
    provider
        .extra_headers
        .iter()
        .fold(builder, |b, (k, v)| b.header(k, v))
}

/// OpenAI-compatible upstreams already return `{error:{message,type,code}}`
/// most of the time; this normalizes the handful of shapes that don't
/// (bare string bodies, missing `code`) into the stable
/// `{error:{code,message}}` shape.
pub fn map_error_body(status: u16, body: &Value) -> Value {
    if let Some(err) = body.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| err.as_str())
            .unwrap_or("upstream request failed");
        let code = err
            .get("code")
            .and_then(Value::as_str)
            .or_else(|| err.get("type").and_then(Value::as_str))
            .unwrap_or(status_code_fallback(status));
        return json!({"error": {"code": code, "message": message, "status": status}});
    }

    json!({"error": {"code": status_code_fallback(status), "message": "upstream request failed", "status": status}})
}

fn status_code_fallback(status: u16) -> &'static str {
    match status {
        401 => "upstream_auth_failed",
        403 => "forbidden",
        404 => "not_found",
        429 => "rate_limited",
        500..=599 => "upstream_error",
        _ => "unknown_error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_object_normalized() {
        let body = json!({"error": {"message": "bad key", "code": "invalid_api_key"}});
        let mapped = map_error_body(401, &body);
        assert_eq!(mapped["error"]["code"], "invalid_api_key");
        assert_eq!(mapped["error"]["message"], "bad key");
    }

    #[test]
    fn missing_error_object_falls_back_on_status() {
        let mapped = map_error_body(429, &json!({}));
        assert_eq!(mapped["error"]["code"], "rate_limited");
    }
}
