use cc_gw_core::config::ProviderConfig;
use reqwest::RequestBuilder;
use serde_json::{json, Value};

use super::join_suffixed;

/// Anthropic wire suffix: `…/v1/messages` unless already present.
/// Grounded on `skynet_agent::anthropic::AnthropicProvider::send`.
pub fn build_url(provider: &ProviderConfig) -> String {
    join_suffixed(&provider.base_url, "/v1/messages")
}

/// `Authorization: Bearer` for OAuth-style credentials, `x-api-key`
/// otherwise — the same selection `AnthropicProvider::auth_header` does.
pub fn apply_auth(builder: RequestBuilder, provider: &ProviderConfig) -> RequestBuilder {
    use cc_gw_core::config::CredentialMode;
    let builder = match provider.credential_mode {
        Some(CredentialMode::AuthToken) => {
            builder.header("Authorization", format!("Bearer {}", provider.credential))
        }
        _ => builder
            .header("x-api-key", &provider.credential)
            .header("anthropic-version", "2023-06-01"),
    };
    provider
        .extra_headers
        .iter()
        .fold(builder, |b, (k, v)| b.header(k, v))
}

/// Known Anthropic error `type` → stable code/message table, rewriting
/// the upstream body into `{error:{code,message}}` (spec §4.8).
pub fn map_error_body(status: u16, body: &Value) -> Value {
    let error_type = body
        .get("error")
        .and_then(|e| e.get("type"))
        .and_then(Value::as_str)
        .unwrap_or("unknown_error");
    let upstream_message = body
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("upstream request failed");

    let (code, message) = match error_type {
        "overloaded_error" => ("upstream_overloaded", "The upstream model is overloaded"),
        "rate_limit_error" => ("rate_limited", "Rate limit exceeded upstream"),
        "authentication_error" => ("upstream_auth_failed", "Upstream rejected the credential"),
        "invalid_request_error" => ("bad_request", upstream_message),
        "permission_error" => ("forbidden", "Upstream denied permission for this request"),
        "not_found_error" => ("not_found", "Upstream model or resource not found"),
        _ => ("upstream_error", upstream_message),
    };

    json!({"error": {"code": code, "message": message, "status": status}})
}
