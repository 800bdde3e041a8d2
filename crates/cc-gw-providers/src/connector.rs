use async_trait::async_trait;
use cc_gw_core::config::{ProviderConfig, WireFamily};
use serde_json::Value;

use crate::error::Result;
use crate::families::{anthropic, openai_compat};

pub struct ConnectorRequest<'a> {
    pub provider: &'a ProviderConfig,
    pub body: Value,
    /// Caller headers to relay upstream verbatim, already filtered by the
    /// HTTP layer per spec §6 (excludes `host`, `connection`,
    /// `content-length`, `transfer-encoding`, and the caller's own
    /// `authorization`). Applied before the family's own auth header, so
    /// a forwarded header never shadows the provider credential.
    pub forward_headers: Vec<(String, String)>,
}

/// Uniform provider contract (spec §4.8): `send(request) → response`
/// where the response carries status, headers, and an optional byte
/// stream — all of which `reqwest::Response` already exposes, so the
/// trait returns it directly rather than wrapping it in a bespoke type.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn send(&self, req: ConnectorRequest<'_>) -> Result<reqwest::Response>;
}

/// The only implementation: a plain HTTP POST via `reqwest`, with
/// family-specific URL suffix and auth header rules dispatched from
/// `families::{anthropic, openai_compat}`. Grounded on
/// `skynet_agent::anthropic::AnthropicProvider::send` /
/// `skynet_agent::openai::OpenAiProvider::send`, generalized from one
/// struct per provider to one connector dispatching on `WireFamily`.
pub struct HttpConnector {
    client: reqwest::Client,
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpConnector {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn send(&self, req: ConnectorRequest<'_>) -> Result<reqwest::Response> {
        let provider = req.provider;
        let url = match provider.wire_family {
            WireFamily::Anthropic => anthropic::build_url(provider),
            _ => openai_compat::build_url(provider),
        };

        let mut builder = self.client.post(&url).json(&req.body);
        for (name, value) in &req.forward_headers {
            builder = builder.header(name, value);
        }
        builder = match provider.wire_family {
            WireFamily::Anthropic => anthropic::apply_auth(builder, provider),
            _ => openai_compat::apply_auth(builder, provider),
        };

        Ok(builder.send().await?)
    }
}

/// Rewrite an upstream error body into the stable `{error:{code,message}}`
/// shape, dispatching to the family-specific table.
pub fn map_error_body(wire_family: &WireFamily, status: u16, body: &Value) -> Value {
    match wire_family {
        WireFamily::Anthropic => anthropic::map_error_body(status, body),
        _ => openai_compat::map_error_body(status, body),
    }
}
