use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use cc_gw_core::config::{EndpointProtocol, ProviderConfig};
use cc_gw_core::error::GatewayError;
use cc_gw_protocol::{decode_request, NormalizedPayload, SourceProtocol};
use cc_gw_relay::{dispatch, RelayOutcome, RequestContext};
use cc_gw_router::{resolve, PayloadHints};
use cc_gw_router::token_estimate::estimate_tokens;
use cc_gw_store::keys::ApiKeyRow;
use futures_util::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::app::AppState;
use crate::error::{ApiError, Result};
use crate::middleware::{bearer_token, forwardable_headers};

pub async fn anthropic_messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    handle(state, "anthropic", SourceProtocol::Anthropic, headers, body).await
}

pub async fn openai_chat_completions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    handle(state, "openai", SourceProtocol::OpenaiChat, headers, body).await
}

pub async fn openai_responses(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    handle(state, "openai", SourceProtocol::OpenaiResponses, headers, body).await
}

/// Fallback route: matches a config-driven `custom_endpoints` alias by
/// exact path, or 404s. Resolved at request time since the router can't
/// be rebuilt on a hot config reload (spec §4.1, §4.12).
pub async fn custom_endpoint(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let doc = state.config.get();
    let path = uri.path();
    let Some(endpoint) = doc.custom_endpoints.iter().find(|e| e.path == path) else {
        return Err(ApiError::NotFound);
    };
    let (source, endpoint_family) = (protocol_of(&endpoint.protocol), endpoint.endpoint_family.clone());
    drop(doc);
    handle(state, &endpoint_family, source, headers, body).await
}

fn protocol_of(p: &EndpointProtocol) -> SourceProtocol {
    match p {
        EndpointProtocol::Anthropic => SourceProtocol::Anthropic,
        EndpointProtocol::OpenaiChat => SourceProtocol::OpenaiChat,
        EndpointProtocol::OpenaiResponses => SourceProtocol::OpenaiResponses,
    }
}

/// Shared pipeline for every model endpoint: authenticate, decode,
/// route, dispatch, render. Grounded on `skynet_gateway::http::openai_compat::chat_completions`'s
/// shape, generalized from one hardcoded provider call to the full
/// auth → decode → route → dispatch chain spec §4.12 requires.
async fn handle(
    state: Arc<AppState>,
    endpoint_family: &str,
    protocol: SourceProtocol,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let _guard = state.begin_request();

    let secret = bearer_token(&headers).ok_or(GatewayError::AuthRequired)?;
    let key: ApiKeyRow = state.keys.verify(secret, endpoint_family)?;

    let json: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::BadRequest(format!("invalid JSON body: {e}")))?;
    let payload: NormalizedPayload = decode_request(protocol, &json)?;

    let forward_headers = forwardable_headers(&headers);

    let doc = state.config.get();
    let hints = PayloadHints {
        thinking: payload.thinking,
        token_estimate: estimate_tokens(&payload),
    };
    let route = resolve(&doc, endpoint_family, &payload.model, hints)?;
    let provider: ProviderConfig = doc
        .providers
        .iter()
        .find(|p| p.id == route.provider_id)
        .cloned()
        .ok_or_else(|| GatewayError::RouteUnresolved(format!("unknown provider {}", route.provider_id)))?;
    drop(doc);

    let ctx = RequestContext {
        endpoint_family: endpoint_family.to_string(),
        session_id: None,
        api_key_id: Some(key.id.clone()),
        api_key_name: Some(key.name.clone()),
        api_key_masked: Some(masked_view(&key)),
        persist_payloads: state.config.get().payload_persistence.enabled,
        forward_headers,
    };

    let outcome = dispatch(state.db.clone(), state.connector.clone(), provider, route, payload, ctx).await?;

    Ok(render(outcome))
}

fn masked_view(key: &ApiKeyRow) -> String {
    if key.is_wildcard {
        return "*".to_string();
    }
    match (&key.prefix, &key.suffix) {
        (Some(prefix), Some(suffix)) => format!("{prefix}****{suffix}"),
        _ => format!("{}****", &key.id[..key.id.len().min(8)]),
    }
}

fn render(outcome: RelayOutcome) -> Response {
    match outcome {
        RelayOutcome::Buffered { status, body } => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, Json(body)).into_response()
        }
        RelayOutcome::Streaming { status, rx } => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
            // Chunks arrive already framed as raw SSE text
            // (`event: ...\ndata: ...\n\n`) by `cc_gw_protocol::stream_encode`,
            // so the body is forwarded verbatim rather than re-wrapped in
            // axum's own `Event` framing, which would double-encode it.
            let stream = ReceiverStream::new(rx).map(|chunk| Ok::<_, std::io::Error>(Bytes::from(chunk)));
            let body = Body::from_stream(stream);
            Response::builder()
                .status(status)
                .header(header::CONTENT_TYPE, "text/event-stream")
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::CONNECTION, "keep-alive")
                .body(body)
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}
