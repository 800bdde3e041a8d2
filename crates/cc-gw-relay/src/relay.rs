use std::sync::Arc;

use cc_gw_core::config::{ProviderConfig, WireFamily};
use cc_gw_protocol::stream_decode::{
    anthropic::AnthropicStreamDecoder, openai_chat::OpenAiChatStreamDecoder,
};
use cc_gw_protocol::stream_encode::{
    anthropic::AnthropicStreamEncoder, openai_chat::OpenAiChatStreamEncoder,
    openai_responses::OpenAiResponsesStreamEncoder,
};
use cc_gw_protocol::stream_event::IntermediateEvent;
use cc_gw_protocol::{encode, strip, NormalizedPayload, SourceProtocol};
use cc_gw_providers::{map_error_body, Connector, ConnectorRequest};
use cc_gw_router::RouteTarget;
use cc_gw_store::logs::RequestLogRecord;
use cc_gw_store::metrics::DailyDelta;
use cc_gw_store::{payload as payload_codec, GatewayDb};
use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::error::{RelayError, Result};
use crate::meter::RequestMeter;
use crate::response;
use crate::state_machine::{RequestState, StateMachine};

/// Everything about the caller that isn't part of the decoded payload,
/// carried through to the final `request_logs` row.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub endpoint_family: String,
    pub session_id: Option<String>,
    pub api_key_id: Option<String>,
    pub api_key_name: Option<String>,
    pub api_key_masked: Option<String>,
    pub persist_payloads: bool,
    /// Caller headers to relay upstream, already filtered down by the
    /// HTTP layer per spec §6's exclusion list.
    pub forward_headers: Vec<(String, String)>,
}

/// What the HTTP layer does with the outcome: write one JSON body, or
/// forward an already SSE-framed stream of text chunks. Kept free of any
/// `axum` dependency so this crate is testable headless.
pub enum RelayOutcome {
    Buffered {
        status: u16,
        body: Value,
    },
    Streaming {
        status: u16,
        rx: mpsc::Receiver<String>,
    },
}

/// Send the request upstream and produce either a buffered JSON body or
/// a live SSE channel, per spec §4.9's buffered-vs-streaming split.
/// Spawns the durability work (log row, payload blob, daily upsert) onto
/// a background task in both cases so it never blocks the HTTP response.
pub async fn dispatch(
    db: Arc<GatewayDb>,
    connector: Arc<dyn Connector>,
    provider: ProviderConfig,
    route: RouteTarget,
    payload: NormalizedPayload,
    ctx: RequestContext,
) -> Result<RelayOutcome> {
    let mut sm = StateMachine::new();
    sm.advance(RequestState::Routed);

    let upstream_family = provider.wire_family.clone();
    let caller_protocol = payload.source_protocol;
    let is_stream = payload.stream;
    let client_model = payload.model.clone();
    let prompt_original = payload.original.clone();

    let request_body = build_upstream_body(&payload, &route.upstream_model_id, &provider, caller_protocol);

    sm.advance(RequestState::Dispatched);
    let meter = RequestMeter::start();

    let resp = connector
        .send(ConnectorRequest {
            provider: &provider,
            body: request_body,
            forward_headers: ctx.forward_headers.clone(),
        })
        .await
        .map_err(RelayError::Provider)?;

    let status = resp.status().as_u16();

    if status >= 400 {
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        let mapped = map_error_body(&upstream_family, status, &body);
        let latency_ms = meter.latency_ms();
        spawn_log_write(
            db,
            log_record(
                &ctx,
                &provider.id,
                &route.upstream_model_id,
                &client_model,
                is_stream,
                latency_ms,
                Some(status as i32),
                None,
                None,
                None,
                Some(latency_ms),
                None,
                Some(mapped.to_string()),
            ),
            ctx.persist_payloads.then(|| prompt_original.clone()),
            ctx.persist_payloads.then(|| mapped.clone()),
        );
        return Ok(RelayOutcome::Buffered { status, body: mapped });
    }

    if is_stream {
        sm.advance(RequestState::Streaming);
        let (tx, rx) = mpsc::channel::<String>(64);
        let spawn_ctx = ctx.clone();
        let spawn_provider_id = provider.id.clone();
        let spawn_model = route.upstream_model_id.clone();
        tokio::spawn(async move {
            run_stream_pump(
                resp,
                status,
                tx,
                meter,
                spawn_ctx,
                db,
                upstream_family,
                caller_protocol,
                spawn_provider_id,
                spawn_model,
                client_model,
                prompt_original,
            )
            .await;
        });
        Ok(RelayOutcome::Streaming { status, rx })
    } else {
        let body: Value = resp
            .json()
            .await
            .map_err(|e| RelayError::Provider(cc_gw_providers::ProviderConnError::Transport(e)))?;
        let parsed = response::parse_upstream(&body, &upstream_family);
        let out_body = if response::wire_matches_caller(&upstream_family, caller_protocol) {
            body
        } else {
            response::render(&parsed, caller_protocol, &client_model)
        };
        let latency_ms = meter.latency_ms();
        spawn_log_write(
            db,
            log_record(
                &ctx,
                &provider.id,
                &route.upstream_model_id,
                &client_model,
                false,
                latency_ms,
                Some(status as i32),
                parsed.input_tokens,
                parsed.output_tokens,
                parsed.cached_tokens,
                Some(latency_ms),
                None,
                None,
            ),
            ctx.persist_payloads.then(|| prompt_original),
            ctx.persist_payloads.then(|| out_body.clone()),
        );
        Ok(RelayOutcome::Buffered { status, body: out_body })
    }
}

/// Build the JSON body actually sent upstream: forward the caller's
/// original document near-verbatim (only swapping `model`) when the
/// caller and upstream already share a wire shape, otherwise bridge
/// through the normalized model via `cc_gw_protocol::encode`. Route
/// targets that don't accept tool definitions (`!provider.supports_tools`)
/// get `strip::strip_unsupported` applied first, flattening tool
/// calls/results into plain text (spec §4.6); an Anthropic-shaped caller
/// request forwarded to a non-Anthropic upstream loses its Anthropic
/// `metadata` field, which the target family doesn't understand (spec §9
/// open question (a)).
fn build_upstream_body(
    payload: &NormalizedPayload,
    upstream_model: &str,
    provider: &ProviderConfig,
    caller_protocol: SourceProtocol,
) -> Value {
    let upstream_family = &provider.wire_family;

    if !provider.supports_tools && carries_tool_content(payload) {
        let mut stripped = payload.clone();
        strip::strip_unsupported(&mut stripped);
        // Passthrough would forward the unstripped original verbatim, so
        // force the bridge path below regardless of wire match.
        stripped.source_protocol = match upstream_family {
            WireFamily::Anthropic => SourceProtocol::OpenaiChat,
            _ => SourceProtocol::Anthropic,
        };
        return match upstream_family {
            WireFamily::Anthropic => encode::anthropic::encode(&stripped, upstream_model),
            _ => encode::openai_chat::encode(&stripped, upstream_model),
        };
    }

    if response::wire_matches_caller(upstream_family, caller_protocol) {
        let mut body = payload.original.clone();
        if let Value::Object(ref mut map) = body {
            map.insert("model".to_string(), Value::String(upstream_model.to_string()));
        }
        if !matches!(upstream_family, WireFamily::Anthropic) {
            strip::strip_metadata_field(&mut body);
        }
        return body;
    }
    match upstream_family {
        WireFamily::Anthropic => encode::anthropic::encode(payload, upstream_model),
        _ => encode::openai_chat::encode(payload, upstream_model),
    }
}

fn carries_tool_content(payload: &NormalizedPayload) -> bool {
    !payload.tools.is_empty()
        || payload
            .messages
            .iter()
            .any(|m| !m.tool_calls.is_empty() || !m.tool_results.is_empty())
}

enum StreamDecoder {
    Anthropic(AnthropicStreamDecoder),
    OpenaiChat(OpenAiChatStreamDecoder),
}

impl StreamDecoder {
    fn for_family(family: &WireFamily) -> Self {
        match family {
            WireFamily::Anthropic => StreamDecoder::Anthropic(AnthropicStreamDecoder::new()),
            _ => StreamDecoder::OpenaiChat(OpenAiChatStreamDecoder::new()),
        }
    }

    fn feed(&mut self, chunk: &str) -> Vec<IntermediateEvent> {
        match self {
            StreamDecoder::Anthropic(d) => d.feed(chunk),
            StreamDecoder::OpenaiChat(d) => d.feed(chunk),
        }
    }

    fn flush(&mut self) -> Vec<IntermediateEvent> {
        match self {
            StreamDecoder::Anthropic(d) => d.flush(),
            StreamDecoder::OpenaiChat(d) => d.flush(),
        }
    }
}

enum StreamEncoder {
    Anthropic(AnthropicStreamEncoder),
    OpenaiChat(OpenAiChatStreamEncoder),
    OpenaiResponses(OpenAiResponsesStreamEncoder),
}

impl StreamEncoder {
    fn for_protocol(protocol: SourceProtocol) -> Self {
        match protocol {
            SourceProtocol::Anthropic => StreamEncoder::Anthropic(AnthropicStreamEncoder::new()),
            SourceProtocol::OpenaiChat => StreamEncoder::OpenaiChat(OpenAiChatStreamEncoder::new()),
            SourceProtocol::OpenaiResponses => {
                StreamEncoder::OpenaiResponses(OpenAiResponsesStreamEncoder::new())
            }
        }
    }

    fn encode(&mut self, event: &IntermediateEvent) -> String {
        match self {
            StreamEncoder::Anthropic(e) => e.encode(event),
            StreamEncoder::OpenaiChat(e) => e.encode(event),
            StreamEncoder::OpenaiResponses(e) => e.encode(event),
        }
    }
}

/// Pump an upstream SSE response to the caller: decode each chunk into
/// the intermediate event alphabet, re-encode into the caller's
/// protocol, and forward. Stamps TTFT/TPOT along the way and writes the
/// terminal log row on every exit path (success, upstream error, or
/// caller disconnect detected via the send failing).
#[allow(clippy::too_many_arguments)]
async fn run_stream_pump(
    resp: reqwest::Response,
    status: u16,
    tx: mpsc::Sender<String>,
    mut meter: RequestMeter,
    ctx: RequestContext,
    db: Arc<GatewayDb>,
    upstream_family: WireFamily,
    caller_protocol: SourceProtocol,
    provider_id: String,
    upstream_model: String,
    client_model: String,
    prompt_original: Value,
) {
    let mut decoder = StreamDecoder::for_family(&upstream_family);
    let mut encoder = StreamEncoder::for_protocol(caller_protocol);
    let mut byte_stream = resp.bytes_stream();
    let mut response_text = String::new();
    let mut stop_reason: Option<String> = None;
    let mut final_status = status;
    let mut error_message: Option<String> = None;

    'outer: loop {
        let chunk = match byte_stream.next().await {
            Some(Ok(c)) => c,
            Some(Err(e)) => {
                warn!(error = %e, "upstream stream read failed");
                error_message = Some(e.to_string());
                final_status = 502;
                let frame = encoder.encode(&IntermediateEvent::Error {
                    message: e.to_string(),
                });
                let _ = tx.send(frame).await;
                break;
            }
            None => break,
        };

        let text = match std::str::from_utf8(&chunk) {
            Ok(t) => t,
            Err(_) => continue,
        };

        for event in decoder.feed(text) {
            if let IntermediateEvent::Error { message } = &event {
                error_message = Some(message.clone());
                final_status = 502;
            }
            if !process_event(
                &event,
                &mut meter,
                &mut response_text,
                &mut stop_reason,
                &mut encoder,
                &tx,
            )
            .await
            {
                break 'outer;
            }
        }
    }

    for event in decoder.flush() {
        if !process_event(
            &event,
            &mut meter,
            &mut response_text,
            &mut stop_reason,
            &mut encoder,
            &tx,
        )
        .await
        {
            break;
        }
    }

    let latency_ms = meter.latency_ms();
    let ttft_ms = meter.ttft_ms();
    let output_tokens = meter.output_tokens();
    let tpot_ms = meter.tpot_ms(latency_ms);

    let rendered_response = if error_message.is_none() {
        render_final_response(&response_text, stop_reason.as_deref(), caller_protocol, &client_model)
    } else {
        Value::Null
    };

    spawn_log_write(
        db,
        log_record(
            &ctx,
            &provider_id,
            &upstream_model,
            &client_model,
            true,
            latency_ms,
            Some(final_status as i32),
            None,
            Some(output_tokens as i64),
            None,
            ttft_ms,
            tpot_ms,
            error_message,
        ),
        ctx.persist_payloads.then(|| prompt_original),
        ctx.persist_payloads.then(|| rendered_response),
    );
}

/// Feed one intermediate event through the meter and the caller-protocol
/// encoder, and forward the resulting frame. Returns `false` when the
/// caller has disconnected (the channel send failed), the signal the
/// pump uses to abort early (spec §5 "Cancellation").
async fn process_event(
    event: &IntermediateEvent,
    meter: &mut RequestMeter,
    response_text: &mut String,
    stop_reason: &mut Option<String>,
    encoder: &mut StreamEncoder,
    tx: &mpsc::Sender<String>,
) -> bool {
    match event {
        IntermediateEvent::TextDelta { text } => {
            meter.mark_first_byte();
            meter.add_heuristic_tokens(text.len());
            response_text.push_str(text);
        }
        IntermediateEvent::ToolCallDelta { .. } => {
            meter.mark_first_byte();
            meter.add_heuristic_tokens(8);
        }
        IntermediateEvent::Usage { output_tokens, .. } => {
            if let Some(tokens) = output_tokens {
                meter.set_output_tokens(*tokens);
            }
        }
        IntermediateEvent::MessageStop { stop_reason: reason } => {
            *stop_reason = reason.clone();
        }
        _ => {}
    }

    let frame = encoder.encode(event);
    if frame.is_empty() {
        return true;
    }
    tx.send(frame).await.is_ok()
}

fn render_final_response(
    text: &str,
    stop_reason: Option<&str>,
    caller_protocol: SourceProtocol,
    model: &str,
) -> Value {
    let parsed = response::ParsedUpstreamResponse {
        text: text.to_string(),
        tool_calls: Vec::new(),
        stop_reason: stop_reason.unwrap_or("end_turn").to_string(),
        input_tokens: None,
        output_tokens: None,
        cached_tokens: None,
    };
    response::render(&parsed, caller_protocol, model)
}

#[allow(clippy::too_many_arguments)]
fn log_record(
    ctx: &RequestContext,
    provider_id: &str,
    upstream_model: &str,
    client_model: &str,
    stream: bool,
    latency_ms: i64,
    http_status: Option<i32>,
    input_tokens: Option<i64>,
    output_tokens: Option<i64>,
    cached_tokens: Option<i64>,
    ttft_ms: Option<i64>,
    tpot_ms: Option<f64>,
    error_message: Option<String>,
) -> RequestLogRecord {
    RequestLogRecord {
        timestamp_ms: now_ms(),
        session_id: ctx.session_id.clone(),
        endpoint_family: ctx.endpoint_family.clone(),
        provider_id: Some(provider_id.to_string()),
        upstream_model: Some(upstream_model.to_string()),
        client_model: Some(client_model.to_string()),
        stream,
        latency_ms: Some(latency_ms),
        http_status,
        input_tokens,
        output_tokens,
        cached_tokens,
        ttft_ms,
        tpot_ms,
        error_message,
        api_key_id: ctx.api_key_id.clone(),
        api_key_name: ctx.api_key_name.clone(),
        api_key_masked: ctx.api_key_masked.clone(),
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Write the log row, the optional payload blob, and the daily upsert on
/// a background task so none of it delays the HTTP response (spec §4.10).
fn spawn_log_write(
    db: Arc<GatewayDb>,
    record: RequestLogRecord,
    prompt: Option<Value>,
    response_body: Option<Value>,
) {
    tokio::spawn(async move {
        let date = chrono::Utc::now().format("%Y-%m-%d").to_string();
        let endpoint = record.endpoint_family.clone();
        let delta = DailyDelta::from(&record);

        let log_id = match db.insert_log(&record) {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "failed to write request log row");
                return;
            }
        };

        if let (Some(prompt), Some(response_body)) = (prompt, response_body) {
            let prompt_bytes = serde_json::to_vec(&prompt).unwrap_or_default();
            let response_bytes = serde_json::to_vec(&response_body).unwrap_or_default();
            match (
                payload_codec::compress(&prompt_bytes),
                payload_codec::compress(&response_bytes),
            ) {
                (Ok(p), Ok(r)) => {
                    if let Err(e) = db.insert_payload(log_id, &p, &r) {
                        error!(error = %e, "failed to write request payload row");
                    }
                }
                _ => error!("failed to compress request payload"),
            }
        }

        if let Err(e) = db.upsert_daily(&date, &endpoint, &delta) {
            error!(error = %e, "failed to upsert daily metrics");
        }
    });
}
