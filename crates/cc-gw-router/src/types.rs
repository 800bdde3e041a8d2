/// Resolved routing decision: which provider, which upstream model id to
/// actually send, and the token estimate used to reach it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RouteTarget {
    pub provider_id: String,
    pub upstream_model_id: String,
    pub token_estimate: u64,
}

/// Hints the caller's decoded payload carries into routing (spec §4.7
/// input: "endpoint family, requested model, payload hints").
#[derive(Debug, Clone, Copy)]
pub struct PayloadHints {
    pub thinking: bool,
    pub token_estimate: u64,
}
