use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Caller-facing wire protocol a payload was decoded from (or will be
/// encoded back into, for the fast passthrough path).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceProtocol {
    Anthropic,
    OpenaiChat,
    OpenaiResponses,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub input_schema: Value,
}

/// A single collapsed turn. Content blocks within one caller-protocol
/// message collapse into exactly one `NormalizedMessage` (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedMessage {
    pub role: Role,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub thinking_text: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub tool_results: Vec<ToolResult>,
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl NormalizedMessage {
    pub fn is_tool_result_only(&self) -> bool {
        self.text.is_empty()
            && self.thinking_text.is_none()
            && self.tool_calls.is_empty()
            && !self.tool_results.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub stop: Vec<String>,
}

/// The gateway's internal, protocol-neutral representation of a chat
/// request. Every decoder (Anthropic / OpenAI chat / OpenAI responses)
/// produces one of these; every encoder consumes one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedPayload {
    pub source_protocol: SourceProtocol,
    pub model: String,
    #[serde(default)]
    pub messages: Vec<NormalizedMessage>,
    #[serde(default)]
    pub tools: Vec<ToolSchema>,
    #[serde(default)]
    pub sampling: SamplingParams,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub thinking: bool,
    /// The caller's original, undecoded JSON document. Retained so the
    /// fast passthrough path (caller protocol == upstream wire family)
    /// can forward it near-verbatim instead of re-serializing from the
    /// normalized model, per spec §4.6's "passthrough" requirement.
    pub original: Value,
}

impl NormalizedPayload {
    /// No two consecutive tool-result-only turns (spec §3 invariant):
    /// a caller sending back two separate tool results for the same
    /// turn must have them collapsed into one message by the decoder.
    pub fn validate_tool_result_alternation(&self) -> bool {
        let mut prev_was_tool_result_only = false;
        for msg in &self.messages {
            let this_is = msg.is_tool_result_only();
            if this_is && prev_was_tool_result_only {
                return false;
            }
            prev_was_tool_result_only = this_is;
        }
        true
    }
}
