/// Protocol-neutral streaming event alphabet the relay pumps between a
/// stream decoder (upstream wire format -> `IntermediateEvent`) and a
/// stream encoder (`IntermediateEvent` -> caller wire format). Broader
/// than the teacher's `skynet_agent::stream::StreamEvent` (which folds
/// message-start/usage/tool-calls all into `ToolUse`/`Done`): each needs
/// its own variant here so every caller protocol can re-derive its own
/// framing (Anthropic's `message_start`/`content_block_*`, OpenAI chat's
/// first-chunk-carries-role delta, etc).
#[derive(Debug, Clone, PartialEq)]
pub enum IntermediateEvent {
    MessageStart {
        model: Option<String>,
    },
    TextDelta {
        text: String,
    },
    ThinkingDelta {
        text: String,
    },
    /// Tool-call argument streaming, stitched by `id`. The first event
    /// for a given call carries `id` and `name`; subsequent events for
    /// the same call carry only `args_chunk`.
    ToolCallDelta {
        id: Option<String>,
        name: Option<String>,
        args_chunk: Option<String>,
    },
    Usage {
        input_tokens: Option<u64>,
        output_tokens: Option<u64>,
        cached_tokens: Option<u64>,
    },
    MessageStop {
        stop_reason: Option<String>,
    },
    Error {
        message: String,
    },
}
