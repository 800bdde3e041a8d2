pub mod anthropic;
pub mod openai_chat;
pub mod openai_responses;

/// Split an accumulating SSE buffer into complete `\n\n`-terminated
/// blocks, leaving any trailing partial block in `buf`. Shared by all
/// three stream decoders; grounded on
/// `skynet_agent::anthropic_stream::process_stream`'s cross-chunk
/// `line_buf` accumulation, generalized from per-line to per-block
/// splitting since every wire format here separates events with a blank
/// line.
pub(crate) fn drain_blocks(buf: &mut String) -> Vec<String> {
    let mut blocks = Vec::new();
    while let Some(pos) = buf.find("\n\n") {
        let block = buf[..pos].to_string();
        *buf = buf[pos + 2..].to_string();
        if !block.trim().is_empty() {
            blocks.push(block);
        }
    }
    blocks
}

/// Parse one SSE block into its optional `event:` name and concatenated
/// `data:` payload.
pub(crate) fn parse_block(block: &str) -> (Option<String>, String) {
    let mut event = None;
    let mut data_lines = Vec::new();
    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim().to_string());
        }
    }
    (event, data_lines.join("\n"))
}
