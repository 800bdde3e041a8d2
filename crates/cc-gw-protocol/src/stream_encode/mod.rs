pub mod anthropic;
pub mod openai_chat;
pub mod openai_responses;

pub(crate) fn sse(event: Option<&str>, data: &serde_json::Value) -> String {
    let mut out = String::new();
    if let Some(event) = event {
        out.push_str("event: ");
        out.push_str(event);
        out.push('\n');
    }
    out.push_str("data: ");
    out.push_str(&data.to_string());
    out.push_str("\n\n");
    out
}
