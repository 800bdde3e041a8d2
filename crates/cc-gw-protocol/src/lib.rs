pub mod decode;
pub mod encode;
pub mod error;
pub mod normalized;
pub mod strip;
pub mod stream_decode;
pub mod stream_encode;
pub mod stream_event;

pub use error::{ProtocolError, Result};
pub use normalized::{NormalizedMessage, NormalizedPayload, Role, SourceProtocol};
pub use stream_event::IntermediateEvent;

/// Decode an inbound caller request (any of the three protocols) into
/// the normalized model, given the endpoint's declared protocol.
pub fn decode_request(
    protocol: normalized::SourceProtocol,
    body: &serde_json::Value,
) -> error::Result<NormalizedPayload> {
    match protocol {
        SourceProtocol::Anthropic => decode::anthropic::decode(body),
        SourceProtocol::OpenaiChat => decode::openai_chat::decode(body),
        SourceProtocol::OpenaiResponses => decode::openai_responses::decode(body),
    }
}
