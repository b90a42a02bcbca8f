use bytes::Bytes;
use serde_json::json;

use super::events::{ClientEvent, UpstreamEvent};

/// Map one upstream event onto what the browser should see.
pub fn translate(event: UpstreamEvent) -> Option<ClientEvent> {
    match event {
        UpstreamEvent::Delta { content } => Some(ClientEvent::Content { text: content }),
        UpstreamEvent::Done => Some(ClientEvent::Termination),
        UpstreamEvent::Malformed => None,
    }
}

/// Client-facing SSE frame for an event.
pub fn to_sse_frame(event: &ClientEvent) -> Bytes {
    let frame = match event {
        ClientEvent::Content { text } => format!("data: {}\n\n", json!({ "content": text })),
        ClientEvent::Error { message } => format!("data: {}\n\n", json!({ "error": message })),
        ClientEvent::Termination => "data: [DONE]\n\n".to_string(),
    };
    Bytes::from(frame)
}
