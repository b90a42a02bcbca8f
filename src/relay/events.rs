use crate::error::RelayError;

/// One decoded unit of an upstream event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEvent {
    Delta { content: String },
    Done,
    /// A `data:` frame that was not JSON or did not have the expected shape.
    Malformed,
}

/// What the browser receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Content { text: String },
    Error { message: String },
    Termination,
}

impl ClientEvent {
    /// No event may follow a terminal one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClientEvent::Error { .. } | ClientEvent::Termination)
    }
}

impl From<RelayError> for ClientEvent {
    fn from(error: RelayError) -> Self {
        ClientEvent::Error {
            message: error.to_string(),
        }
    }
}
