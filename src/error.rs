use std::path::PathBuf;

use crate::upstream::UpstreamError;

/// Failures of the on-disk stores (settings blob, stylesheet, themes).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("content is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("configuration must be a JSON object")]
    NotAnObject,
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure was caused by the caller's input rather than the disk.
    pub fn is_bad_input(&self) -> bool {
        matches!(self, StoreError::Utf8(_) | StoreError::NotAnObject)
    }
}

/// Failure of one relayed chat request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl RelayError {
    /// HTTP status reported to the client on the aggregate path.
    pub fn status(&self) -> u16 {
        match self {
            RelayError::Upstream(UpstreamError::HttpStatus(code)) => *code,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_error_status() {
        assert_eq!(RelayError::Upstream(UpstreamError::HttpStatus(401)).status(), 401);
        assert_eq!(RelayError::Upstream(UpstreamError::Timeout).status(), 500);
        assert_eq!(RelayError::Upstream(UpstreamError::MalformedResponse).status(), 500);
        assert_eq!(RelayError::Configuration("model is not configured".into()).status(), 500);
    }

    #[test]
    fn test_store_error_input_classification() {
        assert!(StoreError::NotAnObject.is_bad_input());
        assert!(!StoreError::io("/tmp/x", std::io::Error::other("disk")).is_bad_input());
    }
}
