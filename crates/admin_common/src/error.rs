//! Error types for the admin console.

use crate::envelope::ErrorPayload;
use std::path::PathBuf;
use thiserror::Error;

fn describe(error: &Option<ErrorPayload>) -> String {
    match error.as_ref().and_then(|e| e.message()) {
        Some(message) => format!(": {}", message),
        None => String::new(),
    }
}

/// Failure of a single backend operation
///
/// `Network` and `Http` are transport failures; `Rejected` is an
/// application failure (a 2xx reply with `success: false`). Callers route
/// both kinds to the same failure path.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationFailure {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}{}", describe(.error))]
    Http {
        status: u16,
        error: Option<ErrorPayload>,
    },

    #[error("Request rejected{}", describe(.error))]
    Rejected {
        status: u16,
        error: Option<ErrorPayload>,
    },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl OperationFailure {
    /// Application-level rejection with a plain message
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        OperationFailure::Rejected {
            status,
            error: Some(ErrorPayload::with_message(message)),
        }
    }

    /// HTTP status of the reply, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            OperationFailure::Http { status, .. } | OperationFailure::Rejected { status, .. } => {
                Some(*status)
            }
            OperationFailure::Network(_) | OperationFailure::Decode(_) => None,
        }
    }

    /// Structured error body, if the reply carried one
    pub fn payload(&self) -> Option<&ErrorPayload> {
        match self {
            OperationFailure::Http { error, .. } | OperationFailure::Rejected { error, .. } => {
                error.as_ref()
            }
            OperationFailure::Network(_) | OperationFailure::Decode(_) => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            OperationFailure::Network(_) | OperationFailure::Http { .. }
        )
    }

    pub fn is_application(&self) -> bool {
        matches!(self, OperationFailure::Rejected { .. })
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_payload() {
        let failure = OperationFailure::rejected(200, "not extendable");
        assert_eq!(failure.status(), Some(200));
        assert_eq!(failure.payload().unwrap().message(), Some("not extendable"));
        assert!(failure.is_application());
        assert!(!failure.is_transport());

        let network = OperationFailure::Network("connection refused".into());
        assert_eq!(network.status(), None);
        assert!(network.payload().is_none());
        assert!(network.is_transport());
    }

    #[test]
    fn test_display_includes_message() {
        let failure = OperationFailure::Http {
            status: 500,
            error: Some(ErrorPayload::with_message("boom")),
        };
        assert_eq!(failure.to_string(), "HTTP 500: boom");

        let bare = OperationFailure::Http {
            status: 502,
            error: None,
        };
        assert_eq!(bare.to_string(), "HTTP 502");
    }
}
