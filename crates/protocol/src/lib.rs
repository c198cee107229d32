use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub mod path_filters;

/// Failure talking to an external collaborator (vector retriever, LLM)
///
/// Kept distinct from "no results": an empty passage list is an `Ok`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{service} did not answer within {}s", .after.as_secs())]
    Timeout { service: String, after: Duration },

    #[error("Cannot reach {service}: {message}")]
    Connection { service: String, message: String },

    #[error("Misconfigured: {0}")]
    Misconfigured(String),

    #[error("{service} request failed: {message}")]
    Request { service: String, message: String },

    #[error("Invalid response from {service}: {message}")]
    InvalidResponse { service: String, message: String },
}

impl ProviderError {
    pub fn timeout(service: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            service: service.into(),
            after,
        }
    }

    pub fn connection(service: impl Into<String>, message: impl ToString) -> Self {
        Self::Connection {
            service: service.into(),
            message: message.to_string(),
        }
    }

    pub fn request(service: impl Into<String>, message: impl ToString) -> Self {
        Self::Request {
            service: service.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid_response(service: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidResponse {
            service: service.into(),
            message: message.to_string(),
        }
    }

    /// Stable machine-readable code, used in [`ErrorEnvelope`].
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "provider_timeout",
            Self::Connection { .. } => "provider_unreachable",
            Self::Misconfigured(_) => "provider_misconfigured",
            Self::Request { .. } => "provider_request_failed",
            Self::InvalidResponse { .. } => "provider_invalid_response",
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Timeout { .. } => Some("Raise the timeout or retry once the service is idle"),
            Self::Connection { .. } => Some("Check that the service is running and the URL is correct"),
            Self::Misconfigured(_) => Some("Set the missing value in coderag.toml or via CODERAG_* variables"),
            Self::Request { .. } | Self::InvalidResponse { .. } => None,
        }
    }
}

/// Text passage returned by the vector retriever, ordered by descending score
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Passage {
    pub text: String,

    pub score: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
}

impl Passage {
    pub fn new(text: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            score,
            file_path: None,
            file_name: None,
            file_type: None,
        }
    }

    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    /// Best available provenance label.
    pub fn source_label(&self) -> &str {
        self.file_path
            .as_deref()
            .or(self.file_name.as_deref())
            .unwrap_or("unknown")
    }
}

/// Structured error printed by the CLI in `--json` mode
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<&ProviderError> for ErrorEnvelope {
    fn from(err: &ProviderError) -> Self {
        let envelope = Self::new(err.code(), err.to_string());
        match err.hint() {
            Some(hint) => envelope.with_hint(hint),
            None => envelope,
        }
    }
}

pub fn serialize_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}
