use std::error::Error as StdError;
use std::fmt;

use crate::api::ApiErrorEnvelope;
use crate::core::retry::Retryable;

/// Failure reported by a model provider.
///
/// Providers report errors in several shapes (an HTTP status, a numeric code
/// inside a JSON body, or only a message), so all three are kept and consulted
/// when deciding whether to retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub status: Option<u16>,
    pub code: Option<i64>,
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            ..Self::new(message)
        }
    }

    /// Build an error from a non-success HTTP response body.
    pub fn from_http(status: u16, body: &str) -> Self {
        let trimmed = body.trim();
        match serde_json::from_str::<ApiErrorEnvelope>(trimmed) {
            Ok(envelope) => {
                let message = envelope
                    .error
                    .message
                    .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
                    .filter(|text| !text.is_empty())
                    .unwrap_or_else(|| format!("HTTP {status}"));
                Self {
                    status: Some(status),
                    code: envelope.error.code,
                    message,
                }
            }
            Err(_) if trimmed.is_empty() => Self::with_status(status, format!("HTTP {status}")),
            Err(_) => Self::with_status(status, trimmed),
        }
    }

    fn has_transient_marker(&self) -> bool {
        const TRANSIENT_STATUSES: [i64; 2] = [429, 503];
        let status_hit = self
            .status
            .is_some_and(|status| TRANSIENT_STATUSES.contains(&i64::from(status)));
        let code_hit = self.code.is_some_and(|code| TRANSIENT_STATUSES.contains(&code));
        // Some failures only carry the status inside their message text.
        let message_hit = self.message.contains("429")
            || self.message.contains("503")
            || self.message.contains("quota");
        status_hit || code_hit || message_hit
    }
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        self.has_transient_marker()
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for ProviderError {}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            status: err.status().map(|status| status.as_u16()),
            code: None,
            message: err.to_string(),
        }
    }
}
