//! Failures of a vision-model call through OpenRouter.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("OPENROUTER_API_KEY is not set")]
    MissingApiKey,

    /// The HTTP client could not be built from the given settings.
    #[error("gateway setup failed: {0}")]
    Setup(String),

    /// Rejected locally before sending; the images or prompt exceed the limits.
    #[error("request too large: {0}")]
    Oversized(String),

    /// 401 or 403: the key is wrong, revoked, or out of credit.
    #[error("unauthorized (HTTP {status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        retry_after: Duration,
        request_id: Option<String>,
    },

    /// Any other error status, or an error object inside a 200 body.
    #[error("HTTP {status}: {message}")]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
        request_id: Option<String>,
    },

    #[error("malformed response: {0}")]
    Malformed(String),

    /// The model answered with no text.
    #[error("model returned an empty reply")]
    EmptyReply,

    /// The model declined to judge the images.
    #[error("model declined: {0}")]
    Refused(String),

    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ProviderError {
    /// Rate limits, 5xx, empty replies and dropped connections may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::EmptyReply => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Short code for usage records and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "missing_api_key",
            Self::Setup(_) => "setup",
            Self::Oversized(_) => "oversized",
            Self::Unauthorized { .. } => "unauthorized",
            Self::RateLimited { .. } => "rate_limited",
            Self::Status { .. } => "http_status",
            Self::Malformed(_) => "malformed",
            Self::EmptyReply => "empty_reply",
            Self::Refused(_) => "refused",
            Self::Http(e) if e.is_timeout() => "timeout",
            Self::Http(_) => "network",
        }
    }

    /// OpenRouter's `x-request-id`, when the failure came with one.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::RateLimited { request_id, .. } | Self::Status { request_id, .. } => {
                request_id.as_deref()
            }
            _ => None,
        }
    }
}
