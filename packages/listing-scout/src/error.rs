//! Typed errors for the listing scout.
//!
//! Uses `thiserror` for library errors (not `anyhow`). The two families that
//! drive control flow are kept separate:
//!
//! - [`BackendError`] always triggers a fallback to the next backend.
//! - [`FetchError`] only ever affects a single listing candidate.

use thiserror::Error;

use crate::types::session::BackendKind;

/// Classified failures of an analysis backend.
///
/// Any of these, raised from any capability call, restarts the session
/// against the next backend in priority order.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// No usable credential or collaborator for this backend.
    #[error("backend unconfigured: {reason}")]
    Unconfigured { reason: String },

    /// Credential rejected by the provider.
    #[error("authentication rejected: {message}")]
    AuthInvalid { message: String },

    /// Billing or quota exhausted.
    #[error("quota exceeded: {message}")]
    QuotaExceeded { message: String },

    /// Provider asked us to slow down.
    #[error("rate limited: {message}")]
    RateLimited { message: String },

    /// Transport failure or provider-side 5xx.
    #[error("connection failed: {message}")]
    ConnectionFailed { message: String },

    /// The provider answered, but with nothing usable.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },
}

impl BackendError {
    pub fn unconfigured(reason: impl Into<String>) -> Self {
        Self::Unconfigured {
            reason: reason.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP response from a provider.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = format!("HTTP {}: {}", status.as_u16(), truncate(body, 200));
        let lowered = body.to_lowercase();

        match status.as_u16() {
            401 | 403 => Self::AuthInvalid { message },
            402 => Self::QuotaExceeded { message },
            429 if lowered.contains("quota") || lowered.contains("resource_exhausted") => {
                Self::QuotaExceeded { message }
            }
            429 => Self::RateLimited { message },
            400 if lowered.contains("api_key_invalid") || lowered.contains("api key not valid") => {
                Self::AuthInvalid { message }
            }
            400..=499 => Self::InvalidResponse { message },
            _ => Self::ConnectionFailed { message },
        }
    }

    /// Classify a transport-level `reqwest` failure.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::from_status(status, &err.to_string()),
            None => Self::connection(err.to_string()),
        }
    }

    /// Whether a bounded in-backend retry may help.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::ConnectionFailed { .. })
    }

    /// Short machine-friendly label, used in logs and transition records.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unconfigured { .. } => "unconfigured",
            Self::AuthInvalid { .. } => "auth_invalid",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::RateLimited { .. } => "rate_limited",
            Self::ConnectionFailed { .. } => "connection_failed",
            Self::InvalidResponse { .. } => "invalid_response",
        }
    }
}

/// Failures of a single detail-page extraction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The fetch did not finish within its budget. Degrades the record.
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// The page could not be fetched at all. Drops the candidate.
    #[error("not found: {url} ({reason})")]
    NotFound { url: String, reason: String },

    /// The page arrived but could not be read as a listing. Degrades the record.
    #[error("parse failure for {url}: {reason}")]
    ParseFailure { url: String, reason: String },
}

impl FetchError {
    /// Whether the candidate should still be emitted with sentinel fields.
    pub fn degrades(&self) -> bool {
        !matches!(self, Self::NotFound { .. })
    }
}

/// Persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("corrupt stored row: {0}")]
    Corrupt(String),
}

/// Malformed session input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid subject {subject:?}: {reason}")]
pub struct ValidationError {
    pub subject: String,
    pub reason: String,
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("config error: {0}")]
    Config(String),

    /// The session was cancelled by its caller.
    #[error("session cancelled")]
    Cancelled,

    /// The deterministic backend failed. No further fallback exists.
    #[error("fatal failure in {backend} backend: {source}")]
    Fatal {
        backend: BackendKind,
        #[source]
        source: BackendError,
    },

    /// Illegal session state transition.
    #[error("illegal session transition: {from} -> {to}")]
    State { from: String, to: String },
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Result type alias for backend capability calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Result type alias for single-page fetches.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            BackendError::from_status(StatusCode::UNAUTHORIZED, ""),
            BackendError::AuthInvalid { .. }
        ));
        assert!(matches!(
            BackendError::from_status(StatusCode::PAYMENT_REQUIRED, ""),
            BackendError::QuotaExceeded { .. }
        ));
        assert!(matches!(
            BackendError::from_status(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            BackendError::RateLimited { .. }
        ));
        assert!(matches!(
            BackendError::from_status(StatusCode::TOO_MANY_REQUESTS, "RESOURCE_EXHAUSTED"),
            BackendError::QuotaExceeded { .. }
        ));
        assert!(matches!(
            BackendError::from_status(StatusCode::BAD_REQUEST, "API_KEY_INVALID"),
            BackendError::AuthInvalid { .. }
        ));
        assert!(matches!(
            BackendError::from_status(StatusCode::BAD_GATEWAY, ""),
            BackendError::ConnectionFailed { .. }
        ));
    }

    #[test]
    fn test_transient_errors() {
        assert!(BackendError::connection("reset").is_transient());
        assert!(!BackendError::unconfigured("no key").is_transient());
    }

    #[test]
    fn test_fetch_error_degrades() {
        let timeout = FetchError::Timeout { url: "u".into() };
        let missing = FetchError::NotFound {
            url: "u".into(),
            reason: "HTTP 404".into(),
        };
        assert!(timeout.degrades());
        assert!(!missing.degrades());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("ශ්‍රී ලංකා", 3).chars().count(), 6);
        assert_eq!(truncate("short", 10), "short");
    }
}
