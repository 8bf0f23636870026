//! Error types shared across vocabdrill crates.
//!
//! Provider errors live here rather than in `vocabdrill-providers` so the
//! story generator can classify failures without string matching.

use thiserror::Error;

/// Errors that can occur when interacting with a text-generation provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// Returns `true` if this error is permanent and retrying cannot help.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ProviderError::AuthenticationFailed(_) | ProviderError::ModelNotFound(_)
        )
    }

    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ProviderError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

/// Errors raised by a persistence backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Errors raised by the progression engine for caller mistakes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// A manual level override outside `[min_level, max_level]`.
    #[error("level {level} is outside {min}..={max}")]
    LevelOutOfRange { level: u32, min: u32, max: u32 },

    /// Review mode was requested but the user's ledger is empty.
    #[error("nothing to review: the wrong-word ledger is empty")]
    EmptyReviewPool,

    /// The operation only makes sense in normal mode.
    #[error("not available in review mode")]
    ReviewMode,
}

/// Errors surfaced by the narrative generator.
#[derive(Debug, Error)]
pub enum StoryError {
    /// A story is already being generated.
    #[error("a story is already being generated")]
    Busy,

    /// The ledger sample was empty.
    #[error("no words available to build a story from")]
    NoWords,

    /// The provider needs an API key and none was configured.
    #[error("no API key configured for provider '{0}'")]
    MissingApiKey(String),

    /// The provider call failed.
    #[error("story generation failed: {0:#}")]
    Provider(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_classification() {
        assert!(ProviderError::AuthenticationFailed("bad".into()).is_permanent());
        assert!(ProviderError::ModelNotFound("x".into()).is_permanent());
        assert!(!ProviderError::Timeout(5).is_permanent());
        assert!(!ProviderError::RateLimited {
            retry_after_ms: 1000
        }
        .is_permanent());
    }

    #[test]
    fn retry_after_only_for_rate_limits() {
        let err = ProviderError::RateLimited {
            retry_after_ms: 5000,
        };
        assert_eq!(err.retry_after_ms(), Some(5000));
        assert_eq!(ProviderError::NetworkError("x".into()).retry_after_ms(), None);
        assert_eq!(err.to_string(), "rate limited, retry after 5000ms");
    }

    #[test]
    fn story_error_wraps_provider_failure() {
        let inner = anyhow::Error::new(ProviderError::ModelNotFound("nope".into()));
        let err = StoryError::from(inner);
        assert!(err.to_string().contains("model not found: nope"));
    }
}
