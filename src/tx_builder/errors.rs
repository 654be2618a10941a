//! Error types for the bridge transaction builder
//!
//! One error taxonomy is shared by every layer of the crate so that a caller
//! can decide what to do with a failure without knowing which layer raised it:
//! - Codecs raise `Format` / `Range` synchronously on malformed input
//! - Resolver and composer propagate `RemoteCall` / `Configuration`
//! - The quote layer raises `QuoteUnavailable` / `InsufficientLiquidity`
//! - Submission raises `Signing` / `Confirmation`

use thiserror::Error;

/// Convenience alias used across the crate
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Comprehensive error type for bridge transaction operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Malformed address, hex or base58 input. Never retried.
    #[error("Format error: {0}")]
    Format(String),

    /// A numeric value does not fit the wire field it is destined for
    #[error("Range error: {0}")]
    Range(String),

    /// A required on-chain account or config entry is missing entirely
    ///
    /// Fatal for the attempt; retrying will not help until the
    /// deployment itself is fixed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport or remote execution failure of an external collaborator
    #[error("Remote call failed (endpoint={endpoint}, status={status:?}): {message}")]
    RemoteCall {
        /// Endpoint or collaborator name
        endpoint: String,
        /// Failure description as reported by the remote side
        message: String,
        /// HTTP status when one was observed
        status: Option<u16>,
    },

    /// The price API could not produce a usable reference rate or quote
    #[error("Quote unavailable: {0}")]
    QuoteUnavailable(String),

    /// Swap output stayed below the required amount after amplification
    #[error("Insufficient liquidity: required {required}, best quote {quoted}")]
    InsufficientLiquidity {
        /// Required destination amount
        required: u128,
        /// Best quoted destination amount observed
        quoted: u128,
    },

    /// The quote is older than the configured maximum age
    #[error("Quote is stale (age {age_secs}s, max {max_age_secs}s)")]
    QuoteStale {
        age_secs: i64,
        max_age_secs: u64,
    },

    /// Broadcast succeeded but confirmation could not be observed
    ///
    /// The transaction is not necessarily reverted; callers should look up
    /// `signature` on-chain before assuming failure.
    #[error("Confirmation failed for {signature}: {reason}")]
    Confirmation {
        signature: String,
        reason: String,
    },

    /// Signing capability refused or failed
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Composed instruction list violates the relay/bridge ordering
    #[error("Invalid instruction order: {0}")]
    InvalidInstructionOrder(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),

    /// Wrapped error from external crates
    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl BridgeError {
    /// Check if this error is potentially retryable by the caller
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RemoteCall { .. } => true,
            Self::QuoteUnavailable(_) => true,
            Self::QuoteStale { .. } => true,

            Self::Format(_) => false,
            Self::Range(_) => false,
            Self::Configuration(_) => false,
            Self::InsufficientLiquidity { .. } => false,
            Self::Confirmation { .. } => false,
            Self::Signing(_) => false,
            Self::InvalidInstructionOrder(_) => false,
            Self::Internal(_) => false,
            Self::External(_) => false,
        }
    }

    /// Whether the failure looks like remote rate limiting
    ///
    /// Only these errors are retried automatically by [`crate::retry::RetryPolicy`].
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::RemoteCall {
                status, message, ..
            } => *status == Some(429) || crate::retry::is_rate_limit_message(message),
            Self::QuoteUnavailable(msg) => crate::retry::is_rate_limit_message(msg),
            _ => false,
        }
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::Format(_) => "format",
            Self::Range(_) => "range",
            Self::Configuration(_) => "config",
            Self::RemoteCall { .. } => "remote",
            Self::QuoteUnavailable(_) => "quote",
            Self::InsufficientLiquidity { .. } => "liquidity",
            Self::QuoteStale { .. } => "stale_quote",
            Self::Confirmation { .. } => "confirmation",
            Self::Signing(_) => "signing",
            Self::InvalidInstructionOrder(_) => "validation",
            Self::Internal(_) => "internal",
            Self::External(_) => "external",
        }
    }
}

// Convenience constructors for common error scenarios
impl BridgeError {
    pub fn format(reason: impl Into<String>) -> Self {
        Self::Format(reason.into())
    }

    pub fn range(reason: impl Into<String>) -> Self {
        Self::Range(reason.into())
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    /// Create a remote call error without an HTTP status
    pub fn remote(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteCall {
            endpoint: endpoint.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a remote call error carrying the observed HTTP status
    pub fn remote_status(
        endpoint: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        Self::RemoteCall {
            endpoint: endpoint.into(),
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn quote_unavailable(reason: impl Into<String>) -> Self {
        Self::QuoteUnavailable(reason.into())
    }

    pub fn invalid_order(reason: impl Into<String>) -> Self {
        Self::InvalidInstructionOrder(reason.into())
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::Format("bad hex".to_string());
        assert_eq!(err.to_string(), "Format error: bad hex");

        let err = BridgeError::InsufficientLiquidity {
            required: 100,
            quoted: 90,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient liquidity: required 100, best quote 90"
        );
    }

    #[test]
    fn test_error_retryability() {
        assert!(BridgeError::remote("rpc", "connection reset").is_retryable());
        assert!(BridgeError::quote_unavailable("no rate").is_retryable());

        assert!(!BridgeError::format("x").is_retryable());
        assert!(!BridgeError::configuration("bridge missing").is_retryable());
        assert!(!BridgeError::InsufficientLiquidity {
            required: 1,
            quoted: 0
        }
        .is_retryable());
    }

    #[test]
    fn test_rate_limit_detection() {
        assert!(BridgeError::remote_status("api", 429, "slow down").is_rate_limited());
        assert!(BridgeError::remote("api", "Too Many Requests").is_rate_limited());
        assert!(BridgeError::quote_unavailable("rate limit exceeded").is_rate_limited());

        assert!(!BridgeError::remote_status("api", 500, "boom").is_rate_limited());
        assert!(!BridgeError::format("rate limit").is_rate_limited());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(BridgeError::format("x").category(), "format");
        assert_eq!(BridgeError::remote("a", "b").category(), "remote");
        assert_eq!(
            BridgeError::Confirmation {
                signature: "s".into(),
                reason: "r".into()
            }
            .category(),
            "confirmation"
        );
    }
}
