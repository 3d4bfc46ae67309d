//! Error types for gatewarden.

use thiserror::Error;

/// Errors produced by the remote gateway API client and the reconciler.
///
/// The variants map onto the failure taxonomy the sync driver cares about:
/// transport and 5xx errors are retryable, 429 is retryable after honoring
/// the server-provided delay, any other 4xx is a request-construction bug
/// and surfaces immediately, and capacity errors abort a feed before any
/// mutation is issued.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Non-retryable API rejection (4xx other than 429).
    #[error("gateway API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP 429 from the gateway. Carries the effective wait duration.
    #[error("rate limited by gateway, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Retryable server-side failure (5xx).
    #[error("gateway server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// Connection, DNS, or timeout failure before an HTTP status was seen.
    #[error("transport error: {0}")]
    Transport(String),

    /// The bounded retry schedule ran out.
    #[error("giving up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Desired chunk count does not fit in the account's list quota.
    #[error(
        "capacity exceeded: need {needed} list slots but only {available} \
         are free (account limit {limit})"
    )]
    Capacity {
        needed: usize,
        available: usize,
        limit: usize,
    },

    /// The response body did not match the expected JSON envelope.
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Whether the retry loop may try this request again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Server { .. } | GatewayError::Transport(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_retryable() {
        let err = GatewayError::Server {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_transport_errors_are_retryable() {
        assert!(GatewayError::Transport("timeout".to_string()).is_retryable());
    }

    #[test]
    fn test_client_errors_are_fatal() {
        let err = GatewayError::Api {
            status: 400,
            message: "malformed expression".to_string(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_rate_limit_is_not_generic_retryable() {
        // 429 is handled by a dedicated wait path, not the backoff schedule.
        let err = GatewayError::RateLimited {
            retry_after_secs: 5,
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_capacity_is_fatal() {
        let err = GatewayError::Capacity {
            needed: 310,
            available: 295,
            limit: 300,
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("310"));
    }
}
