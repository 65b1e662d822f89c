use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error from {provider}: {source}")]
    Http {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("unexpected HTTP status {status} from {provider}")]
    Status { provider: String, status: u16 },

    #[error("rate limited by {provider} (retry after {retry_after_secs}s)")]
    RateLimited {
        provider: String,
        retry_after_secs: u64,
    },

    #[error("failed to parse {provider} response: {reason}")]
    Parse { provider: String, reason: String },

    #[error("{provider} snapshot {snapshot_id} failed: {reason}")]
    SnapshotFailed {
        provider: String,
        snapshot_id: String,
        reason: String,
    },

    #[error("{provider} snapshot {snapshot_id} not ready after {polls} polls")]
    SnapshotTimeout {
        provider: String,
        snapshot_id: String,
        polls: u32,
    },

    #[error("configuration error for {provider}: {reason}")]
    Config { provider: String, reason: String },
}

impl ProviderError {
    pub(crate) fn http(provider: &str, source: reqwest::Error) -> Self {
        Self::Http {
            provider: provider.to_owned(),
            source,
        }
    }

    pub(crate) fn parse(provider: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            provider: provider.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn config(provider: &str, reason: impl Into<String>) -> Self {
        Self::Config {
            provider: provider.to_owned(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors that are worth retrying after a back-off delay.
    ///
    /// **Retriable:**
    /// - network-level failures (timeout, connection refused or reset);
    /// - attempt timeouts and snapshots that never became ready;
    /// - HTTP 5xx, 408 and 429;
    /// - snapshots the vendor reported as failed.
    ///
    /// **Not retriable:** any other 4xx, parse failures and configuration errors.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            ProviderError::Http { source, .. } => {
                source.is_timeout()
                    || source.is_connect()
                    || source.status().is_some_and(|s| s.is_server_error())
            }
            ProviderError::Status { status, .. } => *status >= 500 || *status == 408,
            ProviderError::Timeout { .. }
            | ProviderError::RateLimited { .. }
            | ProviderError::SnapshotFailed { .. }
            | ProviderError::SnapshotTimeout { .. } => true,
            ProviderError::Parse { .. } | ProviderError::Config { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_and_request_timeout_are_retriable() {
        for status in [500, 502, 503, 408] {
            let err = ProviderError::Status {
                provider: "p".to_owned(),
                status,
            };
            assert!(err.is_retriable(), "status {status} should be retriable");
        }
    }

    #[test]
    fn client_errors_are_not_retriable() {
        for status in [400, 401, 403, 404, 422] {
            let err = ProviderError::Status {
                provider: "p".to_owned(),
                status,
            };
            assert!(!err.is_retriable(), "status {status} should not be retriable");
        }
    }

    #[test]
    fn parse_and_config_errors_are_not_retriable() {
        assert!(!ProviderError::parse("p", "bad json").is_retriable());
        assert!(!ProviderError::config("p", "missing key").is_retriable());
    }

    #[test]
    fn timeouts_and_snapshot_failures_are_retriable() {
        assert!(ProviderError::Timeout {
            provider: "p".to_owned(),
            timeout_ms: 10
        }
        .is_retriable());
        assert!(ProviderError::SnapshotTimeout {
            provider: "p".to_owned(),
            snapshot_id: "s_1".to_owned(),
            polls: 3
        }
        .is_retriable());
        assert!(ProviderError::RateLimited {
            provider: "p".to_owned(),
            retry_after_secs: 1
        }
        .is_retriable());
    }
}
