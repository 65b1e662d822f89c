//! Priority-ordered provider fallback chain for one logical collector.
//!
//! Entries are tried in ascending priority. Each entry gets up to
//! `max_retries + 1` timeout-bounded attempts; when those are exhausted the
//! chain moves to the next entry only if the exhausted entry has
//! `continue_on_failure` set. Every attempt is recorded in the returned
//! attempt log.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::adapters::ProviderAdapter;
use crate::error::ProviderError;
use crate::request::{ProviderRequest, ProviderResponse};
use crate::retry::retry_with_backoff;

pub struct ChainEntry {
    pub adapter: Arc<dyn ProviderAdapter>,
    pub priority: u32,
    pub timeout: Duration,
    pub max_retries: u32,
    pub continue_on_failure: bool,
}

impl fmt::Debug for ChainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainEntry")
            .field("provider", &self.adapter.name())
            .field("priority", &self.priority)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("continue_on_failure", &self.continue_on_failure)
            .finish()
    }
}

/// One provider attempt within a chain execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub provider: String,
    /// 1-based attempt number for this provider.
    pub attempt: u32,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct ChainSuccess {
    /// Provider that produced the answer.
    pub provider: String,
    pub response: ProviderResponse,
    pub attempts: Vec<AttemptRecord>,
}

impl ChainSuccess {
    /// `true` when the answer needed a retry or a fallback to a later provider.
    #[must_use]
    pub fn needed_recovery(&self) -> bool {
        self.attempts.len() > 1
    }
}

#[derive(Debug)]
pub struct ChainFailure {
    pub collector: String,
    /// `None` only when the chain has no entries.
    pub last_error: Option<ProviderError>,
    /// Provider names tried, in order.
    pub attempted: Vec<String>,
    pub attempts: Vec<AttemptRecord>,
    /// `true` when the last error was transient.
    pub retryable: bool,
}

impl fmt::Display for ChainFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.last_error {
            Some(err) => write!(
                f,
                "collector '{}' failed after trying [{}]: {err}",
                self.collector,
                self.attempted.join(", ")
            ),
            None => write!(f, "collector '{}' has no providers configured", self.collector),
        }
    }
}

impl std::error::Error for ChainFailure {}

pub struct FallbackChain {
    collector: String,
    entries: Vec<ChainEntry>,
    backoff_base_ms: u64,
}

impl fmt::Debug for FallbackChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackChain")
            .field("collector", &self.collector)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl FallbackChain {
    /// Builds a chain, sorting `entries` by ascending priority.
    #[must_use]
    pub fn new(
        collector: impl Into<String>,
        mut entries: Vec<ChainEntry>,
        backoff_base_ms: u64,
    ) -> Self {
        entries.sort_by_key(|e| e.priority);
        Self {
            collector: collector.into(),
            entries,
            backoff_base_ms,
        }
    }

    #[must_use]
    pub fn collector(&self) -> &str {
        &self.collector
    }

    /// Provider names in the order they will be tried.
    #[must_use]
    pub fn providers(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.adapter.name()).collect()
    }

    /// Runs the request through the chain.
    ///
    /// # Errors
    ///
    /// Returns [`ChainFailure`] when every eligible entry is exhausted, or an
    /// entry without `continue_on_failure` fails.
    pub async fn execute(&self, request: &ProviderRequest) -> Result<ChainSuccess, ChainFailure> {
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut attempted: Vec<String> = Vec::new();
        let mut last_error: Option<ProviderError> = None;

        for entry in &self.entries {
            let provider = entry.adapter.name().to_owned();
            attempted.push(provider.clone());

            let result = retry_with_backoff(
                &provider,
                entry.max_retries,
                self.backoff_base_ms,
                entry.timeout,
                || entry.adapter.execute(request),
                |attempt, outcome| {
                    attempts.push(AttemptRecord {
                        provider: provider.clone(),
                        attempt,
                        success: outcome.is_ok(),
                        error: outcome.err().map(ToString::to_string),
                    });
                },
            )
            .await;

            match result {
                Ok(response) => {
                    let success = ChainSuccess {
                        provider,
                        response,
                        attempts,
                    };
                    if success.needed_recovery() {
                        tracing::info!(
                            collector = %self.collector,
                            provider = %success.provider,
                            attempts = success.attempts.len(),
                            "collector recovered via retry or fallback"
                        );
                    }
                    return Ok(success);
                }
                Err(err) => {
                    tracing::warn!(
                        collector = %self.collector,
                        provider = %provider,
                        error = %err,
                        continue_on_failure = entry.continue_on_failure,
                        "provider exhausted"
                    );
                    last_error = Some(err);
                    if !entry.continue_on_failure {
                        break;
                    }
                }
            }
        }

        let retryable = last_error.as_ref().is_some_and(ProviderError::is_retriable);
        Err(ChainFailure {
            collector: self.collector.clone(),
            last_error,
            attempted,
            attempts,
            retryable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ParsedAnswer;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    enum Behavior {
        Succeed,
        FailTransient,
        FailPermanent,
        FailTransientThenSucceed(u32),
    }

    struct ScriptedAdapter {
        name: String,
        behavior: Behavior,
        calls: AtomicU32,
    }

    impl ScriptedAdapter {
        fn arc(name: &str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_owned(),
                behavior,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl ProviderAdapter for ScriptedAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        async fn execute(
            &self,
            _request: &ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let ok = ProviderResponse {
                answer: ParsedAnswer {
                    text: format!("answer from {}", self.name),
                    citations: vec![],
                    urls: vec![],
                },
                snapshot_id: None,
                metadata: serde_json::json!({}),
            };
            let transient = ProviderError::Status {
                provider: self.name.clone(),
                status: 503,
            };
            match self.behavior {
                Behavior::Succeed => Ok(ok),
                Behavior::FailTransient => Err(transient),
                Behavior::FailPermanent => Err(ProviderError::Status {
                    provider: self.name.clone(),
                    status: 401,
                }),
                Behavior::FailTransientThenSucceed(failures) => {
                    if n < failures {
                        Err(transient)
                    } else {
                        Ok(ok)
                    }
                }
            }
        }
    }

    fn entry(
        adapter: Arc<ScriptedAdapter>,
        priority: u32,
        max_retries: u32,
        continue_on_failure: bool,
    ) -> ChainEntry {
        ChainEntry {
            adapter,
            priority,
            timeout: Duration::from_secs(5),
            max_retries,
            continue_on_failure,
        }
    }

    fn request() -> ProviderRequest {
        ProviderRequest::new("best crm", None, "en-US")
    }

    #[tokio::test]
    async fn falls_back_to_next_provider_and_attributes_success() {
        let a = ScriptedAdapter::arc("a", Behavior::FailPermanent);
        let b = ScriptedAdapter::arc("b", Behavior::Succeed);
        let chain = FallbackChain::new(
            "chatgpt",
            vec![entry(b.clone(), 2, 0, true), entry(a.clone(), 1, 0, true)],
            0,
        );

        assert_eq!(chain.providers(), vec!["a", "b"]);
        let success = chain.execute(&request()).await.expect("b should succeed");
        assert_eq!(success.provider, "b");
        assert_eq!(success.response.answer.text, "answer from b");
        assert!(success.needed_recovery());
        assert_eq!(success.attempts.len(), 2);
        assert_eq!(success.attempts[0].provider, "a");
        assert!(!success.attempts[0].success);
        assert!(success.attempts[1].success);
    }

    #[tokio::test]
    async fn retries_transient_failures_within_one_provider() {
        let a = ScriptedAdapter::arc("a", Behavior::FailTransientThenSucceed(2));
        let chain = FallbackChain::new("perplexity", vec![entry(a.clone(), 1, 2, true)], 0);

        let success = chain.execute(&request()).await.unwrap();
        assert_eq!(success.provider, "a");
        assert_eq!(a.calls.load(Ordering::SeqCst), 3);
        let numbers: Vec<u32> = success.attempts.iter().map(|r| r.attempt).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(success.needed_recovery());
    }

    #[tokio::test]
    async fn first_try_success_needs_no_recovery() {
        let a = ScriptedAdapter::arc("a", Behavior::Succeed);
        let chain = FallbackChain::new("chatgpt", vec![entry(a, 1, 2, true)], 0);

        let success = chain.execute(&request()).await.unwrap();
        assert_eq!(success.attempts.len(), 1);
        assert!(!success.needed_recovery());
    }

    #[tokio::test]
    async fn permanent_error_skips_remaining_retries() {
        let a = ScriptedAdapter::arc("a", Behavior::FailPermanent);
        let chain = FallbackChain::new("gemini", vec![entry(a.clone(), 1, 5, true)], 0);

        let failure = chain.execute(&request()).await.unwrap_err();
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert!(!failure.retryable);
    }

    #[tokio::test]
    async fn stop_on_failure_aborts_chain() {
        let a = ScriptedAdapter::arc("a", Behavior::FailTransient);
        let b = ScriptedAdapter::arc("b", Behavior::Succeed);
        let chain = FallbackChain::new(
            "chatgpt",
            vec![entry(a.clone(), 1, 0, false), entry(b.clone(), 2, 0, true)],
            0,
        );

        let failure = chain.execute(&request()).await.unwrap_err();
        assert_eq!(failure.attempted, vec!["a"]);
        assert_eq!(b.calls.load(Ordering::SeqCst), 0);
        assert!(failure.retryable, "last error was a 503");
        assert!(failure.to_string().contains("collector 'chatgpt' failed"));
    }

    #[tokio::test]
    async fn exhausted_chain_reports_every_provider() {
        let a = ScriptedAdapter::arc("a", Behavior::FailTransient);
        let b = ScriptedAdapter::arc("b", Behavior::FailPermanent);
        let chain = FallbackChain::new(
            "chatgpt",
            vec![entry(a, 1, 1, true), entry(b, 2, 0, true)],
            0,
        );

        let failure = chain.execute(&request()).await.unwrap_err();
        assert_eq!(failure.attempted, vec!["a", "b"]);
        assert_eq!(failure.attempts.len(), 3);
        assert!(!failure.retryable, "last error was a 401");
    }

    #[tokio::test]
    async fn empty_chain_fails_without_error() {
        let chain = FallbackChain::new("empty", vec![], 0);
        let failure = chain.execute(&request()).await.unwrap_err();
        assert!(failure.last_error.is_none());
        assert!(failure.attempted.is_empty());
        assert!(!failure.retryable);
    }
}
