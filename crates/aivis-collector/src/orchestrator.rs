//! Batched, parallel dispatch of queries to logical collectors.
//!
//! Requests run in batches of `batch_size`. Every request in a batch runs
//! concurrently, and every collector of a request runs concurrently. The
//! orchestrator waits for the whole batch, then pauses before the next one.
//! Each (request, collector) pair ends in exactly one result row, whatever
//! happens to its siblings.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::{json, Map, Value};
use tokio::time::Instant;

use aivis_core::{
    AppConfig, CollectionStatus, ExecutionStatus, QueryExecutionRequest, QueryExecutionResult,
};
use aivis_providers::{AttemptRecord, ChainFailure, ChainSuccess, FallbackChain, ProviderRequest};

use crate::store::ResultStore;

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub batch_size: usize,
    pub batch_pause: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            batch_size: 3,
            batch_pause: Duration::from_secs(1),
        }
    }
}

impl OrchestratorSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            batch_size: config.orchestrator_batch_size,
            batch_pause: Duration::from_millis(config.orchestrator_batch_pause_ms),
        }
    }
}

pub struct Orchestrator {
    chains: HashMap<String, Arc<FallbackChain>>,
    store: Arc<dyn ResultStore>,
    settings: OrchestratorSettings,
}

/// One collector's result plus the attempt log behind it.
struct CollectorOutcome {
    result: QueryExecutionResult,
    attempts: Vec<AttemptRecord>,
}

impl Orchestrator {
    /// `chains` must be keyed by lower-cased collector name.
    #[must_use]
    pub fn new(
        chains: HashMap<String, Arc<FallbackChain>>,
        store: Arc<dyn ResultStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            chains,
            store,
            settings,
        }
    }

    /// Configured collector names, sorted.
    #[must_use]
    pub fn collectors(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.chains.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Runs every request and returns one result per (request, collector),
    /// in input order.
    pub async fn execute_queries(
        &self,
        requests: Vec<QueryExecutionRequest>,
    ) -> Vec<QueryExecutionResult> {
        let batch_size = self.settings.batch_size.max(1);
        let total_batches = requests.len().div_ceil(batch_size);
        let mut results = Vec::new();

        for (index, batch) in requests.chunks(batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.settings.batch_pause).await;
            }
            tracing::info!(
                batch = index + 1,
                total_batches,
                requests = batch.len(),
                "dispatching batch"
            );
            let batch_results = join_all(batch.iter().map(|r| self.execute_request(r))).await;
            results.extend(batch_results.into_iter().flatten());
        }

        results
    }

    /// Runs one request across all of its collectors.
    pub async fn execute_request(
        &self,
        request: &QueryExecutionRequest,
    ) -> Vec<QueryExecutionResult> {
        let execution_id = match self.store.create_execution(request).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!(
                    query_id = %request.query_id,
                    error = %e,
                    "failed to create execution row"
                );
                None
            }
        };
        if let Some(id) = execution_id {
            if let Err(e) = self.store.start_execution(id).await {
                tracing::warn!(execution_id = id, error = %e, "failed to mark execution running");
            }
        }

        let outcomes = join_all(
            request
                .collectors
                .iter()
                .map(|collector| self.run_collector(execution_id, request, collector)),
        )
        .await;

        if let Some(id) = execution_id {
            self.finish_execution(id, &outcomes).await;
        }

        outcomes.into_iter().map(|o| o.result).collect()
    }

    async fn finish_execution(&self, execution_id: i64, outcomes: &[CollectorOutcome]) {
        let succeeded = outcomes
            .iter()
            .filter(|o| o.result.status == CollectionStatus::Completed)
            .count();
        let status = ExecutionStatus::from_outcomes(succeeded, outcomes.len());

        let failures: Vec<String> = outcomes
            .iter()
            .filter(|o| o.result.status != CollectionStatus::Completed)
            .map(|o| {
                format!(
                    "{}: {}",
                    o.result.collector_type,
                    o.result.error.as_deref().unwrap_or("failed")
                )
            })
            .collect();
        let error_message = (!failures.is_empty()).then(|| failures.join("; "));
        let retry_metadata = retry_metadata(outcomes);

        tracing::info!(
            execution_id,
            status = %status,
            succeeded,
            total = outcomes.len(),
            "execution finished"
        );
        if let Err(e) = self
            .store
            .finish_execution(
                execution_id,
                status,
                error_message.as_deref(),
                retry_metadata.as_ref(),
            )
            .await
        {
            tracing::error!(execution_id, error = %e, "failed to finalize execution row");
        }
    }

    async fn run_collector(
        &self,
        execution_id: Option<i64>,
        request: &QueryExecutionRequest,
        collector: &str,
    ) -> CollectorOutcome {
        let started = Instant::now();
        let mut store_errors: Vec<String> = Vec::new();

        let result_id = match self.store.insert_result(execution_id, request, collector).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!(
                    collector,
                    query_id = %request.query_id,
                    error = %e,
                    "failed to insert result row"
                );
                store_errors.push(format!("result not persisted: {e}"));
                None
            }
        };

        let Some(chain) = self.chains.get(&collector.to_lowercase()) else {
            let message = format!("unknown collector '{collector}'");
            tracing::warn!(collector, query_id = %request.query_id, "unknown collector");
            let metadata = json!({ "attempted": [] });
            if let Some(id) = result_id {
                if let Err(e) = self
                    .store
                    .fail_result(id, false, &message, &metadata, elapsed_ms_i64(started))
                    .await
                {
                    tracing::error!(
                        collector,
                        result_id = id,
                        error = %e,
                        "failed to record failure"
                    );
                }
            }
            return CollectorOutcome {
                result: failed_result(
                    request,
                    collector,
                    result_id,
                    CollectionStatus::Failed,
                    with_store_errors(message, store_errors),
                    started,
                ),
                attempts: Vec::new(),
            };
        };

        if let Some(id) = result_id {
            if let Err(e) = self.store.mark_running(id).await {
                tracing::warn!(
                    collector,
                    result_id = id,
                    error = %e,
                    "failed to mark result running"
                );
            }
        }

        let provider_request = ProviderRequest::new(
            request.query_text.as_str(),
            request.country.as_deref(),
            request.locale.as_str(),
        );

        match chain.execute(&provider_request).await {
            Ok(success) => {
                self.record_success(request, collector, result_id, success, started, store_errors)
                    .await
            }
            Err(failure) => {
                self.record_failure(request, collector, result_id, failure, started, store_errors)
                    .await
            }
        }
    }

    async fn record_success(
        &self,
        request: &QueryExecutionRequest,
        collector: &str,
        result_id: Option<i64>,
        success: ChainSuccess,
        started: Instant,
        mut store_errors: Vec<String>,
    ) -> CollectorOutcome {
        let metadata = success_metadata(&success);
        if let Some(id) = result_id {
            if let Err(e) = self
                .store
                .complete_result(
                    id,
                    &success.response.answer,
                    &success.provider,
                    &metadata,
                    elapsed_ms_i64(started),
                )
                .await
            {
                tracing::error!(collector, result_id = id, error = %e, "failed to store answer");
                store_errors.push(format!("answer not persisted: {e}"));
            }
        }

        tracing::info!(
            collector,
            provider = %success.provider,
            result_id,
            attempts = success.attempts.len(),
            recovered = success.needed_recovery(),
            elapsed_ms = elapsed_ms(started),
            "collector completed"
        );

        let answer = success.response.answer;
        CollectorOutcome {
            result: QueryExecutionResult {
                query_id: request.query_id,
                collector_type: collector.to_owned(),
                status: CollectionStatus::Completed,
                response: Some(answer.text),
                citations: answer.citations,
                urls: answer.urls,
                execution_time_ms: elapsed_ms(started),
                error: (!store_errors.is_empty()).then(|| store_errors.join("; ")),
                result_id,
                provider: Some(success.provider),
            },
            attempts: success.attempts,
        }
    }

    async fn record_failure(
        &self,
        request: &QueryExecutionRequest,
        collector: &str,
        result_id: Option<i64>,
        failure: ChainFailure,
        started: Instant,
        store_errors: Vec<String>,
    ) -> CollectorOutcome {
        let message = failure.to_string();
        let status = if failure.retryable {
            CollectionStatus::FailedRetry
        } else {
            CollectionStatus::Failed
        };
        let metadata = json!({
            "attempted": failure.attempted,
            "attempts": failure.attempts,
        });

        tracing::error!(
            collector,
            result_id,
            retryable = failure.retryable,
            error = %message,
            "collector failed"
        );
        if let Some(id) = result_id {
            if let Err(e) = self
                .store
                .fail_result(id, failure.retryable, &message, &metadata, elapsed_ms_i64(started))
                .await
            {
                tracing::error!(
                    collector,
                    result_id = id,
                    error = %e,
                    "failed to record failure"
                );
            }
        }

        let returned = with_store_errors(message, store_errors);
        CollectorOutcome {
            result: failed_result(request, collector, result_id, status, returned, started),
            attempts: failure.attempts,
        }
    }
}

/// The collector's own error followed by any persistence failures.
fn with_store_errors(message: String, store_errors: Vec<String>) -> String {
    std::iter::once(message)
        .chain(store_errors)
        .collect::<Vec<_>>()
        .join("; ")
}

fn failed_result(
    request: &QueryExecutionRequest,
    collector: &str,
    result_id: Option<i64>,
    status: CollectionStatus,
    message: String,
    started: Instant,
) -> QueryExecutionResult {
    QueryExecutionResult {
        query_id: request.query_id,
        collector_type: collector.to_owned(),
        status,
        response: None,
        citations: Vec::new(),
        urls: Vec::new(),
        execution_time_ms: elapsed_ms(started),
        error: Some(message),
        result_id,
        provider: None,
    }
}

/// Vendor metadata with the attempt log folded in.
fn success_metadata(success: &ChainSuccess) -> Value {
    let attempts = json!(success.attempts);
    match &success.response.metadata {
        Value::Object(map) => {
            let mut map = map.clone();
            map.insert("attempts".to_owned(), attempts);
            Value::Object(map)
        }
        Value::Null => json!({ "attempts": attempts }),
        other => json!({ "vendor": other, "attempts": attempts }),
    }
}

/// Per-collector attempt logs for collectors that needed more than one attempt.
fn retry_metadata(outcomes: &[CollectorOutcome]) -> Option<Value> {
    let entries: Map<String, Value> = outcomes
        .iter()
        .filter(|o| o.attempts.len() > 1)
        .map(|o| {
            (
                o.result.collector_type.clone(),
                json!({
                    "provider": o.result.provider,
                    "attempts": o.attempts,
                }),
            )
        })
        .collect();
    (!entries.is_empty()).then_some(Value::Object(entries))
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn elapsed_ms_i64(started: Instant) -> i64 {
    i64::try_from(elapsed_ms(started)).unwrap_or(i64::MAX)
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
