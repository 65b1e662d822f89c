//! Persistence seam for the orchestrator.
//!
//! [`PgResultStore`] writes `query_executions` and `collector_results`.
//! [`MemoryResultStore`] keeps everything in process and backs dry runs and
//! tests; it enforces the same status transitions as the SQL layer.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

use aivis_core::{CollectionStatus, ExecutionStatus, QueryExecutionRequest};
use aivis_db::{DbError, NewCollectorResult};
use aivis_providers::ParsedAnswer;

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Creates the `queued` tracking row for one request.
    async fn create_execution(&self, request: &QueryExecutionRequest) -> Result<i64, DbError>;

    async fn start_execution(&self, execution_id: i64) -> Result<(), DbError>;

    async fn finish_execution(
        &self,
        execution_id: i64,
        status: ExecutionStatus,
        error_message: Option<&str>,
        retry_metadata: Option<&Value>,
    ) -> Result<(), DbError>;

    /// Inserts the `pending` result row for one collector.
    async fn insert_result(
        &self,
        execution_id: Option<i64>,
        request: &QueryExecutionRequest,
        collector: &str,
    ) -> Result<i64, DbError>;

    async fn mark_running(&self, result_id: i64) -> Result<(), DbError>;

    async fn complete_result(
        &self,
        result_id: i64,
        answer: &ParsedAnswer,
        provider: &str,
        metadata: &Value,
        execution_time_ms: i64,
    ) -> Result<(), DbError>;

    async fn fail_result(
        &self,
        result_id: i64,
        retryable: bool,
        error_message: &str,
        metadata: &Value,
        execution_time_ms: i64,
    ) -> Result<(), DbError>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

pub struct PgResultStore {
    pool: PgPool,
}

impl PgResultStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultStore for PgResultStore {
    async fn create_execution(&self, request: &QueryExecutionRequest) -> Result<i64, DbError> {
        let row = aivis_db::create_query_execution(
            &self.pool,
            request.query_id,
            request.brand_id,
            request.customer_id,
            &request.collectors,
        )
        .await?;
        Ok(row.id)
    }

    async fn start_execution(&self, execution_id: i64) -> Result<(), DbError> {
        aivis_db::start_query_execution(&self.pool, execution_id).await
    }

    async fn finish_execution(
        &self,
        execution_id: i64,
        status: ExecutionStatus,
        error_message: Option<&str>,
        retry_metadata: Option<&Value>,
    ) -> Result<(), DbError> {
        aivis_db::finish_query_execution(
            &self.pool,
            execution_id,
            status,
            error_message,
            retry_metadata,
        )
        .await
    }

    async fn insert_result(
        &self,
        execution_id: Option<i64>,
        request: &QueryExecutionRequest,
        collector: &str,
    ) -> Result<i64, DbError> {
        aivis_db::insert_collector_result(
            &self.pool,
            &NewCollectorResult {
                execution_id,
                query_id: request.query_id,
                brand_id: request.brand_id,
                customer_id: request.customer_id,
                collector_type: collector,
                query_text: &request.query_text,
                topic: request.topic.as_deref(),
                intent: request.intent.as_str(),
                locale: &request.locale,
                country: request.effective_country(),
            },
        )
        .await
    }

    async fn mark_running(&self, result_id: i64) -> Result<(), DbError> {
        aivis_db::mark_collector_result_running(&self.pool, result_id).await
    }

    async fn complete_result(
        &self,
        result_id: i64,
        answer: &ParsedAnswer,
        provider: &str,
        metadata: &Value,
        execution_time_ms: i64,
    ) -> Result<(), DbError> {
        aivis_db::complete_collector_result(
            &self.pool,
            result_id,
            &answer.text,
            &answer.citations,
            &answer.urls,
            provider,
            metadata,
            execution_time_ms,
        )
        .await
    }

    async fn fail_result(
        &self,
        result_id: i64,
        retryable: bool,
        error_message: &str,
        metadata: &Value,
        execution_time_ms: i64,
    ) -> Result<(), DbError> {
        aivis_db::fail_collector_result(
            &self.pool,
            result_id,
            retryable,
            error_message,
            metadata,
            execution_time_ms,
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StoredResult {
    pub id: i64,
    pub execution_id: Option<i64>,
    pub query_id: Uuid,
    pub collector_type: String,
    pub status: CollectionStatus,
    pub raw_answer: Option<String>,
    pub citations: Vec<String>,
    pub urls: Vec<String>,
    pub provider: Option<String>,
    pub error_message: Option<String>,
    pub metadata: Value,
    pub execution_time_ms: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct StoredExecution {
    pub id: i64,
    pub query_id: Uuid,
    pub status: ExecutionStatus,
    pub error_message: Option<String>,
    pub retry_metadata: Option<Value>,
}

#[derive(Default)]
struct MemoryState {
    executions: Vec<StoredExecution>,
    results: Vec<StoredResult>,
}

#[derive(Default)]
pub struct MemoryResultStore {
    state: Mutex<MemoryState>,
}

impl MemoryResultStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn results(&self) -> Vec<StoredResult> {
        self.state.lock().await.results.clone()
    }

    pub async fn executions(&self) -> Vec<StoredExecution> {
        self.state.lock().await.executions.clone()
    }
}

fn transition(result: &mut StoredResult, to: CollectionStatus) -> Result<(), DbError> {
    if !result.status.can_transition_to(to) {
        return Err(DbError::InvalidStatusTransition {
            id: result.id,
            to: to.as_str(),
        });
    }
    result.status = to;
    Ok(())
}

impl MemoryState {
    fn result_mut(&mut self, id: i64) -> Result<&mut StoredResult, DbError> {
        self.results
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(DbError::NotFound)
    }

    fn execution_mut(&mut self, id: i64) -> Result<&mut StoredExecution, DbError> {
        self.executions
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(DbError::NotFound)
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn create_execution(&self, request: &QueryExecutionRequest) -> Result<i64, DbError> {
        let mut state = self.state.lock().await;
        let id = i64::try_from(state.executions.len()).unwrap_or(i64::MAX - 1) + 1;
        state.executions.push(StoredExecution {
            id,
            query_id: request.query_id,
            status: ExecutionStatus::Queued,
            error_message: None,
            retry_metadata: None,
        });
        Ok(id)
    }

    async fn start_execution(&self, execution_id: i64) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        let execution = state.execution_mut(execution_id)?;
        if execution.status != ExecutionStatus::Queued {
            return Err(DbError::InvalidExecutionTransition {
                id: execution_id,
                to: ExecutionStatus::Running.as_str(),
            });
        }
        execution.status = ExecutionStatus::Running;
        Ok(())
    }

    async fn finish_execution(
        &self,
        execution_id: i64,
        status: ExecutionStatus,
        error_message: Option<&str>,
        retry_metadata: Option<&Value>,
    ) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        let execution = state.execution_mut(execution_id)?;
        if execution.status != ExecutionStatus::Running
            || matches!(status, ExecutionStatus::Queued | ExecutionStatus::Running)
        {
            return Err(DbError::InvalidExecutionTransition {
                id: execution_id,
                to: status.as_str(),
            });
        }
        execution.status = status;
        execution.error_message = error_message.map(str::to_owned);
        execution.retry_metadata = retry_metadata.cloned();
        Ok(())
    }

    async fn insert_result(
        &self,
        execution_id: Option<i64>,
        request: &QueryExecutionRequest,
        collector: &str,
    ) -> Result<i64, DbError> {
        let mut state = self.state.lock().await;
        let id = i64::try_from(state.results.len()).unwrap_or(i64::MAX - 1) + 1;
        state.results.push(StoredResult {
            id,
            execution_id,
            query_id: request.query_id,
            collector_type: collector.to_owned(),
            status: CollectionStatus::Pending,
            raw_answer: None,
            citations: Vec::new(),
            urls: Vec::new(),
            provider: None,
            error_message: None,
            metadata: Value::Null,
            execution_time_ms: None,
        });
        Ok(id)
    }

    async fn mark_running(&self, result_id: i64) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        transition(state.result_mut(result_id)?, CollectionStatus::Running)
    }

    async fn complete_result(
        &self,
        result_id: i64,
        answer: &ParsedAnswer,
        provider: &str,
        metadata: &Value,
        execution_time_ms: i64,
    ) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        let result = state.result_mut(result_id)?;
        transition(result, CollectionStatus::Completed)?;
        result.raw_answer = Some(answer.text.clone());
        result.citations.clone_from(&answer.citations);
        result.urls.clone_from(&answer.urls);
        result.provider = Some(provider.to_owned());
        result.metadata = metadata.clone();
        result.execution_time_ms = Some(execution_time_ms);
        Ok(())
    }

    async fn fail_result(
        &self,
        result_id: i64,
        retryable: bool,
        error_message: &str,
        metadata: &Value,
        execution_time_ms: i64,
    ) -> Result<(), DbError> {
        let to = if retryable {
            CollectionStatus::FailedRetry
        } else {
            CollectionStatus::Failed
        };
        let mut state = self.state.lock().await;
        let result = state.result_mut(result_id)?;
        transition(result, to)?;
        result.error_message = Some(error_message.to_owned());
        result.metadata = metadata.clone();
        result.execution_time_ms = Some(execution_time_ms);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aivis_core::QueryIntent;

    fn request() -> QueryExecutionRequest {
        QueryExecutionRequest {
            query_id: Uuid::new_v4(),
            brand_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            query_text: "best trail shoes".to_owned(),
            intent: QueryIntent::Commercial,
            topic: None,
            locale: "en-US".to_owned(),
            country: None,
            collectors: vec!["chatgpt".to_owned()],
        }
    }

    #[tokio::test]
    async fn memory_store_rejects_leaving_a_terminal_status() {
        let store = MemoryResultStore::new();
        let id = store.insert_result(None, &request(), "chatgpt").await.unwrap();
        store.mark_running(id).await.unwrap();
        store
            .fail_result(id, false, "boom", &Value::Null, 5)
            .await
            .unwrap();

        let err = store
            .complete_result(id, &ParsedAnswer::default(), "p", &Value::Null, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidStatusTransition { to: "completed", .. }));

        let stored = store.results().await;
        assert_eq!(stored[0].status, CollectionStatus::Failed);
        assert!(stored[0].raw_answer.is_none());
    }

    #[tokio::test]
    async fn memory_store_execution_lifecycle() {
        let store = MemoryResultStore::new();
        let id = store.create_execution(&request()).await.unwrap();

        let premature = store
            .finish_execution(id, ExecutionStatus::Completed, None, None)
            .await;
        assert!(premature.is_err(), "queued executions cannot finish");

        store.start_execution(id).await.unwrap();
        store
            .finish_execution(id, ExecutionStatus::Partial, Some("gemini: timeout"), None)
            .await
            .unwrap();

        let executions = store.executions().await;
        assert_eq!(executions[0].status, ExecutionStatus::Partial);
        assert_eq!(executions[0].error_message.as_deref(), Some("gemini: timeout"));
    }
}
