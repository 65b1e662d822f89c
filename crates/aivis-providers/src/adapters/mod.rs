//! Vendor adapters behind a common [`ProviderAdapter`] trait.
//!
//! Adapters are stateless apart from configuration and a shared
//! `reqwest::Client`; they are safe to call concurrently.

pub mod direct_llm;
pub mod scrape_proxy;
pub mod structured_search;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

use crate::error::ProviderError;
use crate::request::{ProviderRequest, ProviderResponse};

pub use direct_llm::DirectLlmAdapter;
pub use scrape_proxy::ScrapeProxyAdapter;
pub use structured_search::StructuredSearchAdapter;

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Configured provider name, as referenced by fallback chains.
    fn name(&self) -> &str;

    /// Executes one request against the vendor.
    async fn execute(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// Time the adapter may spend waiting on the vendor by design, such as a
    /// polling budget. A chain entry's timeout must exceed it.
    fn wait_budget(&self) -> Option<Duration> {
        None
    }
}

/// HTTP settings shared by every adapter.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Per-request timeout; also bounds each individual snapshot poll.
    pub request_timeout: Duration,
    pub user_agent: String,
}

/// Builds the shared HTTP client.
///
/// # Errors
///
/// Returns [`ProviderError::Config`] if the underlying `reqwest::Client`
/// cannot be constructed (e.g., invalid TLS config).
pub fn build_http_client(settings: &HttpSettings) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(settings.request_timeout)
        .connect_timeout(Duration::from_secs(10))
        .user_agent(&settings.user_agent)
        .build()
        .map_err(|e| ProviderError::config("http", e.to_string()))
}

/// Maps 429 and other non-2xx responses to typed errors.
pub(crate) fn check_status(provider: &str, response: Response) -> Result<Response, ProviderError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        return Err(ProviderError::RateLimited {
            provider: provider.to_owned(),
            retry_after_secs,
        });
    }

    if !status.is_success() {
        return Err(ProviderError::Status {
            provider: provider.to_owned(),
            status: status.as_u16(),
        });
    }

    Ok(response)
}

/// Reads a response body as JSON.
pub(crate) async fn read_json(provider: &str, response: Response) -> Result<Value, ProviderError> {
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::http(provider, e))?;
    serde_json::from_str(&body)
        .map_err(|e| ProviderError::parse(provider, format!("invalid JSON body: {e}")))
}

/// Reads an API key from the environment variable named in configuration.
///
/// # Errors
///
/// Returns [`ProviderError::Config`] if the variable is named but unset or empty.
pub fn resolve_api_key<F>(
    provider: &str,
    api_key_env: Option<&str>,
    lookup: F,
) -> Result<Option<String>, ProviderError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(var) = api_key_env else {
        return Ok(None);
    };
    lookup(var)
        .filter(|v| !v.trim().is_empty())
        .map(Some)
        .ok_or_else(|| ProviderError::config(provider, format!("{var} is not set")))
}
