//! Asynchronous scrape-proxy adapter.
//!
//! The vendor drives a real answer-engine page in a browser. A request is a
//! trigger that returns a snapshot id; the snapshot is then polled on a fixed
//! interval until it is ready (`200` with the records) or the poll budget
//! runs out. `202` means the snapshot is still being built.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::{check_status, read_json, ProviderAdapter};
use crate::error::ProviderError;
use crate::parse::{string_at, strip_tags, urls_in_array, FieldPolicy};
use crate::request::{ProviderRequest, ProviderResponse};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_POLLS: u32 = 60;

fn answer_text(r: &Value) -> Option<String> {
    string_at(r, "/answer_text")
}

fn answer_text_markdown(r: &Value) -> Option<String> {
    string_at(r, "/answer_text_markdown")
}

fn answer_html(r: &Value) -> Option<String> {
    string_at(r, "/answer_html").map(|html| strip_tags(&html))
}

fn citations(r: &Value) -> Option<Vec<String>> {
    urls_in_array(r, "/citations", "/url")
}

fn links_attached(r: &Value) -> Option<Vec<String>> {
    urls_in_array(r, "/links_attached", "/url")
}

fn sources(r: &Value) -> Option<Vec<String>> {
    urls_in_array(r, "/sources", "/url")
}

fn links(r: &Value) -> Option<Vec<String>> {
    urls_in_array(r, "/links", "/url")
}

pub const SCRAPE_PROXY_POLICY: FieldPolicy = FieldPolicy {
    text: &[answer_text, answer_text_markdown, answer_html],
    citations: &[citations, links_attached, sources],
    urls: &[links],
};

#[derive(Debug, Clone)]
pub struct ScrapeProxyConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub dataset_id: String,
    /// Answer-engine page the proxy should drive.
    pub target_url: String,
    pub poll_interval: Duration,
    pub max_polls: u32,
}

pub struct ScrapeProxyAdapter {
    name: String,
    client: Client,
    config: ScrapeProxyConfig,
}

enum SnapshotState {
    Pending,
    Ready(Value),
}

impl ScrapeProxyAdapter {
    #[must_use]
    pub fn new(name: impl Into<String>, client: Client, config: ScrapeProxyConfig) -> Self {
        Self {
            name: name.into(),
            client,
            config,
        }
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn trigger(&self, request: &ProviderRequest) -> Result<String, ProviderError> {
        let url = format!("{}/trigger", self.base());
        let body = json!([{
            "url": self.config.target_url,
            "prompt": request.prompt,
            "country": request.country,
        }]);

        let response = self
            .authorize(
                self.client
                    .post(&url)
                    .query(&[("dataset_id", self.config.dataset_id.as_str())])
                    .json(&body),
            )
            .send()
            .await
            .map_err(|e| ProviderError::http(&self.name, e))?;
        let response = check_status(&self.name, response)?;
        let payload = read_json(&self.name, response).await?;

        string_at(&payload, "/snapshot_id")
            .ok_or_else(|| ProviderError::parse(&self.name, "trigger response has no snapshot_id"))
    }

    async fn poll_once(&self, snapshot_id: &str) -> Result<SnapshotState, ProviderError> {
        let url = format!("{}/snapshot/{snapshot_id}", self.base());
        let response = self
            .authorize(self.client.get(&url).query(&[("format", "json")]))
            .send()
            .await
            .map_err(|e| ProviderError::http(&self.name, e))?;

        if response.status() == StatusCode::ACCEPTED {
            return Ok(SnapshotState::Pending);
        }

        let response = check_status(&self.name, response)?;
        let payload = read_json(&self.name, response).await?;

        match payload {
            Value::Array(mut records) => {
                if records.is_empty() {
                    return Err(ProviderError::parse(&self.name, "snapshot contains no records"));
                }
                Ok(SnapshotState::Ready(records.swap_remove(0)))
            }
            Value::Object(_) => match payload.get("status").and_then(Value::as_str) {
                Some("failed" | "error") => Err(ProviderError::SnapshotFailed {
                    provider: self.name.clone(),
                    snapshot_id: snapshot_id.to_owned(),
                    reason: string_at(&payload, "/error")
                        .or_else(|| string_at(&payload, "/message"))
                        .unwrap_or_else(|| "vendor reported failure".to_owned()),
                }),
                Some("running" | "building" | "starting" | "collecting") => {
                    Ok(SnapshotState::Pending)
                }
                _ => Ok(SnapshotState::Ready(payload)),
            },
            _ => Err(ProviderError::parse(&self.name, "unexpected snapshot payload")),
        }
    }
}

#[async_trait]
impl ProviderAdapter for ScrapeProxyAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn wait_budget(&self) -> Option<Duration> {
        Some(self.config.poll_interval.saturating_mul(self.config.max_polls))
    }

    async fn execute(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let snapshot_id = self.trigger(request).await?;
        tracing::debug!(provider = %self.name, %snapshot_id, "snapshot triggered");

        for poll in 1..=self.config.max_polls {
            tokio::time::sleep(self.config.poll_interval).await;
            match self.poll_once(&snapshot_id).await? {
                SnapshotState::Pending => {
                    tracing::debug!(provider = %self.name, %snapshot_id, poll, "snapshot not ready");
                }
                SnapshotState::Ready(record) => {
                    let answer = SCRAPE_PROXY_POLICY.apply(&self.name, &record)?;
                    return Ok(ProviderResponse {
                        answer,
                        snapshot_id: Some(snapshot_id.clone()),
                        metadata: json!({
                            "snapshot_id": snapshot_id,
                            "dataset_id": self.config.dataset_id,
                            "polls": poll,
                        }),
                    });
                }
            }
        }

        Err(ProviderError::SnapshotTimeout {
            provider: self.name.clone(),
            snapshot_id,
            polls: self.config.max_polls,
        })
    }
}
