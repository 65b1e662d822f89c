//! Synchronous structured-search adapter.
//!
//! One `POST {base}/v1/queries` returns the parsed answer-engine page as
//! `{"results": [{"content": {...}}]}`.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{check_status, read_json, ProviderAdapter};
use crate::error::ProviderError;
use crate::parse::{string_at, strip_tags, urls_in_array, FieldPolicy};
use crate::request::{ProviderRequest, ProviderResponse};

fn response_text(c: &Value) -> Option<String> {
    string_at(c, "/response_text")
}

fn markdown_text(c: &Value) -> Option<String> {
    string_at(c, "/markdown_text")
}

fn html(c: &Value) -> Option<String> {
    string_at(c, "/html").map(|h| strip_tags(&h))
}

fn citations(c: &Value) -> Option<Vec<String>> {
    urls_in_array(c, "/citations", "/url")
}

fn sources(c: &Value) -> Option<Vec<String>> {
    urls_in_array(c, "/sources", "/url")
}

/// Applied to `results[0].content`.
pub const STRUCTURED_SEARCH_POLICY: FieldPolicy = FieldPolicy {
    text: &[response_text, markdown_text, html],
    citations: &[citations, sources],
    urls: &[],
};

#[derive(Debug, Clone)]
pub struct StructuredSearchConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Vendor `source` parameter, e.g. `chatgpt` or `google_ai_mode`.
    pub source: String,
}

pub struct StructuredSearchAdapter {
    name: String,
    client: Client,
    config: StructuredSearchConfig,
}

impl StructuredSearchAdapter {
    #[must_use]
    pub fn new(name: impl Into<String>, client: Client, config: StructuredSearchConfig) -> Self {
        Self {
            name: name.into(),
            client,
            config,
        }
    }
}

#[async_trait]
impl ProviderAdapter for StructuredSearchAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/v1/queries", self.config.base_url.trim_end_matches('/'));
        let mut body = json!({
            "source": self.config.source,
            "prompt": request.prompt,
            "geo_location": request.country,
            "parse": true,
        });
        if let Value::Object(map) = &mut body {
            for (key, value) in &request.extra_options {
                map.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::http(&self.name, e))?;
        let response = check_status(&self.name, response)?;
        let payload = read_json(&self.name, response).await?;

        let content = payload
            .pointer("/results/0/content")
            .ok_or_else(|| ProviderError::parse(&self.name, "response has no results[0].content"))?;
        let answer = STRUCTURED_SEARCH_POLICY.apply(&self.name, content)?;

        let mut metadata = json!({ "source": self.config.source });
        if let Some(job_id) = string_at(&payload, "/job/id") {
            metadata["job_id"] = Value::String(job_id);
        }

        Ok(ProviderResponse {
            answer,
            snapshot_id: None,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_uses_source_objects_when_citations_missing() {
        let content = json!({
            "markdown_text": "Salesforce and HubSpot",
            "sources": [{"url": "https://g2.com/crm", "title": "G2"}]
        });
        let parsed = STRUCTURED_SEARCH_POLICY.apply("search", &content).unwrap();
        assert_eq!(parsed.text, "Salesforce and HubSpot");
        assert_eq!(parsed.citations, vec!["https://g2.com/crm"]);
        assert!(parsed.urls.is_empty());
    }
}
