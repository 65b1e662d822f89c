//! Direct OpenAI-compatible chat-completions adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{check_status, read_json, ProviderAdapter};
use crate::error::ProviderError;
use crate::parse::{string_at, urls_in_array, FieldPolicy};
use crate::request::{ProviderRequest, ProviderResponse};

fn message_content(r: &Value) -> Option<String> {
    string_at(r, "/choices/0/message/content")
}

fn top_level_citations(r: &Value) -> Option<Vec<String>> {
    urls_in_array(r, "/citations", "/url")
}

fn annotation_citations(r: &Value) -> Option<Vec<String>> {
    let annotations = r.pointer("/choices/0/message/annotations")?.as_array()?;
    Some(
        annotations
            .iter()
            .filter_map(|a| a.pointer("/url_citation/url").and_then(Value::as_str))
            .map(str::to_owned)
            .collect(),
    )
}

pub const DIRECT_LLM_POLICY: FieldPolicy = FieldPolicy {
    text: &[message_content],
    citations: &[top_level_citations, annotation_citations],
    urls: &[],
};

#[derive(Debug, Clone)]
pub struct DirectLlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

pub struct DirectLlmAdapter {
    name: String,
    client: Client,
    config: DirectLlmConfig,
}

impl DirectLlmAdapter {
    #[must_use]
    pub fn new(name: impl Into<String>, client: Client, config: DirectLlmConfig) -> Self {
        Self {
            name: name.into(),
            client,
            config,
        }
    }
}

#[async_trait]
impl ProviderAdapter for DirectLlmAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "system",
                    "content": format!(
                        "Answer as you would for a user located in {} (locale {}).",
                        request.country, request.locale
                    ),
                },
                { "role": "user", "content": request.prompt },
            ],
        });

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

        let answer = DIRECT_LLM_POLICY.apply(&self.name, &payload)?;
        let mut metadata = json!({ "model": self.config.model });
        if let Some(id) = string_at(&payload, "/id") {
            metadata["completion_id"] = Value::String(id);
        }
        if let Some(usage) = payload.get("usage") {
            metadata["usage"] = usage.clone();
        }

        Ok(ProviderResponse {
            answer,
            snapshot_id: None,
            metadata,
        })
    }
}
