//! Builds adapters from provider configuration and assembles fallback chains.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use aivis_core::{ChainEntryConfig, CollectorsFile, ProviderConfig, ProviderKind};

use crate::adapters::direct_llm::DirectLlmConfig;
use crate::adapters::scrape_proxy::{ScrapeProxyConfig, DEFAULT_MAX_POLLS, DEFAULT_POLL_INTERVAL};
use crate::adapters::structured_search::StructuredSearchConfig;
use crate::adapters::{
    build_http_client, resolve_api_key, DirectLlmAdapter, HttpSettings, ProviderAdapter,
    ScrapeProxyAdapter, StructuredSearchAdapter,
};
use crate::chain::{ChainEntry, FallbackChain};
use crate::error::ProviderError;

/// Every configured adapter, keyed by provider name.
pub struct ProviderRegistry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    backoff_base_ms: u64,
}

impl ProviderRegistry {
    /// Builds one adapter per configured provider, sharing a single HTTP client.
    ///
    /// API keys are read through `lookup` using each provider's `api_key_env`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Config`] if the HTTP client cannot be built,
    /// a referenced key is unset, or a provider lacks a kind-specific field.
    pub fn from_config<F>(
        file: &CollectorsFile,
        http: &HttpSettings,
        backoff_base_ms: u64,
        lookup: F,
    ) -> Result<Self, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let client = build_http_client(http)?;
        let mut adapters: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();
        for provider in &file.providers {
            let adapter = build_adapter(provider, client.clone(), &lookup)?;
            adapters.insert(provider.name.clone(), adapter);
        }
        Ok(Self {
            adapters,
            backoff_base_ms,
        })
    }

    /// [`ProviderRegistry::from_config`] reading keys from the process environment.
    ///
    /// # Errors
    ///
    /// See [`ProviderRegistry::from_config`].
    pub fn from_env(
        file: &CollectorsFile,
        http: &HttpSettings,
        backoff_base_ms: u64,
    ) -> Result<Self, ProviderError> {
        Self::from_config(file, http, backoff_base_ms, |var| std::env::var(var).ok())
    }

    /// Registry over pre-built adapters.
    #[must_use]
    pub fn with_adapters(adapters: Vec<Arc<dyn ProviderAdapter>>, backoff_base_ms: u64) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|a| (a.name().to_owned(), a))
            .collect();
        Self {
            adapters,
            backoff_base_ms,
        }
    }

    #[must_use]
    pub fn adapter(&self, name: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(name).cloned()
    }

    #[must_use]
    pub fn provider_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Assembles the fallback chain for one collector.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Config`] if an entry names an unknown provider,
    /// or its timeout would cut off the provider's own polling budget.
    pub fn build_chain(
        &self,
        collector: &str,
        entries: &[ChainEntryConfig],
    ) -> Result<FallbackChain, ProviderError> {
        let chain_entries = entries
            .iter()
            .map(|entry| {
                let adapter = self.adapter(&entry.provider).ok_or_else(|| {
                    ProviderError::config(
                        &entry.provider,
                        format!("collector '{collector}' references an unknown provider"),
                    )
                })?;
                let timeout = Duration::from_millis(entry.timeout_ms);
                if let Some(budget) = adapter.wait_budget() {
                    if timeout <= budget {
                        return Err(ProviderError::config(
                            &entry.provider,
                            format!(
                                "collector '{collector}' timeout_ms {} must exceed the \
                                 {} ms polling budget",
                                entry.timeout_ms,
                                budget.as_millis()
                            ),
                        ));
                    }
                }
                Ok(ChainEntry {
                    adapter,
                    priority: entry.priority,
                    timeout,
                    max_retries: entry.max_retries,
                    continue_on_failure: entry.continue_on_failure,
                })
            })
            .collect::<Result<Vec<_>, ProviderError>>()?;

        Ok(FallbackChain::new(
            collector,
            chain_entries,
            self.backoff_base_ms,
        ))
    }
}

fn build_adapter<F>(
    provider: &ProviderConfig,
    client: reqwest::Client,
    lookup: &F,
) -> Result<Arc<dyn ProviderAdapter>, ProviderError>
where
    F: Fn(&str) -> Option<String>,
{
    let name = provider.name.as_str();
    let api_key = resolve_api_key(name, provider.api_key_env.as_deref(), lookup)?;
    let require = |value: &Option<String>, field: &str| {
        value
            .clone()
            .ok_or_else(|| ProviderError::config(name, format!("missing '{field}'")))
    };

    let adapter: Arc<dyn ProviderAdapter> = match provider.kind {
        ProviderKind::ScrapeProxy => Arc::new(ScrapeProxyAdapter::new(
            name,
            client,
            ScrapeProxyConfig {
                base_url: provider.base_url.clone(),
                api_key,
                dataset_id: require(&provider.dataset_id, "dataset_id")?,
                target_url: require(&provider.target_url, "target_url")?,
                poll_interval: provider
                    .poll_interval_ms
                    .map_or(DEFAULT_POLL_INTERVAL, Duration::from_millis),
                max_polls: provider.max_polls.unwrap_or(DEFAULT_MAX_POLLS),
            },
        )),
        ProviderKind::StructuredSearch => Arc::new(StructuredSearchAdapter::new(
            name,
            client,
            StructuredSearchConfig {
                base_url: provider.base_url.clone(),
                api_key,
                source: require(&provider.source, "source")?,
            },
        )),
        ProviderKind::DirectLlm => Arc::new(DirectLlmAdapter::new(
            name,
            client,
            DirectLlmConfig {
                base_url: provider.base_url.clone(),
                api_key,
                model: require(&provider.model, "model")?,
            },
        )),
    };

    Ok(adapter)
}
