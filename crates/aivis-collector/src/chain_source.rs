//! Where fallback-chain definitions come from.
//!
//! Chains are read once at startup, either from the `collectors:` section of
//! the YAML file or from `collector_provider_settings`, and then frozen into
//! [`FallbackChain`]s keyed by lower-cased collector name.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use aivis_core::collectors::validate_chain;
use aivis_core::{ChainEntryConfig, CollectorConfig, CollectorsFile, ConfigError};
use aivis_db::ProviderSettingRow;
use aivis_providers::{FallbackChain, ProviderRegistry};

use crate::CollectorError;

#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Every collector definition this source knows about.
    async fn load(&self) -> Result<Vec<CollectorConfig>, CollectorError>;
}

/// Chains from an already-validated collectors file.
pub struct FileChainSource {
    collectors: Vec<CollectorConfig>,
}

impl FileChainSource {
    #[must_use]
    pub fn new(file: &CollectorsFile) -> Self {
        Self {
            collectors: file.collectors.clone(),
        }
    }
}

#[async_trait]
impl ChainSource for FileChainSource {
    async fn load(&self) -> Result<Vec<CollectorConfig>, CollectorError> {
        Ok(self.collectors.clone())
    }
}

/// Chains from `collector_provider_settings`.
///
/// Rows are validated against the provider names the registry knows, with
/// the same rules the YAML file is held to.
pub struct DbChainSource {
    pool: PgPool,
    known_providers: HashSet<String>,
}

impl DbChainSource {
    #[must_use]
    pub fn new(pool: PgPool, registry: &ProviderRegistry) -> Self {
        Self {
            pool,
            known_providers: registry
                .provider_names()
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

#[async_trait]
impl ChainSource for DbChainSource {
    async fn load(&self) -> Result<Vec<CollectorConfig>, CollectorError> {
        let known: HashSet<&str> = self.known_providers.iter().map(String::as_str).collect();
        let mut collectors = Vec::new();

        for name in aivis_db::list_chain_collectors(&self.pool).await? {
            let rows = aivis_db::list_chain_settings(&self.pool, &name).await?;
            let chain = rows
                .iter()
                .map(entry_from_row)
                .collect::<Result<Vec<_>, ConfigError>>()?;
            validate_chain(&name, &chain, &known)?;
            collectors.push(CollectorConfig { name, chain });
        }

        Ok(collectors)
    }
}

fn entry_from_row(row: &ProviderSettingRow) -> Result<ChainEntryConfig, ConfigError> {
    let out_of_range = |field: &str| {
        ConfigError::Validation(format!(
            "collector '{}' entry '{}' has out-of-range {field}",
            row.collector, row.provider
        ))
    };

    Ok(ChainEntryConfig {
        provider: row.provider.clone(),
        priority: u32::try_from(row.priority).map_err(|_| out_of_range("priority"))?,
        timeout_ms: u64::try_from(row.timeout_ms).map_err(|_| out_of_range("timeout_ms"))?,
        max_retries: u32::try_from(row.max_retries).map_err(|_| out_of_range("max_retries"))?,
        continue_on_failure: row.continue_on_failure,
    })
}

/// Loads every collector from `source` and builds its chain.
///
/// # Errors
///
/// Returns [`CollectorError`] if the source cannot be read or a chain names
/// a provider the registry does not have.
pub async fn build_chains(
    source: &dyn ChainSource,
    registry: &ProviderRegistry,
) -> Result<HashMap<String, Arc<FallbackChain>>, CollectorError> {
    let mut chains = HashMap::new();
    for collector in source.load().await? {
        let chain = registry.build_chain(&collector.name, &collector.chain)?;
        tracing::debug!(
            collector = %collector.name,
            providers = ?chain.providers(),
            "fallback chain ready"
        );
        chains.insert(collector.name.to_lowercase(), Arc::new(chain));
    }
    Ok(chains)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aivis_core::collectors::parse_collectors;
    use aivis_providers::HttpSettings;
    use std::time::Duration;

    const YAML: &str = r"
providers:
  - name: openai_direct
    kind: direct_llm
    base_url: https://api.openai.com/v1
    model: gpt-4o-mini
  - name: perplexity_direct
    kind: direct_llm
    base_url: https://api.perplexity.ai
    model: sonar
collectors:
  - name: ChatGPT
    chain:
      - provider: openai_direct
        priority: 1
        timeout_ms: 1000
  - name: perplexity
    chain:
      - provider: perplexity_direct
        priority: 1
        timeout_ms: 1000
      - provider: openai_direct
        priority: 2
        timeout_ms: 1000
";

    fn registry(file: &CollectorsFile) -> ProviderRegistry {
        let http = HttpSettings {
            request_timeout: Duration::from_secs(5),
            user_agent: "aivis-test/0.1".to_owned(),
        };
        ProviderRegistry::from_config(file, &http, 0, |_| None).unwrap()
    }

    #[tokio::test]
    async fn file_source_builds_lowercased_chains() {
        let file = parse_collectors(YAML).unwrap();
        let chains = build_chains(&FileChainSource::new(&file), &registry(&file))
            .await
            .unwrap();

        let mut names: Vec<&str> = chains.keys().map(String::as_str).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["chatgpt", "perplexity"]);
        assert_eq!(
            chains["perplexity"].providers(),
            vec!["perplexity_direct", "openai_direct"]
        );
    }

    #[test]
    fn negative_priority_row_is_rejected() {
        let row = ProviderSettingRow {
            id: 1,
            collector: "chatgpt".to_owned(),
            provider: "openai_direct".to_owned(),
            priority: -1,
            timeout_ms: 1000,
            max_retries: 0,
            continue_on_failure: true,
            enabled: true,
        };
        let err = entry_from_row(&row).unwrap_err();
        assert!(err.to_string().contains("priority"), "{err}");
    }

    #[test]
    fn settings_row_maps_to_chain_entry() {
        let row = ProviderSettingRow {
            id: 7,
            collector: "chatgpt".to_owned(),
            provider: "openai_direct".to_owned(),
            priority: 2,
            timeout_ms: 60_000,
            max_retries: 1,
            continue_on_failure: false,
            enabled: true,
        };
        let entry = entry_from_row(&row).unwrap();
        assert_eq!(entry.priority, 2);
        assert_eq!(entry.timeout_ms, 60_000);
        assert_eq!(entry.max_retries, 1);
        assert!(!entry.continue_on_failure);
    }
}
