//! Static provider and fallback-chain configuration loaded from YAML.
//!
//! The file has two sections: `providers` (one entry per upstream vendor
//! integration, with credentials referenced by env-var name) and
//! `collectors` (one entry per logical answer engine, each an ordered chain
//! of providers). The loaded [`CollectorsFile`] is immutable for the life of
//! the process.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Asynchronous scrape-proxy vendor: trigger a snapshot, poll until ready.
    ScrapeProxy,
    /// Synchronous structured-search vendor returning parsed JSON.
    StructuredSearch,
    /// OpenAI-compatible chat completions endpoint.
    DirectLlm,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::ScrapeProxy => write!(f, "scrape_proxy"),
            ProviderKind::StructuredSearch => write!(f, "structured_search"),
            ProviderKind::DirectLlm => write!(f, "direct_llm"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    pub base_url: String,
    /// Name of the env var holding the vendor API key.
    pub api_key_env: Option<String>,
    /// Scrape-proxy dataset identifier.
    pub dataset_id: Option<String>,
    /// Answer-engine page the scrape proxy should drive, e.g. `https://chatgpt.com/`.
    pub target_url: Option<String>,
    /// Structured-search `source` parameter.
    pub source: Option<String>,
    /// Model name for direct LLM providers.
    pub model: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub max_polls: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEntryConfig {
    pub provider: String,
    pub priority: u32,
    pub timeout_ms: u64,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_continue_on_failure")]
    pub continue_on_failure: bool,
}

fn default_continue_on_failure() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    pub name: String,
    #[serde(default)]
    pub chain: Vec<ChainEntryConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorsFile {
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub collectors: Vec<CollectorConfig>,
}

impl CollectorsFile {
    #[must_use]
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn collector(&self, name: &str) -> Option<&CollectorConfig> {
        self.collectors.iter().find(|c| c.name == name)
    }

    /// Names of every configured logical collector, in file order.
    #[must_use]
    pub fn collector_names(&self) -> Vec<&str> {
        self.collectors.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Load and validate the collectors configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_collectors(path: &Path) -> Result<CollectorsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::CollectorsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_collectors(&content)
}

/// Parse and validate collectors configuration from a YAML string.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML cannot be parsed or fails validation.
pub fn parse_collectors(content: &str) -> Result<CollectorsFile, ConfigError> {
    let file: CollectorsFile = serde_yaml::from_str(content)?;
    validate_collectors(&file)?;
    Ok(file)
}

fn validate_collectors(file: &CollectorsFile) -> Result<(), ConfigError> {
    let mut provider_names = HashSet::new();
    for provider in &file.providers {
        if provider.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "provider name must be non-empty".to_string(),
            ));
        }
        if !provider_names.insert(provider.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate provider name: '{}'",
                provider.name
            )));
        }
        validate_provider_fields(provider)?;
    }

    let mut collector_names = HashSet::new();
    for collector in &file.collectors {
        if !collector_names.insert(collector.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate collector name: '{}'",
                collector.name
            )));
        }
        validate_chain(&collector.name, &collector.chain, &provider_names)?;
    }

    Ok(())
}

fn validate_provider_fields(provider: &ProviderConfig) -> Result<(), ConfigError> {
    let missing = |field: &str| {
        ConfigError::Validation(format!(
            "provider '{}' of kind {} requires '{field}'",
            provider.name, provider.kind
        ))
    };

    match provider.kind {
        ProviderKind::ScrapeProxy => {
            if provider.dataset_id.is_none() {
                return Err(missing("dataset_id"));
            }
            if provider.target_url.is_none() {
                return Err(missing("target_url"));
            }
        }
        ProviderKind::StructuredSearch => {
            if provider.source.is_none() {
                return Err(missing("source"));
            }
        }
        ProviderKind::DirectLlm => {
            if provider.model.is_none() {
                return Err(missing("model"));
            }
        }
    }

    if provider.max_polls == Some(0) {
        return Err(ConfigError::Validation(format!(
            "provider '{}' has max_polls 0; must poll at least once",
            provider.name
        )));
    }

    Ok(())
}

/// Validate one collector's chain against the set of known provider names.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] on unknown providers, duplicate
/// priorities, or zero timeouts.
pub fn validate_chain(
    collector: &str,
    chain: &[ChainEntryConfig],
    provider_names: &HashSet<&str>,
) -> Result<(), ConfigError> {
    let mut priorities = HashSet::new();
    for entry in chain {
        if !provider_names.contains(entry.provider.as_str()) {
            return Err(ConfigError::Validation(format!(
                "collector '{collector}' references unknown provider '{}'",
                entry.provider
            )));
        }
        if !priorities.insert(entry.priority) {
            return Err(ConfigError::Validation(format!(
                "collector '{collector}' has duplicate priority {}",
                entry.priority
            )));
        }
        if entry.timeout_ms == 0 {
            return Err(ConfigError::Validation(format!(
                "collector '{collector}' entry '{}' has timeout_ms 0",
                entry.provider
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r"
providers:
  - name: proxy_chatgpt
    kind: scrape_proxy
    base_url: https://proxy.example.com/datasets/v3
    api_key_env: SCRAPE_PROXY_API_KEY
    dataset_id: gd_chatgpt
    target_url: https://chatgpt.com/
    poll_interval_ms: 5000
    max_polls: 60
  - name: openai_direct
    kind: direct_llm
    base_url: https://api.openai.com/v1
    api_key_env: OPENAI_API_KEY
    model: gpt-4o-mini
collectors:
  - name: chatgpt
    chain:
      - provider: proxy_chatgpt
        priority: 1
        timeout_ms: 330000
        max_retries: 1
      - provider: openai_direct
        priority: 2
        timeout_ms: 60000
        continue_on_failure: false
";

    #[test]
    fn parses_valid_file() {
        let file = parse_collectors(VALID).expect("valid config");
        assert_eq!(file.providers.len(), 2);
        assert_eq!(file.collector_names(), vec!["chatgpt"]);

        let chain = &file.collector("chatgpt").unwrap().chain;
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].max_retries, 1);
        assert!(chain[0].continue_on_failure, "defaults to true");
        assert_eq!(chain[1].max_retries, 0, "defaults to zero");
        assert!(!chain[1].continue_on_failure);

        let proxy = file.provider("proxy_chatgpt").unwrap();
        assert_eq!(proxy.kind, ProviderKind::ScrapeProxy);
        assert_eq!(proxy.max_polls, Some(60));
    }

    #[test]
    fn rejects_unknown_provider_reference() {
        let yaml = VALID.replace("provider: openai_direct", "provider: nope");
        let err = parse_collectors(&yaml).unwrap_err();
        assert!(err.to_string().contains("unknown provider 'nope'"), "{err}");
    }

    #[test]
    fn rejects_duplicate_priority() {
        let yaml = VALID.replace("priority: 2", "priority: 1");
        let err = parse_collectors(&yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate priority 1"), "{err}");
    }

    #[test]
    fn rejects_scrape_proxy_without_dataset() {
        let yaml = VALID.replace("    dataset_id: gd_chatgpt\n", "");
        let err = parse_collectors(&yaml).unwrap_err();
        assert!(err.to_string().contains("requires 'dataset_id'"), "{err}");
    }

    #[test]
    fn rejects_direct_llm_without_model() {
        let yaml = VALID.replace("    model: gpt-4o-mini\n", "");
        let err = parse_collectors(&yaml).unwrap_err();
        assert!(err.to_string().contains("requires 'model'"), "{err}");
    }

    #[test]
    fn rejects_zero_timeout() {
        let yaml = VALID.replace("timeout_ms: 60000", "timeout_ms: 0");
        let err = parse_collectors(&yaml).unwrap_err();
        assert!(err.to_string().contains("timeout_ms 0"), "{err}");
    }

    #[test]
    fn rejects_duplicate_collector_names_case_insensitively() {
        let yaml = format!(
            "{VALID}  - name: ChatGPT\n    chain: []\n"
        );
        let err = parse_collectors(&yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate collector"), "{err}");
    }

    #[test]
    fn unparseable_yaml_is_a_parse_error() {
        let err = parse_collectors("providers: [").unwrap_err();
        assert!(matches!(err, ConfigError::CollectorsFileParse(_)));
    }
}
