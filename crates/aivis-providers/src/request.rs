use aivis_core::DEFAULT_COUNTRY;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What every adapter receives, independent of vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub prompt: String,
    pub country: String,
    pub locale: String,
    /// Vendor-specific knobs passed through untouched.
    #[serde(default)]
    pub extra_options: Map<String, Value>,
}

impl ProviderRequest {
    /// Builds a request, defaulting a missing or blank country to `US`.
    #[must_use]
    pub fn new(prompt: impl Into<String>, country: Option<&str>, locale: impl Into<String>) -> Self {
        let country = country
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_COUNTRY)
            .to_owned();
        Self {
            prompt: prompt.into(),
            country,
            locale: locale.into(),
            extra_options: Map::new(),
        }
    }
}

/// Answer text with the citations and URLs extracted from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedAnswer {
    pub text: String,
    pub citations: Vec<String>,
    pub urls: Vec<String>,
}

/// A successful adapter call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub answer: ParsedAnswer,
    /// Vendor snapshot id for asynchronous providers.
    pub snapshot_id: Option<String>,
    /// Vendor-specific details persisted as `provider_metadata`.
    pub metadata: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_country_defaults_to_us() {
        assert_eq!(ProviderRequest::new("q", None, "en-US").country, "US");
        assert_eq!(ProviderRequest::new("q", Some(" "), "en-US").country, "US");
        assert_eq!(ProviderRequest::new("q", Some("GB"), "en-GB").country, "GB");
    }
}
