use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::CollectionStatus;
use crate::CoreError;

/// Country sent to location-sensitive providers when the caller omits one.
pub const DEFAULT_COUNTRY: &str = "US";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryIntent {
    Informational,
    Navigational,
    Commercial,
    Transactional,
    Comparison,
}

impl QueryIntent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QueryIntent::Informational => "informational",
            QueryIntent::Navigational => "navigational",
            QueryIntent::Commercial => "commercial",
            QueryIntent::Transactional => "transactional",
            QueryIntent::Comparison => "comparison",
        }
    }
}

impl FromStr for QueryIntent {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "informational" => Ok(QueryIntent::Informational),
            "navigational" => Ok(QueryIntent::Navigational),
            "commercial" => Ok(QueryIntent::Commercial),
            "transactional" => Ok(QueryIntent::Transactional),
            "comparison" => Ok(QueryIntent::Comparison),
            other => Err(CoreError::UnknownIntent(other.to_string())),
        }
    }
}

/// One inbound query to fan out across logical collectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryExecutionRequest {
    pub query_id: Uuid,
    pub brand_id: Uuid,
    pub customer_id: Uuid,
    pub query_text: String,
    pub intent: QueryIntent,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default)]
    pub country: Option<String>,
    pub collectors: Vec<String>,
}

fn default_locale() -> String {
    "en-US".to_string()
}

impl QueryExecutionRequest {
    /// Country to send upstream, falling back to [`DEFAULT_COUNTRY`].
    #[must_use]
    pub fn effective_country(&self) -> &str {
        self.country
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_COUNTRY)
    }
}

/// Outcome of one (query, collector) pair, returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryExecutionResult {
    pub query_id: Uuid,
    pub collector_type: String,
    pub status: CollectionStatus,
    pub response: Option<String>,
    pub citations: Vec<String>,
    pub urls: Vec<String>,
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// `collector_results.id` of the persisted row, if persistence succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_id: Option<i64>,
    /// Adapter that produced the answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(country: Option<&str>) -> QueryExecutionRequest {
        QueryExecutionRequest {
            query_id: Uuid::new_v4(),
            brand_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            query_text: "best running shoes".to_string(),
            intent: QueryIntent::Commercial,
            topic: None,
            locale: "en-US".to_string(),
            country: country.map(ToString::to_string),
            collectors: vec!["chatgpt".to_string()],
        }
    }

    #[test]
    fn effective_country_defaults_to_us() {
        assert_eq!(request(None).effective_country(), "US");
        assert_eq!(request(Some("  ")).effective_country(), "US");
        assert_eq!(request(Some("DE")).effective_country(), "DE");
    }

    #[test]
    fn request_deserializes_from_camel_case_json() {
        let json = serde_json::json!({
            "queryId": "7d3c1f0e-2a55-4f43-9d6a-0b1f0c2f6d11",
            "brandId": "1c7a3b52-5a9f-4d8e-a0ef-3b7b9c1e2d40",
            "customerId": "a2f6e1d4-8b3c-4f5a-9e7d-6c5b4a3f2e10",
            "queryText": "which CRM is best for startups?",
            "intent": "comparison",
            "collectors": ["chatgpt", "perplexity"]
        });
        let req: QueryExecutionRequest = serde_json::from_value(json).expect("valid request");
        assert_eq!(req.intent, QueryIntent::Comparison);
        assert_eq!(req.locale, "en-US");
        assert!(req.country.is_none());
        assert_eq!(req.collectors.len(), 2);
    }

    #[test]
    fn intent_parse_rejects_unknown() {
        assert!("shopping".parse::<QueryIntent>().is_err());
        assert_eq!(
            "navigational".parse::<QueryIntent>().unwrap(),
            QueryIntent::Navigational
        );
    }
}
