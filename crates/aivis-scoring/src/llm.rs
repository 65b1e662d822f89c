//! Extraction engine backed by an OpenAI-compatible chat-completions API.
//!
//! The model is asked for one strict JSON object. Competitors are reported
//! by name and mapped back to ids through the [`BrandContext`]; names the
//! context does not know are dropped. Labels are always re-derived from the
//! numeric score.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::analysis::{
    CompetitorSentiment, ConsolidatedAnalysis, EntitySentiment, ExtractionEngine, ProductMention,
    SentimentSet,
};
use crate::context::BrandContext;
use crate::error::ScoringError;

#[derive(Debug, Clone)]
pub struct LlmEngineConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

pub struct LlmEngine {
    client: Client,
    config: LlmEngineConfig,
}

impl LlmEngine {
    pub const NAME: &'static str = "llm";

    /// # Errors
    ///
    /// Returns [`ScoringError::Config`] if the HTTP client cannot be built.
    pub fn new(config: LlmEngineConfig) -> Result<Self, ScoringError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ScoringError::Config(format!("failed to build LLM client: {e}")))?;
        Ok(Self { client, config })
    }
}

const SYSTEM_PROMPT: &str = "You analyze answers produced by AI assistants for brand monitoring. \
Reply with a single JSON object and nothing else, shaped as: \
{\"products\": [{\"entity\": string, \"product\": string}], \
\"sentiments\": {\"brand\": {\"score\": number, \"positive_sentences\": [string], \"negative_sentences\": [string]}, \
\"competitors\": [{\"name\": string, \"score\": number, \"positive_sentences\": [string], \"negative_sentences\": [string]}]}}. \
Scores range from -1 (very negative) to 1 (very positive). Only include competitors the answer mentions. \
Quote sentences verbatim from the answer.";

#[derive(Debug, Deserialize)]
struct RawOutput {
    #[serde(default)]
    products: Vec<RawProduct>,
    sentiments: RawSentiments,
}

#[derive(Debug, Deserialize)]
struct RawProduct {
    entity: String,
    product: String,
}

#[derive(Debug, Deserialize)]
struct RawSentiments {
    brand: RawEntity,
    #[serde(default)]
    competitors: Vec<RawCompetitor>,
}

#[derive(Debug, Deserialize)]
struct RawEntity {
    score: f32,
    #[serde(default)]
    positive_sentences: Vec<String>,
    #[serde(default)]
    negative_sentences: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawCompetitor {
    name: String,
    #[serde(flatten)]
    sentiment: RawEntity,
}

#[async_trait]
impl ExtractionEngine for LlmEngine {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn analyze(
        &self,
        answer: &str,
        context: &BrandContext,
    ) -> Result<ConsolidatedAnalysis, ScoringError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let user = json!({
            "brand": context.brand_name,
            "competitors": context.competitor_names(),
            "answer": answer,
        });
        let body = json!({
            "model": self.config.model,
            "temperature": 0,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user.to_string() },
            ],
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScoringError::Extraction(format!(
                "LLM returned HTTP {}",
                status.as_u16()
            )));
        }
        let payload: Value = response.json().await?;

        let content = payload
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ScoringError::MalformedModelOutput("response has no message content".to_owned())
            })?;

        parse_model_output(content, context)
    }
}

/// Converts the model's JSON reply into an analysis for `context`.
///
/// # Errors
///
/// Returns [`ScoringError::MalformedModelOutput`] if the reply is not the
/// requested JSON shape or carries a non-finite score.
pub fn parse_model_output(
    content: &str,
    context: &BrandContext,
) -> Result<ConsolidatedAnalysis, ScoringError> {
    let raw: RawOutput = serde_json::from_str(strip_code_fence(content))?;

    let brand = entity(raw.sentiments.brand)?;
    let mut competitors = Vec::new();
    for reported in raw.sentiments.competitors {
        let Some(known) = context.competitor_by_name(&reported.name) else {
            tracing::warn!(name = %reported.name, "model reported an unknown competitor; dropping");
            continue;
        };
        if competitors
            .iter()
            .any(|c: &CompetitorSentiment| c.competitor_id == known.id)
        {
            continue;
        }
        competitors.push(CompetitorSentiment {
            competitor_id: known.id,
            name: known.name.clone(),
            sentiment: entity(reported.sentiment)?,
        });
    }

    let products = raw
        .products
        .into_iter()
        .filter_map(|p| {
            if p.entity.trim().eq_ignore_ascii_case(context.brand_name.trim()) {
                Some(ProductMention {
                    entity: context.brand_name.clone(),
                    competitor_id: None,
                    product: p.product,
                })
            } else {
                context
                    .competitor_by_name(&p.entity)
                    .map(|c| ProductMention {
                        entity: c.name.clone(),
                        competitor_id: Some(c.id),
                        product: p.product,
                    })
            }
        })
        .collect();

    Ok(ConsolidatedAnalysis {
        engine: LlmEngine::NAME.to_owned(),
        products,
        sentiments: SentimentSet { brand, competitors },
    })
}

fn entity(raw: RawEntity) -> Result<EntitySentiment, ScoringError> {
    if !raw.score.is_finite() {
        return Err(ScoringError::MalformedModelOutput(
            "sentiment score is not a finite number".to_owned(),
        ));
    }
    Ok(EntitySentiment::from_score(
        raw.score,
        raw.positive_sentences,
        raw.negative_sentences,
    ))
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map_or(trimmed, str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CompetitorRef;
    use aivis_core::SentimentLabel;
    use uuid::Uuid;

    fn context() -> BrandContext {
        BrandContext::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Nike",
            vec![CompetitorRef {
                id: Uuid::new_v4(),
                name: "Adidas".to_owned(),
            }],
        )
    }

    #[test]
    fn maps_competitor_names_to_ids_and_relabels() {
        let ctx = context();
        let content = r#"```json
        {"products": [{"entity": "nike", "product": "Pegasus"}, {"entity": "Puma", "product": "Velocity"}],
         "sentiments": {
            "brand": {"score": 0.6, "label": "negative", "positive_sentences": ["Nike is great."]},
            "competitors": [
                {"name": "ADIDAS", "score": -0.5},
                {"name": "Puma", "score": 0.9}
            ]}}
        ```"#;

        let analysis = parse_model_output(content, &ctx).unwrap();
        assert_eq!(analysis.engine, "llm");
        assert_eq!(analysis.sentiments.brand.label, SentimentLabel::Positive);
        assert_eq!(analysis.sentiments.competitors.len(), 1);
        assert_eq!(analysis.sentiments.competitors[0].competitor_id, ctx.competitors[0].id);
        assert_eq!(analysis.sentiments.competitors[0].name, "Adidas");
        assert_eq!(analysis.products.len(), 1);
        assert_eq!(analysis.products[0].entity, "Nike");
    }

    #[test]
    fn missing_brand_sentiment_is_malformed() {
        let err = parse_model_output(r#"{"products": []}"#, &context()).unwrap_err();
        assert!(matches!(err, ScoringError::MalformedModelOutput(_)), "{err}");
    }

    #[test]
    fn prose_reply_is_malformed() {
        let err = parse_model_output("Sure! Here is the analysis.", &context()).unwrap_err();
        assert!(matches!(err, ScoringError::MalformedModelOutput(_)));
    }
}
