//! Stage 1: consolidated analysis of one answer.
//!
//! A single pass over the answer extracts the products mentioned for the
//! brand and each competitor, plus a sentiment verdict per entity. The
//! result is stored once per collector result and every later stage reads
//! from it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use aivis_core::SentimentLabel;

use crate::context::BrandContext;
use crate::error::ScoringError;
use crate::positions::find_mentions;
use crate::scorer::{lexicon_score, split_sentences};

/// A product named alongside an entity. `competitor_id` is `None` for the brand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMention {
    pub entity: String,
    #[serde(default)]
    pub competitor_id: Option<Uuid>,
    pub product: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySentiment {
    pub label: SentimentLabel,
    /// In `[-1.0, 1.0]`.
    pub score: f32,
    #[serde(default)]
    pub positive_sentences: Vec<String>,
    #[serde(default)]
    pub negative_sentences: Vec<String>,
}

impl EntitySentiment {
    #[must_use]
    pub fn neutral() -> Self {
        Self {
            label: SentimentLabel::Neutral,
            score: 0.0,
            positive_sentences: Vec::new(),
            negative_sentences: Vec::new(),
        }
    }

    /// Builds a sentiment from a raw score, clamping it and deriving the label.
    #[must_use]
    pub fn from_score(score: f32, positive: Vec<String>, negative: Vec<String>) -> Self {
        let score = score.clamp(-1.0, 1.0);
        Self {
            label: SentimentLabel::from_score(score),
            score,
            positive_sentences: positive,
            negative_sentences: negative,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorSentiment {
    pub competitor_id: Uuid,
    pub name: String,
    #[serde(flatten)]
    pub sentiment: EntitySentiment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentSet {
    pub brand: EntitySentiment,
    /// Only competitors the engine had something to say about.
    #[serde(default)]
    pub competitors: Vec<CompetitorSentiment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidatedAnalysis {
    /// Name of the engine that produced this analysis.
    pub engine: String,
    pub products: Vec<ProductMention>,
    pub sentiments: SentimentSet,
}

#[async_trait]
pub trait ExtractionEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Analyzes one raw answer for the brand and its competitors.
    async fn analyze(
        &self,
        answer: &str,
        context: &BrandContext,
    ) -> Result<ConsolidatedAnalysis, ScoringError>;
}

// ---------------------------------------------------------------------------
// Lexicon engine
// ---------------------------------------------------------------------------

/// Deterministic engine built on the word lexicon.
///
/// Sentiment is the mean lexicon score of the sentences that mention the
/// entity. Products are the capitalized words that directly follow a
/// mention, e.g. `Pegasus 41` in `Nike Pegasus 41`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexiconEngine;

impl LexiconEngine {
    pub const NAME: &'static str = "lexicon";
}

#[async_trait]
impl ExtractionEngine for LexiconEngine {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn analyze(
        &self,
        answer: &str,
        context: &BrandContext,
    ) -> Result<ConsolidatedAnalysis, ScoringError> {
        let sentences = split_sentences(answer);

        let brand = entity_sentiment(&sentences, &context.brand_name)
            .unwrap_or_else(EntitySentiment::neutral);
        let competitors = context
            .competitors
            .iter()
            .filter_map(|c| {
                entity_sentiment(&sentences, &c.name).map(|sentiment| CompetitorSentiment {
                    competitor_id: c.id,
                    name: c.name.clone(),
                    sentiment,
                })
            })
            .collect();

        let mut products: Vec<ProductMention> = products_after(answer, &context.brand_name)
            .into_iter()
            .map(|product| ProductMention {
                entity: context.brand_name.clone(),
                competitor_id: None,
                product,
            })
            .collect();
        for competitor in &context.competitors {
            products.extend(products_after(answer, &competitor.name).into_iter().map(
                |product| ProductMention {
                    entity: competitor.name.clone(),
                    competitor_id: Some(competitor.id),
                    product,
                },
            ));
        }

        Ok(ConsolidatedAnalysis {
            engine: Self::NAME.to_owned(),
            products,
            sentiments: SentimentSet { brand, competitors },
        })
    }
}

/// `None` when no sentence mentions `name`.
fn entity_sentiment(sentences: &[String], name: &str) -> Option<EntitySentiment> {
    let mut scores = Vec::new();
    let mut positive = Vec::new();
    let mut negative = Vec::new();

    for sentence in sentences {
        if find_mentions(sentence, name).is_empty() {
            continue;
        }
        let score = lexicon_score(sentence);
        if score > SentimentLabel::THRESHOLD {
            positive.push(sentence.clone());
        } else if score < -SentimentLabel::THRESHOLD {
            negative.push(sentence.clone());
        }
        scores.push(score);
    }

    if scores.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = scores.iter().sum::<f32>() / scores.len() as f32;
    Some(EntitySentiment::from_score(mean, positive, negative))
}

const MAX_PRODUCT_WORDS: usize = 3;

fn products_after(text: &str, name: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let name_len = name.trim().chars().count();
    let mut products: Vec<String> = Vec::new();

    for offset in find_mentions(text, name) {
        let rest: String = chars[offset + name_len..].iter().collect();
        let mut words: Vec<&str> = Vec::new();
        for raw in rest.split_whitespace().take(MAX_PRODUCT_WORDS) {
            let word = raw.trim_matches(|c: char| !c.is_alphanumeric());
            let starts_product = word
                .chars()
                .next()
                .is_some_and(|c| c.is_uppercase() || c.is_ascii_digit());
            if raw.starts_with(|c: char| !c.is_alphanumeric()) || !starts_product {
                break;
            }
            words.push(word);
            if raw.ends_with(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | ')')) {
                break;
            }
        }
        if words.is_empty() {
            continue;
        }
        let product = words.join(" ");
        if !products.contains(&product) {
            products.push(product);
        }
    }
    products
}
