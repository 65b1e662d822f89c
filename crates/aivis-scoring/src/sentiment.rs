//! Stage 3: turning the stage-1 sentiment verdicts into storable rows.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

use aivis_core::SentimentLabel;

use crate::analysis::{EntitySentiment, SentimentSet};
use crate::context::BrandContext;

/// One sentiment row. `competitor_id` is `None` for the brand.
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentRecord {
    pub competitor_id: Option<Uuid>,
    pub label: SentimentLabel,
    pub score: Decimal,
    pub positive_sentences: Vec<String>,
    pub negative_sentences: Vec<String>,
}

const SCORE_SCALE: u32 = 3;

fn record(competitor_id: Option<Uuid>, sentiment: &EntitySentiment) -> SentimentRecord {
    let score = Decimal::from_f32(sentiment.score)
        .unwrap_or(Decimal::ZERO)
        .round_dp(SCORE_SCALE);
    SentimentRecord {
        competitor_id,
        // Re-derived so a stored label can never disagree with its score.
        label: SentimentLabel::from_score(sentiment.score),
        score,
        positive_sentences: sentiment.positive_sentences.clone(),
        negative_sentences: sentiment.negative_sentences.clone(),
    }
}

/// Rows to persist for one analysis: the brand first, then each competitor
/// that has sentiment data and is still in the brand's competitor set.
#[must_use]
pub fn sentiment_records(set: &SentimentSet, context: &BrandContext) -> Vec<SentimentRecord> {
    let mut records = vec![record(None, &set.brand)];
    for competitor in &set.competitors {
        if context.competitor(competitor.competitor_id).is_none() {
            tracing::debug!(
                competitor_id = %competitor.competitor_id,
                "competitor no longer active; skipping sentiment"
            );
            continue;
        }
        records.push(record(Some(competitor.competitor_id), &competitor.sentiment));
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::CompetitorSentiment;
    use crate::context::CompetitorRef;

    #[test]
    fn brand_first_and_inactive_competitors_dropped() {
        let active = Uuid::new_v4();
        let ctx = BrandContext::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "BrandX",
            vec![CompetitorRef {
                id: active,
                name: "CompetitorY".to_owned(),
            }],
        );
        let set = SentimentSet {
            brand: EntitySentiment::from_score(0.33333, vec!["good".to_owned()], vec![]),
            competitors: vec![
                CompetitorSentiment {
                    competitor_id: active,
                    name: "CompetitorY".to_owned(),
                    sentiment: EntitySentiment::from_score(-0.3, vec![], vec![]),
                },
                CompetitorSentiment {
                    competitor_id: Uuid::new_v4(),
                    name: "Gone".to_owned(),
                    sentiment: EntitySentiment::neutral(),
                },
            ],
        };

        let records = sentiment_records(&set, &ctx);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].competitor_id, None);
        assert_eq!(records[0].label, SentimentLabel::Positive);
        assert_eq!(records[0].score, "0.333".parse::<Decimal>().unwrap());
        assert_eq!(records[0].positive_sentences, vec!["good"]);
        assert_eq!(records[1].competitor_id, Some(active));
        assert_eq!(records[1].label, SentimentLabel::Negative);
    }
}
