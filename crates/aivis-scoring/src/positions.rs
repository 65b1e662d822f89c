//! Stage 2: where, and how often, each entity appears in an answer.
//!
//! Offsets are character offsets into the raw answer. Matching is
//! case-insensitive and word-boundary aware, so `Nike` matches `Nike's` but
//! not `Nikeware`.

use rust_decimal::Decimal;
use uuid::Uuid;

use aivis_db::PositionMetrics;

use crate::context::BrandContext;

/// Character offsets of every word-boundary occurrence of `name` in `text`.
#[must_use]
pub fn find_mentions(text: &str, name: &str) -> Vec<usize> {
    let needle: Vec<char> = name.trim().chars().map(fold_case).collect();
    if needle.is_empty() {
        return Vec::new();
    }
    let haystack: Vec<char> = text.chars().map(fold_case).collect();

    let mut offsets = Vec::new();
    let mut i = 0;
    while i + needle.len() <= haystack.len() {
        let end = i + needle.len();
        if haystack[i..end] == needle[..]
            && (i == 0 || !haystack[i - 1].is_alphanumeric())
            && (end == haystack.len() || !haystack[end].is_alphanumeric())
        {
            offsets.push(i);
            i = end;
        } else {
            i += 1;
        }
    }
    offsets
}

fn fold_case(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Position metrics for the brand and every competitor of one answer.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSet {
    pub brand: PositionMetrics,
    /// One entry per competitor in the brand context, in context order.
    pub competitors: Vec<CompetitorPositions>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompetitorPositions {
    pub competitor_id: Uuid,
    pub name: String,
    pub metrics: PositionMetrics,
}

/// Computes metrics for the brand and each competitor.
///
/// Visibility is `100 × (1 − first_offset / answer_chars)`, so an entity named
/// in the first character scores 100 and an absent one 0. Share of answers
/// is the entity's mentions over all tracked mentions, as a percentage.
#[must_use]
pub fn compute_positions(answer: &str, context: &BrandContext) -> PositionSet {
    let answer_chars = answer.chars().count();
    let word_count = i32::try_from(answer.split_whitespace().count()).unwrap_or(i32::MAX);

    let brand_offsets = find_mentions(answer, &context.brand_name);
    let competitor_offsets: Vec<Vec<usize>> = context
        .competitors
        .iter()
        .map(|c| find_mentions(answer, &c.name))
        .collect();

    let total_mentions =
        brand_offsets.len() + competitor_offsets.iter().map(Vec::len).sum::<usize>();

    let brand = metrics(&brand_offsets, total_mentions, answer_chars, word_count);
    let competitors = context
        .competitors
        .iter()
        .zip(&competitor_offsets)
        .map(|(competitor, offsets)| CompetitorPositions {
            competitor_id: competitor.id,
            name: competitor.name.clone(),
            metrics: metrics(offsets, total_mentions, answer_chars, word_count),
        })
        .collect();

    PositionSet { brand, competitors }
}

fn metrics(
    offsets: &[usize],
    total_mentions: usize,
    answer_chars: usize,
    answer_word_count: i32,
) -> PositionMetrics {
    let first = offsets.first().copied();

    let visibility_score = match first {
        Some(offset) if answer_chars > 0 => {
            let ratio = Decimal::from(offset) / Decimal::from(answer_chars);
            (Decimal::ONE_HUNDRED * (Decimal::ONE - ratio)).round_dp(2)
        }
        _ => Decimal::ZERO,
    };
    let share_of_answers = if total_mentions == 0 {
        Decimal::ZERO
    } else {
        (Decimal::from(offsets.len()) * Decimal::ONE_HUNDRED / Decimal::from(total_mentions))
            .round_dp(2)
    };

    PositionMetrics {
        visibility_score,
        share_of_answers,
        has_presence: !offsets.is_empty(),
        first_mention_offset: first.map(to_i32),
        mention_offsets: offsets.iter().copied().map(to_i32).collect(),
        mentions: to_i32(offsets.len()),
        answer_word_count,
    }
}

fn to_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CompetitorRef;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn context(brand: &str, competitors: &[&str]) -> BrandContext {
        BrandContext::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            brand,
            competitors
                .iter()
                .map(|name| CompetitorRef {
                    id: Uuid::new_v4(),
                    name: (*name).to_owned(),
                })
                .collect(),
        )
    }

    #[test]
    fn word_boundary_excludes_compound_words() {
        assert_eq!(find_mentions("Nike's Nikeware is great", "Nike"), vec![0]);
    }

    #[test]
    fn matching_is_case_insensitive_with_char_offsets() {
        let text = "Ünïcode first: nike, then NIKE.";
        assert_eq!(find_mentions(text, "Nike"), vec![15, 26]);
    }

    #[test]
    fn multi_word_names_match() {
        let text = "Try New Balance or new balance 990.";
        assert_eq!(find_mentions(text, "New Balance"), vec![4, 19]);
        assert!(find_mentions(text, "  ").is_empty());
    }

    #[test]
    fn metrics_for_brand_and_competitors() {
        let ctx = context("BrandX", &["CompetitorY", "CompetitorZ"]);
        let answer = "BrandX offers free shipping. CompetitorY is pricier.";
        let set = compute_positions(answer, &ctx);

        assert!(set.brand.has_presence);
        assert_eq!(set.brand.first_mention_offset, Some(0));
        assert_eq!(set.brand.visibility_score, dec("100"));
        assert_eq!(set.brand.share_of_answers, dec("50"));
        assert_eq!(set.brand.answer_word_count, 7);

        assert_eq!(set.competitors.len(), 2);
        let y = &set.competitors[0];
        assert_eq!(y.name, "CompetitorY");
        assert_eq!(y.metrics.mentions, 1);
        assert_eq!(y.metrics.first_mention_offset, Some(29));
        // 100 × (1 − 29/52)
        assert_eq!(y.metrics.visibility_score, dec("44.23"));

        let z = &set.competitors[1];
        assert!(!z.metrics.has_presence);
        assert_eq!(z.metrics.mentions, 0);
        assert_eq!(z.metrics.visibility_score, Decimal::ZERO);
        assert_eq!(z.metrics.share_of_answers, Decimal::ZERO);
        assert!(z.metrics.mention_offsets.is_empty());
    }

    #[test]
    fn empty_answer_scores_zero_everywhere() {
        let set = compute_positions("", &context("BrandX", &["Y"]));
        assert!(!set.brand.has_presence);
        assert_eq!(set.brand.share_of_answers, Decimal::ZERO);
        assert_eq!(set.brand.answer_word_count, 0);
    }
}
