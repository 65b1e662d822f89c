//! Lexicon scorer for how answer-engines talk about brands and products.

/// Word weights.
///
/// Keys are lowercase single words. Values in `(0.0, 1.0]` are positive,
/// in `[-1.0, 0.0)` are negative. The final score is clamped to `[-1.0, 1.0]`.
pub(crate) const LEXICON: &[(&str, f32)] = &[
    // Positive signals
    ("best", 0.5),
    ("excellent", 0.5),
    ("great", 0.4),
    ("good", 0.3),
    ("top", 0.3),
    ("leading", 0.3),
    ("popular", 0.3),
    ("recommend", 0.4),
    ("recommended", 0.4),
    ("reliable", 0.4),
    ("trusted", 0.4),
    ("durable", 0.3),
    ("comfortable", 0.3),
    ("affordable", 0.3),
    ("free", 0.2),
    ("fast", 0.2),
    ("easy", 0.2),
    ("innovative", 0.3),
    ("quality", 0.3),
    ("favorite", 0.4),
    ("love", 0.5),
    ("standout", 0.4),
    // Negative signals
    ("worst", -0.6),
    ("bad", -0.4),
    ("poor", -0.4),
    ("terrible", -0.6),
    ("expensive", -0.3),
    ("pricier", -0.3),
    ("overpriced", -0.5),
    ("slow", -0.3),
    ("unreliable", -0.5),
    ("complaints", -0.4),
    ("complaint", -0.4),
    ("issues", -0.3),
    ("problem", -0.3),
    ("problems", -0.3),
    ("recall", -0.7),
    ("lawsuit", -0.5),
    ("avoid", -0.5),
    ("lacks", -0.3),
    ("limited", -0.2),
    ("outdated", -0.4),
    ("disappointing", -0.5),
];

/// Score a text string using the lexicon.
///
/// Splits text into lowercase words, sums matching weights, and clamps
/// the result to `[-1.0, 1.0]`. Returns `0.0` for empty or unknown text.
#[must_use]
pub fn lexicon_score(text: &str) -> f32 {
    let mut score = 0.0_f32;
    for word in text.split_whitespace() {
        let w = word
            .trim_matches(|c: char| !c.is_alphabetic())
            .to_lowercase();
        for &(lex_word, weight) in LEXICON {
            if w == lex_word {
                score += weight;
                break;
            }
        }
    }
    score.clamp(-1.0, 1.0)
}

/// Split an answer into trimmed sentences.
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace, or at a line
/// break. Markdown bullets and headings are treated as their own sentences.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    for line in text.lines() {
        let mut current = String::new();
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            current.push(c);
            let at_boundary = matches!(c, '.' | '!' | '?')
                && chars.peek().map_or(true, |next| next.is_whitespace());
            if at_boundary {
                push_sentence(&mut sentences, &current);
                current.clear();
            }
        }
        push_sentence(&mut sentences, &current);
    }
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, raw: &str) {
    let trimmed = raw
        .trim()
        .trim_start_matches(|c: char| matches!(c, '-' | '*' | '#' | '>'))
        .trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_returns_zero() {
        assert_eq!(lexicon_score(""), 0.0);
    }

    #[test]
    fn unknown_text_returns_zero() {
        assert_eq!(lexicon_score("the quick brown fox"), 0.0);
    }

    #[test]
    fn positive_keyword_returns_positive() {
        let score = lexicon_score("BrandX offers free shipping and great support");
        assert!(score > 0.0, "expected positive score, got {score}");
    }

    #[test]
    fn negative_keyword_returns_negative() {
        let score = lexicon_score("CompetitorY is pricier.");
        assert!(score < 0.0, "expected negative score, got {score}");
    }

    #[test]
    fn score_clamps_to_both_bounds() {
        let text = "best excellent great recommend reliable trusted love favorite";
        assert_eq!(lexicon_score(text), 1.0);
        let text = "worst terrible overpriced recall lawsuit avoid disappointing";
        assert_eq!(lexicon_score(text), -1.0);
    }

    #[test]
    fn punctuation_stripped_from_words() {
        let score = lexicon_score("reliable!");
        assert!(score > 0.0, "expected positive score for 'reliable!', got {score}");
    }

    #[test]
    fn sentences_split_on_terminators_and_lines() {
        let text = "BrandX offers free shipping. CompetitorY is pricier.\n- v2.5 is out!\n\n## Summary";
        assert_eq!(
            split_sentences(text),
            vec![
                "BrandX offers free shipping.",
                "CompetitorY is pricier.",
                "v2.5 is out!",
                "Summary",
            ]
        );
    }
}
