//! Citation categorization by domain.
//!
//! Categories are domain-scoped: the host is lower-cased and a leading
//! `www.` is dropped, so every URL on one domain shares a category. A
//! [`CategoryCache`] is consulted before the [`DomainClassifier`], and new
//! verdicts are written back to it.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use reqwest::Url;
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::error::ScoringError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CitationCategory {
    Editorial,
    Ugc,
    Reference,
    Social,
    Marketplace,
    Corporate,
    Other,
}

impl CitationCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CitationCategory::Editorial => "editorial",
            CitationCategory::Ugc => "ugc",
            CitationCategory::Reference => "reference",
            CitationCategory::Social => "social",
            CitationCategory::Marketplace => "marketplace",
            CitationCategory::Corporate => "corporate",
            CitationCategory::Other => "other",
        }
    }
}

impl fmt::Display for CitationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CitationCategory {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "editorial" => Ok(CitationCategory::Editorial),
            "ugc" => Ok(CitationCategory::Ugc),
            "reference" => Ok(CitationCategory::Reference),
            "social" => Ok(CitationCategory::Social),
            "marketplace" => Ok(CitationCategory::Marketplace),
            "corporate" => Ok(CitationCategory::Corporate),
            "other" => Ok(CitationCategory::Other),
            other => Err(ScoringError::Config(format!(
                "unknown citation category: {other}"
            ))),
        }
    }
}

/// Normalized domain of an `http(s)` URL.
#[must_use]
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    (!host.is_empty()).then(|| host.to_owned())
}

// ---------------------------------------------------------------------------
// Classifiers
// ---------------------------------------------------------------------------

#[async_trait]
pub trait DomainClassifier: Send + Sync {
    /// Stored alongside cached verdicts as `classified_by`.
    fn name(&self) -> &str;

    /// `entity_names` are the brand and competitor names in scope, used to
    /// spot corporate sites.
    async fn classify(
        &self,
        domain: &str,
        entity_names: &[&str],
    ) -> Result<CitationCategory, ScoringError>;
}

const SOCIAL: &[&str] = &[
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "x.com",
    "tiktok.com",
    "linkedin.com",
    "youtube.com",
    "pinterest.com",
    "threads.net",
];
const UGC: &[&str] = &[
    "reddit.com",
    "quora.com",
    "stackexchange.com",
    "stackoverflow.com",
    "medium.com",
    "substack.com",
    "tripadvisor.com",
    "trustpilot.com",
    "g2.com",
    "capterra.com",
];
const MARKETPLACE: &[&str] = &[
    "amazon.com",
    "amazon.co.uk",
    "amazon.de",
    "ebay.com",
    "etsy.com",
    "walmart.com",
    "target.com",
    "bestbuy.com",
    "aliexpress.com",
    "zalando.com",
];
const REFERENCE: &[&str] = &[
    "wikipedia.org",
    "wikimedia.org",
    "britannica.com",
    "investopedia.com",
    "nih.gov",
];
const EDITORIAL: &[&str] = &[
    "nytimes.com",
    "theguardian.com",
    "bbc.co.uk",
    "bbc.com",
    "forbes.com",
    "wired.com",
    "theverge.com",
    "techradar.com",
    "cnet.com",
    "runnersworld.com",
    "wirecutter.com",
    "businessinsider.com",
    "reuters.com",
];
const EDITORIAL_HINTS: &[&str] = &["news", "magazine", "review", "reviews", "times", "journal"];

fn matches_domain(domain: &str, list: &[&str]) -> bool {
    list.iter()
        .any(|d| domain == *d || domain.ends_with(&format!(".{d}")))
}

/// Rule-based classifier over well-known domains.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    #[must_use]
    pub fn classify_domain(domain: &str, entity_names: &[&str]) -> CitationCategory {
        let domain = domain.to_ascii_lowercase();
        if matches_domain(&domain, SOCIAL) {
            return CitationCategory::Social;
        }
        if matches_domain(&domain, UGC) {
            return CitationCategory::Ugc;
        }
        if matches_domain(&domain, MARKETPLACE) {
            return CitationCategory::Marketplace;
        }
        if matches_domain(&domain, REFERENCE)
            || domain.ends_with(".gov")
            || domain.ends_with(".edu")
        {
            return CitationCategory::Reference;
        }
        if matches_domain(&domain, EDITORIAL) {
            return CitationCategory::Editorial;
        }

        let labels: Vec<&str> = domain.split('.').collect();
        let registrable = if labels.len() >= 2 {
            labels[labels.len() - 2]
        } else {
            domain.as_str()
        };
        let is_corporate = entity_names.iter().any(|name| {
            let squashed: String = name
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .collect::<String>()
                .to_ascii_lowercase();
            !squashed.is_empty() && registrable.replace('-', "") == squashed
        });
        if is_corporate {
            return CitationCategory::Corporate;
        }
        if EDITORIAL_HINTS.iter().any(|hint| registrable.contains(hint)) {
            return CitationCategory::Editorial;
        }
        CitationCategory::Other
    }
}

#[async_trait]
impl DomainClassifier for HeuristicClassifier {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn classify(
        &self,
        domain: &str,
        entity_names: &[&str],
    ) -> Result<CitationCategory, ScoringError> {
        Ok(Self::classify_domain(domain, entity_names))
    }
}

// ---------------------------------------------------------------------------
// Caches
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CategoryCache: Send + Sync {
    async fn get(&self, domain: &str) -> Result<Option<CitationCategory>, ScoringError>;

    async fn put(
        &self,
        domain: &str,
        category: CitationCategory,
        classified_by: &str,
    ) -> Result<(), ScoringError>;
}

#[derive(Default)]
pub struct MemoryCategoryCache {
    entries: RwLock<HashMap<String, CitationCategory>>,
}

impl MemoryCategoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl CategoryCache for MemoryCategoryCache {
    async fn get(&self, domain: &str) -> Result<Option<CitationCategory>, ScoringError> {
        Ok(self.entries.read().await.get(domain).copied())
    }

    async fn put(
        &self,
        domain: &str,
        category: CitationCategory,
        _classified_by: &str,
    ) -> Result<(), ScoringError> {
        self.entries
            .write()
            .await
            .insert(domain.to_owned(), category);
        Ok(())
    }
}

/// Cache backed by the `citation_categories` table.
pub struct PgCategoryCache {
    pool: PgPool,
}

impl PgCategoryCache {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryCache for PgCategoryCache {
    async fn get(&self, domain: &str) -> Result<Option<CitationCategory>, ScoringError> {
        aivis_db::get_citation_category(&self.pool, domain)
            .await?
            .map(|row| row.category.parse())
            .transpose()
    }

    async fn put(
        &self,
        domain: &str,
        category: CitationCategory,
        classified_by: &str,
    ) -> Result<(), ScoringError> {
        aivis_db::upsert_citation_category(&self.pool, domain, category.as_str(), classified_by)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Categorizer
// ---------------------------------------------------------------------------

pub struct CitationCategorizer<C, K> {
    cache: C,
    classifier: K,
}

impl<C: CategoryCache, K: DomainClassifier> CitationCategorizer<C, K> {
    #[must_use]
    pub fn new(cache: C, classifier: K) -> Self {
        Self { cache, classifier }
    }

    /// Category of the URL's domain, or `None` for non-`http(s)` URLs.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError`] if the cache or the classifier fails.
    pub async fn categorize(
        &self,
        url: &str,
        entity_names: &[&str],
    ) -> Result<Option<(String, CitationCategory)>, ScoringError> {
        let Some(domain) = domain_of(url) else {
            return Ok(None);
        };
        if let Some(category) = self.cache.get(&domain).await? {
            return Ok(Some((domain, category)));
        }

        let category = self.classifier.classify(&domain, entity_names).await?;
        self.cache
            .put(&domain, category, self.classifier.name())
            .await?;
        tracing::debug!(%domain, %category, "citation domain classified");
        Ok(Some((domain, category)))
    }
}

/// Object-safe view of a categorizer, as held by the coordinator.
#[async_trait]
pub trait Categorize: Send + Sync {
    async fn categorize_url(
        &self,
        url: &str,
        entity_names: &[&str],
    ) -> Result<Option<(String, CitationCategory)>, ScoringError>;
}

#[async_trait]
impl<C: CategoryCache, K: DomainClassifier> Categorize for CitationCategorizer<C, K> {
    async fn categorize_url(
        &self,
        url: &str,
        entity_names: &[&str],
    ) -> Result<Option<(String, CitationCategory)>, ScoringError> {
        self.categorize(url, entity_names).await
    }
}
