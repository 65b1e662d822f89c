//! The brand and its competitor set, resolved once per sweep.

use std::collections::HashMap;

use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompetitorRef {
    pub id: Uuid,
    pub name: String,
}

/// Brand name plus the active competitors, indexed by competitor id.
#[derive(Debug, Clone)]
pub struct BrandContext {
    pub brand_id: Uuid,
    pub customer_id: Uuid,
    pub brand_name: String,
    pub competitors: Vec<CompetitorRef>,
    by_id: HashMap<Uuid, usize>,
}

impl BrandContext {
    #[must_use]
    pub fn new(
        brand_id: Uuid,
        customer_id: Uuid,
        brand_name: impl Into<String>,
        competitors: Vec<CompetitorRef>,
    ) -> Self {
        let by_id = competitors
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id, i))
            .collect();
        Self {
            brand_id,
            customer_id,
            brand_name: brand_name.into(),
            competitors,
            by_id,
        }
    }

    #[must_use]
    pub fn competitor(&self, id: Uuid) -> Option<&CompetitorRef> {
        self.by_id.get(&id).map(|&i| &self.competitors[i])
    }

    /// Case-insensitive lookup, for engines that report competitors by name.
    #[must_use]
    pub fn competitor_by_name(&self, name: &str) -> Option<&CompetitorRef> {
        let name = name.trim().to_lowercase();
        self.competitors
            .iter()
            .find(|c| c.name.to_lowercase() == name)
    }

    #[must_use]
    pub fn competitor_names(&self) -> Vec<&str> {
        self.competitors.iter().map(|c| c.name.as_str()).collect()
    }
}
