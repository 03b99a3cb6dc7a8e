// ============================================================================
// Vues : configurations du pipeline par page
// ============================================================================
// Chaque page (crypto, forex, offres d'emploi, earn) branche le même
// pipeline générique avec :
// - ses clés de tri (enum + FromStr)
// - ses champs de recherche (impl Viewable)
// - sa table catégorie -> sélection (ViewConfig)
// ============================================================================

use std::collections::BTreeSet;
use std::str::FromStr;

use crate::models::{Category, Department, EarnKind, EarnProduct, JobPosting, Location, MarketItem};
use crate::pipeline::{ParseSortKeyError, Selection, SortValue, ViewConfig, Viewable};

/// Nombre d'items de l'onglet "top"
pub const TOP_TOKENS: usize = 5;

// ============================================================================
// Marchés (crypto + forex)
// ============================================================================

/// Clés de tri des instruments de marché
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketSortKey {
    Price,
    Change,
    Name,
    Symbol,
    Rank,
}

impl MarketSortKey {
    pub const ALL: [MarketSortKey; 5] = [
        MarketSortKey::Rank,
        MarketSortKey::Price,
        MarketSortKey::Change,
        MarketSortKey::Name,
        MarketSortKey::Symbol,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MarketSortKey::Price => "price",
            MarketSortKey::Change => "change",
            MarketSortKey::Name => "name",
            MarketSortKey::Symbol => "symbol",
            MarketSortKey::Rank => "rank",
        }
    }

    /// Clé suivante (cycle), utilisée par la touche 's'
    pub fn next(self) -> Self {
        let position = Self::ALL.iter().position(|key| *key == self).unwrap_or(0);
        Self::ALL[(position + 1) % Self::ALL.len()]
    }
}

impl FromStr for MarketSortKey {
    type Err = ParseSortKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "price" => Ok(MarketSortKey::Price),
            "change" | "change24h" => Ok(MarketSortKey::Change),
            "name" => Ok(MarketSortKey::Name),
            "symbol" => Ok(MarketSortKey::Symbol),
            "rank" | "marketcap" => Ok(MarketSortKey::Rank),
            _ => Err(ParseSortKeyError(s.to_string())),
        }
    }
}

impl Viewable for MarketItem {
    type SortKey = MarketSortKey;

    fn id(&self) -> &str {
        &self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![&self.display_name, &self.symbol]
    }

    fn sort_value(&self, key: MarketSortKey) -> SortValue<'_> {
        match key {
            MarketSortKey::Price => SortValue::Number(self.price),
            MarketSortKey::Change => SortValue::Number(self.change_percent_24h),
            MarketSortKey::Name => SortValue::Text(&self.display_name),
            MarketSortKey::Symbol => SortValue::Text(&self.symbol),
            MarketSortKey::Rank => match self.market_cap_rank {
                Some(rank) => SortValue::Number(f64::from(rank)),
                None => SortValue::Missing,
            },
        }
    }
}

/// Page crypto : "all", "top" (top N par capitalisation), "trending"
///
/// Les ids trending viennent d'une source séparée (API ou données de démo).
pub fn crypto_view(trending: BTreeSet<String>) -> ViewConfig<MarketItem> {
    ViewConfig::new()
        .with_category("all", Selection::All)
        .with_category(
            "top",
            Selection::Top {
                n: TOP_TOKENS,
                key: MarketSortKey::Rank,
            },
        )
        .with_category("trending", Selection::Ids(trending))
}

/// Page forex : une catégorie par famille de paires
pub fn forex_view() -> ViewConfig<MarketItem> {
    let mut config = ViewConfig::new();
    for category in [Category::Major, Category::Minor, Category::Exotic] {
        let slug = category.slug().to_string();
        config = config.with_category(
            slug,
            Selection::matching(move |item: &MarketItem| item.category == category),
        );
    }
    config.with_category("all", Selection::All)
}

// ============================================================================
// Offres d'emploi
// ============================================================================

/// Clés de tri des offres d'emploi
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSortKey {
    Title,
    Department,
    Location,
}

impl JobSortKey {
    pub const ALL: [JobSortKey; 3] = [JobSortKey::Title, JobSortKey::Department, JobSortKey::Location];

    pub fn label(&self) -> &'static str {
        match self {
            JobSortKey::Title => "title",
            JobSortKey::Department => "department",
            JobSortKey::Location => "location",
        }
    }

    pub fn next(self) -> Self {
        let position = Self::ALL.iter().position(|key| *key == self).unwrap_or(0);
        Self::ALL[(position + 1) % Self::ALL.len()]
    }
}

impl FromStr for JobSortKey {
    type Err = ParseSortKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "title" => Ok(JobSortKey::Title),
            "department" => Ok(JobSortKey::Department),
            "location" => Ok(JobSortKey::Location),
            _ => Err(ParseSortKeyError(s.to_string())),
        }
    }
}

impl Viewable for JobPosting {
    type SortKey = JobSortKey;

    fn id(&self) -> &str {
        &self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![&self.title, &self.description, &self.requirements]
    }

    fn sort_value(&self, key: JobSortKey) -> SortValue<'_> {
        match key {
            JobSortKey::Title => SortValue::Text(&self.title),
            JobSortKey::Department => SortValue::Text(self.department.label()),
            JobSortKey::Location => SortValue::Text(self.location.label()),
        }
    }
}

/// Page carrières : "all" + un département par catégorie, restreint au lieu choisi
pub fn jobs_view(location: Option<Location>) -> ViewConfig<JobPosting> {
    let at_location = move |job: &JobPosting, wanted: &Option<Location>| match wanted {
        Some(location) => job.location == *location,
        None => true,
    };

    let all_location = location.clone();
    let mut config = ViewConfig::new().with_category(
        "all",
        Selection::matching(move |job: &JobPosting| at_location(job, &all_location)),
    );

    for department in Department::KNOWN {
        let slug = department.slug().to_string();
        let location = location.clone();
        config = config.with_category(
            slug,
            Selection::matching(move |job: &JobPosting| {
                job.department == department && at_location(job, &location)
            }),
        );
    }

    config
}

// ============================================================================
// Produits earn
// ============================================================================

/// Clés de tri des produits earn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarnSortKey {
    Apy,
    Lock,
    Name,
}

impl EarnSortKey {
    pub const ALL: [EarnSortKey; 3] = [EarnSortKey::Apy, EarnSortKey::Lock, EarnSortKey::Name];

    pub fn label(&self) -> &'static str {
        match self {
            EarnSortKey::Apy => "apy",
            EarnSortKey::Lock => "lock",
            EarnSortKey::Name => "name",
        }
    }

    pub fn next(self) -> Self {
        let position = Self::ALL.iter().position(|key| *key == self).unwrap_or(0);
        Self::ALL[(position + 1) % Self::ALL.len()]
    }
}

impl FromStr for EarnSortKey {
    type Err = ParseSortKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "apy" => Ok(EarnSortKey::Apy),
            "lock" | "lockperiod" => Ok(EarnSortKey::Lock),
            "name" => Ok(EarnSortKey::Name),
            _ => Err(ParseSortKeyError(s.to_string())),
        }
    }
}

impl Viewable for EarnProduct {
    type SortKey = EarnSortKey;

    fn id(&self) -> &str {
        &self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![&self.name, &self.symbol]
    }

    fn sort_value(&self, key: EarnSortKey) -> SortValue<'_> {
        match key {
            EarnSortKey::Apy => SortValue::Number(self.apy),
            EarnSortKey::Lock => SortValue::Number(f64::from(self.lock_days)),
            EarnSortKey::Name => SortValue::Text(&self.name),
        }
    }
}

/// Page earn : une catégorie par type de produit
pub fn earn_view() -> ViewConfig<EarnProduct> {
    let by_kind = |kind: EarnKind| Selection::matching(move |product: &EarnProduct| product.kind == kind);

    ViewConfig::new()
        .with_category("all", Selection::All)
        .with_category("staking", by_kind(EarnKind::Staking))
        .with_category("savings", by_kind(EarnKind::Savings))
        .with_category("yield", by_kind(EarnKind::YieldFarming))
}

// ============================================================================
// Tests
// ============================================================================
