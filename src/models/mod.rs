// ============================================================================
// Module : models
// ============================================================================
// Ce module contient toutes les structures de données de l'application
//
// CONCEPT RUST : Modules et visibilité
// - "pub mod" : déclare un sous-module publique (accessible depuis l'extérieur)
// - Sans "pub", le module serait privé au crate
// ============================================================================

pub mod earn_product;  // Produits d'épargne / staking
pub mod job_posting;   // Offres d'emploi du CMS
pub mod market_item;   // Instruments de marché (crypto, forex)

// Re-export des structures principales pour simplifier les imports
// Au lieu de : use bitdash::models::market_item::MarketItem;
// On peut faire : use bitdash::models::MarketItem;
pub use earn_product::{EarnKind, EarnProduct};
pub use job_posting::{Department, JobPosting, Location};
pub use market_item::{unique_by_id, Category, MarketItem};
