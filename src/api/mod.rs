// ============================================================================
// Module : api
// ============================================================================
// Clients HTTP vers les services externes :
// - CoinGecko pour les cotations crypto
// - le CMS (Strapi) pour les offres d'emploi et l'inscription
// ============================================================================

pub mod coingecko;  // Client API CoinGecko
pub mod strapi;     // Client API du CMS

// Re-export des clients
pub use coingecko::CoinGeckoSource;
pub use strapi::StrapiClient;
