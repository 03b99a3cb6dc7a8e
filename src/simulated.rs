// ============================================================================
// Source simulée : marchés de démonstration
// ============================================================================
// Données de démo (crypto et paires forex) qui évoluent par marche aléatoire.
// Utilisée pour le forex (pas d'API gratuite) et pour la crypto hors-ligne.
//
// À chaque tick :
//   price  += price * (r - 0.48) * 0.01   (léger biais haussier)
//   change += (r' - 0.5) * 0.3
// avec r, r' uniformes dans [0, 1)
// ============================================================================

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use tracing::debug;

use crate::models::{Category, MarketItem};
use crate::poller::MarketSource;

/// Source qui fait évoluer un jeu de données de démo
pub struct SimulatedSource {
    name: String,
    items: Mutex<Vec<MarketItem>>,
    started: AtomicBool,
}

impl SimulatedSource {
    pub fn new(name: impl Into<String>, seed: Vec<MarketItem>) -> Self {
        Self {
            name: name.into(),
            items: Mutex::new(seed),
            started: AtomicBool::new(false),
        }
    }

    /// Source crypto de démo
    pub fn crypto() -> Self {
        Self::new("simulated-crypto", crypto_seed())
    }

    /// Source forex de démo
    pub fn forex() -> Self {
        Self::new("simulated-forex", forex_seed())
    }

    /// Produit le snapshot suivant
    ///
    /// Le premier appel retourne les valeurs de départ telles quelles.
    fn next_snapshot(&self) -> Vec<MarketItem> {
        let mut items = self.items.lock().unwrap_or_else(|p| p.into_inner());

        if self.started.swap(true, Ordering::SeqCst) {
            let mut rng = rand::thread_rng();
            for item in items.iter_mut() {
                random_walk(item, rng.gen::<f64>(), rng.gen::<f64>());
            }
        }

        items.clone()
    }
}

#[async_trait]
impl MarketSource for SimulatedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<MarketItem>> {
        let snapshot = self.next_snapshot();
        debug!(source = %self.name, count = snapshot.len(), "Simulated tick");
        Ok(snapshot)
    }
}

/// Un pas de marche aléatoire (r, r' dans [0, 1))
pub fn random_walk(item: &mut MarketItem, r: f64, r_change: f64) {
    item.price += item.price * (r - 0.48) * 0.01;
    item.change_percent_24h += (r_change - 0.5) * 0.3;
}

// ============================================================================
// Jeux de données de démo
// ============================================================================

/// 12 cryptos de démo, classées par capitalisation
pub fn crypto_seed() -> Vec<MarketItem> {
    let crypto = || Category::Other("crypto".to_string());
    let seeds: [(&str, &str, &str, f64, f64); 12] = [
        ("bitcoin", "Bitcoin", "BTC", 61247.80, 2.14),
        ("ethereum", "Ethereum", "ETH", 3408.52, 1.87),
        ("solana", "Solana", "SOL", 158.75, 4.32),
        ("cardano", "Cardano", "ADA", 0.53, -1.24),
        ("xrp", "XRP", "XRP", 0.62, -2.18),
        ("polkadot", "Polkadot", "DOT", 7.82, 0.87),
        ("dogecoin", "Dogecoin", "DOGE", 0.154, 3.45),
        ("avalanche", "Avalanche", "AVAX", 34.72, 1.18),
        ("chainlink", "Chainlink", "LINK", 14.83, -0.54),
        ("litecoin", "Litecoin", "LTC", 84.35, 0.34),
        ("uniswap", "Uniswap", "UNI", 10.27, -1.87),
        ("shiba-inu", "Shiba Inu", "SHIB", 0.00002534, 5.67),
    ];

    seeds
        .iter()
        .enumerate()
        .map(|(i, (id, name, symbol, price, change))| {
            MarketItem::new(*id, *name, *symbol, crypto())
                .with_quote(*price, *change)
                .with_rank(i as u32 + 1)
        })
        .collect()
}

/// Ids "trending" de démo
pub fn crypto_trending_seed() -> BTreeSet<String> {
    ["bitcoin", "ethereum", "solana", "dogecoin", "shiba-inu"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Paires forex de démo : 7 majeures, 7 mineures, 7 exotiques
pub fn forex_seed() -> Vec<MarketItem> {
    let pairs: [(&str, Category, f64, f64); 21] = [
        ("EUR/USD", Category::Major, 1.0846, 0.12),
        ("GBP/USD", Category::Major, 1.2653, -0.08),
        ("USD/JPY", Category::Major, 151.24, 0.21),
        ("USD/CHF", Category::Major, 0.9038, -0.15),
        ("USD/CAD", Category::Major, 1.3571, 0.05),
        ("AUD/USD", Category::Major, 0.6548, -0.22),
        ("NZD/USD", Category::Major, 0.5986, -0.31),
        ("EUR/GBP", Category::Minor, 0.8572, 0.09),
        ("EUR/JPY", Category::Minor, 164.05, 0.33),
        ("GBP/JPY", Category::Minor, 191.37, 0.14),
        ("CHF/JPY", Category::Minor, 167.34, 0.36),
        ("GBP/AUD", Category::Minor, 1.9324, 0.18),
        ("EUR/AUD", Category::Minor, 1.6564, 0.27),
        ("EUR/CAD", Category::Minor, 1.4719, 0.07),
        ("USD/TRY", Category::Exotic, 32.18, 0.45),
        ("USD/ZAR", Category::Exotic, 18.94, -0.62),
        ("USD/MXN", Category::Exotic, 16.72, -0.38),
        ("USD/SGD", Category::Exotic, 1.3492, 0.04),
        ("USD/HKD", Category::Exotic, 7.8215, 0.01),
        ("EUR/PLN", Category::Exotic, 4.3127, -0.19),
        ("GBP/ZAR", Category::Exotic, 23.96, -0.71),
    ];

    pairs
        .into_iter()
        .map(|(name, category, price, change)| {
            // "EUR/USD" -> id "EURUSD"
            let id = name.replace('/', "");
            MarketItem::new(id.clone(), name, id, category).with_quote(price, change)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_walk_formula() {
        let mut item = MarketItem::new("x", "X", "X", Category::Major).with_quote(100.0, 1.0);

        random_walk(&mut item, 0.48, 0.5);
        assert!((item.price - 100.0).abs() < 1e-12);
        assert!((item.change_percent_24h - 1.0).abs() < 1e-12);

        random_walk(&mut item, 0.98, 1.0);
        assert!((item.price - 100.5).abs() < 1e-9);
        assert!((item.change_percent_24h - 1.15).abs() < 1e-9);
    }

    #[test]
    fn test_seeds_have_unique_ids() {
        for seed in [crypto_seed(), forex_seed()] {
            let ids: BTreeSet<&str> = seed.iter().map(|i| i.id.as_str()).collect();
            assert_eq!(ids.len(), seed.len());
        }
    }

    #[test]
    fn test_forex_seed_categories() {
        let seed = forex_seed();
        assert_eq!(seed.len(), 21);
        for category in [Category::Major, Category::Minor, Category::Exotic] {
            assert_eq!(seed.iter().filter(|p| p.category == category).count(), 7);
        }
        let usdjpy = seed.iter().find(|p| p.id == "USDJPY").unwrap();
        assert_eq!(usdjpy.display_name, "USD/JPY");
        assert_eq!(usdjpy.format_price(), "151.24");
    }

    #[test]
    fn test_trending_ids_exist_in_crypto_seed() {
        let seed = crypto_seed();
        for id in crypto_trending_seed() {
            assert!(seed.iter().any(|item| item.id == id), "missing {}", id);
        }
        assert_eq!(seed[0].market_cap_rank, Some(1));
        assert_eq!(seed[11].market_cap_rank, Some(12));
    }

    #[tokio::test]
    async fn test_first_fetch_returns_seed_then_walks() {
        let source = SimulatedSource::crypto();
        let first = source.fetch().await.unwrap();
        assert_eq!(first, crypto_seed());

        let second = source.fetch().await.unwrap();
        assert_eq!(second.len(), first.len());
        for (before, after) in first.iter().zip(&second) {
            assert_eq!(before.id, after.id);
            // Un pas ne bouge jamais le prix de plus de ~0.5%
            assert!((after.price - before.price).abs() <= before.price * 0.0053);
        }
    }
}
