// ============================================================================
// Structure : MarketItem
// ============================================================================
// Représente un instrument affichable (crypto, paire forex, ...)
//
// CONCEPTS RUST :
// 1. #[derive(...)] : génère automatiquement l'implémentation de traits
// 2. #[serde(from/into)] : (dé)sérialise un enum via une String
// 3. Builder léger : with_quote(), with_rank() consomment et retournent Self
// ============================================================================

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Catégorie d'un instrument
///
/// Les paires forex sont classées major / minor / exotic.
/// Toute autre valeur est conservée telle quelle (ex: "crypto").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Major,
    Minor,
    Exotic,
    Other(String),
}

impl Category {
    /// Slug utilisé dans les filtres ("major", "minor", ...)
    pub fn slug(&self) -> &str {
        match self {
            Category::Major => "major",
            Category::Minor => "minor",
            Category::Exotic => "exotic",
            Category::Other(value) => value,
        }
    }
}

impl From<&str> for Category {
    fn from(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "major" => Category::Major,
            "minor" => Category::Minor,
            "exotic" => Category::Exotic,
            _ => Category::Other(value.to_string()),
        }
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Category::from(value.as_str())
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.slug().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Instrument de marché tel qu'affiché dans les listes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketItem {
    /// Identifiant unique dans un snapshot (ex: "bitcoin", "EURUSD")
    pub id: String,

    /// Nom complet (ex: "Bitcoin", "EUR/USD")
    pub display_name: String,

    /// Symbole (ex: "BTC")
    pub symbol: String,

    /// Prix courant
    pub price: f64,

    /// Variation sur 24h en pourcentage
    pub change_percent_24h: f64,

    /// Catégorie (major / minor / exotic / libre)
    pub category: Category,

    /// Rang par capitalisation (absent pour le forex)
    pub market_cap_rank: Option<u32>,

    /// URL de l'icône fournie par l'API
    pub image: Option<String>,
}

impl MarketItem {
    /// Crée un instrument sans cotation
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        symbol: impl Into<String>,
        category: Category,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            symbol: symbol.into(),
            price: 0.0,
            change_percent_24h: 0.0,
            category,
            market_cap_rank: None,
            image: None,
        }
    }

    /// Renseigne prix et variation
    pub fn with_quote(mut self, price: f64, change_percent_24h: f64) -> Self {
        self.price = price;
        self.change_percent_24h = change_percent_24h;
        self
    }

    /// Renseigne le rang de capitalisation
    pub fn with_rank(mut self, rank: u32) -> Self {
        self.market_cap_rank = Some(rank);
        self
    }

    /// true si l'instrument est une paire forex
    pub fn is_forex(&self) -> bool {
        matches!(
            self.category,
            Category::Major | Category::Minor | Category::Exotic
        )
    }

    /// Retourne true si l'instrument est en hausse sur 24h
    pub fn is_positive(&self) -> bool {
        self.change_percent_24h >= 0.0
    }

    /// Formatte le prix selon le type d'instrument
    ///
    /// - Paires JPY : 2 décimales, autres paires forex : 4 décimales
    /// - Crypto : 2 décimales au-dessus de 1, plus de précision pour les petits prix
    pub fn format_price(&self) -> String {
        if self.is_forex() {
            if self.symbol.contains("JPY") {
                return format!("{:.2}", self.price);
            }
            return format!("{:.4}", self.price);
        }

        if self.price >= 1.0 {
            format!("${:.2}", self.price)
        } else if self.price >= 0.01 {
            format!("${:.4}", self.price)
        } else {
            format!("${:.8}", self.price)
        }
    }

    /// Formatte la variation avec une flèche : "▲ +2.14%"
    pub fn format_change(&self) -> String {
        let arrow = if self.is_positive() { "▲" } else { "▼" };
        format!("{} {:+.2}%", arrow, self.change_percent_24h)
    }
}

/// Garantit l'unicité des ids dans un snapshot
///
/// Le premier item rencontré est conservé, les doublons suivants sont ignorés.
pub fn unique_by_id(items: Vec<MarketItem>) -> Vec<MarketItem> {
    let mut seen = HashSet::with_capacity(items.len());
    let total = items.len();

    let unique: Vec<MarketItem> = items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect();

    if unique.len() < total {
        warn!(
            dropped = total - unique.len(),
            total,
            "Dropped duplicate ids from market snapshot"
        );
    }

    unique
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(id: &str, category: Category) -> MarketItem {
        MarketItem::new(id, id, id, category)
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!(Category::from("major"), Category::Major);
        assert_eq!(Category::from("EXOTIC"), Category::Exotic);
        assert_eq!(
            Category::from("crypto"),
            Category::Other("crypto".to_string())
        );
        assert_eq!(Category::Other("defi".into()).slug(), "defi");
    }

    #[test]
    fn test_category_serde_as_string() {
        let json = serde_json::to_string(&Category::Minor).unwrap();
        assert_eq!(json, "\"minor\"");

        let back: Category = serde_json::from_str("\"stablecoin\"").unwrap();
        assert_eq!(back, Category::Other("stablecoin".to_string()));
    }

    #[test]
    fn test_format_price_forex() {
        let eur = pair("EURUSD", Category::Major).with_quote(1.08456, 0.1);
        assert_eq!(eur.format_price(), "1.0846");

        let jpy = pair("USDJPY", Category::Major).with_quote(151.237, 0.1);
        assert_eq!(jpy.format_price(), "151.24");
    }

    #[test]
    fn test_format_price_crypto() {
        let crypto = Category::Other("crypto".to_string());
        assert_eq!(
            pair("bitcoin", crypto.clone()).with_quote(61247.8, 2.14).format_price(),
            "$61247.80"
        );
        assert_eq!(
            pair("doge", crypto.clone()).with_quote(0.154, 3.45).format_price(),
            "$0.1540"
        );
        assert_eq!(
            pair("shib", crypto).with_quote(0.00002534, 5.67).format_price(),
            "$0.00002534"
        );
    }

    #[test]
    fn test_format_change() {
        let up = pair("a", Category::Major).with_quote(1.0, 2.5);
        let down = pair("b", Category::Major).with_quote(1.0, -1.2);
        assert_eq!(up.format_change(), "▲ +2.50%");
        assert_eq!(down.format_change(), "▼ -1.20%");
        assert!(up.is_positive());
        assert!(!down.is_positive());
    }

    #[test]
    fn test_unique_by_id_keeps_first() {
        let items = vec![
            pair("btc", Category::Major).with_quote(1.0, 0.0),
            pair("eth", Category::Major),
            pair("btc", Category::Major).with_quote(2.0, 0.0),
        ];

        let unique = unique_by_id(items);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].id, "btc");
        assert_eq!(unique[0].price, 1.0);
        assert_eq!(unique[1].id, "eth");
    }
}
