// ============================================================================
// Structure : EarnProduct
// ============================================================================
// Produit d'épargne / staking affiché sur la page "Earn"
// Les données sont statiques (catalogue de démonstration)
// ============================================================================

use serde::{Deserialize, Serialize};

/// Type de produit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarnKind {
    Staking,
    Savings,
    YieldFarming,
}

impl EarnKind {
    pub fn label(&self) -> &'static str {
        match self {
            EarnKind::Staking => "Staking",
            EarnKind::Savings => "Savings",
            EarnKind::YieldFarming => "Yield farming",
        }
    }
}

/// Produit de rendement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarnProduct {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub kind: EarnKind,
    /// Rendement annuel en pourcentage
    pub apy: f64,
    /// Durée de blocage en jours (0 = flexible)
    pub lock_days: u32,
    /// Montant minimum (absent pour les pools de liquidité)
    pub min_amount: Option<f64>,
}

impl EarnProduct {
    fn new(
        id: &str,
        name: &str,
        symbol: &str,
        kind: EarnKind,
        apy: f64,
        lock_days: u32,
        min_amount: Option<f64>,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            kind,
            apy,
            lock_days,
            min_amount,
        }
    }

    /// "Flexible" ou "30 jours"
    pub fn lock_label(&self) -> String {
        if self.lock_days == 0 {
            "Flexible".to_string()
        } else {
            format!("{} jours", self.lock_days)
        }
    }
}

/// Catalogue de démonstration
pub fn catalog() -> Vec<EarnProduct> {
    use EarnKind::*;

    vec![
        EarnProduct::new("btc-staking", "Bitcoin", "BTC", Staking, 4.5, 30, Some(0.01)),
        EarnProduct::new("eth-staking", "Ethereum", "ETH", Staking, 5.8, 90, Some(0.1)),
        EarnProduct::new("sol-staking", "Solana", "SOL", Staking, 7.2, 60, Some(1.0)),
        EarnProduct::new("dot-staking", "Polkadot", "DOT", Staking, 12.0, 120, Some(5.0)),
        EarnProduct::new("ada-staking", "Cardano", "ADA", Staking, 5.2, 0, Some(100.0)),
        EarnProduct::new("btc-eth-lp", "BTC-ETH LP", "BTC-ETH", YieldFarming, 18.5, 0, None),
        EarnProduct::new("eth-usdt-lp", "ETH-USDT LP", "ETH-USDT", YieldFarming, 24.3, 0, None),
        EarnProduct::new("bnb-busd-lp", "BNB-BUSD LP", "BNB-BUSD", YieldFarming, 15.7, 0, None),
        EarnProduct::new("btc-savings", "Bitcoin", "BTC", Savings, 2.8, 0, Some(0.001)),
        EarnProduct::new("usdt-savings", "Tether", "USDT", Savings, 8.5, 90, Some(100.0)),
        EarnProduct::new("usdc-savings", "USD Coin", "USDC", Savings, 8.2, 60, Some(100.0)),
        EarnProduct::new("eth-savings", "Ethereum", "ETH", Savings, 2.5, 0, Some(0.01)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_ids_unique() {
        let products = catalog();
        let mut ids: Vec<&str> = products.iter().map(|p| p.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), products.len());
    }

    #[test]
    fn test_lock_label() {
        let products = catalog();
        let ada = products.iter().find(|p| p.id == "ada-staking").unwrap();
        assert_eq!(ada.lock_label(), "Flexible");
        let dot = products.iter().find(|p| p.id == "dot-staking").unwrap();
        assert_eq!(dot.lock_label(), "120 jours");
    }
}
