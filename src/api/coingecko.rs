// ============================================================================
// API Client : CoinGecko
// ============================================================================
// Cotations crypto (classement par capitalisation) et ids "trending"
//
// CONCEPTS RUST :
// 1. Un seul reqwest::Client réutilisé (pool de connexions)
// 2. Timeout inférieur à l'intervalle de polling : un tick bloqué ne
//    peut pas empêcher les suivants d'aboutir
// 3. Option<f64> : CoinGecko renvoie parfois null pour le prix ou la variation
// ============================================================================

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, info, instrument};

use crate::models::{Category, MarketItem};
use crate::poller::MarketSource;

// ============================================================================
// Structures pour parser la réponse JSON de CoinGecko
// ============================================================================

/// Une ligne de /coins/markets
#[derive(Debug, Deserialize)]
struct CoinMarket {
    id: String,
    name: String,
    symbol: String,
    image: Option<String>,
    current_price: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    market_cap_rank: Option<u32>,
}

/// Réponse de /search/trending
#[derive(Debug, Deserialize)]
struct TrendingResponse {
    coins: Vec<TrendingEntry>,
}

#[derive(Debug, Deserialize)]
struct TrendingEntry {
    item: TrendingCoin,
}

#[derive(Debug, Deserialize)]
struct TrendingCoin {
    id: String,
}

// ============================================================================
// Client
// ============================================================================

/// Source de marché CoinGecko
pub struct CoinGeckoSource {
    client: reqwest::Client,
    base_url: String,
    per_page: u32,
}

impl CoinGeckoSource {
    /// Crée la source ; `timeout` doit rester inférieur à l'intervalle de polling
    pub fn new(base_url: impl Into<String>, per_page: u32, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("bitdash/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Échec de la création du client HTTP")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            per_page,
        })
    }

    /// Récupère les cryptos classées par capitalisation
    #[instrument(skip(self), fields(per_page = self.per_page))]
    pub async fn fetch_markets(&self) -> Result<Vec<MarketItem>> {
        let url = build_markets_url(&self.base_url, self.per_page);
        debug!(url = %url, "Fetching CoinGecko markets");

        let body = self.get_text(&url).await?;
        let items = parse_markets(&body)?;

        info!(count = items.len(), "Successfully fetched markets");
        Ok(items)
    }

    /// Récupère les ids "trending"
    #[instrument(skip(self))]
    pub async fn fetch_trending_ids(&self) -> Result<BTreeSet<String>> {
        let url = format!("{}/search/trending", self.base_url);
        debug!(url = %url, "Fetching CoinGecko trending");

        let body = self.get_text(&url).await?;
        let ids = parse_trending(&body)?;

        info!(count = ids.len(), "Successfully fetched trending ids");
        Ok(ids)
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Échec de la requête HTTP vers CoinGecko")?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        if !status.is_success() {
            error!(status = %status, "CoinGecko returned error status");
            anyhow::bail!("CoinGecko a retourné une erreur : HTTP {}", status);
        }

        response
            .text()
            .await
            .context("Échec de la lecture de la réponse CoinGecko")
    }
}

#[async_trait]
impl MarketSource for CoinGeckoSource {
    fn name(&self) -> &str {
        "coingecko"
    }

    async fn fetch(&self) -> Result<Vec<MarketItem>> {
        self.fetch_markets().await
    }
}

/// URL de /coins/markets, triée par capitalisation décroissante
fn build_markets_url(base_url: &str, per_page: u32) -> String {
    format!(
        "{}/coins/markets?vs_currency=usd&order=market_cap_desc&per_page={}&page=1&sparkline=false",
        base_url, per_page
    )
}

/// Convertit la réponse /coins/markets en MarketItem
fn parse_markets(body: &str) -> Result<Vec<MarketItem>> {
    let rows: Vec<CoinMarket> =
        serde_json::from_str(body).context("Échec du parsing JSON de la réponse CoinGecko")?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let mut item = MarketItem::new(
                row.id,
                row.name,
                row.symbol.to_uppercase(),
                Category::Other("crypto".to_string()),
            )
            .with_quote(
                row.current_price.unwrap_or(0.0),
                row.price_change_percentage_24h.unwrap_or(0.0),
            );
            item.market_cap_rank = row.market_cap_rank;
            item.image = row.image;
            item
        })
        .collect())
}

fn parse_trending(body: &str) -> Result<BTreeSet<String>> {
    let response: TrendingResponse =
        serde_json::from_str(body).context("Échec du parsing JSON des tendances CoinGecko")?;
    Ok(response.coins.into_iter().map(|entry| entry.item.id).collect())
}
