// ============================================================================
// Configuration : fichier TOML optionnel
// ============================================================================
// Emplacement : --config PATH, sinon <config_dir>/bitdash/config.toml
// Chaque champ a une valeur par défaut : un fichier absent = défauts.
// Un fichier présent mais invalide est une erreur (avec contexte).
//
// Exemple :
//   [market]
//   source = "simulated"
//   per_page = 20
//
//   [cms]
//   base_url = "https://cms.example.com"
//   locale = "fr"
// ============================================================================

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

/// Origine des données crypto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// API CoinGecko
    Live,
    /// Données de démo en marche aléatoire
    Simulated,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub market: MarketConfig,
    pub cms: CmsConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub source: SourceKind,
    pub coingecko_url: String,
    pub per_page: u32,
    pub live_interval_secs: u64,
    pub simulated_interval_millis: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Live,
            coingecko_url: "https://api.coingecko.com/api/v3".to_string(),
            per_page: 20,
            live_interval_secs: 30,
            simulated_interval_millis: 2000,
        }
    }
}

impl MarketConfig {
    pub fn live_interval(&self) -> Duration {
        Duration::from_secs(self.live_interval_secs.max(1))
    }

    /// Timeout HTTP des appels CoinGecko : 3/4 de l'intervalle, donc toujours
    /// strictement inférieur. Une requête lente échoue sur son propre timeout
    /// avant que le tick suivant ne l'annule.
    pub fn live_timeout(&self) -> Duration {
        self.live_interval() * 3 / 4
    }

    pub fn simulated_interval(&self) -> Duration {
        Duration::from_millis(self.simulated_interval_millis.max(100))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CmsConfig {
    pub base_url: String,
    pub locale: String,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1337".to_string(),
            locale: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Dossier des favoris (défaut : <data_dir>/bitdash)
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./logs"),
        }
    }
}

impl Config {
    /// Charge la configuration
    ///
    /// `path` explicite : le fichier doit exister.
    /// Sinon le chemin par défaut est utilisé s'il existe.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match default_path() {
                Some(path) => (path, false),
                None => {
                    debug!("No config directory on this platform, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !required && !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Échec de la lecture de la configuration {}", path.display()))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Configuration invalide : {}", path.display()))?;

        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Échec du parsing TOML")
    }

    /// Dossier des favoris
    pub fn data_dir(&self) -> PathBuf {
        self.storage.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("bitdash")
        })
    }
}

/// <config_dir>/bitdash/config.toml
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("bitdash").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.market.source, SourceKind::Live);
        assert_eq!(config.market.per_page, 20);
        assert_eq!(config.market.live_interval(), Duration::from_secs(30));
        assert_eq!(config.market.simulated_interval(), Duration::from_secs(2));
        assert_eq!(config.cms.locale, "en");
    }

    #[test]
    fn test_live_timeout_is_below_interval() {
        let mut market = MarketConfig::default();
        assert_eq!(market.live_timeout(), Duration::from_millis(22_500));

        for secs in [0, 1, 2, 5] {
            market.live_interval_secs = secs;
            assert!(market.live_timeout() < market.live_interval(), "{}s", secs);
        }
        market.live_interval_secs = 1;
        assert_eq!(market.live_timeout(), Duration::from_millis(750));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [market]
            source = "simulated"

            [cms]
            locale = "fr"
            "#,
        )
        .unwrap();

        assert_eq!(config.market.source, SourceKind::Simulated);
        assert_eq!(config.market.coingecko_url, "https://api.coingecko.com/api/v3");
        assert_eq!(config.cms.locale, "fr");
        assert_eq!(config.cms.base_url, "http://localhost:1337");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        assert!(Config::from_toml("[market]\nsource = \"carrier-pigeon\"").is_err());
        assert!(Config::from_toml("[market").is_err());
    }

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_load_from_file_and_data_dir_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            format!(
                "[storage]\ndata_dir = {:?}\n[market]\nper_page = 50\n",
                dir.path().join("data").display().to_string()
            ),
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.market.per_page, 50);
        assert_eq!(config.data_dir(), dir.path().join("data"));
    }
}
