// ============================================================================
// Favoris : ensemble d'ids persisté localement
// ============================================================================
// Un FavoritesStore par liste (crypto, forex), créé au démarrage par l'App
// et passé par référence au pipeline. Pas d'état global.
//
// Persistance :
// - chaque mutation réécrit l'ensemble complet (tableau JSON)
// - au chargement : absent ou corrompu => ensemble vide (jamais fatal)
//
// CONCEPTS RUST :
// 1. Trait Storage : le stockage réel (fichiers) et le stockage de test
//    (mémoire) sont interchangeables
// 2. Box<dyn Trait> : le store possède son backend
// ============================================================================

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::pipeline::FavoriteLookup;

/// Clé de stockage des favoris crypto
pub const CRYPTO_FAVORITES_KEY: &str = "cryptoFavorites";

/// Clé de stockage des favoris forex
pub const FOREX_FAVORITES_KEY: &str = "forexFavorites";

// ============================================================================
// Backends de stockage
// ============================================================================

/// Stockage clé -> valeur texte
pub trait Storage: Send {
    /// Lit la valeur d'une clé (None si absente)
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Écrit la valeur d'une clé
    fn write(&self, key: &str, value: &str) -> Result<()>;
}

/// Stockage fichier : une clé = un fichier `<key>.json`
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Échec de la lecture de {}", path.display()))?;
        Ok(Some(content))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Échec de la création de {}", self.dir.display()))?;

        // Écriture dans un fichier temporaire puis rename : pas de fichier à moitié écrit
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)
            .with_context(|| format!("Échec de l'écriture de {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Échec du renommage vers {}", path.display()))?;
        Ok(())
    }
}

/// Stockage en mémoire, partageable entre plusieurs stores (tests, démo)
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Valeur brute actuellement stockée
    pub fn raw(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.raw(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================================
// FavoritesStore
// ============================================================================

/// Ensemble de favoris persisté
pub struct FavoritesStore {
    key: String,
    ids: BTreeSet<String>,
    storage: Box<dyn Storage>,
}

impl FavoritesStore {
    /// Charge les favoris d'une clé
    ///
    /// Absent, illisible ou JSON corrompu : on démarre avec un ensemble vide.
    pub fn load(storage: Box<dyn Storage>, key: impl Into<String>) -> Self {
        let key = key.into();

        let ids = match storage.read(&key) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(list) => list.into_iter().collect(),
                Err(e) => {
                    warn!(key = %key, error = %e, "Corrupt favorites payload, starting empty");
                    BTreeSet::new()
                }
            },
            Ok(None) => {
                debug!(key = %key, "No stored favorites, starting empty");
                BTreeSet::new()
            }
            Err(e) => {
                warn!(key = %key, error = ?e, "Failed to read favorites, starting empty");
                BTreeSet::new()
            }
        };

        info!(key = %key, count = ids.len(), "Favorites loaded");
        Self { key, ids, storage }
    }

    /// Ajoute ou retire un id ; retourne la nouvelle appartenance
    pub fn toggle(&mut self, id: &str) -> bool {
        let now_favorite = if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        };

        debug!(key = %self.key, id, now_favorite, "Favorite toggled");
        self.persist();
        now_favorite
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn ids(&self) -> &BTreeSet<String> {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Réécrit l'ensemble complet ; un échec est loggé, l'état mémoire est conservé
    fn persist(&self) {
        let list: Vec<&String> = self.ids.iter().collect();
        let result = serde_json::to_string(&list)
            .context("Échec de la sérialisation des favoris")
            .and_then(|json| self.storage.write(&self.key, &json));

        if let Err(e) = result {
            error!(key = %self.key, error = ?e, "Failed to persist favorites");
        }
    }
}

impl FavoriteLookup for FavoritesStore {
    fn contains(&self, id: &str) -> bool {
        self.is_favorite(id)
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
