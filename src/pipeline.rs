// ============================================================================
// Pipeline : filtre / tri générique
// ============================================================================
// Transforme (dataset, état des filtres, favoris) en liste affichée.
//
// Étapes :
// 1. Sous-ensemble de base selon la catégorie (tout, top N, prédicat, ids)
// 2. Favoris uniquement (optionnel)
// 3. Recherche texte insensible à la casse (OU entre les champs)
// 4. Tri numérique ou texte, direction asc/desc
//
// CONCEPTS RUST :
// 1. Traits avec type associé : chaque page définit son propre enum de clés
// 2. Références : la vue emprunte le dataset (Vec<&T>), rien n'est copié
// 3. Fonction pure : aucune mutation du dataset, même résultat pour mêmes entrées
// ============================================================================

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

// ============================================================================
// Trait Viewable
// ============================================================================

/// Valeur de tri extraite d'un item
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue<'a> {
    /// Comparaison numérique (jamais lexicographique)
    Number(f64),
    /// Comparaison texte insensible à la casse
    Text(&'a str),
    /// Valeur absente : toujours en fin de liste
    Missing,
}

/// Un item qui peut passer dans le pipeline
pub trait Viewable {
    /// Clés de tri disponibles pour ce type d'item
    type SortKey: Copy + Eq + fmt::Debug;

    /// Identifiant unique dans le dataset
    fn id(&self) -> &str;

    /// Champs sur lesquels porte la recherche texte
    fn search_fields(&self) -> Vec<&str>;

    /// Valeur utilisée pour trier selon `key`
    fn sort_value(&self, key: Self::SortKey) -> SortValue<'_>;
}

// ============================================================================
// État des filtres
// ============================================================================

/// Direction du tri
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggle(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            SortDirection::Asc => "↑",
            SortDirection::Desc => "↓",
        }
    }
}

impl std::str::FromStr for SortDirection {
    type Err = ParseSortKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(ParseSortKeyError(s.to_string())),
        }
    }
}

/// Clé de tri inconnue
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("clé de tri inconnue : {0}")]
pub struct ParseSortKeyError(pub String);

/// Tri demandé
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec<K> {
    pub key: K,
    pub direction: SortDirection,
}

/// État des filtres d'une page
///
/// Éphémère : recréé au lancement, modifié uniquement par l'utilisateur.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState<K> {
    pub query: String,
    pub category: String,
    pub sort: Option<SortSpec<K>>,
    pub favorites_only: bool,
}

impl<K> FilterState<K> {
    /// Filtres vides sur la catégorie donnée
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            query: String::new(),
            category: category.into(),
            sort: None,
            favorites_only: false,
        }
    }

    /// Ajoute un tri
    pub fn sorted_by(mut self, key: K, direction: SortDirection) -> Self {
        self.sort = Some(SortSpec { key, direction });
        self
    }

    /// Ajoute une recherche
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }
}

// ============================================================================
// Favoris
// ============================================================================

/// Lecture seule de l'ensemble des favoris
pub trait FavoriteLookup {
    fn contains(&self, id: &str) -> bool;
}

impl FavoriteLookup for BTreeSet<String> {
    fn contains(&self, id: &str) -> bool {
        BTreeSet::contains(self, id)
    }
}

impl FavoriteLookup for HashSet<String> {
    fn contains(&self, id: &str) -> bool {
        HashSet::contains(self, id)
    }
}

/// Pour les pages sans favoris (offres d'emploi, produits earn)
pub struct NoFavorites;

impl FavoriteLookup for NoFavorites {
    fn contains(&self, _id: &str) -> bool {
        false
    }
}

// ============================================================================
// Configuration d'une vue
// ============================================================================

/// Stratégie de sélection du sous-ensemble de base
pub enum Selection<T: Viewable> {
    /// Tout le dataset
    All,
    /// Les `n` premiers selon `key` (croissant, ex: rang de capitalisation)
    Top { n: usize, key: T::SortKey },
    /// Items qui satisfont le prédicat
    Matching(Arc<dyn Fn(&T) -> bool + Send + Sync>),
    /// Items dont l'id est dans un ensemble fourni séparément (ex: trending)
    Ids(BTreeSet<String>),
}

impl<T: Viewable> Selection<T> {
    /// Raccourci pour construire un `Matching`
    pub fn matching(predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Selection::Matching(Arc::new(predicate))
    }
}

// Clone manuel : #[derive(Clone)] exigerait T: Clone
impl<T: Viewable> Clone for Selection<T> {
    fn clone(&self) -> Self {
        match self {
            Selection::All => Selection::All,
            Selection::Top { n, key } => Selection::Top { n: *n, key: *key },
            Selection::Matching(predicate) => Selection::Matching(Arc::clone(predicate)),
            Selection::Ids(ids) => Selection::Ids(ids.clone()),
        }
    }
}

impl<T: Viewable> fmt::Debug for Selection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::All => write!(f, "All"),
            Selection::Top { n, key } => write!(f, "Top({}, {:?})", n, key),
            Selection::Matching(_) => write!(f, "Matching(..)"),
            Selection::Ids(ids) => write!(f, "Ids({})", ids.len()),
        }
    }
}

/// Table statique catégorie -> stratégie de sélection
pub struct ViewConfig<T: Viewable> {
    categories: Vec<(String, Selection<T>)>,
}

impl<T: Viewable> ViewConfig<T> {
    pub fn new() -> Self {
        Self {
            categories: Vec::new(),
        }
    }

    /// Ajoute (ou remplace) une catégorie
    pub fn with_category(mut self, name: impl Into<String>, selection: Selection<T>) -> Self {
        let name = name.into();
        self.categories.retain(|(existing, _)| *existing != name);
        self.categories.push((name, selection));
        self
    }

    /// Stratégie associée à une catégorie (None = catégorie inconnue)
    pub fn selection_for(&self, category: &str) -> Option<&Selection<T>> {
        self.categories
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, selection)| selection)
    }

    /// Noms des catégories, dans l'ordre de déclaration
    pub fn category_names(&self) -> Vec<&str> {
        self.categories.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Catégorie suivante (cycle), utilisée par la touche Tab
    pub fn next_category(&self, current: &str) -> String {
        let names = self.category_names();
        if names.is_empty() {
            return current.to_string();
        }
        let position = names.iter().position(|name| *name == current);
        let next = match position {
            Some(i) => (i + 1) % names.len(),
            None => 0,
        };
        names[next].to_string()
    }
}

impl<T: Viewable> Default for ViewConfig<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Viewable> Clone for ViewConfig<T> {
    fn clone(&self) -> Self {
        Self {
            categories: self.categories.clone(),
        }
    }
}

// ============================================================================
// Résultat
// ============================================================================

/// Raison d'une vue vide : le rendu affiche toujours un message explicite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// Le dataset lui-même est vide (pas encore chargé ou erreur)
    NoData,
    /// Mode favoris actif mais aucun favori dans la sélection
    NoFavorites,
    /// Les filtres ne retiennent aucun item
    NoMatches,
}

/// Liste dérivée, empruntée au dataset
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedView<'a, T> {
    pub items: Vec<&'a T>,
    pub empty: Option<EmptyReason>,
}

impl<'a, T> DerivedView<'a, T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'a T> {
        self.items.get(index).copied()
    }
}

// ============================================================================
// derive_view : le pipeline
// ============================================================================

/// Calcule la liste affichée
///
/// Déterministe et pur : appeler deux fois avec les mêmes entrées donne
/// exactement la même liste, et le dataset n'est jamais modifié.
pub fn derive_view<'a, T, F>(
    dataset: &'a [T],
    config: &ViewConfig<T>,
    filter: &FilterState<T::SortKey>,
    favorites: &F,
) -> DerivedView<'a, T>
where
    T: Viewable,
    F: FavoriteLookup + ?Sized,
{
    // 1. Sous-ensemble de base
    let mut items: Vec<&T> = match config.selection_for(&filter.category) {
        None | Some(Selection::All) => dataset.iter().collect(),
        Some(Selection::Top { n, key }) => {
            let mut ranked: Vec<&T> = dataset.iter().collect();
            sort_items(&mut ranked, *key, SortDirection::Asc);
            ranked.truncate(*n);
            ranked
        }
        Some(Selection::Matching(predicate)) => {
            dataset.iter().filter(|item| predicate(*item)).collect()
        }
        Some(Selection::Ids(ids)) => dataset.iter().filter(|item| ids.contains(item.id())).collect(),
    };

    // 2. Favoris uniquement
    if filter.favorites_only {
        items.retain(|item| favorites.contains(item.id()));
    }
    let after_favorites = items.len();

    // 3. Recherche
    let needle = filter.query.trim().to_lowercase();
    if !needle.is_empty() {
        items.retain(|item| matches_query(*item, &needle));
    }

    // 4. Tri
    if let Some(spec) = filter.sort {
        sort_items(&mut items, spec.key, spec.direction);
    }

    let empty = if !items.is_empty() {
        None
    } else if filter.favorites_only && after_favorites == 0 {
        Some(EmptyReason::NoFavorites)
    } else if dataset.is_empty() {
        Some(EmptyReason::NoData)
    } else {
        Some(EmptyReason::NoMatches)
    };

    DerivedView { items, empty }
}

/// true si un des champs de recherche contient `needle` (déjà en minuscules)
pub fn matches_query<T: Viewable>(item: &T, needle: &str) -> bool {
    item.search_fields()
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

/// Tri stable : les égalités gardent l'ordre du dataset
fn sort_items<T: Viewable>(items: &mut [&T], key: T::SortKey, direction: SortDirection) {
    items.sort_by(|a, b| compare(a.sort_value(key), b.sort_value(key), direction));
}

/// Compare deux valeurs ; les valeurs absentes (ou NaN) vont toujours à la fin
fn compare(a: SortValue<'_>, b: SortValue<'_>, direction: SortDirection) -> Ordering {
    let a = normalize(a);
    let b = normalize(b);

    let ordering = match (&a, &b) {
        (SortValue::Missing, SortValue::Missing) => return Ordering::Equal,
        (SortValue::Missing, _) => return Ordering::Greater,
        (_, SortValue::Missing) => return Ordering::Less,
        (SortValue::Number(x), SortValue::Number(y)) => x.total_cmp(y),
        (SortValue::Text(x), SortValue::Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        // Types mélangés : les nombres avant le texte
        (SortValue::Number(_), SortValue::Text(_)) => Ordering::Less,
        (SortValue::Text(_), SortValue::Number(_)) => Ordering::Greater,
    };

    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

fn normalize(value: SortValue<'_>) -> SortValue<'_> {
    match value {
        SortValue::Number(n) if n.is_nan() => SortValue::Missing,
        other => other,
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
