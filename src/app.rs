// ============================================================================
// Structure : App
// ============================================================================
// Gère l'état global de l'application TUI
//
// CONCEPTS RUST :
// 1. State Management : centraliser l'état dans une seule structure
// 2. Mutabilité contrôlée : &mut self pour modifier l'état
// 3. Emprunts : les vues dérivées empruntent les datasets (aucune copie)
//
// PATTERN : "Application State"
// - L'event loop est le seul propriétaire de App (pas de Arc<Mutex<>>)
// - Les résultats réseau arrivent par channel et passent par apply_poll,
//   set_jobs, finish_signup...
// - Le rendu relit App à chaque frame et recalcule les vues dérivées
// ============================================================================

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::favorites::{FavoritesStore, MemoryStorage, CRYPTO_FAVORITES_KEY, FOREX_FAVORITES_KEY};
use crate::models::{self, EarnProduct, JobPosting, Location, MarketItem};
use crate::pipeline::{derive_view, DerivedView, FilterState, NoFavorites, SortDirection, SortSpec, ViewConfig};
use crate::poller::{Dataset, Feed, PollEvent};
use crate::signup::form::{self, FieldKind};
use crate::signup::{SignupApplication, SignupOutcome, SignupWizard, Step};
use crate::views::{self, EarnSortKey, JobSortKey, MarketSortKey};

// ============================================================================
// Enum : Screen
// ============================================================================
// CONCEPT RUST : Enums pour state machines
// - Un seul écran actif à la fois
// - clap::ValueEnum : le même enum sert pour l'option --screen
// ============================================================================

/// Écrans de l'application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Screen {
    /// Cotations crypto
    #[default]
    Crypto,

    /// Paires de devises
    Forex,

    /// Offres d'emploi du CMS
    Jobs,

    /// Produits de rendement
    Earn,

    /// Inscription institutionnelle
    Signup,
}

impl Screen {
    pub const ALL: [Screen; 5] = [
        Screen::Crypto,
        Screen::Forex,
        Screen::Jobs,
        Screen::Earn,
        Screen::Signup,
    ];

    pub fn index(self) -> usize {
        match self {
            Screen::Crypto => 0,
            Screen::Forex => 1,
            Screen::Jobs => 2,
            Screen::Earn => 3,
            Screen::Signup => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Screen::Crypto => "Crypto",
            Screen::Forex => "Forex",
            Screen::Jobs => "Carrières",
            Screen::Earn => "Earn",
            Screen::Signup => "Inscription",
        }
    }

    pub fn next(self) -> Screen {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn previous(self) -> Screen {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// Écrans qui affichent une liste filtrable
    pub fn is_list(self) -> bool {
        !matches!(self, Screen::Signup)
    }

    /// Écrans avec favoris
    pub fn has_favorites(self) -> bool {
        matches!(self, Screen::Crypto | Screen::Forex)
    }
}

/// Mode de saisie clavier
///
/// CONCEPT : Modal input (Vim-like)
/// - Normal : les touches sont des raccourcis
/// - Search : les caractères vont dans la recherche de la page
/// - FieldEdit : les caractères vont dans le champ du formulaire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    Search,
    FieldEdit,
}

/// Avancement de l'envoi de l'inscription
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SignupStatus {
    /// Formulaire en cours de saisie
    #[default]
    Editing,
    /// Requêtes en cours vers le CMS
    Submitting,
    Done(SignupOutcome),
    Failed(String),
}

/// État principal de l'application
pub struct App {
    /// Indique si l'application doit continuer à tourner
    pub running: bool,

    /// Confirmation de quit en attente (two-step quit)
    pub confirm_quit: bool,

    pub screen: Screen,
    pub mode: Mode,

    /// Derniers snapshots installés, un par flux
    pub crypto: Dataset,
    pub forex: Dataset,

    /// Offres d'emploi ; l'erreur de chargement est affichée à la place de la liste
    pub jobs: Vec<JobPosting>,
    pub jobs_error: Option<String>,
    pub jobs_loading: bool,

    pub earn: Vec<EarnProduct>,

    pub crypto_filter: FilterState<MarketSortKey>,
    pub forex_filter: FilterState<MarketSortKey>,
    pub jobs_filter: FilterState<JobSortKey>,
    pub earn_filter: FilterState<EarnSortKey>,

    pub crypto_favorites: FavoritesStore,
    pub forex_favorites: FavoritesStore,

    /// Lieu retenu sur la page carrières (None = tous)
    pub job_location: Option<Location>,

    crypto_config: ViewConfig<MarketItem>,
    forex_config: ViewConfig<MarketItem>,
    jobs_config: ViewConfig<JobPosting>,
    earn_config: ViewConfig<EarnProduct>,

    /// Ligne sélectionnée, par écran
    selected: [usize; Screen::ALL.len()],

    /// Buffer du champ en cours d'édition
    pub input_buffer: String,

    pub wizard: SignupWizard,
    pub signup_status: SignupStatus,

    /// Message de validation de l'étape courante
    pub signup_error: Option<String>,

    /// Message d'information affiché dans le footer
    pub status_message: Option<String>,
}

impl App {
    /// Crée l'état initial avec les favoris chargés
    pub fn new(crypto_favorites: FavoritesStore, forex_favorites: FavoritesStore) -> Self {
        Self {
            running: true,
            confirm_quit: false,
            screen: Screen::default(),
            mode: Mode::default(),
            crypto: Dataset::new(),
            forex: Dataset::new(),
            jobs: Vec::new(),
            jobs_error: None,
            jobs_loading: false,
            earn: models::earn_product::catalog(),
            crypto_filter: FilterState::new("all"),
            forex_filter: FilterState::new("major"),
            jobs_filter: FilterState::new("all"),
            // La page earn est classée par rendement décroissant
            earn_filter: FilterState::new("all").sorted_by(EarnSortKey::Apy, SortDirection::Desc),
            crypto_favorites,
            forex_favorites,
            job_location: None,
            crypto_config: views::crypto_view(BTreeSet::new()),
            forex_config: views::forex_view(),
            jobs_config: views::jobs_view(None),
            earn_config: views::earn_view(),
            selected: [0; Screen::ALL.len()],
            input_buffer: String::new(),
            wizard: SignupWizard::new(),
            signup_status: SignupStatus::default(),
            signup_error: None,
            status_message: None,
        }
    }

    /// Démarre sur un écran donné (option --screen)
    pub fn with_screen(mut self, screen: Screen) -> Self {
        self.screen = screen;
        self
    }

    // ========================================================================
    // Cycle de vie
    // ========================================================================

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Première pression sur 'q' : demande confirmation
    pub fn request_quit(&mut self) {
        self.confirm_quit = true;
    }

    pub fn cancel_quit(&mut self) {
        self.confirm_quit = false;
    }

    pub fn is_awaiting_quit_confirmation(&self) -> bool {
        self.confirm_quit
    }

    /// Appelé à chaque tour de boucle
    pub fn tick(&mut self) {
        // Les données changent sous la sélection : on la garde dans la liste
        self.clamp_selection();
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    // ========================================================================
    // Données entrantes
    // ========================================================================

    /// Installe le résultat d'un tick du poller
    pub fn apply_poll(&mut self, event: PollEvent) -> bool {
        let changed = match event.feed() {
            Feed::Crypto => self.crypto.apply(event),
            Feed::Forex => self.forex.apply(event),
        };
        if changed {
            self.clamp_selection();
        }
        changed
    }

    /// Résultat du chargement des offres d'emploi
    ///
    /// En cas d'échec la liste est vidée et le message est affiché.
    pub fn set_jobs(&mut self, result: Result<Vec<JobPosting>, String>) {
        self.jobs_loading = false;
        match result {
            Ok(jobs) => {
                info!(count = jobs.len(), "Careers installed");
                self.jobs = jobs;
                self.jobs_error = None;
            }
            Err(error) => {
                warn!(error = %error, "Careers unavailable");
                self.jobs.clear();
                self.jobs_error = Some(error);
            }
        }
        self.clamp_selection();
    }

    /// Ids de la catégorie "trending" (source séparée)
    pub fn set_trending(&mut self, ids: BTreeSet<String>) {
        debug!(count = ids.len(), "Trending ids installed");
        self.crypto_config = views::crypto_view(ids);
        self.clamp_selection();
    }

    // ========================================================================
    // Vues dérivées
    // ========================================================================
    // CONCEPT RUST : Lifetimes élidées
    // - DerivedView<'_, T> emprunte self
    // - Recalculée à chaque appel : jamais désynchronisée des filtres
    // ========================================================================

    pub fn crypto_view(&self) -> DerivedView<'_, MarketItem> {
        derive_view(
            &self.crypto.items,
            &self.crypto_config,
            &self.crypto_filter,
            &self.crypto_favorites,
        )
    }

    pub fn forex_view(&self) -> DerivedView<'_, MarketItem> {
        derive_view(
            &self.forex.items,
            &self.forex_config,
            &self.forex_filter,
            &self.forex_favorites,
        )
    }

    pub fn jobs_view(&self) -> DerivedView<'_, JobPosting> {
        derive_view(&self.jobs, &self.jobs_config, &self.jobs_filter, &NoFavorites)
    }

    pub fn earn_view(&self) -> DerivedView<'_, EarnProduct> {
        derive_view(&self.earn, &self.earn_config, &self.earn_filter, &NoFavorites)
    }

    /// Nombre de lignes affichées sur l'écran courant
    pub fn visible_len(&self) -> usize {
        match self.screen {
            Screen::Crypto => self.crypto_view().len(),
            Screen::Forex => self.forex_view().len(),
            Screen::Jobs => self.jobs_view().len(),
            Screen::Earn => self.earn_view().len(),
            Screen::Signup => 0,
        }
    }

    /// Catégories de l'écran courant, dans l'ordre des onglets
    pub fn category_names(&self) -> Vec<&str> {
        match self.screen {
            Screen::Crypto => self.crypto_config.category_names(),
            Screen::Forex => self.forex_config.category_names(),
            Screen::Jobs => self.jobs_config.category_names(),
            Screen::Earn => self.earn_config.category_names(),
            Screen::Signup => Vec::new(),
        }
    }

    /// Catégorie active de l'écran courant
    pub fn current_category(&self) -> &str {
        match self.screen {
            Screen::Crypto => &self.crypto_filter.category,
            Screen::Forex => &self.forex_filter.category,
            Screen::Jobs => &self.jobs_filter.category,
            Screen::Earn => &self.earn_filter.category,
            Screen::Signup => "",
        }
    }

    /// Recherche active de l'écran courant
    pub fn current_query(&self) -> &str {
        match self.screen {
            Screen::Crypto => &self.crypto_filter.query,
            Screen::Forex => &self.forex_filter.query,
            Screen::Jobs => &self.jobs_filter.query,
            Screen::Earn => &self.earn_filter.query,
            Screen::Signup => "",
        }
    }

    /// Tri actif, sous forme "price ↓"
    pub fn current_sort_label(&self) -> Option<String> {
        fn label<K>(filter: &FilterState<K>, name: impl Fn(&K) -> &'static str) -> Option<String> {
            filter
                .sort
                .as_ref()
                .map(|spec| format!("{} {}", name(&spec.key), spec.direction.arrow()))
        }

        match self.screen {
            Screen::Crypto => label(&self.crypto_filter, MarketSortKey::label),
            Screen::Forex => label(&self.forex_filter, MarketSortKey::label),
            Screen::Jobs => label(&self.jobs_filter, JobSortKey::label),
            Screen::Earn => label(&self.earn_filter, EarnSortKey::label),
            Screen::Signup => None,
        }
    }

    pub fn favorites_only(&self) -> bool {
        match self.screen {
            Screen::Crypto => self.crypto_filter.favorites_only,
            Screen::Forex => self.forex_filter.favorites_only,
            _ => false,
        }
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    pub fn selected_index(&self) -> usize {
        self.selected[self.screen.index()]
    }

    pub fn navigate_up(&mut self) {
        let selected = &mut self.selected[self.screen.index()];
        *selected = selected.saturating_sub(1);
    }

    pub fn navigate_down(&mut self) {
        let len = self.visible_len();
        let selected = &mut self.selected[self.screen.index()];
        if *selected + 1 < len {
            *selected += 1;
        }
    }

    pub fn next_screen(&mut self) {
        self.show_screen(self.screen.next());
    }

    pub fn previous_screen(&mut self) {
        self.show_screen(self.screen.previous());
    }

    pub fn show_screen(&mut self, screen: Screen) {
        debug!(from = ?self.screen, to = ?screen, "Screen changed");
        self.screen = screen;
        self.mode = Mode::Normal;
        self.status_message = None;
        self.clamp_selection();
    }

    /// Ramène la sélection dans les bornes de la liste affichée
    fn clamp_selection(&mut self) {
        let len = self.visible_len();
        let selected = &mut self.selected[self.screen.index()];
        if *selected >= len {
            *selected = len.saturating_sub(1);
        }
    }

    fn reset_selection(&mut self) {
        self.selected[self.screen.index()] = 0;
    }

    /// Instrument sélectionné (écrans crypto et forex)
    pub fn selected_market_item(&self) -> Option<&MarketItem> {
        let index = self.selected_index();
        match self.screen {
            Screen::Crypto => self.crypto_view().get(index),
            Screen::Forex => self.forex_view().get(index),
            _ => None,
        }
    }

    /// Offre sélectionnée (écran carrières)
    pub fn selected_job(&self) -> Option<&JobPosting> {
        match self.screen {
            Screen::Jobs => self.jobs_view().get(self.selected_index()),
            _ => None,
        }
    }

    // ========================================================================
    // Filtres
    // ========================================================================

    /// Onglet suivant (Tab)
    pub fn cycle_category(&mut self) {
        match self.screen {
            Screen::Crypto => {
                self.crypto_filter.category = self.crypto_config.next_category(&self.crypto_filter.category)
            }
            Screen::Forex => {
                self.forex_filter.category = self.forex_config.next_category(&self.forex_filter.category)
            }
            Screen::Jobs => {
                self.jobs_filter.category = self.jobs_config.next_category(&self.jobs_filter.category)
            }
            Screen::Earn => {
                self.earn_filter.category = self.earn_config.next_category(&self.earn_filter.category)
            }
            Screen::Signup => return,
        }
        debug!(screen = ?self.screen, category = %self.current_category(), "Category changed");
        self.reset_selection();
    }

    /// Clé de tri suivante ('s') ; le premier appui active le tri
    pub fn cycle_sort_key(&mut self) {
        fn cycle<K: Copy>(filter: &mut FilterState<K>, first: K, next: impl Fn(K) -> K) {
            filter.sort = Some(match filter.sort {
                Some(mut spec) => {
                    spec.key = next(spec.key);
                    spec
                }
                None => SortSpec {
                    key: first,
                    direction: SortDirection::Asc,
                },
            });
        }

        match self.screen {
            Screen::Crypto => cycle(&mut self.crypto_filter, MarketSortKey::ALL[0], MarketSortKey::next),
            Screen::Forex => cycle(&mut self.forex_filter, MarketSortKey::ALL[0], MarketSortKey::next),
            Screen::Jobs => cycle(&mut self.jobs_filter, JobSortKey::ALL[0], JobSortKey::next),
            Screen::Earn => cycle(&mut self.earn_filter, EarnSortKey::ALL[0], EarnSortKey::next),
            Screen::Signup => return,
        }
        debug!(screen = ?self.screen, sort = ?self.current_sort_label(), "Sort key changed");
        self.reset_selection();
    }

    /// Inverse la direction du tri ('r') ; sans effet si aucun tri n'est actif
    pub fn toggle_sort_direction(&mut self) {
        fn flip<K>(filter: &mut FilterState<K>) {
            if let Some(spec) = filter.sort.as_mut() {
                spec.direction = spec.direction.toggle();
            }
        }

        match self.screen {
            Screen::Crypto => flip(&mut self.crypto_filter),
            Screen::Forex => flip(&mut self.forex_filter),
            Screen::Jobs => flip(&mut self.jobs_filter),
            Screen::Earn => flip(&mut self.earn_filter),
            Screen::Signup => return,
        }
        self.reset_selection();
    }

    /// Bascule le mode "favoris uniquement" ('F')
    pub fn toggle_favorites_only(&mut self) {
        let filter = match self.screen {
            Screen::Crypto => &mut self.crypto_filter,
            Screen::Forex => &mut self.forex_filter,
            _ => return,
        };
        filter.favorites_only = !filter.favorites_only;
        debug!(screen = ?self.screen, favorites_only = filter.favorites_only, "Favorites filter toggled");
        self.reset_selection();
    }

    /// Ajoute ou retire l'instrument sélectionné des favoris ('f')
    ///
    /// Retourne (id, nouvelle appartenance) ou None si rien n'est sélectionné.
    pub fn toggle_selected_favorite(&mut self) -> Option<(String, bool)> {
        let id = self.selected_market_item()?.id.clone();
        let now_favorite = match self.screen {
            Screen::Crypto => self.crypto_favorites.toggle(&id),
            Screen::Forex => self.forex_favorites.toggle(&id),
            _ => return None,
        };
        // En mode favoris uniquement, l'item peut disparaître de la liste
        self.clamp_selection();
        Some((id, now_favorite))
    }

    pub fn is_favorite(&self, item: &MarketItem) -> bool {
        if item.is_forex() {
            self.forex_favorites.is_favorite(&item.id)
        } else {
            self.crypto_favorites.is_favorite(&item.id)
        }
    }

    /// Lieu suivant sur la page carrières ('L') : tous -> London -> ... -> tous
    pub fn cycle_job_location(&mut self) {
        let known = Location::KNOWN;
        self.job_location = match &self.job_location {
            None => known.first().cloned(),
            Some(current) => known
                .iter()
                .position(|location| location == current)
                .and_then(|i| known.get(i + 1))
                .cloned(),
        };
        self.jobs_config = views::jobs_view(self.job_location.clone());
        debug!(location = ?self.job_location, "Job location changed");
        self.reset_selection();
    }

    /// Recherche en cours de saisie : chaque caractère filtre immédiatement
    pub fn start_search(&mut self) {
        if self.screen.is_list() {
            self.mode = Mode::Search;
        }
    }

    fn query_mut(&mut self) -> Option<&mut String> {
        match self.screen {
            Screen::Crypto => Some(&mut self.crypto_filter.query),
            Screen::Forex => Some(&mut self.forex_filter.query),
            Screen::Jobs => Some(&mut self.jobs_filter.query),
            Screen::Earn => Some(&mut self.earn_filter.query),
            Screen::Signup => None,
        }
    }

    /// Enter : garde la recherche et revient en mode normal
    pub fn finish_search(&mut self) {
        self.mode = Mode::Normal;
    }

    /// ESC : efface la recherche
    pub fn cancel_search(&mut self) {
        if let Some(query) = self.query_mut() {
            query.clear();
        }
        self.mode = Mode::Normal;
        self.reset_selection();
    }

    // ========================================================================
    // Saisie
    // ========================================================================

    /// Ajoute un caractère à la recherche ou au champ édité
    pub fn append_char(&mut self, c: char) {
        match self.mode {
            Mode::Search => {
                if let Some(query) = self.query_mut() {
                    query.push(c);
                }
                self.reset_selection();
            }
            Mode::FieldEdit => self.input_buffer.push(c),
            Mode::Normal => {}
        }
    }

    pub fn backspace(&mut self) {
        match self.mode {
            Mode::Search => {
                if let Some(query) = self.query_mut() {
                    query.pop();
                }
                self.reset_selection();
            }
            Mode::FieldEdit => {
                self.input_buffer.pop();
            }
            Mode::Normal => {}
        }
    }

    // ========================================================================
    // Inscription
    // ========================================================================

    /// Enter sur un champ : édition texte, case à cocher ou choix suivant
    pub fn activate_field(&mut self) {
        let Some(spec) = self.wizard.focused_field() else {
            return;
        };

        match spec.kind {
            FieldKind::Text | FieldKind::Secret => {
                self.input_buffer = match self.wizard.form().field(spec.key) {
                    Some(form::FieldValue::Text(text)) => text.to_string(),
                    _ => String::new(),
                };
                self.mode = Mode::FieldEdit;
            }
            FieldKind::Flag => {
                form::toggle_flag(self.wizard.form_mut(), spec.key);
            }
            FieldKind::Choice(_) => {
                form::cycle_choice(self.wizard.form_mut(), &spec);
            }
            FieldKind::Multi(options) => {
                self.set_status(format!("Touches 1-{} pour choisir", options.len()));
            }
        }
        self.signup_error = None;
    }

    /// Touche numérique sur un champ à choix multiples : bascule l'option `n` (1..)
    pub fn toggle_field_option(&mut self, n: usize) -> bool {
        let Some(spec) = self.wizard.focused_field() else {
            return false;
        };
        let FieldKind::Multi(options) = spec.kind else {
            return false;
        };
        match n.checked_sub(1).and_then(|i| options.get(i)) {
            Some(option) => form::toggle_option(self.wizard.form_mut(), spec.key, option),
            None => false,
        }
    }

    /// '+' : nouvelle personne autorisée (étape Contact)
    pub fn add_authorized_person(&mut self) {
        self.signup_error = self.wizard.add_authorized_person().err().map(|e| e.to_string());
    }

    /// '-' : retire une personne autorisée ; refusé pour la dernière
    pub fn remove_authorized_person(&mut self) {
        self.signup_error = self.wizard.remove_authorized_person().err().map(|e| e.to_string());
    }

    /// Enter en mode édition : écrit le buffer dans le champ
    pub fn commit_field_edit(&mut self) {
        if let Some(spec) = self.wizard.focused_field() {
            let value = std::mem::take(&mut self.input_buffer);
            form::set_text(self.wizard.form_mut(), spec.key, value);
        }
        self.mode = Mode::Normal;
    }

    /// ESC en mode édition : le champ garde sa valeur
    pub fn cancel_field_edit(&mut self) {
        self.input_buffer.clear();
        self.mode = Mode::Normal;
    }

    /// Étape suivante ; le message d'erreur reste affiché jusqu'à la prochaine action
    pub fn wizard_next(&mut self) -> Option<Step> {
        match self.wizard.next() {
            Ok(step) => {
                self.signup_error = None;
                Some(step)
            }
            Err(e) => {
                self.signup_error = Some(e.to_string());
                None
            }
        }
    }

    pub fn wizard_back(&mut self) -> bool {
        self.signup_error = None;
        self.wizard.back()
    }

    /// Valide le dossier et le retire de l'état pour l'envoyer
    ///
    /// Le formulaire est abandonné dès l'envoi : un nouvel assistant vierge
    /// le remplace, que l'inscription réussisse ou non.
    pub fn take_signup_application(&mut self) -> Option<SignupApplication> {
        if self.signup_status == SignupStatus::Submitting {
            return None;
        }

        match self.wizard.submit() {
            Ok(application) => {
                self.wizard = SignupWizard::new();
                self.signup_error = None;
                self.signup_status = SignupStatus::Submitting;
                Some(application)
            }
            Err(e) => {
                self.signup_error = Some(e.to_string());
                None
            }
        }
    }

    /// Résultat renvoyé par le worker
    pub fn finish_signup(&mut self, result: Result<SignupOutcome, String>) {
        self.signup_status = match result {
            Ok(outcome) => {
                info!(user_id = outcome.user_id, profile_id = outcome.profile_id, "Signup completed");
                SignupStatus::Done(outcome)
            }
            Err(error) => SignupStatus::Failed(error),
        };
    }
}

impl Default for App {
    /// Application sans persistance des favoris
    fn default() -> Self {
        Self::new(
            FavoritesStore::load(Box::new(MemoryStorage::new()), CRYPTO_FAVORITES_KEY),
            FavoritesStore::load(Box::new(MemoryStorage::new()), FOREX_FAVORITES_KEY),
        )
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Department};
    use crate::pipeline::EmptyReason;
    use crate::signup::form::set_text;
    use chrono::Utc;

    fn snapshot(feed: Feed, seq: u64, items: Vec<MarketItem>) -> PollEvent {
        PollEvent::Snapshot {
            feed,
            seq,
            items,
            at: Utc::now(),
        }
    }

    fn coin(id: &str, symbol: &str, price: f64, rank: u32) -> MarketItem {
        MarketItem::new(id, id, symbol, Category::Other("crypto".into()))
            .with_quote(price, 0.0)
            .with_rank(rank)
    }

    fn app_with_coins() -> App {
        let mut app = App::default();
        app.apply_poll(snapshot(
            Feed::Crypto,
            1,
            vec![
                coin("bitcoin", "BTC", 50000.0, 1),
                coin("ethereum", "ETH", 3000.0, 2),
                coin("solana", "SOL", 150.0, 3),
            ],
        ));
        app
    }

    #[test]
    fn test_app_creation() {
        let app = App::default();
        assert!(app.is_running());
        assert_eq!(app.screen, Screen::Crypto);
        assert_eq!(app.mode, Mode::Normal);
        assert!(app.crypto.is_loading());
        assert_eq!(app.crypto_view().empty, Some(EmptyReason::NoData));
        assert!(!app.earn.is_empty());
    }

    #[test]
    fn test_quit_confirmation() {
        let mut app = App::default();
        app.request_quit();
        assert!(app.is_awaiting_quit_confirmation());
        app.cancel_quit();
        assert!(!app.is_awaiting_quit_confirmation());
        app.quit();
        assert!(!app.is_running());
    }

    #[test]
    fn test_screen_cycle() {
        assert_eq!(Screen::Signup.next(), Screen::Crypto);
        assert_eq!(Screen::Crypto.previous(), Screen::Signup);
        for screen in Screen::ALL {
            assert_eq!(screen.next().previous(), screen);
        }
    }

    #[test]
    fn test_navigation_is_bounded() {
        let mut app = app_with_coins();
        app.navigate_up();
        assert_eq!(app.selected_index(), 0);

        for _ in 0..10 {
            app.navigate_down();
        }
        assert_eq!(app.selected_index(), 2);
        assert_eq!(app.selected_market_item().unwrap().id, "solana");
    }

    #[test]
    fn test_selection_follows_shrinking_data() {
        let mut app = app_with_coins();
        app.navigate_down();
        app.navigate_down();

        app.apply_poll(snapshot(Feed::Crypto, 2, vec![coin("bitcoin", "BTC", 1.0, 1)]));
        assert_eq!(app.selected_index(), 0);
    }

    #[test]
    fn test_stale_snapshot_is_ignored() {
        let mut app = app_with_coins();
        assert!(!app.apply_poll(snapshot(Feed::Crypto, 1, Vec::new())));
        assert_eq!(app.crypto.items.len(), 3);

        // Les flux sont indépendants
        assert!(app.apply_poll(snapshot(Feed::Forex, 1, Vec::new())));
        assert_eq!(app.crypto.items.len(), 3);
    }

    #[test]
    fn test_search_filters_live() {
        let mut app = app_with_coins();
        app.start_search();
        for c in "eth".chars() {
            app.append_char(c);
        }
        assert_eq!(app.visible_len(), 1);

        app.finish_search();
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.current_query(), "eth");

        app.start_search();
        app.cancel_search();
        assert_eq!(app.current_query(), "");
        assert_eq!(app.visible_len(), 3);
    }

    #[test]
    fn test_sort_cycle_and_direction() {
        let mut app = app_with_coins();
        assert_eq!(app.current_sort_label(), None);

        // Sans tri actif, 'r' ne fait rien
        app.toggle_sort_direction();
        assert_eq!(app.current_sort_label(), None);

        app.cycle_sort_key();
        assert_eq!(app.current_sort_label().as_deref(), Some("rank ↑"));
        app.cycle_sort_key();
        assert_eq!(app.current_sort_label().as_deref(), Some("price ↑"));
        assert_eq!(app.selected_market_item().unwrap().id, "solana");

        app.toggle_sort_direction();
        assert_eq!(app.current_sort_label().as_deref(), Some("price ↓"));
        assert_eq!(app.selected_market_item().unwrap().id, "bitcoin");
    }

    #[test]
    fn test_category_cycle_and_trending() {
        let mut app = app_with_coins();
        assert_eq!(app.category_names(), vec!["all", "top", "trending"]);

        app.cycle_category();
        app.cycle_category();
        assert_eq!(app.current_category(), "trending");
        assert_eq!(app.visible_len(), 0);

        app.set_trending(["solana".to_string()].into_iter().collect());
        assert_eq!(app.visible_len(), 1);

        app.cycle_category();
        assert_eq!(app.current_category(), "all");
    }

    #[test]
    fn test_favorites_only_flow() {
        let mut app = app_with_coins();
        app.toggle_favorites_only();
        assert_eq!(app.crypto_view().empty, Some(EmptyReason::NoFavorites));

        app.toggle_favorites_only();
        app.navigate_down();
        assert_eq!(app.toggle_selected_favorite(), Some(("ethereum".to_string(), true)));

        app.toggle_favorites_only();
        assert!(app.favorites_only());
        assert_eq!(app.visible_len(), 1);

        // Retirer le dernier favori vide la liste filtrée
        assert_eq!(app.toggle_selected_favorite(), Some(("ethereum".to_string(), false)));
        assert_eq!(app.visible_len(), 0);
        assert_eq!(app.selected_index(), 0);
    }

    #[test]
    fn test_favorites_are_per_feed() {
        let mut app = app_with_coins();
        app.toggle_selected_favorite();
        assert!(app.crypto_favorites.is_favorite("bitcoin"));
        assert!(app.forex_favorites.is_empty());

        // Pas de favoris sur la page carrières
        app.show_screen(Screen::Jobs);
        app.toggle_favorites_only();
        assert!(!app.favorites_only());
        assert_eq!(app.toggle_selected_favorite(), None);
    }

    #[test]
    fn test_jobs_error_and_location() {
        let mut app = App::default();
        app.show_screen(Screen::Jobs);

        app.set_jobs(Err("HTTP 502".into()));
        assert_eq!(app.jobs_error.as_deref(), Some("HTTP 502"));
        assert_eq!(app.jobs_view().empty, Some(EmptyReason::NoData));

        let job = |id: &str, location: Location| JobPosting {
            id: id.into(),
            title: format!("Job {}", id),
            department: Department::Engineering,
            location,
            description: String::new(),
            requirements: String::new(),
            short_description: None,
        };
        app.set_jobs(Ok(vec![job("1", Location::London), job("2", Location::Remote)]));
        assert_eq!(app.jobs_error, None);
        assert_eq!(app.visible_len(), 2);

        app.cycle_job_location();
        assert_eq!(app.job_location, Some(Location::London));
        assert_eq!(app.visible_len(), 1);
        assert_eq!(app.selected_job().unwrap().id, "1");

        for _ in 0..Location::KNOWN.len() {
            app.cycle_job_location();
        }
        assert_eq!(app.job_location, None);
    }

    #[test]
    fn test_earn_sorted_by_apy() {
        let mut app = App::default();
        app.show_screen(Screen::Earn);
        let view = app.earn_view();
        for pair in view.items.windows(2) {
            assert!(pair[0].apy >= pair[1].apy);
        }
        drop(view);

        app.cycle_category();
        assert_eq!(app.current_category(), "staking");
    }

    #[test]
    fn test_field_edit_commit_and_cancel() {
        let mut app = App::default();
        app.show_screen(Screen::Signup);

        app.activate_field();
        assert_eq!(app.mode, Mode::FieldEdit);
        for c in "acme".chars() {
            app.append_char(c);
        }
        app.commit_field_edit();
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(
            app.wizard.form().field("username"),
            Some(form::FieldValue::Text("acme"))
        );

        app.activate_field();
        assert_eq!(app.input_buffer, "acme");
        app.backspace();
        app.cancel_field_edit();
        assert_eq!(
            app.wizard.form().field("username"),
            Some(form::FieldValue::Text("acme"))
        );
    }

    #[test]
    fn test_wizard_error_is_reported() {
        let mut app = App::default();
        app.show_screen(Screen::Signup);

        assert_eq!(app.wizard_next(), None);
        assert!(app.signup_error.is_some());
        assert_eq!(app.wizard.step(), Step::Account);

        assert_eq!(app.take_signup_application(), None);
        assert_eq!(app.signup_status, SignupStatus::Editing);
    }

    #[test]
    fn test_multi_option_by_number() {
        let mut app = App::default();
        {
            let form = app.wizard.form_mut();
            set_text(form, "username", "acme".into());
            set_text(form, "email", "ops@acme.io".into());
            set_text(form, "password", "correct-horse".into());
            set_text(form, "confirm_password", "correct-horse".into());
        }
        app.wizard_next().unwrap();
        {
            let form = app.wizard.form_mut();
            set_text(form, "company_name", "Acme Capital".into());
            set_text(form, "business_registration_number", "RC-42".into());
            set_text(form, "country_of_incorporation", "Singapore".into());
        }
        assert_eq!(app.wizard_next(), Some(Step::Trading));

        app.wizard.focus_field("trading_platforms");
        // mt5 est la première option et cochée par défaut
        assert!(app.toggle_field_option(1));
        assert!(!app.toggle_field_option(0));
        assert!(!app.toggle_field_option(99));
        assert_eq!(app.wizard_next(), None);
        assert_eq!(app.wizard.step(), Step::Trading);
    }

    #[test]
    fn test_authorized_person_keys_report_refusals() {
        let mut app = App::default();
        {
            let form = app.wizard.form_mut();
            set_text(form, "username", "acme".into());
            set_text(form, "email", "ops@acme.io".into());
            set_text(form, "password", "correct-horse".into());
            set_text(form, "confirm_password", "correct-horse".into());
        }
        app.wizard_next().unwrap();
        {
            let form = app.wizard.form_mut();
            set_text(form, "company_name", "Acme Capital".into());
            set_text(form, "business_registration_number", "RC-42".into());
            set_text(form, "country_of_incorporation", "Singapore".into());
        }
        app.wizard_next().unwrap();
        assert_eq!(app.wizard_next(), Some(Step::Contact));

        app.remove_authorized_person();
        assert!(app.signup_error.is_some());

        app.add_authorized_person();
        assert!(app.signup_error.is_none());
        assert_eq!(app.wizard.focused_field().unwrap().key, "person_2_name");

        app.remove_authorized_person();
        assert!(app.signup_error.is_none());
        assert!(app.wizard.form().field("person_2_name").is_none());
    }

    #[test]
    fn test_finish_signup() {
        let mut app = App::default();
        app.signup_status = SignupStatus::Submitting;
        assert_eq!(app.take_signup_application(), None);

        app.finish_signup(Err("échec de l'inscription".into()));
        assert!(matches!(app.signup_status, SignupStatus::Failed(_)));
    }
}
