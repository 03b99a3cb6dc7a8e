// ============================================================================
// BitDash - Tableau de bord marchés, carrières et inscription
// ============================================================================
// Programme TUI :
// - cotations crypto (CoinGecko ou simulées) et forex (simulées), rafraîchies
//   en continu par des pollers
// - offres d'emploi et inscription institutionnelle via le CMS
//
// CONCEPTS RUST CLÉS :
// 1. Terminal raw mode : contrôle total du terminal
// 2. Event loop : boucle qui draine les channels, dessine et lit le clavier
// 3. Async dans sync : les tâches réseau tournent sur un runtime tokio
// 4. Ownership : l'event loop est l'unique propriétaire de App
// ============================================================================

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use bitdash::api::{CoinGeckoSource, StrapiClient};
use bitdash::app::{App, Mode, Screen};
use bitdash::config::{Config, SourceKind};
use bitdash::favorites::{FavoritesStore, FileStorage, CRYPTO_FAVORITES_KEY, FOREX_FAVORITES_KEY};
use bitdash::models::JobPosting;
use bitdash::poller::{Feed, MarketSource, PollEvent, PollHandle, Poller};
use bitdash::signup::{submit_signup, SignupApplication, SignupError, SignupOutcome};
use bitdash::simulated::{self, SimulatedSource};
use bitdash::ui::{events::EventHandler, render};

// ============================================================================
// Ligne de commande
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "bitdash", version, about = "Marchés crypto / forex, carrières et inscription institutionnelle")]
struct Cli {
    /// Fichier de configuration (défaut : <config_dir>/bitdash/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Source des cotations crypto (remplace la configuration)
    #[arg(long, value_enum)]
    source: Option<SourceKind>,

    /// Écran affiché au démarrage
    #[arg(long, value_enum)]
    screen: Option<Screen>,
}

// ============================================================================
// AppCommand / AppResult : échanges avec le worker
// ============================================================================
// CONCEPT RUST : Command pattern avec channels
// - L'event loop envoie des commandes au worker thread
// - Le worker exécute les appels réseau et renvoie un AppResult
// - Les cotations, elles, arrivent directement des pollers (PollEvent)
// ============================================================================

/// Commandes envoyées au worker thread
enum AppCommand {
    /// Charger les offres d'emploi pour une langue
    LoadCareers { locale: String },

    /// Charger les ids "trending" de CoinGecko
    LoadTrending,

    /// Envoyer l'inscription au CMS
    SubmitSignup(Box<SignupApplication>),
}

impl AppCommand {
    /// Nom pour les logs : le dossier d'inscription contient le mot de passe
    fn label(&self) -> &'static str {
        match self {
            AppCommand::LoadCareers { .. } => "load_careers",
            AppCommand::LoadTrending => "load_trending",
            AppCommand::SubmitSignup(_) => "submit_signup",
        }
    }
}

/// Résultats renvoyés par le worker thread
#[derive(Debug)]
enum AppResult {
    CareersLoaded(Result<Vec<JobPosting>, String>),
    TrendingLoaded(BTreeSet<String>),
    SignupFinished(Result<SignupOutcome, String>),
}

// ============================================================================
// Initialisation du logging
// ============================================================================
// Le terminal appartient au TUI : tous les messages passent par tracing vers
// un fichier à rotation quotidienne.
// ============================================================================

/// Initialise le système de logging vers fichier
///
/// # Utilisation
/// ```bash
/// tail -f logs/bitdash.log.$(date +%F)
/// RUST_LOG=bitdash=trace bitdash
/// ```
fn init_logging(log_dir: &Path) -> Result<()> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    std::fs::create_dir_all(log_dir).context("Échec de la création du répertoire de logs")?;

    // Rotation::DAILY : bitdash.log.2024-01-15, bitdash.log.2024-01-16...
    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "bitdash.log");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .with(
            // Par défaut : debug pour bitdash, info pour les dépendances
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bitdash=debug,info".into()),
        )
        .try_init()
        .context("Échec de l'initialisation du logging")?;

    info!(log_dir = %log_dir.display(), "Logging initialisé");
    Ok(())
}

// ============================================================================
// Point d'entrée du programme
// ============================================================================

fn main() -> Result<()> {
    let cli = Cli::parse();

    // La configuration donne le dossier de logs : elle passe en premier
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(source) = cli.source {
        config.market.source = source;
    }

    init_logging(&config.logging.dir).unwrap_or_else(|e| {
        eprintln!("⚠️  Warning: Failed to initialize logging: {:#}", e);
        eprintln!("   Continuing without logging...");
    });

    info!(source = ?config.market.source, cms = %config.cms.base_url, "BitDash starting up");

    // Runtime tokio partagé : pollers + worker
    // CONCEPT RUST : Runtime possédé par main
    // - les tâches vivent tant que `runtime` n'est pas droppé
    // - le worker thread utilise un Handle pour block_on
    let runtime = tokio::runtime::Runtime::new().context("Échec de la création du runtime tokio")?;

    // Favoris persistés dans le dossier de données
    let storage = FileStorage::new(config.data_dir());
    info!(dir = %storage.dir().display(), "Favorites storage");
    let crypto_favorites = FavoritesStore::load(Box::new(storage.clone()), CRYPTO_FAVORITES_KEY);
    let forex_favorites = FavoritesStore::load(Box::new(storage), FOREX_FAVORITES_KEY);

    let mut app = App::new(crypto_favorites, forex_favorites).with_screen(cli.screen.unwrap_or_default());

    // Channels
    // - poll_tx/rx : snapshots des pollers
    // - command_tx/rx : commandes vers le worker
    // - result_tx/rx : résultats du worker
    let (poll_tx, poll_rx) = mpsc::channel::<PollEvent>();
    let (command_tx, command_rx) = mpsc::channel::<AppCommand>();
    let (result_tx, result_rx) = mpsc::channel::<AppResult>();

    // Pollers : gardés en vie jusqu'à la fin de main (Drop = annulation)
    let pollers = spawn_pollers(runtime.handle(), &config, &poll_tx)?;

    // Worker : CMS + trending
    let cms = StrapiClient::new(config.cms.base_url.clone())?;
    let trending = match config.market.source {
        SourceKind::Live => Some(CoinGeckoSource::new(
            config.market.coingecko_url.clone(),
            config.market.per_page,
            config.market.live_timeout(),
        )?),
        SourceKind::Simulated => {
            app.set_trending(simulated::crypto_trending_seed());
            None
        }
    };
    let has_live_trending = trending.is_some();

    info!("Spawning background worker thread");
    spawn_background_worker(runtime.handle().clone(), command_rx, result_tx, cms, trending);

    app.jobs_loading = true;
    send_command(
        &mut app,
        &command_tx,
        AppCommand::LoadCareers {
            locale: config.cms.locale.clone(),
        },
    );
    if has_live_trending {
        send_command(&mut app, &command_tx, AppCommand::LoadTrending);
    }

    debug!("Setting up terminal");
    let mut terminal = setup_terminal()?;

    let events = EventHandler::new();

    info!("Starting event loop");
    let result = run(
        &mut terminal,
        &mut app,
        &events,
        &command_tx,
        &poll_rx,
        &result_rx,
        &config.cms.locale,
    );

    // Restaure le terminal (même en cas d'erreur)
    debug!("Restoring terminal");
    restore_terminal(&mut terminal)?;

    for poller in &pollers {
        poller.cancel();
    }

    match &result {
        Ok(_) => info!("Application exited normally"),
        Err(e) => error!(error = ?e, "Application exited with error"),
    }

    // Le worker s'arrête quand command_tx est droppé ; le runtime est
    // fermé sans attendre les requêtes en cours
    drop(command_tx);
    runtime.shutdown_timeout(Duration::from_millis(500));

    result
}

/// Démarre un poller par flux
///
/// Le forex n'a pas de source live : il est toujours simulé.
fn spawn_pollers(
    runtime: &Handle,
    config: &Config,
    tx: &mpsc::Sender<PollEvent>,
) -> Result<Vec<PollHandle>> {
    let market = &config.market;

    let (crypto_source, crypto_every): (Arc<dyn MarketSource>, Duration) = match market.source {
        SourceKind::Live => (
            Arc::new(CoinGeckoSource::new(
                market.coingecko_url.clone(),
                market.per_page,
                market.live_timeout(),
            )?),
            market.live_interval(),
        ),
        SourceKind::Simulated => (Arc::new(SimulatedSource::crypto()), market.simulated_interval()),
    };

    Ok(vec![
        Poller::spawn(runtime, Feed::Crypto, crypto_source, crypto_every, tx.clone()),
        Poller::spawn(
            runtime,
            Feed::Forex,
            Arc::new(SimulatedSource::forex()),
            market.simulated_interval(),
            tx.clone(),
        ),
    ])
}

// ============================================================================
// Background Worker Thread
// ============================================================================
// CONCEPT RUST : Thread + Handle tokio
// - std::thread::spawn() : crée un thread OS
// - Handle::block_on() : exécute une future sur le runtime de main
// - La boucle s'arrête quand le channel de commandes est fermé
// ============================================================================

fn spawn_background_worker(
    runtime: Handle,
    command_rx: mpsc::Receiver<AppCommand>,
    result_tx: mpsc::Sender<AppResult>,
    cms: StrapiClient,
    trending: Option<CoinGeckoSource>,
) {
    std::thread::spawn(move || {
        while let Ok(command) = command_rx.recv() {
            info!(command = command.label(), "Worker received command");

            let result = match command {
                AppCommand::LoadCareers { locale } => {
                    let careers = runtime.block_on(cms.fetch_careers(&locale)).map_err(|e| {
                        error!(error = ?e, "Failed to load careers");
                        format!("{:#}", e)
                    });
                    AppResult::CareersLoaded(careers)
                }

                AppCommand::LoadTrending => {
                    let Some(source) = &trending else {
                        continue;
                    };
                    match runtime.block_on(source.fetch_trending_ids()) {
                        Ok(ids) => AppResult::TrendingLoaded(ids),
                        Err(e) => {
                            // La catégorie trending reste vide, le reste de l'écran fonctionne
                            warn!(error = ?e, "Failed to load trending ids");
                            continue;
                        }
                    }
                }

                AppCommand::SubmitSignup(application) => {
                    let outcome = runtime
                        .block_on(submit_signup(&cms, &application, Utc::now()))
                        .map_err(|e| describe_signup_error(&e));
                    AppResult::SignupFinished(outcome)
                }
            };

            if result_tx.send(result).is_err() {
                break;
            }
        }

        info!("Worker thread exiting (channel closed)");
    });
}

/// Envoie une commande au worker
///
/// Si le worker est arrêté, la commande revient dans SendError : l'écran
/// concerné sort de son état "en cours" avec un message d'erreur.
fn send_command(app: &mut App, command_tx: &mpsc::Sender<AppCommand>, command: AppCommand) {
    let label = command.label();
    let Err(mpsc::SendError(command)) = command_tx.send(command) else {
        return;
    };

    error!(command = label, "Worker channel closed, command dropped");
    let message = "tâche de fond arrêtée : relancez bitdash".to_string();
    match command {
        AppCommand::LoadCareers { .. } => app.set_jobs(Err(message)),
        AppCommand::SubmitSignup(_) => app.finish_signup(Err(message)),
        AppCommand::LoadTrending => {}
    }
}

/// Message affiché : l'erreur et les ressources laissées sur le CMS
fn describe_signup_error(error: &SignupError) -> String {
    let created = error.created();
    if created.is_empty() {
        return error.to_string();
    }

    let list: Vec<String> = created.iter().map(|resource| resource.to_string()).collect();
    format!("{} ; déjà créé(s) : {}", error, list.join(", "))
}

// ============================================================================
// Event Loop Principal
// ============================================================================
// À chaque itération :
//   0. Drainer les channels (pollers, worker)
//   1. Dessiner l'interface
//   2. Traiter un événement clavier
//   3. Mettre à jour l'état
// ============================================================================

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    events: &EventHandler,
    command_tx: &mpsc::Sender<AppCommand>,
    poll_rx: &mpsc::Receiver<PollEvent>,
    result_rx: &mpsc::Receiver<AppResult>,
    locale: &str,
) -> Result<()> {
    while app.is_running() {
        // ========================================
        // 0. RÉSULTATS
        // ========================================
        // CONCEPT : try_recv en boucle
        // - On installe tout ce qui est arrivé depuis le dernier tour
        // - Dataset::apply ignore les snapshots plus anciens
        while let Ok(event) = poll_rx.try_recv() {
            app.apply_poll(event);
        }

        loop {
            match result_rx.try_recv() {
                Ok(AppResult::CareersLoaded(careers)) => app.set_jobs(careers),
                Ok(AppResult::TrendingLoaded(ids)) => app.set_trending(ids),
                Ok(AppResult::SignupFinished(outcome)) => app.finish_signup(outcome),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    error!("Worker thread disconnected!");
                    break;
                }
            }
        }

        // ========================================
        // 1. RENDER
        // ========================================
        terminal.draw(|frame| render(frame, app))?;

        // ========================================
        // 2. INPUT
        // ========================================
        if let Ok(event) = events.next() {
            handle_event(app, event, command_tx, locale);
        }

        // ========================================
        // 3. UPDATE
        // ========================================
        app.tick();
    }

    Ok(())
}

// ============================================================================
// Gestion des événements
// ============================================================================

/// Traite un événement et met à jour l'état de l'application
///
/// CONCEPT RUST : Pattern matching avec guards
/// - Le mode de saisie passe en premier : en recherche, 'q' est une lettre
/// - Ensuite les raccourcis globaux, puis ceux de l'écran courant
fn handle_event(
    app: &mut App,
    event: bitdash::ui::events::Event,
    command_tx: &mpsc::Sender<AppCommand>,
    locale: &str,
) {
    use bitdash::ui::events::{
        get_char_from_event, is_backspace_event, is_down_event, is_enter_event,
        is_escape_event, is_favorite_event, is_favorites_only_event, is_left_event,
        is_location_event, is_quit_event, is_reload_event, is_reverse_event, is_right_event,
        is_search_event, is_sort_event, is_tab_event, is_text_char_event, is_up_event, Event,
    };

    if !matches!(event, Event::Key(_)) {
        return;
    }

    // Toute touche autre que 'q' annule la confirmation de quit
    if !(app.mode == Mode::Normal && is_quit_event(&event)) {
        app.cancel_quit();
    }
    app.status_message = None;

    match event {
        // ========================================
        // Modes de saisie
        // ========================================
        Event::Key(_) if app.mode == Mode::Search => {
            if is_enter_event(&event) {
                debug!(query = %app.current_query(), "User kept search");
                app.finish_search();
            } else if is_escape_event(&event) {
                app.cancel_search();
            } else if is_backspace_event(&event) {
                app.backspace();
            } else if is_text_char_event(&event) {
                if let Some(c) = get_char_from_event(&event) {
                    app.append_char(c);
                }
            }
        }

        Event::Key(_) if app.mode == Mode::FieldEdit => {
            if is_enter_event(&event) {
                app.commit_field_edit();
            } else if is_escape_event(&event) {
                app.cancel_field_edit();
            } else if is_backspace_event(&event) {
                app.backspace();
            } else if is_text_char_event(&event) {
                if let Some(c) = get_char_from_event(&event) {
                    app.append_char(c);
                }
            }
        }

        // ========================================
        // Raccourcis globaux
        // ========================================
        Event::Key(_) if is_quit_event(&event) => {
            if app.is_awaiting_quit_confirmation() {
                info!("User confirmed quit");
                app.quit();
            } else {
                info!("User requested quit (awaiting confirmation)");
                app.request_quit();
            }
        }

        Event::Key(_) if is_right_event(&event) => app.next_screen(),
        Event::Key(_) if is_left_event(&event) => app.previous_screen(),

        Event::Key(_) if app.screen == Screen::Signup => handle_signup_event(app, &event, command_tx),

        // ========================================
        // Écrans de liste
        // ========================================
        Event::Key(_) if is_up_event(&event) => app.navigate_up(),
        Event::Key(_) if is_down_event(&event) => app.navigate_down(),
        Event::Key(_) if is_tab_event(&event) => app.cycle_category(),
        Event::Key(_) if is_search_event(&event) => app.start_search(),
        Event::Key(_) if is_sort_event(&event) => app.cycle_sort_key(),
        Event::Key(_) if is_reverse_event(&event) => app.toggle_sort_direction(),

        Event::Key(_) if is_favorite_event(&event) => {
            if let Some((id, now_favorite)) = app.toggle_selected_favorite() {
                info!(id = %id, now_favorite, "User toggled favorite");
                let verb = if now_favorite { "ajouté aux" } else { "retiré des" };
                app.set_status(format!("{} {} favoris", id, verb));
            }
        }

        Event::Key(_) if is_favorites_only_event(&event) => app.toggle_favorites_only(),

        Event::Key(_) if is_location_event(&event) && app.screen == Screen::Jobs => {
            app.cycle_job_location()
        }

        Event::Key(_) if is_reload_event(&event) && app.screen == Screen::Jobs => {
            info!(locale, "User requested careers reload");
            app.jobs_loading = true;
            send_command(
                app,
                command_tx,
                AppCommand::LoadCareers {
                    locale: locale.to_string(),
                },
            );
        }

        _ => {}
    }
}

/// Touches de l'écran d'inscription (mode normal)
fn handle_signup_event(
    app: &mut App,
    event: &bitdash::ui::events::Event,
    command_tx: &mpsc::Sender<AppCommand>,
) {
    use bitdash::ui::events::{
        get_digit_from_event, is_add_event, is_down_event, is_enter_event, is_escape_event,
        is_next_step_event, is_previous_step_event, is_remove_event, is_space_event,
        is_submit_event, is_up_event,
    };

    if is_up_event(event) {
        app.wizard.focus_previous();
    } else if is_down_event(event) {
        app.wizard.focus_next();
    } else if is_enter_event(event) || is_space_event(event) {
        app.activate_field();
    } else if let Some(n) = get_digit_from_event(event) {
        app.toggle_field_option(n);
    } else if is_next_step_event(event) {
        if let Some(step) = app.wizard_next() {
            info!(step = %step, "Signup step reached");
        }
    } else if is_previous_step_event(event) {
        app.wizard_back();
    } else if is_add_event(event) {
        app.add_authorized_person();
    } else if is_remove_event(event) {
        app.remove_authorized_person();
    } else if is_submit_event(event) {
        if let Some(application) = app.take_signup_application() {
            info!(company = %application.company.company_name, "Submitting signup");
            send_command(app, command_tx, AppCommand::SubmitSignup(Box::new(application)));
        }
    } else if is_escape_event(event) {
        app.signup_error = None;
    }
}

// ============================================================================
// Setup et restauration du terminal
// ============================================================================
// IMPORTANT : Toujours restaurer le terminal avant de quitter !
// ============================================================================

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(|e| e.into())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;

    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;

    terminal.show_cursor()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitdash::app::SignupStatus;

    #[test]
    fn test_closed_worker_ends_careers_loading() {
        let (command_tx, command_rx) = mpsc::channel();
        drop(command_rx);

        let mut app = App::default();
        app.jobs_loading = true;
        send_command(&mut app, &command_tx, AppCommand::LoadCareers { locale: "en".into() });

        assert!(!app.jobs_loading);
        assert!(app.jobs_error.is_some());
    }

    #[test]
    fn test_closed_worker_fails_pending_signup() {
        let (command_tx, command_rx) = mpsc::channel();
        drop(command_rx);

        let mut app = App::default();
        app.signup_status = SignupStatus::Submitting;
        let mut wizard = bitdash::signup::SignupWizard::new();
        let application = loop {
            if let Ok(application) = wizard.submit() {
                break application;
            }
            fill_step(&mut wizard);
            if wizard.step() != bitdash::signup::Step::Terms {
                wizard.next().unwrap();
            }
        };
        send_command(&mut app, &command_tx, AppCommand::SubmitSignup(Box::new(application)));

        assert!(matches!(app.signup_status, SignupStatus::Failed(_)));
    }

    /// Remplit l'étape courante avec des valeurs valides
    fn fill_step(wizard: &mut bitdash::signup::SignupWizard) {
        use bitdash::signup::form::{set_text, toggle_flag};

        for (key, value) in [
            ("username", "acme"),
            ("email", "ops@acme.io"),
            ("password", "correct-horse"),
            ("confirm_password", "correct-horse"),
            ("company_name", "Acme Capital"),
            ("business_registration_number", "RC-42"),
            ("country_of_incorporation", "Singapore"),
            ("primary_name", "Jane Doe"),
            ("primary_email", "jane@acme.io"),
            ("street", "1 Raffles Place"),
            ("city", "Singapore"),
            ("country", "SG"),
        ] {
            set_text(wizard.form_mut(), key, value.into());
        }
        if wizard.step() == bitdash::signup::Step::Terms {
            toggle_flag(wizard.form_mut(), "agreed_to_terms");
            toggle_flag(wizard.form_mut(), "agreed_to_data_policy");
        }
    }

    #[test]
    fn test_cli_parses_source_and_screen() {
        let cli = Cli::parse_from(["bitdash", "--source", "simulated", "--screen", "jobs"]);
        assert_eq!(cli.source, Some(SourceKind::Simulated));
        assert_eq!(cli.screen, Some(Screen::Jobs));
        assert!(cli.config.is_none());
    }
}
