// ============================================================================
// Dashboard - Rendu des écrans de liste
// ============================================================================
// Crypto, forex, carrières et earn partagent le même squelette :
// header (onglets d'écrans) / barre de filtres / liste / footer
//
// CONCEPTS RATATUI :
// 1. Layout : découpage de l'espace en zones
// 2. List + ListState : la sélection fait défiler la liste
// 3. Tabs : onglets d'écrans et de catégories
//
// Une vue vide affiche toujours un message explicite (chargement, aucun
// favori, aucun résultat), jamais une zone blanche.
// ============================================================================

use chrono::{DateTime, Local, Utc};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame,
};

use crate::app::{App, Mode, Screen};
use crate::models::{JobPosting, MarketItem};
use crate::pipeline::{DerivedView, EmptyReason};
use crate::poller::Dataset;
use crate::signup::Step;
use crate::ui::signup;

/// Dessine l'interface complète
///
/// CONCEPT RUST : Routing avec match sur enum
/// - Le formulaire d'inscription a son propre rendu
/// - Les quatre écrans de liste partagent celui-ci
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = create_layout(frame.size());

    render_header(frame, app, chunks[0]);

    match app.screen {
        Screen::Signup => signup::render_signup(frame, app, chunks[1].union(chunks[2])),
        _ => {
            render_filter_bar(frame, app, chunks[1]);
            render_main_content(frame, app, chunks[2]);
        }
    }

    render_footer(frame, app, chunks[3]);
}

/// Header (3) / filtres (3) / contenu / footer (3)
fn create_layout(area: Rect) -> Vec<Rect> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area)
        .to_vec()
}

// ============================================================================
// Header : onglets d'écrans
// ============================================================================

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" BitDash ")
        .title_alignment(Alignment::Center);

    let titles: Vec<Line> = Screen::ALL
        .iter()
        .map(|screen| Line::from(screen.label()))
        .collect();

    let tabs = Tabs::new(titles)
        .block(block)
        .select(app.screen.index())
        .style(Style::default().fg(Color::Gray))
        .highlight_style(
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        );

    frame.render_widget(tabs, area);
}

// ============================================================================
// Barre de filtres : catégorie, recherche, tri, favoris
// ============================================================================

fn render_filter_bar(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let current = app.current_category();
    let mut spans: Vec<Span> = Vec::new();
    for name in app.category_names() {
        let style = if name == current {
            Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(format!(" {} ", name), style));
        spans.push(Span::raw(" "));
    }

    spans.push(Span::raw(" │ "));
    let query = app.current_query();
    if app.mode == Mode::Search {
        spans.push(Span::styled("/", Style::default().fg(Color::Yellow)));
        spans.push(Span::styled(query.to_string(), Style::default().fg(Color::White)));
        spans.push(Span::styled("█", Style::default().add_modifier(Modifier::SLOW_BLINK)));
    } else if !query.is_empty() {
        spans.push(Span::styled(format!("/{}", query), Style::default().fg(Color::Yellow)));
    }

    if let Some(sort) = app.current_sort_label() {
        spans.push(Span::raw("  tri: "));
        spans.push(Span::styled(sort, Style::default().fg(Color::Magenta)));
    }

    if app.favorites_only() {
        spans.push(Span::styled("  ★ favoris", Style::default().fg(Color::Yellow)));
    }

    if app.screen == Screen::Jobs {
        let location = app
            .job_location
            .as_ref()
            .map(|location| location.label().to_string())
            .unwrap_or_else(|| "tous lieux".to_string());
        spans.push(Span::raw("  lieu: "));
        spans.push(Span::styled(location, Style::default().fg(Color::Cyan)));
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}

// ============================================================================
// Contenu principal
// ============================================================================

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    match app.screen {
        Screen::Crypto => render_market(frame, app, &app.crypto, app.crypto_view(), " 📊 Crypto ", area),
        Screen::Forex => render_market(frame, app, &app.forex, app.forex_view(), " 💱 Forex ", area),
        Screen::Jobs => render_jobs(frame, app, area),
        Screen::Earn => render_earn(frame, app, area),
        Screen::Signup => {}
    }
}

/// Heure locale d'une date UTC
fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

/// Titre du bloc : heure de mise à jour, ou marqueur "périmé" après un échec
fn dataset_title(title: &str, dataset: &Dataset) -> Line<'static> {
    let mut spans = vec![Span::raw(title.to_string())];

    match (&dataset.last_error, dataset.updated_at) {
        (Some(_), Some(at)) => spans.push(Span::styled(
            format!("⚠ périmé, màj {} ", local_time(at)),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        (Some(_), None) => spans.push(Span::styled(
            "⚠ indisponible ",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        (None, Some(at)) => spans.push(Span::styled(
            format!("màj {} ", local_time(at)),
            Style::default().fg(Color::DarkGray),
        )),
        (None, None) => {}
    }

    Line::from(spans)
}

/// Message d'une vue vide
///
/// `loading` et `error` précisent le cas NoData (pas encore de données,
/// ou source en erreur).
fn empty_message(reason: EmptyReason, loading: bool, error: Option<&str>, query: &str) -> Line<'static> {
    let (text, color) = match reason {
        EmptyReason::NoData if loading => ("Chargement...".to_string(), Color::Gray),
        EmptyReason::NoData => match error {
            Some(error) => (format!("Données indisponibles : {}", error), Color::Red),
            None => ("Aucune donnée".to_string(), Color::Gray),
        },
        EmptyReason::NoFavorites => ("Aucun favori ([f] pour en ajouter)".to_string(), Color::Yellow),
        EmptyReason::NoMatches if !query.trim().is_empty() => {
            (format!("Aucun résultat pour « {} »", query.trim()), Color::Gray)
        }
        EmptyReason::NoMatches => ("Aucun élément dans cette catégorie".to_string(), Color::Gray),
    };
    Line::from(Span::styled(text, Style::default().fg(color)))
}

fn render_empty(frame: &mut Frame, block: Block, message: Line, area: Rect) {
    let paragraph = Paragraph::new(vec![Line::from(""), message])
        .block(block)
        .alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}

/// Liste avec sélection ; ListState fait défiler pour garder la ligne visible
fn render_list(frame: &mut Frame, app: &App, block: Block, items: Vec<ListItem>, area: Rect) {
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED));

    let mut state = ListState::default().with_selected(Some(app.selected_index()));
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_market(
    frame: &mut Frame,
    app: &App,
    dataset: &Dataset,
    view: DerivedView<'_, MarketItem>,
    title: &str,
    area: Rect,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(dataset_title(title, dataset));

    if let Some(reason) = view.empty {
        let message = empty_message(
            reason,
            dataset.is_loading(),
            dataset.last_error.as_deref(),
            app.current_query(),
        );
        render_empty(frame, block, message, area);
        return;
    }

    let items: Vec<ListItem> = view
        .items
        .iter()
        .map(|item| {
            let style = if item.is_positive() {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Red)
            };
            let star = if app.is_favorite(item) { "★" } else { " " };
            let rank = item
                .market_cap_rank
                .map(|rank| format!("#{}", rank))
                .unwrap_or_default();

            let line = Line::from(vec![
                Span::styled(format!(" {} ", star), Style::default().fg(Color::Yellow)),
                Span::styled(format!("{:<5}", rank), Style::default().fg(Color::DarkGray)),
                Span::styled(
                    format!("{:<10}", item.symbol),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::raw(format!("{:<22}", item.display_name)),
                Span::raw(format!("{:>16}  ", item.format_price())),
                Span::styled(item.format_change(), style),
            ]);
            ListItem::new(line)
        })
        .collect();

    render_list(frame, app, block, items, area);
}

fn render_jobs(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" 💼 Carrières ");

    let view = app.jobs_view();
    if let Some(reason) = view.empty {
        let message = empty_message(
            reason,
            app.jobs_loading,
            app.jobs_error.as_deref(),
            app.current_query(),
        );
        render_empty(frame, block, message, area);
        return;
    }

    let items: Vec<ListItem> = view
        .items
        .iter()
        .map(|job| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!(" {:<32}", job.title),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::styled(format!("{:<18}", job.department.label()), Style::default().fg(Color::Cyan)),
                Span::styled(job.location.label().to_string(), Style::default().fg(Color::Gray)),
            ]))
        })
        .collect();

    render_list(frame, app, block, items, chunks[0]);
    render_job_detail(frame, app.selected_job(), chunks[1]);
}

fn render_job_detail(frame: &mut Frame, job: Option<&JobPosting>, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Détail ");

    let Some(job) = job else {
        frame.render_widget(block, area);
        return;
    };

    let heading = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
    let text = vec![
        Line::from(Span::styled(job.title.clone(), Style::default().add_modifier(Modifier::BOLD))),
        Line::from(format!("{} · {}", job.department.label(), job.location.label())),
        Line::from(""),
        Line::from(job.summary()),
        Line::from(""),
        Line::from(Span::styled("Description", heading)),
        Line::from(job.description.clone()),
        Line::from(""),
        Line::from(Span::styled("Prérequis", heading)),
        Line::from(job.requirements.clone()),
    ];

    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn render_earn(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" 🌱 Earn ");

    let view = app.earn_view();
    if let Some(reason) = view.empty {
        render_empty(frame, block, empty_message(reason, false, None, app.current_query()), area);
        return;
    }

    let items: Vec<ListItem> = view
        .items
        .iter()
        .map(|product| {
            let minimum = product
                .min_amount
                .map(|amount| format!("min {} {}", amount, product.symbol))
                .unwrap_or_else(|| "sans minimum".to_string());

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!(" {:<18}", product.name),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::raw(format!("{:<7}", product.symbol)),
                Span::styled(format!("{:<15}", product.kind.label()), Style::default().fg(Color::Cyan)),
                Span::styled(format!("{:>7.2}% APY  ", product.apy), Style::default().fg(Color::Green)),
                Span::raw(format!("{:<11}", product.lock_label())),
                Span::styled(minimum, Style::default().fg(Color::Gray)),
            ]))
        })
        .collect();

    render_list(frame, app, block, items, area);
}

// ============================================================================
// Footer : raccourcis et confirmations
// ============================================================================

fn key(label: &str, color: Color) -> Span<'_> {
    Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD))
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let line = if app.is_awaiting_quit_confirmation() {
        Line::from(vec![
            Span::styled(
                "⚠  Appuyez sur ",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                "[q]",
                Style::default()
                    .fg(Color::Red)
                    .add_modifier(Modifier::BOLD)
                    .add_modifier(Modifier::SLOW_BLINK),
            ),
            Span::styled(
                " à nouveau pour quitter, ou n'importe quelle autre touche pour annuler ⚠",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
        ])
    } else if let Some(message) = &app.status_message {
        Line::from(Span::styled(message.as_str(), Style::default().fg(Color::Cyan)))
    } else {
        shortcuts(app)
    };

    let paragraph = Paragraph::new(vec![line])
        .block(block)
        .alignment(Alignment::Center);

    frame.render_widget(paragraph, area);
}

/// Raccourcis selon l'écran et le mode
fn shortcuts(app: &App) -> Line<'static> {
    match (app.mode, app.screen) {
        (Mode::Search, _) => Line::from(vec![
            key("[Enter]", Color::Green),
            Span::raw(" Garder  "),
            key("[ESC]", Color::Red),
            Span::raw(" Effacer"),
        ]),
        (Mode::FieldEdit, _) => Line::from(vec![
            key("[Enter]", Color::Green),
            Span::raw(" Valider  "),
            key("[ESC]", Color::Red),
            Span::raw(" Annuler"),
        ]),
        (Mode::Normal, Screen::Signup) => {
            let mut spans = vec![
                key("[q]", Color::Yellow),
                Span::raw(" Quit  "),
                key("[↑↓]", Color::Yellow),
                Span::raw(" Champ  "),
                key("[Enter]", Color::Yellow),
                Span::raw(" Éditer  "),
                key("[1-9]", Color::Yellow),
                Span::raw(" Option  "),
            ];
            if app.wizard.step() == Step::Contact {
                spans.push(key("[+/-]", Color::Yellow));
                spans.push(Span::raw(" Personne autorisée  "));
            }
            spans.extend([
                key("[n/b]", Color::Green),
                Span::raw(" Étape  "),
                key("[S]", Color::Green),
                Span::raw(" Envoyer"),
            ]);
            Line::from(spans)
        }
        (Mode::Normal, screen) => {
            let mut spans = vec![
                key("[q]", Color::Yellow),
                Span::raw(" Quit  "),
                key("[←→]", Color::Yellow),
                Span::raw(" Écran  "),
                key("[Tab]", Color::Yellow),
                Span::raw(" Catégorie  "),
                key("[/]", Color::Yellow),
                Span::raw(" Recherche  "),
                key("[s/r]", Color::Yellow),
                Span::raw(" Tri  "),
            ];
            if screen.has_favorites() {
                spans.push(key("[f/F]", Color::Green));
                spans.push(Span::raw(" Favoris"));
            }
            if screen == Screen::Jobs {
                spans.push(key("[L]", Color::Green));
                spans.push(Span::raw(" Lieu  "));
                spans.push(key("[R]", Color::Green));
                spans.push(Span::raw(" Recharger"));
            }
            Line::from(spans)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::{Feed, PollEvent};
    use ratatui::{backend::TestBackend, buffer::Buffer, Terminal};

    fn draw(app: &App) -> Buffer {
        let backend = TestBackend::new(120, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| render(frame, app)).unwrap();
        terminal.backend().buffer().clone()
    }

    fn contains(buffer: &Buffer, needle: &str) -> bool {
        let width = buffer.area.width as usize;
        buffer
            .content
            .chunks(width)
            .any(|row| row.iter().map(|cell| cell.symbol()).collect::<String>().contains(needle))
    }

    #[test]
    fn test_loading_state() {
        let app = App::default();
        assert!(contains(&draw(&app), "Chargement..."));
    }

    #[test]
    fn test_no_favorites_state() {
        let mut app = App::default();
        app.toggle_favorites_only();
        assert!(contains(&draw(&app), "Aucun favori"));
    }

    #[test]
    fn test_stale_marker_and_rows() {
        let mut app = App::default();
        app.apply_poll(PollEvent::Snapshot {
            feed: Feed::Crypto,
            seq: 1,
            items: crate::simulated::crypto_seed(),
            at: Utc::now(),
        });
        let buffer = draw(&app);
        assert!(contains(&buffer, "BTC"));
        assert!(contains(&buffer, "màj"));

        app.apply_poll(PollEvent::Failed {
            feed: Feed::Crypto,
            seq: 2,
            error: "timeout".into(),
        });
        let buffer = draw(&app);
        assert!(contains(&buffer, "périmé"));
        assert!(contains(&buffer, "BTC"));
    }

    #[test]
    fn test_jobs_error_is_shown() {
        let mut app = App::default();
        app.show_screen(Screen::Jobs);
        app.set_jobs(Err("HTTP 502".into()));
        assert!(contains(&draw(&app), "HTTP 502"));
    }

    #[test]
    fn test_no_matches_names_query() {
        let mut app = App::default();
        app.show_screen(Screen::Earn);
        app.start_search();
        for c in "zzz".chars() {
            app.append_char(c);
        }
        assert!(contains(&draw(&app), "Aucun résultat"));
    }
}
