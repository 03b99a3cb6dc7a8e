// ============================================================================
// Rendu de l'assistant d'inscription
// ============================================================================
// Onglets d'étapes / champs de l'étape courante / messages
//
// Seuls VISIBLE_FIELDS champs sont dessinés, à partir du défilement de
// l'assistant : le focus reste toujours visible.
// ============================================================================

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs, Wrap},
    Frame,
};

use crate::app::{App, Mode, SignupStatus};
use crate::signup::form::{self, FieldKind, FieldSpec, FieldValue};
use crate::signup::wizard::VISIBLE_FIELDS;
use crate::signup::Step;

pub fn render_signup(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(VISIBLE_FIELDS as u16 + 2),
            Constraint::Length(5),
        ])
        .split(area);

    render_steps(frame, app, chunks[0]);
    render_fields(frame, app, chunks[1]);
    render_messages(frame, app, chunks[2]);
}

fn render_steps(frame: &mut Frame, app: &App, area: Rect) {
    let current = app.wizard.step();
    let titles: Vec<Line> = Step::ALL
        .iter()
        .map(|step| {
            let marker = if step.index() < current.index() { "✓ " } else { "" };
            Line::from(format!("{}{}. {}", marker, step.index() + 1, step.label()))
        })
        .collect();

    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(" Inscription institutionnelle "),
        )
        .select(current.index())
        .style(Style::default().fg(Color::Gray))
        .highlight_style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD));

    frame.render_widget(tabs, area);
}

fn render_fields(frame: &mut Frame, app: &App, area: Rect) {
    let wizard = &app.wizard;
    let fields = wizard.form().fields();
    let scroll = wizard.scroll();

    let title = format!(
        " {} ({}/{}) ",
        wizard.step().label(),
        (wizard.focus() + 1).min(fields.len()),
        fields.len()
    );
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title);

    let mut lines: Vec<Line> = Vec::new();
    if scroll > 0 {
        lines.push(Line::from(Span::styled("  ▲", Style::default().fg(Color::DarkGray))));
    }

    for (index, spec) in fields.iter().enumerate().skip(scroll).take(VISIBLE_FIELDS) {
        let focused = index == wizard.focus();
        lines.push(field_line(app, spec, focused));
    }

    if scroll + VISIBLE_FIELDS < fields.len() {
        lines.push(Line::from(Span::styled("  ▼", Style::default().fg(Color::DarkGray))));
    }

    // Options numérotées du champ à choix multiples qui a le focus
    if let Some(spec) = wizard.focused_field() {
        if let FieldKind::Multi(options) = spec.kind {
            lines.push(Line::from(""));
            lines.push(options_line(app, &spec, options));
        }
    }

    let paragraph = Paragraph::new(lines).block(block);
    frame.render_widget(paragraph, area);
}

fn field_line<'a>(app: &'a App, spec: &FieldSpec, focused: bool) -> Line<'a> {
    let label_style = if focused {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    let pointer = if focused { "▶ " } else { "  " };

    let value = if focused && app.mode == Mode::FieldEdit {
        let shown = match spec.kind {
            FieldKind::Secret => "•".repeat(app.input_buffer.chars().count()),
            _ => app.input_buffer.clone(),
        };
        Span::styled(
            format!("{}█", shown),
            Style::default().fg(Color::White).add_modifier(Modifier::UNDERLINED),
        )
    } else {
        let text = form::display_value(app.wizard.form(), spec);
        match spec.kind {
            FieldKind::Choice(_) => Span::styled(format!("‹ {} ›", text), Style::default().fg(Color::Cyan)),
            FieldKind::Flag => Span::styled(text, Style::default().fg(Color::Green)),
            _ => Span::raw(text),
        }
    };

    Line::from(vec![
        Span::styled(pointer, label_style),
        Span::styled(format!("{:<36}", spec.label), label_style),
        value,
    ])
}

fn options_line<'a>(app: &'a App, spec: &FieldSpec, options: &'static [&'static str]) -> Line<'a> {
    let selected = match app.wizard.form().field(spec.key) {
        Some(FieldValue::Multi(values)) => Some(values),
        _ => None,
    };

    let mut spans = vec![Span::raw("  ")];
    for (i, option) in options.iter().enumerate() {
        let checked = selected.map(|values| values.contains(*option)).unwrap_or(false);
        let style = if checked {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(
            format!("{}:{} [{}]  ", i + 1, option, if checked { "x" } else { " " }),
            style,
        ));
    }
    Line::from(spans)
}

fn render_messages(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let mut lines: Vec<Line> = Vec::new();

    if let Some(error) = &app.signup_error {
        lines.push(Line::from(Span::styled(
            format!("✗ {}", error),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
    }

    match &app.signup_status {
        SignupStatus::Editing => {}
        SignupStatus::Submitting => lines.push(Line::from(Span::styled(
            "Envoi de l'inscription en cours...",
            Style::default().fg(Color::Yellow),
        ))),
        SignupStatus::Done(outcome) => {
            lines.push(Line::from(Span::styled(
                format!(
                    "✓ Inscription envoyée : compte #{}, profil #{}, wallet {}",
                    outcome.user_id, outcome.profile_id, outcome.wallet_id
                ),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            )));
            for warning in &outcome.warnings {
                lines.push(Line::from(Span::styled(
                    format!("⚠ {}", warning),
                    Style::default().fg(Color::Yellow),
                )));
            }
        }
        SignupStatus::Failed(error) => lines.push(Line::from(Span::styled(
            format!("✗ {}", error),
            Style::default().fg(Color::Red),
        ))),
    }

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Screen;
    use crate::signup::SignupOutcome;
    use ratatui::{backend::TestBackend, buffer::Buffer, Terminal};

    fn draw(app: &App) -> Buffer {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|frame| crate::ui::render(frame, app)).unwrap();
        terminal.backend().buffer().clone()
    }

    fn rows(buffer: &Buffer) -> Vec<String> {
        buffer
            .content
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect())
            .collect()
    }

    #[test]
    fn test_password_is_masked() {
        let mut app = App::default();
        app.show_screen(Screen::Signup);
        form::set_text(app.wizard.form_mut(), "password", "hunter2hunter2".into());

        let rows = rows(&draw(&app));
        assert!(rows.iter().any(|row| row.contains("Mot de passe")));
        assert!(!rows.iter().any(|row| row.contains("hunter2")));
    }

    #[test]
    fn test_validation_error_is_shown() {
        let mut app = App::default();
        app.show_screen(Screen::Signup);
        app.wizard_next();

        let rows = rows(&draw(&app));
        assert!(rows.iter().any(|row| row.contains('✗')));
    }

    #[test]
    fn test_outcome_warnings_are_shown() {
        let mut app = App::default();
        app.show_screen(Screen::Signup);
        app.finish_signup(Ok(SignupOutcome {
            user_id: 7,
            profile_id: 21,
            wallet_id: "INST-7-1".into(),
            created: Vec::new(),
            warnings: vec!["logo refusé".into()],
        }));

        let rows = rows(&draw(&app));
        assert!(rows.iter().any(|row| row.contains("INST-7-1")));
        assert!(rows.iter().any(|row| row.contains("logo refusé")));
    }
}
