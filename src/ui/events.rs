// ============================================================================
// Événements clavier
// ============================================================================
// Lecture du terminal (crossterm) et reconnaissance des raccourcis.
//
// Raccourcis :
//   q (x2)        quitter              ←/→ h/l    écran précédent / suivant
//   ↑/↓ k/j       sélection / focus    Tab        catégorie suivante
//   /             recherche            s / r      clé de tri / sens du tri
//   f / F         favori / favoris     L / R      lieu / recharger (carrières)
//   n / b         étape suivante / précédente (inscription)
//   + / -         ajouter / retirer une personne autorisée (inscription)
//   S             envoyer l'inscription
//
// CONCEPT RUST : fonctions prédicats
// - Chaque raccourci est une fonction `&Event -> bool`
// - main.rs les utilise comme guards dans un seul match
// ============================================================================

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Intervalle de lecture du terminal : une frame est redessinée au moins
/// à cette fréquence, ce qui affiche les snapshots des pollers sans attendre
/// une touche
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Événements vus par l'event loop
#[derive(Debug, Clone)]
pub enum Event {
    /// Touche pressée
    Key(KeyEvent),

    /// Rien à lire pendant POLL_INTERVAL
    Tick,
}

/// Source des événements du terminal
pub struct EventHandler;

impl EventHandler {
    pub fn new() -> Self {
        Self
    }

    /// Attend au plus POLL_INTERVAL le prochain événement
    ///
    /// Resize, souris et relâchement de touche deviennent des Tick :
    /// certains terminaux envoient Press puis Release pour une même touche.
    pub fn next(&self) -> Result<Event> {
        if !event::poll(POLL_INTERVAL)? {
            return Ok(Event::Tick);
        }

        Ok(match event::read()? {
            CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => Event::Key(key),
            _ => Event::Tick,
        })
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Prédicats de raccourcis
// ============================================================================

/// KeyCode de l'événement, s'il s'agit d'une touche
fn key_code(event: &Event) -> Option<KeyCode> {
    match event {
        Event::Key(key) => Some(key.code),
        Event::Tick => None,
    }
}

/// Vrai si l'événement est une touche dont le code vérifie `accept`
fn key_matches(event: &Event, accept: impl Fn(KeyCode) -> bool) -> bool {
    key_code(event).map(accept).unwrap_or(false)
}

pub fn is_quit_event(event: &Event) -> bool {
    key_matches(event, |code| matches!(code, KeyCode::Char('q' | 'Q')))
}

pub fn is_escape_event(event: &Event) -> bool {
    key_matches(event, |code| code == KeyCode::Esc)
}

pub fn is_space_event(event: &Event) -> bool {
    key_matches(event, |code| code == KeyCode::Char(' '))
}

pub fn is_enter_event(event: &Event) -> bool {
    key_matches(event, |code| code == KeyCode::Enter)
}

pub fn is_backspace_event(event: &Event) -> bool {
    key_matches(event, |code| code == KeyCode::Backspace)
}

/// ↑ ou 'k' : ligne précédente, champ précédent dans l'inscription
pub fn is_up_event(event: &Event) -> bool {
    key_matches(event, |code| matches!(code, KeyCode::Up | KeyCode::Char('k' | 'K')))
}

/// ↓ ou 'j'
pub fn is_down_event(event: &Event) -> bool {
    key_matches(event, |code| matches!(code, KeyCode::Down | KeyCode::Char('j' | 'J')))
}

pub fn is_right_event(event: &Event) -> bool {
    key_matches(event, |code| matches!(code, KeyCode::Right | KeyCode::Char('l')))
}

pub fn is_left_event(event: &Event) -> bool {
    key_matches(event, |code| matches!(code, KeyCode::Left | KeyCode::Char('h')))
}

pub fn is_tab_event(event: &Event) -> bool {
    key_matches(event, |code| code == KeyCode::Tab)
}

pub fn is_search_event(event: &Event) -> bool {
    key_matches(event, |code| code == KeyCode::Char('/'))
}

pub fn is_sort_event(event: &Event) -> bool {
    key_matches(event, |code| code == KeyCode::Char('s'))
}

pub fn is_reverse_event(event: &Event) -> bool {
    key_matches(event, |code| code == KeyCode::Char('r'))
}

/// 'f' bascule l'item sélectionné, 'F' le filtre "favoris uniquement"
pub fn is_favorite_event(event: &Event) -> bool {
    key_matches(event, |code| code == KeyCode::Char('f'))
}

pub fn is_favorites_only_event(event: &Event) -> bool {
    key_matches(event, |code| code == KeyCode::Char('F'))
}

pub fn is_location_event(event: &Event) -> bool {
    key_matches(event, |code| code == KeyCode::Char('L'))
}

pub fn is_reload_event(event: &Event) -> bool {
    key_matches(event, |code| code == KeyCode::Char('R'))
}

pub fn is_next_step_event(event: &Event) -> bool {
    key_matches(event, |code| matches!(code, KeyCode::Char('n') | KeyCode::PageDown))
}

pub fn is_previous_step_event(event: &Event) -> bool {
    key_matches(event, |code| matches!(code, KeyCode::Char('b') | KeyCode::PageUp))
}

/// '+' / '-' : personnes autorisées de l'étape Contact
pub fn is_add_event(event: &Event) -> bool {
    key_matches(event, |code| code == KeyCode::Char('+'))
}

pub fn is_remove_event(event: &Event) -> bool {
    key_matches(event, |code| code == KeyCode::Char('-'))
}

pub fn is_submit_event(event: &Event) -> bool {
    key_matches(event, |code| code == KeyCode::Char('S'))
}

/// Caractère imprimable sans Ctrl : saisie dans la recherche ou un champ
pub fn is_text_char_event(event: &Event) -> bool {
    match event {
        Event::Key(key) => {
            !key.modifiers.contains(KeyModifiers::CONTROL)
                && matches!(key.code, KeyCode::Char(c) if !c.is_control())
        }
        Event::Tick => false,
    }
}

pub fn get_char_from_event(event: &Event) -> Option<char> {
    match key_code(event)? {
        KeyCode::Char(c) => Some(c),
        _ => None,
    }
}

/// Chiffre 1-9 : numéro d'option dans un champ à choix multiples
pub fn get_digit_from_event(event: &Event) -> Option<usize> {
    match get_char_from_event(event)?.to_digit(10)? {
        0 => None,
        d => Some(d as usize),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(c: char) -> Event {
        Event::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::empty()))
    }

    fn code(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::empty()))
    }

    #[test]
    fn test_is_quit_event() {
        assert!(is_quit_event(&key('q')));
        assert!(is_quit_event(&key('Q')));
        assert!(!is_quit_event(&key('a')));
        assert!(!is_quit_event(&Event::Tick));
    }

    #[test]
    fn test_navigation_accepts_arrows_and_vim_keys() {
        assert!(is_up_event(&code(KeyCode::Up)));
        assert!(is_up_event(&key('k')));
        assert!(is_down_event(&key('j')));
        assert!(is_right_event(&key('l')));
        assert!(is_left_event(&code(KeyCode::Left)));
        assert!(is_next_step_event(&code(KeyCode::PageDown)));
    }

    #[test]
    fn test_favorite_keys_are_case_sensitive() {
        assert!(is_favorite_event(&key('f')));
        assert!(!is_favorite_event(&key('F')));
        assert!(is_favorites_only_event(&key('F')));
    }

    #[test]
    fn test_person_list_keys() {
        assert!(is_add_event(&key('+')));
        assert!(is_remove_event(&key('-')));
        assert!(!is_add_event(&key('=')));
        assert_eq!(get_digit_from_event(&key('-')), None);
    }

    #[test]
    fn test_text_input() {
        assert!(is_text_char_event(&key('@')));
        assert!(is_text_char_event(&key(' ')));

        let ctrl_c = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(!is_text_char_event(&ctrl_c));
        assert!(!is_text_char_event(&code(KeyCode::Enter)));
        assert_eq!(get_char_from_event(&code(KeyCode::Enter)), None);
    }

    #[test]
    fn test_digits() {
        assert_eq!(get_digit_from_event(&key('3')), Some(3));
        assert_eq!(get_digit_from_event(&key('0')), None);
        assert_eq!(get_digit_from_event(&key('x')), None);
        assert_eq!(get_digit_from_event(&Event::Tick), None);
    }
}
