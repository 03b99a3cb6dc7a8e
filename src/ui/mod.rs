// ============================================================================
// Module : ui
// ============================================================================
// Gère toute l'interface utilisateur (Terminal User Interface)
// ============================================================================

pub mod events;     // Gestion des événements clavier
pub mod dashboard;  // Rendu des écrans de liste
pub mod signup;     // Rendu de l'assistant d'inscription

// Re-exports pour simplifier les imports
pub use events::{Event, EventHandler};
pub use dashboard::render;
