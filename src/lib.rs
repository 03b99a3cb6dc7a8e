// ============================================================================
// BitDash - Library
// ============================================================================
// Expose les modules publics pour le binaire et les tests
// ============================================================================

pub mod api;        // Clients HTTP (CoinGecko, CMS Strapi)
pub mod app;        // État de l'application
pub mod config;     // Configuration TOML
pub mod favorites;  // Favoris persistés
pub mod models;     // Structures de données
pub mod pipeline;   // Filtre / tri générique
pub mod poller;     // Source de données périodique
pub mod signup;     // Formulaire d'inscription multi-étapes
pub mod simulated;  // Données de marché simulées
pub mod ui;         // Interface utilisateur
pub mod views;      // Configurations du pipeline par page
