// ============================================================================
// Structure : JobPosting
// ============================================================================
// Offre d'emploi publiée dans le CMS (lecture seule côté client)
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

/// Département d'une offre (slug CMS : "engineering", "customer-service", ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Department {
    Engineering,
    Business,
    CustomerService,
    Operations,
    Other(String),
}

impl Department {
    /// Départements connus, dans l'ordre des filtres
    pub const KNOWN: [Department; 4] = [
        Department::Engineering,
        Department::Business,
        Department::CustomerService,
        Department::Operations,
    ];

    pub fn slug(&self) -> &str {
        match self {
            Department::Engineering => "engineering",
            Department::Business => "business",
            Department::CustomerService => "customer-service",
            Department::Operations => "operations",
            Department::Other(value) => value,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Department::Engineering => "Engineering",
            Department::Business => "Business",
            Department::CustomerService => "Customer Service",
            Department::Operations => "Operations",
            Department::Other(value) => value,
        }
    }
}

impl From<String> for Department {
    fn from(value: String) -> Self {
        match value.as_str() {
            "engineering" => Department::Engineering,
            "business" => Department::Business,
            "customer-service" => Department::CustomerService,
            "operations" => Department::Operations,
            _ => Department::Other(value),
        }
    }
}

impl From<Department> for String {
    fn from(department: Department) -> Self {
        department.slug().to_string()
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lieu d'une offre (slug CMS : "london", "new-york", ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Location {
    London,
    Singapore,
    NewYork,
    Dubai,
    Sydney,
    Remote,
    Other(String),
}

impl Location {
    /// Lieux connus, dans l'ordre des filtres
    pub const KNOWN: [Location; 6] = [
        Location::London,
        Location::Singapore,
        Location::NewYork,
        Location::Dubai,
        Location::Sydney,
        Location::Remote,
    ];

    pub fn slug(&self) -> &str {
        match self {
            Location::London => "london",
            Location::Singapore => "singapore",
            Location::NewYork => "new-york",
            Location::Dubai => "dubai",
            Location::Sydney => "sydney",
            Location::Remote => "remote",
            Location::Other(value) => value,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Location::London => "London",
            Location::Singapore => "Singapore",
            Location::NewYork => "New York",
            Location::Dubai => "Dubai",
            Location::Sydney => "Sydney",
            Location::Remote => "Remote",
            Location::Other(value) => value,
        }
    }
}

impl From<String> for Location {
    fn from(value: String) -> Self {
        match value.as_str() {
            "london" => Location::London,
            "singapore" => Location::Singapore,
            "new-york" => Location::NewYork,
            "dubai" => Location::Dubai,
            "sydney" => Location::Sydney,
            "remote" => Location::Remote,
            _ => Location::Other(value),
        }
    }
}

impl From<Location> for String {
    fn from(location: Location) -> Self {
        location.slug().to_string()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Offre d'emploi
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    /// Id CMS (numérique côté Strapi, conservé en texte)
    pub id: String,
    pub title: String,
    pub department: Department,
    pub location: Location,
    pub description: String,
    pub requirements: String,
    pub short_description: Option<String>,
}

impl JobPosting {
    /// Résumé affiché dans la liste : short_description ou début de la description
    pub fn summary(&self) -> String {
        if let Some(short) = self.short_description.as_deref().filter(|s| !s.is_empty()) {
            return short.to_string();
        }

        if self.description.chars().count() <= 80 {
            self.description.clone()
        } else {
            let truncated: String = self.description.chars().take(79).collect();
            format!("{}…", truncated)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
