// ============================================================================
// Formulaire d'inscription institutionnelle : brouillons et validation
// ============================================================================
// Un brouillon typé par étape (Account, Company, Trading, Contact, Terms).
// Valid<T> ne peut être construit que par validate() : une étape validée
// ne peut pas contenir de données invalides.
//
// L'interface édite les brouillons via une description des champs
// (FieldSpec) plutôt qu'en connaissant chaque structure.
//
// CONCEPTS RUST :
// 1. Newtype à constructeur privé : Valid<T>
// 2. Trait objet : &mut dyn StepForm pour éditer n'importe quelle étape
// 3. thiserror : une variante d'erreur par règle, avec un message lisible
// ============================================================================

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Taille maximale du logo (5 Mo)
pub const MAX_LOGO_BYTES: u64 = 5 * 1024 * 1024;

pub const ENTITY_TYPES: &[&str] = &[
    "broker",
    "hedge_fund",
    "prop_firm",
    "bank",
    "asset_manager",
    "family_office",
    "other",
];

pub const TRADING_PLATFORMS: &[&str] = &["mt5", "fix_api", "rest_api", "web_trading", "custom"];

pub const TRADING_VOLUMES: &[&str] = &["under_10m", "10m_50m", "50m_100m", "100m_500m", "over_500m"];

pub const INSTRUMENT_TYPES: &[&str] = &[
    "forex",
    "metals",
    "indices",
    "commodities",
    "crypto",
    "bonds",
    "equities",
];

// ============================================================================
// Erreurs de validation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("le nom d'utilisateur doit contenir au moins 3 caractères")]
    UsernameTooShort,
    #[error("adresse email invalide")]
    InvalidEmail,
    #[error("le mot de passe doit contenir au moins 8 caractères")]
    PasswordTooShort,
    #[error("les mots de passe ne correspondent pas")]
    PasswordMismatch,
    #[error("le nom de la société est obligatoire")]
    CompanyNameRequired,
    #[error("le numéro d'enregistrement est obligatoire")]
    RegistrationNumberRequired,
    #[error("le pays d'incorporation est obligatoire")]
    CountryOfIncorporationRequired,
    #[error("sélectionnez au moins une plateforme de trading")]
    NoTradingPlatform,
    #[error("sélectionnez au moins un instrument")]
    NoInstrument,
    #[error("le nom du contact principal est obligatoire")]
    ContactNameRequired,
    #[error("l'email du contact principal est obligatoire")]
    ContactEmailRequired,
    #[error("la rue de l'adresse est obligatoire")]
    StreetRequired,
    #[error("la ville de l'adresse est obligatoire")]
    CityRequired,
    #[error("le pays de l'adresse est obligatoire")]
    AddressCountryRequired,
    #[error("l'adresse opérationnelle doit comporter une rue, une ville et un pays")]
    OperationalAddressIncomplete(&'static str),
    #[error("au moins une personne autorisée est requise")]
    LastAuthorizedPerson,
    #[error("au plus {0} personnes autorisées")]
    TooManyAuthorizedPersons(usize),
    #[error("vous devez accepter les conditions générales")]
    TermsNotAccepted,
    #[error("vous devez accepter la politique de données")]
    DataPolicyNotAccepted,
    #[error("format de logo non supporté : {0} (jpg, png, gif ou svg)")]
    LogoUnsupportedType(String),
    #[error("logo trop volumineux : {size} octets (max 5 Mo)")]
    LogoTooLarge { size: u64 },
    #[error("logo illisible : {0}")]
    LogoUnreadable(String),
}

impl ValidationError {
    /// Clé du champ fautif (pour placer le focus dessus)
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::UsernameTooShort => "username",
            ValidationError::InvalidEmail => "email",
            ValidationError::PasswordTooShort => "password",
            ValidationError::PasswordMismatch => "confirm_password",
            ValidationError::CompanyNameRequired => "company_name",
            ValidationError::RegistrationNumberRequired => "business_registration_number",
            ValidationError::CountryOfIncorporationRequired => "country_of_incorporation",
            ValidationError::NoTradingPlatform => "trading_platforms",
            ValidationError::NoInstrument => "instruments_traded",
            ValidationError::ContactNameRequired => "primary_name",
            ValidationError::ContactEmailRequired => "primary_email",
            ValidationError::StreetRequired => "street",
            ValidationError::CityRequired => "city",
            ValidationError::AddressCountryRequired => "country",
            ValidationError::OperationalAddressIncomplete(key) => *key,
            ValidationError::LastAuthorizedPerson | ValidationError::TooManyAuthorizedPersons(_) => {
                "person_1_name"
            }
            ValidationError::TermsNotAccepted => "agreed_to_terms",
            ValidationError::DataPolicyNotAccepted => "agreed_to_data_policy",
            ValidationError::LogoUnsupportedType(_)
            | ValidationError::LogoTooLarge { .. }
            | ValidationError::LogoUnreadable(_) => "logo",
        }
    }
}

// ============================================================================
// Description des champs
// ============================================================================

/// Type d'un champ éditable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// Texte masqué à l'affichage
    Secret,
    Flag,
    /// Une valeur parmi une liste
    Choice(&'static [&'static str]),
    /// Plusieurs valeurs parmi une liste
    Multi(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

const fn field(key: &'static str, label: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { key, label, kind }
}

/// Lecture d'un champ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Flag(bool),
    Multi(&'a BTreeSet<String>),
}

/// Accès en écriture à un champ
pub enum FieldSlot<'a> {
    Text(&'a mut String),
    Flag(&'a mut bool),
    Multi(&'a mut BTreeSet<String>),
}

/// Brouillon d'une étape
pub trait StepForm {
    fn fields(&self) -> Cow<'static, [FieldSpec]>;
    fn field(&self, key: &str) -> Option<FieldValue<'_>>;
    fn field_mut(&mut self, key: &str) -> Option<FieldSlot<'_>>;
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Valeur affichée d'un champ (secrets masqués)
pub fn display_value(form: &dyn StepForm, spec: &FieldSpec) -> String {
    match (form.field(spec.key), spec.kind) {
        (Some(FieldValue::Text(text)), FieldKind::Secret) => "•".repeat(text.chars().count()),
        (Some(FieldValue::Text(text)), _) => text.to_string(),
        (Some(FieldValue::Flag(true)), _) => "[x]".to_string(),
        (Some(FieldValue::Flag(false)), _) => "[ ]".to_string(),
        (Some(FieldValue::Multi(values)), _) => values.iter().cloned().collect::<Vec<_>>().join(", "),
        (None, _) => String::new(),
    }
}

/// Remplace la valeur d'un champ texte
pub fn set_text(form: &mut dyn StepForm, key: &str, value: String) -> bool {
    match form.field_mut(key) {
        Some(FieldSlot::Text(slot)) => {
            *slot = value;
            true
        }
        _ => false,
    }
}

/// Bascule un champ booléen
pub fn toggle_flag(form: &mut dyn StepForm, key: &str) -> bool {
    match form.field_mut(key) {
        Some(FieldSlot::Flag(slot)) => {
            *slot = !*slot;
            true
        }
        _ => false,
    }
}

/// Passe à l'option suivante d'un champ Choice
pub fn cycle_choice(form: &mut dyn StepForm, spec: &FieldSpec) -> bool {
    let FieldKind::Choice(options) = spec.kind else {
        return false;
    };
    match form.field_mut(spec.key) {
        Some(FieldSlot::Text(slot)) => {
            let next = options
                .iter()
                .position(|option| *option == slot.as_str())
                .map(|i| (i + 1) % options.len())
                .unwrap_or(0);
            if let Some(option) = options.get(next) {
                *slot = option.to_string();
            }
            true
        }
        _ => false,
    }
}

/// Ajoute ou retire une option d'un champ Multi
pub fn toggle_option(form: &mut dyn StepForm, key: &str, option: &str) -> bool {
    match form.field_mut(key) {
        Some(FieldSlot::Multi(values)) => {
            if !values.remove(option) {
                values.insert(option.to_string());
            }
            true
        }
        _ => false,
    }
}

// ============================================================================
// Valid<T>
// ============================================================================

/// Brouillon d'étape qui a passé la validation
#[derive(Debug, Clone, PartialEq)]
pub struct Valid<T>(T);

impl<T> Valid<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Valid<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

/// Valide un brouillon et en fige une copie
pub fn validate<T: StepForm + Clone>(draft: &T) -> Result<Valid<T>, ValidationError> {
    draft.validate()?;
    Ok(Valid(draft.clone()))
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

// ============================================================================
// Étape 1 : compte
// ============================================================================

#[derive(Clone, Default, PartialEq)]
pub struct AccountDraft {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

// Debug manuel : le mot de passe ne doit jamais finir dans les logs
impl fmt::Debug for AccountDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountDraft")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

const ACCOUNT_FIELDS: &[FieldSpec] = &[
    field("username", "Nom d'utilisateur", FieldKind::Text),
    field("email", "Email", FieldKind::Text),
    field("password", "Mot de passe", FieldKind::Secret),
    field("confirm_password", "Confirmation", FieldKind::Secret),
];

impl StepForm for AccountDraft {
    fn fields(&self) -> Cow<'static, [FieldSpec]> {
        Cow::Borrowed(ACCOUNT_FIELDS)
    }

    fn field(&self, key: &str) -> Option<FieldValue<'_>> {
        Some(FieldValue::Text(match key {
            "username" => self.username.as_str(),
            "email" => self.email.as_str(),
            "password" => self.password.as_str(),
            "confirm_password" => self.confirm_password.as_str(),
            _ => return None,
        }))
    }

    fn field_mut(&mut self, key: &str) -> Option<FieldSlot<'_>> {
        Some(FieldSlot::Text(match key {
            "username" => &mut self.username,
            "email" => &mut self.email,
            "password" => &mut self.password,
            "confirm_password" => &mut self.confirm_password,
            _ => return None,
        }))
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.username.chars().count() < 3 {
            return Err(ValidationError::UsernameTooShort);
        }
        if !self.email.contains('@') {
            return Err(ValidationError::InvalidEmail);
        }
        if self.password.chars().count() < 8 {
            return Err(ValidationError::PasswordTooShort);
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        Ok(())
    }
}

// ============================================================================
// Étape 2 : société
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CompanyDraft {
    pub company_name: String,
    pub legal_entity_type: String,
    pub business_registration_number: String,
    pub country_of_incorporation: String,
    pub tax_identification_number: String,
    pub total_aum: String,
    pub years_in_operation: String,
    pub regulatory_licenses: String,
}

impl Default for CompanyDraft {
    fn default() -> Self {
        Self {
            company_name: String::new(),
            legal_entity_type: "broker".to_string(),
            business_registration_number: String::new(),
            country_of_incorporation: String::new(),
            tax_identification_number: String::new(),
            total_aum: String::new(),
            years_in_operation: String::new(),
            regulatory_licenses: String::new(),
        }
    }
}

const COMPANY_FIELDS: &[FieldSpec] = &[
    field("company_name", "Société", FieldKind::Text),
    field("legal_entity_type", "Type d'entité", FieldKind::Choice(ENTITY_TYPES)),
    field("business_registration_number", "N° d'enregistrement", FieldKind::Text),
    field("country_of_incorporation", "Pays d'incorporation", FieldKind::Text),
    field("tax_identification_number", "N° fiscal", FieldKind::Text),
    field("total_aum", "Actifs sous gestion (USD)", FieldKind::Text),
    field("years_in_operation", "Années d'activité", FieldKind::Text),
    field("regulatory_licenses", "Licences", FieldKind::Text),
];

impl StepForm for CompanyDraft {
    fn fields(&self) -> Cow<'static, [FieldSpec]> {
        Cow::Borrowed(COMPANY_FIELDS)
    }

    fn field(&self, key: &str) -> Option<FieldValue<'_>> {
        Some(FieldValue::Text(match key {
            "company_name" => self.company_name.as_str(),
            "legal_entity_type" => self.legal_entity_type.as_str(),
            "business_registration_number" => self.business_registration_number.as_str(),
            "country_of_incorporation" => self.country_of_incorporation.as_str(),
            "tax_identification_number" => self.tax_identification_number.as_str(),
            "total_aum" => self.total_aum.as_str(),
            "years_in_operation" => self.years_in_operation.as_str(),
            "regulatory_licenses" => self.regulatory_licenses.as_str(),
            _ => return None,
        }))
    }

    fn field_mut(&mut self, key: &str) -> Option<FieldSlot<'_>> {
        Some(FieldSlot::Text(match key {
            "company_name" => &mut self.company_name,
            "legal_entity_type" => &mut self.legal_entity_type,
            "business_registration_number" => &mut self.business_registration_number,
            "country_of_incorporation" => &mut self.country_of_incorporation,
            "tax_identification_number" => &mut self.tax_identification_number,
            "total_aum" => &mut self.total_aum,
            "years_in_operation" => &mut self.years_in_operation,
            "regulatory_licenses" => &mut self.regulatory_licenses,
            _ => return None,
        }))
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if is_blank(&self.company_name) {
            return Err(ValidationError::CompanyNameRequired);
        }
        if is_blank(&self.business_registration_number) {
            return Err(ValidationError::RegistrationNumberRequired);
        }
        if is_blank(&self.country_of_incorporation) {
            return Err(ValidationError::CountryOfIncorporationRequired);
        }
        Ok(())
    }
}

impl CompanyDraft {
    /// Actifs sous gestion en nombre (0 si vide ou invalide)
    pub fn total_assets(&self) -> f64 {
        self.total_aum
            .trim()
            .replace(',', "")
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .unwrap_or(0.0)
    }
}

// ============================================================================
// Étape 3 : trading
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TradingDraft {
    pub trading_platforms: BTreeSet<String>,
    pub trading_volume: String,
    pub instruments_traded: BTreeSet<String>,
    pub leverage_requirements: String,
    pub custom_liquidity: bool,
    pub dma_access: bool,
    pub collocation_needed: bool,
}

impl Default for TradingDraft {
    fn default() -> Self {
        Self {
            trading_platforms: BTreeSet::from(["mt5".to_string()]),
            trading_volume: "under_10m".to_string(),
            instruments_traded: BTreeSet::from(["forex".to_string(), "metals".to_string()]),
            leverage_requirements: "100".to_string(),
            custom_liquidity: false,
            dma_access: false,
            collocation_needed: false,
        }
    }
}

const TRADING_FIELDS: &[FieldSpec] = &[
    field("trading_platforms", "Plateformes", FieldKind::Multi(TRADING_PLATFORMS)),
    field("trading_volume", "Volume mensuel", FieldKind::Choice(TRADING_VOLUMES)),
    field("instruments_traded", "Instruments", FieldKind::Multi(INSTRUMENT_TYPES)),
    field("leverage_requirements", "Levier (x:1)", FieldKind::Text),
    field("custom_liquidity", "Liquidité dédiée", FieldKind::Flag),
    field("dma_access", "Accès DMA", FieldKind::Flag),
    field("collocation_needed", "Colocation", FieldKind::Flag),
];

impl StepForm for TradingDraft {
    fn fields(&self) -> Cow<'static, [FieldSpec]> {
        Cow::Borrowed(TRADING_FIELDS)
    }

    fn field(&self, key: &str) -> Option<FieldValue<'_>> {
        match key {
            "trading_platforms" => Some(FieldValue::Multi(&self.trading_platforms)),
            "instruments_traded" => Some(FieldValue::Multi(&self.instruments_traded)),
            "trading_volume" => Some(FieldValue::Text(&self.trading_volume)),
            "leverage_requirements" => Some(FieldValue::Text(&self.leverage_requirements)),
            "custom_liquidity" => Some(FieldValue::Flag(self.custom_liquidity)),
            "dma_access" => Some(FieldValue::Flag(self.dma_access)),
            "collocation_needed" => Some(FieldValue::Flag(self.collocation_needed)),
            _ => None,
        }
    }

    fn field_mut(&mut self, key: &str) -> Option<FieldSlot<'_>> {
        match key {
            "trading_platforms" => Some(FieldSlot::Multi(&mut self.trading_platforms)),
            "instruments_traded" => Some(FieldSlot::Multi(&mut self.instruments_traded)),
            "trading_volume" => Some(FieldSlot::Text(&mut self.trading_volume)),
            "leverage_requirements" => Some(FieldSlot::Text(&mut self.leverage_requirements)),
            "custom_liquidity" => Some(FieldSlot::Flag(&mut self.custom_liquidity)),
            "dma_access" => Some(FieldSlot::Flag(&mut self.dma_access)),
            "collocation_needed" => Some(FieldSlot::Flag(&mut self.collocation_needed)),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.trading_platforms.is_empty() {
            return Err(ValidationError::NoTradingPlatform);
        }
        if self.instruments_traded.is_empty() {
            return Err(ValidationError::NoInstrument);
        }
        Ok(())
    }
}

impl TradingDraft {
    /// Accès API demandé (FIX ou REST)
    pub fn wants_api_access(&self) -> bool {
        self.trading_platforms.contains("fix_api") || self.trading_platforms.contains("rest_api")
    }
}

// ============================================================================
// Étape 4 : contacts
// ============================================================================
// Champs variables : l'adresse opérationnelle n'apparaît que si elle diffère
// de l'adresse de facturation, puis un bloc de champs par personne autorisée.
// ============================================================================

/// Nombre maximal de personnes autorisées saisies dans le terminal
pub const MAX_AUTHORIZED_PERSONS: usize = 5;

const PERSON_FIELD_COUNT: usize = 4;

/// Personne autorisée à agir pour le compte de la société
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorizedPerson {
    pub name: String,
    pub position: String,
    pub email: String,
    pub phone: String,
}

impl AuthorizedPerson {
    fn text(&self, attribute: &str) -> Option<&str> {
        match attribute {
            "name" => Some(&self.name),
            "position" => Some(&self.position),
            "email" => Some(&self.email),
            "phone" => Some(&self.phone),
            _ => None,
        }
    }

    fn text_mut(&mut self, attribute: &str) -> Option<&mut String> {
        match attribute {
            "name" => Some(&mut self.name),
            "position" => Some(&mut self.position),
            "email" => Some(&mut self.email),
            "phone" => Some(&mut self.phone),
            _ => None,
        }
    }
}

/// Clé "person_<n>_<attribut>" → (index, attribut)
fn person_slot(key: &str) -> Option<(usize, &str)> {
    let rest = key.strip_prefix("person_")?;
    let (number, attribute) = rest.split_once('_')?;
    let index = number.parse::<usize>().ok()?.checked_sub(1)?;
    Some((index, attribute))
}

/// Index de la personne autorisée éditée par ce champ
pub fn authorized_person_index(key: &str) -> Option<usize> {
    person_slot(key).map(|(index, _)| index)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContactDraft {
    pub primary_name: String,
    pub primary_position: String,
    pub primary_email: String,
    pub primary_phone: String,
    pub desk_email: String,
    pub desk_phone: String,
    pub technical_name: String,
    pub technical_email: String,
    pub technical_phone: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    /// Adresse opérationnelle identique à l'adresse de facturation
    pub same_address: bool,
    pub operational_street: String,
    pub operational_city: String,
    pub operational_state: String,
    pub operational_postal_code: String,
    pub operational_country: String,
    /// Jamais vide : voir add/remove_authorized_person
    authorized_persons: Vec<AuthorizedPerson>,
}

impl Default for ContactDraft {
    fn default() -> Self {
        Self {
            primary_name: String::new(),
            primary_position: String::new(),
            primary_email: String::new(),
            primary_phone: String::new(),
            desk_email: String::new(),
            desk_phone: String::new(),
            technical_name: String::new(),
            technical_email: String::new(),
            technical_phone: String::new(),
            street: String::new(),
            city: String::new(),
            state: String::new(),
            postal_code: String::new(),
            country: String::new(),
            same_address: true,
            operational_street: String::new(),
            operational_city: String::new(),
            operational_state: String::new(),
            operational_postal_code: String::new(),
            operational_country: String::new(),
            authorized_persons: vec![AuthorizedPerson::default()],
        }
    }
}

const CONTACT_FIELDS: &[FieldSpec] = &[
    field("primary_name", "Contact principal", FieldKind::Text),
    field("primary_position", "Fonction", FieldKind::Text),
    field("primary_email", "Email", FieldKind::Text),
    field("primary_phone", "Téléphone", FieldKind::Text),
    field("desk_email", "Desk : email", FieldKind::Text),
    field("desk_phone", "Desk : téléphone", FieldKind::Text),
    field("technical_name", "Contact technique", FieldKind::Text),
    field("technical_email", "Technique : email", FieldKind::Text),
    field("technical_phone", "Technique : téléphone", FieldKind::Text),
    field("street", "Facturation : rue", FieldKind::Text),
    field("city", "Facturation : ville", FieldKind::Text),
    field("state", "Facturation : région", FieldKind::Text),
    field("postal_code", "Facturation : code postal", FieldKind::Text),
    field("country", "Facturation : pays", FieldKind::Text),
    field("same_address", "Adresse opérationnelle identique", FieldKind::Flag),
];

const OPERATIONAL_FIELDS: &[FieldSpec] = &[
    field("operational_street", "Opérationnelle : rue", FieldKind::Text),
    field("operational_city", "Opérationnelle : ville", FieldKind::Text),
    field("operational_state", "Opérationnelle : région", FieldKind::Text),
    field("operational_postal_code", "Opérationnelle : code postal", FieldKind::Text),
    field("operational_country", "Opérationnelle : pays", FieldKind::Text),
];

macro_rules! person_fields {
    ($($n:literal),*) => {
        &[$(
            field(concat!("person_", $n, "_name"), concat!("Autorisé ", $n, " : nom"), FieldKind::Text),
            field(concat!("person_", $n, "_position"), concat!("Autorisé ", $n, " : fonction"), FieldKind::Text),
            field(concat!("person_", $n, "_email"), concat!("Autorisé ", $n, " : email"), FieldKind::Text),
            field(concat!("person_", $n, "_phone"), concat!("Autorisé ", $n, " : téléphone"), FieldKind::Text),
        )*]
    };
}

const PERSON_FIELDS: &[FieldSpec] = person_fields!(1, 2, 3, 4, 5);

impl StepForm for ContactDraft {
    fn fields(&self) -> Cow<'static, [FieldSpec]> {
        let mut fields = CONTACT_FIELDS.to_vec();
        if !self.same_address {
            fields.extend_from_slice(OPERATIONAL_FIELDS);
        }
        let persons = self.authorized_persons.len().min(MAX_AUTHORIZED_PERSONS);
        fields.extend_from_slice(&PERSON_FIELDS[..persons * PERSON_FIELD_COUNT]);
        Cow::Owned(fields)
    }

    fn field(&self, key: &str) -> Option<FieldValue<'_>> {
        if key == "same_address" {
            return Some(FieldValue::Flag(self.same_address));
        }
        if let Some((index, attribute)) = person_slot(key) {
            return self.authorized_persons.get(index)?.text(attribute).map(FieldValue::Text);
        }

        Some(FieldValue::Text(match key {
            "primary_name" => self.primary_name.as_str(),
            "primary_position" => self.primary_position.as_str(),
            "primary_email" => self.primary_email.as_str(),
            "primary_phone" => self.primary_phone.as_str(),
            "desk_email" => self.desk_email.as_str(),
            "desk_phone" => self.desk_phone.as_str(),
            "technical_name" => self.technical_name.as_str(),
            "technical_email" => self.technical_email.as_str(),
            "technical_phone" => self.technical_phone.as_str(),
            "street" => self.street.as_str(),
            "city" => self.city.as_str(),
            "state" => self.state.as_str(),
            "postal_code" => self.postal_code.as_str(),
            "country" => self.country.as_str(),
            "operational_street" => self.operational_street.as_str(),
            "operational_city" => self.operational_city.as_str(),
            "operational_state" => self.operational_state.as_str(),
            "operational_postal_code" => self.operational_postal_code.as_str(),
            "operational_country" => self.operational_country.as_str(),
            _ => return None,
        }))
    }

    fn field_mut(&mut self, key: &str) -> Option<FieldSlot<'_>> {
        if key == "same_address" {
            return Some(FieldSlot::Flag(&mut self.same_address));
        }
        if let Some((index, attribute)) = person_slot(key) {
            return self
                .authorized_persons
                .get_mut(index)?
                .text_mut(attribute)
                .map(FieldSlot::Text);
        }

        Some(FieldSlot::Text(match key {
            "primary_name" => &mut self.primary_name,
            "primary_position" => &mut self.primary_position,
            "primary_email" => &mut self.primary_email,
            "primary_phone" => &mut self.primary_phone,
            "desk_email" => &mut self.desk_email,
            "desk_phone" => &mut self.desk_phone,
            "technical_name" => &mut self.technical_name,
            "technical_email" => &mut self.technical_email,
            "technical_phone" => &mut self.technical_phone,
            "street" => &mut self.street,
            "city" => &mut self.city,
            "state" => &mut self.state,
            "postal_code" => &mut self.postal_code,
            "country" => &mut self.country,
            "operational_street" => &mut self.operational_street,
            "operational_city" => &mut self.operational_city,
            "operational_state" => &mut self.operational_state,
            "operational_postal_code" => &mut self.operational_postal_code,
            "operational_country" => &mut self.operational_country,
            _ => return None,
        }))
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if is_blank(&self.primary_name) {
            return Err(ValidationError::ContactNameRequired);
        }
        if is_blank(&self.primary_email) {
            return Err(ValidationError::ContactEmailRequired);
        }
        if is_blank(&self.street) {
            return Err(ValidationError::StreetRequired);
        }
        if is_blank(&self.city) {
            return Err(ValidationError::CityRequired);
        }
        if is_blank(&self.country) {
            return Err(ValidationError::AddressCountryRequired);
        }
        if !self.same_address {
            let required = [
                ("operational_street", &self.operational_street),
                ("operational_city", &self.operational_city),
                ("operational_country", &self.operational_country),
            ];
            if let Some((key, _)) = required.iter().find(|(_, value)| is_blank(value.as_str())) {
                return Err(ValidationError::OperationalAddressIncomplete(*key));
            }
        }
        Ok(())
    }
}

impl ContactDraft {
    pub fn authorized_persons(&self) -> &[AuthorizedPerson] {
        &self.authorized_persons
    }

    /// Ajoute une personne vide ; retourne son numéro (1..)
    pub fn add_authorized_person(&mut self) -> Result<usize, ValidationError> {
        if self.authorized_persons.len() >= MAX_AUTHORIZED_PERSONS {
            return Err(ValidationError::TooManyAuthorizedPersons(MAX_AUTHORIZED_PERSONS));
        }
        self.authorized_persons.push(AuthorizedPerson::default());
        Ok(self.authorized_persons.len())
    }

    /// Retire une personne ; la liste garde toujours au moins une entrée
    pub fn remove_authorized_person(&mut self, index: usize) -> Result<(), ValidationError> {
        if self.authorized_persons.len() <= 1 {
            return Err(ValidationError::LastAuthorizedPerson);
        }
        if index < self.authorized_persons.len() {
            self.authorized_persons.remove(index);
        }
        Ok(())
    }
}

// ============================================================================
// Étape 5 : conformité et conditions
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermsDraft {
    pub regulatory_status: String,
    pub aml_policy: bool,
    pub kyc_procedures: bool,
    pub need_prime_brokerage: bool,
    pub need_risk_management: bool,
    pub need_market_data: bool,
    pub need_reporting: bool,
    pub agreed_to_terms: bool,
    pub agreed_to_data_policy: bool,
    /// Chemin du logo (vide = pas de logo)
    pub logo: String,
}

const TERMS_FIELDS: &[FieldSpec] = &[
    field("regulatory_status", "Statut réglementaire", FieldKind::Text),
    field("aml_policy", "Politique AML en place", FieldKind::Flag),
    field("kyc_procedures", "Procédures KYC en place", FieldKind::Flag),
    field("need_prime_brokerage", "Prime brokerage", FieldKind::Flag),
    field("need_risk_management", "Gestion des risques", FieldKind::Flag),
    field("need_market_data", "Données de marché", FieldKind::Flag),
    field("need_reporting", "Reporting", FieldKind::Flag),
    field("logo", "Logo (chemin)", FieldKind::Text),
    field("agreed_to_terms", "J'accepte les conditions", FieldKind::Flag),
    field("agreed_to_data_policy", "J'accepte la politique de données", FieldKind::Flag),
];

impl StepForm for TermsDraft {
    fn fields(&self) -> Cow<'static, [FieldSpec]> {
        Cow::Borrowed(TERMS_FIELDS)
    }

    fn field(&self, key: &str) -> Option<FieldValue<'_>> {
        match key {
            "regulatory_status" => Some(FieldValue::Text(&self.regulatory_status)),
            "logo" => Some(FieldValue::Text(&self.logo)),
            "aml_policy" => Some(FieldValue::Flag(self.aml_policy)),
            "kyc_procedures" => Some(FieldValue::Flag(self.kyc_procedures)),
            "need_prime_brokerage" => Some(FieldValue::Flag(self.need_prime_brokerage)),
            "need_risk_management" => Some(FieldValue::Flag(self.need_risk_management)),
            "need_market_data" => Some(FieldValue::Flag(self.need_market_data)),
            "need_reporting" => Some(FieldValue::Flag(self.need_reporting)),
            "agreed_to_terms" => Some(FieldValue::Flag(self.agreed_to_terms)),
            "agreed_to_data_policy" => Some(FieldValue::Flag(self.agreed_to_data_policy)),
            _ => None,
        }
    }

    fn field_mut(&mut self, key: &str) -> Option<FieldSlot<'_>> {
        match key {
            "regulatory_status" => Some(FieldSlot::Text(&mut self.regulatory_status)),
            "logo" => Some(FieldSlot::Text(&mut self.logo)),
            "aml_policy" => Some(FieldSlot::Flag(&mut self.aml_policy)),
            "kyc_procedures" => Some(FieldSlot::Flag(&mut self.kyc_procedures)),
            "need_prime_brokerage" => Some(FieldSlot::Flag(&mut self.need_prime_brokerage)),
            "need_risk_management" => Some(FieldSlot::Flag(&mut self.need_risk_management)),
            "need_market_data" => Some(FieldSlot::Flag(&mut self.need_market_data)),
            "need_reporting" => Some(FieldSlot::Flag(&mut self.need_reporting)),
            "agreed_to_terms" => Some(FieldSlot::Flag(&mut self.agreed_to_terms)),
            "agreed_to_data_policy" => Some(FieldSlot::Flag(&mut self.agreed_to_data_policy)),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if !self.agreed_to_terms {
            return Err(ValidationError::TermsNotAccepted);
        }
        if !self.agreed_to_data_policy {
            return Err(ValidationError::DataPolicyNotAccepted);
        }
        Ok(())
    }
}

impl TermsDraft {
    pub fn logo_path(&self) -> Option<&Path> {
        let trimmed = self.logo.trim();
        (!trimmed.is_empty()).then(|| Path::new(trimmed))
    }
}

// ============================================================================
// Logo
// ============================================================================

/// Fichier logo vérifié, transmis tel quel au CMS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoFile {
    pub path: PathBuf,
    pub file_name: String,
    pub mime: &'static str,
    pub size: u64,
}

impl LogoFile {
    /// Vérifie l'extension puis la taille du fichier
    pub fn inspect(path: &Path) -> Result<Self, ValidationError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        let mime = mime_for_extension(&extension)
            .ok_or_else(|| ValidationError::LogoUnsupportedType(path.display().to_string()))?;

        let metadata = std::fs::metadata(path)
            .map_err(|e| ValidationError::LogoUnreadable(format!("{}: {}", path.display(), e)))?;
        if !metadata.is_file() {
            return Err(ValidationError::LogoUnreadable(format!(
                "{} n'est pas un fichier",
                path.display()
            )));
        }

        check_logo_size(metadata.len())?;

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("logo")
            .to_string();

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            mime,
            size: metadata.len(),
        })
    }
}

fn mime_for_extension(extension: &str) -> Option<&'static str> {
    match extension {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

fn check_logo_size(size: u64) -> Result<(), ValidationError> {
    if size > MAX_LOGO_BYTES {
        return Err(ValidationError::LogoTooLarge { size });
    }
    Ok(())
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_account() -> AccountDraft {
        AccountDraft {
            username: "acme".into(),
            email: "ops@acme.io".into(),
            password: "s3cret-pass".into(),
            confirm_password: "s3cret-pass".into(),
        }
    }

    #[test]
    fn test_account_rules() {
        assert!(valid_account().validate().is_ok());

        let mut draft = valid_account();
        draft.username = "ab".into();
        assert_eq!(draft.validate(), Err(ValidationError::UsernameTooShort));

        let mut draft = valid_account();
        draft.email = "ops.acme.io".into();
        assert_eq!(draft.validate(), Err(ValidationError::InvalidEmail));

        let mut draft = valid_account();
        draft.password = "short".into();
        draft.confirm_password = "short".into();
        assert_eq!(draft.validate(), Err(ValidationError::PasswordTooShort));

        let mut draft = valid_account();
        draft.confirm_password = "something-else".into();
        let err = draft.validate().unwrap_err();
        assert_eq!(err, ValidationError::PasswordMismatch);
        assert_eq!(err.field(), "confirm_password");
    }

    #[test]
    fn test_account_debug_hides_password() {
        let debug = format!("{:?}", valid_account());
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("acme"));
    }

    #[test]
    fn test_company_requires_identity_fields() {
        let mut draft = CompanyDraft::default();
        assert_eq!(draft.validate(), Err(ValidationError::CompanyNameRequired));

        draft.company_name = "Acme Capital".into();
        draft.business_registration_number = "   ".into();
        assert_eq!(draft.validate(), Err(ValidationError::RegistrationNumberRequired));

        draft.business_registration_number = "RC-1234".into();
        assert_eq!(draft.validate(), Err(ValidationError::CountryOfIncorporationRequired));

        draft.country_of_incorporation = "Singapore".into();
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_total_assets_parsing() {
        let mut draft = CompanyDraft::default();
        assert_eq!(draft.total_assets(), 0.0);
        draft.total_aum = "1,500,000".into();
        assert_eq!(draft.total_assets(), 1_500_000.0);
        draft.total_aum = "lots".into();
        assert_eq!(draft.total_assets(), 0.0);
    }

    #[test]
    fn test_trading_defaults_and_rules() {
        let mut draft = TradingDraft::default();
        assert!(draft.validate().is_ok());
        assert!(!draft.wants_api_access());

        draft.trading_platforms.clear();
        assert_eq!(draft.validate(), Err(ValidationError::NoTradingPlatform));

        toggle_option(&mut draft, "trading_platforms", "rest_api");
        assert!(draft.wants_api_access());

        toggle_option(&mut draft, "instruments_traded", "forex");
        toggle_option(&mut draft, "instruments_traded", "metals");
        assert_eq!(draft.validate(), Err(ValidationError::NoInstrument));
    }

    #[test]
    fn test_contact_rules() {
        let mut draft = ContactDraft {
            primary_name: "Jane Doe".into(),
            primary_email: "jane@acme.io".into(),
            street: "1 Raffles Place".into(),
            city: "Singapore".into(),
            country: "SG".into(),
            ..Default::default()
        };
        assert!(draft.validate().is_ok());

        draft.city.clear();
        assert_eq!(draft.validate(), Err(ValidationError::CityRequired));
    }

    #[test]
    fn test_operational_address_only_checked_when_different() {
        let mut draft = ContactDraft {
            primary_name: "Jane Doe".into(),
            primary_email: "jane@acme.io".into(),
            street: "1 Raffles Place".into(),
            city: "Singapore".into(),
            country: "SG".into(),
            ..Default::default()
        };
        assert!(draft.same_address);
        assert!(!draft.fields().iter().any(|f| f.key == "operational_city"));

        toggle_flag(&mut draft, "same_address");
        assert!(draft.fields().iter().any(|f| f.key == "operational_city"));
        assert_eq!(
            draft.validate(),
            Err(ValidationError::OperationalAddressIncomplete("operational_street"))
        );

        set_text(&mut draft, "operational_street", "8 Marina View".into());
        set_text(&mut draft, "operational_country", "SG".into());
        let err = draft.validate().unwrap_err();
        assert_eq!(err, ValidationError::OperationalAddressIncomplete("operational_city"));
        assert_eq!(err.field(), "operational_city");

        set_text(&mut draft, "operational_city", "Singapore".into());
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_authorized_persons_list() {
        let mut draft = ContactDraft::default();
        assert_eq!(draft.authorized_persons().len(), 1);
        assert_eq!(
            draft.remove_authorized_person(0),
            Err(ValidationError::LastAuthorizedPerson)
        );

        assert_eq!(draft.add_authorized_person(), Ok(2));
        assert!(set_text(&mut draft, "person_2_name", "John Roe".into()));
        assert_eq!(draft.authorized_persons()[1].name, "John Roe");
        assert!(draft.fields().iter().any(|f| f.key == "person_2_phone"));
        assert!(!set_text(&mut draft, "person_3_name", "nobody".into()));

        draft.remove_authorized_person(0).unwrap();
        assert_eq!(draft.authorized_persons().len(), 1);
        assert_eq!(draft.authorized_persons()[0].name, "John Roe");
        assert!(!draft.fields().iter().any(|f| f.key == "person_2_name"));

        for _ in 1..MAX_AUTHORIZED_PERSONS {
            draft.add_authorized_person().unwrap();
        }
        assert_eq!(
            draft.add_authorized_person(),
            Err(ValidationError::TooManyAuthorizedPersons(MAX_AUTHORIZED_PERSONS))
        );
        assert_eq!(authorized_person_index("person_5_email"), Some(4));
        assert_eq!(authorized_person_index("primary_email"), None);
    }

    #[test]
    fn test_terms_require_both_agreements() {
        let mut draft = TermsDraft::default();
        assert_eq!(draft.validate(), Err(ValidationError::TermsNotAccepted));

        toggle_flag(&mut draft, "agreed_to_terms");
        assert_eq!(draft.validate(), Err(ValidationError::DataPolicyNotAccepted));

        toggle_flag(&mut draft, "agreed_to_data_policy");
        assert!(draft.validate().is_ok());
        assert!(draft.logo_path().is_none());
    }

    #[test]
    fn test_generic_field_editing() {
        let mut draft = CompanyDraft::default();
        let form: &mut dyn StepForm = &mut draft;

        assert!(set_text(form, "company_name", "Acme".into()));
        assert!(!set_text(form, "unknown", "x".into()));
        assert!(!toggle_flag(form, "company_name"));

        let spec = form
            .fields()
            .iter()
            .find(|f| f.key == "legal_entity_type")
            .copied()
            .unwrap();
        assert!(cycle_choice(form, &spec));
        assert_eq!(display_value(form, &spec), "hedge_fund");

        assert_eq!(draft.company_name, "Acme");
        assert_eq!(draft.legal_entity_type, "hedge_fund");
    }

    #[test]
    fn test_cycle_choice_wraps_around() {
        let mut draft = TradingDraft::default();
        let spec = TRADING_FIELDS[1];
        for _ in 0..TRADING_VOLUMES.len() {
            cycle_choice(&mut draft, &spec);
        }
        assert_eq!(draft.trading_volume, "under_10m");
    }

    #[test]
    fn test_secret_fields_are_masked() {
        let draft = valid_account();
        let spec = ACCOUNT_FIELDS[2];
        assert_eq!(display_value(&draft, &spec), "•••••••••••");
    }

    #[test]
    fn test_every_declared_field_is_reachable() {
        let mut expanded_contact = ContactDraft {
            same_address: false,
            ..Default::default()
        };
        while expanded_contact.add_authorized_person().is_ok() {}

        let mut forms: Vec<Box<dyn StepForm>> = vec![
            Box::new(expanded_contact),
            Box::new(AccountDraft::default()),
            Box::new(CompanyDraft::default()),
            Box::new(TradingDraft::default()),
            Box::new(ContactDraft::default()),
            Box::new(TermsDraft::default()),
        ];
        for form in forms.iter_mut() {
            for spec in form.fields().iter() {
                assert!(form.field(spec.key).is_some(), "{}", spec.key);
                assert!(form.field_mut(spec.key).is_some(), "{}", spec.key);
            }
        }
    }

    #[test]
    fn test_logo_checks() {
        let dir = tempfile::tempdir().unwrap();

        let png = dir.path().join("Logo.PNG");
        std::fs::write(&png, b"\x89PNG").unwrap();
        let logo = LogoFile::inspect(&png).unwrap();
        assert_eq!(logo.mime, "image/png");
        assert_eq!(logo.file_name, "Logo.PNG");
        assert_eq!(logo.size, 4);

        let pdf = dir.path().join("logo.pdf");
        std::fs::write(&pdf, b"%PDF").unwrap();
        assert!(matches!(
            LogoFile::inspect(&pdf),
            Err(ValidationError::LogoUnsupportedType(_))
        ));

        let missing = dir.path().join("missing.svg");
        assert!(matches!(
            LogoFile::inspect(&missing),
            Err(ValidationError::LogoUnreadable(_))
        ));

        assert!(check_logo_size(MAX_LOGO_BYTES).is_ok());
        assert_eq!(
            check_logo_size(MAX_LOGO_BYTES + 1),
            Err(ValidationError::LogoTooLarge { size: MAX_LOGO_BYTES + 1 })
        );
    }
}
