// ============================================================================
// Soumission de l'inscription : séquence d'appels au CMS
// ============================================================================
// 1. création du compte utilisateur     -> jwt + id utilisateur
// 2. création du profil institutionnel   -> id profil
// 3. création du wallet corporate        -> id wallet
// 4. upload du logo (optionnel)
//
// Chaque appel dépend de l'id retourné par le précédent. Un échec aux
// étapes 1 à 3 arrête la séquence : l'erreur liste les ressources déjà
// créées, qui restent en place (aucun rollback). Un échec du logo n'est
// qu'un avertissement.
// ============================================================================

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, instrument, warn};

use super::form::LogoFile;
use super::wizard::SignupApplication;

/// Rôle CMS attribué aux clients institutionnels
pub const INSTITUTIONAL_ROLE: u32 = 10;

pub const WALLET_DAILY_LIMIT: u64 = 1_000_000;
pub const WALLET_MONTHLY_LIMIT: u64 = 10_000_000;

// ============================================================================
// Backend
// ============================================================================

/// Corps de la création de compte
#[derive(Clone, Serialize, PartialEq)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirmed: bool,
    pub blocked: bool,
    pub role: u32,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Session retournée par la création de compte
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub jwt: String,
    pub user_id: u64,
}

/// Services distants utilisés par l'inscription
#[async_trait]
pub trait SignupBackend: Send + Sync {
    async fn register(&self, request: &RegisterRequest) -> Result<Session>;

    /// Crée le profil institutionnel ; retourne son id
    async fn create_profile(&self, jwt: &str, payload: &Value) -> Result<u64>;

    /// Crée le wallet ; retourne son id
    async fn create_wallet(&self, jwt: &str, payload: &Value) -> Result<u64>;

    async fn upload_logo(&self, jwt: &str, logo: &LogoFile, profile_id: u64) -> Result<()>;
}

// ============================================================================
// Résultat
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStep {
    Register,
    Profile,
    Wallet,
    Logo,
}

impl fmt::Display for SubmitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SubmitStep::Register => "création du compte",
            SubmitStep::Profile => "création du profil",
            SubmitStep::Wallet => "création du wallet",
            SubmitStep::Logo => "upload du logo",
        })
    }
}

/// Ressource créée côté CMS
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreatedResource {
    UserAccount { id: u64 },
    InstitutionalProfile { id: u64 },
    Wallet { id: u64, wallet_id: String },
}

impl fmt::Display for CreatedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreatedResource::UserAccount { id } => write!(f, "compte utilisateur #{}", id),
            CreatedResource::InstitutionalProfile { id } => write!(f, "profil institutionnel #{}", id),
            CreatedResource::Wallet { id, wallet_id } => write!(f, "wallet #{} ({})", id, wallet_id),
        }
    }
}

#[derive(Debug, Error)]
pub enum SignupError {
    #[error("échec de l'inscription ({step}) : {source}")]
    Failed {
        step: SubmitStep,
        /// Ressources créées avant l'échec, laissées en place
        created: Vec<CreatedResource>,
        source: anyhow::Error,
    },
}

impl SignupError {
    pub fn created(&self) -> &[CreatedResource] {
        match self {
            SignupError::Failed { created, .. } => created,
        }
    }
}

/// Inscription réussie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupOutcome {
    pub user_id: u64,
    pub profile_id: u64,
    pub wallet_id: String,
    pub created: Vec<CreatedResource>,
    /// Problèmes non bloquants (ex: logo refusé)
    pub warnings: Vec<String>,
}

// ============================================================================
// Payloads
// ============================================================================

pub fn register_request(application: &SignupApplication) -> RegisterRequest {
    RegisterRequest {
        username: application.account.username.clone(),
        email: application.account.email.clone(),
        password: application.account.password.clone(),
        confirmed: false,
        blocked: false,
        role: INSTITUTIONAL_ROLE,
    }
}

/// Corps de création du profil institutionnel
///
/// Les blocs imbriqués sont envoyés en JSON texte, comme les attend le CMS.
pub fn profile_payload(application: &SignupApplication, user_id: u64, now: DateTime<Utc>) -> Value {
    let company = &application.company;
    let trading = &application.trading;
    let contact = &application.contact;
    let terms = &application.terms;

    let primary_contact = json!({
        "name": contact.primary_name,
        "position": contact.primary_position,
        "email": contact.primary_email,
        "phone": contact.primary_phone,
    });
    let billing_address = address(
        &contact.street,
        &contact.city,
        &contact.state,
        &contact.postal_code,
        &contact.country,
    );
    let operational_address = if contact.same_address {
        billing_address.clone()
    } else {
        address(
            &contact.operational_street,
            &contact.operational_city,
            &contact.operational_state,
            &contact.operational_postal_code,
            &contact.operational_country,
        )
    };
    let authorized_persons: Vec<Value> = contact
        .authorized_persons()
        .iter()
        .map(|person| {
            json!({
                "name": person.name,
                "position": person.position,
                "email": person.email,
                "phone": person.phone,
            })
        })
        .collect();
    let fee_plan = json!({
        "enabled": true,
        "tradingPlatforms": trading.trading_platforms,
        "instrumentsTraded": trading.instruments_traded,
        "leverageRequirements": trading.leverage_requirements,
        "customLiquidity": trading.custom_liquidity,
        "dmaAccess": trading.dma_access,
        "collocationNeeded": trading.collocation_needed,
    });
    let legal_documents = json!({
        "regulatoryStatus": terms.regulatory_status,
        "amlPolicy": terms.aml_policy,
        "kycProcedures": terms.kyc_procedures,
    });
    let risk_profile = json!({
        "tradingDesk": {
            "email": contact.desk_email,
            "phone": contact.desk_phone,
        },
        "technicalContact": {
            "name": contact.technical_name,
            "email": contact.technical_email,
            "phone": contact.technical_phone,
        },
        "needPrimeBrokerage": terms.need_prime_brokerage,
        "needRiskManagement": terms.need_risk_management,
        "needMarketData": terms.need_market_data,
        "needReporting": terms.need_reporting,
    });

    let support_level = if trading.trading_volume == "over_500m" {
        "enterprise"
    } else {
        "premium"
    };

    json!({
        "data": {
            "users_permissions_user": user_id,
            "status": "pending",
            "companyName": company.company_name,
            "legalEntityType": company.legal_entity_type,
            "businessRegistrationNumber": company.business_registration_number,
            "countryOfIncorporation": company.country_of_incorporation,
            "taxIdentificationNumber": company.tax_identification_number,
            "platformType": "bittrade",
            "primaryContactPerson": primary_contact.to_string(),
            "authorizedPersons": Value::Array(authorized_persons).to_string(),
            "billingAddress": billing_address.to_string(),
            "operationalAddress": operational_address.to_string(),
            "kycVerified": false,
            "amlChecked": false,
            "serviceAgreementSigned": false,
            "apiAccess": trading.wants_api_access(),
            "supportLevel": support_level,
            "tradingVolume": 0,
            "customFeePlan": fee_plan.to_string(),
            "legalDocuments": legal_documents.to_string(),
            "riskProfile": risk_profile.to_string(),
            "establishedDate": null,
            "totalAssets": company.total_assets(),
            "annualRevenue": 0,
            "publishedAt": now.to_rfc3339(),
        }
    })
}

fn address(street: &str, city: &str, state: &str, postal_code: &str, country: &str) -> Value {
    json!({
        "street": street,
        "city": city,
        "state": state,
        "postalCode": postal_code,
        "country": country,
    })
}

/// Identifiant lisible du wallet : INST-{user}-{millis}
pub fn wallet_id(user_id: u64, now: DateTime<Utc>) -> String {
    format!("INST-{}-{}", user_id, now.timestamp_millis())
}

pub fn wallet_payload(wallet_id: &str, profile_id: u64) -> Value {
    json!({
        "data": {
            "balance": 0,
            "currency": "USD",
            "isActive": true,
            "walletId": wallet_id,
            "wallet_type": "corporate",
            "dailyLimit": WALLET_DAILY_LIMIT,
            "monthlyLimit": WALLET_MONTHLY_LIMIT,
            "institutional_client": profile_id,
        }
    })
}

// ============================================================================
// Séquence
// ============================================================================

/// Exécute la séquence d'inscription
#[instrument(skip_all, fields(username = %application.account.username))]
pub async fn submit_signup(
    backend: &dyn SignupBackend,
    application: &SignupApplication,
    now: DateTime<Utc>,
) -> Result<SignupOutcome, SignupError> {
    let mut created = Vec::new();

    let session = backend
        .register(&register_request(application))
        .await
        .map_err(|source| fail(SubmitStep::Register, &created, source))?;
    created.push(CreatedResource::UserAccount { id: session.user_id });
    info!(user_id = session.user_id, "User account created");

    let profile_id = backend
        .create_profile(&session.jwt, &profile_payload(application, session.user_id, now))
        .await
        .map_err(|source| fail(SubmitStep::Profile, &created, source))?;
    created.push(CreatedResource::InstitutionalProfile { id: profile_id });
    info!(profile_id, "Institutional profile created");

    let wallet_id = wallet_id(session.user_id, now);
    let wallet_record = backend
        .create_wallet(&session.jwt, &wallet_payload(&wallet_id, profile_id))
        .await
        .map_err(|source| fail(SubmitStep::Wallet, &created, source))?;
    created.push(CreatedResource::Wallet {
        id: wallet_record,
        wallet_id: wallet_id.clone(),
    });
    info!(wallet_id = %wallet_id, "Corporate wallet created");

    let mut warnings = Vec::new();
    if let Some(logo) = &application.logo {
        if let Err(e) = backend.upload_logo(&session.jwt, logo, profile_id).await {
            warn!(error = ?e, file = %logo.file_name, "Logo upload failed, continuing");
            warnings.push(format!("{} : {:#}", SubmitStep::Logo, e));
        }
    }

    Ok(SignupOutcome {
        user_id: session.user_id,
        profile_id,
        wallet_id,
        created,
        warnings,
    })
}

fn fail(step: SubmitStep, created: &[CreatedResource], source: anyhow::Error) -> SignupError {
    if created.is_empty() {
        warn!(step = %step, error = ?source, "Signup failed, nothing was created");
    } else {
        // Pas de compensation : les ressources déjà créées restent sur le CMS
        warn!(
            step = %step,
            error = ?source,
            orphaned = ?created,
            "Signup failed, previously created resources were left in place"
        );
    }

    SignupError::Failed {
        step,
        created: created.to_vec(),
        source,
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
