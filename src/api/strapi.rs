// ============================================================================
// API Client : CMS (Strapi)
// ============================================================================
// - lecture des offres d'emploi : GET /api/careers?populate=*&locale=xx
// - inscription institutionnelle : compte, profil, wallet, logo
//
// Le CMS enveloppe ses réponses : { "data": [ { "id": 1, "attributes": {...} } ] }
// et ses erreurs : { "error": { "status": 400, "message": "..." } }
// ============================================================================

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, instrument};

use crate::models::{Department, JobPosting, Location};
use crate::signup::form::LogoFile;
use crate::signup::submit::{RegisterRequest, Session, SignupBackend};

/// Référence CMS du modèle qui reçoit le logo
const LOGO_REF: &str = "api::institutional-client.institutional-client";

// ============================================================================
// Structures pour parser les réponses du CMS
// ============================================================================

#[derive(Debug, Deserialize)]
struct CmsList<T> {
    data: Vec<CmsEntry<T>>,
}

#[derive(Debug, Deserialize)]
struct CmsEntry<T> {
    id: u64,
    attributes: T,
}

#[derive(Debug, Deserialize)]
struct CmsCreated {
    data: CmsId,
}

#[derive(Debug, Deserialize)]
struct CmsId {
    id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CareerAttributes {
    title: String,
    #[serde(default)]
    department: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    requirements: Option<String>,
    #[serde(default)]
    short_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    jwt: String,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct CmsErrorBody {
    error: CmsError,
}

#[derive(Debug, Deserialize)]
struct CmsError {
    message: String,
}

// ============================================================================
// Client
// ============================================================================

pub struct StrapiClient {
    client: reqwest::Client,
    base_url: String,
}

impl StrapiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("bitdash/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .context("Échec de la création du client HTTP")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Offres d'emploi publiées pour une langue
    #[instrument(skip(self))]
    pub async fn fetch_careers(&self, locale: &str) -> Result<Vec<JobPosting>> {
        let request = self
            .careers_request(locale)
            .context("Requête des offres d'emploi invalide")?;
        debug!(url = %request.url(), "Fetching careers");

        let response = self
            .client
            .execute(request)
            .await
            .context("Échec de la requête HTTP vers le CMS")?;

        let body = read_body(response).await?;
        let jobs = parse_careers(&body)?;

        info!(count = jobs.len(), "Successfully fetched careers");
        Ok(jobs)
    }

    /// GET /api/careers ; la locale est encodée dans la query string
    fn careers_request(&self, locale: &str) -> reqwest::Result<reqwest::Request> {
        self.client
            .get(self.url("/api/careers"))
            .query(&[("populate", "*"), ("locale", locale)])
            .build()
    }

    /// POST JSON, avec jeton optionnel, et désérialise la réponse
    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        jwt: Option<&str>,
        body: &(impl serde::Serialize + ?Sized),
    ) -> Result<T> {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(jwt) = jwt {
            request = request.bearer_auth(jwt);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Échec de la requête HTTP vers {}", path))?;

        let body = read_body(response).await?;
        serde_json::from_str(&body).with_context(|| format!("Réponse inattendue de {}", path))
    }
}

/// Vérifie le statut et retourne le corps ; une erreur CMS remonte son message
async fn read_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    debug!(status = %status, "Received HTTP response");

    let body = response
        .text()
        .await
        .context("Échec de la lecture de la réponse du CMS")?;

    if !status.is_success() {
        error!(status = %status, "CMS returned error status");
        match serde_json::from_str::<CmsErrorBody>(&body) {
            Ok(cms) => anyhow::bail!("{}", cms.error.message),
            Err(_) => anyhow::bail!("Le CMS a retourné une erreur : HTTP {}", status),
        }
    }

    Ok(body)
}

fn parse_careers(body: &str) -> Result<Vec<JobPosting>> {
    let list: CmsList<CareerAttributes> =
        serde_json::from_str(body).context("Échec du parsing JSON des offres d'emploi")?;

    Ok(list
        .data
        .into_iter()
        .map(|entry| {
            let career = entry.attributes;
            JobPosting {
                id: entry.id.to_string(),
                title: career.title,
                department: Department::from(career.department.unwrap_or_default()),
                location: Location::from(career.location.unwrap_or_default()),
                description: career.description.unwrap_or_default(),
                requirements: career.requirements.unwrap_or_default(),
                short_description: career.short_description,
            }
        })
        .collect())
}

#[async_trait]
impl SignupBackend for StrapiClient {
    #[instrument(skip_all, fields(username = %request.username))]
    async fn register(&self, request: &RegisterRequest) -> Result<Session> {
        let auth: AuthResponse = self
            .post_json("/api/auth/local/register", None, request)
            .await?;
        Ok(Session {
            jwt: auth.jwt,
            user_id: auth.user.id,
        })
    }

    #[instrument(skip_all)]
    async fn create_profile(&self, jwt: &str, payload: &Value) -> Result<u64> {
        let created: CmsCreated = self
            .post_json("/api/institutional-clients", Some(jwt), payload)
            .await?;
        Ok(created.data.id)
    }

    #[instrument(skip_all)]
    async fn create_wallet(&self, jwt: &str, payload: &Value) -> Result<u64> {
        let created: CmsCreated = self.post_json("/api/wallets", Some(jwt), payload).await?;
        Ok(created.data.id)
    }

    #[instrument(skip(self, jwt), fields(file = %logo.file_name))]
    async fn upload_logo(&self, jwt: &str, logo: &LogoFile, profile_id: u64) -> Result<()> {
        // Le fichier est transmis tel quel
        let bytes = tokio::fs::read(&logo.path)
            .await
            .with_context(|| format!("Échec de la lecture de {}", logo.path.display()))?;

        let part = Part::bytes(bytes)
            .file_name(logo.file_name.clone())
            .mime_str(logo.mime)
            .context("Type MIME invalide")?;

        let form = Form::new()
            .part("files", part)
            .text("ref", LOGO_REF)
            .text("refId", profile_id.to_string())
            .text("field", "logo");

        let response = self
            .client
            .post(self.url("/api/upload"))
            .bearer_auth(jwt)
            .multipart(form)
            .send()
            .await
            .context("Échec de l'upload du logo")?;

        read_body(response).await?;
        info!(profile_id, "Logo uploaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_careers_request_url() {
        let client = StrapiClient::new("https://cms.example.com/").unwrap();

        let request = client.careers_request("fr").unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://cms.example.com/api/careers?populate=*&locale=fr"
        );

        // Une locale hostile reste une seule valeur
        let request = client.careers_request("fr&populate=secret").unwrap();
        let pairs: Vec<(String, String)> = request.url().query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("populate".to_string(), "*".to_string()),
                ("locale".to_string(), "fr&populate=secret".to_string()),
            ]
        );

        assert_eq!(
            client.url("/api/wallets"),
            "https://cms.example.com/api/wallets"
        );
    }

    #[test]
    fn test_parse_careers() {
        let body = r#"{"data":[
            {"id":3,"attributes":{"title":"Rust Engineer","department":"engineering",
             "location":"new-york","description":"Build the engine","requirements":"Rust",
             "shortDescription":"Engine team","createdAt":"2024-01-01"}},
            {"id":4,"attributes":{"title":"Support","department":"customer-service",
             "location":"mars","description":null}}
        ],"meta":{"pagination":{"total":2}}}"#;

        let jobs = parse_careers(body).unwrap();
        assert_eq!(jobs.len(), 2);

        assert_eq!(jobs[0].id, "3");
        assert_eq!(jobs[0].department, Department::Engineering);
        assert_eq!(jobs[0].location, Location::NewYork);
        assert_eq!(jobs[0].short_description.as_deref(), Some("Engine team"));

        assert_eq!(jobs[1].department, Department::CustomerService);
        assert_eq!(jobs[1].location, Location::Other("mars".into()));
        assert_eq!(jobs[1].description, "");
        assert_eq!(jobs[1].requirements, "");
    }

    #[test]
    fn test_parse_careers_rejects_garbage() {
        assert!(parse_careers("<html>502</html>").is_err());
    }

    #[test]
    fn test_parse_cms_envelopes() {
        let created: CmsCreated = serde_json::from_str(r#"{"data":{"id":21,"attributes":{}}}"#).unwrap();
        assert_eq!(created.data.id, 21);

        let auth: AuthResponse =
            serde_json::from_str(r#"{"jwt":"abc","user":{"id":7,"username":"acme"}}"#).unwrap();
        assert_eq!(auth.jwt, "abc");
        assert_eq!(auth.user.id, 7);

        let err: CmsErrorBody = serde_json::from_str(
            r#"{"data":null,"error":{"status":400,"name":"ApplicationError","message":"Email or Username are already taken"}}"#,
        )
        .unwrap();
        assert_eq!(err.error.message, "Email or Username are already taken");
    }

    #[tokio::test]
    async fn test_unreachable_cms_is_an_error() {
        let client = StrapiClient::new("http://127.0.0.1:9").unwrap();
        assert!(client.fetch_careers("en").await.is_err());
    }
}
