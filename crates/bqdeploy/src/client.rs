use crate::credentials::ServiceAccountKey;
use crate::error::{DeployError, Result};
use crate::models::{ApiErrorBody, Dataset, Table, TokenResponse, ViewPatch};
use async_trait::async_trait;
use chrono::Utc;
use diagnostics::*;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::time::Duration;

const BASE_URL: &str = "https://bigquery.googleapis.com";
const SCOPE: &str = "https://www.googleapis.com/auth/bigquery";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TIMEOUT_SECONDS: u64 = 60;
const TOKEN_LIFETIME_SECONDS: i64 = 3600;

/// The remote warehouse calls the deployment logic needs. The REST client
/// implements this; tests substitute their own recording implementation.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Create a dataset; a 409 surfaces as `DeployError::Conflict`.
    async fn insert_dataset(&self, dataset: &Dataset) -> Result<()>;

    /// Create a view-backed table; a 409 surfaces as `DeployError::Conflict`.
    async fn insert_view(&self, table: &Table) -> Result<()>;

    /// Overwrite the query of an existing view.
    async fn patch_view(&self, table: &Table) -> Result<()>;
}

/// JWT claims for the service-account assertion
#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Async BigQuery REST API client
pub struct BigQueryClient {
    http_client: reqwest::Client,
    token: String,
}

impl BigQueryClient {
    /// Create a new client authenticated with a service-account key
    pub async fn connect(key: &ServiceAccountKey) -> Result<Self> {
        let token = fetch_access_token(key).await?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECONDS))
            .build()?;

        Ok(Self { http_client, token })
    }

    async fn send_json<B: Serialize>(
        &self,
        request: reqwest::RequestBuilder,
        body: &B,
        resource: &str,
    ) -> Result<()> {
        let response = request
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_string(body)?)
            .send()
            .await?;

        check_response(response, resource).await
    }

    // URL construction helpers
    fn datasets_url(project: &str) -> String {
        format!("{}/bigquery/v2/projects/{}/datasets", BASE_URL, project)
    }

    fn tables_url(project: &str, dataset: &str) -> String {
        format!(
            "{}/bigquery/v2/projects/{}/datasets/{}/tables",
            BASE_URL, project, dataset
        )
    }

    fn table_url(project: &str, dataset: &str, table: &str) -> String {
        format!(
            "{}/bigquery/v2/projects/{}/datasets/{}/tables/{}",
            BASE_URL, project, dataset, table
        )
    }
}

#[async_trait]
impl Warehouse for BigQueryClient {
    async fn insert_dataset(&self, dataset: &Dataset) -> Result<()> {
        let reference = &dataset.dataset_reference;
        let url = Self::datasets_url(&reference.project_id);
        let resource = format!("{}.{}", reference.project_id, reference.dataset_id);
        debug!("POST {url}");
        self.send_json(self.http_client.post(&url), dataset, &resource)
            .await
    }

    async fn insert_view(&self, table: &Table) -> Result<()> {
        let reference = &table.table_reference;
        let url = Self::tables_url(&reference.project_id, &reference.dataset_id);
        debug!("POST {url}");
        self.send_json(self.http_client.post(&url), table, &reference.full_id())
            .await
    }

    async fn patch_view(&self, table: &Table) -> Result<()> {
        let reference = &table.table_reference;
        let url = Self::table_url(
            &reference.project_id,
            &reference.dataset_id,
            &reference.table_id,
        );
        let patch = ViewPatch { view: &table.view };
        debug!("PATCH {url}");
        self.send_json(self.http_client.patch(&url), &patch, &reference.full_id())
            .await
    }
}

/// Map a non-success response onto the closed error set: 409 is a naming
/// conflict, 403 a permission/billing failure, anything else an API error
/// carrying status and message.
async fn check_response(response: reqwest::Response, resource: &str) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|parsed| parsed.error.message)
        .unwrap_or(body);

    match status.as_u16() {
        409 => Err(DeployError::Conflict {
            resource: resource.to_string(),
        }),
        403 => Err(DeployError::PermissionDenied {
            resource: resource.to_string(),
            message,
        }),
        code => Err(DeployError::Api {
            status: code,
            message,
        }),
    }
}

/// Exchange a signed JWT assertion for a bearer token at the key's token
/// endpoint. One token covers a whole deployment run.
async fn fetch_access_token(key: &ServiceAccountKey) -> Result<String> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        iss: &key.client_email,
        scope: SCOPE,
        aud: &key.token_uri,
        iat: now,
        exp: now + TOKEN_LIFETIME_SECONDS,
    };

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| DeployError::Auth(format!("invalid private key: {e}")))?;
    let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| DeployError::Auth(format!("failed to sign token assertion: {e}")))?;

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(TIMEOUT_SECONDS))
        .build()?;

    let response = http_client
        .post(&key.token_uri)
        .form(&[("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())])
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        return Err(DeployError::Auth(format!(
            "token endpoint returned HTTP {}: {}",
            status, error_text
        )));
    }

    let json_text = response.text().await?;
    let token: TokenResponse = serde_json::from_str(&json_text)?;
    Ok(token.access_token)
}
