//! HTTP Remote Authority speaking a PostgREST-style row API

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{RemoteAuthority, RemoteError, RowShape};

/// Remote Authority client for a PostgREST-style backend.
///
/// Upserts are idempotent via `Prefer: resolution=merge-duplicates`, deletes
/// and reads filter by id/timestamp columns. The `shape` of list queries
/// picks the timestamp column name, since legacy deployments predate the
/// canonical naming.
#[derive(Clone)]
pub struct HttpRemoteAuthority {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpRemoteAuthority {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> std::result::Result<Self, RemoteError> {
        let base_url = normalize_endpoint(base_url.into())?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        Ok(Self {
            base_url,
            api_key: api_key.into(),
            client,
        })
    }

    fn rows_url(&self, record_type: &str) -> String {
        format!("{}/rest/v1/{record_type}", self.base_url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
    }
}

#[async_trait]
impl RemoteAuthority for HttpRemoteAuthority {
    async fn upsert(
        &self,
        record_type: &str,
        row: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, RemoteError> {
        let response = self
            .authorized(self.client.post(self.rows_url(record_type)))
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&serde_json::json!([row]))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(classify_error(response).await);
        }

        let rows = response.json::<Vec<serde_json::Value>>().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| RemoteError::Api("upsert returned no representation".to_string()))
    }

    async fn delete(&self, record_type: &str, id: &str) -> std::result::Result<(), RemoteError> {
        let url = format!("{}?id=eq.{id}", self.rows_url(record_type));
        let response = self.authorized(self.client.delete(url)).send().await?;

        // Deleting an already-absent row is a success: the call is idempotent.
        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(classify_error(response).await)
        }
    }

    async fn list_modified_since(
        &self,
        record_type: &str,
        since: i64,
        shape: RowShape,
    ) -> std::result::Result<Vec<serde_json::Value>, RemoteError> {
        let column = match shape {
            RowShape::Canonical => "updated_at",
            RowShape::Legacy => "modified_at",
        };
        let url = format!(
            "{}?select=*&{column}=gte.{since}&order={column}.asc",
            self.rows_url(record_type)
        );
        let response = self.authorized(self.client.get(url)).send().await?;

        if !response.status().is_success() {
            return Err(classify_error(response).await);
        }

        Ok(response.json::<Vec<serde_json::Value>>().await?)
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: Option<String>,
    error: Option<String>,
    message: Option<String>,
}

async fn classify_error(response: reqwest::Response) -> RemoteError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = parse_api_error(status, &body);
    if is_schema_mismatch(&body) {
        RemoteError::SchemaMismatch(message)
    } else {
        RemoteError::Api(message)
    }
}

/// "Field does not exist" class of errors: PostgREST's missing-column code,
/// Postgres undefined_column, or a plain-text variant of either.
fn is_schema_mismatch(body: &str) -> bool {
    body.contains("PGRST204")
        || body.contains("42703")
        || (body.contains("column") && (body.contains("does not exist") || body.contains("not found")))
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error).or(payload.code) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_endpoint(raw: String) -> std::result::Result<String, RemoteError> {
    let endpoint = raw.trim();
    if endpoint.is_empty() {
        return Err(RemoteError::Api("endpoint must not be empty".to_string()));
    }
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::Api(
            "endpoint must include http:// or https://".to_string(),
        ))
    }
}
