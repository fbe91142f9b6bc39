//! Production clients for the spreadsheet and file-store APIs.
//!
//! `SheetsClient` speaks the Sheets v4 values API; `DriveClient` performs a
//! multipart Drive v3 upload into the configured folder and returns a
//! link-readable URL. Both share one `reqwest::Client` and one cached token
//! source, constructed once at startup.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::sheets::auth::{ServiceAccountKey, TokenSource};
use crate::sheets::{FileStore, TabularStore};

const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DRIVE_UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/drive/v3/files?uploadType=multipart&fields=id";
const DRIVE_FILES_BASE: &str = "https://www.googleapis.com/drive/v3/files";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Escape an A1 range for use in a URL path segment. Sheet names may contain
/// spaces ("Form Responses!A2:J").
fn encode_range(range: &str) -> String {
    range.replace(' ', "%20")
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Everything the two production clients share.
pub struct RemoteContext {
    http: reqwest::Client,
    tokens: TokenSource,
}

impl RemoteContext {
    /// Build the shared context from configuration. Any missing identifier or
    /// unreadable credential is reported as a `ConfigError`; the caller keeps
    /// serving and fails each request with it instead of crashing.
    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let key_path = config.service_account_key.as_deref().ok_or_else(|| {
            ServiceError::ConfigError("service_account_key is not configured".into())
        })?;
        let key = ServiceAccountKey::from_file(std::path::Path::new(key_path))?;

        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| {
                ServiceError::ConfigError(format!("failed to construct HTTP client: {}", e))
            })?;

        let tokens = TokenSource::new(key, http.clone())?;
        Ok(Self { http, tokens })
    }

    async fn bearer(&self) -> Result<String, ServiceError> {
        self.tokens.bearer_token().await
    }
}

/// Tabular store backed by the Sheets v4 values API.
pub struct SheetsClient {
    ctx: Arc<RemoteContext>,
    spreadsheet_id: String,
}

impl SheetsClient {
    pub fn new(ctx: Arc<RemoteContext>, config: &AppConfig) -> Result<Self, ServiceError> {
        let spreadsheet_id = config
            .spreadsheet_id
            .clone()
            .ok_or_else(|| ServiceError::ConfigError("spreadsheet_id is not configured".into()))?;
        Ok(Self {
            ctx,
            spreadsheet_id,
        })
    }

    fn values_url(&self, range: &str, suffix: &str) -> String {
        format!(
            "{}/{}/values/{}{}",
            SHEETS_BASE,
            self.spreadsheet_id,
            encode_range(range),
            suffix
        )
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response, ServiceError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ServiceError::RemoteService(format!(
                "{} failed with {}: {}",
                what, status, body
            )))
        }
    }
}

#[async_trait]
impl TabularStore for SheetsClient {
    #[instrument(skip(self))]
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, ServiceError> {
        let token = self.ctx.bearer().await?;
        let response = self
            .ctx
            .http
            .get(self.values_url(range, ""))
            .bearer_auth(token)
            .send()
            .await?;
        let body: ValueRange = Self::check(response, "range read")
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::RemoteService(format!("bad values response: {}", e)))?;

        // Cells come back as untyped JSON scalars; the ledger works on their
        // string forms.
        let rows = body
            .values
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| match cell {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect()
            })
            .collect();
        Ok(rows)
    }

    #[instrument(skip(self, rows))]
    async fn append_rows(&self, range: &str, rows: Vec<Vec<String>>) -> Result<(), ServiceError> {
        let token = self.ctx.bearer().await?;
        debug!(range, rows = rows.len(), "appending rows");
        let response = self
            .ctx
            .http
            .post(self.values_url(range, ":append?valueInputOption=USER_ENTERED"))
            .bearer_auth(token)
            .json(&json!({ "values": rows }))
            .send()
            .await?;
        Self::check(response, "range append").await?;
        Ok(())
    }

    #[instrument(skip(self, rows))]
    async fn update_range(&self, range: &str, rows: Vec<Vec<String>>) -> Result<(), ServiceError> {
        let token = self.ctx.bearer().await?;
        debug!(range, rows = rows.len(), "updating range");
        let response = self
            .ctx
            .http
            .put(self.values_url(range, "?valueInputOption=USER_ENTERED"))
            .bearer_auth(token)
            .json(&json!({ "values": rows }))
            .send()
            .await?;
        Self::check(response, "range update").await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

/// File store backed by the Drive v3 upload API.
pub struct DriveClient {
    ctx: Arc<RemoteContext>,
    folder_id: String,
}

impl DriveClient {
    pub fn new(ctx: Arc<RemoteContext>, config: &AppConfig) -> Result<Self, ServiceError> {
        let folder_id = config
            .drive_folder_id
            .clone()
            .ok_or_else(|| ServiceError::ConfigError("drive_folder_id is not configured".into()))?;
        Ok(Self { ctx, folder_id })
    }
}

#[async_trait]
impl FileStore for DriveClient {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ServiceError> {
        let token = self.ctx.bearer().await?;

        let metadata = json!({
            "name": file_name,
            "parents": [self.folder_id],
        });
        let form = reqwest::multipart::Form::new()
            .part(
                "metadata",
                reqwest::multipart::Part::text(metadata.to_string())
                    .mime_str("application/json")
                    .map_err(|e| ServiceError::UploadError(e.to_string()))?,
            )
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes)
                    .file_name(file_name.to_string())
                    .mime_str(mime_type)
                    .map_err(|e| ServiceError::UploadError(e.to_string()))?,
            );

        let response = self
            .ctx
            .http
            .post(DRIVE_UPLOAD_URL)
            .bearer_auth(&token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ServiceError::UploadError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::UploadError(format!(
                "file upload failed with {}: {}",
                status, body
            )));
        }

        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| ServiceError::UploadError(format!("bad upload response: {}", e)))?;

        // Make the file link-readable so the stored link works for anyone
        // viewing the sheet. A failure here orphans a private file; the
        // upload is not rolled back.
        let permission_url = format!("{}/{}/permissions", DRIVE_FILES_BASE, file.id);
        let response = self
            .ctx
            .http
            .post(&permission_url)
            .bearer_auth(&token)
            .json(&json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await
            .map_err(|e| ServiceError::UploadError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::UploadError(format!(
                "sharing uploaded file failed with {}: {}",
                status, body
            )));
        }

        Ok(format!("https://drive.google.com/uc?id={}", file.id))
    }
}
