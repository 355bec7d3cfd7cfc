//! Google Drive access: the activity feed and file metadata.
//!
//! `DriveApi` is the seam the poller and the path resolver consume; the
//! production implementation talks REST with a bearer token.  Credential
//! acquisition is out of scope — the client takes a ready access token from
//! settings and performs at most one refresh-token exchange when a call
//! comes back 401, then retries that call once.

use crate::config::GoogleDriveSettings;
use crate::session::{HttpSession, RequestOpts};
use async_trait::async_trait;
use tokio::sync::RwLock;

pub const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
pub const ACTIVITY_QUERY_URL: &str = "https://driveactivity.googleapis.com/v2/activity:query";
pub const OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

const FILE_FIELDS: &str = "id,name,parents,mimeType,webViewLink,size";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One poll window against `activity.query`.
#[derive(Debug, Clone)]
pub struct ActivityQuery {
    pub ancestor_id: String,
    pub page_size: u32,
    pub page_token: Option<String>,
    /// Window bounds as unix milliseconds; the filter is
    /// `time > start AND time <= end`.
    pub start_ms: i64,
    pub end_ms: i64,
}

impl ActivityQuery {
    fn body(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "pageSize": self.page_size,
            "ancestorName": format!("items/{}", self.ancestor_id),
            "filter": format!("time > {} AND time <= {}", self.start_ms, self.end_ms),
        });
        if let Some(token) = &self.page_token {
            body["pageToken"] = serde_json::Value::String(token.clone());
        }
        body
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActivityPage {
    pub activities: Vec<serde_json::Value>,
    pub next_page_token: Option<String>,
}

/// The metadata subset the resolver walks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub parents: Vec<String>,
    pub mime_type: Option<String>,
    pub web_view_link: Option<String>,
    pub size: u64,
}

impl DriveFile {
    /// Drive serialises int64 fields as strings; tolerate both.
    pub fn from_json(value: &serde_json::Value) -> Option<DriveFile> {
        let id = value.get("id")?.as_str()?.to_owned();
        let size = match value.get("size") {
            Some(serde_json::Value::String(s)) => s.parse().unwrap_or(0),
            Some(v) => v.as_u64().unwrap_or(0),
            None => 0,
        };
        Some(DriveFile {
            id,
            name: value
                .get("name")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            parents: value
                .get("parents")
                .and_then(serde_json::Value::as_array)
                .map(|a| {
                    a.iter()
                        .filter_map(serde_json::Value::as_str)
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default(),
            mime_type: value
                .get("mimeType")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned),
            web_view_link: value
                .get("webViewLink")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned),
            size,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("transport failure on {url}: {reason}")]
    Transport { url: String, reason: String },
    #[error("HTTP {status} from {url}: {reason}")]
    Http {
        status: u16,
        url: String,
        reason: String,
    },
    #[error("auth: {0}")]
    Auth(String),
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// The seam
// ---------------------------------------------------------------------------

#[async_trait]
pub trait DriveApi: Send + Sync {
    async fn query_activities(&self, query: &ActivityQuery) -> Result<ActivityPage, DriveError>;
    async fn get_file(&self, item_id: &str) -> Result<DriveFile, DriveError>;
}

// ---------------------------------------------------------------------------
// Production client
// ---------------------------------------------------------------------------

pub struct GoogleDrive {
    session: HttpSession,
    access_token: RwLock<String>,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    scopes: Vec<String>,
}

impl GoogleDrive {
    #[must_use]
    pub fn new(settings: &GoogleDriveSettings) -> Self {
        GoogleDrive {
            session: HttpSession::new(),
            access_token: RwLock::new(settings.token.access_token.clone()),
            client_id: settings.token.client_id.clone(),
            client_secret: settings.token.client_secret.clone(),
            refresh_token: settings.token.refresh_token.clone(),
            scopes: settings.scopes.clone(),
        }
    }

    fn can_refresh(&self) -> bool {
        !self.refresh_token.is_empty() && !self.client_id.is_empty()
    }

    /// Exchange the refresh token for a fresh access token.
    async fn refresh_access_token(&self) -> Result<(), DriveError> {
        let response = self
            .session
            .post(
                OAUTH_TOKEN_URL,
                RequestOpts {
                    form: vec![
                        ("client_id".to_owned(), self.client_id.clone()),
                        ("client_secret".to_owned(), self.client_secret.clone()),
                        ("refresh_token".to_owned(), self.refresh_token.clone()),
                        ("grant_type".to_owned(), "refresh_token".to_owned()),
                        ("scope".to_owned(), self.scopes.join(" ")),
                    ],
                    ..RequestOpts::default()
                },
            )
            .await;
        if !response.ok() {
            return Err(DriveError::Auth(format!(
                "token refresh failed with status {}: {}",
                response.status,
                response.error.as_deref().unwrap_or(&response.content)
            )));
        }
        let token = response
            .json
            .as_ref()
            .and_then(|j| j.get("access_token"))
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| DriveError::Auth("token response without access_token".to_owned()))?;
        *self.access_token.write().await = token.to_owned();
        tracing::info!("access token refreshed");
        Ok(())
    }

    /// Issue an authenticated call, refreshing the token once on 401.
    async fn authed(
        &self,
        method: reqwest::Method,
        url: &str,
        params: Vec<(String, String)>,
        json: Option<serde_json::Value>,
    ) -> Result<crate::session::WireResponse, DriveError> {
        for attempt in 0..2 {
            let bearer = self.access_token.read().await.clone();
            let mut response = self
                .session
                .request(
                    method.clone(),
                    url,
                    RequestOpts {
                        params: params.clone(),
                        json: json.clone(),
                        bearer: Some(bearer),
                        ..RequestOpts::default()
                    },
                )
                .await;
            if response.status == 401 && attempt == 0 && self.can_refresh() {
                tracing::warn!(url, "401 from Google, refreshing access token");
                self.refresh_access_token().await?;
                continue;
            }
            if let Some(reason) = response.error.take() {
                return Err(DriveError::Transport {
                    url: response.url,
                    reason,
                });
            }
            if !response.ok() {
                return Err(DriveError::Http {
                    status: response.status,
                    url: response.url,
                    reason: http_reason(&response.json, &response.content),
                });
            }
            return Ok(response);
        }
        unreachable!("authed loop returns within two attempts")
    }
}

/// Pull the human-readable message out of a Google error body.
fn http_reason(json: &Option<serde_json::Value>, content: &str) -> String {
    json.as_ref()
        .and_then(|j| j.pointer("/error/message"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or(content)
        .trim()
        .to_owned()
}

#[async_trait]
impl DriveApi for GoogleDrive {
    async fn query_activities(&self, query: &ActivityQuery) -> Result<ActivityPage, DriveError> {
        let response = self
            .authed(
                reqwest::Method::POST,
                ACTIVITY_QUERY_URL,
                Vec::new(),
                Some(query.body()),
            )
            .await?;
        let body = response
            .json
            .ok_or_else(|| DriveError::Decode("activity.query returned non-JSON".to_owned()))?;
        Ok(ActivityPage {
            activities: body
                .get("activities")
                .and_then(serde_json::Value::as_array)
                .cloned()
                .unwrap_or_default(),
            next_page_token: body
                .get("nextPageToken")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned),
        })
    }

    async fn get_file(&self, item_id: &str) -> Result<DriveFile, DriveError> {
        let url = format!("{FILES_URL}/{item_id}");
        let response = self
            .authed(
                reqwest::Method::GET,
                &url,
                vec![
                    ("fields".to_owned(), FILE_FIELDS.to_owned()),
                    ("supportsAllDrives".to_owned(), "true".to_owned()),
                ],
                None,
            )
            .await?;
        let body = response
            .json
            .ok_or_else(|| DriveError::Decode("files.get returned non-JSON".to_owned()))?;
        DriveFile::from_json(&body)
            .ok_or_else(|| DriveError::Decode(format!("files.get body without id: {body}")))
    }
}
