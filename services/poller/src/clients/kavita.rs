//! Kavita client.
//!
//! Authentication is a plugin handshake: the configured API key is traded
//! for a bearer token via `/api/Plugin/authenticate`; scans then carry the
//! bearer.  The token expires server-side, so callers re-authenticate when
//! a scan answers 401.

use crate::clients::trim_base;
use crate::session::{HttpSession, RequestOpts, WireResponse};
use tokio::sync::Mutex;

const PLUGIN_NAME: &str = "GDPoller";

pub struct Kavita {
    session: HttpSession,
    base: String,
    apikey: String,
    token: Mutex<String>,
}

impl Kavita {
    #[must_use]
    pub fn new(url: &str, apikey: &str) -> Self {
        Kavita {
            session: HttpSession::new(),
            base: trim_base(url),
            apikey: apikey.trim().to_owned(),
            token: Mutex::new(String::new()),
        }
    }

    async fn call(&self, path: &str, opts: RequestOpts) -> WireResponse {
        let mut opts = opts;
        opts.headers
            .push(("Accept".to_owned(), "application/json, */*".to_owned()));
        let token = self.token.lock().await.clone();
        if !token.is_empty() {
            opts.bearer = Some(token);
        }
        self.session
            .post(&format!("{}{path}", self.base), opts)
            .await
    }

    /// Trade the API key for a bearer token.
    pub async fn authenticate(&self) {
        let response = self
            .call(
                "/api/Plugin/authenticate",
                RequestOpts {
                    params: vec![
                        ("pluginName".to_owned(), PLUGIN_NAME.to_owned()),
                        ("apiKey".to_owned(), self.apikey.clone()),
                    ],
                    ..RequestOpts::default()
                },
            )
            .await;
        if !response.ok() {
            tracing::error!(status = response.status, "kavita authenticate failed");
        }
        let auth = response.json.unwrap_or_default();
        let mut token = self.token.lock().await;
        *token = auth
            .get("token")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_owned();
    }

    /// Ask the library to scan one folder.  Returns the HTTP status.
    pub async fn scan_folder(&self, folder: &str) -> u16 {
        let response = self
            .call(
                "/api/Library/scan-folder",
                RequestOpts {
                    json: Some(serde_json::json!({
                        "folderPath": folder,
                        "apiKey": self.apikey,
                    })),
                    ..RequestOpts::default()
                },
            )
            .await;
        tracing::info!(folder, status = response.status, "kavita scan");
        response.status
    }
}
