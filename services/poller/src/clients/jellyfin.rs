//! Jellyfin client.
//!
//! Library updates go through `/Library/Media/Updated`, which takes a
//! batch of changed paths and lets the server decide which libraries to
//! rescan.  Auth is the `X-Emby-Token` header.

use crate::clients::trim_base;
use crate::session::{HttpSession, RequestOpts, WireResponse};

pub struct Jellyfin {
    session: HttpSession,
    base: String,
    apikey: String,
}

impl Jellyfin {
    #[must_use]
    pub fn new(url: &str, apikey: &str) -> Self {
        Jellyfin {
            session: HttpSession::new(),
            base: trim_base(url),
            apikey: apikey.trim().to_owned(),
        }
    }

    /// Report changed paths; `updates` pairs a path with an update type
    /// (`Created | Modified | Deleted`).
    pub async fn media_updated(&self, updates: &[(String, String)]) -> WireResponse {
        let body: Vec<serde_json::Value> = updates
            .iter()
            .map(|(path, kind)| serde_json::json!({"Path": path, "UpdateType": kind}))
            .collect();
        let response = self
            .session
            .post(
                &format!("{}/Library/Media/Updated", self.base),
                RequestOpts {
                    json: Some(serde_json::json!({"Updates": body})),
                    headers: vec![("X-Emby-Token".to_owned(), self.apikey.clone())],
                    ..RequestOpts::default()
                },
            )
            .await;
        tracing::info!(
            updates = updates.len(),
            status = response.status,
            "jellyfin media updated"
        );
        response
    }
}
