//! Plex media server client.
//!
//! Every call carries the `X-Plex-Token` query param and asks for JSON.
//! Scans are path-based: the section containing the path is looked up from
//! `/library/sections`, then refreshed with `path=...&force=1`.

use crate::clients::trim_base;
use crate::session::{HttpSession, RequestOpts, WireResponse};
use dc_events::paths;

pub struct Plex {
    session: HttpSession,
    base: String,
    token: String,
}

impl Plex {
    #[must_use]
    pub fn new(url: &str, token: &str) -> Self {
        Plex {
            session: HttpSession::new(),
            base: trim_base(url),
            token: token.trim().to_owned(),
        }
    }

    async fn call(&self, path: &str, mut params: Vec<(String, String)>) -> WireResponse {
        params.push(("X-Plex-Token".to_owned(), self.token.clone()));
        self.session
            .get(
                &format!("{}{path}", self.base),
                RequestOpts {
                    params,
                    headers: vec![("Accept".to_owned(), "application/json".to_owned())],
                    ..RequestOpts::default()
                },
            )
            .await
    }

    pub async fn sections(&self) -> WireResponse {
        self.call("/library/sections", Vec::new()).await
    }

    pub async fn refresh_section(
        &self,
        section: i64,
        path: Option<&str>,
        force: bool,
    ) -> WireResponse {
        let mut params = Vec::new();
        if force {
            params.push(("force".to_owned(), "1".to_owned()));
        }
        if let Some(path) = path {
            params.push(("path".to_owned(), path.to_owned()));
        }
        self.call(&format!("/library/sections/{section}/refresh"), params)
            .await
    }

    /// Section whose library location contains (or is contained by) `path`.
    pub async fn section_by_path(&self, path: &str) -> Option<i64> {
        let response = self.sections().await;
        let Some(body) = response.json.as_ref() else {
            tracing::error!(status = response.status, "no section information");
            return None;
        };
        let directories = body
            .pointer("/MediaContainer/Directory")?
            .as_array()?;
        for directory in directories {
            let Some(key) = directory.get("key").and_then(value_as_i64) else {
                continue;
            };
            let locations = directory
                .get("Location")
                .and_then(serde_json::Value::as_array)
                .cloned()
                .unwrap_or_default();
            for location in &locations {
                let Some(root) = location.get("path").and_then(serde_json::Value::as_str) else {
                    continue;
                };
                if path_contains(root, path) || path_contains(path, root) {
                    return Some(key);
                }
            }
        }
        None
    }

    /// Trigger a scan of the directory containing `path`.
    pub async fn scan(&self, path: &str, is_directory: bool) {
        let target = if is_directory {
            path.to_owned()
        } else {
            paths::parent_dir(path).to_owned()
        };
        let section = self.section_by_path(&target).await.unwrap_or(-1);
        tracing::info!(path = %target, section, "plex scan");
        self.refresh_section(section, Some(&target), false).await;
    }
}

/// Plex serialises section keys both as numbers and as strings.
fn value_as_i64(value: &serde_json::Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Segment-aware prefix containment: `/media` contains `/media/tv` but not
/// `/mediarest`.
fn path_contains(outer: &str, inner: &str) -> bool {
    let outer = outer.trim_end_matches('/');
    inner == outer || inner.starts_with(&format!("{outer}/"))
}
