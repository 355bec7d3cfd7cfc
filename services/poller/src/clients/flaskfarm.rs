//! Flaskfarm plugin endpoints: gds_tool broadcasts and plex_mate scans,
//! plus the standalone Flaskfarmaider bot.
//!
//! Broadcast paths must live under the `/ROOT/GDRIVE` tree — the plugins
//! key their share mapping on it and silently misroute anything else, so
//! the check is made here, before the wire.

use crate::clients::{ClientError, trim_base};
use crate::session::{HttpSession, RequestOpts, WireResponse};
use std::time::Duration;

pub const BROADCAST_ROOT: &str = "/ROOT/GDRIVE";
const BROADCAST_INTERVAL: Duration = Duration::from_millis(1500);

fn check_broadcast_path(path: &str) -> Result<(), ClientError> {
    if !path.starts_with(BROADCAST_ROOT) {
        return Err(ClientError::PathOutsideRoot(path.to_owned()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Flaskfarm
// ---------------------------------------------------------------------------

pub struct Flaskfarm {
    session: HttpSession,
    base: String,
    apikey: String,
}

impl Flaskfarm {
    #[must_use]
    pub fn new(url: &str, apikey: &str) -> Self {
        Flaskfarm {
            session: HttpSession::new(),
            base: trim_base(url),
            apikey: apikey.trim().to_owned(),
        }
    }

    /// gds_tool flow-publish broadcast.
    pub async fn gds_broadcast(
        &self,
        gds_path: &str,
        scan_mode: &str,
    ) -> Result<WireResponse, ClientError> {
        check_broadcast_path(gds_path)?;
        let response = self
            .session
            .get(
                &format!("{}/gds_tool/api/fp/broadcast", self.base),
                RequestOpts {
                    params: vec![
                        ("gds_path".to_owned(), gds_path.to_owned()),
                        ("scan_mode".to_owned(), scan_mode.to_owned()),
                        ("apikey".to_owned(), self.apikey.clone()),
                    ],
                    min_interval: Some(BROADCAST_INTERVAL),
                    ..RequestOpts::default()
                },
            )
            .await;
        tracing::info!(mode = scan_mode, path = gds_path, "gds_tool broadcast");
        Ok(response)
    }

    /// plex_mate scan request.
    pub async fn plexmate_scan(&self, target: &str, mode: &str) -> WireResponse {
        let response = self
            .session
            .post(
                &format!("{}/plex_mate/api/scan/do_scan", self.base),
                RequestOpts {
                    form: vec![
                        ("target".to_owned(), target.to_owned()),
                        ("mode".to_owned(), mode.to_owned()),
                        ("apikey".to_owned(), self.apikey.clone()),
                    ],
                    ..RequestOpts::default()
                },
            )
            .await;
        tracing::info!(path = target, mode, status = response.status, "plex_mate scan");
        response
    }
}

// ---------------------------------------------------------------------------
// Flaskfarmaider bot
// ---------------------------------------------------------------------------

pub struct FlaskfarmaiderBot {
    session: HttpSession,
    base: String,
    apikey: String,
}

impl FlaskfarmaiderBot {
    #[must_use]
    pub fn new(url: &str, apikey: &str) -> Self {
        FlaskfarmaiderBot {
            session: HttpSession::new(),
            base: trim_base(url),
            apikey: apikey.trim().to_owned(),
        }
    }

    pub async fn broadcast(&self, path: &str, mode: &str) -> Result<WireResponse, ClientError> {
        check_broadcast_path(path)?;
        let response = self
            .session
            .post(
                &format!("{}/api/broadcast", self.base),
                RequestOpts {
                    form: vec![
                        ("path".to_owned(), path.to_owned()),
                        ("mode".to_owned(), mode.to_owned()),
                        ("apikey".to_owned(), self.apikey.clone()),
                    ],
                    ..RequestOpts::default()
                },
            )
            .await;
        tracing::info!(mode, path, "flaskfarmaider broadcast");
        Ok(response)
    }
}
