//! Thin per-receiver wrappers over the shared HTTP session.
//!
//! Each client owns its base URL parts and injects its authentication in
//! one place; wire responses come back in the uniform session envelope.

pub mod discord;
pub mod flaskfarm;
pub mod jellyfin;
pub mod kavita;
pub mod plex;
pub mod rclone;
pub mod stash;

pub use discord::Discord;
pub use flaskfarm::{Flaskfarm, FlaskfarmaiderBot};
pub use jellyfin::Jellyfin;
pub use kavita::Kavita;
pub use plex::Plex;
pub use rclone::Rclone;
pub use stash::Stash;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid receiver url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("path {0:?} is outside the broadcast root")]
    PathOutsideRoot(String),
}

/// Strip trailing slashes so path concatenation stays predictable.
pub(crate) fn trim_base(url: &str) -> String {
    url.trim().trim_end_matches('/').to_owned()
}
