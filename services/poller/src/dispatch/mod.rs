//! Dispatchers: pluggable sinks translating enriched events into receiver
//! side effects.
//!
//! Two orthogonal axes, kept orthogonal in the types: direct dispatchers
//! implement `Dispatcher` themselves; coalescing ones implement
//! `buffered::FlushSink` and are wrapped in `buffered::Buffered`, which
//! owns the parent-keyed buffer and the flush loop.  The aggregate
//! (multi-server) dispatcher is just another sink whose flush fans out to
//! sub-dispatchers.
//!
//! `build` materialises a dispatcher from its settings entry.  The entry's
//! YAML value is cloned first, so entries shared through anchors can never
//! alias state between pollers.

pub mod buffered;
pub mod command;
pub mod discord;
pub mod dummy;
pub mod gds;
pub mod jellyfin;
pub mod kavita;
pub mod multi;
pub mod plex;
pub mod plexmate;
pub mod rclone;
pub mod stash;

use crate::clients::ClientError;
use crate::config::{ConfigError, DispatcherSpec};
use async_trait::async_trait;
use dc_events::event::ActivityEvent;
use serde::de::DeserializeOwned;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("spawn failed: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

/// The three-operation capability set every dispatcher implements.
///
/// `start` is idempotent: it clears the stop signal and brings up any
/// background work (the flush loop, for buffered dispatchers).  `stop`
/// sets the signal and joins that work.  `dispatch` is invoked once per
/// event per dispatcher by the pipeline; errors are logged by the caller
/// and never propagate across dispatchers.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    fn name(&self) -> &'static str;

    async fn start(&self) {}

    async fn stop(&self) {}

    async fn dispatch(&self, event: &ActivityEvent) -> Result<(), DispatchError>;
}

/// Materialise a dispatcher from its settings entry.
pub fn build(spec: &DispatcherSpec) -> Result<Arc<dyn Dispatcher>, ConfigError> {
    use buffered::Buffered;

    fn options<T: DeserializeOwned>(spec: &DispatcherSpec) -> Result<T, ConfigError> {
        serde_yaml::from_value(spec.options.clone()).map_err(|e| {
            ConfigError::InvalidValue(format!("{} options: {e}", spec.class))
        })
    }
    fn client_err(e: ClientError) -> ConfigError {
        ConfigError::InvalidValue(e.to_string())
    }

    let interval = spec.buffer_interval;
    match spec.class.as_str() {
        "DummyDispatcher" => Ok(Arc::new(dummy::DummyDispatcher)),
        "PlexDispatcher" => Ok(Arc::new(plex::PlexDispatcher::new(options(spec)?))),
        "RcloneDispatcher" => Ok(Arc::new(
            rclone::RcloneDispatcher::new(options(spec)?).map_err(client_err)?,
        )),
        "KavitaDispatcher" => Ok(Arc::new(Buffered::new(
            kavita::KavitaSink::new(options(spec)?),
            interval,
        ))),
        "DiscordDispatcher" => Ok(Arc::new(discord::DiscordDispatcher::new(options(spec)?))),
        "GDSToolDispatcher" => Ok(Arc::new(Buffered::new(
            gds::GdsToolSink::new(options(spec)?),
            interval,
        ))),
        "FlaskfarmaiderDispatcher" => Ok(Arc::new(Buffered::new(
            gds::FlaskfarmaiderSink::new(options(spec)?),
            interval,
        ))),
        "PlexmateDispatcher" => Ok(Arc::new(plexmate::PlexmateDispatcher::new(options(spec)?))),
        "CommandDispatcher" => Ok(Arc::new(command::CommandDispatcher::new(options(spec)?)?)),
        "JellyfinDispatcher" => Ok(Arc::new(Buffered::new(
            jellyfin::JellyfinSink::new(options(spec)?),
            interval,
        ))),
        "StashDispatcher" => Ok(Arc::new(Buffered::new(
            stash::StashSink::new(options(spec)?),
            interval,
        ))),
        "MultiServerDispatcher" => Ok(Arc::new(Buffered::new(
            multi::MultiSink::new(options(spec)?).map_err(client_err)?,
            interval,
        ))),
        other => Err(ConfigError::InvalidValue(format!(
            "unknown dispatcher class {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(yaml: &str) -> DispatcherSpec {
        let options: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        let class = options
            .get("class")
            .and_then(serde_yaml::Value::as_str)
            .unwrap_or("DummyDispatcher")
            .to_owned();
        DispatcherSpec {
            class,
            buffer_interval: 30,
            options,
        }
    }

    #[test]
    fn known_classes_materialise() {
        for yaml in [
            "class: DummyDispatcher",
            "{class: PlexDispatcher, url: 'http://plex:32400', token: t}",
            "{class: RcloneDispatcher, url: 'http://rclone:5572#gd'}",
            "{class: KavitaDispatcher, url: 'http://kavita:5000', apikey: k}",
            "{class: JellyfinDispatcher, url: 'http://jf:8096', apikey: k}",
            "{class: StashDispatcher, url: 'http://stash:9999', apikey: k}",
            "{class: PlexmateDispatcher, url: 'http://ff:9999', apikey: k}",
            "{class: GDSToolDispatcher, url: 'http://ff:9999', apikey: k}",
            "{class: FlaskfarmaiderDispatcher, url: 'http://bot:9999', apikey: k}",
            "{class: CommandDispatcher, command: '/bin/echo poll'}",
            "{class: MultiServerDispatcher, rclones: [{url: 'http://r:5572'}]}",
        ] {
            assert!(build(&spec(yaml)).is_ok(), "failed to build {yaml}");
        }
    }

    #[test]
    fn unknown_class_is_a_config_error() {
        assert!(matches!(
            build(&spec("class: TeleporterDispatcher")),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn bad_receiver_url_is_a_config_error() {
        assert!(build(&spec("{class: RcloneDispatcher, url: 'nope'}")).is_err());
    }
}
