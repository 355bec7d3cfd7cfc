//! Builds every poller from settings and runs them until shutdown.

use crate::config::{ConfigError, Settings};
use crate::dispatch;
use crate::drive::{DriveApi, GoogleDrive};
use crate::poller::ActivityPoller;
use crate::resolver::PathResolver;
use std::sync::Arc;
use std::time::Duration;

pub struct Supervisor {
    pollers: Vec<Arc<ActivityPoller>>,
    task_check_interval: i64,
}

impl Supervisor {
    /// Materialise the Drive client, the shared resolver and one poller
    /// per settings entry.  Any error here is fatal to startup.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let drive: Arc<dyn DriveApi> = Arc::new(GoogleDrive::new(&settings.google_drive));
        let resolver = Arc::new(PathResolver::new(
            Arc::clone(&drive),
            settings
                .google_drive
                .cache_enable
                .then_some(settings.google_drive.cache_maxsize),
            Duration::from_secs(settings.google_drive.cache_ttl),
        ));
        Self::with_drive(settings, drive, resolver)
    }

    /// Same wiring with an injected Drive backend; the integration
    /// harness uses this with a scripted fake.
    pub fn with_drive(
        settings: &Settings,
        drive: Arc<dyn DriveApi>,
        resolver: Arc<PathResolver>,
    ) -> Result<Self, ConfigError> {
        let mut pollers = Vec::with_capacity(settings.pollers.len());
        for poller_settings in &settings.pollers {
            let mut dispatchers = Vec::with_capacity(poller_settings.dispatchers.len());
            for spec in &poller_settings.dispatchers {
                dispatchers.push(dispatch::build(spec)?);
            }
            pollers.push(Arc::new(ActivityPoller::new(
                poller_settings.clone(),
                Arc::clone(&drive),
                Arc::clone(&resolver),
                dispatchers,
            )?));
        }
        Ok(Supervisor {
            pollers,
            task_check_interval: settings.task_check_interval,
        })
    }

    #[must_use]
    pub fn pollers(&self) -> &[Arc<ActivityPoller>] {
        &self.pollers
    }

    /// Start every poller, watch their tasks, and unwind on `shutdown`.
    pub async fn run(&self, shutdown: impl Future<Output = ()> + Send) {
        for poller in &self.pollers {
            poller.start().await;
        }

        let watchdog = async {
            if self.task_check_interval <= 0 {
                // No watchdog configured; park until shutdown.
                std::future::pending::<()>().await;
            }
            let interval = Duration::from_secs(self.task_check_interval.unsigned_abs());
            loop {
                tokio::time::sleep(interval).await;
                for poller in &self.pollers {
                    poller.report_health().await;
                }
            }
        };

        tokio::select! {
            () = shutdown => tracing::info!("shutdown requested"),
            () = watchdog => {}
        }

        tracing::info!("stopping pollers");
        for poller in &self.pollers {
            poller.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_settings_from_str;

    #[test]
    fn builds_one_poller_per_entry() {
        let settings = load_settings_from_str(
            r"
pollers:
  - name: movies
    targets: ['AID#MOVIES']
  - targets: ['BID']
    dispatchers:
      - class: PlexDispatcher
        url: 'http://plex:32400'
        token: t
",
        )
        .unwrap();
        let supervisor = Supervisor::from_settings(&settings).unwrap();
        assert_eq!(supervisor.pollers().len(), 2);
        assert_eq!(supervisor.pollers()[0].name(), "movies");
        assert_eq!(supervisor.pollers()[1].name(), "poller-1");
    }

    #[test]
    fn bad_dispatcher_class_fails_the_build() {
        let settings = load_settings_from_str(
            r"
pollers:
  - targets: ['AID']
    dispatchers:
      - class: Nope
",
        )
        .unwrap();
        assert!(Supervisor::from_settings(&settings).is_err());
    }
}
