//! Shell-command dispatcher.
//!
//! Spawns the configured command with positional arguments
//! `action, "file"|"directory", path [, removed_path]`.  Either blocks on
//! the child with a timeout, or detaches it under a watcher task that
//! kills the process when the timeout or the stop signal fires.

use crate::config::ConfigError;
use crate::dispatch::{DispatchError, Dispatcher};
use async_trait::async_trait;
use dc_events::event::ActivityEvent;
use dc_events::mapping::Mappings;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Deserialize)]
pub struct CommandConfig {
    pub command: String,
    #[serde(default)]
    pub wait_for_process: bool,
    /// Skip new events while a detached child is still running.
    #[serde(default)]
    pub drop_during_process: bool,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub mappings: Vec<String>,
}

fn default_timeout() -> u64 {
    300
}

pub struct CommandDispatcher {
    argv: Vec<String>,
    wait_for_process: bool,
    drop_during_process: bool,
    timeout: Duration,
    mappings: Mappings,
    stop: watch::Sender<bool>,
    running: Arc<AtomicUsize>,
}

impl CommandDispatcher {
    pub fn new(config: CommandConfig) -> Result<Self, ConfigError> {
        let argv = split_command(&config.command);
        if argv.is_empty() {
            return Err(ConfigError::InvalidValue(
                "CommandDispatcher: empty command".to_owned(),
            ));
        }
        let (stop, _) = watch::channel(false);
        Ok(CommandDispatcher {
            argv,
            wait_for_process: config.wait_for_process,
            drop_during_process: config.drop_during_process,
            timeout: Duration::from_secs(config.timeout),
            mappings: Mappings::parse(&config.mappings),
            stop,
            running: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Dispatcher for CommandDispatcher {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn start(&self) {
        self.stop.send_replace(false);
    }

    async fn stop(&self) {
        // Detached watchers kill their children on this signal.
        self.stop.send_replace(true);
    }

    async fn dispatch(&self, event: &ActivityEvent) -> Result<(), DispatchError> {
        if self.drop_during_process && self.running.load(Ordering::SeqCst) > 0 {
            tracing::warn!(path = %event.path, "command still running, dropping event");
            return Ok(());
        }

        let mut args: Vec<String> = self.argv[1..].to_vec();
        args.push(event.action.as_str().to_owned());
        args.push(if event.is_folder { "directory" } else { "file" }.to_owned());
        args.push(self.mappings.apply(&event.path));
        if !event.removed_path.is_empty() {
            args.push(self.mappings.apply(&event.removed_path));
        }
        tracing::info!(program = %self.argv[0], ?args, "command dispatch");

        let mut child = tokio::process::Command::new(&self.argv[0])
            .args(&args)
            .kill_on_drop(true)
            .spawn()?;

        if self.wait_for_process {
            match tokio::time::timeout(self.timeout, child.wait()).await {
                Ok(Ok(status)) => tracing::debug!(%status, "command finished"),
                Ok(Err(error)) => tracing::warn!(%error, "command wait failed"),
                Err(_) => {
                    tracing::warn!(path = %event.path, "command timed out, killing");
                    let _ = child.kill().await;
                }
            }
            return Ok(());
        }

        let running = Arc::clone(&self.running);
        let mut stop = self.stop.subscribe();
        let timeout = self.timeout;
        let path = event.path.clone();
        running.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            let outcome = tokio::select! {
                status = child.wait() => Some(status),
                () = tokio::time::sleep(timeout) => None,
                _ = stop.wait_for(|stopped| *stopped) => None,
            };
            match outcome {
                Some(Ok(status)) => tracing::debug!(%status, path, "command finished"),
                Some(Err(error)) => tracing::warn!(%error, path, "command wait failed"),
                None => {
                    tracing::warn!(path, "killing detached command");
                    let _ = child.kill().await;
                }
            }
            running.fetch_sub(1, Ordering::SeqCst);
        });
        Ok(())
    }
}

/// Whitespace split honouring single and double quotes.
fn split_command(command: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut pending = false;
    for c in command.chars() {
        match (c, quote) {
            (q, Some(open)) if q == open => quote = None,
            ('\'' | '"', None) => {
                quote = Some(c);
                pending = true;
            }
            (c, None) if c.is_whitespace() => {
                if pending || !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            _ => current.push(c),
        }
    }
    if pending || !current.is_empty() {
        out.push(current);
    }
    out
}
