//! Settings loading.
//!
//! YAML is the sole config source.  Search order when no path is given on
//! the command line: `settings.yaml` beside the executable, `settings.yaml`
//! in the CWD, then `config.yaml` in both places; the first existing file
//! wins.  Every field is optional in the file — missing values fall back to
//! the defaults below, and poller-level values fall back to the top-level
//! globals, so a minimal file only needs `google_drive.token` and one
//! poller with `targets`.
//!
//! Dispatcher entries keep their full YAML mapping (the `class` key selects
//! the implementation, everything else is handed to its constructor) and
//! are cloned on materialisation, so anchor-shared entries can never alias
//! state between pollers.

use dc_events::event::Action;
use dc_events::target::WatchTarget;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const GOOGLE_AUTH_BASE: &str = "https://www.googleapis.com/auth/";

// ---------------------------------------------------------------------------
// Resolved settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub google_drive: GoogleDriveSettings,
    pub task_check_interval: i64,
    pub pollers: Vec<PollerSettings>,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: String,
    pub redacted_patterns: Vec<String>,
    pub redacted_substitute: String,
}

#[derive(Debug, Clone)]
pub struct GoogleDriveSettings {
    pub token: TokenSettings,
    /// Full scope URLs (short names from the file are joined onto
    /// `GOOGLE_AUTH_BASE`).
    pub scopes: Vec<String>,
    pub cache_enable: bool,
    pub cache_maxsize: usize,
    pub cache_ttl: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenSettings {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub access_token: String,
}

/// One poller, with every global knob resolved to a concrete value.
#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub name: String,
    pub targets: Vec<WatchTarget>,
    pub dispatchers: Vec<DispatcherSpec>,
    pub polling_interval: u64,
    pub polling_delay: u64,
    pub dispatch_interval: u64,
    pub task_check_interval: i64,
    pub page_size: u32,
    pub ignore_folder: bool,
    pub patterns: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub actions: Vec<Action>,
    pub buffer_interval: u64,
}

/// A dispatcher entry: the selecting `class` plus its full option mapping.
#[derive(Debug, Clone)]
pub struct DispatcherSpec {
    pub class: String,
    pub buffer_interval: u64,
    pub options: serde_yaml::Value,
}

// ---------------------------------------------------------------------------
// Raw YAML shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    #[serde(flatten)]
    globals: RawGlobals,
    logging: Option<RawLogging>,
    google_drive: Option<RawGoogleDrive>,
    #[serde(default)]
    pollers: Vec<RawPoller>,
}

#[derive(Debug, Default, Deserialize)]
struct RawGlobals {
    polling_interval: Option<u64>,
    polling_delay: Option<u64>,
    dispatch_interval: Option<u64>,
    task_check_interval: Option<i64>,
    page_size: Option<u32>,
    ignore_folder: Option<bool>,
    patterns: Option<Vec<String>>,
    ignore_patterns: Option<Vec<String>>,
    actions: Option<Vec<String>>,
    buffer_interval: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLogging {
    level: Option<String>,
    redacted_patterns: Option<Vec<String>>,
    redacted_substitute: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawGoogleDrive {
    token: Option<TokenSettings>,
    scopes: Option<Vec<String>>,
    cache_enable: Option<bool>,
    cache_maxsize: Option<usize>,
    cache_ttl: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawPoller {
    name: Option<String>,
    targets: Option<Vec<String>>,
    #[serde(default)]
    dispatchers: Vec<serde_yaml::Value>,
    #[serde(flatten)]
    globals: RawGlobals,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("invalid config value: {0}")]
    InvalidValue(String),
    #[error("no settings file found (tried {0:?})")]
    NotFound(Vec<PathBuf>),
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Candidate settings paths in lookup order.
pub fn default_candidates() -> Vec<PathBuf> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf));
    let cwd = std::env::current_dir().ok();
    let mut out = Vec::new();
    for file in ["settings.yaml", "config.yaml"] {
        if let Some(dir) = &exe_dir {
            out.push(dir.join(file));
        }
        if let Some(dir) = &cwd {
            out.push(dir.join(file));
        }
    }
    out
}

/// Load settings from `path`, or from the first existing default candidate.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let candidates = default_candidates();
            candidates
                .iter()
                .find(|p| p.is_file())
                .cloned()
                .ok_or(ConfigError::NotFound(candidates))?
        }
    };
    let text = std::fs::read_to_string(&path)
        .map_err(|e| ConfigError::Io(format!("reading {}: {e}", path.display())))?;
    load_settings_from_str(&text)
}

pub fn load_settings_from_str(text: &str) -> Result<Settings, ConfigError> {
    let raw: RawSettings =
        serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
    resolve(raw)
}

fn resolve(raw: RawSettings) -> Result<Settings, ConfigError> {
    let globals = ResolvedGlobals::from_raw(&raw.globals, None)?;

    let logging = {
        let l = raw.logging.unwrap_or_default();
        LoggingSettings {
            level: l.level.unwrap_or_else(|| "debug".to_owned()),
            redacted_patterns: l
                .redacted_patterns
                .unwrap_or_else(default_redacted_patterns),
            redacted_substitute: l
                .redacted_substitute
                .unwrap_or_else(|| "<REDACTED>".to_owned()),
        }
    };

    let google_drive = {
        let g = raw.google_drive.unwrap_or_default();
        let scopes = g
            .scopes
            .unwrap_or_else(|| vec!["drive.readonly".to_owned(), "drive.activity.readonly".to_owned()]);
        GoogleDriveSettings {
            token: g.token.unwrap_or_default(),
            scopes: scopes
                .into_iter()
                .map(|s| {
                    if s.starts_with("https://") {
                        s
                    } else {
                        format!("{GOOGLE_AUTH_BASE}{s}")
                    }
                })
                .collect(),
            cache_enable: g.cache_enable.unwrap_or(false),
            cache_maxsize: g.cache_maxsize.unwrap_or(64),
            cache_ttl: g.cache_ttl.unwrap_or(600),
        }
    };

    if raw.pollers.is_empty() {
        return Err(ConfigError::MissingField("pollers".to_owned()));
    }
    let mut pollers = Vec::with_capacity(raw.pollers.len());
    for (idx, p) in raw.pollers.into_iter().enumerate() {
        pollers.push(resolve_poller(idx, p, &globals)?);
    }

    Ok(Settings {
        logging,
        google_drive,
        task_check_interval: globals.task_check_interval,
        pollers,
    })
}

fn resolve_poller(
    idx: usize,
    raw: RawPoller,
    top: &ResolvedGlobals,
) -> Result<PollerSettings, ConfigError> {
    let name = raw.name.unwrap_or_else(|| format!("poller-{idx}"));
    let globals = ResolvedGlobals::from_raw(&raw.globals, Some(top))?;

    let target_strings = raw
        .targets
        .ok_or_else(|| ConfigError::MissingField(format!("pollers[{idx}].targets")))?;
    if target_strings.is_empty() {
        return Err(ConfigError::InvalidValue(format!(
            "pollers[{idx}].targets is empty"
        )));
    }
    let mut targets = Vec::with_capacity(target_strings.len());
    for t in &target_strings {
        targets.push(
            t.parse::<WatchTarget>()
                .map_err(|e| ConfigError::InvalidValue(e.to_string()))?,
        );
    }

    let mut dispatchers = Vec::new();
    for entry in raw.dispatchers {
        dispatchers.push(resolve_dispatcher(&name, entry, globals.buffer_interval)?);
    }
    if dispatchers.is_empty() {
        dispatchers.push(DispatcherSpec {
            class: "DummyDispatcher".to_owned(),
            buffer_interval: globals.buffer_interval,
            options: serde_yaml::Value::Mapping(serde_yaml::Mapping::new()),
        });
    }

    Ok(PollerSettings {
        name,
        targets,
        dispatchers,
        polling_interval: globals.polling_interval,
        polling_delay: globals.polling_delay,
        dispatch_interval: globals.dispatch_interval,
        task_check_interval: globals.task_check_interval,
        page_size: globals.page_size,
        ignore_folder: globals.ignore_folder,
        patterns: globals.patterns,
        ignore_patterns: globals.ignore_patterns,
        actions: globals.actions,
        buffer_interval: globals.buffer_interval,
    })
}

fn resolve_dispatcher(
    poller: &str,
    entry: serde_yaml::Value,
    default_buffer_interval: u64,
) -> Result<DispatcherSpec, ConfigError> {
    let mapping = entry.as_mapping().ok_or_else(|| {
        ConfigError::InvalidValue(format!("{poller}: dispatcher entry is not a mapping"))
    })?;
    let class = mapping
        .get("class")
        .and_then(serde_yaml::Value::as_str)
        .unwrap_or("DummyDispatcher")
        .to_owned();
    let buffer_interval = mapping
        .get("buffer_interval")
        .and_then(serde_yaml::Value::as_u64)
        .unwrap_or(default_buffer_interval);
    Ok(DispatcherSpec {
        class,
        buffer_interval,
        options: entry,
    })
}

// ---------------------------------------------------------------------------
// Global knobs with fallback resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct ResolvedGlobals {
    polling_interval: u64,
    polling_delay: u64,
    dispatch_interval: u64,
    task_check_interval: i64,
    page_size: u32,
    ignore_folder: bool,
    patterns: Vec<String>,
    ignore_patterns: Vec<String>,
    actions: Vec<Action>,
    buffer_interval: u64,
}

impl ResolvedGlobals {
    /// Resolve raw values against the parent scope (top-level globals for a
    /// poller, hard defaults for the top level).
    fn from_raw(raw: &RawGlobals, parent: Option<&ResolvedGlobals>) -> Result<Self, ConfigError> {
        let actions = match &raw.actions {
            Some(keys) if !keys.is_empty() => {
                let mut out = Vec::with_capacity(keys.len());
                for key in keys {
                    out.push(Action::from_key(key).ok_or_else(|| {
                        ConfigError::InvalidValue(format!("unknown action {key:?}"))
                    })?);
                }
                out
            }
            Some(_) | None => match parent {
                Some(p) => p.actions.clone(),
                None => Action::ALL.to_vec(),
            },
        };
        macro_rules! fall_back {
            ($field:ident, $default:expr) => {
                raw.$field.clone().unwrap_or_else(|| {
                    parent.map_or($default, |p| p.$field.clone())
                })
            };
        }
        Ok(ResolvedGlobals {
            polling_interval: fall_back!(polling_interval, 60),
            polling_delay: fall_back!(polling_delay, 0),
            dispatch_interval: fall_back!(dispatch_interval, 1),
            task_check_interval: fall_back!(task_check_interval, -1),
            page_size: fall_back!(page_size, 100),
            ignore_folder: fall_back!(ignore_folder, true),
            patterns: fall_back!(patterns, Vec::new()),
            ignore_patterns: fall_back!(ignore_patterns, Vec::new()),
            actions,
            buffer_interval: fall_back!(buffer_interval, 30),
        })
    }
}

fn default_redacted_patterns() -> Vec<String> {
    [
        "apikey=(.{10,36})",
        r#"['"]apikey['"]: ['"](.{10,36})['"]"#,
        r#"['"]X-Plex-Token['"]: ['"](.{20})['"]"#,
        r#"X-Plex-Token=(.{20})"#,
        r"webhooks/(\d+)/([A-Za-z0-9_-]+)",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r"
google_drive:
  token:
    access_token: tok
pollers:
  - targets:
      - 'AID#MOVIES'
";

    #[test]
    fn minimal_settings_resolve_with_defaults() {
        let settings = load_settings_from_str(MINIMAL).unwrap();
        assert_eq!(settings.logging.level, "debug");
        assert!(!settings.google_drive.cache_enable);
        assert_eq!(
            settings.google_drive.scopes[0],
            "https://www.googleapis.com/auth/drive.readonly"
        );

        let poller = &settings.pollers[0];
        assert_eq!(poller.name, "poller-0");
        assert_eq!(poller.polling_interval, 60);
        assert_eq!(poller.page_size, 100);
        assert!(poller.ignore_folder);
        assert_eq!(poller.actions.len(), Action::ALL.len());
        assert_eq!(poller.targets[0].id, "AID");
        assert_eq!(poller.targets[0].root_label.as_deref(), Some("MOVIES"));
        // No dispatchers configured: the dummy stands in.
        assert_eq!(poller.dispatchers[0].class, "DummyDispatcher");
    }

    #[test]
    fn poller_values_fall_back_to_globals() {
        let text = r"
polling_interval: 120
buffer_interval: 45
pollers:
  - targets: ['A']
  - targets: ['B']
    polling_interval: 5
";
        let settings = load_settings_from_str(text).unwrap();
        assert_eq!(settings.pollers[0].polling_interval, 120);
        assert_eq!(settings.pollers[1].polling_interval, 5);
        assert_eq!(settings.pollers[1].buffer_interval, 45);
        // The dispatcher inherits the poller's buffer interval.
        assert_eq!(settings.pollers[0].dispatchers[0].buffer_interval, 45);
    }

    #[test]
    fn dispatcher_entry_keeps_extra_fields() {
        let text = r"
pollers:
  - targets: ['A']
    dispatchers:
      - class: KavitaDispatcher
        url: http://kavita:5000
        apikey: secret
        buffer_interval: 10
";
        let settings = load_settings_from_str(text).unwrap();
        let spec = &settings.pollers[0].dispatchers[0];
        assert_eq!(spec.class, "KavitaDispatcher");
        assert_eq!(spec.buffer_interval, 10);
        assert_eq!(
            spec.options.get("url").and_then(serde_yaml::Value::as_str),
            Some("http://kavita:5000")
        );
    }

    #[test]
    fn anchored_dispatcher_entries_do_not_alias() {
        let text = r"
pollers:
  - targets: ['A']
    dispatchers:
      - &shared
        class: RcloneDispatcher
        url: http://rclone:5572
  - targets: ['B']
    dispatchers:
      - *shared
";
        let settings = load_settings_from_str(text).unwrap();
        let a = settings.pollers[0].dispatchers[0].options.clone();
        let b = settings.pollers[1].dispatchers[0].options.clone();
        // Aliases were expanded into independent values at parse time.
        assert_eq!(a, b);
    }

    #[test]
    fn missing_pollers_is_fatal() {
        assert!(matches!(
            load_settings_from_str("polling_interval: 10"),
            Err(ConfigError::MissingField(f)) if f == "pollers"
        ));
    }

    #[test]
    fn empty_targets_are_rejected() {
        let text = "pollers:\n  - targets: []\n";
        assert!(matches!(
            load_settings_from_str(text),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn unknown_action_is_rejected() {
        let text = "pollers:\n  - targets: ['A']\n    actions: ['explode']\n";
        assert!(matches!(
            load_settings_from_str(text),
            Err(ConfigError::InvalidValue(_))
        ));
    }
}
