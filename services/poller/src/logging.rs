//! Tracing setup with secret redaction.
//!
//! Every formatted log line passes through the configured
//! `redacted_patterns` before reaching stdout: for each pattern match, the
//! text of every capture group (the whole match when there are none) is
//! replaced with the substitute.  URLs with apikey query params, Plex
//! tokens and webhook ids never hit the log this way, whatever module
//! formatted them.
//!
//! `RUST_LOG` overrides the configured level when set.

use crate::config::LoggingSettings;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid redaction pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },
    #[error("subscriber already installed")]
    AlreadyInstalled,
}

/// Install the global subscriber.  Call once, before any poller starts.
pub fn init(settings: &LoggingSettings) -> Result<(), LoggingError> {
    let redactor = Redactor::new(&settings.redacted_patterns, &settings.redacted_substitute)?;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(settings.level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(RedactingMakeWriter { redactor })
        .try_init()
        .map_err(|_| LoggingError::AlreadyInstalled)
}

// ---------------------------------------------------------------------------
// Redactor
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Redactor {
    patterns: Arc<Vec<Regex>>,
    substitute: Arc<str>,
}

impl Redactor {
    pub fn new(patterns: &[String], substitute: &str) -> Result<Self, LoggingError> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            compiled.push(Regex::new(pattern).map_err(|source| LoggingError::Pattern {
                pattern: pattern.clone(),
                source,
            })?);
        }
        Ok(Redactor {
            patterns: Arc::new(compiled),
            substitute: Arc::from(substitute),
        })
    }

    /// Replace every captured secret in `text`.
    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_owned();
        for pattern in self.patterns.iter() {
            let Some(caps) = pattern.captures(&out) else {
                continue;
            };
            let mut secrets: Vec<String> = Vec::new();
            if caps.len() > 1 {
                for group in caps.iter().skip(1).flatten() {
                    secrets.push(group.as_str().to_owned());
                }
            } else {
                secrets.push(caps[0].to_owned());
            }
            for secret in secrets {
                if !secret.is_empty() {
                    out = out.replace(&secret, &self.substitute);
                }
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Writer plumbing
// ---------------------------------------------------------------------------

struct RedactingMakeWriter {
    redactor: Redactor,
}

impl<'a> MakeWriter<'a> for RedactingMakeWriter {
    type Writer = RedactingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            redactor: self.redactor.clone(),
            buf: Vec::new(),
        }
    }
}

/// Buffers one formatted event, redacts it on flush/drop, writes to stdout.
pub struct RedactingWriter {
    redactor: Redactor,
    buf: Vec<u8>,
}

impl Write for RedactingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        io::stdout().write_all(self.redactor.redact(&text).as_bytes())
    }
}

impl Drop for RedactingWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
