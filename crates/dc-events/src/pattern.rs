//! Include/ignore pattern filters over event paths.
//!
//! Patterns are case-insensitive regexes matched anywhere in the path.  An
//! empty include set keeps everything; an empty ignore set excludes
//! nothing.

use regex::{Regex, RegexBuilder};

#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    include: Vec<Regex>,
    ignore: Vec<Regex>,
}

impl PatternSet {
    pub fn new(patterns: &[String], ignore_patterns: &[String]) -> Result<Self, regex::Error> {
        Ok(PatternSet {
            include: compile_all(patterns)?,
            ignore: compile_all(ignore_patterns)?,
        })
    }

    /// True when `path` matches some include pattern (or the include set is
    /// empty) and no ignore pattern.
    #[must_use]
    pub fn keeps(&self, path: &str) -> bool {
        let included =
            self.include.is_empty() || self.include.iter().any(|p| p.is_match(path));
        included && !self.ignore.iter().any(|p| p.is_match(path))
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, regex::Error> {
    patterns
        .iter()
        .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
        .collect()
}
