//! Watched-subtree identifiers.
//!
//! Settings name targets as `"<item_id>#<root_label>"`.  The label part is
//! optional; when present it becomes the first segment of every resolved
//! path under that ancestor.

use std::fmt;
use std::str::FromStr;

/// A watched subtree: the ancestor item id plus an optional visible root
/// name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    pub id: String,
    pub root_label: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("empty target id in {0:?}")]
pub struct TargetParseError(pub String);

impl FromStr for WatchTarget {
    type Err = TargetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, label) = match s.split_once('#') {
            Some((id, label)) => (id, Some(label.to_owned())),
            None => (s, None),
        };
        if id.is_empty() {
            return Err(TargetParseError(s.to_owned()));
        }
        Ok(WatchTarget {
            id: id.to_owned(),
            root_label: label,
        })
    }
}

impl fmt::Display for WatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root_label {
            Some(label) => write!(f, "{}#{}", self.id, label),
            None => f.write_str(&self.id),
        }
    }
}
