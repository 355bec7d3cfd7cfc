//! Path mappings: `source:target` prefix rewrites applied to event paths
//! just before receiver delivery, covering mount-prefix differences between
//! the observer and each receiver.
//!
//! A mapping string normally contains one `:`.  One extra `:` inside either
//! side is tolerated (rclone remotes like `gd:/media`): of the two possible
//! splits, the one with the most balanced sides wins, which assigns the
//! stray colon to the longer component.  An empty source never rewrites.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapping {
    pub source: String,
    pub target: String,
}

impl PathMapping {
    /// Parse a single `source:target` string.
    pub fn parse(raw: &str) -> PathMapping {
        let parts: Vec<&str> = raw.split(':').collect();
        match parts.as_slice() {
            [source, target] => PathMapping {
                source: (*source).to_owned(),
                target: (*target).to_owned(),
            },
            [a, b, c] => {
                let left_join = (format!("{a}:{b}"), (*c).to_owned());
                let right_join = ((*a).to_owned(), format!("{b}:{c}"));
                let diff =
                    |pair: &(String, String)| pair.0.len().abs_diff(pair.1.len());
                if diff(&left_join) <= diff(&right_join) {
                    PathMapping {
                        source: left_join.0,
                        target: left_join.1,
                    }
                } else {
                    PathMapping {
                        source: right_join.0,
                        target: right_join.1,
                    }
                }
            }
            _ => PathMapping {
                source: raw.to_owned(),
                target: raw.to_owned(),
            },
        }
    }

    /// Substitute every occurrence of `source` in `path`.
    pub fn apply(&self, path: &str) -> String {
        if self.source.is_empty() {
            return path.to_owned();
        }
        path.replace(&self.source, &self.target)
    }
}

/// An ordered list of mappings, applied in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mappings(Vec<PathMapping>);

impl Mappings {
    pub fn parse(raw: &[String]) -> Mappings {
        Mappings(raw.iter().map(|m| PathMapping::parse(m)).collect())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn apply(&self, path: &str) -> String {
        self.0
            .iter()
            .fold(path.to_owned(), |acc, m| m.apply(&acc))
    }
}
