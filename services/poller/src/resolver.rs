//! Remote id → absolute logical path.
//!
//! Walks first-parent pointers from the item up to the watched ancestor,
//! prepending names.  A bounded LRU with per-entry TTL fronts the metadata
//! fetches for the ancestor hops; the leaf hop always fetches fresh — the
//! most recently changed node is exactly the one a cache would get wrong.

use crate::drive::{DriveApi, DriveFile};
use dc_events::event::ParentRef;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Hard bound on parent hops; guards against pointer cycles.
const MAX_HOPS: usize = 100;

/// Ancestor ids shorter than this are shared-drive root sentinels and are
/// rendered as `"/<id>"` instead of a name.
const ROOT_SENTINEL_LEN: usize = 20;

/// Successful resolution output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolved {
    pub path: String,
    pub parent: ParentRef,
    pub web_link: Option<String>,
    pub size: u64,
}

pub struct PathResolver {
    drive: Arc<dyn DriveApi>,
    cache: Option<Mutex<LruCache<String, (Instant, DriveFile)>>>,
    ttl: Duration,
}

impl PathResolver {
    pub fn new(drive: Arc<dyn DriveApi>, cache_size: Option<usize>, ttl: Duration) -> Self {
        let cache = cache_size
            .and_then(NonZeroUsize::new)
            .map(|cap| Mutex::new(LruCache::new(cap)));
        PathResolver { drive, cache, ttl }
    }

    /// Resolve `item_id` up to `ancestor_id`.
    ///
    /// `None` means some hop failed; the caller surfaces the event with an
    /// empty path rather than a partial one.
    pub async fn resolve(
        &self,
        item_id: &str,
        ancestor_id: &str,
        root_label: Option<&str>,
    ) -> Option<Resolved> {
        if item_id.is_empty() {
            return None;
        }
        // Leaf hop: always fresh.
        let leaf = match self.drive.get_file(item_id).await {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(item_id, error = %e, "leaf fetch failed");
                return None;
            }
        };
        let web_link = leaf.web_view_link.clone();
        let size = leaf.size;

        // Stack of (name, id), leaf first.
        let mut stack: Vec<(String, String)> = Vec::new();
        if let Some(label) = root_label.filter(|_| item_id == ancestor_id) {
            stack.push((label.to_owned(), ancestor_id.to_owned()));
        } else {
            stack.push((leaf.name.clone(), leaf.id.clone()));
            let mut current = leaf;
            for _ in 0..MAX_HOPS {
                let Some(parent_id) = current.parents.first().cloned() else {
                    break;
                };
                let file = match self.get_file_cached(&parent_id).await {
                    Ok(f) => f,
                    Err(e) => {
                        tracing::warn!(parent_id, error = %e, "ancestor fetch failed");
                        return None;
                    }
                };
                if file.id == ancestor_id {
                    if let Some(label) = root_label {
                        stack.push((label.to_owned(), ancestor_id.to_owned()));
                        break;
                    }
                }
                stack.push((file.name.clone(), file.id.clone()));
                current = file;
            }
        }

        // Shared-drive roots have no usable name; show the id.
        if let Some(top) = stack.last_mut() {
            if top.1.len() < ROOT_SENTINEL_LEN {
                top.0 = format!("/{}", top.1);
            }
        }

        let mut path = String::new();
        for (name, _) in stack.iter().rev().filter(|(name, _)| !name.is_empty()) {
            path.push('/');
            path.push_str(name.trim_start_matches('/'));
        }
        let parent = stack.get(1).or_else(|| stack.first()).map(|(name, id)| ParentRef {
            name: name.clone(),
            id: id.clone(),
        })?;

        Some(Resolved {
            path,
            parent,
            web_link,
            size,
        })
    }

    async fn get_file_cached(&self, item_id: &str) -> Result<DriveFile, crate::drive::DriveError> {
        if let Some(cache) = &self.cache {
            let hit = {
                let mut cache = cache.lock().expect("resolver cache poisoned");
                cache
                    .get(item_id)
                    .filter(|(stored, _)| stored.elapsed() < self.ttl)
                    .map(|(_, file)| file.clone())
            };
            if let Some(file) = hit {
                tracing::debug!(item_id, "resolver cache hit");
                return Ok(file);
            }
        }
        let file = self.drive.get_file(item_id).await?;
        if let Some(cache) = &self.cache {
            cache
                .lock()
                .expect("resolver cache poisoned")
                .put(item_id.to_owned(), (Instant::now(), file.clone()));
        }
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::{ActivityPage, ActivityQuery, DriveError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory file table; counts fetches per id.
    struct TableDrive {
        files: HashMap<String, DriveFile>,
        fetches: AtomicUsize,
    }

    impl TableDrive {
        fn new(files: Vec<DriveFile>) -> Self {
            TableDrive {
                files: files.into_iter().map(|f| (f.id.clone(), f)).collect(),
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DriveApi for TableDrive {
        async fn query_activities(
            &self,
            _query: &ActivityQuery,
        ) -> Result<ActivityPage, DriveError> {
            Ok(ActivityPage::default())
        }

        async fn get_file(&self, item_id: &str) -> Result<DriveFile, DriveError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.files.get(item_id).cloned().ok_or(DriveError::Http {
                status: 404,
                url: format!("files/{item_id}"),
                reason: "not found".to_owned(),
            })
        }
    }

    fn file(id: &str, name: &str, parent: Option<&str>) -> DriveFile {
        DriveFile {
            id: id.to_owned(),
            name: name.to_owned(),
            parents: parent.map(|p| vec![p.to_owned()]).unwrap_or_default(),
            mime_type: None,
            web_view_link: None,
            size: 0,
        }
    }

    fn resolver(files: Vec<DriveFile>) -> PathResolver {
        PathResolver::new(Arc::new(TableDrive::new(files)), None, Duration::from_secs(600))
    }

    #[tokio::test]
    async fn resolves_up_to_a_labelled_ancestor() {
        // AID has a longer-than-sentinel id so its label renders as a name.
        let ancestor = "A".repeat(25);
        let resolver = resolver(vec![
            file("FID", "m.mkv", Some("DID")),
            file("DID", "dir", Some(&ancestor)),
            file(&ancestor, "watched", None),
        ]);
        let resolved = resolver
            .resolve("FID", &ancestor, Some("MOVIES"))
            .await
            .unwrap();
        assert_eq!(resolved.path, "/MOVIES/dir/m.mkv");
        assert_eq!(resolved.parent.name, "dir");
        assert_eq!(resolved.parent.id, "DID");
    }

    #[tokio::test]
    async fn labelled_path_starts_with_the_root_label() {
        let ancestor = "B".repeat(25);
        let resolver = resolver(vec![
            file("FID", "m.mkv", Some(&ancestor)),
            file(&ancestor, "whatever", None),
        ]);
        let resolved = resolver
            .resolve("FID", &ancestor, Some("MOVIES"))
            .await
            .unwrap();
        assert!(resolved.path.starts_with("/MOVIES"));
    }

    #[tokio::test]
    async fn failed_hop_fails_the_whole_resolution() {
        // DID's parent is missing from the table.
        let resolver = resolver(vec![
            file("FID", "m.mkv", Some("DID")),
            file("DID", "dir", Some("GONE")),
        ]);
        assert!(resolver.resolve("FID", "AID", Some("X")).await.is_none());
    }

    #[tokio::test]
    async fn pathological_cycle_terminates_within_the_hop_bound() {
        let drive = Arc::new(TableDrive::new(vec![
            file("X", "x", Some("Y")),
            file("Y", "y", Some("X")),
        ]));
        let resolver =
            PathResolver::new(drive.clone(), None, Duration::from_secs(600));
        let resolved = resolver.resolve("X", "NEVER", None).await;
        // Terminates (does not hang) and fetched at most leaf + MAX_HOPS.
        assert!(resolved.is_some());
        assert!(drive.fetches.load(Ordering::SeqCst) <= MAX_HOPS + 1);
    }

    #[tokio::test]
    async fn ancestor_hops_are_cached_but_the_leaf_is_not() {
        let ancestor = "C".repeat(25);
        let drive = Arc::new(TableDrive::new(vec![
            file("FID", "m.mkv", Some("DID")),
            file("DID", "dir", Some(&ancestor)),
            file(&ancestor, "watched", None),
        ]));
        let resolver = PathResolver::new(drive.clone(), Some(16), Duration::from_secs(600));

        resolver.resolve("FID", &ancestor, Some("M")).await.unwrap();
        let first = drive.fetches.load(Ordering::SeqCst);
        resolver.resolve("FID", &ancestor, Some("M")).await.unwrap();
        let second = drive.fetches.load(Ordering::SeqCst) - first;

        // First pass walks leaf + dir + ancestor; the second refetches
        // only the leaf.
        assert_eq!(first, 3);
        assert_eq!(second, 1);
    }

    #[tokio::test]
    async fn short_terminal_id_renders_as_id_segment() {
        // Terminal node with a short (shared-drive sentinel) id and no
        // matching ancestor: the top segment becomes "/<id>".
        let resolver = resolver(vec![
            file("FID", "m.mkv", Some("0AFoo")),
            file("0AFoo", "", None),
        ]);
        let resolved = resolver.resolve("FID", "OTHER", None).await.unwrap();
        assert_eq!(resolved.path, "/0AFoo/m.mkv");
    }
}
