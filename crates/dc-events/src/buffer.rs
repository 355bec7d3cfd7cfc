//! Parent-keyed coalescing buffer for buffered dispatchers.
//!
//! Events accumulate under the directory containing their `path`.  Parents
//! keep their first-seen insertion order (FIFO across parents) and each
//! parent's events keep arrival order.  Inserting an event whose raw
//! payload already sits under the same parent is a no-op, so replayed
//! activities collapse instead of double-flushing.

use crate::event::ActivityEvent;
use crate::paths;
use indexmap::IndexMap;

#[derive(Default)]
pub struct FolderBuffer {
    entries: IndexMap<String, Vec<ActivityEvent>>,
}

impl FolderBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `event` under the parent directory of its `path`.
    ///
    /// A move is split upstream into two variants sharing one raw record,
    /// so the duplicate check also compares `action` and `path`: true
    /// replays collapse, the two sides of a split both survive.
    pub fn put(&mut self, event: ActivityEvent) {
        let parent = paths::parent_dir(&event.path).to_owned();
        let bucket = self.entries.entry(parent).or_default();
        if bucket
            .iter()
            .any(|e| *e == event && e.action == event.action && e.path == event.path)
        {
            return;
        }
        bucket.push(event);
    }

    /// Remove and return the oldest parent with its accumulated events.
    pub fn pop(&mut self) -> Option<(String, Vec<ActivityEvent>)> {
        self.entries.shift_remove_index(0)
    }

    /// Number of distinct parents currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Action, ActionDetail, TargetInfo};
    use chrono::{TimeZone, Utc};

    fn make_event(id: u32, path: &str, action: Action) -> ActivityEvent {
        let mut event = ActivityEvent::new(
            serde_json::json!({"id": id}),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            TargetInfo::new(paths::file_name(path), None, None),
            action,
            ActionDetail::None,
        );
        event.path = path.to_owned();
        event
    }

    #[test]
    fn groups_by_parent_in_first_seen_order() {
        let mut buffer = FolderBuffer::new();
        buffer.put(make_event(1, "/a/x.mkv", Action::Create));
        buffer.put(make_event(2, "/b/y.mkv", Action::Create));
        buffer.put(make_event(3, "/a/z.mkv", Action::Create));

        assert_eq!(buffer.len(), 2);
        let (parent, events) = buffer.pop().unwrap();
        assert_eq!(parent, "/a");
        assert_eq!(events.len(), 2);
        let (parent, _) = buffer.pop().unwrap();
        assert_eq!(parent, "/b");
        assert!(buffer.pop().is_none());
    }

    #[test]
    fn duplicate_raw_payload_is_idempotent() {
        let mut buffer = FolderBuffer::new();
        buffer.put(make_event(1, "/a/x.mkv", Action::Create));
        buffer.put(make_event(1, "/a/x.mkv", Action::Create));

        let (_, events) = buffer.pop().unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn split_move_variants_share_raw_but_both_survive() {
        let mut buffer = FolderBuffer::new();
        let kept = make_event(1, "/a/x.mkv", Action::Move);
        let mut delete = kept.clone();
        delete.action = Action::Delete;
        delete.path = "/a/old.mkv".to_owned();
        buffer.put(delete);
        buffer.put(kept);

        let (_, events) = buffer.pop().unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn events_under_one_parent_keep_arrival_order() {
        let mut buffer = FolderBuffer::new();
        for id in 0..5 {
            buffer.put(make_event(id, &format!("/a/{id}.mkv"), Action::Create));
        }
        let (_, events) = buffer.pop().unwrap();
        let ids: Vec<u64> = events
            .iter()
            .map(|e| e.raw["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }
}
