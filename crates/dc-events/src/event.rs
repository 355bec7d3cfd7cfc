//! The enriched activity event flowing through the pipeline.
//!
//! An `ActivityEvent` is produced in two stages.  The poll loop normalises a
//! raw provider activity record into the event skeleton (`raw`, `timestamp`,
//! `target`, `action`, `action_detail`, ancestor identity) and enqueues it.
//! The dispatch loop enriches the skeleton after dequeue: `is_folder`,
//! `path`, `removed_path`, `parent`, `link`, `size` and the human-facing
//! `timestamp_text` are all enrichment-stage fields and stay at their
//! defaults until then.
//!
//! Two events are equal iff their `raw` payloads are equal.  The folder
//! buffer relies on this for idempotent inserts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIME_FOLDER: &str = "application/vnd.google-apps.folder";
pub const MIME_SHORTCUT: &str = "application/vnd.google-apps.shortcut";

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// The provider's primary action kinds, one per activity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Create,
    Edit,
    Move,
    Rename,
    Delete,
    Restore,
    PermissionChange,
    Comment,
    DlpChange,
    Reference,
    SettingsChange,
    AppliedLabelChange,
}

impl Action {
    /// All action kinds, in the provider's documented order.  This is the
    /// default `actions` filter: everything passes.
    pub const ALL: [Action; 12] = [
        Action::Create,
        Action::Edit,
        Action::Move,
        Action::Rename,
        Action::Delete,
        Action::Restore,
        Action::PermissionChange,
        Action::Comment,
        Action::DlpChange,
        Action::Reference,
        Action::SettingsChange,
        Action::AppliedLabelChange,
    ];

    /// The camelCase key used on the wire and in settings files.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Move => "move",
            Action::Rename => "rename",
            Action::Delete => "delete",
            Action::Restore => "restore",
            Action::PermissionChange => "permissionChange",
            Action::Comment => "comment",
            Action::DlpChange => "dlpChange",
            Action::Reference => "reference",
            Action::SettingsChange => "settingsChange",
            Action::AppliedLabelChange => "appliedLabelChange",
        }
    }

    pub fn from_key(key: &str) -> Option<Action> {
        Action::ALL.into_iter().find(|a| a.as_str() == key)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Target and parent references
// ---------------------------------------------------------------------------

/// The `(title, name, mimeType)` tuple of an activity target.
///
/// `name` is the provider's resource name (`items/<id>`); `item_id` strips
/// the prefix.  `fileComment` targets are dereferenced to their parent item
/// during normalisation, so a `TargetInfo` always describes a drive item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetInfo {
    pub title: String,
    pub name: Option<String>,
    pub mime_type: Option<String>,
}

impl TargetInfo {
    pub fn new(
        title: impl Into<String>,
        name: Option<String>,
        mime_type: Option<String>,
    ) -> Self {
        TargetInfo {
            title: title.into(),
            name,
            mime_type,
        }
    }

    /// The bare item id, with the `items/` resource prefix removed.
    pub fn item_id(&self) -> &str {
        let name = self.name.as_deref().unwrap_or("");
        name.rsplit_once('/').map_or(name, |(_, id)| id)
    }

    /// Folders and shortcuts both count as folders for dispatch purposes.
    pub fn is_folder_mime(&self) -> bool {
        matches!(self.mime_type.as_deref(), Some(MIME_FOLDER | MIME_SHORTCUT))
    }
}

/// `(name, id)` of the immediate parent, used for link construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    pub name: String,
    pub id: String,
}

// ---------------------------------------------------------------------------
// Action detail
// ---------------------------------------------------------------------------

/// Action-specific payload extracted from `primaryActionDetail`.
///
/// `Note` carries the single-string forms: the create subtype, the old title
/// for renames, the reason code for deletes/restores (`TRASH`,
/// `PERMANENT_DELETE`...), the comment subtype and the settings-change
/// restriction.  `MovedFrom` carries the source parent of a move.  `Raw`
/// keeps payloads with no flat form (added permissions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionDetail {
    None,
    Note(String),
    MovedFrom(TargetInfo),
    Raw(serde_json::Value),
}

impl ActionDetail {
    pub fn note(&self) -> Option<&str> {
        match self {
            ActionDetail::Note(s) => Some(s),
            _ => None,
        }
    }

    pub fn moved_from(&self) -> Option<&TargetInfo> {
        match self {
            ActionDetail::MovedFrom(t) => Some(t),
            _ => None,
        }
    }

    /// Flat text used for human-facing surfaces (Discord detail field).
    pub fn display_text(&self) -> Option<&str> {
        self.note()
    }
}

impl Default for ActionDetail {
    fn default() -> Self {
        ActionDetail::None
    }
}

// ---------------------------------------------------------------------------
// ActivityEvent
// ---------------------------------------------------------------------------

/// One enriched change event.  See the module docs for the two-stage
/// population contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// The provider's original activity record, kept for debugging and as
    /// the identity for equality.
    pub raw: serde_json::Value,
    /// Remote-observed instant; immutable and the queue priority.
    pub timestamp: DateTime<Utc>,
    pub target: TargetInfo,
    pub action: Action,
    pub action_detail: ActionDetail,
    /// Which watched subtree produced this event.
    pub ancestor_id: String,
    pub root_label: Option<String>,
    /// Absolute logical path; empty when resolution failed.
    pub path: String,
    /// Source-side path for moves and renames; empty when absent.
    pub removed_path: String,
    pub parent: ParentRef,
    pub is_folder: bool,
    /// Provider-side URL to the containing folder (or the item's own
    /// webViewLink when the provider returned one).
    pub link: String,
    /// Byte count; 0 when unknown (folders, sparse metadata).
    pub size: u64,
    /// Local-timezone render of `timestamp`, offset-aware.
    pub timestamp_text: String,
    /// Name of the producing poller.
    pub poller: String,
}

impl ActivityEvent {
    /// Build the polling-stage skeleton.  Enrichment fields stay empty.
    pub fn new(
        raw: serde_json::Value,
        timestamp: DateTime<Utc>,
        target: TargetInfo,
        action: Action,
        action_detail: ActionDetail,
    ) -> Self {
        ActivityEvent {
            raw,
            timestamp,
            target,
            action,
            action_detail,
            ancestor_id: String::new(),
            root_label: None,
            path: String::new(),
            removed_path: String::new(),
            parent: ParentRef::default(),
            is_folder: false,
            link: String::new(),
            size: 0,
            timestamp_text: String::new(),
            poller: String::new(),
        }
    }

    /// Queue priority: lower sorts earlier.
    pub fn priority(&self) -> i64 {
        self.timestamp.timestamp()
    }
}

impl PartialEq for ActivityEvent {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for ActivityEvent {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_event(raw: serde_json::Value) -> ActivityEvent {
        ActivityEvent::new(
            raw,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            TargetInfo::new("m.mkv", Some("items/FID".to_owned()), None),
            Action::Create,
            ActionDetail::None,
        )
    }

    #[test]
    fn equality_is_by_raw_payload_only() {
        let a = make_event(serde_json::json!({"id": 1}));
        let mut b = make_event(serde_json::json!({"id": 1}));
        b.path = "/MOVIES/dir/m.mkv".to_owned();
        b.is_folder = true;
        assert_eq!(a, b);

        let c = make_event(serde_json::json!({"id": 2}));
        assert_ne!(a, c);
    }

    #[test]
    fn item_id_strips_resource_prefix() {
        let t = TargetInfo::new("x", Some("items/ABC123".to_owned()), None);
        assert_eq!(t.item_id(), "ABC123");
        let bare = TargetInfo::new("x", Some("ABC123".to_owned()), None);
        assert_eq!(bare.item_id(), "ABC123");
        let none = TargetInfo::new("x", None, None);
        assert_eq!(none.item_id(), "");
    }

    #[test]
    fn folder_and_shortcut_mimes_count_as_folders() {
        for mime in [MIME_FOLDER, MIME_SHORTCUT] {
            let t = TargetInfo::new("d", None, Some(mime.to_owned()));
            assert!(t.is_folder_mime());
        }
        let file = TargetInfo::new("f", None, Some("video/x-matroska".to_owned()));
        assert!(!file.is_folder_mime());
    }

    #[test]
    fn action_keys_round_trip() {
        for action in Action::ALL {
            assert_eq!(Action::from_key(action.as_str()), Some(action));
        }
        assert_eq!(Action::from_key("unknown"), None);
    }
}
