//! Normalising provider activity records into event skeletons.
//!
//! The provider reports one `primaryActionDetail` per activity, keyed by
//! exactly one of the twelve action kinds; the key's payload becomes the
//! `ActionDetail`.  Targets are one of `driveItem | drive | fileComment`,
//! the comment form dereferencing to its parent item.  Records that carry
//! no parseable time or action are dropped here with a warning — the
//! provider's schema is frozen for our purposes (evolution is a non-goal).

use chrono::{DateTime, Utc};
use dc_events::event::{Action, ActionDetail, ActivityEvent, TargetInfo};
use serde_json::Value;

/// Normalise one raw activity record.  Enrichment fields stay empty.
pub fn normalize(raw: &Value) -> Option<ActivityEvent> {
    let timestamp = parse_time(raw)?;
    let detail_obj = raw.get("primaryActionDetail")?.as_object()?;
    let key = one_of(detail_obj)?;
    let Some(action) = Action::from_key(key) else {
        tracing::warn!(key, "unknown primary action, dropping activity");
        return None;
    };
    let action_detail = parse_action_detail(action, &detail_obj[key]);
    let target = raw
        .get("targets")
        .and_then(Value::as_array)
        .and_then(|targets| targets.first())
        .map(parse_target)
        .unwrap_or_default();
    Some(ActivityEvent::new(
        raw.clone(),
        timestamp,
        target,
        action,
        action_detail,
    ))
}

/// The activity's time: `timestamp`, or the end of its `timeRange`.
fn parse_time(raw: &Value) -> Option<DateTime<Utc>> {
    let text = raw
        .get("timestamp")
        .or_else(|| raw.pointer("/timeRange/endTime"))
        .and_then(Value::as_str)?;
    match DateTime::parse_from_rfc3339(text) {
        Ok(t) => Some(t.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!(text, error = %e, "unparseable activity time");
            None
        }
    }
}

fn parse_action_detail(action: Action, payload: &Value) -> ActionDetail {
    match action {
        Action::Create => one_of_value(payload)
            .map(|key| ActionDetail::Note(key.to_owned()))
            .unwrap_or_default(),
        Action::Move => payload
            .pointer("/removedParents/0")
            .map(parse_target)
            .map(ActionDetail::MovedFrom)
            .unwrap_or_default(),
        Action::Rename => payload
            .get("oldTitle")
            .and_then(Value::as_str)
            .map(|t| ActionDetail::Note(t.to_owned()))
            .unwrap_or_default(),
        Action::Delete | Action::Restore | Action::DlpChange | Action::Reference => payload
            .get("type")
            .and_then(Value::as_str)
            .map(|t| ActionDetail::Note(t.to_owned()))
            .unwrap_or_default(),
        Action::PermissionChange => payload
            .get("addedPermissions")
            .map(|p| ActionDetail::Raw(p.clone()))
            .unwrap_or_default(),
        Action::Comment => comment_subtype(payload)
            .map(ActionDetail::Note)
            .unwrap_or_default(),
        Action::SettingsChange => payload
            .pointer("/restrictionChanges/0/newRestriction")
            .and_then(Value::as_str)
            .map(|r| ActionDetail::Note(r.to_owned()))
            .unwrap_or_default(),
        Action::Edit | Action::AppliedLabelChange => ActionDetail::None,
    }
}

/// The comment payload keys its kind (`post | assignment | suggestion`)
/// next to a `mentionedUsers` list; the kind's `subtype` is the detail.
fn comment_subtype(payload: &Value) -> Option<String> {
    let obj = payload.as_object()?;
    let key = obj.keys().find(|k| *k != "mentionedUsers")?;
    obj[key]
        .get("subtype")
        .and_then(Value::as_str)
        .map(str::to_owned)
}

/// Extract `(title, name, mimeType)` from any of the three target forms.
pub fn parse_target(target: &Value) -> TargetInfo {
    let item = target
        .get("driveItem")
        .or_else(|| target.get("drive"))
        .or_else(|| target.pointer("/fileComment/parent"));
    match item {
        Some(item) => TargetInfo {
            title: item
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_owned(),
            name: item
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_owned),
            mime_type: item
                .get("mimeType")
                .and_then(Value::as_str)
                .map(str::to_owned),
        },
        None => TargetInfo {
            title: target
                .as_object()
                .and_then(one_of)
                .unwrap_or("unknown")
                .to_owned(),
            name: None,
            mime_type: None,
        },
    }
}

/// First key of a single-key object.  More than one key is a provider
/// anomaly worth logging; the first still wins.
fn one_of(obj: &serde_json::Map<String, Value>) -> Option<&str> {
    if obj.len() > 1 {
        tracing::error!(keys = ?obj.keys().collect::<Vec<_>>(), "multiple values in one-of object");
    }
    obj.keys().next().map(String::as_str)
}

fn one_of_value(value: &Value) -> Option<&str> {
    value.as_object().and_then(one_of)
}
