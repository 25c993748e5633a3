// Copyright 2025 Cowboy AI, LLC.

//! Field-level change history
//!
//! Every update that changes something domain-visible produces one immutable
//! [`EntityHistory`] record linked to the entity id. History records are
//! inserted once and never updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::AuthUser;

/// Collection holding history records for all entity types
pub const HISTORY_COLLECTION: &str = "entity_history";

/// Bookkeeping fields excluded from the diff. These change on (nearly) every
/// write, so including them would make every update look like a domain
/// change and defeat the "history only on actual change" contract.
const BOOKKEEPING_FIELDS: &[&str] = &[
    "id",
    "xid",
    "entity_version",
    "created_by",
    "create_date",
    "modified_by",
    "modify_date",
    "deleted_by",
    "delete_date",
    "ip",
    "host",
    "trace_id",
];

/// One field-level change: the encoded value before and after
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityChange {
    /// Serialized field name
    pub name: String,
    /// Encoded value before the update, `None` when absent or null
    pub old_value: Option<String>,
    /// Encoded value after the update, `None` when absent or null
    pub new_value: Option<String>,
}

/// Immutable record of the changes one successful update made to an entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityHistory {
    /// Store-assigned primary key of the history record itself
    pub id: Option<String>,
    /// Type name of the entity the changes belong to
    pub entity_type: String,
    /// Primary id of the entity the changes belong to
    pub entity_id: String,
    /// Ordered field-level changes
    pub changes: Vec<EntityChange>,
    /// When the triggering update happened
    pub change_date: DateTime<Utc>,
    /// Principal that made the update
    pub user_id: Option<String>,
    /// Originating IP of the update
    pub ip: Option<String>,
    /// Originating host of the update
    pub host: Option<String>,
    /// Trace correlation id of the update
    pub trace_id: Option<String>,
}

impl EntityHistory {
    /// Build a history record from a computed diff and the current
    /// audit context
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        changes: Vec<EntityChange>,
        change_date: DateTime<Utc>,
        user: &AuthUser,
    ) -> Self {
        Self {
            id: None,
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            changes,
            change_date,
            user_id: user.id.clone(),
            ip: user.ip.clone(),
            host: user.host.clone(),
            trace_id: user.trace_id.clone(),
        }
    }
}

/// Compute the field-level diff between the previously persisted document
/// and the one about to be saved.
///
/// Per-property equality on the encoded top-level values, skipping the
/// bookkeeping fields. Nested values are compared and rendered as whole
/// JSON fragments.
pub fn diff_documents(old: &Value, new: &Value) -> Vec<EntityChange> {
    let empty = serde_json::Map::new();
    let old_map = old.as_object().unwrap_or(&empty);
    let new_map = new.as_object().unwrap_or(&empty);

    let mut changes = Vec::new();
    for (name, new_value) in new_map {
        if BOOKKEEPING_FIELDS.contains(&name.as_str()) {
            continue;
        }
        let old_value = old_map.get(name).unwrap_or(&Value::Null);
        if old_value != new_value {
            changes.push(EntityChange {
                name: name.clone(),
                old_value: render(old_value),
                new_value: render(new_value),
            });
        }
    }
    // Fields present before but dropped from the new encoding
    for (name, old_value) in old_map {
        if BOOKKEEPING_FIELDS.contains(&name.as_str()) || new_map.contains_key(name) {
            continue;
        }
        changes.push(EntityChange {
            name: name.clone(),
            old_value: render(old_value),
            new_value: None,
        });
    }
    changes
}

fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
