// Copyright 2025 Cowboy AI, LLC.

//! Sort descriptors and their compilation into document orderings

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{DataError, DataResult};
use crate::query::schema::FieldMap;
use crate::query::value_at;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    /// Sort in ascending order
    #[serde(rename = "asc")]
    Ascending,
    /// Sort in descending order
    #[serde(rename = "desc")]
    Descending,
}

impl SortDirection {
    /// Parse a wire direction key, case-insensitively
    pub fn parse(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Ascending),
            "desc" => Some(Self::Descending),
            _ => None,
        }
    }
}

/// One field-plus-direction sort descriptor as it arrives from the wire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sort {
    /// Field path to order by
    #[serde(default)]
    pub field: String,
    /// Direction key, `asc` or `desc`
    #[serde(default)]
    pub dir: String,
}

impl Sort {
    /// Build a sort descriptor
    pub fn new(field: impl Into<String>, dir: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            dir: dir.into(),
        }
    }
}

/// Compiled composite ordering over serialized documents.
///
/// Keys apply left to right: the first is the primary sort key, later keys
/// break ties. Applied with a stable sort, so equal documents keep their
/// store order.
#[derive(Debug, Clone, Default)]
pub struct SortSpec {
    keys: Vec<(String, SortDirection)>,
}

impl SortSpec {
    /// Ordering on a single field, bypassing descriptor parsing
    pub fn by(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            keys: vec![(field.into(), direction)],
        }
    }

    /// Whether any keys were compiled
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Compare two documents under this ordering
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        for (path, direction) in &self.keys {
            let ordering = json_ord(value_at(a, path), value_at(b, path));
            let ordering = match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Compile an ordered list of sort descriptors against a record type.
///
/// Unresolvable fields are schema errors. Unrecognized directions are query
/// errors by default; in lenient mode the offending descriptor is skipped,
/// preserving the legacy wire behavior.
pub fn compile_sorts(sorts: &[Sort], fields: &FieldMap, lenient: bool) -> DataResult<SortSpec> {
    let mut keys = Vec::with_capacity(sorts.len());
    for sort in sorts {
        let Some(direction) = SortDirection::parse(&sort.dir) else {
            if lenient {
                continue;
            }
            return Err(DataError::Query(format!(
                "unknown sort direction: {}",
                sort.dir
            )));
        };
        if fields.resolve(&sort.field).is_none() {
            return Err(DataError::Schema(format!(
                "unknown field path: {}",
                sort.field
            )));
        }
        keys.push((sort.field.clone(), direction));
    }
    Ok(SortSpec { keys })
}

/// Total order over JSON scalars: null/absent first, then booleans, numbers,
/// strings, and finally composites (which compare equal among themselves)
fn json_ord(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    let (ra, rb) = (rank(a), rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        _ => Ordering::Equal,
    }
}
