// Copyright 2025 Cowboy AI, LLC.

//! Persisted entity metadata and the trait implemented by domain record types

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Audit and lifecycle metadata carried by every persisted record.
///
/// Domain record types embed this block with `#[serde(flatten)]` so the
/// persisted document stays flat:
///
/// ```rust
/// use schemars::JsonSchema;
/// use serde::{Deserialize, Serialize};
/// use xdata_access::{Entity, Persistable};
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
/// struct Customer {
///     #[serde(flatten)]
///     entity: Entity,
///     name: String,
///     age: i64,
/// }
///
/// impl Persistable for Customer {
///     fn entity_type() -> &'static str {
///         "customer"
///     }
///
///     fn entity(&self) -> &Entity {
///         &self.entity
///     }
///
///     fn entity_mut(&mut self) -> &mut Entity {
///         &mut self.entity
///     }
/// }
/// ```
///
/// The repository owns every field here. Callers never set them directly;
/// insert/update/delete stamp them from the [`Clock`](crate::Clock) and
/// [`AuthUser`](crate::AuthUser) supplied at construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Entity {
    /// Store-assigned primary key, `None` until the first insert completes
    pub id: Option<String>,
    /// Business identifier, assigned once at insert and never reassigned
    pub xid: Option<String>,
    /// Soft-delete marker; a deleted record is never physically removed
    pub is_deleted: bool,
    /// Active flag consulted by the default visibility policy
    pub is_active: bool,
    /// Optimistic concurrency token, starts at 0 and increases by exactly 1
    /// on every successful mutation
    pub entity_version: u64,
    /// Principal that created the record
    pub created_by: Option<String>,
    /// When the record was created
    pub create_date: Option<DateTime<Utc>>,
    /// Principal that last modified the record
    pub modified_by: Option<String>,
    /// When the record was last modified
    pub modify_date: Option<DateTime<Utc>>,
    /// Principal that soft-deleted the record
    pub deleted_by: Option<String>,
    /// When the record was soft-deleted
    pub delete_date: Option<DateTime<Utc>>,
    /// Originating IP of the request that last touched the record
    pub ip: Option<String>,
    /// Originating host of the request that last touched the record
    pub host: Option<String>,
    /// Trace correlation id of the request that last touched the record
    pub trace_id: Option<String>,
}

impl Entity {
    /// Whether the record has completed an insert
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

/// Trait implemented by domain record types so the repository can persist
/// them and the query compiler can resolve field paths against them.
///
/// The `JsonSchema` bound feeds the per-type field registry used by the
/// filter and sort compilers; `Serialize`/`DeserializeOwned` carry the record
/// across the document store boundary.
pub trait Persistable:
    Clone + Serialize + DeserializeOwned + JsonSchema + Send + Sync + 'static
{
    /// Collection name for this record type, also the namespace for its
    /// business identifier counter
    fn entity_type() -> &'static str;

    /// Read access to the embedded entity metadata
    fn entity(&self) -> &Entity;

    /// Mutable access to the embedded entity metadata
    fn entity_mut(&mut self) -> &mut Entity;
}
