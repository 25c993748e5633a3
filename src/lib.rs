// Copyright 2025 Cowboy AI, LLC.

//! # XData Access
//!
//! Generic, type-parameterized persistence for domain records stored as
//! documents, with optimistic concurrency control, soft-delete semantics,
//! audit trails, field-level change history, and a declarative query layer
//! that compiles ad-hoc client-supplied descriptors into type-safe
//! predicates over the record type.
//!
//! The building blocks:
//! - **Entity**: flat audit/lifecycle metadata embedded in every record
//! - **Repository**: the lifecycle state machine (insert, update, soft
//!   delete, restore) with an optimistic-concurrency protocol
//! - **Query Compiler**: recursive filter trees and composite sorts turned
//!   into predicates and orderings, validated before any store access
//! - **History Recorder**: one immutable record per update that changed
//!   something domain-visible
//! - **Document Store**: the storage seam, with an in-process
//!   implementation for tests and embedding
//!
//! ## Design Principles
//!
//! 1. **Optimistic concurrency**: every record carries a version token;
//!    mutations commit through a conditional write, so conflicting writers
//!    always surface as conflicts rather than lost updates
//! 2. **Soft delete**: deleted records are marked, never removed, and stay
//!    reachable by id
//! 3. **Validated queries**: malformed descriptors fail at compile time,
//!    before the store sees them
//! 4. **Explicit context**: principal, clock, and visibility policy are
//!    injected, never read from process-global state
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use schemars::JsonSchema;
//! use serde::{Deserialize, Serialize};
//! use xdata_access::{
//!     AuthUser, Entity, Filter, MemoryStore, Persistable, Repository,
//! };
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
//! struct Customer {
//!     #[serde(flatten)]
//!     entity: Entity,
//!     name: String,
//!     age: i64,
//! }
//!
//! impl Persistable for Customer {
//!     fn entity_type() -> &'static str {
//!         "customer"
//!     }
//!
//!     fn entity(&self) -> &Entity {
//!         &self.entity
//!     }
//!
//!     fn entity_mut(&mut self) -> &mut Entity {
//!         &mut self.entity
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), xdata_access::DataError> {
//! let store = Arc::new(MemoryStore::new());
//! let repo: Repository<Customer, _> = Repository::builder(store)
//!     .user(AuthUser::named("user-1"))
//!     .build();
//!
//! let mut customer = Customer {
//!     name: "Ada".to_string(),
//!     age: 36,
//!     ..Default::default()
//! };
//! let id = repo.insert(&mut customer).await?;
//!
//! let adults = Filter::new("age", "gte", 18.into());
//! assert_eq!(repo.get_count_where(&adults).await?, 1);
//! assert!(repo.find_by_id(&id).await?.is_some());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod context;
mod entity;
mod errors;
mod history;
mod repository;

pub mod query;
pub mod store;

// Re-export core types
pub use context::{AuthUser, Clock, FixedClock, SystemClock, Visibility};
pub use entity::{Entity, Persistable};
pub use errors::{DataError, DataResult};
pub use history::{diff_documents, EntityChange, EntityHistory, HISTORY_COLLECTION};
pub use query::{
    compile_sorts, Aggregator, DataSourceRequest, DataSourceResult, FieldKind, FieldMap, Filter,
    FilterOperator, Predicate, Sort, SortDirection, SortSpec,
};
pub use repository::{Repository, RepositoryBuilder};
pub use store::{DocumentStore, MemoryStore, Page, StoreError};
