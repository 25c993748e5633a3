// Copyright 2025 Cowboy AI, LLC.

//! # Document Store Boundary
//!
//! The repository talks to storage exclusively through [`DocumentStore`]:
//! create, point lookup, conditional full overwrite, predicate query with
//! ordering and paging, count, and an atomic counter. Everything crossing
//! this boundary is a flat `serde_json::Value` document.
//!
//! The conditional overwrite is the concurrency linchpin: a write carrying
//! an expected version succeeds only if the stored document's
//! `entity_version` still matches, which turns the repository's
//! load-then-compare-then-write sequence into a genuine compare-and-swap at
//! the commit point instead of relying on timing.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::query::{Predicate, SortSpec};

/// Document store failures
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// No document under the given key
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Conditional write lost the race
    #[error("Version conflict: expected {expected}, but found {actual}")]
    VersionConflict {
        /// Version the writer expected to still be stored
        expected: u64,
        /// Version actually stored
        actual: u64,
    },

    /// Document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backend failure
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Paging window applied after filtering and ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Documents to skip
    pub skip: usize,
    /// Maximum documents to return
    pub take: usize,
}

/// Native operations the repository requires from a document store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist a new document, assign its primary id (written into the
    /// document's `id` field), and return it
    async fn create(&self, collection: &str, doc: Value) -> Result<String, StoreError>;

    /// Point lookup by primary id
    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Full overwrite by id. When `expected_version` is given, the write
    /// succeeds only if the stored document's `entity_version` still equals
    /// it, checked atomically with the write.
    async fn replace(
        &self,
        collection: &str,
        id: &str,
        doc: Value,
        expected_version: Option<u64>,
    ) -> Result<(), StoreError>;

    /// Matching documents, optionally ordered and paged. An empty `order`
    /// leaves documents in store iteration order.
    async fn query(
        &self,
        collection: &str,
        predicate: &Predicate,
        order: &SortSpec,
        page: Option<Page>,
    ) -> Result<Vec<Value>, StoreError>;

    /// Count of matching documents
    async fn count(&self, collection: &str, predicate: &Predicate) -> Result<usize, StoreError>;

    /// Atomically increment and return a named counter; first call returns 1
    async fn increment(&self, key: &str) -> Result<u64, StoreError>;
}
