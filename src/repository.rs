// Copyright 2025 Cowboy AI, LLC.

//! Generic repository over a document store
//!
//! Orchestrates the entity lifecycle (insert, update, soft delete, restore)
//! with optimistic concurrency, audit stamping, business-identifier
//! generation, change-history recording, and the declarative query layer.
//!
//! Mutations follow load-then-compare-then-write: the current record is
//! loaded, its version and business identifier are compared against the
//! caller's copy, and the write is committed as a conditional replace on the
//! loaded version so a race with an in-flight writer still surfaces as a
//! conflict. On update the history record is written before the record
//! itself; the record replace is the durable commit point, so a cancellation
//! between the two leaves at worst an orphaned history row and never a
//! version bump without its history.

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::context::{AuthUser, Clock, SystemClock, Visibility};
use crate::entity::Persistable;
use crate::errors::{DataError, DataResult};
use crate::history::{diff_documents, EntityChange, EntityHistory, HISTORY_COLLECTION};
use crate::query::{
    compile_sorts, DataSourceRequest, DataSourceResult, Filter, FieldMap, Predicate, SortDirection,
    SortSpec,
};
use crate::store::{DocumentStore, Page, StoreError};

/// Type-parameterized repository implementing the entity lifecycle against
/// a [`DocumentStore`]
pub struct Repository<T: Persistable, S: DocumentStore> {
    store: Arc<S>,
    user: AuthUser,
    clock: Arc<dyn Clock>,
    visibility: Visibility,
    lenient_sort: bool,
    fields: FieldMap,
    _record: PhantomData<fn() -> T>,
}

impl<T: Persistable, S: DocumentStore> Repository<T, S> {
    /// Start building a repository for this store
    pub fn builder(store: Arc<S>) -> RepositoryBuilder<T, S> {
        RepositoryBuilder {
            store,
            user: AuthUser::default(),
            clock: Arc::new(SystemClock),
            visibility: Visibility::default(),
            lenient_sort: false,
            _record: PhantomData,
        }
    }

    /// The field registry compiled for the record type
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Insert a new record.
    ///
    /// Fails with `InvalidState` when the record already carries an id.
    /// Assigns the business identifier, stamps the creation audit fields,
    /// forces the record active and undeleted at version 0, and returns the
    /// store-assigned primary id (also written back into the record).
    pub async fn insert(&self, record: &mut T) -> DataResult<String> {
        if record.entity().id.is_some() {
            return Err(DataError::InvalidState(
                "id must be empty for new entities".to_string(),
            ));
        }

        let xid = self.next_xid().await?;
        let now = self.clock.now();
        let meta = record.entity_mut();
        meta.id = None;
        meta.xid = Some(xid);
        meta.create_date = Some(now);
        meta.created_by = self.user.id.clone();
        meta.ip = self.user.ip.clone();
        meta.host = self.user.host.clone();
        meta.trace_id = self.user.trace_id.clone();
        meta.is_active = true;
        meta.is_deleted = false;
        meta.entity_version = 0;
        meta.modified_by = None;
        meta.modify_date = None;
        meta.deleted_by = None;
        meta.delete_date = None;

        let doc = serde_json::to_value(&*record)?;
        let id = self.store.create(T::entity_type(), doc).await?;
        record.entity_mut().id = Some(id.clone());
        info!("Inserted {} {}", T::entity_type(), id);
        Ok(id)
    }

    /// Update a persisted record.
    ///
    /// Fails with `InvalidState` when the id is empty or the stored record
    /// is soft-deleted (deleted records must be restored before they accept
    /// updates), `NotFound` when nothing is stored under the id, and a
    /// conflict when the version or business identifier no longer matches.
    /// Bumps the version by exactly one, stamps the modification audit
    /// fields, and records the field-level diff as history when it is
    /// non-empty.
    pub async fn update(&self, record: &mut T) -> DataResult<()> {
        let id = self.require_id(record.entity().id.as_deref())?;
        let current_doc = self.load_current(&id).await?;
        let current: T = serde_json::from_value(current_doc.clone())?;

        let stored = current.entity();
        if stored.is_deleted {
            return Err(DataError::InvalidState(
                "entity is soft-deleted; restore it before updating".to_string(),
            ));
        }
        self.check_version(stored.entity_version, record.entity().entity_version)?;
        if stored.xid != record.entity().xid {
            return Err(DataError::IdentityConflict {
                expected: record.entity().xid.clone().unwrap_or_default(),
                actual: stored.xid.clone().unwrap_or_default(),
            });
        }

        let loaded_version = stored.entity_version;
        let now = self.clock.now();
        let meta = record.entity_mut();
        meta.modified_by = self.user.id.clone();
        meta.modify_date = Some(now);
        meta.ip = self.user.ip.clone();
        meta.host = self.user.host.clone();
        meta.trace_id = self.user.trace_id.clone();
        meta.is_deleted = false;
        meta.deleted_by = None;
        meta.delete_date = None;
        meta.entity_version = loaded_version + 1;

        let new_doc = serde_json::to_value(&*record)?;
        let changes = diff_documents(&current_doc, &new_doc);
        if !changes.is_empty() {
            debug!(
                "Recording {} change(s) for {} {}",
                changes.len(),
                T::entity_type(),
                id
            );
            self.save_history(&id, changes, now).await?;
        }

        self.store
            .replace(T::entity_type(), &id, new_doc, Some(loaded_version))
            .await
            .map_err(|e| self.mutation_error(&id, e))?;
        info!(
            "Updated {} {} to version {}",
            T::entity_type(),
            id,
            loaded_version + 1
        );
        Ok(())
    }

    /// Soft-delete a persisted record.
    ///
    /// The deletion markers are applied to the freshly loaded record, not
    /// the caller's payload, so a delete can never smuggle unrelated field
    /// changes in. The record stays in the store with `is_deleted` set.
    pub async fn delete(&self, record: &T) -> DataResult<()> {
        let id = self.require_id(record.entity().id.as_deref())?;
        let current_doc = self.load_current(&id).await?;
        let mut current: T = serde_json::from_value(current_doc)?;

        let loaded_version = current.entity().entity_version;
        self.check_version(loaded_version, record.entity().entity_version)?;

        let now = self.clock.now();
        let meta = current.entity_mut();
        meta.is_deleted = true;
        meta.deleted_by = self.user.id.clone();
        meta.delete_date = Some(now);
        meta.ip = self.user.ip.clone();
        meta.host = self.user.host.clone();
        meta.trace_id = self.user.trace_id.clone();
        meta.entity_version = loaded_version + 1;

        let doc = serde_json::to_value(&current)?;
        self.store
            .replace(T::entity_type(), &id, doc, Some(loaded_version))
            .await
            .map_err(|e| self.mutation_error(&id, e))?;
        info!("Soft-deleted {} {}", T::entity_type(), id);
        Ok(())
    }

    /// Bring a soft-deleted record back into the live view.
    ///
    /// Fails with `InvalidState` when the stored record is not deleted.
    /// Clears the deletion markers on the loaded record, stamps the
    /// modification audit fields, bumps the version, and records the
    /// `is_deleted` transition in history.
    pub async fn restore(&self, record: &T) -> DataResult<()> {
        let id = self.require_id(record.entity().id.as_deref())?;
        let current_doc = self.load_current(&id).await?;
        let mut current: T = serde_json::from_value(current_doc)?;

        if !current.entity().is_deleted {
            return Err(DataError::InvalidState(
                "entity is not deleted".to_string(),
            ));
        }
        let loaded_version = current.entity().entity_version;
        self.check_version(loaded_version, record.entity().entity_version)?;

        let now = self.clock.now();
        let meta = current.entity_mut();
        meta.is_deleted = false;
        meta.deleted_by = None;
        meta.delete_date = None;
        meta.modified_by = self.user.id.clone();
        meta.modify_date = Some(now);
        meta.ip = self.user.ip.clone();
        meta.host = self.user.host.clone();
        meta.trace_id = self.user.trace_id.clone();
        meta.entity_version = loaded_version + 1;

        let changes = vec![EntityChange {
            name: "is_deleted".to_string(),
            old_value: Some("true".to_string()),
            new_value: Some("false".to_string()),
        }];
        self.save_history(&id, changes, now).await?;

        let doc = serde_json::to_value(&current)?;
        self.store
            .replace(T::entity_type(), &id, doc, Some(loaded_version))
            .await
            .map_err(|e| self.mutation_error(&id, e))?;
        info!("Restored {} {}", T::entity_type(), id);
        Ok(())
    }

    /// Point lookup by primary id. Bypasses the visibility policy, so
    /// soft-deleted records are still reachable here.
    pub async fn find_by_id(&self, id: &str) -> DataResult<Option<T>> {
        match self.store.find_by_id(T::entity_type(), id).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    /// First record matching the filter under the visibility policy
    pub async fn find(&self, filter: &Filter) -> DataResult<Option<T>> {
        let predicate = self.visibility_predicate().and(filter.compile(&self.fields)?);
        let docs = self
            .store
            .query(
                T::entity_type(),
                &predicate,
                &SortSpec::default(),
                Some(Page { skip: 0, take: 1 }),
            )
            .await?;
        match docs.into_iter().next() {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    /// All records visible under the policy
    pub async fn get_list(&self) -> DataResult<Vec<T>> {
        self.query_list(self.visibility_predicate()).await
    }

    /// Visible records matching the filter
    pub async fn get_list_where(&self, filter: &Filter) -> DataResult<Vec<T>> {
        let predicate = self.visibility_predicate().and(filter.compile(&self.fields)?);
        self.query_list(predicate).await
    }

    /// Count of records visible under the policy
    pub async fn get_count(&self) -> DataResult<usize> {
        Ok(self
            .store
            .count(T::entity_type(), &self.visibility_predicate())
            .await?)
    }

    /// Count of visible records matching the filter
    pub async fn get_count_where(&self, filter: &Filter) -> DataResult<usize> {
        let predicate = self.visibility_predicate().and(filter.compile(&self.fields)?);
        Ok(self.store.count(T::entity_type(), &predicate).await?)
    }

    /// Execute a declarative paged query: visibility, then the request's
    /// filter, then the total count (before paging), then sort and page.
    pub async fn get_paged_list(
        &self,
        request: &DataSourceRequest,
    ) -> DataResult<DataSourceResult<T>> {
        let mut predicate = self.visibility_predicate();
        if let Some(filter) = &request.filter {
            predicate = predicate.and(filter.compile(&self.fields)?);
        }
        let order = compile_sorts(&request.sort, &self.fields, self.lenient_sort)?;

        let total = self.store.count(T::entity_type(), &predicate).await?;
        let page = (request.take > 0).then(|| Page {
            skip: request.skip.max(0) as usize,
            take: request.take as usize,
        });
        let docs = self
            .store
            .query(T::entity_type(), &predicate, &order, page)
            .await?;

        let mut data = Vec::with_capacity(docs.len());
        for doc in docs {
            data.push(serde_json::from_value(doc)?);
        }
        debug!(
            "Paged query on {} returned {} of {} record(s)",
            T::entity_type(),
            data.len(),
            total
        );
        Ok(DataSourceResult {
            data,
            total,
            aggregates: None,
        })
    }

    /// All history records for an entity id, oldest first
    pub async fn get_history(&self, id: &str) -> DataResult<Vec<EntityHistory>> {
        let entity_id = id.to_string();
        let predicate = Predicate::new(move |doc| {
            doc.get("entity_id").and_then(Value::as_str) == Some(entity_id.as_str())
        });
        let order = SortSpec::by("change_date", SortDirection::Ascending);
        let docs = self
            .store
            .query(HISTORY_COLLECTION, &predicate, &order, None)
            .await?;

        let mut history = Vec::with_capacity(docs.len());
        for doc in docs {
            history.push(serde_json::from_value(doc)?);
        }
        Ok(history)
    }

    /// Next business identifier: six-digit date stamp plus the atomically
    /// incremented per-type counter
    async fn next_xid(&self) -> DataResult<String> {
        let counter = self
            .store
            .increment(&format!("{}:xid", T::entity_type()))
            .await?;
        let stamp = self.clock.now().format("%y%m%d");
        Ok(format!("{stamp}{counter}"))
    }

    async fn save_history(
        &self,
        id: &str,
        changes: Vec<EntityChange>,
        change_date: chrono::DateTime<chrono::Utc>,
    ) -> DataResult<()> {
        let history = EntityHistory::new(T::entity_type(), id, changes, change_date, &self.user);
        self.store
            .create(HISTORY_COLLECTION, serde_json::to_value(&history)?)
            .await?;
        Ok(())
    }

    async fn query_list(&self, predicate: Predicate) -> DataResult<Vec<T>> {
        let docs = self
            .store
            .query(T::entity_type(), &predicate, &SortSpec::default(), None)
            .await?;
        let mut records = Vec::with_capacity(docs.len());
        for doc in docs {
            records.push(serde_json::from_value(doc)?);
        }
        Ok(records)
    }

    fn visibility_predicate(&self) -> Predicate {
        let deleted = self.visibility.deleted;
        let active = self.visibility.active;
        Predicate::new(move |doc| {
            doc.get("is_deleted").and_then(Value::as_bool) == Some(deleted)
                && doc.get("is_active").and_then(Value::as_bool) == Some(active)
        })
    }

    fn require_id(&self, id: Option<&str>) -> DataResult<String> {
        match id {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => Err(DataError::InvalidState(
                "id must be set for persisted entities".to_string(),
            )),
        }
    }

    async fn load_current(&self, id: &str) -> DataResult<Value> {
        self.store
            .find_by_id(T::entity_type(), id)
            .await?
            .ok_or_else(|| DataError::NotFound {
                entity_type: T::entity_type().to_string(),
                id: id.to_string(),
            })
    }

    fn check_version(&self, stored: u64, submitted: u64) -> DataResult<()> {
        if stored != submitted {
            return Err(DataError::VersionConflict {
                expected: submitted,
                actual: stored,
            });
        }
        Ok(())
    }

    /// Map store failures at the write point, where a vanished document
    /// means the record was removed between our load and the write
    fn mutation_error(&self, id: &str, err: StoreError) -> DataError {
        match err {
            StoreError::NotFound(_) => DataError::NotFound {
                entity_type: T::entity_type().to_string(),
                id: id.to_string(),
            },
            other => other.into(),
        }
    }
}

/// Builder for [`Repository`]
pub struct RepositoryBuilder<T: Persistable, S: DocumentStore> {
    store: Arc<S>,
    user: AuthUser,
    clock: Arc<dyn Clock>,
    visibility: Visibility,
    lenient_sort: bool,
    _record: PhantomData<fn() -> T>,
}

impl<T: Persistable, S: DocumentStore> RepositoryBuilder<T, S> {
    /// Acting principal stamped into audit fields
    pub fn user(mut self, user: AuthUser) -> Self {
        self.user = user;
        self
    }

    /// Clock supplying audit timestamps
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Read-time visibility policy
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Skip sort descriptors with unrecognized directions instead of
    /// rejecting the query (legacy wire behavior)
    pub fn lenient_sort(mut self, lenient: bool) -> Self {
        self.lenient_sort = lenient;
        self
    }

    /// Build the repository, compiling the record type's field registry
    pub fn build(self) -> Repository<T, S> {
        Repository {
            store: self.store,
            user: self.user,
            clock: self.clock,
            visibility: self.visibility,
            lenient_sort: self.lenient_sort,
            fields: FieldMap::of::<T>(),
            _record: PhantomData,
        }
    }
}
