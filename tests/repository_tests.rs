//! Repository lifecycle, concurrency, visibility, history, and paging
//! behavior over the in-process document store

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use xdata_access::{
    AuthUser, DataError, DataSourceRequest, Entity, Filter, FixedClock, MemoryStore, Persistable,
    Repository, Sort, Visibility,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
struct Customer {
    #[serde(flatten)]
    entity: Entity,
    name: String,
    age: i64,
    email: Option<String>,
}

impl Persistable for Customer {
    fn entity_type() -> &'static str {
        "customer"
    }

    fn entity(&self) -> &Entity {
        &self.entity
    }

    fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }
}

fn test_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap()
}

fn repository(store: &Arc<MemoryStore>) -> Repository<Customer, MemoryStore> {
    repository_at(store, test_instant())
}

fn repository_at(
    store: &Arc<MemoryStore>,
    instant: DateTime<Utc>,
) -> Repository<Customer, MemoryStore> {
    Repository::builder(Arc::clone(store))
        .user(AuthUser::named("tester"))
        .clock(Arc::new(FixedClock(instant)))
        .build()
}

fn customer(name: &str, age: i64) -> Customer {
    Customer {
        name: name.to_string(),
        age,
        email: Some(format!("{name}@example.com")),
        ..Default::default()
    }
}

#[tokio::test]
async fn insert_assigns_version_zero_and_a_dated_xid() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let mut ada = customer("ada", 36);
    let id = repo.insert(&mut ada).await.unwrap();

    assert_eq!(ada.entity.id.as_deref(), Some(id.as_str()));
    assert_eq!(ada.entity.entity_version, 0);
    assert_eq!(ada.entity.xid.as_deref(), Some("2601151"));
    assert!(ada.entity.is_active);
    assert!(!ada.entity.is_deleted);
    assert_eq!(ada.entity.created_by.as_deref(), Some("tester"));
    assert_eq!(ada.entity.create_date, Some(test_instant()));
    assert_eq!(ada.entity.modified_by, None);

    // A fresh read returns the same business identifier
    let stored = repo.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(stored.entity.xid, ada.entity.xid);
}

#[tokio::test]
async fn xid_counter_advances_per_insert() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let mut first = customer("a", 20);
    let mut second = customer("b", 21);
    repo.insert(&mut first).await.unwrap();
    repo.insert(&mut second).await.unwrap();

    assert_eq!(first.entity.xid.as_deref(), Some("2601151"));
    assert_eq!(second.entity.xid.as_deref(), Some("2601152"));
}

#[tokio::test]
async fn n_updates_produce_version_n() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let mut ada = customer("ada", 36);
    repo.insert(&mut ada).await.unwrap();

    for step in 1..=3 {
        ada.age += 1;
        repo.update(&mut ada).await.unwrap();
        assert_eq!(ada.entity.entity_version, step);
    }

    let stored = repo.find_by_id(ada.entity.id.as_ref().unwrap()).await.unwrap().unwrap();
    assert_eq!(stored.entity.entity_version, 3);
    assert_eq!(stored.age, 39);
}

#[tokio::test]
async fn stale_version_update_is_a_conflict() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let mut ada = customer("ada", 36);
    let id = repo.insert(&mut ada).await.unwrap();

    let mut first_copy = repo.find_by_id(&id).await.unwrap().unwrap();
    let mut second_copy = repo.find_by_id(&id).await.unwrap().unwrap();

    first_copy.age = 37;
    repo.update(&mut first_copy).await.unwrap();

    second_copy.age = 40;
    let err = repo.update(&mut second_copy).await.unwrap_err();
    assert!(err.is_conflict());
    assert!(matches!(
        err,
        DataError::VersionConflict {
            expected: 0,
            actual: 1
        }
    ));
}

#[tokio::test]
async fn xid_mismatch_is_a_conflict_not_a_silent_overwrite() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let mut ada = customer("ada", 36);
    let id = repo.insert(&mut ada).await.unwrap();

    let mut tampered = repo.find_by_id(&id).await.unwrap().unwrap();
    tampered.entity.xid = Some("9912999".to_string());

    let err = repo.update(&mut tampered).await.unwrap_err();
    assert!(matches!(err, DataError::IdentityConflict { .. }));
    assert!(err.is_conflict());
}

#[tokio::test]
async fn update_of_an_unknown_id_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let mut ghost = customer("ghost", 1);
    ghost.entity.id = Some("no-such-id".to_string());

    let err = repo.update(&mut ghost).await.unwrap_err();
    assert!(matches!(err, DataError::NotFound { .. }));
}

#[tokio::test]
async fn soft_delete_keeps_the_record_reachable_by_id() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let mut ada = customer("ada", 36);
    let id = repo.insert(&mut ada).await.unwrap();
    repo.delete(&ada).await.unwrap();

    // Bypassing visibility the record is still there, marked deleted
    let stored = repo.find_by_id(&id).await.unwrap().unwrap();
    assert!(stored.entity.is_deleted);
    assert_eq!(stored.entity.deleted_by.as_deref(), Some("tester"));
    assert_eq!(stored.entity.delete_date, Some(test_instant()));

    // But the live view no longer lists it
    assert!(repo.get_list().await.unwrap().is_empty());
    assert_eq!(repo.get_count().await.unwrap(), 0);

    // The deleted view does
    let deleted_view = Repository::<Customer, _>::builder(Arc::clone(&store))
        .visibility(Visibility::deleted())
        .build();
    assert_eq!(deleted_view.get_count().await.unwrap(), 1);
}

#[tokio::test]
async fn delete_persists_the_loaded_record_not_the_callers_payload() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let mut ada = customer("ada", 36);
    let id = repo.insert(&mut ada).await.unwrap();

    // Attempt to smuggle a field change through the delete call
    ada.name = "renamed".to_string();
    ada.age = 1;
    repo.delete(&ada).await.unwrap();

    let stored = repo.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(stored.name, "ada");
    assert_eq!(stored.age, 36);
    assert!(stored.entity.is_deleted);
}

#[tokio::test]
async fn stale_version_delete_is_a_conflict() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let mut ada = customer("ada", 36);
    repo.insert(&mut ada).await.unwrap();

    let stale = ada.clone();
    ada.age = 37;
    repo.update(&mut ada).await.unwrap();

    let err = repo.delete(&stale).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn updating_a_deleted_record_requires_restore_first() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let mut ada = customer("ada", 36);
    let id = repo.insert(&mut ada).await.unwrap();
    repo.delete(&ada).await.unwrap();

    // A plain update does not revive the record
    let mut stale = repo.find_by_id(&id).await.unwrap().unwrap();
    stale.age = 40;
    let err = repo.update(&mut stale).await.unwrap_err();
    assert!(matches!(err, DataError::InvalidState(_)));

    // Restore with the current version, then updates flow again
    let deleted = repo.find_by_id(&id).await.unwrap().unwrap();
    repo.restore(&deleted).await.unwrap();

    let mut restored = repo.find_by_id(&id).await.unwrap().unwrap();
    assert!(!restored.entity.is_deleted);
    assert_eq!(restored.entity.deleted_by, None);
    restored.age = 40;
    repo.update(&mut restored).await.unwrap();
}

#[tokio::test]
async fn restoring_a_live_record_is_invalid_state() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let mut ada = customer("ada", 36);
    repo.insert(&mut ada).await.unwrap();

    let err = repo.restore(&ada).await.unwrap_err();
    assert!(matches!(err, DataError::InvalidState(_)));
}

#[tokio::test]
async fn history_is_recorded_only_on_actual_change() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let mut ada = customer("ada", 36);
    let id = repo.insert(&mut ada).await.unwrap();

    // Insert alone produces no history
    assert!(repo.get_history(&id).await.unwrap().is_empty());

    // An update that changes nothing domain-visible produces none either
    let mut unchanged = repo.find_by_id(&id).await.unwrap().unwrap();
    repo.update(&mut unchanged).await.unwrap();
    assert!(repo.get_history(&id).await.unwrap().is_empty());

    // One changed field produces exactly one entry with one change
    let mut changed = repo.find_by_id(&id).await.unwrap().unwrap();
    changed.age = 37;
    repo.update(&mut changed).await.unwrap();

    let history = repo.get_history(&id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].entity_type, "customer");
    assert_eq!(history[0].entity_id, id);
    assert_eq!(history[0].user_id.as_deref(), Some("tester"));
    assert_eq!(history[0].changes.len(), 1);
    assert_eq!(history[0].changes[0].name, "age");
    assert_eq!(history[0].changes[0].old_value.as_deref(), Some("36"));
    assert_eq!(history[0].changes[0].new_value.as_deref(), Some("37"));
}

#[tokio::test]
async fn history_reads_back_oldest_first() {
    let store = Arc::new(MemoryStore::new());

    let repo_day_one = repository_at(&store, Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap());
    let repo_day_two = repository_at(&store, Utc.with_ymd_and_hms(2026, 1, 16, 9, 0, 0).unwrap());

    let mut ada = customer("ada", 36);
    let id = repo_day_one.insert(&mut ada).await.unwrap();

    ada.age = 37;
    repo_day_one.update(&mut ada).await.unwrap();
    ada.name = "ada lovelace".to_string();
    repo_day_two.update(&mut ada).await.unwrap();

    let history = repo_day_one.get_history(&id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].change_date < history[1].change_date);
    assert_eq!(history[0].changes[0].name, "age");
    assert_eq!(history[1].changes[0].name, "name");
}

#[tokio::test]
async fn restore_leaves_an_audit_trail() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let mut ada = customer("ada", 36);
    let id = repo.insert(&mut ada).await.unwrap();
    repo.delete(&ada).await.unwrap();

    let deleted = repo.find_by_id(&id).await.unwrap().unwrap();
    repo.restore(&deleted).await.unwrap();

    let history = repo.get_history(&id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].changes[0].name, "is_deleted");
    assert_eq!(history[0].changes[0].old_value.as_deref(), Some("true"));
    assert_eq!(history[0].changes[0].new_value.as_deref(), Some("false"));
}

#[tokio::test]
async fn paged_total_counts_before_paging() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    for i in 0..25 {
        let mut c = customer(&format!("c{i:02}"), 20 + i);
        repo.insert(&mut c).await.unwrap();
    }

    let request: DataSourceRequest = serde_json::from_value(json!({
        "take": 10,
        "skip": 20,
        "sort": [{"field": "age", "dir": "asc"}]
    }))
    .unwrap();

    let result = repo.get_paged_list(&request).await.unwrap();
    assert_eq!(result.total, 25);
    assert_eq!(result.data.len(), 5);
    assert_eq!(result.data[0].age, 40);
    assert!(result.aggregates.is_none());
}

#[tokio::test]
async fn non_positive_take_disables_paging() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    for i in 0..5 {
        let mut c = customer(&format!("c{i}"), 20 + i);
        repo.insert(&mut c).await.unwrap();
    }

    let request = DataSourceRequest {
        take: 0,
        skip: 3,
        sort: vec![Sort::new("age", "desc")],
        ..Default::default()
    };

    let result = repo.get_paged_list(&request).await.unwrap();
    assert_eq!(result.data.len(), 5);
    assert_eq!(result.total, 5);
    assert_eq!(result.data[0].age, 24);
}

#[tokio::test]
async fn paged_query_filters_before_counting() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    for age in [15, 20, 25, 30, 35] {
        let mut c = customer(&format!("c{age}"), age);
        repo.insert(&mut c).await.unwrap();
    }

    let request = DataSourceRequest {
        take: 2,
        skip: 0,
        sort: vec![Sort::new("age", "desc")],
        filter: Some(Filter::new("age", "gte", json!(18))),
        ..Default::default()
    };

    let result = repo.get_paged_list(&request).await.unwrap();
    assert_eq!(result.total, 4);
    assert_eq!(result.data.len(), 2);
    assert_eq!(result.data[0].age, 35);
    assert_eq!(result.data[1].age, 30);
}

#[tokio::test]
async fn repeated_reads_return_identical_ordered_content() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    for i in 0..10 {
        let mut c = customer(&format!("c{i}"), 20 + i);
        repo.insert(&mut c).await.unwrap();
    }

    let ids = |list: Vec<Customer>| -> Vec<String> {
        list.into_iter().map(|c| c.entity.id.unwrap()).collect()
    };
    let first = ids(repo.get_list().await.unwrap());
    let second = ids(repo.get_list().await.unwrap());
    assert_eq!(first, second);
    assert_eq!(first.len(), 10);
}

#[tokio::test]
async fn find_returns_the_first_visible_match() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let mut live = customer("ada", 36);
    repo.insert(&mut live).await.unwrap();
    let mut gone = customer("ada", 99);
    repo.insert(&mut gone).await.unwrap();
    repo.delete(&gone).await.unwrap();

    let found = repo
        .find(&Filter::new("name", "eq", json!("ada")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.age, 36);

    let missing = repo
        .find(&Filter::new("name", "eq", json!("grace")))
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn filtered_list_and_count_respect_visibility() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let mut adult = customer("adult", 30);
    repo.insert(&mut adult).await.unwrap();
    let mut minor = customer("minor", 12);
    repo.insert(&mut minor).await.unwrap();
    let mut deleted_adult = customer("gone", 50);
    repo.insert(&mut deleted_adult).await.unwrap();
    repo.delete(&deleted_adult).await.unwrap();

    let adults = Filter::new("age", "gte", json!(18));
    let list = repo.get_list_where(&adults).await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].name, "adult");
    assert_eq!(repo.get_count_where(&adults).await.unwrap(), 1);
}

#[tokio::test]
async fn concurrent_updates_admit_exactly_one_winner() {
    let store = Arc::new(MemoryStore::new());
    let repo = Arc::new(repository(&store));

    let mut ada = customer("ada", 36);
    let id = repo.insert(&mut ada).await.unwrap();

    // Everyone loads version 0 up front, so exactly one update can land
    let mut copies = Vec::new();
    for i in 0..8 {
        let mut copy = repo.find_by_id(&id).await.unwrap().unwrap();
        copy.age = 40 + i;
        copies.push(copy);
    }

    let mut handles = Vec::new();
    for mut copy in copies {
        let repo = Arc::clone(&repo);
        handles.push(tokio::spawn(async move { repo.update(&mut copy).await }));
    }

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => wins += 1,
            Err(err) => assert!(err.is_conflict()),
        }
    }
    assert_eq!(wins, 1);

    let stored = repo.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(stored.entity.entity_version, 1);
}
