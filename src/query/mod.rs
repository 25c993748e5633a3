// Copyright 2025 Cowboy AI, LLC.

//! # Query Layer
//!
//! Compiles ad-hoc, loosely-typed query descriptors into type-safe
//! predicates and orderings over a record type.
//!
//! ## Components
//!
//! - **Field registry**: per-type path-to-kind map derived from the record's
//!   JSON schema, validated ahead of any store access
//! - **Filter compiler**: recursive descriptor tree to [`Predicate`]
//! - **Sort compiler**: descriptor list to a stable composite [`SortSpec`]
//! - **Envelope**: [`DataSourceRequest`] / [`DataSourceResult`] paging shapes
//!
//! Compilation is pure: no state, no I/O, and every malformed descriptor is
//! rejected before the store sees the query.

pub mod filter;
pub mod request;
pub mod schema;
pub mod sort;

pub use filter::{Filter, FilterOperator, Predicate};
pub use request::{Aggregator, DataSourceRequest, DataSourceResult};
pub use schema::{FieldKind, FieldMap};
pub use sort::{compile_sorts, Sort, SortDirection, SortSpec};

use serde_json::Value;

/// Walk a dot-separated path through nested JSON objects
pub(crate) fn value_at<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn value_at_walks_nested_objects() {
        let doc = json!({"address": {"city": "austin", "geo": {"lat": 30.27}}});

        assert_eq!(value_at(&doc, "address.city"), Some(&json!("austin")));
        assert_eq!(value_at(&doc, "address.geo.lat"), Some(&json!(30.27)));
        assert_eq!(value_at(&doc, "address.state"), None);
        assert_eq!(value_at(&doc, "address.city.block"), None);
    }
}
