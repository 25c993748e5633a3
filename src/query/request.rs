// Copyright 2025 Cowboy AI, LLC.

//! Query envelope: paged request descriptor and materialized result

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::filter::Filter;
use crate::query::sort::Sort;

/// Declarative paged-query request: paging window, composite sort, and an
/// optional root filter.
///
/// A `take` of zero or less disables paging entirely; the full filtered,
/// sorted result is returned and `skip` is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSourceRequest {
    /// Page size; `<= 0` disables paging
    #[serde(default)]
    pub take: i64,
    /// Records to skip before the page starts
    #[serde(default)]
    pub skip: i64,
    /// Composite sort, first descriptor is the primary key
    #[serde(default)]
    pub sort: Vec<Sort>,
    /// Root filter descriptor
    #[serde(default)]
    pub filter: Option<Filter>,
    /// Requested aggregates; accepted for wire compatibility, not computed
    #[serde(default)]
    pub aggregates: Vec<Aggregator>,
}

/// Aggregate request placeholder carried by the wire envelope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Aggregator {
    /// Field to aggregate over
    #[serde(default)]
    pub field: String,
    /// Aggregate function name
    #[serde(default)]
    pub aggregate: String,
}

/// Result of a paged query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceResult<T> {
    /// The materialized page
    pub data: Vec<T>,
    /// Count after filtering but before paging
    pub total: usize,
    /// Aggregate results; always `None` until aggregate computation lands
    pub aggregates: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_deserializes_from_sparse_wire_payload() {
        let request: DataSourceRequest = serde_json::from_value(json!({
            "take": 10,
            "skip": 20,
            "sort": [{"field": "name", "dir": "asc"}],
            "filter": {"field": "age", "operator": "gte", "value": 18}
        }))
        .unwrap();

        assert_eq!(request.take, 10);
        assert_eq!(request.skip, 20);
        assert_eq!(request.sort.len(), 1);
        assert_eq!(request.filter.as_ref().unwrap().field, "age");
        assert!(request.aggregates.is_empty());
    }

    #[test]
    fn empty_payload_means_unpaged_unfiltered() {
        let request: DataSourceRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(request.take, 0);
        assert!(request.filter.is_none());
        assert!(request.sort.is_empty());
    }
}
