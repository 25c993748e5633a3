// Copyright 2025 Cowboy AI, LLC.

//! Recursive filter descriptors and their compilation into predicates
//!
//! Descriptors arrive from the wire with loosely-typed operator, logic, and
//! value fields. Compilation resolves each field path against the record
//! type's [`FieldMap`], coerces the literal to the field's static kind, and
//! produces a pure predicate over the serialized document. Malformed
//! descriptors fail here, before any store access.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{DataError, DataResult};
use crate::query::schema::{FieldKind, FieldMap};
use crate::query::value_at;

/// Boolean predicate over a serialized document.
///
/// This is the shared language between the filter compiler, the repository's
/// visibility pre-filter, and the document store's query operation.
#[derive(Clone)]
pub struct Predicate {
    test: Arc<dyn Fn(&Value) -> bool + Send + Sync>,
}

impl Predicate {
    /// Wrap a closure as a predicate
    pub fn new(test: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self {
            test: Arc::new(test),
        }
    }

    /// Predicate matching every document
    pub fn always() -> Self {
        Self::new(|_| true)
    }

    /// Evaluate against a document
    pub fn matches(&self, doc: &Value) -> bool {
        (self.test)(doc)
    }

    /// Conjunction with another predicate
    pub fn and(self, other: Predicate) -> Self {
        Self::new(move |doc| self.matches(doc) && other.matches(doc))
    }

    /// Disjunction with another predicate
    pub fn or(self, other: Predicate) -> Self {
        Self::new(move |doc| self.matches(doc) || other.matches(doc))
    }

    /// Negation
    pub fn not(self) -> Self {
        Self::new(move |doc| !self.matches(doc))
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate")
    }
}

/// Comparison operators recognized in filter descriptors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equal
    Eq,
    /// Not equal
    Neq,
    /// Less than
    Lt,
    /// Less than or equal
    Lte,
    /// Greater than
    Gt,
    /// Greater than or equal
    Gte,
    /// String prefix match
    StartsWith,
    /// String suffix match
    EndsWith,
    /// Substring match
    Contains,
    /// Negated substring match
    DoesNotContain,
    /// Inclusive range test against a two-element value
    Between,
    /// Field is null or absent
    IsNull,
    /// Field is present and non-null
    IsNotNull,
}

impl FilterOperator {
    /// Parse a wire operator key, case-insensitively
    pub fn parse(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "eq" => Some(Self::Eq),
            "neq" => Some(Self::Neq),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "startswith" => Some(Self::StartsWith),
            "endswith" => Some(Self::EndsWith),
            "contains" => Some(Self::Contains),
            "doesnotcontain" => Some(Self::DoesNotContain),
            "between" => Some(Self::Between),
            "isnull" => Some(Self::IsNull),
            "isnotnull" => Some(Self::IsNotNull),
            _ => None,
        }
    }
}

/// How a child filter combines with the accumulated predicate of its
/// preceding siblings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Logic {
    And,
    Or,
}

fn parse_logic(logic: Option<&str>) -> DataResult<Logic> {
    match logic {
        None => Ok(Logic::And),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "and" => Ok(Logic::And),
            "or" => Ok(Logic::Or),
            other => Err(DataError::Query(format!("unknown logic: {other}"))),
        },
    }
}

/// Declarative query condition, either a leaf comparison or a group of
/// child filters.
///
/// A descriptor with a non-empty `filters` list ignores its own
/// `field`/`operator`/`value` and folds its children instead: the first
/// child seeds the accumulator and each subsequent child's own `logic`
/// decides whether it is conjoined or disjoined with the running result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Filter {
    /// Dot-separated field path, e.g. `address.city`
    #[serde(default)]
    pub field: String,
    /// Operator key from the set in [`FilterOperator`]
    #[serde(default)]
    pub operator: String,
    /// Loosely-typed literal to compare against
    #[serde(default)]
    pub value: Value,
    /// Combination logic relative to preceding siblings (`and`/`or`)
    #[serde(default)]
    pub logic: Option<String>,
    /// Child descriptors; non-empty makes this a group node
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl Filter {
    /// Leaf comparison descriptor
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value,
            logic: None,
            filters: Vec::new(),
        }
    }

    /// Group descriptor folding the given children
    pub fn group(filters: Vec<Filter>) -> Self {
        Self {
            filters,
            ..Default::default()
        }
    }

    /// Set this descriptor's combination logic
    pub fn with_logic(mut self, logic: impl Into<String>) -> Self {
        self.logic = Some(logic.into());
        self
    }

    /// Compile into a predicate over serialized documents of the target type
    pub fn compile(&self, fields: &FieldMap) -> DataResult<Predicate> {
        let mut children = self.filters.iter();
        let Some(first) = children.next() else {
            return self.compile_leaf(fields);
        };
        let mut acc = first.compile(fields)?;
        for child in children {
            let compiled = child.compile(fields)?;
            acc = match parse_logic(child.logic.as_deref())? {
                Logic::And => acc.and(compiled),
                Logic::Or => acc.or(compiled),
            };
        }
        Ok(acc)
    }

    fn compile_leaf(&self, fields: &FieldMap) -> DataResult<Predicate> {
        if self.field.is_empty() {
            return Err(DataError::Query(
                "leaf filter requires a non-empty field".to_string(),
            ));
        }
        let operator = FilterOperator::parse(&self.operator).ok_or_else(|| {
            DataError::Query(format!("unknown operator: {}", self.operator))
        })?;
        let kind = fields
            .resolve(&self.field)
            .ok_or_else(|| DataError::Schema(format!("unknown field path: {}", self.field)))?;
        let path = self.field.clone();

        match operator {
            FilterOperator::IsNull => Ok(Predicate::new(move |doc| {
                value_at(doc, &path).map_or(true, Value::is_null)
            })),
            FilterOperator::IsNotNull => Ok(Predicate::new(move |doc| {
                value_at(doc, &path).is_some_and(|v| !v.is_null())
            })),
            FilterOperator::StartsWith
            | FilterOperator::EndsWith
            | FilterOperator::Contains
            | FilterOperator::DoesNotContain => {
                if kind != FieldKind::String {
                    return Err(DataError::Query(format!(
                        "operator {} requires a string field, but {} is not one",
                        self.operator, self.field
                    )));
                }
                let needle = match coerce_literal(&self.value, kind, &self.field)? {
                    Scalar::Str(s) => s,
                    _ => {
                        return Err(DataError::Query(format!(
                            "operator {} requires a string value",
                            self.operator
                        )))
                    }
                };
                let matched = Predicate::new(move |doc| {
                    let Some(text) = value_at(doc, &path).and_then(Value::as_str) else {
                        return false;
                    };
                    match operator {
                        FilterOperator::StartsWith => text.starts_with(&needle),
                        FilterOperator::EndsWith => text.ends_with(&needle),
                        _ => text.contains(&needle),
                    }
                });
                if operator == FilterOperator::DoesNotContain {
                    Ok(matched.not())
                } else {
                    Ok(matched)
                }
            }
            FilterOperator::Eq | FilterOperator::Neq => {
                if !kind.is_comparable() {
                    return Err(DataError::Query(format!(
                        "field {} does not support comparison",
                        self.field
                    )));
                }
                let literal = coerce_literal(&self.value, kind, &self.field)?;
                let equal = Predicate::new(move |doc| {
                    doc_scalar(doc, &path, kind)
                        .is_some_and(|v| scalar_cmp(&v, &literal) == Some(Ordering::Equal))
                });
                if operator == FilterOperator::Neq {
                    Ok(equal.not())
                } else {
                    Ok(equal)
                }
            }
            FilterOperator::Lt | FilterOperator::Lte | FilterOperator::Gt | FilterOperator::Gte => {
                if !kind.is_orderable() {
                    return Err(DataError::Query(format!(
                        "operator {} is not supported on field {}",
                        self.operator, self.field
                    )));
                }
                let literal = coerce_literal(&self.value, kind, &self.field)?;
                Ok(Predicate::new(move |doc| {
                    let Some(ordering) =
                        doc_scalar(doc, &path, kind).and_then(|v| scalar_cmp(&v, &literal))
                    else {
                        return false;
                    };
                    match operator {
                        FilterOperator::Lt => ordering == Ordering::Less,
                        FilterOperator::Lte => ordering != Ordering::Greater,
                        FilterOperator::Gt => ordering == Ordering::Greater,
                        _ => ordering != Ordering::Less,
                    }
                }))
            }
            FilterOperator::Between => {
                if !kind.is_orderable() {
                    return Err(DataError::Query(format!(
                        "operator between is not supported on field {}",
                        self.field
                    )));
                }
                let Value::Array(bounds) = &self.value else {
                    return Err(DataError::Query(
                        "between requires a two-element array value".to_string(),
                    ));
                };
                if bounds.len() != 2 {
                    return Err(DataError::Query(
                        "between requires a two-element array value".to_string(),
                    ));
                }
                let low = coerce_literal(&bounds[0], kind, &self.field)?;
                let high = coerce_literal(&bounds[1], kind, &self.field)?;
                Ok(Predicate::new(move |doc| {
                    let Some(value) = doc_scalar(doc, &path, kind) else {
                        return false;
                    };
                    let above = scalar_cmp(&value, &low)
                        .is_some_and(|ordering| ordering != Ordering::Less);
                    let below = scalar_cmp(&value, &high)
                        .is_some_and(|ordering| ordering != Ordering::Greater);
                    above && below
                }))
            }
        }
    }
}

/// Typed literal after coercion to a field's static kind
#[derive(Debug, Clone, PartialEq)]
enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(DateTime<Utc>),
}

fn coerce_literal(value: &Value, kind: FieldKind, field: &str) -> DataResult<Scalar> {
    let coerced = match kind {
        FieldKind::String => match value {
            Value::String(s) => Some(Scalar::Str(s.clone())),
            Value::Number(n) => Some(Scalar::Str(n.to_string())),
            Value::Bool(b) => Some(Scalar::Str(b.to_string())),
            _ => None,
        },
        FieldKind::Integer => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(Scalar::Int),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Scalar::Int),
            _ => None,
        },
        FieldKind::Float => match value {
            Value::Number(n) => n.as_f64().map(Scalar::Float),
            Value::String(s) => s.trim().parse::<f64>().ok().map(Scalar::Float),
            _ => None,
        },
        FieldKind::Bool => match value {
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Some(Scalar::Bool(true)),
                "false" => Some(Scalar::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        FieldKind::DateTime => match value {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| Scalar::DateTime(dt.with_timezone(&Utc))),
            _ => None,
        },
        FieldKind::Object | FieldKind::Other => None,
    };
    coerced.ok_or_else(|| {
        DataError::Query(format!(
            "cannot coerce {value} to the type of field {field}"
        ))
    })
}

/// Read the document value at `path` as a scalar of the registered kind.
/// Returns `None` when the value is absent, null, or of an unexpected shape.
fn doc_scalar(doc: &Value, path: &str, kind: FieldKind) -> Option<Scalar> {
    let value = value_at(doc, path)?;
    match kind {
        FieldKind::String => value.as_str().map(|s| Scalar::Str(s.to_string())),
        FieldKind::Integer => value.as_i64().map(Scalar::Int),
        FieldKind::Float => value.as_f64().map(Scalar::Float),
        FieldKind::Bool => value.as_bool().map(Scalar::Bool),
        FieldKind::DateTime => value.as_str().and_then(|s| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| Scalar::DateTime(dt.with_timezone(&Utc)))
        }),
        FieldKind::Object | FieldKind::Other => None,
    }
}

fn scalar_cmp(a: &Scalar, b: &Scalar) -> Option<Ordering> {
    match (a, b) {
        (Scalar::Int(a), Scalar::Int(b)) => Some(a.cmp(b)),
        (Scalar::Int(a), Scalar::Float(b)) => (*a as f64).partial_cmp(b),
        (Scalar::Float(a), Scalar::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Scalar::Float(a), Scalar::Float(b)) => a.partial_cmp(b),
        (Scalar::Str(a), Scalar::Str(b)) => Some(a.cmp(b)),
        (Scalar::Bool(a), Scalar::Bool(b)) => Some(a.cmp(b)),
        (Scalar::DateTime(a), Scalar::DateTime(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
