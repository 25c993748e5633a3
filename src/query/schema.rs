// Copyright 2025 Cowboy AI, LLC.

//! Per-type field registry for the filter and sort compilers
//!
//! String field paths arriving in query descriptors must be validated and
//! typed before any predicate is built. Rather than reflecting at match time,
//! the registry is derived once per record type from its generated JSON
//! schema: every (possibly nested) property path maps to a type tag the
//! compilers use for validation and literal coercion.

use indexmap::IndexMap;
use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, RootSchema, Schema, SchemaObject, SingleOrVec};
use schemars::JsonSchema;

/// Nested object paths deeper than this are not registered
const MAX_NESTING: usize = 8;

/// Static type tag for a resolvable field path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// UTF-8 text
    String,
    /// Integral number
    Integer,
    /// Floating-point number
    Float,
    /// Boolean flag
    Bool,
    /// RFC 3339 timestamp
    DateTime,
    /// Nested object; not directly comparable, but traversable and
    /// nullability-testable
    Object,
    /// Arrays and anything else without comparison semantics
    Other,
}

impl FieldKind {
    /// Whether `lt`/`lte`/`gt`/`gte`/`between` make sense for this kind
    pub fn is_orderable(self) -> bool {
        matches!(
            self,
            FieldKind::String | FieldKind::Integer | FieldKind::Float | FieldKind::DateTime
        )
    }

    /// Whether `eq`/`neq` make sense for this kind
    pub fn is_comparable(self) -> bool {
        !matches!(self, FieldKind::Object | FieldKind::Other)
    }
}

/// Registry of every resolvable field path on a record type.
///
/// Built once from the type's `JsonSchema` and consulted by both the filter
/// and sort compilers, so malformed paths fail before any store access.
#[derive(Debug, Clone)]
pub struct FieldMap {
    fields: IndexMap<String, FieldKind>,
}

impl FieldMap {
    /// Build the registry for a record type
    pub fn of<T: JsonSchema>() -> Self {
        let root = SchemaGenerator::default().into_root_schema_for::<T>();
        let mut fields = IndexMap::new();
        collect_object(&root.schema, "", &root, &mut fields, 0);
        Self { fields }
    }

    /// Resolve a dot-separated path to its type tag
    pub fn resolve(&self, path: &str) -> Option<FieldKind> {
        self.fields.get(path).copied()
    }

    /// All registered paths, in declaration order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of registered paths
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Follow `$ref` chains and unwrap nullable `anyOf`/`oneOf` wrappers until a
/// concrete schema object is reached
fn deref<'a>(obj: &'a SchemaObject, root: &'a RootSchema) -> &'a SchemaObject {
    let mut current = obj;
    for _ in 0..MAX_NESTING {
        if let Some(reference) = &current.reference {
            let name = reference.rsplit('/').next().unwrap_or(reference);
            if let Some(Schema::Object(target)) = root.definitions.get(name) {
                current = target;
                continue;
            }
            break;
        }
        if let Some(sub) = &current.subschemas {
            let variants = sub.any_of.as_ref().or(sub.one_of.as_ref());
            if let Some(inner) = variants.and_then(|v| {
                v.iter().find_map(|s| match s {
                    Schema::Object(o) if !is_null_schema(o) => Some(o),
                    _ => None,
                })
            }) {
                current = inner;
                continue;
            }
        }
        break;
    }
    current
}

fn is_null_schema(obj: &SchemaObject) -> bool {
    matches!(
        &obj.instance_type,
        Some(SingleOrVec::Single(t)) if **t == InstanceType::Null
    )
}

fn primary_type(obj: &SchemaObject) -> Option<InstanceType> {
    match &obj.instance_type {
        Some(SingleOrVec::Single(t)) if **t != InstanceType::Null => Some(**t),
        Some(SingleOrVec::Vec(types)) => types
            .iter()
            .copied()
            .find(|t| *t != InstanceType::Null),
        _ => None,
    }
}

fn kind_of(obj: &SchemaObject) -> FieldKind {
    if obj.format.as_deref() == Some("date-time") {
        return FieldKind::DateTime;
    }
    match primary_type(obj) {
        Some(InstanceType::String) => FieldKind::String,
        Some(InstanceType::Integer) => FieldKind::Integer,
        Some(InstanceType::Number) => FieldKind::Float,
        Some(InstanceType::Boolean) => FieldKind::Bool,
        Some(InstanceType::Object) => FieldKind::Object,
        Some(InstanceType::Array) => FieldKind::Other,
        _ => {
            if obj.object.is_some() {
                FieldKind::Object
            } else {
                FieldKind::Other
            }
        }
    }
}

fn collect_object(
    obj: &SchemaObject,
    prefix: &str,
    root: &RootSchema,
    fields: &mut IndexMap<String, FieldKind>,
    depth: usize,
) {
    let obj = deref(obj, root);

    // Flattened embeds may arrive as allOf parts
    if let Some(sub) = &obj.subschemas {
        if let Some(parts) = &sub.all_of {
            for part in parts {
                if let Schema::Object(part) = part {
                    collect_object(part, prefix, root, fields, depth);
                }
            }
        }
    }

    let Some(validation) = &obj.object else {
        return;
    };
    for (name, schema) in &validation.properties {
        let Schema::Object(prop) = schema else {
            continue;
        };
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        let resolved = deref(prop, root);
        let kind = kind_of(resolved);
        fields.insert(path.clone(), kind);
        if kind == FieldKind::Object && depth < MAX_NESTING {
            collect_object(resolved, &path, root, fields, depth + 1);
        }
    }
}
