// Copyright 2025 Cowboy AI, LLC.

//! Request context: acting principal, clock, and read-time visibility policy

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supplies the current time for audit stamping.
///
/// Process code uses [`SystemClock`]; tests pin time with [`FixedClock`].
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation of [`Clock`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A [`Clock`] frozen at a fixed instant, for deterministic audit stamps
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Identity of the acting principal for the current operation, echoed into
/// the audit fields of every record it touches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Principal identifier
    pub id: Option<String>,
    /// Originating IP address
    pub ip: Option<String>,
    /// Originating host name
    pub host: Option<String>,
    /// Trace correlation id
    pub trace_id: Option<String>,
}

impl AuthUser {
    /// Build a context for a named principal with no network details
    pub fn named(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }
}

/// Default read-time filter applied ahead of any caller-supplied predicate.
///
/// Every list, count, find, and paged query matches records whose
/// `is_deleted` and `is_active` flags equal these values. The default view
/// shows live records; `Visibility::deleted()` flips to the soft-deleted
/// view. Passed explicitly into the repository rather than held as
/// process-global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visibility {
    /// Required value of `is_deleted`
    pub deleted: bool,
    /// Required value of `is_active`
    pub active: bool,
}

impl Default for Visibility {
    fn default() -> Self {
        Self {
            deleted: false,
            active: true,
        }
    }
}

impl Visibility {
    /// The soft-deleted view: records that have been deleted while active
    pub fn deleted() -> Self {
        Self {
            deleted: true,
            active: true,
        }
    }
}
