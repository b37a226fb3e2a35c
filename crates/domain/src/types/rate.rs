//! Hourly-rate domain types
//!
//! A rate assignment is scoped: a global default for the user, or an override
//! for a specific queue or project. More specific scopes win outright during
//! resolution. Records are never mutated or deleted; corrections supersede
//! the previous active record.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::TracklaneError;

/// How specific a rate assignment is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateScope {
    Global,
    Queue,
    Project,
}

impl RateScope {
    /// Stable string form used in composite keys and database columns.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Queue => "queue",
            Self::Project => "project",
        }
    }

    /// Whether this scope requires a context key (queue key or project id).
    #[must_use]
    pub fn requires_context(&self) -> bool {
        !matches!(self, Self::Global)
    }
}

impl fmt::Display for RateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RateScope {
    type Err = TracklaneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(Self::Global),
            "queue" => Ok(Self::Queue),
            "project" => Ok(Self::Project),
            other => Err(TracklaneError::InvalidInput(format!("unknown rate scope: {other}"))),
        }
    }
}

/// One historical assignment of an hourly rate to a user within a scope.
///
/// Invariant: at most one record per (user_id, scope, context_key) tuple has
/// `is_active = true` at any time. The mutation protocol enforces this by
/// deactivating the prior active record in the same transaction that inserts
/// the new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateRecord {
    pub id: String,
    pub user_id: String,
    pub scope: RateScope,
    /// Queue key or project id; `None` for global-scoped records.
    pub context_key: Option<String>,
    pub amount: f64,
    pub comment: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A requested rate assignment, validated at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateChange {
    pub user_id: String,
    pub scope: RateScope,
    pub context_key: Option<String>,
    pub amount: f64,
    pub comment: Option<String>,
}

impl RateChange {
    /// Build a validated change request.
    ///
    /// # Errors
    /// Returns `InvalidInput` when the amount is negative, when a queue or
    /// project scope is missing its context key, or when a global scope
    /// carries one.
    pub fn new(
        user_id: impl Into<String>,
        scope: RateScope,
        context_key: Option<String>,
        amount: f64,
        comment: Option<String>,
    ) -> Result<Self, TracklaneError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(TracklaneError::InvalidInput(format!(
                "hourly rate must be a non-negative number, got {amount}"
            )));
        }

        match (&scope, &context_key) {
            (RateScope::Global, Some(_)) => {
                return Err(TracklaneError::InvalidInput(
                    "global-scoped rates must not carry a context key".into(),
                ));
            }
            (s, None) if s.requires_context() => {
                return Err(TracklaneError::InvalidInput(format!(
                    "{s}-scoped rates require a context key"
                )));
            }
            _ => {}
        }

        Ok(Self { user_id: user_id.into(), scope, context_key, amount, comment })
    }
}

/// An active rate joined with every alias of its owning user.
///
/// The remote tracker may know a user under multiple historical identifiers;
/// lookup maps register the rate under each of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveRate {
    pub record: RateRecord,
    pub aliases: Vec<String>,
}

/// Per-entry outcome of a batch rate assignment.
///
/// A failed entry records its error message without affecting siblings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntryResult {
    pub user_id: String,
    pub scope: RateScope,
    pub context_key: Option<String>,
    pub rate_id: Option<String>,
    pub error: Option<String>,
}

impl BatchEntryResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
