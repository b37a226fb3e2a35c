//! User domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A locally persisted user, kept in sync with the remote tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub login: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub is_active: bool,
    /// Every identifier the tracker has ever known this user under,
    /// including the current login and numeric uid.
    pub aliases: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// Merge newly observed aliases into the record, preserving order and
    /// skipping duplicates. Returns true when anything was added.
    pub fn merge_aliases<I>(&mut self, incoming: I) -> bool
    where
        I: IntoIterator<Item = String>,
    {
        let mut changed = false;
        for alias in incoming {
            if alias.is_empty() || self.aliases.iter().any(|a| a == &alias) {
                continue;
            }
            self.aliases.push(alias);
            changed = true;
        }
        changed
    }
}

/// A user as reported by the remote tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteUser {
    pub uid: String,
    pub login: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    /// Dismissed users are synced as inactive rather than skipped, so their
    /// historical worklogs still resolve.
    pub dismissed: bool,
}

/// Outcome of one user synchronisation run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
}
