//! Worklog and reporting types sourced from the remote tracker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One logged unit of work, as reported by the tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorklogRecord {
    /// Tracker-side identifier of the author. May be any alias the user is
    /// or was known under.
    pub author: String,
    pub issue_key: String,
    pub queue_key: Option<String>,
    pub project_id: Option<String>,
    pub hours: f64,
    pub started_at: DateTime<Utc>,
}

/// Aggregated workload and billing figures for one tracker identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserWorkload {
    pub author: String,
    pub entries: usize,
    pub total_hours: f64,
    /// Sum of `hours x resolved hourly rate` over every worklog, each
    /// resolved in its own project/queue context.
    pub billed_amount: f64,
}
