//! Port interfaces for sync operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracklane_domain::{RemoteUser, Result, UserRecord, WorklogRecord};

/// Trait for user persistence and retrieval
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Whether a user with this id exists
    async fn exists(&self, user_id: &str) -> Result<bool>;

    /// Get a user by login
    async fn get_by_login(&self, login: &str) -> Result<Option<UserRecord>>;

    /// Create a new user (including aliases)
    async fn create(&self, user: &UserRecord) -> Result<()>;

    /// Update an existing user (including aliases)
    async fn update(&self, user: &UserRecord) -> Result<()>;
}

/// Trait for reading bulk data from the remote tracker
#[async_trait]
pub trait TrackerGateway: Send + Sync {
    /// Every user the tracker reports, dismissed ones included
    async fn fetch_users(&self) -> Result<Vec<RemoteUser>>;

    /// Every worklog whose start falls inside the window
    async fn fetch_worklogs(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<WorklogRecord>>;
}
