//! Port interfaces for rate persistence

use async_trait::async_trait;
use tracklane_domain::{ActiveRate, RateRecord, RateScope, Result};

/// Trait for rate record persistence and retrieval
#[async_trait]
pub trait RateRepository: Send + Sync {
    /// Active records for one (user, scope, context) tuple, most recent
    /// first. More than one entry means the uniqueness invariant was
    /// violated by the storage layer; callers tie-break on recency.
    async fn find_active(
        &self,
        user_id: &str,
        scope: RateScope,
        context_key: Option<&str>,
    ) -> Result<Vec<RateRecord>>;

    /// Every currently active record, joined with all alias identifiers of
    /// its owning user. Feeds lookup-map construction.
    async fn find_all_active(&self) -> Result<Vec<ActiveRate>>;

    /// Deactivate the current active record for the record's
    /// (user, scope, context) tuple and insert `record` as the new active
    /// one, atomically with respect to concurrent callers on the same tuple.
    async fn supersede(&self, record: RateRecord) -> Result<RateRecord>;
}
