//! Rate resolution and assignment service - core business logic

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use tracklane_domain::{
    BatchEntryResult, RateChange, RateRecord, RateScope, Result, TracklaneError,
};
use uuid::Uuid;

use super::lookup::RateLookupMap;
use super::ports::RateRepository;
use crate::sync::ports::UserRepository;

/// Rate resolution and assignment service
pub struct RateService {
    rates: Arc<dyn RateRepository>,
    users: Arc<dyn UserRepository>,
}

impl RateService {
    /// Create a new rate service
    pub fn new(rates: Arc<dyn RateRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { rates, users }
    }

    /// Resolve the effective hourly rate for a user in an optional
    /// project/queue context.
    ///
    /// Strict override chain: an active project-scoped rate wins outright,
    /// then a queue-scoped one, then the user's global rate. Absence of any
    /// match is not an error; it yields the 0.0 sentinel.
    pub async fn resolve(
        &self,
        user_id: &str,
        project_context: Option<&str>,
        queue_context: Option<&str>,
    ) -> Result<f64> {
        if let Some(project) = project_context {
            if let Some(amount) =
                self.active_amount(user_id, RateScope::Project, Some(project)).await?
            {
                return Ok(amount);
            }
        }

        if let Some(queue) = queue_context {
            if let Some(amount) = self.active_amount(user_id, RateScope::Queue, Some(queue)).await?
            {
                return Ok(amount);
            }
        }

        if let Some(amount) = self.active_amount(user_id, RateScope::Global, None).await? {
            return Ok(amount);
        }

        Ok(0.0)
    }

    /// Build the precomputed lookup map from the current active-record set.
    ///
    /// For any snapshot, [`RateLookupMap::resolve`] agrees with
    /// [`RateService::resolve`] on every input.
    pub async fn build_lookup_map(&self) -> Result<RateLookupMap> {
        let active = self.rates.find_all_active().await?;
        Ok(RateLookupMap::build(&active))
    }

    /// Assign a new rate, superseding the current active record for the same
    /// (user, scope, context) tuple.
    ///
    /// The deactivate-then-insert step runs atomically in the repository so
    /// concurrent callers cannot leave two active records behind.
    ///
    /// # Errors
    /// `NotFound` when the target user does not exist.
    pub async fn create_or_supersede(&self, change: RateChange) -> Result<RateRecord> {
        if !self.users.exists(&change.user_id).await? {
            return Err(TracklaneError::NotFound(format!(
                "user {} does not exist",
                change.user_id
            )));
        }

        let record = RateRecord {
            id: Uuid::new_v4().to_string(),
            user_id: change.user_id,
            scope: change.scope,
            context_key: change.context_key,
            amount: change.amount,
            comment: change.comment,
            is_active: true,
            created_at: Utc::now(),
        };

        let stored = self.rates.supersede(record).await?;

        info!(
            rate_id = %stored.id,
            user_id = %stored.user_id,
            scope = %stored.scope,
            context = ?stored.context_key,
            amount = stored.amount,
            "hourly rate assigned"
        );

        Ok(stored)
    }

    /// Apply a batch of rate changes, best-effort per entry.
    ///
    /// A failed entry (e.g. unknown user) is recorded in its result slot and
    /// does not abort or roll back the other entries.
    pub async fn batch_create_or_supersede(
        &self,
        changes: Vec<RateChange>,
    ) -> Vec<BatchEntryResult> {
        let mut results = Vec::with_capacity(changes.len());

        for change in changes {
            let user_id = change.user_id.clone();
            let scope = change.scope;
            let context_key = change.context_key.clone();

            let entry = match self.create_or_supersede(change).await {
                Ok(record) => BatchEntryResult {
                    user_id,
                    scope,
                    context_key,
                    rate_id: Some(record.id),
                    error: None,
                },
                Err(err) => BatchEntryResult {
                    user_id,
                    scope,
                    context_key,
                    rate_id: None,
                    error: Some(err.to_string()),
                },
            };
            results.push(entry);
        }

        results
    }

    async fn active_amount(
        &self,
        user_id: &str,
        scope: RateScope,
        context_key: Option<&str>,
    ) -> Result<Option<f64>> {
        let records = self.rates.find_active(user_id, scope, context_key).await?;

        if records.len() > 1 {
            warn!(
                user_id,
                scope = %scope,
                context = ?context_key,
                count = records.len(),
                "multiple active rates for one scope, using most recent"
            );
        }

        Ok(records.first().map(|record| record.amount))
    }
}
