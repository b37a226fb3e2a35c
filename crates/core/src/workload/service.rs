//! Workload aggregation service - core business logic

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use tracklane_domain::{Result, UserWorkload};

use crate::rates::lookup::RateLookupMap;
use crate::rates::ports::RateRepository;
use crate::sync::ports::TrackerGateway;

/// Aggregates tracker worklogs into per-user hours and billed amounts.
///
/// The rate set is materialized into one [`RateLookupMap`] for the whole run
/// instead of resolving per worklog against the repository.
pub struct WorkloadService {
    gateway: Arc<dyn TrackerGateway>,
    rates: Arc<dyn RateRepository>,
}

impl WorkloadService {
    /// Create a new workload service
    pub fn new(gateway: Arc<dyn TrackerGateway>, rates: Arc<dyn RateRepository>) -> Self {
        Self { gateway, rates }
    }

    /// Build the billing report for a time window.
    ///
    /// Each worklog is billed at the rate resolved in its own project/queue
    /// context; identities without a configured rate contribute hours but no
    /// amount. Output is sorted by author for stable reporting.
    pub async fn report(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<UserWorkload>> {
        let worklogs = self.gateway.fetch_worklogs(from, to).await?;
        let map = RateLookupMap::build(&self.rates.find_all_active().await?);

        debug!(worklogs = worklogs.len(), rate_keys = map.len(), "aggregating workload");

        let mut by_author: BTreeMap<String, UserWorkload> = BTreeMap::new();
        for log in worklogs {
            let rate =
                map.resolve(&log.author, log.project_id.as_deref(), log.queue_key.as_deref());
            let entry = by_author.entry(log.author.clone()).or_insert_with(|| UserWorkload {
                author: log.author.clone(),
                entries: 0,
                total_hours: 0.0,
                billed_amount: 0.0,
            });
            entry.entries += 1;
            entry.total_hours += log.hours;
            entry.billed_amount += log.hours * rate;
        }

        Ok(by_author.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tracklane_domain::{
        ActiveRate, RateRecord, RateScope, RemoteUser, WorklogRecord,
    };

    use super::*;

    struct StaticGateway {
        worklogs: Vec<WorklogRecord>,
    }

    #[async_trait]
    impl TrackerGateway for StaticGateway {
        async fn fetch_users(&self) -> Result<Vec<RemoteUser>> {
            Ok(vec![])
        }

        async fn fetch_worklogs(
            &self,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> Result<Vec<WorklogRecord>> {
            Ok(self.worklogs.clone())
        }
    }

    struct StaticRates {
        active: Vec<ActiveRate>,
    }

    #[async_trait]
    impl RateRepository for StaticRates {
        async fn find_active(
            &self,
            user_id: &str,
            scope: RateScope,
            context_key: Option<&str>,
        ) -> Result<Vec<RateRecord>> {
            Ok(self
                .active
                .iter()
                .map(|a| &a.record)
                .filter(|r| {
                    r.user_id == user_id
                        && r.scope == scope
                        && r.context_key.as_deref() == context_key
                })
                .cloned()
                .collect())
        }

        async fn find_all_active(&self) -> Result<Vec<ActiveRate>> {
            Ok(self.active.clone())
        }

        async fn supersede(&self, record: RateRecord) -> Result<RateRecord> {
            Ok(record)
        }
    }

    fn worklog(author: &str, issue: &str, queue: Option<&str>, hours: f64) -> WorklogRecord {
        WorklogRecord {
            author: author.to_string(),
            issue_key: issue.to_string(),
            queue_key: queue.map(str::to_string),
            project_id: None,
            hours,
            started_at: Utc::now(),
        }
    }

    fn global_rate(user_id: &str, amount: f64, aliases: &[&str]) -> ActiveRate {
        ActiveRate {
            record: RateRecord {
                id: format!("r-{user_id}"),
                user_id: user_id.to_string(),
                scope: RateScope::Global,
                context_key: None,
                amount,
                comment: None,
                is_active: true,
                created_at: Utc::now(),
            },
            aliases: aliases.iter().map(|a| (*a).to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn bills_worklogs_at_resolved_rates() {
        let gateway = Arc::new(StaticGateway {
            worklogs: vec![
                worklog("jdoe", "ZOTA-1", Some("ZOTA"), 2.0),
                worklog("jdoe", "ZOTA-2", Some("ZOTA"), 1.5),
                worklog("other", "ZOTA-3", Some("ZOTA"), 4.0),
            ],
        });
        let rates = Arc::new(StaticRates {
            active: vec![global_rate("u1", 1000.0, &["jdoe"])],
        });

        let report = WorkloadService::new(gateway, rates)
            .report(Utc::now(), Utc::now())
            .await
            .expect("report builds");

        assert_eq!(report.len(), 2);

        let jdoe = report.iter().find(|w| w.author == "jdoe").expect("jdoe aggregated");
        assert_eq!(jdoe.entries, 2);
        assert!((jdoe.total_hours - 3.5).abs() < f64::EPSILON);
        assert!((jdoe.billed_amount - 3500.0).abs() < f64::EPSILON);

        // No configured rate: hours accumulate, amount stays zero.
        let other = report.iter().find(|w| w.author == "other").expect("other aggregated");
        assert!((other.billed_amount - 0.0).abs() < f64::EPSILON);
        assert!((other.total_hours - 4.0).abs() < f64::EPSILON);
    }
}
