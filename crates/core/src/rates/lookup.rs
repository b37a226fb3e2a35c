//! Precomputed rate lookup map for bulk operations
//!
//! Built once per bulk run from the full active-record set, then queried with
//! up to three direct key hits per resolution instead of repository round
//! trips. Immutable after construction; results are identical to
//! [`RateService::resolve`](super::service::RateService::resolve) for the
//! same snapshot.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::warn;
use tracklane_domain::{ActiveRate, RateScope};

/// Ephemeral, process-local materialization of the active rate set.
///
/// Rates are keyed by composite strings (`{alias}:global`,
/// `{alias}:queue:{key}`, `{alias}:project:{key}`) and registered under every
/// identifier the owning user is known by.
#[derive(Debug, Default)]
pub struct RateLookupMap {
    entries: HashMap<String, MapEntry>,
    aliases: HashSet<String>,
}

#[derive(Debug, Clone, Copy)]
struct MapEntry {
    amount: f64,
    created_at: DateTime<Utc>,
}

impl RateLookupMap {
    /// Build the map from every active record joined with its user aliases.
    ///
    /// Duplicate keys only occur when the uniqueness invariant was violated
    /// upstream; the most recent record wins and the anomaly is logged.
    #[must_use]
    pub fn build(active: &[ActiveRate]) -> Self {
        let mut map = Self::default();

        for rate in active {
            let record = &rate.record;
            // The canonical user id is always a valid lookup identity.
            map.aliases.insert(record.user_id.clone());
            map.insert_entry(&record.user_id, rate);

            for alias in &rate.aliases {
                if alias.is_empty() || alias == &record.user_id {
                    continue;
                }
                map.aliases.insert(alias.clone());
                map.insert_entry(alias, rate);
            }
        }

        map
    }

    /// Resolve the effective hourly rate for a tracker identity.
    ///
    /// Priority: project match, then queue match, then the user's global
    /// rate, then the 0.0 "no rate configured" sentinel.
    #[must_use]
    pub fn resolve(
        &self,
        alias: &str,
        project_context: Option<&str>,
        queue_context: Option<&str>,
    ) -> f64 {
        if let Some(project) = project_context {
            if let Some(entry) = self.entries.get(&project_key(alias, project)) {
                return entry.amount;
            }
        }

        if let Some(queue) = queue_context {
            if let Some(entry) = self.entries.get(&queue_key(alias, queue)) {
                return entry.amount;
            }
        }

        if let Some(entry) = self.entries.get(&global_key(alias)) {
            return entry.amount;
        }

        0.0
    }

    /// Whether any rate is registered under this identity.
    #[must_use]
    pub fn contains_user(&self, alias: &str) -> bool {
        self.aliases.contains(alias)
    }

    /// Number of composite keys in the map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert_entry(&mut self, alias: &str, rate: &ActiveRate) {
        let record = &rate.record;
        let key = match record.scope {
            RateScope::Global => global_key(alias),
            RateScope::Queue => {
                let Some(context) = record.context_key.as_deref() else {
                    warn!(
                        rate_id = %record.id,
                        user_id = %record.user_id,
                        "queue-scoped rate without context key, skipping"
                    );
                    return;
                };
                queue_key(alias, context)
            }
            RateScope::Project => {
                let Some(context) = record.context_key.as_deref() else {
                    warn!(
                        rate_id = %record.id,
                        user_id = %record.user_id,
                        "project-scoped rate without context key, skipping"
                    );
                    return;
                };
                project_key(alias, context)
            }
        };

        let candidate = MapEntry { amount: record.amount, created_at: record.created_at };
        match self.entries.get(&key) {
            Some(existing) => {
                warn!(
                    key = %key,
                    rate_id = %record.id,
                    "multiple active rates collide on one key, keeping most recent"
                );
                if candidate.created_at > existing.created_at {
                    self.entries.insert(key, candidate);
                }
            }
            None => {
                self.entries.insert(key, candidate);
            }
        }
    }
}

fn global_key(alias: &str) -> String {
    format!("{alias}:global")
}

fn queue_key(alias: &str, queue: &str) -> String {
    format!("{alias}:queue:{queue}")
}

fn project_key(alias: &str, project: &str) -> String {
    format!("{alias}:project:{project}")
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tracklane_domain::RateRecord;

    use super::*;

    fn active(
        user_id: &str,
        scope: RateScope,
        context_key: Option<&str>,
        amount: f64,
        aliases: &[&str],
    ) -> ActiveRate {
        ActiveRate {
            record: RateRecord {
                id: format!("r-{user_id}-{scope}-{amount}"),
                user_id: user_id.to_string(),
                scope,
                context_key: context_key.map(str::to_string),
                amount,
                comment: None,
                is_active: true,
                created_at: Utc::now(),
            },
            aliases: aliases.iter().map(|a| (*a).to_string()).collect(),
        }
    }

    #[test]
    fn project_scope_wins_over_queue_and_global() {
        let map = RateLookupMap::build(&[
            active("u1", RateScope::Global, None, 1000.0, &[]),
            active("u1", RateScope::Queue, Some("ZOTA"), 1200.0, &[]),
            active("u1", RateScope::Project, Some("PROJ1"), 1500.0, &[]),
        ]);

        assert_eq!(map.resolve("u1", Some("PROJ1"), Some("ZOTA")), 1500.0);
        assert_eq!(map.resolve("u1", None, Some("ZOTA")), 1200.0);
        assert_eq!(map.resolve("u1", None, None), 1000.0);
    }

    #[test]
    fn unmatched_contexts_fall_through_to_global() {
        let map = RateLookupMap::build(&[active("u1", RateScope::Global, None, 900.0, &[])]);

        assert_eq!(map.resolve("u1", Some("OTHER"), Some("OTHER")), 900.0);
    }

    #[test]
    fn unknown_identity_resolves_to_zero() {
        let map = RateLookupMap::build(&[active("u1", RateScope::Global, None, 900.0, &[])]);

        assert_eq!(map.resolve("nobody", None, None), 0.0);
        assert!(!map.contains_user("nobody"));
    }

    #[test]
    fn rates_are_registered_under_every_alias() {
        let map = RateLookupMap::build(&[active(
            "u1",
            RateScope::Queue,
            Some("ZOTA"),
            1200.0,
            &["jdoe", "1120000000000001"],
        )]);

        assert_eq!(map.resolve("jdoe", None, Some("ZOTA")), 1200.0);
        assert_eq!(map.resolve("1120000000000001", None, Some("ZOTA")), 1200.0);
        assert!(map.contains_user("jdoe"));
    }

    #[test]
    fn colliding_actives_keep_most_recent() {
        let mut older = active("u1", RateScope::Global, None, 800.0, &[]);
        older.record.created_at = Utc::now() - Duration::hours(1);
        let newer = active("u1", RateScope::Global, None, 950.0, &[]);

        // Insertion order must not matter.
        let map_a = RateLookupMap::build(&[older.clone(), newer.clone()]);
        let map_b = RateLookupMap::build(&[newer, older]);

        assert_eq!(map_a.resolve("u1", None, None), 950.0);
        assert_eq!(map_b.resolve("u1", None, None), 950.0);
    }

    #[test]
    fn empty_snapshot_builds_empty_map() {
        let map = RateLookupMap::build(&[]);
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
    }
}
