//! User synchronisation service - core business logic

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use tracklane_domain::{RemoteUser, Result, SyncReport, UserRecord};
use uuid::Uuid;

use super::ports::{TrackerGateway, UserRepository};

/// Pulls the remote user directory and reconciles local records against it.
pub struct UserSyncService {
    gateway: Arc<dyn TrackerGateway>,
    users: Arc<dyn UserRepository>,
}

impl UserSyncService {
    /// Create a new sync service
    pub fn new(gateway: Arc<dyn TrackerGateway>, users: Arc<dyn UserRepository>) -> Self {
        Self { gateway, users }
    }

    /// Fetch every remote user and upsert the local record.
    ///
    /// Newly observed aliases are merged, never removed; dismissed users are
    /// kept as inactive records so historical worklogs still resolve.
    pub async fn sync_users(&self) -> Result<SyncReport> {
        let remote_users = self.gateway.fetch_users().await?;
        let mut report = SyncReport { fetched: remote_users.len(), ..SyncReport::default() };

        for remote in remote_users {
            match self.users.get_by_login(&remote.login).await? {
                Some(existing) => {
                    if self.reconcile(existing, &remote).await? {
                        report.updated += 1;
                    }
                }
                None => {
                    self.users.create(&new_record(&remote)).await?;
                    report.created += 1;
                }
            }
        }

        info!(
            fetched = report.fetched,
            created = report.created,
            updated = report.updated,
            "user directory synchronised"
        );

        Ok(report)
    }

    /// Update the local record when the remote copy diverges. Returns true
    /// when a write happened.
    async fn reconcile(&self, mut local: UserRecord, remote: &RemoteUser) -> Result<bool> {
        let aliases_grew =
            local.merge_aliases([remote.login.clone(), remote.uid.clone()]);
        let remote_active = !remote.dismissed;

        let changed = aliases_grew
            || local.is_active != remote_active
            || local.display_name != remote.display_name
            || local.email != remote.email;

        if !changed {
            return Ok(false);
        }

        local.is_active = remote_active;
        local.display_name = remote.display_name.clone();
        local.email = remote.email.clone();
        local.updated_at = Utc::now();

        debug!(user_id = %local.id, login = %local.login, "updating user from tracker");
        self.users.update(&local).await?;
        Ok(true)
    }
}

fn new_record(remote: &RemoteUser) -> UserRecord {
    let now = Utc::now();
    let mut aliases = vec![remote.login.clone()];
    if !remote.uid.is_empty() && remote.uid != remote.login {
        aliases.push(remote.uid.clone());
    }

    UserRecord {
        id: Uuid::new_v4().to_string(),
        login: remote.login.clone(),
        display_name: remote.display_name.clone(),
        email: remote.email.clone(),
        is_active: !remote.dismissed,
        aliases,
        created_at: now,
        updated_at: now,
    }
}
