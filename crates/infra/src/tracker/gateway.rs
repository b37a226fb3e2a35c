//! Typed gateway over tracker resources
//!
//! Implements the core [`TrackerGateway`] port on top of [`PagedClient`].
//! The user directory is page-number based; worklog search leaves strategy
//! detection to the paging engine.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use tracing::warn;
use tracklane_core::sync::ports::TrackerGateway;
use tracklane_domain::{RemoteUser, Result, TrackerConfig, WorklogRecord};

use super::auth::{CredentialProvider, TrackerCredentials};
use super::paging::PagedClient;
use super::types::{FetchStrategy, PageRequest, RemoteUserDto, WorklogDto};

/// Tracker API gateway.
pub struct TrackerApi {
    paged: PagedClient,
}

impl TrackerApi {
    /// Build the gateway from configuration, wiring up credentials and the
    /// paging engine.
    pub fn from_config(config: &TrackerConfig) -> Result<Self> {
        let credentials: Arc<dyn CredentialProvider> =
            Arc::new(TrackerCredentials::from_config(config)?);
        let paged = PagedClient::new(config.base_url.clone(), credentials)?
            .with_page_size(config.page_size)
            .with_scroll_ttl_ms(config.scroll_ttl_ms);
        Ok(Self { paged })
    }

    /// Build the gateway over an existing paging client (used in tests).
    pub fn with_client(paged: PagedClient) -> Self {
        Self { paged }
    }
}

#[async_trait]
impl TrackerGateway for TrackerApi {
    async fn fetch_users(&self) -> Result<Vec<RemoteUser>> {
        let request = PageRequest::get("/v2/users")?;

        let mut users = Vec::new();
        self.paged
            .fetch_all::<RemoteUserDto, _>(&request, Some(FetchStrategy::Paginate), |page, _| {
                users.extend(page.into_iter().map(RemoteUser::from));
            })
            .await?;

        Ok(users)
    }

    async fn fetch_worklogs(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<WorklogRecord>> {
        let request = PageRequest::post("/v2/worklog/_search")?.with_body(json!({
            "start": {
                "from": from.to_rfc3339_opts(SecondsFormat::Millis, true),
                "to": to.to_rfc3339_opts(SecondsFormat::Millis, true),
            }
        }));

        let mut worklogs = Vec::new();
        let mut skipped = 0_usize;
        self.paged
            .fetch_all::<WorklogDto, _>(&request, None, |page, _| {
                for dto in page {
                    match WorklogRecord::try_from(dto) {
                        Ok(record) => worklogs.push(record),
                        Err(err) => {
                            skipped += 1;
                            warn!(error = %err, "skipping unparseable worklog entry");
                        }
                    }
                }
            })
            .await?;

        if skipped > 0 {
            warn!(skipped, fetched = worklogs.len(), "some worklog entries were skipped");
        }

        Ok(worklogs)
    }
}
