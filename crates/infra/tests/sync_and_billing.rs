//! Full-stack flow: sync users from a mock tracker into SQLite, assign
//! rates, then bill worklogs through the precomputed lookup map, including
//! resolution through a historical alias.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use tempfile::TempDir;
use tracklane_core::{RateService, UserSyncService, WorkloadService};
use tracklane_core::sync::ports::UserRepository;
use tracklane_domain::{RateChange, RateScope, Result};
use tracklane_infra::database::{DbManager, SqliteRateRepository, SqliteUserRepository};
use tracklane_infra::tracker::auth::CredentialProvider;
use tracklane_infra::tracker::{PagedClient, TrackerApi};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request as MockRequest, ResponseTemplate};

struct TestTokens;

#[async_trait]
impl CredentialProvider for TestTokens {
    async fn auth_headers(&self) -> Result<Vec<(String, String)>> {
        Ok(vec![("Authorization".to_string(), "OAuth integration-test".to_string())])
    }
}

async fn mock_tracker() -> MockServer {
    let server = MockServer::start().await;

    // Paginated user directory: one page, two users.
    Mock::given(method("GET"))
        .and(path("/v2/users"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([
                    { "uid": 1120000000000001_i64, "login": "jdoe", "display": "J. Doe" },
                    { "uid": 1120000000000002_i64, "login": "asmith", "display": "A. Smith" },
                ]))
                .append_header("X-Total-Pages", "1"),
        )
        .mount(&server)
        .await;

    // Scrolled worklog search: two pages. Authors are the tracker-side uid
    // aliases, not the local logins.
    Mock::given(method("POST"))
        .and(path("/v2/worklog/_search"))
        .respond_with(|req: &MockRequest| -> ResponseTemplate {
            let continuation = req.url.query_pairs().any(|(k, _)| k == "scrollId");
            if continuation {
                ResponseTemplate::new(200).set_body_json(json!([
                    {
                        "createdBy": { "id": "1120000000000002" },
                        "issue": { "key": "SUP-7" },
                        "duration": "PT4H",
                        "start": "2026-01-15T14:00:00.000+0000"
                    }
                ]))
            } else {
                ResponseTemplate::new(200)
                    .set_body_json(json!([
                        {
                            "createdBy": { "id": "1120000000000001" },
                            "issue": { "key": "ZOTA-1" },
                            "duration": "PT2H",
                            "start": "2026-01-15T10:00:00.000+0000"
                        },
                        {
                            "createdBy": { "id": "1120000000000001" },
                            "issue": { "key": "ZOTA-2" },
                            "duration": "PT1H30M",
                            "start": "2026-01-15T12:00:00.000+0000"
                        }
                    ]))
                    .append_header("X-Scroll-Id", "cursor-1")
            }
        })
        .mount(&server)
        .await;

    server
}

#[tokio::test(flavor = "multi_thread")]
async fn synced_users_get_rated_and_billed_through_aliases() {
    let server = mock_tracker().await;

    let temp_dir = TempDir::new().expect("temp dir");
    let manager =
        Arc::new(DbManager::new(temp_dir.path().join("tracklane.db"), 4).expect("db manager"));
    manager.run_migrations().expect("migrations");

    let users = Arc::new(SqliteUserRepository::new(manager.clone()));
    let rates = Arc::new(SqliteRateRepository::new(manager.clone()));
    let gateway = Arc::new(TrackerApi::with_client(
        PagedClient::new(server.uri(), Arc::new(TestTokens)).expect("paged client"),
    ));

    // 1. Pull the user directory.
    let report = UserSyncService::new(gateway.clone(), users.clone())
        .sync_users()
        .await
        .expect("sync succeeds");
    assert_eq!(report.fetched, 2);
    assert_eq!(report.created, 2);

    let jdoe = users.get_by_login("jdoe").await.expect("query").expect("jdoe synced");
    assert!(jdoe.aliases.contains(&"1120000000000001".to_string()));

    // 2. Assign rates: a queue override for jdoe, a global rate for asmith.
    let rate_service = RateService::new(rates.clone(), users.clone());
    rate_service
        .create_or_supersede(
            RateChange::new(jdoe.id.as_str(), RateScope::Queue, Some("ZOTA".into()), 1200.0, None)
                .expect("valid change"),
        )
        .await
        .expect("rate assigned");

    let asmith = users.get_by_login("asmith").await.expect("query").expect("asmith synced");
    rate_service
        .create_or_supersede(
            RateChange::new(asmith.id.as_str(), RateScope::Global, None, 1000.0, None)
                .expect("valid change"),
        )
        .await
        .expect("rate assigned");

    // 3. Bill the worklogs; authors arrive as uid aliases.
    let workload = WorkloadService::new(gateway, rates)
        .report(Utc::now() - Duration::days(30), Utc::now())
        .await
        .expect("report builds");

    assert_eq!(workload.len(), 2);

    let jdoe_row = workload
        .iter()
        .find(|w| w.author == "1120000000000001")
        .expect("jdoe workload present");
    assert_eq!(jdoe_row.entries, 2);
    assert!((jdoe_row.total_hours - 3.5).abs() < f64::EPSILON);
    // Queue-scoped ZOTA rate resolved through the uid alias.
    assert!((jdoe_row.billed_amount - 4200.0).abs() < 1e-9);

    let asmith_row = workload
        .iter()
        .find(|w| w.author == "1120000000000002")
        .expect("asmith workload present");
    // SUP queue has no override; the global rate applies.
    assert!((asmith_row.billed_amount - 4000.0).abs() < 1e-9);
}
