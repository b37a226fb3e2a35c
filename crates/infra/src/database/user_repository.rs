//! User repository implementation

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;
use tracklane_core::sync::ports::UserRepository;
use tracklane_domain::{Result, TracklaneError, UserRecord};

use super::manager::{datetime_from_millis, map_sql_error, DbManager};

/// SQLite-backed user repository
pub struct SqliteUserRepository {
    db: Arc<DbManager>,
}

impl SqliteUserRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn exists(&self, user_id: &str) -> Result<bool> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();

        task::spawn_blocking(move || -> Result<bool> {
            let conn = db.get_connection()?;
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM users WHERE id = ?1", params![user_id], |row| {
                    row.get(0)
                })
                .optional()
                .map_err(map_sql_error)?;
            Ok(found.is_some())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_by_login(&self, login: &str) -> Result<Option<UserRecord>> {
        let db = Arc::clone(&self.db);
        let login = login.to_string();

        task::spawn_blocking(move || -> Result<Option<UserRecord>> {
            let conn = db.get_connection()?;
            query_by_login(&conn, &login)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn create(&self, user: &UserRecord) -> Result<()> {
        let db = Arc::clone(&self.db);
        let user = user.clone();

        task::spawn_blocking(move || -> Result<()> {
            let mut conn = db.get_connection()?;
            insert_user(&mut conn, &user)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update(&self, user: &UserRecord) -> Result<()> {
        let db = Arc::clone(&self.db);
        let user = user.clone();

        task::spawn_blocking(move || -> Result<()> {
            let mut conn = db.get_connection()?;
            update_user(&mut conn, &user)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

fn query_by_login(conn: &Connection, login: &str) -> Result<Option<UserRecord>> {
    let sql = "SELECT id, login, display_name, email, is_active, created_at, updated_at
               FROM users WHERE login = ?1";

    let user = conn
        .query_row(sql, params![login], map_user_row)
        .optional()
        .map_err(map_sql_error)?;

    match user {
        Some(mut user) => {
            user.aliases = query_aliases(conn, &user.id)?;
            Ok(Some(user))
        }
        None => Ok(None),
    }
}

fn query_aliases(conn: &Connection, user_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT alias FROM user_aliases WHERE user_id = ?1 ORDER BY position")
        .map_err(map_sql_error)?;

    let rows = stmt.query_map(params![user_id], |row| row.get(0)).map_err(map_sql_error)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
}

fn insert_user(conn: &mut Connection, user: &UserRecord) -> Result<()> {
    let tx = conn.transaction().map_err(map_sql_error)?;

    tx.execute(
        "INSERT INTO users (id, login, display_name, email, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user.id,
            user.login,
            user.display_name,
            user.email,
            user.is_active,
            user.created_at.timestamp_millis(),
            user.updated_at.timestamp_millis(),
        ],
    )
    .map_err(map_sql_error)?;

    replace_aliases(&tx, user)?;
    tx.commit().map_err(map_sql_error)
}

fn update_user(conn: &mut Connection, user: &UserRecord) -> Result<()> {
    let tx = conn.transaction().map_err(map_sql_error)?;

    let changed = tx
        .execute(
            "UPDATE users
             SET login = ?2, display_name = ?3, email = ?4, is_active = ?5, updated_at = ?6
             WHERE id = ?1",
            params![
                user.id,
                user.login,
                user.display_name,
                user.email,
                user.is_active,
                user.updated_at.timestamp_millis(),
            ],
        )
        .map_err(map_sql_error)?;

    if changed == 0 {
        return Err(TracklaneError::NotFound(format!("user {} does not exist", user.id)));
    }

    replace_aliases(&tx, user)?;
    tx.commit().map_err(map_sql_error)
}

fn replace_aliases(tx: &rusqlite::Transaction<'_>, user: &UserRecord) -> Result<()> {
    tx.execute("DELETE FROM user_aliases WHERE user_id = ?1", params![user.id])
        .map_err(map_sql_error)?;

    for (position, alias) in user.aliases.iter().enumerate() {
        tx.execute(
            "INSERT INTO user_aliases (user_id, alias, position) VALUES (?1, ?2, ?3)",
            params![user.id, alias, position as i64],
        )
        .map_err(map_sql_error)?;
    }
    Ok(())
}

fn map_user_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    let created_millis: i64 = row.get(5)?;
    let updated_millis: i64 = row.get(6)?;

    Ok(UserRecord {
        id: row.get(0)?,
        login: row.get(1)?,
        display_name: row.get(2)?,
        email: row.get(3)?,
        is_active: row.get(4)?,
        aliases: Vec::new(),
        created_at: datetime_from_millis(5, created_millis)?,
        updated_at: datetime_from_millis(6, updated_millis)?,
    })
}

fn map_join_error(err: task::JoinError) -> TracklaneError {
    if err.is_cancelled() {
        TracklaneError::Internal("blocking task cancelled".into())
    } else {
        TracklaneError::Internal(format!("blocking task failed: {err}"))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn create_and_fetch_round_trips_aliases_in_order() {
        let (repo, _manager, _dir) = setup_repository().await;

        let user = sample_user("u1", "jdoe", &["jdoe", "1120000000000001"]);
        repo.create(&user).await.expect("user created");

        let fetched = repo.get_by_login("jdoe").await.expect("query").expect("found");
        assert_eq!(fetched.id, "u1");
        assert_eq!(fetched.aliases, vec!["jdoe".to_string(), "1120000000000001".to_string()]);
        assert!(fetched.is_active);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn exists_distinguishes_known_and_unknown_ids() {
        let (repo, _manager, _dir) = setup_repository().await;

        repo.create(&sample_user("u1", "jdoe", &["jdoe"])).await.expect("user created");

        assert!(repo.exists("u1").await.expect("query"));
        assert!(!repo.exists("ghost").await.expect("query"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_replaces_fields_and_aliases() {
        let (repo, _manager, _dir) = setup_repository().await;

        let mut user = sample_user("u1", "jdoe", &["jdoe"]);
        repo.create(&user).await.expect("user created");

        user.display_name = Some("Jane Doe".into());
        user.is_active = false;
        user.aliases.push("1120000000000001".into());
        repo.update(&user).await.expect("user updated");

        let fetched = repo.get_by_login("jdoe").await.expect("query").expect("found");
        assert_eq!(fetched.display_name.as_deref(), Some("Jane Doe"));
        assert!(!fetched.is_active);
        assert_eq!(fetched.aliases.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn updating_a_missing_user_is_not_found() {
        let (repo, _manager, _dir) = setup_repository().await;

        let user = sample_user("ghost", "ghost", &[]);
        let err = repo.update(&user).await.unwrap_err();
        assert!(matches!(err, TracklaneError::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_login_returns_none() {
        let (repo, _manager, _dir) = setup_repository().await;

        let result = repo.get_by_login("nobody").await.expect("query succeeded");
        assert!(result.is_none());
    }

    // ========================================================================
    // Test Helpers
    // ========================================================================

    async fn setup_repository() -> (SqliteUserRepository, Arc<DbManager>, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db_path = temp_dir.path().join("users.db");

        let manager = Arc::new(DbManager::new(&db_path, 4).expect("db manager created"));
        manager.run_migrations().expect("migrations run");

        let repo = SqliteUserRepository::new(manager.clone());
        (repo, manager, temp_dir)
    }

    fn sample_user(id: &str, login: &str, aliases: &[&str]) -> UserRecord {
        let now = Utc::now();
        UserRecord {
            id: id.to_string(),
            login: login.to_string(),
            display_name: None,
            email: None,
            is_active: true,
            aliases: aliases.iter().map(|a| (*a).to_string()).collect(),
            created_at: now,
            updated_at: now,
        }
    }
}
