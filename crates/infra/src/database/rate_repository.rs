//! Rate repository implementation
//!
//! Persists the hourly-rate history and upholds the single-active-record
//! invariant: superseding deactivates the previous active record and inserts
//! the new one inside one transaction.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, Row};
use tokio::task;
use tracklane_core::rates::ports::RateRepository;
use tracklane_domain::{ActiveRate, RateRecord, RateScope, Result, TracklaneError};

use super::manager::{datetime_from_millis, map_sql_error, DbManager};

/// SQLite-backed rate repository
pub struct SqliteRateRepository {
    db: Arc<DbManager>,
}

impl SqliteRateRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RateRepository for SqliteRateRepository {
    async fn find_active(
        &self,
        user_id: &str,
        scope: RateScope,
        context_key: Option<&str>,
    ) -> Result<Vec<RateRecord>> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();
        let context_key = context_key.map(str::to_string);

        task::spawn_blocking(move || -> Result<Vec<RateRecord>> {
            let conn = db.get_connection()?;
            query_active(&conn, &user_id, scope, context_key.as_deref())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_all_active(&self) -> Result<Vec<ActiveRate>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<ActiveRate>> {
            let conn = db.get_connection()?;
            query_all_active(&conn)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn supersede(&self, record: RateRecord) -> Result<RateRecord> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<RateRecord> {
            let mut conn = db.get_connection()?;
            supersede_in_tx(&mut conn, record)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

fn query_active(
    conn: &Connection,
    user_id: &str,
    scope: RateScope,
    context_key: Option<&str>,
) -> Result<Vec<RateRecord>> {
    let sql = "SELECT id, user_id, scope, context_key, amount, comment, is_active, created_at
               FROM hourly_rates
               WHERE user_id = ?1 AND scope = ?2 AND context_key IS ?3 AND is_active = 1
               ORDER BY created_at DESC";

    let mut stmt = conn.prepare(sql).map_err(map_sql_error)?;
    let rows = stmt
        .query_map(params![user_id, scope.as_str(), context_key], map_rate_row)
        .map_err(map_sql_error)?;

    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
}

fn query_all_active(conn: &Connection) -> Result<Vec<ActiveRate>> {
    let sql = "SELECT id, user_id, scope, context_key, amount, comment, is_active, created_at
               FROM hourly_rates
               WHERE is_active = 1
               ORDER BY created_at DESC";

    let mut stmt = conn.prepare(sql).map_err(map_sql_error)?;
    let rows = stmt.query_map([], map_rate_row).map_err(map_sql_error)?;
    let records = rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)?;

    let aliases = query_alias_index(conn)?;

    Ok(records
        .into_iter()
        .map(|record| {
            let aliases = aliases.get(&record.user_id).cloned().unwrap_or_default();
            ActiveRate { record, aliases }
        })
        .collect())
}

/// All aliases grouped by user, in declared order.
fn query_alias_index(conn: &Connection) -> Result<HashMap<String, Vec<String>>> {
    let mut stmt = conn
        .prepare("SELECT user_id, alias FROM user_aliases ORDER BY user_id, position")
        .map_err(map_sql_error)?;

    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(map_sql_error)?;

    let mut index: HashMap<String, Vec<String>> = HashMap::new();
    for row in rows {
        let (user_id, alias) = row.map_err(map_sql_error)?;
        index.entry(user_id).or_default().push(alias);
    }
    Ok(index)
}

/// Deactivate-then-insert inside one transaction, so two concurrent callers
/// on the same tuple cannot both end up active.
fn supersede_in_tx(conn: &mut Connection, record: RateRecord) -> Result<RateRecord> {
    let tx = conn.transaction().map_err(map_sql_error)?;

    tx.execute(
        "UPDATE hourly_rates SET is_active = 0
         WHERE user_id = ?1 AND scope = ?2 AND context_key IS ?3 AND is_active = 1",
        params![record.user_id, record.scope.as_str(), record.context_key],
    )
    .map_err(map_sql_error)?;

    tx.execute(
        "INSERT INTO hourly_rates
             (id, user_id, scope, context_key, amount, comment, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
        params![
            record.id,
            record.user_id,
            record.scope.as_str(),
            record.context_key,
            record.amount,
            record.comment,
            record.created_at.timestamp_millis(),
        ],
    )
    .map_err(map_sql_error)?;

    tx.commit().map_err(map_sql_error)?;
    Ok(record)
}

fn map_rate_row(row: &Row<'_>) -> rusqlite::Result<RateRecord> {
    let scope_raw: String = row.get(2)?;
    let scope = scope_raw.parse::<RateScope>().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            Box::new(err),
        )
    })?;

    let millis: i64 = row.get(7)?;

    Ok(RateRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        scope,
        context_key: row.get(3)?,
        amount: row.get(4)?,
        comment: row.get(5)?,
        is_active: row.get(6)?,
        created_at: datetime_from_millis(7, millis)?,
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
