//! Durable notification history in SQLite.
//!
//! Uses r2d2 with r2d2_sqlite for pooled access. Every call runs on the
//! blocking thread pool so SQLite I/O never stalls the async runtime.

use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use std::path::Path;

use super::schema::{apply_pragmas, initialize_schema};
use super::{Repository, RepositoryResult};
use crate::notification::{Level, Notification};

const SELECT_COLUMNS: &str = "id, user_id, title, body, level, icon, action_url, action_label, \
                              read, created_at";

/// SQLite-backed [`Repository`].
#[derive(Clone)]
pub struct SqliteRepository {
    pool: Pool<SqliteConnectionManager>,
    max_per_user: usize,
}

impl SqliteRepository {
    /// Open (creating if needed) the database at `db_path`.
    ///
    /// # Arguments
    ///
    /// * `db_path` - Path to the SQLite database file
    /// * `max_size` - Maximum number of connections in the pool
    /// * `max_per_user` - Rows kept per user; older rows are pruned on insert
    pub fn open<P: AsRef<Path>>(
        db_path: P,
        max_size: u32,
        max_per_user: usize,
    ) -> RepositoryResult<Self> {
        let manager = SqliteConnectionManager::file(db_path);

        let pool = Pool::builder()
            .max_size(max_size.max(1))
            .connection_customizer(Box::new(PragmaCustomizer))
            .build(manager)?;

        initialize_schema(&*pool.get()?)?;

        Ok(Self { pool, max_per_user })
    }

    /// Get the current pool state for monitoring.
    pub fn state(&self) -> r2d2::State {
        self.pool.state()
    }

    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        F: FnOnce(&Connection) -> RepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await?
    }

    async fn list(
        &self,
        user_id: &str,
        limit: usize,
        unread_only: bool,
    ) -> RepositoryResult<Vec<Notification>> {
        let user_id = user_id.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let filter = if unread_only { "AND read = 0" } else { "" };
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM notifications \
                 WHERE user_id = ?1 {filter} \
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2"
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt
                .query_map(params![user_id, limit], notification_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }
}

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    let level: String = row.get(4)?;
    let level = level
        .parse::<Level>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        level,
        icon: row.get(5)?,
        action_url: row.get(6)?,
        action_label: row.get(7)?,
        read: row.get(8)?,
        created_at: row.get(9)?,
    })
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn create(&self, notification: &Notification) -> RepositoryResult<()> {
        let n = notification.clone();
        let keep = i64::try_from(self.max_per_user).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO notifications \
                 (id, user_id, title, body, level, icon, action_url, action_label, read, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    n.id,
                    n.user_id,
                    n.title,
                    n.body,
                    n.level.as_str(),
                    n.icon,
                    n.action_url,
                    n.action_label,
                    n.read,
                    n.created_at,
                ],
            )?;
            tx.execute(
                "DELETE FROM notifications WHERE user_id = ?1 AND rowid NOT IN \
                 (SELECT rowid FROM notifications WHERE user_id = ?1 \
                  ORDER BY created_at DESC, rowid DESC LIMIT ?2)",
                params![n.user_id, keep],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_all(&self, user_id: &str, limit: usize) -> RepositoryResult<Vec<Notification>> {
        self.list(user_id, limit, false).await
    }

    async fn get_unread(
        &self,
        user_id: &str,
        limit: usize,
    ) -> RepositoryResult<Vec<Notification>> {
        self.list(user_id, limit, true).await
    }

    async fn mark_read(&self, user_id: &str, id: &str) -> RepositoryResult<()> {
        let user_id = user_id.to_string();
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND id = ?2",
                params![user_id, id],
            )?;
            Ok(())
        })
        .await
    }

    async fn mark_all_read(&self, user_id: &str) -> RepositoryResult<()> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
                params![user_id],
            )?;
            Ok(())
        })
        .await
    }

    async fn unread_count(&self, user_id: &str) -> RepositoryResult<usize> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
                params![user_id],
                |row| row.get(0),
            )?;
            Ok(usize::try_from(count).unwrap_or_default())
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

/// Connection customizer that applies pragmas on every checkout.
#[derive(Debug)]
struct PragmaCustomizer;

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        apply_pragmas(conn)
    }
}
