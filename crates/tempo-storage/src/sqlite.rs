use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use tempo_core::*;

/// Default number of connections in the pool.
/// SQLite WAL mode supports 1 writer + N readers, so even a small pool
/// eliminates head-of-line blocking for concurrent read queries.
const DEFAULT_POOL_SIZE: usize = 4;

pub struct SqliteTaskStore {
    /// Connection pool — round-robin across `DEFAULT_POOL_SIZE` connections.
    /// Each connection is independently protected by a Mutex so callers can
    /// run synchronous rusqlite operations without holding an async lock.
    pool: Vec<Mutex<Connection>>,
    /// Atomic counter for round-robin slot selection.
    next_slot: std::sync::atomic::AtomicUsize,
}

impl SqliteTaskStore {
    /// Execute a synchronous closure with a pooled database connection.
    ///
    /// Picks the next connection via round-robin, locks it, runs the
    /// closure, then releases. Because the closure is `FnOnce` (not async),
    /// the `MutexGuard` is guaranteed to drop before any `.await` — making
    /// the enclosing future `Send`.
    fn with_conn<F, T>(&self, f: F) -> TempoResult<T>
    where
        F: FnOnce(&Connection) -> TempoResult<T>,
    {
        let idx = self
            .next_slot
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
            % self.pool.len();
        let conn = self.pool[idx]
            .lock()
            .map_err(|e| TempoError::Storage(e.to_string()))?;
        f(&conn)
    }

    fn open_connection(path: &Path) -> TempoResult<Connection> {
        let conn = Connection::open(path)
            .map_err(|e| TempoError::Storage(format!("failed to open sqlite: {e}")))?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;",
        )
        .map_err(|e| TempoError::Storage(format!("pragma error: {e}")))?;

        Ok(conn)
    }

    pub fn open(path: &Path) -> TempoResult<Self> {
        let mut pool = Vec::with_capacity(DEFAULT_POOL_SIZE);
        for _ in 0..DEFAULT_POOL_SIZE {
            pool.push(Mutex::new(Self::open_connection(path)?));
        }

        let store = Self {
            pool,
            next_slot: std::sync::atomic::AtomicUsize::new(0),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn open_in_memory() -> TempoResult<Self> {
        // In-memory DBs: use a shared cache URI so all pool connections see
        // the same data. Without this, each Connection::open_in_memory()
        // gets its own isolated database.
        //
        // SQLITE_OPEN_URI is required for rusqlite to parse the URI; the
        // default OpenFlags do NOT include it.
        let uri = format!(
            "file:memdb{}?mode=memory&cache=shared",
            Uuid::now_v7().simple()
        );
        let flags = rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
            | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
            | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX
            | rusqlite::OpenFlags::SQLITE_OPEN_URI;
        let mut pool = Vec::with_capacity(DEFAULT_POOL_SIZE);
        for _ in 0..DEFAULT_POOL_SIZE {
            let conn = Connection::open_with_flags(&uri, flags).map_err(|e| {
                TempoError::Storage(format!("failed to open in-memory sqlite: {e}"))
            })?;
            conn.execute_batch("PRAGMA foreign_keys=ON;")
                .map_err(|e| TempoError::Storage(format!("pragma error: {e}")))?;
            pool.push(Mutex::new(conn));
        }

        let store = Self {
            pool,
            next_slot: std::sync::atomic::AtomicUsize::new(0),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> TempoResult<()> {
        // Migrations run on slot 0 only — they need exclusive access.
        let conn = self.pool[0]
            .lock()
            .map_err(|e| TempoError::Storage(e.to_string()))?;

        const MIGRATIONS: &[(i64, &str)] =
            &[(1, include_str!("../migrations/001_initial.sql"))];

        // Migration 001 must always run first to create schema_version table.
        conn.execute_batch(MIGRATIONS[0].1)
            .map_err(|e| TempoError::Migration(format!("migration 001 failed: {e}")))?;

        let max_version: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for &(version, sql) in &MIGRATIONS[1..] {
            if version <= max_version {
                continue;
            }
            conn.execute_batch(sql)
                .map_err(|e| TempoError::Migration(format!("migration {version:03} failed: {e}")))?;
        }

        tracing::debug!(
            applied_up_to = MIGRATIONS.last().map(|(v, _)| *v).unwrap_or(0),
            "Migrations complete"
        );

        Ok(())
    }

    fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
        let id_str: String = row.get(0)?;
        let title: String = row.get(1)?;
        let description: String = row.get(2)?;
        let priority_str: String = row.get(3)?;
        let status_str: String = row.get(4)?;
        let due_at: String = row.get(5)?;
        let reminder_sent_at: Option<String> = row.get(6)?;
        let created_at: String = row.get(7)?;
        let updated_at: String = row.get(8)?;

        Ok(Task {
            id: parse_uuid_str(0, &id_str)?,
            title,
            description,
            priority: priority_str
                .parse()
                .map_err(|err: String| as_sql_conversion_error(3, err))?,
            status: status_str
                .parse()
                .map_err(|err: String| as_sql_conversion_error(4, err))?,
            due_at: parse_dt_strict(5, &due_at)?,
            reminder_sent_at: parse_optional_dt_strict(6, reminder_sent_at)?,
            created_at: parse_dt_strict(7, &created_at)?,
            updated_at: parse_dt_strict(8, &updated_at)?,
        })
    }

    fn row_to_settings(row: &rusqlite::Row<'_>) -> rusqlite::Result<NotificationSettings> {
        let enabled: i64 = row.get(0)?;
        let high_priority: i64 = row.get(1)?;
        let medium_priority: i64 = row.get(2)?;
        let low_priority: i64 = row.get(3)?;
        let reminder_minutes: u32 = row.get(4)?;
        let updated_at: String = row.get(5)?;

        Ok(NotificationSettings {
            enabled: enabled != 0,
            high_priority: high_priority != 0,
            medium_priority: medium_priority != 0,
            low_priority: low_priority != 0,
            reminder_minutes,
            updated_at: parse_dt_strict(5, &updated_at)?,
        })
    }
}

const TASK_COLUMNS: &str = "id, title, description, priority, status, due_at, \
     reminder_sent_at, created_at, updated_at";

fn as_sql_conversion_error(column: usize, message: impl Into<String>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            message.into(),
        )),
    )
}

fn parse_uuid_str(column: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err)))
}

fn parse_dt_strict(column: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err)))
}

fn parse_optional_dt_strict(
    column: usize,
    s: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match s {
        Some(value) => parse_dt_strict(column, &value).map(Some),
        None => Ok(None),
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn insert(&self, task: &Task) -> TempoResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, title, description, priority, status, due_at,
                 reminder_sent_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    task.id.to_string(),
                    task.title,
                    task.description,
                    task.priority.as_str(),
                    task.status.as_str(),
                    task.due_at.to_rfc3339(),
                    task.reminder_sent_at.map(|dt| dt.to_rfc3339()),
                    task.created_at.to_rfc3339(),
                    task.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| TempoError::Storage(format!("insert failed: {e}")))?;
            Ok(())
        })
    }

    async fn get(&self, id: Uuid) -> TempoResult<Option<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"))
                .map_err(|e| TempoError::Storage(e.to_string()))?;

            stmt.query_row(params![id.to_string()], Self::row_to_task)
                .optional()
                .map_err(|e| TempoError::Storage(e.to_string()))
        })
    }

    async fn update(&self, task: &Task) -> TempoResult<()> {
        self.with_conn(|conn| {
            let rows = conn
                .execute(
                    "UPDATE tasks SET title = ?2, description = ?3, priority = ?4,
                     status = ?5, due_at = ?6, reminder_sent_at = ?7, updated_at = ?8
                     WHERE id = ?1",
                    params![
                        task.id.to_string(),
                        task.title,
                        task.description,
                        task.priority.as_str(),
                        task.status.as_str(),
                        task.due_at.to_rfc3339(),
                        task.reminder_sent_at.map(|dt| dt.to_rfc3339()),
                        task.updated_at.to_rfc3339(),
                    ],
                )
                .map_err(|e| TempoError::Storage(format!("update failed: {e}")))?;

            if rows == 0 {
                return Err(TempoError::TaskNotFound(task.id));
            }
            Ok(())
        })
    }

    async fn delete(&self, id: Uuid) -> TempoResult<bool> {
        self.with_conn(|conn| {
            let rows = conn
                .execute("DELETE FROM tasks WHERE id = ?1", params![id.to_string()])
                .map_err(|e| TempoError::Storage(format!("delete failed: {e}")))?;
            Ok(rows > 0)
        })
    }

    async fn list(
        &self,
        filters: &TaskFilters,
        limit: usize,
        offset: usize,
    ) -> TempoResult<Vec<Task>> {
        self.with_conn(|conn| {
            let mut sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE 1=1");
            let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
            let mut param_idx = 1;

            if let Some(status) = filters.status {
                sql.push_str(&format!(" AND status = ?{param_idx}"));
                param_values.push(Box::new(status.as_str().to_string()));
                param_idx += 1;
            }

            if let Some(priority) = filters.priority {
                sql.push_str(&format!(" AND priority = ?{param_idx}"));
                param_values.push(Box::new(priority.as_str().to_string()));
                param_idx += 1;
            }

            sql.push_str(&format!(
                " ORDER BY due_at ASC LIMIT ?{param_idx} OFFSET ?{}",
                param_idx + 1
            ));
            param_values.push(Box::new(limit as i64));
            param_values.push(Box::new(offset as i64));

            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| TempoError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(
                    rusqlite::params_from_iter(param_values.iter().map(|p| p.as_ref())),
                    Self::row_to_task,
                )
                .map_err(|e| TempoError::Storage(e.to_string()))?;

            let mut tasks = Vec::new();
            for row in rows {
                tasks.push(row.map_err(|e| TempoError::Storage(e.to_string()))?);
            }
            Ok(tasks)
        })
    }

    async fn count(&self, filters: &TaskFilters) -> TempoResult<usize> {
        self.with_conn(|conn| {
            let mut sql = String::from("SELECT COUNT(*) FROM tasks WHERE 1=1");
            let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
            let mut param_idx = 1;

            if let Some(status) = filters.status {
                sql.push_str(&format!(" AND status = ?{param_idx}"));
                param_values.push(Box::new(status.as_str().to_string()));
                param_idx += 1;
            }

            if let Some(priority) = filters.priority {
                sql.push_str(&format!(" AND priority = ?{param_idx}"));
                param_values.push(Box::new(priority.as_str().to_string()));
            }

            let count: i64 = conn
                .query_row(
                    &sql,
                    rusqlite::params_from_iter(param_values.iter().map(|p| p.as_ref())),
                    |row| row.get(0),
                )
                .map_err(|e| TempoError::Storage(e.to_string()))?;
            Ok(count as usize)
        })
    }

    async fn list_due_between(
        &self,
        priority: Priority,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> TempoResult<Vec<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {TASK_COLUMNS} FROM tasks
                     WHERE status = 'pending' AND priority = ?1
                       AND due_at > ?2 AND due_at <= ?3
                     ORDER BY due_at ASC"
                ))
                .map_err(|e| TempoError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(
                    params![
                        priority.as_str(),
                        after.to_rfc3339(),
                        until.to_rfc3339()
                    ],
                    Self::row_to_task,
                )
                .map_err(|e| TempoError::Storage(e.to_string()))?;

            let mut tasks = Vec::new();
            for row in rows {
                tasks.push(row.map_err(|e| TempoError::Storage(e.to_string()))?);
            }
            Ok(tasks)
        })
    }

    async fn list_overdue(&self, now: DateTime<Utc>) -> TempoResult<Vec<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {TASK_COLUMNS} FROM tasks
                     WHERE status = 'pending' AND due_at < ?1
                     ORDER BY due_at ASC"
                ))
                .map_err(|e| TempoError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(params![now.to_rfc3339()], Self::row_to_task)
                .map_err(|e| TempoError::Storage(e.to_string()))?;

            let mut tasks = Vec::new();
            for row in rows {
                tasks.push(row.map_err(|e| TempoError::Storage(e.to_string()))?);
            }
            Ok(tasks)
        })
    }

    async fn mark_reminder_sent(&self, id: Uuid, at: DateTime<Utc>) -> TempoResult<()> {
        self.with_conn(|conn| {
            let rows = conn
                .execute(
                    "UPDATE tasks SET reminder_sent_at = ?2 WHERE id = ?1",
                    params![id.to_string(), at.to_rfc3339()],
                )
                .map_err(|e| TempoError::Storage(format!("mark reminder failed: {e}")))?;
            if rows == 0 {
                return Err(TempoError::TaskNotFound(id));
            }
            Ok(())
        })
    }

    async fn clear_reminder(&self, id: Uuid) -> TempoResult<()> {
        self.with_conn(|conn| {
            let rows = conn
                .execute(
                    "UPDATE tasks SET reminder_sent_at = NULL WHERE id = ?1",
                    params![id.to_string()],
                )
                .map_err(|e| TempoError::Storage(format!("clear reminder failed: {e}")))?;
            if rows == 0 {
                return Err(TempoError::TaskNotFound(id));
            }
            Ok(())
        })
    }

    async fn get_or_create_settings(&self) -> TempoResult<NotificationSettings> {
        self.with_conn(|conn| {
            let existing = conn
                .query_row(
                    "SELECT enabled, high_priority, medium_priority, low_priority,
                     reminder_minutes, updated_at FROM notification_settings WHERE id = 1",
                    [],
                    Self::row_to_settings,
                )
                .optional()
                .map_err(|e| TempoError::Storage(e.to_string()))?;

            if let Some(settings) = existing {
                return Ok(settings);
            }

            let defaults = NotificationSettings::default();
            conn.execute(
                "INSERT INTO notification_settings
                 (id, enabled, high_priority, medium_priority, low_priority,
                  reminder_minutes, updated_at)
                 VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    defaults.enabled as i64,
                    defaults.high_priority as i64,
                    defaults.medium_priority as i64,
                    defaults.low_priority as i64,
                    defaults.reminder_minutes,
                    defaults.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| TempoError::Storage(format!("settings insert failed: {e}")))?;
            Ok(defaults)
        })
    }

    async fn update_settings(&self, settings: &NotificationSettings) -> TempoResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notification_settings
                 (id, enabled, high_priority, medium_priority, low_priority,
                  reminder_minutes, updated_at)
                 VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                   enabled = excluded.enabled,
                   high_priority = excluded.high_priority,
                   medium_priority = excluded.medium_priority,
                   low_priority = excluded.low_priority,
                   reminder_minutes = excluded.reminder_minutes,
                   updated_at = excluded.updated_at",
                params![
                    settings.enabled as i64,
                    settings.high_priority as i64,
                    settings.medium_priority as i64,
                    settings.low_priority as i64,
                    settings.reminder_minutes,
                    settings.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| TempoError::Storage(format!("settings upsert failed: {e}")))?;
            Ok(())
        })
    }
}
