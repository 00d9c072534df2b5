//! SQLite-backed record store.

use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{RecordStore, StorageError, StorageResult};
use crate::record::{CallStatus, UsageRecord};

const CREATE_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS llm_calls (
        id TEXT PRIMARY KEY,
        timestamp INTEGER,
        model TEXT,
        prompt_tokens INTEGER,
        completion_tokens INTEGER,
        cost_cents REAL,
        duration_ms INTEGER,
        status TEXT
    )
";

const INSERT_SQL: &str = "
    INSERT INTO llm_calls (
        id, timestamp, model, prompt_tokens, completion_tokens,
        cost_cents, duration_ms, status
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
";

const SELECT_ALL_SQL: &str = "
    SELECT id, timestamp, model, prompt_tokens, completion_tokens,
           cost_cents, duration_ms, status
    FROM llm_calls
    ORDER BY timestamp DESC
";

/// Row as stored, before status validation.
struct StoredRow {
    id: String,
    timestamp: i64,
    model: String,
    prompt_tokens: i64,
    completion_tokens: i64,
    cost_cents: f64,
    duration_ms: i64,
    status: String,
}

impl TryFrom<StoredRow> for UsageRecord {
    type Error = StorageError;

    fn try_from(row: StoredRow) -> Result<Self, Self::Error> {
        let status = CallStatus::parse(&row.status).ok_or_else(|| StorageError::InvalidRow {
            id: row.id.clone(),
            reason: format!("unknown status '{}'", row.status),
        })?;

        Ok(UsageRecord {
            prompt_tokens: from_column(&row.id, "prompt_tokens", row.prompt_tokens)?,
            completion_tokens: from_column(&row.id, "completion_tokens", row.completion_tokens)?,
            duration_ms: from_column(&row.id, "duration_ms", row.duration_ms)?,
            id: row.id,
            timestamp: row.timestamp,
            model: row.model,
            cost_cents: row.cost_cents,
            status,
        })
    }
}

/// SQLite integers are signed; counts above `i64::MAX` cannot be stored.
fn to_column(id: &str, column: &str, value: u64) -> StorageResult<i64> {
    i64::try_from(value).map_err(|_| StorageError::InvalidRow {
        id: id.to_string(),
        reason: format!("{} {} does not fit in an INTEGER column", column, value),
    })
}

fn from_column(id: &str, column: &str, value: i64) -> StorageResult<u64> {
    u64::try_from(value).map_err(|_| StorageError::InvalidRow {
        id: id.to_string(),
        reason: format!("negative {} {}", column, value),
    })
}

/// Record store over a single SQLite connection.
///
/// Blocking SQLite work runs on the blocking thread pool; the connection is
/// guarded by a mutex so only one statement runs at a time.
pub struct SqliteStore {
    path: Option<PathBuf>,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub async fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let open_path = path.clone();
        let conn = tokio::task::spawn_blocking(move || Connection::open(open_path))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))??;

        let store = Self {
            path: Some(path),
            conn: Arc::new(Mutex::new(Some(conn))),
        };
        store.ensure_schema().await?;

        tracing::info!("Opened call database at {}", store.describe());
        Ok(store)
    }

    /// Private in-memory database, mostly for tests.
    pub async fn open_in_memory() -> StorageResult<Self> {
        let conn = tokio::task::spawn_blocking(Connection::open_in_memory)
            .await
            .map_err(|e| StorageError::Task(e.to_string()))??;
        let store = Self {
            path: None,
            conn: Arc::new(Mutex::new(Some(conn))),
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create the `llm_calls` table if it does not exist.
    pub async fn ensure_schema(&self) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute_batch(CREATE_TABLE_SQL)?;
            Ok(())
        })
        .await
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn describe(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ":memory:".to_string())
    }

    /// Run `f` against the open connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let conn = guard.as_ref().ok_or(StorageError::Closed)?;
            f(conn)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert_one(&self, record: &UsageRecord) -> StorageResult<()> {
        let record = record.clone();
        let prompt_tokens = to_column(&record.id, "prompt_tokens", record.prompt_tokens)?;
        let completion_tokens =
            to_column(&record.id, "completion_tokens", record.completion_tokens)?;
        let duration_ms = to_column(&record.id, "duration_ms", record.duration_ms)?;

        self.with_conn(move |conn| {
            conn.execute(
                INSERT_SQL,
                params![
                    record.id,
                    record.timestamp,
                    record.model,
                    prompt_tokens,
                    completion_tokens,
                    record.cost_cents,
                    duration_ms,
                    record.status.as_str(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn select_all_ordered_by_timestamp_desc(&self) -> StorageResult<Vec<UsageRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(SELECT_ALL_SQL)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(StoredRow {
                        id: row.get(0)?,
                        timestamp: row.get(1)?,
                        model: row.get(2)?,
                        prompt_tokens: row.get(3)?,
                        completion_tokens: row.get(4)?,
                        cost_cents: row.get(5)?,
                        duration_ms: row.get(6)?,
                        status: row.get(7)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter().map(UsageRecord::try_from).collect()
        })
        .await
    }

    async fn close(&self) -> StorageResult<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            match guard.take() {
                Some(conn) => conn.close().map_err(|(_, e)| StorageError::Sqlite(e)),
                None => Ok(()),
            }
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}
