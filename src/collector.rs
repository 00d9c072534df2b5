//! Top-level handle tying storage, queue and interception together.

use anyhow::Context;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::config::Config;
use crate::interceptor::{FetchSlot, InstallOutcome, Interceptor, SinkRef};
use crate::queue::RecordQueue;
use crate::record::UsageRecord;
use crate::storage::{RecordStore, SharedRecordStore, SqliteStore};

struct Running {
    queue: RecordQueue,
    interceptor: Interceptor,
}

/// Telemetry collector for outbound LLM API calls.
///
/// `init` opens the store, starts the persistence queue and wraps the given
/// fetch slot. It runs once; later calls return immediately.
pub struct Miharu {
    config: Config,
    running: OnceCell<Running>,
}

impl Miharu {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            running: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.running.initialized()
    }

    /// Initialize against the configured SQLite database.
    ///
    /// Fails if the database cannot be opened or its schema created.
    pub async fn init(&self, slot: &FetchSlot) -> anyhow::Result<()> {
        let db_path = self.config.db_path.clone();
        self.init_inner(slot, || async move {
            let store = SqliteStore::open(&db_path)
                .await
                .with_context(|| format!("Failed to open database {}", db_path.display()))?;
            Ok(Arc::new(store) as SharedRecordStore)
        })
        .await
    }

    /// Initialize against an already opened store.
    pub async fn init_with_store(
        &self,
        slot: &FetchSlot,
        store: SharedRecordStore,
    ) -> anyhow::Result<()> {
        self.init_inner(slot, || async move { Ok(store) }).await
    }

    async fn init_inner<F, Fut>(&self, slot: &FetchSlot, open_store: F) -> anyhow::Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<SharedRecordStore>>,
    {
        let result = self
            .running
            .get_or_try_init(move || async move {
                tracing::info!("Initializing miharu");
                let store = open_store().await?;
                let queue = RecordQueue::new(store);
                let sink: SinkRef = Arc::new(queue.clone());
                let interceptor = Interceptor::new(Some(sink));

                if interceptor.install(slot).await == InstallOutcome::NoEntryPoint {
                    tracing::warn!("Calls will not be recorded: no outbound call function to wrap");
                }

                Ok::<_, anyhow::Error>(Running { queue, interceptor })
            })
            .await;

        if let Err(e) = &result {
            tracing::error!("Failed to initialize database: {:#}", e);
        }
        result.map(|_| ())
    }

    /// Whether outbound calls are currently being intercepted.
    pub fn is_intercepting(&self) -> bool {
        self.running
            .get()
            .map(|r| r.interceptor.is_installed())
            .unwrap_or(false)
    }

    /// The persistence queue, once initialized.
    pub fn queue(&self) -> Option<&RecordQueue> {
        self.running.get().map(|r| &r.queue)
    }

    /// All recorded calls, newest first.
    pub async fn records(&self) -> anyhow::Result<Vec<UsageRecord>> {
        let running = self.running.get().context("miharu is not initialized")?;
        Ok(running
            .queue
            .store()
            .select_all_ordered_by_timestamp_desc()
            .await?)
    }

    /// Flush pending records and close the store.
    pub async fn close(&self) -> anyhow::Result<()> {
        if let Some(running) = self.running.get() {
            running.queue.wait_idle().await;
            running.queue.store().close().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let temp = tempdir().unwrap();
        let miharu = Miharu::new(Config::default().with_db_path(temp.path().join("m.db")));
        let slot = FetchSlot::reqwest();

        miharu.init(&slot).await.unwrap();
        miharu.init(&slot).await.unwrap();

        assert!(miharu.is_initialized());
        assert!(miharu.is_intercepting());
        assert!(miharu.records().await.unwrap().is_empty());
        miharu.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_init_fails_when_database_cannot_open() {
        let temp = tempdir().unwrap();
        // A directory is not a database file
        let miharu = Miharu::new(Config::default().with_db_path(temp.path()));
        let slot = FetchSlot::reqwest();

        assert!(miharu.init(&slot).await.is_err());
        assert!(!miharu.is_initialized());
        assert!(miharu.records().await.is_err());
    }

    #[tokio::test]
    async fn test_init_without_entry_point_does_not_intercept() {
        let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
        let miharu = Miharu::new(Config::default());
        let slot = FetchSlot::empty();

        miharu.init_with_store(&slot, store).await.unwrap();
        assert!(miharu.is_initialized());
        assert!(!miharu.is_intercepting());
    }
}
