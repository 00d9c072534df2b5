//! Ordered single-writer persistence queue.
//!
//! Producers call [`RecordQueue::enqueue`] from any thread and return
//! immediately. A single drain task writes records to the store one at a
//! time in submission order. The pending list and the draining flag live
//! under one mutex, so a record pushed while a drain is finishing is either
//! seen by that drain or starts a new one.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::Notify;

use crate::interceptor::RecordSink;
use crate::record::UsageRecord;
use crate::storage::{RecordStore, SharedRecordStore};

/// Drain state of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Draining,
}

#[derive(Default)]
struct Pending {
    records: VecDeque<UsageRecord>,
    draining: bool,
}

struct Inner {
    pending: Mutex<Pending>,
    store: SharedRecordStore,
    idle: Notify,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write queued records until none are left, then go idle.
    async fn drain(self: Arc<Self>) {
        loop {
            let next = {
                let mut pending = self.lock();
                match pending.records.pop_front() {
                    Some(record) => record,
                    None => {
                        pending.draining = false;
                        break;
                    }
                }
            };

            match AssertUnwindSafe(self.store.insert_one(&next))
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!("Database error while saving call {}: {}", next.id, e);
                }
                Err(payload) => {
                    tracing::error!(
                        "Store panicked while saving call {}: {}",
                        next.id,
                        panic_message(payload.as_ref())
                    );
                }
            }
        }
        self.idle.notify_waiters();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Fire-and-forget queue in front of a [`RecordStore`](crate::storage::RecordStore).
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct RecordQueue {
    inner: Arc<Inner>,
    runtime: Handle,
}

impl RecordQueue {
    /// Create a queue writing to `store`.
    ///
    /// Must be called within a Tokio runtime; drains are spawned on it.
    pub fn new(store: SharedRecordStore) -> Self {
        Self::with_runtime(store, Handle::current())
    }

    pub fn with_runtime(store: SharedRecordStore, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                pending: Mutex::new(Pending::default()),
                store,
                idle: Notify::new(),
            }),
            runtime,
        }
    }

    /// Append a record and start a drain if none is running.
    pub fn enqueue(&self, record: UsageRecord) {
        let start_drain = {
            let mut pending = self.inner.lock();
            pending.records.push_back(record);
            if pending.draining {
                false
            } else {
                pending.draining = true;
                true
            }
        };

        if start_drain {
            let inner = Arc::clone(&self.inner);
            self.runtime.spawn(inner.drain());
        }
    }

    pub fn state(&self) -> QueueState {
        if self.inner.lock().draining {
            QueueState::Draining
        } else {
            QueueState::Idle
        }
    }

    /// Records waiting to be written (excluding one in flight).
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until every record enqueued so far has been attempted.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.state() == QueueState::Idle {
                return;
            }
            notified.await;
        }
    }

    pub fn store(&self) -> &SharedRecordStore {
        &self.inner.store
    }
}

impl RecordSink for RecordQueue {
    fn on_record(&self, record: UsageRecord) -> anyhow::Result<()> {
        self.enqueue(record);
        Ok(())
    }
}

impl std::fmt::Debug for RecordQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordQueue")
            .field("state", &self.state())
            .field("pending", &self.len())
            .finish()
    }
}
