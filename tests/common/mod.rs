//! Shared test doubles for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use miharu::interceptor::{Fetch, FetchError, FetchResponse, RequestInit, RequestInput};
use miharu::storage::{RecordStore, StorageError, StorageResult};
use miharu::UsageRecord;

/// Record store that tracks concurrency and insertion order.
#[derive(Default)]
pub struct InstrumentedStore {
    inserted: Mutex<Vec<UsageRecord>>,
    attempts: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fail_inserts: AtomicBool,
    panic_next_insert: AtomicBool,
    insert_delay: Option<Duration>,
}

impl InstrumentedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every insert takes at least `delay`.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            insert_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Every insert fails.
    pub fn failing() -> Self {
        let store = Self::default();
        store.fail_inserts.store(true, Ordering::SeqCst);
        store
    }

    /// The next insert panics, later ones behave normally.
    pub fn panicking_once() -> Self {
        let store = Self::default();
        store.panic_next_insert.store(true, Ordering::SeqCst);
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_inserts.store(failing, Ordering::SeqCst);
    }

    pub fn inserted_ids(&self) -> Vec<String> {
        self.inserted
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.id.clone())
            .collect()
    }

    /// Records in the order they were written.
    pub fn inserted_records(&self) -> Vec<UsageRecord> {
        self.inserted.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for InstrumentedStore {
    async fn insert_one(&self, record: &UsageRecord) -> StorageResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.panic_next_insert.swap(false, Ordering::SeqCst) {
            panic!("storage engine crashed");
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        match self.insert_delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        let result = if self.fail_inserts.load(Ordering::SeqCst) {
            Err(StorageError::Backend("disk full".to_string()))
        } else {
            self.inserted.lock().unwrap().push(record.clone());
            Ok(())
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn select_all_ordered_by_timestamp_desc(&self) -> StorageResult<Vec<UsageRecord>> {
        let mut records = self.inserted.lock().unwrap().clone();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// What a [`ScriptedFetch`] does on each call.
pub enum Script {
    Respond { status: StatusCode, body: Bytes },
    Fail(String),
    /// Panic on the first call, then respond.
    PanicOnce { status: StatusCode, body: Bytes },
}

/// Fetch double that follows a script and counts calls.
pub struct ScriptedFetch {
    script: Script,
    delay: Option<Duration>,
    calls: AtomicUsize,
    panicked: AtomicBool,
}

impl ScriptedFetch {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            delay: None,
            calls: AtomicUsize::new(0),
            panicked: AtomicBool::new(false),
        }
    }

    pub fn responding(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::new(Script::Respond {
            status,
            body: body.into(),
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetch for ScriptedFetch {
    async fn fetch(
        &self,
        _input: RequestInput,
        _init: Option<RequestInit>,
    ) -> Result<FetchResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.script {
            Script::Respond { status, body } => {
                Ok(FetchResponse::new(*status, HeaderMap::new(), body.clone()))
            }
            Script::Fail(message) => Err(FetchError::Transport(message.clone())),
            Script::PanicOnce { status, body } => {
                if !self.panicked.swap(true, Ordering::SeqCst) {
                    panic!("transport blew up");
                }
                Ok(FetchResponse::new(*status, HeaderMap::new(), body.clone()))
            }
        }
    }
}

pub const CHAT_COMPLETION_BODY: &str = r#"{
    "id": "abc",
    "object": "chat.completion",
    "created": 1700000000,
    "model": "gpt-3.5-turbo",
    "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15},
    "choices": [{"message": {"role": "assistant", "content": "hi"}, "finish_reason": "stop", "index": 0}]
}"#;

pub const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
