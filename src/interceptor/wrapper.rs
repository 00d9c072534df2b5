//! Interception wrapper around the outbound-call function.
//!
//! Untracked calls pass straight through. Tracked calls are timed, their
//! response is duplicated and interpreted, and the resulting record goes to
//! the registered sink. The caller always gets the original response.

use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use super::classifier::{extract_url, is_tracked_call};
use super::fetch::{Fetch, FetchError, FetchRef, FetchResponse, FetchSlot, RequestInit, RequestInput};
use crate::interpreter::ResponseInterpreter;
use crate::record::UsageRecord;

/// Receives every record produced by a tracked call.
pub trait RecordSink: Send + Sync {
    fn on_record(&self, record: UsageRecord) -> anyhow::Result<()>;
}

impl<F> RecordSink for F
where
    F: Fn(UsageRecord) -> anyhow::Result<()> + Send + Sync,
{
    fn on_record(&self, record: UsageRecord) -> anyhow::Result<()> {
        self(record)
    }
}

pub type SinkRef = Arc<dyn RecordSink>;

#[derive(Debug, Error)]
pub enum InterceptError {
    #[error("Telemetry processing panicked: {0}")]
    Panicked(String),
}

impl InterceptError {
    fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        InterceptError::Panicked(message)
    }
}

/// Result of [`Interceptor::install`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    AlreadyInstalled,
    /// The slot had no function to wrap.
    NoEntryPoint,
}

/// Fetch decorator that records telemetry for tracked calls.
pub struct InterceptedFetch {
    original: FetchRef,
    interpreter: ResponseInterpreter,
    sink: Option<SinkRef>,
}

impl InterceptedFetch {
    pub fn new(original: FetchRef, interpreter: ResponseInterpreter, sink: Option<SinkRef>) -> Self {
        Self {
            original,
            interpreter,
            sink,
        }
    }

    /// Time the call, interpret a duplicate of the response and emit the record.
    async fn handle_tracked(
        &self,
        url: &str,
        input: RequestInput,
        init: Option<RequestInit>,
    ) -> Result<FetchResponse, FetchError> {
        tracing::info!("Intercepted OpenAI API call: {}", url);

        let start = Instant::now();
        let response = self.original.fetch(input, init).await?;
        let duration_ms = start.elapsed().as_millis() as u64;

        let inspected = response.tee();
        let record = self.interpreter.interpret(&inspected, duration_ms);
        tracing::debug!(
            id = %record.id,
            model = %record.model,
            prompt_tokens = record.prompt_tokens,
            completion_tokens = record.completion_tokens,
            cost_cents = record.cost_cents,
            duration_ms = record.duration_ms,
            status = %record.status,
            "API call data"
        );
        self.emit(record);

        Ok(response)
    }

    /// Hand a record to the sink. Sink failures are logged and swallowed.
    fn emit(&self, record: UsageRecord) {
        let Some(sink) = &self.sink else {
            return;
        };
        let id = record.id.clone();
        match std::panic::catch_unwind(AssertUnwindSafe(|| sink.on_record(record))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Failed to save call data {}: {}", id, e),
            Err(payload) => tracing::error!(
                "Failed to save call data {}: {}",
                id,
                InterceptError::from_panic(payload)
            ),
        }
    }
}

#[async_trait]
impl Fetch for InterceptedFetch {
    async fn fetch(
        &self,
        input: RequestInput,
        init: Option<RequestInit>,
    ) -> Result<FetchResponse, FetchError> {
        let url = extract_url(&input);
        if !is_tracked_call(&url) {
            return self.original.fetch(input, init).await;
        }

        let retry_input = input.clone();
        let retry_init = init.clone();
        match AssertUnwindSafe(self.handle_tracked(&url, input, init))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => {
                tracing::error!("Logging error: {}", InterceptError::from_panic(payload));
                // Fallback to a plain call so the caller still gets a response
                self.original.fetch(retry_input, retry_init).await
            }
        }
    }
}

/// Installs an [`InterceptedFetch`] into a [`FetchSlot`] at most once.
pub struct Interceptor {
    interpreter: ResponseInterpreter,
    sink: Option<SinkRef>,
    installed: AtomicBool,
}

impl Interceptor {
    pub fn new(sink: Option<SinkRef>) -> Self {
        Self::with_interpreter(ResponseInterpreter::default(), sink)
    }

    pub fn with_interpreter(interpreter: ResponseInterpreter, sink: Option<SinkRef>) -> Self {
        Self {
            interpreter,
            sink,
            installed: AtomicBool::new(false),
        }
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    /// Wrap the function currently held by `slot`.
    ///
    /// Repeated calls are no-ops. An empty slot is logged and left alone.
    pub async fn install(&self, slot: &FetchSlot) -> InstallOutcome {
        if self
            .installed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Interceptor already installed");
            return InstallOutcome::AlreadyInstalled;
        }

        let interpreter = self.interpreter.clone();
        let sink = self.sink.clone();
        let wrapped = slot
            .wrap_with(move |original| {
                Arc::new(InterceptedFetch::new(original, interpreter, sink)) as FetchRef
            })
            .await;

        if wrapped {
            tracing::debug!("Outbound call interception installed");
            InstallOutcome::Installed
        } else {
            self.installed.store(false, Ordering::SeqCst);
            tracing::warn!("fetch is not available in this environment");
            InstallOutcome::NoEntryPoint
        }
    }
}
