//! Outbound HTTP call abstraction.
//!
//! Everything that performs an outbound call goes through a [`Fetch`]
//! implementation held in a [`FetchSlot`]. The slot is the single replaceable
//! entry point that the interceptor wraps at startup.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid request URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("No outbound call function is installed")]
    Unavailable,
}

/// A request object that carries its own target and options.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl OutboundRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// The three accepted shapes of a call target.
#[derive(Debug, Clone)]
pub enum RequestInput {
    /// Plain URL string
    Str(String),
    /// Parsed URL
    Url(url::Url),
    /// Full request object
    Request(OutboundRequest),
}

impl From<&str> for RequestInput {
    fn from(value: &str) -> Self {
        RequestInput::Str(value.to_string())
    }
}

impl From<String> for RequestInput {
    fn from(value: String) -> Self {
        RequestInput::Str(value)
    }
}

impl From<url::Url> for RequestInput {
    fn from(value: url::Url) -> Self {
        RequestInput::Url(value)
    }
}

impl From<OutboundRequest> for RequestInput {
    fn from(value: OutboundRequest) -> Self {
        RequestInput::Request(value)
    }
}

/// Per-call options that override what the input carries.
#[derive(Debug, Clone, Default)]
pub struct RequestInit {
    pub method: Option<Method>,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl RequestInit {
    /// JSON POST with the given payload.
    pub fn json_post(payload: &serde_json::Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        Self {
            method: Some(Method::POST),
            headers,
            body: Some(Bytes::from(payload.to_string())),
        }
    }
}

/// A fully buffered response.
///
/// The body is held in a shared [`Bytes`] buffer, so [`FetchResponse::tee`]
/// yields a duplicate that can be read without touching the original.
#[derive(Debug)]
pub struct FetchResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl FetchResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Whether the status is 2xx.
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Duplicate the response. Both copies share the same body buffer.
    pub fn tee(&self) -> Self {
        Self {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

/// The function that performs an outbound HTTP call.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(
        &self,
        input: RequestInput,
        init: Option<RequestInit>,
    ) -> Result<FetchResponse, FetchError>;
}

/// Shared reference to a fetch implementation.
pub type FetchRef = Arc<dyn Fetch>;

/// `reqwest`-backed fetch that buffers the full body before returning.
#[derive(Debug, Clone, Default)]
pub struct ReqwestFetch {
    client: Client,
}

impl ReqwestFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for ReqwestFetch {
    async fn fetch(
        &self,
        input: RequestInput,
        init: Option<RequestInit>,
    ) -> Result<FetchResponse, FetchError> {
        let (raw_url, mut method, mut headers, mut body) = match input {
            RequestInput::Str(s) => (s, Method::GET, HeaderMap::new(), None),
            RequestInput::Url(u) => (u.to_string(), Method::GET, HeaderMap::new(), None),
            RequestInput::Request(r) => (r.url, r.method, r.headers, r.body),
        };

        if let Some(init) = init {
            if let Some(m) = init.method {
                method = m;
            }
            headers.extend(init.headers);
            if init.body.is_some() {
                body = init.body;
            }
        }

        let url = url::Url::parse(&raw_url).map_err(|e| FetchError::InvalidUrl {
            url: raw_url.clone(),
            reason: e.to_string(),
        })?;

        let mut request = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(FetchResponse::new(status, headers, body))
    }
}

/// The replaceable outbound-call entry point.
///
/// Call sites hold a shared slot and dispatch through [`FetchSlot::fetch`];
/// the interceptor swaps the inner function once at install time.
#[derive(Default)]
pub struct FetchSlot {
    current: RwLock<Option<FetchRef>>,
}

impl FetchSlot {
    pub fn new(fetch: FetchRef) -> Self {
        Self {
            current: RwLock::new(Some(fetch)),
        }
    }

    /// A slot with no outbound-call function.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Slot backed by a default `reqwest` client.
    pub fn reqwest() -> Self {
        Self::new(Arc::new(ReqwestFetch::new()))
    }

    pub async fn current(&self) -> Option<FetchRef> {
        self.current.read().await.clone()
    }

    /// Replace the current function with `wrap(current)`.
    ///
    /// Returns `false` without calling `wrap` when the slot is empty.
    pub async fn wrap_with<F>(&self, wrap: F) -> bool
    where
        F: FnOnce(FetchRef) -> FetchRef,
    {
        let mut current = self.current.write().await;
        match current.take() {
            Some(original) => {
                *current = Some(wrap(original));
                true
            }
            None => false,
        }
    }

    /// Dispatch a call through the current function.
    pub async fn fetch(
        &self,
        input: impl Into<RequestInput>,
        init: Option<RequestInit>,
    ) -> Result<FetchResponse, FetchError> {
        let fetch = self.current().await.ok_or(FetchError::Unavailable)?;
        fetch.fetch(input.into(), init).await
    }
}

impl std::fmt::Debug for FetchSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchSlot").finish_non_exhaustive()
    }
}
