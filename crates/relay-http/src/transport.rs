//! # Transport boundary
//!
//! [`Transport`] is the single `fetch(request) -> response` capability the
//! rest of relay builds on. Response bodies stay streaming until a caller
//! asks for them, so the same type serves JSON calls and event streams.

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::HttpError;

/// Streaming response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, HttpError>> + Send>>;

/// Media type of server-sent event streams.
pub const EVENT_STREAM: &str = "text/event-stream";

// ─────────────────────────────────────────────────────────────────────────────
// Request
// ─────────────────────────────────────────────────────────────────────────────

/// An outbound request. Cheap to clone (the body is reference counted).
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Option<Bytes>,
}

impl HttpRequest {
    /// Build a bodiless request.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// `GET url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// `POST url` with a JSON body.
    pub fn post_json<B: Serialize + ?Sized>(url: impl Into<String>, body: &B) -> Result<Self, HttpError> {
        let bytes = serde_json::to_vec(body)?;
        let mut request = Self::new(Method::POST, url);
        let _ = request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        request.body = Some(Bytes::from(bytes));
        Ok(request)
    }

    /// Add or replace a header.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, HttpError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| HttpError::invalid(format!("header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| HttpError::invalid(format!("header {name}: {e}")))?;
        let _ = self.headers.insert(name, value);
        Ok(self)
    }

    /// Ask for an event stream response.
    #[must_use]
    pub fn accept_event_stream(mut self) -> Self {
        let _ = self.headers.insert(ACCEPT, HeaderValue::from_static(EVENT_STREAM));
        self
    }

    /// Whether the caller declared it expects an event stream.
    pub fn expects_event_stream(&self) -> bool {
        self.headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains(EVENT_STREAM))
    }

    /// Read-style methods that are safe to repeat.
    pub fn is_idempotent(&self) -> bool {
        matches!(
            self.method,
            Method::GET | Method::HEAD | Method::OPTIONS | Method::PUT | Method::DELETE
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response
// ─────────────────────────────────────────────────────────────────────────────

/// A response whose body has not been read yet.
pub struct HttpResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    body: ByteStream,
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl HttpResponse {
    /// Wrap a streaming body.
    pub fn new(status: StatusCode, headers: HeaderMap, body: ByteStream) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Build a response from an in-memory body.
    pub fn from_bytes(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self::new(
            status,
            headers,
            Box::pin(futures::stream::once(async move { Ok(body) })),
        )
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// First value of a header as text.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Consume into the raw body stream.
    pub fn into_stream(self) -> ByteStream {
        self.body
    }

    /// Read the whole body.
    pub async fn bytes(self) -> Result<Bytes, HttpError> {
        let mut body = self.body;
        let mut buffer = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(buffer.freeze())
    }

    /// Read the whole body as (lossy) UTF-8.
    pub async fn text(self) -> Result<String, HttpError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read and decode a JSON body.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, HttpError> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Turn a non-2xx response into [`HttpError::Status`] carrying the body.
    pub async fn error_for_status(self) -> Result<Self, HttpError> {
        if self.is_success() {
            return Ok(self);
        }
        let status = self.status.as_u16();
        let body = self.text().await.unwrap_or_default();
        Err(HttpError::Status { status, body })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────────────────────────

/// One round trip to a remote server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and return once response headers arrive.
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Transport backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with relay's default client settings.
    ///
    /// No overall request timeout is set: streams may legitimately run for
    /// minutes. Per-attempt deadlines come from the request executor.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .user_agent(relay_core::constants::USER_AGENT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let response = builder.send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(HttpError::from));
        Ok(HttpResponse::new(status, headers, Box::pin(body)))
    }
}
