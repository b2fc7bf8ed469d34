//! # Middleware chain
//!
//! A [`Middleware`] sees one request on its way to the transport and the
//! response on its way back. It may call [`Next::run`] zero, one, or several
//! times, which is how the payment layer retries a challenged request without
//! the request executor knowing about it.
//!
//! [`Pipeline`] composes middleware in registration order around a base
//! transport and is itself a [`Transport`].

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::HttpError;
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// One layer of request handling.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Handle a request, delegating to `next` for the rest of the chain.
    async fn attempt(&self, request: HttpRequest, next: Next<'_>) -> Result<HttpResponse, HttpError>;
}

/// The remainder of a middleware chain.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    transport: &'a dyn Transport,
    chain: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    /// Run the rest of the chain (ending at the transport).
    pub async fn run(self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        match self.chain.split_first() {
            Some((head, rest)) => {
                let next = Next {
                    transport: self.transport,
                    chain: rest,
                };
                head.attempt(request, next).await
            }
            None => self.transport.fetch(request).await,
        }
    }
}

/// A transport wrapped in middleware.
#[derive(Clone)]
pub struct Pipeline {
    transport: Arc<dyn Transport>,
    chain: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    /// Start a pipeline around a base transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            chain: Vec::new(),
        }
    }

    /// Append a middleware. The first registered runs outermost.
    #[must_use]
    pub fn with(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.chain.push(middleware);
        self
    }

    /// Number of registered middleware.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Whether no middleware is registered.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

#[async_trait]
impl Transport for Pipeline {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        Next {
            transport: self.transport.as_ref(),
            chain: &self.chain,
        }
        .run(request)
        .await
    }
}

/// Logs every round trip at `debug`, marking event-stream requests.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingMiddleware;

#[async_trait]
impl Middleware for TracingMiddleware {
    async fn attempt(&self, request: HttpRequest, next: Next<'_>) -> Result<HttpResponse, HttpError> {
        let method = request.method.clone();
        let url = request.url.clone();
        let stream = request.expects_event_stream();
        let started = Instant::now();
        let result = next.run(request).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &result {
            Ok(response) => debug!(%method, %url, stream, status = response.status.as_u16(), elapsed_ms, "http round trip"),
            Err(e) => debug!(%method, %url, stream, error = %e, elapsed_ms, "http round trip failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use reqwest::StatusCode;
    use reqwest::header::HeaderMap;

    /// Records every request and answers 200 with the `x-trace` header echoed.
    #[derive(Default)]
    struct EchoTransport {
        seen: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl Transport for EchoTransport {
        async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            let trace = request
                .headers
                .get("x-trace")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            self.seen.lock().push(request);
            Ok(HttpResponse::from_bytes(StatusCode::OK, HeaderMap::new(), trace))
        }
    }

    /// Appends its tag to the `x-trace` header before forwarding.
    struct Tag(&'static str);

    #[async_trait]
    impl Middleware for Tag {
        async fn attempt(&self, request: HttpRequest, next: Next<'_>) -> Result<HttpResponse, HttpError> {
            let current = request
                .headers
                .get("x-trace")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            let request = request.header("x-trace", &format!("{current}{}", self.0))?;
            next.run(request).await
        }
    }

    /// Calls the rest of the chain twice and returns the second response.
    struct Twice;

    #[async_trait]
    impl Middleware for Twice {
        async fn attempt(&self, request: HttpRequest, next: Next<'_>) -> Result<HttpResponse, HttpError> {
            let _ = next.run(request.clone()).await?;
            next.run(request).await
        }
    }

    #[tokio::test]
    async fn empty_pipeline_hits_transport() {
        let transport = Arc::new(EchoTransport::default());
        let pipeline = Pipeline::new(transport.clone());
        assert!(pipeline.is_empty());
        let response = pipeline.fetch(HttpRequest::get("http://x")).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(transport.seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn middleware_runs_in_registration_order() {
        let transport = Arc::new(EchoTransport::default());
        let pipeline = Pipeline::new(transport)
            .with(Arc::new(Tag("a")))
            .with(Arc::new(Tag("b")))
            .with(Arc::new(TracingMiddleware));
        assert_eq!(pipeline.len(), 3);
        let response = pipeline.fetch(HttpRequest::get("http://x")).await.unwrap();
        assert_eq!(response.text().await.unwrap(), "ab");
    }

    #[tokio::test]
    async fn middleware_may_repeat_the_inner_chain() {
        let transport = Arc::new(EchoTransport::default());
        let pipeline = Pipeline::new(transport.clone())
            .with(Arc::new(Twice))
            .with(Arc::new(Tag("x")));
        let response = pipeline.fetch(HttpRequest::get("http://x")).await.unwrap();
        // Inner layers see a fresh clone each time, so tags do not accumulate
        assert_eq!(response.text().await.unwrap(), "x");
        assert_eq!(transport.seen.lock().len(), 2);
    }
}
