//! # HTTP client
//!
//! [`HttpClient`] joins a [`Transport`] (usually a middleware [`Pipeline`])
//! with a [`RequestExecutor`]. Requests with an idempotent method go through
//! the retry policy; everything else, stream opening included, gets exactly
//! one attempt.
//!
//! [`Pipeline`]: crate::middleware::Pipeline

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::HttpError;
use crate::executor::RequestExecutor;
use crate::transport::{ByteStream, HttpRequest, HttpResponse, Transport};

/// Transport plus retry policy plus default headers.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    executor: RequestExecutor,
    default_headers: HeaderMap,
}

impl HttpClient {
    /// Create a client.
    pub fn new(transport: Arc<dyn Transport>, executor: RequestExecutor) -> Self {
        Self {
            transport,
            executor,
            default_headers: HeaderMap::new(),
        }
    }

    /// Send `name: value` on every request unless the request sets it.
    pub fn with_default_header(mut self, name: &str, value: &str) -> Result<Self, HttpError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| HttpError::invalid(format!("header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| HttpError::invalid(format!("header {name}: {e}")))?;
        let _ = self.default_headers.insert(name, value);
        Ok(self)
    }

    /// The retry policy in use.
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    fn decorate(&self, mut request: HttpRequest) -> HttpRequest {
        for (name, value) in &self.default_headers {
            if !request.headers.contains_key(name) {
                let _ = request.headers.insert(name.clone(), value.clone());
            }
        }
        request
    }

    /// Send a request; non-2xx becomes [`HttpError::Status`].
    ///
    /// Retried only when [`HttpRequest::is_idempotent`].
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let request = self.decorate(request);
        self.executor
            .execute(request.is_idempotent(), || {
                let request = request.clone();
                async move { self.transport.fetch(request).await?.error_for_status().await }
            })
            .await
    }

    /// Send a request and decode the JSON body inside the same attempt.
    pub async fn send_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T, HttpError> {
        let request = self.decorate(request);
        self.executor
            .execute(request.is_idempotent(), || {
                let request = request.clone();
                async move {
                    self.transport
                        .fetch(request)
                        .await?
                        .error_for_status()
                        .await?
                        .json::<T>()
                        .await
                }
            })
            .await
    }

    /// `GET url` as JSON, retried.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, HttpError> {
        self.send_json(HttpRequest::get(url)).await
    }

    /// `POST url` with a JSON body, decoded as JSON, not retried.
    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(HttpRequest::post_json(url, body)?).await
    }

    /// `POST url` asking for an event stream; returns the open body.
    ///
    /// Only opening the stream is bounded by the timeout. Reading it is not.
    pub async fn open_stream<B>(&self, url: &str, body: &B) -> Result<ByteStream, HttpError>
    where
        B: Serialize + ?Sized,
    {
        let request = HttpRequest::post_json(url, body)?.accept_event_stream();
        Ok(self.send(request).await?.into_stream())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ReqwestTransport;
    use assert_matches::assert_matches;
    use futures::StreamExt;
    use relay_core::RetryConfig;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> HttpClient {
        HttpClient::new(
            Arc::new(ReqwestTransport::new()),
            RequestExecutor::new(RetryConfig::default(), 5_000),
        )
        .with_default_header("x-api-key", "test-key")
        .unwrap()
    }

    #[tokio::test]
    async fn get_json_sends_default_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([1, 2])))
            .mount(&server)
            .await;

        let items: Vec<u32> = client()
            .get_json(&format!("{}/items", server.uri()))
            .await
            .unwrap();
        assert_eq!(items, vec![1, 2]);
    }

    #[tokio::test]
    async fn get_json_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": 1})))
            .with_priority(2)
            .mount(&server)
            .await;

        let body: serde_json::Value = client()
            .get_json(&format!("{}/flaky", server.uri()))
            .await
            .unwrap();
        assert_eq!(body["ok"], 1);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn post_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client()
            .post_json::<_, serde_json::Value>(&server.uri(), &serde_json::json!({}))
            .await
            .unwrap_err();
        assert_matches!(err, HttpError::Status { status: 500, body } if body == "boom");
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn idempotent_method_is_retried_through_send() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .with_priority(2)
            .mount(&server)
            .await;

        let request = HttpRequest::new(reqwest::Method::DELETE, server.uri());
        let response = client().send(request).await.unwrap();
        assert_eq!(response.status.as_u16(), 204);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn request_header_wins_over_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("x-api-key", "override"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!(true)))
            .mount(&server)
            .await;

        let request = HttpRequest::get(server.uri()).header("x-api-key", "override").unwrap();
        let ok: bool = client().send_json(request).await.unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn open_stream_returns_body_chunks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("accept", "text/event-stream"))
            .respond_with(ResponseTemplate::new(200).set_body_string("data: 1\n\ndata: 2\n\n"))
            .mount(&server)
            .await;

        let mut stream = client()
            .open_stream(&server.uri(), &serde_json::json!({"q": 1}))
            .await
            .unwrap();
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, b"data: 1\n\ndata: 2\n\n");
    }

    #[tokio::test]
    async fn open_stream_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = client()
            .open_stream(&server.uri(), &serde_json::json!({}))
            .await
            .err().expect("expected an error");
        assert_eq!(err.status(), Some(401));
    }
}
