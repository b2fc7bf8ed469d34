//! # x402 payment middleware
//!
//! Servers that charge per call answer `402 Payment Required` with a JSON
//! challenge listing acceptable payment requirements. [`PaymentMiddleware`]
//! picks one, asks a [`PaymentSigner`] for an `X-PAYMENT` header value, and
//! retries the request exactly once. A settled call carries a base64 JSON
//! receipt in `X-PAYMENT-RESPONSE`, which is decoded, logged, and kept as the
//! middleware instance's most recent receipt.
//!
//! Signing itself (keys, wallets) lives behind the [`PaymentSigner`] trait.

use std::process::Stdio;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::errors::HttpError;
use crate::middleware::{Middleware, Next};
use crate::transport::{HttpRequest, HttpResponse};

/// Request header carrying the signed payment.
pub const PAYMENT_HEADER: &str = "x-payment";
/// Response header carrying the settlement receipt.
pub const PAYMENT_RESPONSE_HEADER: &str = "x-payment-response";

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

/// One acceptable way to pay for a resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme (e.g. `exact`).
    pub scheme: String,
    /// Settlement network (e.g. `base`, `solana`).
    pub network: String,
    /// Amount in the asset's smallest unit, as a decimal string.
    pub max_amount_required: String,
    /// Resource being paid for.
    #[serde(default)]
    pub resource: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Recipient address.
    pub pay_to: String,
    /// Asset address or mint.
    pub asset: String,
    /// Validity window of a signed payment.
    #[serde(default)]
    pub max_timeout_seconds: u64,
    /// Scheme-specific extras.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

/// Body of a `402` response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentChallenge {
    /// Protocol version.
    pub x402_version: u32,
    /// Acceptable requirements, in server preference order.
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
    /// Server explanation, set when a previous payment was rejected.
    #[serde(default)]
    pub error: Option<String>,
}

impl PaymentChallenge {
    /// Pick the requirement for `network`, or the first one when unset.
    pub fn select(&self, network: Option<&str>) -> Option<&PaymentRequirements> {
        match network {
            Some(network) => self
                .accepts
                .iter()
                .find(|r| r.network.eq_ignore_ascii_case(network)),
            None => self.accepts.first(),
        }
    }
}

/// Settlement receipt from `X-PAYMENT-RESPONSE`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentReceipt {
    /// Whether settlement succeeded.
    pub success: bool,
    /// Transaction hash or signature.
    pub transaction: Option<String>,
    /// Network it settled on.
    pub network: Option<String>,
    /// Paying address.
    pub payer: Option<String>,
    /// Failure reason, when not successful.
    pub error_reason: Option<String>,
}

impl PaymentReceipt {
    /// Decode a base64 JSON receipt header value.
    pub fn decode(header: &str) -> Option<Self> {
        let raw = STANDARD.decode(header.trim()).ok()?;
        serde_json::from_slice(&raw).ok()
    }

    /// Encode as a header value.
    pub fn encode(&self) -> String {
        STANDARD.encode(serde_json::to_vec(self).unwrap_or_default())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Signer
// ─────────────────────────────────────────────────────────────────────────────

/// Produces the `X-PAYMENT` header value for a chosen requirement.
#[async_trait]
pub trait PaymentSigner: Send + Sync {
    /// Sign a payment satisfying `requirements`.
    async fn sign(
        &self,
        x402_version: u32,
        requirements: &PaymentRequirements,
    ) -> Result<String, HttpError>;
}

/// Delegates signing to an external program.
///
/// The program receives `{"x402Version": n, "requirements": {...}}` on stdin
/// and must print the header value on stdout.
#[derive(Clone, Debug)]
pub struct CommandSigner {
    program: String,
    args: Vec<String>,
}

impl CommandSigner {
    /// Build from a whitespace-separated command line.
    pub fn from_command_line(command: &str) -> Result<Self, HttpError> {
        let mut parts = command.split_whitespace().map(str::to_owned);
        let program = parts
            .next()
            .ok_or_else(|| HttpError::invalid("empty payment signer command"))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

#[async_trait]
impl PaymentSigner for CommandSigner {
    async fn sign(
        &self,
        x402_version: u32,
        requirements: &PaymentRequirements,
    ) -> Result<String, HttpError> {
        let input = serde_json::to_vec(&serde_json::json!({
            "x402Version": x402_version,
            "requirements": requirements,
        }))?;

        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| payment_error(format!("spawn {}: {e}", self.program)))?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(&input).await {
                Ok(()) => {}
                // Signer exited without reading its input
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(payment_error(format!("write signer stdin: {e}"))),
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| payment_error(format!("wait for signer: {e}")))?;
        if !output.status.success() {
            return Err(payment_error(format!(
                "signer exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let header = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if header.is_empty() {
            return Err(payment_error("signer printed nothing"));
        }
        Ok(header)
    }
}

fn payment_error(message: impl Into<String>) -> HttpError {
    HttpError::Payment {
        message: message.into(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Middleware
// ─────────────────────────────────────────────────────────────────────────────

/// Answers `402` challenges once per request.
pub struct PaymentMiddleware<S> {
    signer: S,
    network: Option<String>,
    last_receipt: Mutex<Option<PaymentReceipt>>,
}

impl<S: PaymentSigner> PaymentMiddleware<S> {
    /// Create a middleware using `signer`.
    pub fn new(signer: S) -> Self {
        Self {
            signer,
            network: None,
            last_receipt: Mutex::new(None),
        }
    }

    /// Prefer requirements on `network`.
    #[must_use]
    pub fn with_network(mut self, network: Option<String>) -> Self {
        self.network = network;
        self
    }

    /// Most recent settlement receipt seen by this instance.
    pub fn last_receipt(&self) -> Option<PaymentReceipt> {
        self.last_receipt.lock().clone()
    }

    fn record_receipt(&self, response: &HttpResponse) {
        let Some(raw) = response.header_str(PAYMENT_RESPONSE_HEADER) else {
            return;
        };
        match PaymentReceipt::decode(raw) {
            Some(receipt) => {
                info!(
                    success = receipt.success,
                    transaction = receipt.transaction.as_deref().unwrap_or(""),
                    network = receipt.network.as_deref().unwrap_or(""),
                    "payment settled"
                );
                *self.last_receipt.lock() = Some(receipt);
            }
            None => warn!("undecodable payment receipt header, ignoring"),
        }
    }
}

#[async_trait]
impl<S: PaymentSigner> Middleware for PaymentMiddleware<S> {
    async fn attempt(&self, request: HttpRequest, next: Next<'_>) -> Result<HttpResponse, HttpError> {
        let response = next.run(request.clone()).await?;
        if response.status != StatusCode::PAYMENT_REQUIRED {
            self.record_receipt(&response);
            return Ok(response);
        }

        let body = response.bytes().await?;
        let challenge: PaymentChallenge = serde_json::from_slice(&body)
            .map_err(|e| payment_error(format!("unreadable 402 challenge: {e}")))?;
        let requirements = challenge.select(self.network.as_deref()).ok_or_else(|| {
            payment_error(format!(
                "no acceptable payment requirement (network {:?}, {} offered)",
                self.network,
                challenge.accepts.len()
            ))
        })?;
        debug!(
            url = %request.url,
            network = %requirements.network,
            amount = %requirements.max_amount_required,
            "answering payment challenge"
        );

        let header = self.signer.sign(challenge.x402_version, requirements).await?;
        let paid = request.header(PAYMENT_HEADER, &header)?;
        let response = next.run(paid).await?;

        if response.status == StatusCode::PAYMENT_REQUIRED {
            let body = response.bytes().await.unwrap_or_default();
            let reason = serde_json::from_slice::<PaymentChallenge>(&body)
                .ok()
                .and_then(|c| c.error)
                .unwrap_or_else(|| "payment rejected".to_string());
            return Err(payment_error(reason));
        }

        self.record_receipt(&response);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::Pipeline;
    use crate::transport::{ReqwestTransport, Transport};
    use assert_matches::assert_matches;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedSigner {
        calls: AtomicUsize,
    }

    impl FixedSigner {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PaymentSigner for FixedSigner {
        async fn sign(&self, _v: u32, requirements: &PaymentRequirements) -> Result<String, HttpError> {
            let _ = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("signed-{}", requirements.network))
        }
    }

    fn requirement(network: &str) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: network.into(),
            max_amount_required: "1000".into(),
            resource: "http://x/agent".into(),
            description: String::new(),
            pay_to: "0xabc".into(),
            asset: "0xusdc".into(),
            max_timeout_seconds: 60,
            extra: None,
        }
    }

    fn challenge_body(networks: &[&str]) -> serde_json::Value {
        serde_json::to_value(PaymentChallenge {
            x402_version: 1,
            accepts: networks.iter().map(|n| requirement(n)).collect(),
            error: None,
        })
        .unwrap()
    }

    fn paid_pipeline(signer: Arc<PaymentMiddleware<FixedSigner>>) -> Pipeline {
        Pipeline::new(Arc::new(ReqwestTransport::new())).with(signer)
    }

    // ── challenge selection ─────────────────────────────────────────

    #[test]
    fn select_prefers_network() {
        let challenge: PaymentChallenge =
            serde_json::from_value(challenge_body(&["base", "solana"])).unwrap();
        assert_eq!(challenge.select(Some("SOLANA")).unwrap().network, "solana");
        assert_eq!(challenge.select(None).unwrap().network, "base");
        assert!(challenge.select(Some("polygon")).is_none());
    }

    #[test]
    fn receipt_decode() {
        let receipt = PaymentReceipt {
            success: true,
            transaction: Some("0xtx".into()),
            network: Some("base".into()),
            payer: Some("0xme".into()),
            error_reason: None,
        };
        assert_eq!(PaymentReceipt::decode(&receipt.encode()), Some(receipt));
        assert_eq!(PaymentReceipt::decode("!!not base64!!"), None);
    }

    #[test]
    fn command_signer_rejects_empty_command() {
        assert_matches!(
            CommandSigner::from_command_line("   "),
            Err(HttpError::InvalidRequest { .. })
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_signer_reads_stdout() {
        let signer = CommandSigner::from_command_line("echo token-123").unwrap();
        let header = signer.sign(1, &requirement("base")).await.unwrap();
        assert_eq!(header, "token-123");
    }

    // ── middleware ──────────────────────────────────────────────────

    #[tokio::test]
    async fn passes_through_when_not_challenged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/free"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let middleware = Arc::new(PaymentMiddleware::new(FixedSigner::new()));
        let response = paid_pipeline(middleware.clone())
            .fetch(HttpRequest::get(format!("{}/free", server.uri())))
            .await
            .unwrap();
        assert_eq!(response.text().await.unwrap(), "ok");
        assert_eq!(middleware.signer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(middleware.last_receipt(), None);
    }

    #[tokio::test]
    async fn answers_challenge_and_retries_once() {
        let server = MockServer::start().await;
        let receipt = PaymentReceipt {
            success: true,
            transaction: Some("0xtx".into()),
            ..PaymentReceipt::default()
        };
        Mock::given(method("POST"))
            .and(path("/paid"))
            .and(header("x-payment", "signed-base"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-payment-response", receipt.encode().as_str())
                    .set_body_string("paid content"),
            )
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/paid"))
            .respond_with(ResponseTemplate::new(402).set_body_json(challenge_body(&["base"])))
            .with_priority(2)
            .mount(&server)
            .await;

        let middleware = Arc::new(PaymentMiddleware::new(FixedSigner::new()));
        let request =
            HttpRequest::post_json(format!("{}/paid", server.uri()), &serde_json::json!({})).unwrap();
        let response = paid_pipeline(middleware.clone()).fetch(request).await.unwrap();

        assert_eq!(response.text().await.unwrap(), "paid content");
        assert_eq!(middleware.signer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(middleware.last_receipt(), Some(receipt));
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rejected_payment_is_a_payment_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paid"))
            .and(header_exists("x-payment"))
            .respond_with(ResponseTemplate::new(402).set_body_json(serde_json::json!({
                "x402Version": 1, "accepts": [], "error": "insufficient_funds"
            })))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/paid"))
            .respond_with(ResponseTemplate::new(402).set_body_json(challenge_body(&["base"])))
            .with_priority(2)
            .mount(&server)
            .await;

        let middleware = Arc::new(PaymentMiddleware::new(FixedSigner::new()));
        let err = paid_pipeline(middleware.clone())
            .fetch(HttpRequest::get(format!("{}/paid", server.uri())))
            .await
            .unwrap_err();
        assert_matches!(err, HttpError::Payment { message } if message == "insufficient_funds");
        // Exactly one retry
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn no_matching_network_fails_without_signing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(402).set_body_json(challenge_body(&["solana"])))
            .mount(&server)
            .await;

        let middleware = Arc::new(
            PaymentMiddleware::new(FixedSigner::new()).with_network(Some("base".into())),
        );
        let err = paid_pipeline(middleware.clone())
            .fetch(HttpRequest::get(server.uri()))
            .await
            .unwrap_err();
        assert_matches!(err, HttpError::Payment { .. });
        assert_eq!(middleware.signer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn garbage_challenge_is_a_payment_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(402).set_body_string("pay up"))
            .mount(&server)
            .await;

        let middleware = Arc::new(PaymentMiddleware::new(FixedSigner::new()));
        let err = paid_pipeline(middleware)
            .fetch(HttpRequest::get(server.uri()))
            .await
            .unwrap_err();
        assert_matches!(err, HttpError::Payment { message } if message.contains("challenge"));
    }

    #[tokio::test]
    async fn executor_retries_wrap_payment_retry_without_multiplying() {
        use crate::client::HttpClient;
        use crate::executor::RequestExecutor;
        use relay_core::RetryConfig;

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paid"))
            .respond_with(ResponseTemplate::new(402).set_body_json(challenge_body(&["base"])))
            .mount(&server)
            .await;

        let retry = RetryConfig {
            max_retries: 2,
            base_delay_ms: 10,
            ..RetryConfig::default()
        };
        let attempts = usize::try_from(retry.max_retries).unwrap() + 1;
        let middleware = Arc::new(PaymentMiddleware::new(FixedSigner::new()));
        let client = HttpClient::new(
            Arc::new(paid_pipeline(middleware.clone())),
            RequestExecutor::new(retry, 5_000),
        );

        let err = client
            .get_json::<serde_json::Value>(&format!("{}/paid", server.uri()))
            .await
            .unwrap_err();

        assert_matches!(err, HttpError::Payment { message } if message == "payment rejected");
        assert_eq!(middleware.signer.calls.load(Ordering::SeqCst), attempts);
        assert_eq!(server.received_requests().await.unwrap().len(), attempts * 2);
    }
}
