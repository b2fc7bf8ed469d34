//! # relay-http
//!
//! Everything between relay and the network:
//!
//! - [`Transport`]: the `fetch(request) -> response` boundary, with a
//!   [`ReqwestTransport`] implementation
//! - [`Middleware`] / [`Pipeline`]: composable `attempt(request) -> response` layers
//! - [`PaymentMiddleware`]: x402 payment challenge handling
//! - [`RequestExecutor`]: per-attempt timeout and idempotent retry with backoff
//! - [`HttpClient`]: the three combined, with JSON and stream helpers

#![deny(unsafe_code)]

pub mod client;
pub mod errors;
pub mod executor;
pub mod middleware;
pub mod payment;
pub mod transport;

pub use client::HttpClient;
pub use errors::HttpError;
pub use executor::{RequestExecutor, RetryState};
pub use middleware::{Middleware, Next, Pipeline, TracingMiddleware};
pub use payment::{
    CommandSigner, PaymentChallenge, PaymentMiddleware, PaymentReceipt, PaymentRequirements,
    PaymentSigner,
};
pub use transport::{ByteStream, HttpRequest, HttpResponse, ReqwestTransport, Transport};
