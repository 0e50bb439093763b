//! One round trip to the generative-text endpoint.
//!
//! The [`HttpTransport`] trait is the injection seam: production code uses
//! [`ReqwestTransport`], tests use
//! [`ScriptedTransport`](crate::testing::ScriptedTransport). The
//! [`TransportInvoker`] owns wire encoding and outcome classification, and
//! never retries.

mod http;
mod invoker;
mod wire;

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;

use crate::error::TransportError;

pub use http::ReqwestTransport;
pub use invoker::{classify, Outcome, TransportInvoker};
pub use wire::{extract_text, GenerateContentRequest};

/// Default endpoint: Gemini `generateContent` for `gemini-2.5-flash`.
pub const DEFAULT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";

/// An outbound POST, fully prepared by the invoker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Target URL, including any credential query parameter.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// JSON body.
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The body as UTF-8 text, if valid.
    pub fn body_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// What came back, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body text.
    pub body: String,
}

impl HttpResponse {
    /// Build a response from a status and body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Performs a single HTTP POST. Implementations must not retry.
pub trait HttpTransport: Send + Sync {
    /// Send the request and return the raw response.
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        (**self).send(request)
    }
}

/// Opaque API credential. Never printed.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw credential string.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw credential, for placing on the wire.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Where the credential goes on each request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum CredentialPlacement {
    /// Appended as a URL query parameter with this name.
    Query(String),
    /// Sent as a request header with this name.
    Header(String),
}

impl Default for CredentialPlacement {
    fn default() -> Self {
        Self::Query("key".to_owned())
    }
}
