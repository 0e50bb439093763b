//! reqwest-backed transport.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::redirect::Policy;
use reqwest::Client;
use tracing::debug;

use super::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::TransportError;

/// Sends requests with a shared [`reqwest::Client`].
///
/// Each [`send`](HttpTransport::send) is exactly one round trip: redirects
/// are not followed, so a 3xx reaches classification as-is.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Wrap an existing client.
    ///
    /// The client should be built with [`Policy::none`]; a client that
    /// follows redirects can turn one call into several round trips.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client that never follows redirects, with an optional
    /// per-request timeout.
    pub fn build(timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder().redirect(Policy::none());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Build a client with a per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::build(Some(timeout))
    }
}

fn map_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        async move {
            let mut builder = self.client.post(request.url.as_str());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            let response = builder.body(request.body).send().await.map_err(map_error)?;
            let status = response.status().as_u16();
            // The status is already known, so a broken body still classifies by it.
            let body = match response.text().await {
                Ok(body) => body,
                Err(err) => {
                    debug!(status, error = %err, "failed to read response body");
                    String::new()
                }
            };
            Ok(HttpResponse { status, body })
        }
        .boxed()
    }
}
