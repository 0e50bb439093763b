//! Single-attempt invocation and outcome classification.

use reqwest::Url;
use tracing::{debug, warn};

use super::wire::{extract_text, GenerateContentRequest};
use super::{Credential, CredentialPlacement, HttpRequest, HttpResponse, HttpTransport};
use crate::error::{RetryableCause, TerminalCause, TransportError};
use crate::prompt::ComposedPrompt;
use crate::retry::OutcomeClass;

/// Classified result of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Well-formed response with generated text.
    Success(String),
    /// Transient failure.
    RetryableFailure(RetryableCause),
    /// Failure that retrying cannot fix.
    TerminalFailure(TerminalCause),
}

impl Outcome {
    /// The class used by the backoff policy.
    pub fn class(&self) -> OutcomeClass {
        match self {
            Outcome::Success(_) => OutcomeClass::Success,
            Outcome::RetryableFailure(_) => OutcomeClass::Retryable,
            Outcome::TerminalFailure(_) => OutcomeClass::Terminal,
        }
    }
}

/// Map a raw transport result onto the closed outcome taxonomy.
///
/// ```rust
/// use promptline::error::{RetryableCause, TerminalCause, TransportError};
/// use promptline::transport::{classify, HttpResponse, Outcome};
///
/// assert_eq!(
///     classify(Ok(HttpResponse::new(429, ""))),
///     Outcome::RetryableFailure(RetryableCause::RateLimited)
/// );
/// assert_eq!(
///     classify(Ok(HttpResponse::new(404, ""))),
///     Outcome::TerminalFailure(TerminalCause::ClientError)
/// );
/// assert_eq!(
///     classify(Err(TransportError::Timeout)),
///     Outcome::RetryableFailure(RetryableCause::NetworkError)
/// );
/// ```
pub fn classify(result: Result<HttpResponse, TransportError>) -> Outcome {
    let response = match result {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, "generate request failed before a response");
            return Outcome::RetryableFailure(RetryableCause::NetworkError);
        }
    };

    match response.status {
        200..=299 => match extract_text(&response.body) {
            Some(text) => Outcome::Success(text),
            None => {
                warn!(status = response.status, "response lacks generated text");
                Outcome::TerminalFailure(TerminalCause::MalformedResponse)
            }
        },
        429 => {
            debug!(status = response.status, "rate limited");
            Outcome::RetryableFailure(RetryableCause::RateLimited)
        }
        500..=599 => {
            debug!(status = response.status, "server error");
            Outcome::RetryableFailure(RetryableCause::ServerError)
        }
        status => {
            warn!(status, "request rejected");
            debug!(body = %truncate(&response.body, MAX_LOGGED_BODY), "rejected response body");
            Outcome::TerminalFailure(TerminalCause::ClientError)
        }
    }
}

const MAX_LOGGED_BODY: usize = 256;

fn truncate(body: &str, max: usize) -> &str {
    match body.char_indices().nth(max) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}

/// Encodes a prompt, performs one POST, and classifies the result.
#[derive(Debug)]
pub struct TransportInvoker<T> {
    transport: T,
    endpoint: Url,
    placement: CredentialPlacement,
}

impl<T: HttpTransport> TransportInvoker<T> {
    /// Create an invoker posting to `endpoint`, with the credential as the
    /// `key` query parameter.
    pub fn new(transport: T, endpoint: Url) -> Self {
        Self {
            transport,
            endpoint,
            placement: CredentialPlacement::default(),
        }
    }

    /// Override where the credential is placed.
    pub fn with_credential_placement(mut self, placement: CredentialPlacement) -> Self {
        self.placement = placement;
        self
    }

    /// The injected transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Build the outbound request for a prompt.
    pub fn build_request(&self, prompt: &ComposedPrompt, credential: &Credential) -> HttpRequest {
        let mut url = self.endpoint.clone();
        let mut headers = vec![("Content-Type".to_owned(), "application/json".to_owned())];
        match &self.placement {
            CredentialPlacement::Query(name) => {
                url.query_pairs_mut().append_pair(name, credential.expose());
            }
            CredentialPlacement::Header(name) => {
                headers.push((name.clone(), credential.expose().to_owned()));
            }
        }
        // Borrowed strings only; serialization cannot fail.
        let body = serde_json::to_vec(&GenerateContentRequest::from(prompt)).unwrap_or_default();
        HttpRequest {
            url: url.into(),
            headers,
            body,
        }
    }

    /// Perform exactly one round trip and classify it.
    pub async fn invoke(&self, prompt: &ComposedPrompt, credential: &Credential) -> Outcome {
        let request = self.build_request(prompt, credential);
        classify(self.transport.send(request).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn success_body(text: &str) -> String {
        json!({"candidates": [{"content": {"parts": [{"text": text}]}}]}).to_string()
    }

    #[test]
    fn classifies_status_families() {
        let cases = [
            (
                HttpResponse::new(200, success_body("hi")),
                Outcome::Success("hi".into()),
            ),
            (
                HttpResponse::new(204, ""),
                Outcome::TerminalFailure(TerminalCause::MalformedResponse),
            ),
            (
                HttpResponse::new(429, "slow down"),
                Outcome::RetryableFailure(RetryableCause::RateLimited),
            ),
            (
                HttpResponse::new(500, ""),
                Outcome::RetryableFailure(RetryableCause::ServerError),
            ),
            (
                HttpResponse::new(503, ""),
                Outcome::RetryableFailure(RetryableCause::ServerError),
            ),
            (
                HttpResponse::new(400, "bad"),
                Outcome::TerminalFailure(TerminalCause::ClientError),
            ),
            (
                HttpResponse::new(403, ""),
                Outcome::TerminalFailure(TerminalCause::ClientError),
            ),
            (
                HttpResponse::new(302, ""),
                Outcome::TerminalFailure(TerminalCause::ClientError),
            ),
        ];
        for (response, expected) in cases {
            let status = response.status;
            assert_eq!(classify(Ok(response)), expected, "status {status}");
        }
    }

    #[test]
    fn transport_errors_are_network_errors() {
        for err in [
            TransportError::Timeout,
            TransportError::Connect("refused".into()),
            TransportError::Other("reset".into()),
        ] {
            assert_eq!(
                classify(Err(err)),
                Outcome::RetryableFailure(RetryableCause::NetworkError)
            );
        }
    }

    #[test]
    fn logged_bodies_are_truncated() {
        assert_eq!(truncate("short", 256), "short");
        let long = "é".repeat(300);
        assert_eq!(truncate(&long, 256).chars().count(), 256);
    }

    #[test]
    fn outcome_classes() {
        assert_eq!(Outcome::Success(String::new()).class(), OutcomeClass::Success);
        assert_eq!(
            Outcome::RetryableFailure(RetryableCause::ServerError).class(),
            OutcomeClass::Retryable
        );
        assert_eq!(
            Outcome::TerminalFailure(TerminalCause::ClientError).class(),
            OutcomeClass::Terminal
        );
    }
}
