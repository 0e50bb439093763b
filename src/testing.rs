//! Testing utilities for code built on promptline.
//!
//! [`ScriptedTransport`] answers requests from canned scripts keyed by a
//! substring of the request body, so concurrent sessions with different
//! inputs can be driven independently. A step can be held behind a
//! [`Gate`] to control exactly when each session's attempt resolves.
//!
//! # Examples
//!
//! ```rust
//! use promptline::testing::ScriptedTransport;
//!
//! let transport = ScriptedTransport::new();
//! transport.respond_to("plan", [
//!     ScriptedTransport::status(429),
//!     ScriptedTransport::text("the plan"),
//! ]);
//! assert_eq!(transport.calls(), 0);
//! ```
//!
//! ## Assertion Macros
//!
//! ```rust
//! use promptline::{assert_failed, assert_succeeded};
//! use promptline::error::FailureCause;
//!
//! let ok: Result<String, FailureCause> = Ok("text".to_string());
//! assert_succeeded!(ok, "text");
//!
//! let err: Result<String, FailureCause> = Err(FailureCause::CapacityExceeded);
//! assert_failed!(err, FailureCause::CapacityExceeded);
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use reqwest::Url;
use serde_json::json;
use tokio::sync::watch;

use crate::error::TransportError;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportInvoker};

/// Endpoint used by [`ScriptedTransport::invoker`].
pub const SCRIPTED_ENDPOINT: &str = "http://scripted.test/v1/generate";

/// Releases held [`Step`]s. Once open it stays open, so opening before the
/// request arrives is fine.
#[derive(Debug, Clone)]
pub struct Gate(Arc<watch::Sender<bool>>);

impl Gate {
    /// Create a closed gate.
    pub fn new() -> Self {
        Self(Arc::new(watch::Sender::new(false)))
    }

    /// Let every request held on this gate complete.
    pub fn open(&self) {
        self.0.send_replace(true);
    }

    async fn wait(&self) {
        let mut rx = self.0.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Response(HttpResponse),
    Timeout,
    ConnectionRefused,
}

/// One canned reply.
#[derive(Debug, Clone)]
pub struct Step {
    reply: Reply,
    gate: Option<Gate>,
}

impl Step {
    /// Hold this reply until `gate` opens.
    pub fn held(mut self, gate: &Gate) -> Self {
        self.gate = Some(gate.clone());
        self
    }

    fn into_result(self) -> Result<HttpResponse, TransportError> {
        match self.reply {
            Reply::Response(response) => Ok(response),
            Reply::Timeout => Err(TransportError::Timeout),
            Reply::ConnectionRefused => Err(TransportError::Connect("connection refused".into())),
        }
    }
}

#[derive(Debug)]
struct Script {
    needle: String,
    steps: VecDeque<Step>,
}

/// Canned-response [`HttpTransport`].
///
/// Each script is consumed in order; its last step repeats once the others
/// are used up. Requests matching no script get HTTP 400.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: Mutex<Vec<Script>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    /// Create a transport with no scripts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a shared transport in an invoker posting to [`SCRIPTED_ENDPOINT`].
    pub fn invoker(transport: Arc<Self>) -> TransportInvoker<Arc<Self>> {
        let endpoint = Url::parse(SCRIPTED_ENDPOINT).expect("scripted endpoint is a valid url");
        TransportInvoker::new(transport, endpoint)
    }

    /// Answer requests whose body contains `needle` with `steps`.
    pub fn respond_to(&self, needle: impl Into<String>, steps: impl IntoIterator<Item = Step>) {
        self.scripts.lock().push(Script {
            needle: needle.into(),
            steps: steps.into_iter().collect(),
        });
    }

    /// 200 response carrying generated text.
    pub fn text(text: &str) -> Step {
        let body = json!({"candidates": [{"content": {"parts": [{"text": text}]}}]});
        Self::response(200, body.to_string())
    }

    /// Response with the given status and an empty JSON body.
    pub fn status(status: u16) -> Step {
        Self::response(status, "{}")
    }

    /// Response with an arbitrary status and body.
    pub fn response(status: u16, body: impl Into<String>) -> Step {
        Step {
            reply: Reply::Response(HttpResponse::new(status, body)),
            gate: None,
        }
    }

    /// 200 response without generated text.
    pub fn malformed() -> Step {
        Self::response(200, r#"{"candidates": []}"#)
    }

    /// Transport-level timeout.
    pub fn timeout() -> Step {
        Step {
            reply: Reply::Timeout,
            gate: None,
        }
    }

    /// Transport-level connection failure.
    pub fn connection_refused() -> Step {
        Step {
            reply: Reply::ConnectionRefused,
            gate: None,
        }
    }

    /// Total requests received.
    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    /// Requests whose body contains `needle`.
    pub fn calls_for(&self, needle: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.body_text().is_some_and(|body| body.contains(needle)))
            .count()
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    fn next_step(&self, body: &str) -> Option<Step> {
        let mut scripts = self.scripts.lock();
        let script = scripts.iter_mut().find(|s| body.contains(&s.needle))?;
        if script.steps.len() > 1 {
            script.steps.pop_front()
        } else {
            script.steps.front().cloned()
        }
    }
}

impl HttpTransport for ScriptedTransport {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        let step = self.next_step(request.body_text().unwrap_or_default());
        self.requests.lock().push(request);
        async move {
            let Some(step) = step else {
                return Ok(HttpResponse::new(400, "no script matched"));
            };
            if let Some(gate) = &step.gate {
                gate.wait().await;
            }
            step.into_result()
        }
        .boxed()
    }
}

/// Assert that a session resolution is `Ok` with the given text.
///
/// # Example
///
/// ```rust
/// use promptline::assert_succeeded;
/// use promptline::error::FailureCause;
///
/// let result: Result<String, FailureCause> = Ok("JD text".to_string());
/// assert_succeeded!(result, "JD text");
/// ```
#[macro_export]
macro_rules! assert_succeeded {
    ($result:expr, $text:expr) => {
        match &$result {
            Ok(text) => assert_eq!(text.as_str(), $text),
            Err(cause) => panic!("Expected success, got failure: {:?}", cause),
        }
    };
}

/// Assert that a session resolution is `Err` with the given cause.
///
/// # Example
///
/// ```rust
/// use promptline::assert_failed;
/// use promptline::error::{FailureCause, TerminalCause};
///
/// let result: Result<String, FailureCause> = Err(TerminalCause::ClientError.into());
/// assert_failed!(result, FailureCause::Terminal(TerminalCause::ClientError));
/// ```
#[macro_export]
macro_rules! assert_failed {
    ($result:expr, $cause:expr) => {
        match &$result {
            Err(cause) => assert_eq!(*cause, $cause),
            Ok(text) => panic!("Expected failure, got success: {:?}", text),
        }
    };
}
