//! Single-flight request orchestration.
//!
//! [`RequestOrchestrator`] owns every session. Each `submit` allocates a
//! session with a strictly greater id, supersedes the one in flight, and
//! spawns a bounded retry loop paced by a [`BackoffPolicy`].
//!
//! Superseded sessions keep running to completion; their results are
//! filtered at delivery instead of cancelled. Only the session that is
//! current when it settles is delivered, so delivery order always matches
//! submission order.
//!
//! # Example
//!
//! ```rust
//! use promptline::prelude::*;
//! use promptline::testing::ScriptedTransport;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let transport = Arc::new(ScriptedTransport::new());
//! transport.respond_to("Senior Backend Engineer", [ScriptedTransport::text("JD text")]);
//!
//! let orchestrator = RequestOrchestrator::new(
//!     ScriptedTransport::invoker(transport),
//!     Credential::new("key"),
//!     BackoffPolicy::default(),
//! );
//! let mut subscription = orchestrator.subscribe();
//!
//! orchestrator.submit(RequestMode::Primary, "Senior Backend Engineer").unwrap();
//!
//! let delivery = subscription.recv().await.unwrap();
//! assert_eq!(delivery.result, Ok("JD text".to_string()));
//! # });
//! ```

mod session;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::ClientConfig;
use crate::error::{ConfigError, FailureCause, SubmitError};
use crate::prompt::{compose, ComposedPrompt, RequestContext, RequestMode};
use crate::retry::BackoffPolicy;
use crate::transport::{Credential, HttpTransport, Outcome, ReqwestTransport, TransportInvoker};

pub use session::{
    AttemptOutcome, AttemptRecord, Delivery, SessionHandle, SessionId, SessionReport,
    SessionState, Snapshot, Subscription,
};
use session::RequestSession;

/// Sessions retained by the orchestrator: the current one and the one it
/// superseded, if any.
#[derive(Debug, Default)]
struct Registry {
    last_id: u64,
    current: Option<RequestSession>,
    superseded: Option<RequestSession>,
    subscriber: Option<mpsc::UnboundedSender<Delivery>>,
}

impl Registry {
    fn session_mut(&mut self, id: SessionId) -> Option<&mut RequestSession> {
        [self.current.as_mut(), self.superseded.as_mut()]
            .into_iter()
            .flatten()
            .find(|session| session.id() == id)
    }

    fn is_current(&self, id: SessionId) -> bool {
        self.current.as_ref().is_some_and(|session| session.id() == id)
    }

    /// Send to the subscriber. Returns false if nobody is listening.
    fn deliver(&mut self, delivery: Delivery) -> bool {
        let Some(tx) = &self.subscriber else {
            debug!(session = %delivery.session_id, "no subscriber; result kept in snapshot only");
            return false;
        };
        if tx.send(delivery).is_err() {
            debug!("subscriber dropped");
            self.subscriber = None;
            return false;
        }
        true
    }
}

struct Shared<T> {
    invoker: TransportInvoker<T>,
    credential: Credential,
    policy: BackoffPolicy,
    registry: Mutex<Registry>,
}

impl<T: HttpTransport> Shared<T> {
    fn record(&self, id: SessionId, record: AttemptRecord) {
        if let Some(session) = self.registry.lock().session_mut(id) {
            session.upsert_attempt(record);
        }
    }

    async fn run(&self, id: SessionId, prompt: ComposedPrompt) -> SessionReport {
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut attempt_index = 0u32;

        let resolution = loop {
            let mut record = AttemptRecord::pending(attempt_index);
            attempts.push(record);
            self.record(id, record);
            debug!(attempt = attempt_index, "attempt started");

            let outcome = self.invoker.invoke(&prompt, &self.credential).await;
            let class = outcome.class();
            let next_index = attempt_index + 1;

            let settled = match outcome {
                Outcome::Success(text) => {
                    record.outcome = AttemptOutcome::Success;
                    Some(Ok(text))
                }
                Outcome::TerminalFailure(cause) => {
                    record.outcome = AttemptOutcome::TerminalFailure(cause);
                    Some(Err(FailureCause::from(cause)))
                }
                Outcome::RetryableFailure(cause) => {
                    record.outcome = AttemptOutcome::RetryableFailure(cause);
                    if self.policy.should_retry(class, next_index) {
                        None
                    } else {
                        warn!(attempts = next_index, last_cause = %cause, "retries exhausted");
                        Some(Err(FailureCause::CapacityExceeded))
                    }
                }
            };

            if let Some(resolution) = settled {
                self.finish_attempt(id, &mut attempts, record);
                break resolution;
            }

            let delay = self.policy.jittered_delay(attempt_index);
            record.scheduled_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            self.finish_attempt(id, &mut attempts, record);
            debug!(attempt = attempt_index, delay_ms = record.scheduled_delay_ms, "backing off");

            tokio::time::sleep(delay).await;
            attempt_index = next_index;
        };

        self.settle(id, attempts, resolution)
    }

    fn finish_attempt(&self, id: SessionId, attempts: &mut [AttemptRecord], record: AttemptRecord) {
        if let Some(last) = attempts.last_mut() {
            *last = record;
        }
        self.record(id, record);
    }

    fn settle(
        &self,
        id: SessionId,
        attempts: Vec<AttemptRecord>,
        resolution: Result<String, FailureCause>,
    ) -> SessionReport {
        let mut registry = self.registry.lock();
        let is_current = registry.is_current(id);
        let state = match registry.session_mut(id) {
            Some(session) => session.settle(resolution.clone()),
            None => SessionState::Superseded,
        };

        // Sent under the lock so deliveries leave in settlement order.
        let delivered = if is_current {
            info!(session = %id, ?state, attempts = attempts.len(), "session settled");
            registry.deliver(Delivery {
                session_id: id,
                result: resolution.clone(),
            })
        } else {
            info!(
                session = %id,
                attempts = attempts.len(),
                "superseded session resolved; delivery suppressed"
            );
            false
        };

        SessionReport {
            session_id: id,
            state,
            resolution,
            attempts,
            delivered,
        }
    }
}

/// Owns the request lifecycle and delivers at most one result per submission.
pub struct RequestOrchestrator<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for RequestOrchestrator<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for RequestOrchestrator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.shared.registry.lock();
        f.debug_struct("RequestOrchestrator")
            .field("policy", &self.shared.policy)
            .field("last_id", &registry.last_id)
            .field("current", &registry.current.as_ref().map(|s| (s.id(), s.state())))
            .finish()
    }
}

impl RequestOrchestrator<ReqwestTransport> {
    /// Build an orchestrator backed by reqwest from configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let transport = ReqwestTransport::build(config.request_timeout())?;
        let invoker = TransportInvoker::new(transport, config.endpoint_url()?)
            .with_credential_placement(config.credential_placement.clone());
        Ok(Self::new(
            invoker,
            config.api_key.clone(),
            config.backoff_policy(),
        ))
    }
}

impl<T: HttpTransport + 'static> RequestOrchestrator<T> {
    /// Create an orchestrator around an invoker.
    pub fn new(
        invoker: TransportInvoker<T>,
        credential: Credential,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                invoker,
                credential,
                policy,
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    /// Start a new session, superseding any session in flight.
    ///
    /// Fails with [`SubmitError::EmptyInput`] if `raw_input` is blank; in
    /// that case nothing changes and no request is made. Must be called
    /// from within a Tokio runtime.
    pub fn submit(
        &self,
        mode: RequestMode,
        raw_input: impl Into<String>,
    ) -> Result<SessionHandle, SubmitError> {
        let context = RequestContext::new(mode, raw_input);
        if context.is_blank() {
            return Err(SubmitError::EmptyInput);
        }
        let prompt = compose(&context);

        let id = {
            let mut registry = self.shared.registry.lock();
            registry.last_id += 1;
            let id = SessionId(registry.last_id);

            registry.superseded = match registry.current.take() {
                Some(mut previous) if previous.state() == SessionState::InFlight => {
                    previous.supersede();
                    info!(superseded = %previous.id(), by = %id, "session superseded");
                    Some(previous)
                }
                _ => None,
            };

            let mut session = RequestSession::new(id, context);
            session.begin();
            registry.current = Some(session);
            id
        };

        let shared = Arc::clone(&self.shared);
        let span = info_span!("session", id = id.get(), ?mode);
        let join = tokio::spawn(async move { shared.run(id, prompt).await }.instrument(span));
        Ok(SessionHandle { id, join })
    }

    /// Replace the subscriber. The previous subscription stops receiving.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.registry.lock().subscriber = Some(tx);
        Subscription { rx }
    }

    /// Snapshot of the current session, or `Idle` before any submission.
    pub fn snapshot(&self) -> Snapshot {
        self.shared
            .registry
            .lock()
            .current
            .as_ref()
            .map_or_else(Snapshot::idle, RequestSession::snapshot)
    }

    /// Snapshot of the session the current one superseded, if retained.
    pub fn superseded(&self) -> Option<Snapshot> {
        self.shared
            .registry
            .lock()
            .superseded
            .as_ref()
            .map(RequestSession::snapshot)
    }

    /// The backoff policy in use.
    pub fn policy(&self) -> &BackoffPolicy {
        &self.shared.policy
    }
}
