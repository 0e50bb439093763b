//! Session aggregate and the immutable views handed to callers.

use std::fmt;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

use crate::error::{FailureCause, RetryableCause, TerminalCause};
use crate::prompt::{RequestContext, RequestMode};

/// Monotonically increasing session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub(crate) u64);

impl SessionId {
    /// The raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created, not yet running. Also reported when nothing was submitted.
    Idle,
    /// Attempts are running.
    InFlight,
    /// Settled with generated text.
    Succeeded,
    /// Settled with a failure cause.
    Failed,
    /// A newer submission took over; the outcome is never delivered.
    Superseded,
}

impl SessionState {
    /// Returns true for `Succeeded`, `Failed` and `Superseded`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Superseded)
    }
}

/// Result of a single attempt as recorded in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttemptOutcome {
    /// Round trip not finished yet.
    Pending,
    /// Generated text was returned.
    Success,
    /// Transient failure.
    RetryableFailure(RetryableCause),
    /// Non-retryable failure.
    TerminalFailure(TerminalCause),
}

/// One entry of a session's attempt history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptRecord {
    /// Zero-based attempt index.
    pub attempt_index: u32,
    /// What the attempt produced.
    pub outcome: AttemptOutcome,
    /// Wait scheduled after this attempt before the next one; 0 if none.
    pub scheduled_delay_ms: u64,
}

impl AttemptRecord {
    pub(crate) fn pending(attempt_index: u32) -> Self {
        Self {
            attempt_index,
            outcome: AttemptOutcome::Pending,
            scheduled_delay_ms: 0,
        }
    }
}

/// Mutable aggregate owned by the orchestrator.
#[derive(Debug)]
pub(crate) struct RequestSession {
    id: SessionId,
    context: RequestContext,
    attempts: Vec<AttemptRecord>,
    state: SessionState,
    resolution: Option<Result<String, FailureCause>>,
}

impl RequestSession {
    pub(crate) fn new(id: SessionId, context: RequestContext) -> Self {
        Self {
            id,
            context,
            attempts: Vec::new(),
            state: SessionState::Idle,
            resolution: None,
        }
    }

    pub(crate) fn id(&self) -> SessionId {
        self.id
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn begin(&mut self) {
        if self.state == SessionState::Idle {
            self.state = SessionState::InFlight;
        }
    }

    pub(crate) fn supersede(&mut self) {
        if self.state == SessionState::InFlight {
            self.state = SessionState::Superseded;
        }
    }

    /// Append a record, or replace the last one if it has the same index.
    pub(crate) fn upsert_attempt(&mut self, record: AttemptRecord) {
        match self.attempts.last_mut() {
            Some(last) if last.attempt_index == record.attempt_index => *last = record,
            _ => self.attempts.push(record),
        }
    }

    /// Record the final resolution. A superseded session keeps its state.
    pub(crate) fn settle(&mut self, resolution: Result<String, FailureCause>) -> SessionState {
        if self.state == SessionState::InFlight {
            self.state = match resolution {
                Ok(_) => SessionState::Succeeded,
                Err(_) => SessionState::Failed,
            };
        }
        self.resolution = Some(resolution);
        self.state
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        let (result_text, error) = match (&self.state, &self.resolution) {
            (SessionState::Succeeded, Some(Ok(text))) => (Some(text.clone()), None),
            (SessionState::Failed, Some(Err(cause))) => (None, Some(*cause)),
            _ => (None, None),
        };
        Snapshot {
            session_id: Some(self.id),
            mode: Some(self.context.mode()),
            state: self.state,
            result_text,
            error,
            attempts: self.attempts.clone(),
        }
    }
}

/// Immutable view of a session.
///
/// Superseded sessions never expose a result, even after they resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Session id, `None` before the first submission.
    pub session_id: Option<SessionId>,
    /// Mode of the session, `None` before the first submission.
    pub mode: Option<RequestMode>,
    /// Current state.
    pub state: SessionState,
    /// Generated text once `Succeeded`.
    pub result_text: Option<String>,
    /// Failure cause once `Failed`.
    pub error: Option<FailureCause>,
    /// Attempt history so far.
    pub attempts: Vec<AttemptRecord>,
}

impl Snapshot {
    pub(crate) fn idle() -> Self {
        Self {
            session_id: None,
            mode: None,
            state: SessionState::Idle,
            result_text: None,
            error: None,
            attempts: Vec::new(),
        }
    }
}

/// Terminal outcome pushed to the subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// The session that settled.
    pub session_id: SessionId,
    /// Generated text or the failure cause.
    pub result: Result<String, FailureCause>,
}

/// Receives one [`Delivery`] per settled, non-superseded session.
///
/// Dropping it unsubscribes; later results stay visible through
/// [`RequestOrchestrator::snapshot`](super::RequestOrchestrator::snapshot).
#[derive(Debug)]
pub struct Subscription {
    pub(crate) rx: mpsc::UnboundedReceiver<Delivery>,
}

impl Subscription {
    /// Wait for the next delivery. `None` once replaced by a newer subscription
    /// and drained.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    /// Take a delivery if one is ready.
    pub fn try_recv(&mut self) -> Option<Delivery> {
        self.rx.try_recv().ok()
    }
}

/// Everything that happened in one session, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// The session.
    pub session_id: SessionId,
    /// Final state; `Superseded` if a newer submission took over.
    pub state: SessionState,
    /// What the session resolved to, delivered or not.
    pub resolution: Result<String, FailureCause>,
    /// Full attempt history.
    pub attempts: Vec<AttemptRecord>,
    /// Whether the resolution was sent to a subscriber.
    pub delivered: bool,
}

/// Returned by `submit`; resolves once the session's loop finishes.
#[derive(Debug)]
pub struct SessionHandle {
    pub(crate) id: SessionId,
    pub(crate) join: JoinHandle<SessionReport>,
}

impl SessionHandle {
    /// The id allocated to this submission.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Wait for the session to run to completion, superseded or not.
    pub async fn finished(self) -> Result<SessionReport, JoinError> {
        self.join.await
    }
}
