//! # Promptline
//!
//! A resilient client for generative-text services.
//!
//! Promptline composes a prompt from a mode and free-text input, submits it
//! to a `generateContent`-style endpoint, retries transient failures with
//! exponential backoff, and reports exactly one outcome per submission.
//! Rapid resubmission never produces stale or out-of-order results: a newer
//! submission supersedes the one in flight, and only the newest is delivered.
//!
//! ## Components
//!
//! - [`prompt`]: pure `(mode, input) -> (system instruction, user message)`
//! - [`retry`]: pure backoff policy
//! - [`transport`]: one HTTP round trip, classified into a closed taxonomy
//! - [`orchestrator`]: session state machine, retry loop and delivery
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use promptline::prelude::*;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! let orchestrator = RequestOrchestrator::from_config(&config)?;
//! let mut results = orchestrator.subscribe();
//!
//! orchestrator.submit(RequestMode::Primary, "Senior Backend Engineer")?;
//!
//! if let Some(delivery) = results.recv().await {
//!     match delivery.result {
//!         Ok(text) => println!("{text}"),
//!         Err(cause) => eprintln!("{}", cause.user_message()),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod retry;
pub mod testing;
pub mod transport;

// Re-exports
pub use config::ClientConfig;
pub use error::{FailureCause, RetryableCause, SubmitError, TerminalCause};
pub use orchestrator::{
    AttemptOutcome, AttemptRecord, Delivery, RequestOrchestrator, SessionHandle, SessionId,
    SessionReport, SessionState, Snapshot, Subscription,
};
pub use prompt::{compose, ComposedPrompt, RequestContext, RequestMode};
pub use retry::BackoffPolicy;
pub use transport::{Credential, HttpTransport, Outcome, ReqwestTransport, TransportInvoker};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::ClientConfig;
    pub use crate::error::{FailureCause, SubmitError};
    pub use crate::orchestrator::{Delivery, RequestOrchestrator, SessionState, Snapshot};
    pub use crate::prompt::RequestMode;
    pub use crate::retry::BackoffPolicy;
    pub use crate::transport::{Credential, TransportInvoker};
}
