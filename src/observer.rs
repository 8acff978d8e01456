//! Submission lifecycle events.
//!
//! A submission walks a fixed state machine:
//!
//! ```text
//! Idle → FileAcquired → (Rasterizing | TextExtracting) → PayloadBuilt
//!      → AwaitingModel → Parsed → Rendered → AwaitingUserAnswers
//!                                          → (Checked | ErrorChecking)
//!                      ↘ ParseError | TransportError
//! ```
//!
//! Error states are terminal for the submission. Wrap an
//! [`Arc<dyn SubmissionObserver>`] in a [`SubmissionTracker`] and pass it to
//! [`crate::extract::run_submission`] to follow transitions, e.g. to drive a
//! spinner or a status line.
//!
//! # Example
//!
//! ```rust
//! use eduforge::{SubmissionObserver, SubmissionState};
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct Recorder(Mutex<Vec<SubmissionState>>);
//!
//! impl SubmissionObserver for Recorder {
//!     fn on_transition(&self, _from: SubmissionState, to: SubmissionState) {
//!         self.0.lock().unwrap().push(to);
//!     }
//! }
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Where a submission currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SubmissionState {
    Idle,
    FileAcquired,
    Rasterizing,
    TextExtracting,
    PayloadBuilt,
    AwaitingModel,
    Parsed,
    Rendered,
    AwaitingUserAnswers,
    Checked,
    ErrorChecking,
    ParseError,
    TransportError,
}

impl SubmissionState {
    /// No further transitions happen from this state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SubmissionState::Checked
                | SubmissionState::ErrorChecking
                | SubmissionState::ParseError
                | SubmissionState::TransportError
        )
    }

    pub fn is_error(self) -> bool {
        matches!(
            self,
            SubmissionState::ErrorChecking
                | SubmissionState::ParseError
                | SubmissionState::TransportError
        )
    }

    /// Whether `self → next` is an edge of the state machine.
    pub fn can_move_to(self, next: SubmissionState) -> bool {
        use SubmissionState::*;
        match (self, next) {
            (Idle, FileAcquired) => true,
            (FileAcquired, Rasterizing | TextExtracting) => true,
            (Rasterizing | TextExtracting, PayloadBuilt) => true,
            (PayloadBuilt, AwaitingModel) => true,
            (AwaitingModel, Parsed | ParseError | TransportError) => true,
            (Parsed, Rendered) => true,
            (Rendered, AwaitingUserAnswers) => true,
            (AwaitingUserAnswers, Checked | ErrorChecking) => true,
            // Local failures before the model call, and "nothing to submit",
            // drop the submission back to the form.
            (FileAcquired | Rasterizing | TextExtracting | PayloadBuilt, Idle) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Receives state transitions as a submission progresses.
///
/// All methods have default no-op implementations.
pub trait SubmissionObserver: Send + Sync {
    /// Called on every state change.
    fn on_transition(&self, from: SubmissionState, to: SubmissionState) {
        let _ = (from, to);
    }

    /// Called once the rasterizer has delivered, with the page count.
    fn on_pages(&self, count: usize) {
        let _ = count;
    }

    /// Called when a submission ends in an error state.
    fn on_error(&self, state: SubmissionState, error: &str) {
        let _ = (state, error);
    }
}

/// Observer that ignores everything. The default.
pub struct NoopObserver;

impl SubmissionObserver for NoopObserver {}

/// Shared observer handle.
pub type ObserverHandle = Arc<dyn SubmissionObserver>;

/// Current state of one submission, forwarding every move to an observer.
pub struct SubmissionTracker {
    state: SubmissionState,
    observer: ObserverHandle,
}

impl fmt::Debug for SubmissionTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionTracker")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Default for SubmissionTracker {
    fn default() -> Self {
        Self::new(Arc::new(NoopObserver))
    }
}

impl SubmissionTracker {
    pub fn new(observer: ObserverHandle) -> Self {
        Self {
            state: SubmissionState::Idle,
            observer,
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    /// Move to `next`. Illegal edges are a bug in the caller.
    pub fn advance(&mut self, next: SubmissionState) {
        debug_assert!(
            self.state.can_move_to(next),
            "illegal transition {} → {}",
            self.state,
            next
        );
        tracing::debug!("Submission {} → {}", self.state, next);
        let from = self.state;
        self.state = next;
        self.observer.on_transition(from, next);
    }

    /// Move to an error state and report `error`.
    pub fn fail(&mut self, next: SubmissionState, error: &str) {
        self.advance(next);
        self.observer.on_error(next, error);
    }

    pub fn observer(&self) -> &dyn SubmissionObserver {
        self.observer.as_ref()
    }
}
