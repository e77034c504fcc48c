//! Initialization state machine
//!
//! `Connecting -> Hydrating -> Ready`, with `Failed` reachable from any
//! non-terminal state. `Ready` and `Failed` are terminal.

use tokio::sync::watch;

use crate::error::{WaitlistError, WaitlistResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitState {
    Connecting,
    Hydrating,
    Ready,
    Failed(String),
}

impl InitState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InitState::Ready | InitState::Failed(_))
    }
}

pub struct InitializationGate {
    state: watch::Sender<InitState>,
}

impl InitializationGate {
    pub fn new() -> Self {
        let (state, _) = watch::channel(InitState::Connecting);
        Self { state }
    }

    pub fn state(&self) -> InitState {
        self.state.borrow().clone()
    }

    /// Non-blocking readiness check
    pub fn is_ready(&self) -> bool {
        matches!(*self.state.borrow(), InitState::Ready)
    }

    /// Fail fast unless `Ready`
    pub fn ensure_ready(&self) -> WaitlistResult<()> {
        match &*self.state.borrow() {
            InitState::Ready => Ok(()),
            InitState::Failed(reason) => Err(WaitlistError::InitializationFailed(reason.clone())),
            InitState::Connecting | InitState::Hydrating => Err(WaitlistError::NotInitialized),
        }
    }

    /// Wait until the gate reaches `Ready` (Ok) or `Failed` (Err)
    pub async fn wait_ready(&self) -> WaitlistResult<()> {
        let mut rx = self.state.subscribe();
        let terminal = rx
            .wait_for(InitState::is_terminal)
            .await
            .map_err(|_| WaitlistError::NotInitialized)?
            .clone();

        match terminal {
            InitState::Ready => Ok(()),
            InitState::Failed(reason) => Err(WaitlistError::InitializationFailed(reason)),
            InitState::Connecting | InitState::Hydrating => Err(WaitlistError::NotInitialized),
        }
    }

    /// Move to `Hydrating`. Ignored once a terminal state is reached.
    pub fn mark_hydrating(&self) {
        self.transition(InitState::Hydrating);
    }

    pub fn mark_ready(&self) {
        self.transition(InitState::Ready);
    }

    pub fn mark_failed(&self, reason: impl Into<String>) {
        self.transition(InitState::Failed(reason.into()));
    }

    /// Guard that fails the gate if dropped before a terminal state
    ///
    /// Held for the duration of an initialization attempt so that a cancelled
    /// attempt still releases every waiter.
    pub fn fail_on_drop(&self, reason: &'static str) -> FailOnDrop<'_> {
        FailOnDrop { gate: self, reason }
    }

    fn transition(&self, next: InitState) {
        self.state.send_if_modified(|current| {
            if current.is_terminal() {
                return false;
            }
            tracing::debug!(from = ?current, to = ?next, "Initialization state change");
            *current = next;
            true
        });
    }
}

pub struct FailOnDrop<'a> {
    gate: &'a InitializationGate,
    reason: &'static str,
}

impl Drop for FailOnDrop<'_> {
    fn drop(&mut self) {
        if !self.gate.state().is_terminal() {
            tracing::warn!(reason = self.reason, "Initialization abandoned");
            self.gate.mark_failed(self.reason);
        }
    }
}

impl Default for InitializationGate {
    fn default() -> Self {
        Self::new()
    }
}
