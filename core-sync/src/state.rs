//! # Run State Machine
//!
//! Tracks where a single reconciliation run is and rejects illegal moves.
//!
//! ## State Machine
//!
//! ```text
//! Idle → FetchWindowComputed → Fetching → Diffing → Applying → Completed
//!   ↓              ↓               ↓          ↓
//!   └──→ Aborted ←─┘               └──────────┴──→ Failed
//! ```
//!
//! `Aborted` is only reachable before fetching starts. Once the provider has
//! been called the run either completes or fails; there is no mid-apply
//! cancellation.

use crate::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// Phase of a reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    FetchWindowComputed,
    Fetching,
    Diffing,
    Applying,
    Completed,
    /// Shutdown was requested before fetching
    Aborted,
    /// Fetching or diffing failed; nothing was written
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Aborted | RunState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::FetchWindowComputed => "fetch_window_computed",
            RunState::Fetching => "fetching",
            RunState::Diffing => "diffing",
            RunState::Applying => "applying",
            RunState::Completed => "completed",
            RunState::Aborted => "aborted",
            RunState::Failed => "failed",
        }
    }
}

impl FromStr for RunState {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(RunState::Idle),
            "fetch_window_computed" => Ok(RunState::FetchWindowComputed),
            "fetching" => Ok(RunState::Fetching),
            "diffing" => Ok(RunState::Diffing),
            "applying" => Ok(RunState::Applying),
            "completed" => Ok(RunState::Completed),
            "aborted" => Ok(RunState::Aborted),
            "failed" => Ok(RunState::Failed),
            _ => Err(SyncError::InvalidStateTransition {
                from: s.to_string(),
                to: s.to_string(),
                reason: "Unknown run state".to_string(),
            }),
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State holder for one run
#[derive(Debug, Clone)]
pub struct RunStateMachine {
    run_id: String,
    state: RunState,
}

impl RunStateMachine {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            state: RunState::Idle,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::InvalidStateTransition` when the move is not part
    /// of the run lifecycle; the current state is left unchanged.
    pub fn transition(&mut self, next: RunState) -> Result<()> {
        validate_transition(self.state, next)?;
        debug!(
            run_id = %self.run_id,
            from = %self.state,
            to = %next,
            "Sync run state transition"
        );
        self.state = next;
        Ok(())
    }
}

fn validate_transition(from: RunState, to: RunState) -> Result<()> {
    use RunState::*;

    let valid = matches!(
        (from, to),
        (Idle, FetchWindowComputed)
            | (FetchWindowComputed, Fetching)
            | (Fetching, Diffing)
            | (Diffing, Applying)
            | (Applying, Completed)
            | (Idle, Aborted)
            | (FetchWindowComputed, Aborted)
            | (Fetching, Failed)
            | (Diffing, Failed)
    );

    if valid {
        return Ok(());
    }

    let reason = if from.is_terminal() {
        "Run already finished"
    } else if to == Aborted {
        "Shutdown is only honoured before fetching"
    } else {
        "Steps must run in order"
    };

    Err(SyncError::InvalidStateTransition {
        from: from.as_str().to_string(),
        to: to.as_str().to_string(),
        reason: reason.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut run = RunStateMachine::new("run-1");

        for next in [
            RunState::FetchWindowComputed,
            RunState::Fetching,
            RunState::Diffing,
            RunState::Applying,
            RunState::Completed,
        ] {
            run.transition(next).unwrap();
        }

        assert_eq!(run.state(), RunState::Completed);
        assert!(run.state().is_terminal());
    }

    #[test]
    fn test_abort_only_before_fetching() {
        let mut run = RunStateMachine::new("run-1");
        run.transition(RunState::FetchWindowComputed).unwrap();
        assert!(run.clone().transition(RunState::Aborted).is_ok());

        run.transition(RunState::Fetching).unwrap();
        let err = run.transition(RunState::Aborted).unwrap_err();

        assert!(matches!(err, SyncError::InvalidStateTransition { .. }));
        assert_eq!(run.state(), RunState::Fetching);
    }

    #[test]
    fn test_skipping_a_step_is_rejected() {
        let mut run = RunStateMachine::new("run-1");

        assert!(run.transition(RunState::Applying).is_err());
        assert_eq!(run.state(), RunState::Idle);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut run = RunStateMachine::new("run-1");
        run.transition(RunState::Aborted).unwrap();

        let err = run.transition(RunState::FetchWindowComputed).unwrap_err();
        assert!(err.to_string().contains("Run already finished"));
    }

    #[test]
    fn test_state_string_roundtrip() {
        assert_eq!(
            "fetch_window_computed".parse::<RunState>().unwrap(),
            RunState::FetchWindowComputed
        );
        assert!("bogus".parse::<RunState>().is_err());
    }
}
