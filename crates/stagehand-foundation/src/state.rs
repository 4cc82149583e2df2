use crate::error::StagehandError;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;

/// Lifecycle state of a single worker (script-pointer pipeline or tracking
/// pipeline), as reported to the supervisor (C10).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerState {
    Initializing,
    Running,
    Stopping,
    Stopped,
    Failed { reason: String },
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Initializing => write!(f, "Initializing"),
            WorkerState::Running => write!(f, "Running"),
            WorkerState::Stopping => write!(f, "Stopping"),
            WorkerState::Stopped => write!(f, "Stopped"),
            WorkerState::Failed { reason } => write!(f, "Failed({reason})"),
        }
    }
}

/// Tracks the lifecycle state of a single component and broadcasts
/// transitions. One `StateManager` lives inside each worker process.
pub struct StateManager {
    state: Arc<RwLock<WorkerState>>,
    state_tx: Sender<WorkerState>,
    state_rx: Receiver<WorkerState>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    pub fn new() -> Self {
        let (state_tx, state_rx) = crossbeam_channel::unbounded();
        Self {
            state: Arc::new(RwLock::new(WorkerState::Initializing)),
            state_tx,
            state_rx,
        }
    }

    pub fn transition(&self, new_state: WorkerState) -> Result<(), StagehandError> {
        let mut current = self.state.write();

        let valid = matches!(
            (&*current, &new_state),
            (WorkerState::Initializing, WorkerState::Running)
                | (WorkerState::Initializing, WorkerState::Failed { .. })
                | (WorkerState::Running, WorkerState::Stopping)
                | (WorkerState::Running, WorkerState::Failed { .. })
                | (WorkerState::Stopping, WorkerState::Stopped)
        );

        if !valid {
            return Err(StagehandError::Fatal(format!(
                "invalid state transition: {:?} -> {:?}",
                *current, new_state
            )));
        }

        tracing::info!("state transition: {:?} -> {:?}", *current, new_state);
        *current = new_state.clone();
        let _ = self.state_tx.send(new_state);
        Ok(())
    }

    pub fn current(&self) -> WorkerState {
        self.state.read().clone()
    }

    pub fn subscribe(&self) -> Receiver<WorkerState> {
        self.state_rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions_succeed() {
        let mgr = StateManager::new();
        assert!(mgr.transition(WorkerState::Running).is_ok());
        assert!(mgr.transition(WorkerState::Stopping).is_ok());
        assert!(mgr.transition(WorkerState::Stopped).is_ok());
        assert_eq!(mgr.current(), WorkerState::Stopped);
    }

    #[test]
    fn invalid_transition_rejected() {
        let mgr = StateManager::new();
        assert!(mgr.transition(WorkerState::Stopped).is_err());
        assert_eq!(mgr.current(), WorkerState::Initializing);
    }
}
