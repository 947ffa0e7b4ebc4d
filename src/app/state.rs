use super::{NetworkController, RunState};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Shared, observable run state
#[derive(Clone)]
pub struct RunStateHandle {
    tx: Arc<watch::Sender<RunState>>,
}

impl RunStateHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(RunState::Idle);
        Self { tx: Arc::new(tx) }
    }

    /// Update the state; succeeds whether or not anyone is watching
    pub fn set(&self, state: RunState) {
        let previous = self.tx.send_replace(state);
        if previous != state {
            debug!("Run state changed: {:?} -> {:?}", previous, state);
        }
    }

    pub fn get(&self) -> RunState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.tx.subscribe()
    }
}

impl Default for RunStateHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkController {
    /// Current run state
    pub fn state(&self) -> RunState {
        self.state.get()
    }

    /// Watch run state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }
}
