//! Module status exposed to the control plane.
//!
//! The pipeline is the only writer; any number of readers take snapshots.
//! Every read clones the whole status under one short lock, so readers
//! never observe a state from one update and a message from another.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// Lifecycle state of a vendor module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    /// Not configured to run.
    Disabled,
    /// Waiting for the next scheduled pass.
    Standby,
    /// A pass is running.
    InProgress,
    /// The last pass finished (or was cancelled).
    Ready,
    /// The last pass failed.
    Error,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleState::Disabled => "disabled",
            ModuleState::Standby => "standby",
            ModuleState::InProgress => "in progress",
            ModuleState::Ready => "ready",
            ModuleState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Point-in-time copy of a module's status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub state: ModuleState,
    /// Progress of the current pass, 0 to 100.
    pub progress: u8,
    pub message: String,
    pub current_task: Option<String>,
}

impl StatusSnapshot {
    fn initial(state: ModuleState) -> Self {
        Self {
            state,
            progress: 0,
            message: String::new(),
            current_task: None,
        }
    }
}

/// Shared, cheaply cloneable status cell.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    inner: Arc<RwLock<StatusSnapshot>>,
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusReporter {
    /// A reporter starting in [`ModuleState::Standby`].
    pub fn new() -> Self {
        Self::with_state(ModuleState::Standby)
    }

    pub fn disabled() -> Self {
        Self::with_state(ModuleState::Disabled)
    }

    fn with_state(state: ModuleState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StatusSnapshot::initial(state))),
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.read().clone()
    }

    pub fn state(&self) -> ModuleState {
        self.inner.read().state
    }

    /// Enter a new state with a message, resetting progress and task.
    pub fn transition(&self, state: ModuleState, message: impl Into<String>) {
        let mut status = self.inner.write();
        status.state = state;
        status.message = message.into();
        status.current_task = None;
        status.progress = match state {
            ModuleState::Ready => 100,
            _ => 0,
        };
    }

    /// Set progress (clamped to 100) and the current task.
    pub fn progress(&self, progress: u8, task: impl Into<String>) {
        let mut status = self.inner.write();
        status.progress = progress.min(100);
        status.current_task = Some(task.into());
    }
}
