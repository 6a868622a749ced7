//! Per-statement lifecycle.

use std::fmt;

/// Lifecycle of one statement. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    Pending,
    Spawning,
    Running,
    Exited { success: bool },
}

impl StatementState {
    fn rank(self) -> u8 {
        match self {
            StatementState::Pending => 0,
            StatementState::Spawning => 1,
            StatementState::Running => 2,
            StatementState::Exited { .. } => 3,
        }
    }

    /// Move to `next`, which must come later in the lifecycle.
    ///
    /// Spawning may jump straight to exited when nothing could be started.
    pub fn advance(&mut self, next: StatementState) -> Result<(), InvalidTransition> {
        let allowed = match (*self, next) {
            (StatementState::Pending, StatementState::Spawning) => true,
            (StatementState::Pending, StatementState::Exited { .. }) => true,
            (StatementState::Spawning, StatementState::Running) => true,
            (StatementState::Spawning, StatementState::Exited { .. }) => true,
            (StatementState::Running, StatementState::Exited { .. }) => true,
            _ => false,
        };
        if !allowed {
            return Err(InvalidTransition { from: *self, to: next });
        }
        debug_assert!(self.rank() < next.rank());
        *self = next;
        Ok(())
    }
}

impl fmt::Display for StatementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementState::Pending => write!(f, "pending"),
            StatementState::Spawning => write!(f, "spawning"),
            StatementState::Running => write!(f, "running"),
            StatementState::Exited { success: true } => write!(f, "exited(ok)"),
            StatementState::Exited { success: false } => write!(f, "exited(failed)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("statement cannot go from {from} to {to}")]
pub struct InvalidTransition {
    pub from: StatementState,
    pub to: StatementState,
}
