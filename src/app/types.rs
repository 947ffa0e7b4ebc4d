use std::fmt;
use std::time::Duration;

use crate::error::{NetrunnerError, Result};

/// Controller lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Starting,
    AwaitingHealth,
    Running,
    Stopping,
    Stopped,
    Failed,
}

/// Why the network was shut down; doubles as the termination request payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal(String),
    UserRequest(String),
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal(name) => write!(f, "signal {}", name),
            Self::UserRequest(origin) => write!(f, "shutdown request from {}", origin),
        }
    }
}

/// Result of the bounded health wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessOutcome {
    Healthy,
    Error(String),
    Timeout(Duration),
}

impl ReadinessOutcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Healthy => Ok(()),
            Self::Error(message) => Err(NetrunnerError::Health { message }),
            Self::Timeout(timeout) => Err(NetrunnerError::HealthTimeout { timeout }),
        }
    }
}
