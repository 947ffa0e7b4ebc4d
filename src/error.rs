use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetrunnerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Network start failed: {message}")]
    Start { message: String },

    #[error("Network reported unhealthy: {message}")]
    Health { message: String },

    #[error("Network did not become healthy within {timeout:?}")]
    HealthTimeout { timeout: Duration },

    #[error("Network stop failed: {message}")]
    Stop { message: String },

    #[error("Node error in {node}: {message}")]
    Node { node: String, message: String },

    #[error("System error: {message}")]
    System { message: String },
}

impl NetrunnerError {
    pub fn start<S: Into<String>>(message: S) -> Self {
        Self::Start {
            message: message.into(),
        }
    }

    pub fn health<S: Into<String>>(message: S) -> Self {
        Self::Health {
            message: message.into(),
        }
    }

    pub fn stop<S: Into<String>>(message: S) -> Self {
        Self::Stop {
            message: message.into(),
        }
    }

    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn node<S: Into<String>, M: Into<String>>(node: S, message: M) -> Self {
        Self::Node {
            node: node.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NetrunnerError>;
