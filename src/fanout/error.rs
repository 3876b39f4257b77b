//! Fan-out error taxonomy.
//!
//! Worker errors stay inside the aggregator and are only tallied. The
//! aggregate error is what reaches the inbound caller.

use std::time::Duration;

use thiserror::Error;

/// Why a single downstream call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    #[error("downstream transport error: {0}")]
    Transport(String),

    #[error("unexpected http status code: {0}")]
    Status(u16),

    #[error("could not decode downstream response: {0}")]
    Decode(String),

    #[error("downstream call timed out after {0:?}")]
    Timeout(Duration),

    #[error("downstream call cancelled")]
    Cancelled,

    #[error("worker task aborted: {0}")]
    Aborted(String),
}

impl WorkerError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Status(_) => "status",
            Self::Decode(_) => "decode",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
            Self::Aborted(_) => "aborted",
        }
    }
}

/// Why a fan-out produced no value.
#[derive(Debug, Error)]
pub enum FanOutError {
    #[error("all {workers} downstream calls failed")]
    Exhausted { workers: usize },

    #[error("inbound request cancelled")]
    Cancelled,

    #[error("could not encode response body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("fan-out task aborted: {0}")]
    Aborted(String),
}

impl FanOutError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Exhausted { .. } => "exhausted",
            Self::Cancelled => "cancelled",
            Self::Encode(_) => "encode",
            Self::Aborted(_) => "aborted",
        }
    }
}
