use thiserror::Error;

use crate::types::SessionStatus;

#[derive(Error, Debug)]
pub enum Error {
    // Identity errors
    #[error("Invalid hardware address: {0}")]
    InvalidMacAddress(String),

    #[error("Invalid session status: {0}")]
    InvalidStatus(String),

    // State machine errors
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    // Configuration errors
    #[error("Invalid rate entry: {0}")]
    InvalidRate(String),

    #[error("Invalid schedule time: {0}")]
    InvalidScheduleTime(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // Collaborator errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
