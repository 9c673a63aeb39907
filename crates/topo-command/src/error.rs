//! Command and configuration errors

use thiserror::Error;
use topo_core::TopoError;

/// Configuration loading errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

/// Errors raised while running commands
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CommandError {
    #[error("Cannot {action} {command}: it is {status}")]
    InvalidState {
        command: String,
        action: String,
        status: String,
    },

    #[error("{command} failed: {message}")]
    Failed { command: String, message: String },

    #[error("Redo of {command} produced other changes than its first run")]
    RedoDiverged { command: String },

    #[error(transparent)]
    Topo(#[from] TopoError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type CommandResult<T> = Result<T, CommandError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topo_errors_convert() {
        let err: CommandError = TopoError::Meshed("CoFace0003".into()).into();
        assert_eq!(err.to_string(), "Cannot modify CoFace0003: it is already meshed");
        let err = CommandError::InvalidState {
            command: "Split CoFace".into(),
            action: "undo".into(),
            status: "PROCESSING".into(),
        };
        assert!(err.to_string().contains("PROCESSING"));
    }
}
