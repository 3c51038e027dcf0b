use std::fmt::Display;
use std::io;

use thiserror::Error;

/// Infrastructure failures around running a backend. Semantic outcomes of a
/// run (wrong password, busy mount, ...) are `Status` values, not errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Could not start {executable}: no such file")]
    NotFound { executable: String },

    #[error("I/O failure talking to the backend ({kind}): {message}")]
    IoError { kind: io::ErrorKind, message: String },

    #[error("Backend did not finish within {seconds}s")]
    Timeout { seconds: u64 },

    #[error("{operation} failed at the {stage} stage: {details}")]
    NetworkError {
        operation: &'static str,
        stage: NetworkStage,
        details: String,
    },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStage {
    #[error("request")]
    Request,
    #[error("response parse")]
    ResponseParse,
}

impl BackendError {
    fn network(operation: &'static str, stage: NetworkStage, error: impl Display) -> Self {
        Self::NetworkError {
            operation,
            stage,
            details: error.to_string(),
        }
    }

    pub fn network_request_from(operation: &'static str, error: impl Display) -> Self {
        Self::network(operation, NetworkStage::Request, error)
    }

    pub fn network_parse_from(operation: &'static str, error: impl Display) -> Self {
        Self::network(operation, NetworkStage::ResponseParse, error)
    }
}

impl From<io::Error> for BackendError {
    fn from(error: io::Error) -> Self {
        Self::IoError {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}
