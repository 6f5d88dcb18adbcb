//! Harness error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown mode '{0}', expected strict|hardened|off|all")]
    UnknownMode(String),
    #[error("no contract cases match '{0}'")]
    NoCases(String),
    #[error("{failed} of {total} contract case(s) failed")]
    ContractFailures { failed: usize, total: usize },
    #[error("{errors} invalid field(s) across {lines} log line(s)")]
    InvalidLog { lines: usize, errors: usize },
}
