//! Error kinds for the simulation pipeline.
//!
//! Loader and argument failures map to exit code 1, worker/device failures
//! to exit code 2. Driver operations are total over valid inputs; invariant
//! violations inside the driver are programmer errors and panic instead of
//! surfacing here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// Usage mismatch: bad option values or positional arguments.
    #[error("invalid arguments: {0}")]
    BadArgs(String),

    /// An input file is absent or holds no usable entries.
    #[error("missing or empty input: {0}")]
    InputMissing(String),

    /// Inputs disagree with each other (e.g. geometry references a material
    /// id with no loaded material).
    #[error("inconsistent input: {0}")]
    InputInconsistent(String),

    /// A worker failed mid-run. Output already written is not retracted.
    #[error("device failure: {0}")]
    Device(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode error: {0}")]
    Decode(#[from] bincode::Error),

    #[error("material parse error: {0}")]
    MaterialFormat(#[from] serde_json::Error),
}

impl SimError {
    /// Process exit code for this error: 2 for device failures, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            SimError::Device(_) => 2,
            _ => 1,
        }
    }
}
