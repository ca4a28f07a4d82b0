//! Engine error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid ladder: {0}")]
    InvalidLadder(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
