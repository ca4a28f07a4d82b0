//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Broker error: {0}")]
    Broker(#[from] blitz_broker::BrokerError),

    #[error("Engine error: {0}")]
    Engine(#[from] blitz_engine::EngineError),

    #[error("API error: {0}")]
    Api(#[from] blitz_api::ApiError),

    #[error("Missing password environment variable: {0}")]
    MissingPassword(String),
}

pub type AppResult<T> = Result<T, AppError>;
