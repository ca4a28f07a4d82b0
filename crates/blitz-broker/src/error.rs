//! Broker client error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    /// Login failed (bad credentials or identity endpoint unreachable).
    /// Fatal to the login attempt; never retried automatically.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// No balance-selector id is resolved yet; retried exactly once by the
    /// placement path before surfacing.
    #[error("Balance not ready")]
    BalanceNotReady,

    /// The brokerage rejected the placement; reason reported verbatim.
    #[error("Placement rejected: {0}")]
    PlacementRejected(String),

    /// A correlated request saw no matching reply before its deadline.
    #[error("Request timed out: {0}")]
    RequestTimeout(&'static str),

    /// No usable connection (not connected, or outbound channel closed).
    #[error("Not connected")]
    NotConnected,

    /// Socket closed by the far end.
    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    /// Bounded reconnect policy ran out of attempts.
    #[error("Reconnect attempts exhausted after {0}")]
    ReconnectExhausted(u32),

    #[error("Malformed reply: {0}")]
    MalformedReply(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type BrokerResult<T> = Result<T, BrokerError>;
