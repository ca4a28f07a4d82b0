//! Brokerage protocol client.
//!
//! One persistent WebSocket connection per user, providing:
//! - Identity-endpoint authentication and socket handshake
//! - Request/response correlation over the asynchronous push channel
//! - Push demultiplexing (profile, balances, position updates)
//! - Heartbeating and supervised reconnection with a fixed-delay policy
//! - Trade placement and candle fetching built on the correlation primitive

pub mod auth;
pub mod client;
pub mod connection;
pub mod error;
pub mod message;
pub mod pending;

pub use auth::{AuthClient, Credentials, SessionToken};
pub use client::{AccountBalances, AccountMode, BalanceSlot, BrokerClient, BrokerConfig, ClientEvent};
pub use connection::{Connection, ConnectionConfig, ConnectionState, ReconnectPolicy};
pub use error::{BrokerError, BrokerResult};
pub use message::{Frame, WireRequest};
pub use pending::PendingRequests;

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
