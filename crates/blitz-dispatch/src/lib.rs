//! Signal fan-out.
//!
//! Applies one incoming signal to every connected user's client, serially
//! and with inter-user pacing to respect brokerage rate limits, and mirrors
//! a distinguished lead user's trades to opted-in followers.

pub mod copy_trade;
pub mod dispatcher;
pub mod registry;

pub use copy_trade::CopyTrader;
pub use dispatcher::{DispatchConfig, DispatchSummary, Dispatcher};
pub use registry::ConnectionRegistry;
