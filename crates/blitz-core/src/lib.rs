//! Core domain types for the blitz auto-trading bot.
//!
//! This crate provides the fundamental types used throughout the system:
//! - `Signal`, `Direction`: normalized trading signals
//! - `TradeRecord`, `TradeOpen`, `TradeClose`: trade lifecycle data
//! - `AssetDirectory`: instrument id <-> symbol mapping
//! - `UserRecord`, `UserStore`: user configuration and persistence seam
//! - `Notifier`, `ChartRenderer`: notification frontend seams

pub mod assets;
pub mod currency;
pub mod error;
pub mod notify;
pub mod signal;
pub mod trade;
pub mod user;

pub use assets::AssetDirectory;
pub use currency::{currency_symbol, minimum_stake};
pub use error::{CoreError, Result};
pub use notify::{ChartContext, ChartRenderer, LogNotifier, Notifier};
pub use signal::{Direction, RawSignal, Signal, DEFAULT_DURATION_MINUTES};
pub use trade::{Candle, Outcome, TradeClose, TradeOpen, TradeRecord};
pub use user::{
    LadderSnapshot, MemoryUserStore, TradeStats, UserId, UserPatch, UserRecord, UserStore,
};
