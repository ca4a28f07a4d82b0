//! Money-management engine.
//!
//! A per-user martingale ladder: losses escalate the stake along a fixed
//! multiplier sequence, wins reset it, and sustained balance growth rebases
//! the base amount. Pure transition rules over in-memory state keyed by
//! user id.

pub mod error;
pub mod ladder;
pub mod state;
pub mod store;

pub use error::{EngineError, EngineResult};
pub use ladder::{LadderConfig, LadderPreset};
pub use state::LadderState;
pub use store::MoneyEngine;
