//! Trade lifecycle tracking.
//!
//! Takes one (user, signal) pair from sizing through placement and on to a
//! settled outcome or a timeout:
//! `Sizing -> Placing -> (Placed | Rejected) -> Open -> (ClosedWin | ClosedLoss | TimedOut)`

pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod settlement;

pub use error::{TradeError, TradeResult};
pub use executor::{PlacedTrade, TradeExecutor};
pub use lifecycle::TradePhase;
pub use settlement::Settlement;
