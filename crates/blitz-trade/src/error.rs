//! Trade lifecycle error types.

use blitz_broker::BrokerError;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TradeError {
    /// Pre-flight check: the live balance cannot cover the sized amount.
    /// No placement attempt is made.
    #[error("Insufficient balance: need {currency} {needed}, have {currency} {available}")]
    InsufficientBalance {
        needed: Decimal,
        available: Decimal,
        currency: String,
    },

    /// Placement failed at the protocol layer (rejection, timeout,
    /// balance-not-ready). Terminal for this trade; no ladder mutation.
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

pub type TradeResult<T> = Result<T, TradeError>;
