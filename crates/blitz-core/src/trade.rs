//! Trade lifecycle data.
//!
//! `TradeOpen`/`TradeClose` are the interpreted position-update events a
//! protocol client emits; `TradeRecord` is the bookkeeping entry the
//! lifecycle tracker keeps from placement through settlement.

use crate::signal::Direction;
use crate::user::UserId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Settled trade outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Win => write!(f, "WIN"),
            Self::Loss => write!(f, "LOSS"),
        }
    }
}

/// A trade-open event interpreted from a position push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOpen {
    /// Broker-assigned trade id.
    pub trade_id: u64,
    /// Asset symbol (already resolved through the directory).
    pub asset: String,
    /// Direction, when the push carried a recognizable one.
    pub direction: Option<Direction>,
    /// Staked amount.
    pub amount: Decimal,
    /// Duration in whole minutes, when derivable from the push.
    pub duration_minutes: Option<u32>,
    /// Open timestamp (Unix milliseconds).
    pub opened_at_ms: i64,
}

/// A trade-close event interpreted from a position push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeClose {
    /// Broker-assigned trade id.
    pub trade_id: u64,
    /// Asset symbol.
    pub asset: String,
    /// Direction, when the push carried a recognizable one.
    pub direction: Option<Direction>,
    /// Staked amount the brokerage reports for the position.
    pub stake: Decimal,
    /// Whether the brokerage settled the position as a win.
    pub win: bool,
    /// Total payout figure, when present.
    pub payout: Option<Decimal>,
    /// Directly reported profit figure, when present.
    pub reported_profit: Option<Decimal>,
    /// Entry quote, when present (chart rendering).
    pub entry_price: Option<Decimal>,
    /// Exit quote, when present (chart rendering).
    pub exit_price: Option<Decimal>,
    /// Open timestamp (Unix milliseconds), when present.
    pub opened_at_ms: Option<i64>,
    /// Close timestamp (Unix milliseconds), when present.
    pub closed_at_ms: Option<i64>,
}

impl TradeClose {
    /// Profit realized by this close.
    ///
    /// A win's profit is payout minus stake when a payout figure is present
    /// (some payloads report the gross payout, some the net figure), else
    /// the reported profit directly. A loss realizes zero profit here; the
    /// lost stake is accounted at the statistics layer.
    pub fn profit(&self) -> Decimal {
        if !self.win {
            return Decimal::ZERO;
        }
        match self.payout {
            Some(payout) if payout > self.stake => payout - self.stake,
            Some(payout) => payout,
            None => self.reported_profit.unwrap_or(Decimal::ZERO),
        }
    }
}

/// Bookkeeping record for one placed trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Owning user.
    pub user_id: UserId,
    /// Broker-assigned trade id.
    pub trade_id: u64,
    /// Asset symbol.
    pub asset: String,
    /// Direction.
    pub direction: Direction,
    /// Staked amount.
    pub amount: Decimal,
    /// Duration in whole minutes.
    pub duration_minutes: u32,
    /// Account currency at placement time.
    pub currency: String,
    /// Placement timestamp (Unix milliseconds).
    pub placed_at_ms: i64,
}

/// One OHLC bar returned by the candle endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    /// Bar start (Unix seconds).
    pub from: i64,
    /// Bar end (Unix seconds).
    pub to: i64,
    pub open: Decimal,
    pub close: Decimal,
    /// Low.
    pub min: Decimal,
    /// High.
    pub max: Decimal,
}
