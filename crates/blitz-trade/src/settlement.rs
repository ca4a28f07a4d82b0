//! Settlement: outcome determination and bookkeeping.

use crate::lifecycle::TradePhase;
use blitz_core::{Notifier, Outcome, TradeClose, TradeRecord, UserPatch, UserRecord, UserStore};
use blitz_engine::MoneyEngine;
use rust_decimal::Decimal;
use tracing::info;

/// A settled trade, ready to be folded into ladder state and statistics.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub record: TradeRecord,
    pub outcome: Outcome,
    /// Realized profit (zero for losses).
    pub profit: Decimal,
    /// Stake the statistics charge on a loss; the brokerage figure when
    /// reported, else the amount we placed.
    pub stake: Decimal,
    pub close: TradeClose,
}

impl Settlement {
    /// Interpret a close event against its trade record.
    ///
    /// Outcome comes from the brokerage's explicit result field; profit is
    /// payout minus stake when a payout figure is present, else the
    /// reported profit directly.
    pub fn from_close(record: TradeRecord, close: TradeClose) -> Self {
        let outcome = if close.win { Outcome::Win } else { Outcome::Loss };
        let profit = close.profit();
        let stake = if close.stake > Decimal::ZERO {
            close.stake
        } else {
            record.amount
        };
        Self {
            record,
            outcome,
            profit,
            stake,
            close,
        }
    }

    pub fn is_win(&self) -> bool {
        self.outcome == Outcome::Win
    }

    /// Terminal lifecycle phase this settlement lands the trade in.
    pub fn phase(&self) -> TradePhase {
        match self.outcome {
            Outcome::Win => TradePhase::ClosedWin,
            Outcome::Loss => TradePhase::ClosedLoss,
        }
    }
}

/// Fold a settlement into ladder state and user statistics, then notify.
///
/// Writes the updated statistics and ladder snapshot back through the user
/// store; the ladder snapshot is absent when the feature is disabled for
/// the user.
pub fn apply_settlement(
    engine: &MoneyEngine,
    store: &dyn UserStore,
    notifier: &dyn Notifier,
    settlement: &Settlement,
    chart: Option<&[u8]>,
) {
    let user_id = settlement.record.user_id;
    let user = store
        .get_user(user_id)
        .unwrap_or_else(|| UserRecord::new(user_id, ""));

    let ladder = engine.apply_outcome(&user, &settlement.record.currency, settlement.outcome);

    let mut stats = user.stats.clone();
    stats.record(settlement.is_win(), settlement.profit, settlement.stake);

    store.update_user(
        user_id,
        UserPatch {
            stats: Some(stats),
            ladder,
        },
    );

    info!(
        user = user_id,
        trade_id = settlement.record.trade_id,
        outcome = %settlement.outcome,
        phase = ?settlement.phase(),
        profit = %settlement.profit,
        "Trade settled"
    );

    notifier.trade_closed(user_id, &settlement.close, settlement.profit, chart);
}
