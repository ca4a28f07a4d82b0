//! Notification frontend seams.
//!
//! The chat frontend and chart renderer are external collaborators; the
//! core emits through these traits and ships a logging implementation for
//! headless runs and tests.

use crate::trade::{Candle, TradeClose, TradeOpen};
use crate::user::UserId;
use rust_decimal::Decimal;
use tracing::info;

/// Inputs handed to the chart renderer alongside the OHLC bars.
#[derive(Debug, Clone)]
pub struct ChartContext {
    pub asset: String,
    pub entry_price: Option<Decimal>,
    pub exit_price: Option<Decimal>,
    pub opened_at_ms: i64,
    pub closed_at_ms: i64,
    pub win: bool,
}

/// Renders a settlement chart from candles. External collaborator.
pub trait ChartRenderer: Send + Sync {
    /// Render a chart, returning the encoded image bytes, or `None` when
    /// rendering is unavailable. Failures must never block settlement.
    fn render(&self, ctx: &ChartContext, candles: &[Candle]) -> Option<Vec<u8>>;
}

/// Receives user-facing trade events. External collaborator.
pub trait Notifier: Send + Sync {
    fn trade_opened(&self, user: UserId, open: &TradeOpen);
    fn trade_closed(&self, user: UserId, close: &TradeClose, profit: Decimal, chart: Option<&[u8]>);
    /// Plain descriptive text for a failed execution attempt.
    fn trade_failed(&self, user: UserId, reason: &str);
}

/// Notifier that writes events to the log stream.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn trade_opened(&self, user: UserId, open: &TradeOpen) {
        info!(
            user,
            trade_id = open.trade_id,
            asset = %open.asset,
            amount = %open.amount,
            "Trade opened"
        );
    }

    fn trade_closed(
        &self,
        user: UserId,
        close: &TradeClose,
        profit: Decimal,
        chart: Option<&[u8]>,
    ) {
        info!(
            user,
            trade_id = close.trade_id,
            asset = %close.asset,
            win = close.win,
            profit = %profit,
            has_chart = chart.is_some(),
            "Trade closed"
        );
    }

    fn trade_failed(&self, user: UserId, reason: &str) {
        info!(user, reason, "Trade failed");
    }
}
