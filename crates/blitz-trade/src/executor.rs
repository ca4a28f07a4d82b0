//! Trade execution: sizing, placement, and the settlement watcher.

use crate::error::{TradeError, TradeResult};
use crate::settlement::{apply_settlement, Settlement};
use blitz_broker::{BrokerClient, ClientEvent};
use blitz_core::{
    ChartContext, ChartRenderer, Notifier, Signal, TradeClose, TradeRecord, UserRecord, UserStore,
    DEFAULT_DURATION_MINUTES,
};
use blitz_engine::MoneyEngine;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Extra wait beyond the trade duration before a settlement watcher gives
/// up and leaves the trade unresolved.
pub const DEFAULT_SETTLE_GRACE: Duration = Duration::from_secs(30);

/// Candle interval used for settlement charts.
const CHART_INTERVAL_SECS: u32 = 30;

/// Result of a successful placement.
#[derive(Debug, Clone)]
pub struct PlacedTrade {
    pub trade_id: u64,
    pub amount: Decimal,
}

/// Executes one (user, signal) pair through the trade lifecycle.
pub struct TradeExecutor {
    engine: Arc<MoneyEngine>,
    store: Arc<dyn UserStore>,
    notifier: Arc<dyn Notifier>,
    chart: Option<Arc<dyn ChartRenderer>>,
    settle_grace: Duration,
}

impl TradeExecutor {
    pub fn new(
        engine: Arc<MoneyEngine>,
        store: Arc<dyn UserStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            engine,
            store,
            notifier,
            chart: None,
            settle_grace: DEFAULT_SETTLE_GRACE,
        }
    }

    /// Attach a chart renderer for settlement notifications.
    #[must_use]
    pub fn with_chart_renderer(mut self, renderer: Arc<dyn ChartRenderer>) -> Self {
        self.chart = Some(renderer);
        self
    }

    /// Override the settlement grace window (tests).
    #[must_use]
    pub fn with_settle_grace(mut self, grace: Duration) -> Self {
        self.settle_grace = grace;
        self
    }

    /// Run one signal for one user's client.
    ///
    /// Sizing failures and placement failures are terminal and mutate no
    /// ladder state. On success the settlement watcher is armed before this
    /// returns.
    pub async fn execute(
        &self,
        client: &Arc<BrokerClient>,
        signal: &Signal,
    ) -> TradeResult<PlacedTrade> {
        let user_id = client.user_id();
        let user = self
            .store
            .get_user(user_id)
            .unwrap_or_else(|| UserRecord::new(user_id, ""));

        // The live connection's currency wins over the stored one
        let live_currency = client.active_currency();
        let currency = if live_currency.is_empty() {
            user.currency.clone()
        } else {
            live_currency
        };

        // Sizing (includes the growth-rebase check and floor clamp)
        let balance = client.active_balance();
        let amount = self.engine.size_trade(&user, &currency, balance);

        if balance < amount {
            let err = TradeError::InsufficientBalance {
                needed: amount,
                available: balance,
                currency: currency.clone(),
            };
            self.notifier.trade_failed(user_id, &err.to_string());
            return Err(err);
        }

        info!(
            user = user_id,
            asset = %signal.asset,
            direction = %signal.direction,
            %amount,
            %currency,
            duration = signal.duration_minutes,
            "Executing trade"
        );

        // Subscribe before placing so the close event cannot slip past
        let events = client.events();

        // Placing: a rejection or timeout here is terminal and counts as
        // neither win nor loss.
        let trade_id = match client
            .place_trade(&signal.asset, signal.direction, amount, signal.duration_minutes)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                self.notifier.trade_failed(user_id, &e.to_string());
                return Err(e.into());
            }
        };

        let record = TradeRecord {
            user_id,
            trade_id,
            asset: signal.asset.clone(),
            direction: signal.direction,
            amount,
            duration_minutes: signal.duration_minutes,
            currency,
            placed_at_ms: chrono::Utc::now().timestamp_millis(),
        };

        let window = watch_window(signal.duration_minutes, self.settle_grace);
        self.spawn_watcher(client.clone(), events, record, window);

        Ok(PlacedTrade { trade_id, amount })
    }

    fn spawn_watcher(
        &self,
        client: Arc<BrokerClient>,
        events: broadcast::Receiver<ClientEvent>,
        record: TradeRecord,
        window: Duration,
    ) {
        let engine = self.engine.clone();
        let store = self.store.clone();
        let notifier = self.notifier.clone();
        let chart = self.chart.clone();

        tokio::spawn(async move {
            match watch_for_close(events, record.trade_id, window).await {
                Some(close) => {
                    let settlement = Settlement::from_close(record, close);
                    let image =
                        render_chart(chart.as_deref(), client.as_ref(), &settlement).await;
                    apply_settlement(
                        &engine,
                        store.as_ref(),
                        notifier.as_ref(),
                        &settlement,
                        image.as_deref(),
                    );
                }
                None => {
                    // A settlement arriving after this point is deliberately
                    // not applied; the trade stays unresolved and no result
                    // notification is sent.
                    info!(
                        user = record.user_id,
                        trade_id = record.trade_id,
                        window_secs = window.as_secs(),
                        "Settlement window elapsed, trade left unresolved"
                    );
                }
            }
        });
    }
}

/// Watch window for a trade: its duration (default when zero) plus grace.
fn watch_window(duration_minutes: u32, grace: Duration) -> Duration {
    let minutes = if duration_minutes > 0 {
        duration_minutes
    } else {
        DEFAULT_DURATION_MINUTES
    };
    Duration::from_secs(u64::from(minutes) * 60) + grace
}

/// Wait for the close event matching `trade_id`, up to `window`.
///
/// Returns `None` when the window elapses or the event stream ends; either
/// way the trade is left unresolved.
async fn watch_for_close(
    mut events: broadcast::Receiver<ClientEvent>,
    trade_id: u64,
    window: Duration,
) -> Option<TradeClose> {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(ClientEvent::TradeClosed(close)) if close.trade_id == trade_id => {
                    return Some(close);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(trade_id, skipped, "Settlement watcher lagged behind events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    };

    tokio::time::timeout(window, wait).await.unwrap_or(None)
}

/// Fetch candles for the settled window and render a chart.
///
/// Chart failures never block settlement; any error degrades to `None`.
async fn render_chart(
    renderer: Option<&dyn ChartRenderer>,
    client: &BrokerClient,
    settlement: &Settlement,
) -> Option<Vec<u8>> {
    let renderer = renderer?;
    let close = &settlement.close;

    let opened_ms = close.opened_at_ms.unwrap_or(settlement.record.placed_at_ms);
    let closed_ms = close
        .closed_at_ms
        .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
    let span_secs = ((closed_ms - opened_ms) / 1000).max(0);
    let count = (span_secs as u64)
        .div_ceil(u64::from(CHART_INTERVAL_SECS))
        .max(1) as u32;

    let active_id = client.instrument_id(&settlement.record.asset);
    match client
        .get_candles(active_id, CHART_INTERVAL_SECS, count, closed_ms / 1000)
        .await
    {
        Ok(candles) if !candles.is_empty() => {
            let ctx = ChartContext {
                asset: settlement.record.asset.clone(),
                entry_price: close.entry_price,
                exit_price: close.exit_price,
                opened_at_ms: opened_ms,
                closed_at_ms: closed_ms,
                win: settlement.is_win(),
            };
            renderer.render(&ctx, &candles)
        }
        Ok(_) => None,
        Err(e) => {
            debug!(trade_id = settlement.record.trade_id, error = %e, "Chart candle fetch failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blitz_core::Direction;
    use rust_decimal_macros::dec;

    fn close_event(trade_id: u64) -> ClientEvent {
        ClientEvent::TradeClosed(TradeClose {
            trade_id,
            asset: "EURUSD".to_string(),
            direction: Some(Direction::Call),
            stake: dec!(1500),
            win: true,
            payout: Some(dec!(2850)),
            reported_profit: None,
            entry_price: None,
            exit_price: None,
            opened_at_ms: None,
            closed_at_ms: None,
        })
    }

    fn open_event(trade_id: u64) -> ClientEvent {
        ClientEvent::TradeOpened(blitz_core::TradeOpen {
            trade_id,
            asset: "EURUSD".to_string(),
            direction: Some(Direction::Call),
            amount: dec!(1500),
            duration_minutes: Some(5),
            opened_at_ms: 0,
        })
    }

    #[test]
    fn test_watch_window() {
        let grace = Duration::from_secs(30);
        assert_eq!(watch_window(5, grace), Duration::from_secs(330));
        assert_eq!(watch_window(1, grace), Duration::from_secs(90));
        // Zero duration falls back to the 5-minute default
        assert_eq!(watch_window(0, grace), Duration::from_secs(330));
    }

    #[tokio::test]
    async fn test_watcher_resolves_matching_close() {
        let (tx, rx) = broadcast::channel(8);

        // Unrelated traffic first, then the matching close
        tx.send(open_event(42)).unwrap();
        tx.send(close_event(99)).unwrap();
        tx.send(close_event(42)).unwrap();

        let close = watch_for_close(rx, 42, Duration::from_secs(5))
            .await
            .expect("matching close should resolve the watcher");
        assert_eq!(close.trade_id, 42);
    }

    #[tokio::test]
    async fn test_watcher_ends_when_stream_closes() {
        let (tx, rx) = broadcast::channel(8);
        drop(tx);
        assert!(watch_for_close(rx, 42, Duration::from_secs(5)).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watcher_times_out_without_close() {
        let (_tx, rx) = broadcast::channel::<ClientEvent>(8);
        // 5-minute trade + 30s grace
        let handle = tokio::spawn(watch_for_close(rx, 42, Duration::from_secs(330)));
        tokio::time::advance(Duration::from_secs(331)).await;
        assert!(handle.await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn late_settlement_is_dropped() {
        // Documented limitation: a real settlement arriving 31 seconds
        // after a 5-minute trade's window is silently missed.
        let (tx, rx) = broadcast::channel(8);
        let handle = tokio::spawn(watch_for_close(rx, 42, Duration::from_secs(330)));

        tokio::time::advance(Duration::from_secs(331)).await;
        let _ = tx.send(close_event(42));

        assert!(
            handle.await.unwrap().is_none(),
            "a settlement after the window must not be applied"
        );
    }
}
