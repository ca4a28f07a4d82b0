//! Copy trading: mirror the lead user's trades to opted-in followers.

use crate::dispatcher::copy_eligible;
use crate::registry::ConnectionRegistry;
use blitz_broker::ClientEvent;
use blitz_core::{Signal, TradeOpen, UserId, UserStore, DEFAULT_DURATION_MINUTES};
use blitz_trade::TradeExecutor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Mirrors the lead user's trade opens to followers.
///
/// Each copy reuses the lead trade's signal shape (asset, direction,
/// duration) but is sized independently by the copying user's own ladder
/// state; the lead's stake is never copied verbatim.
pub struct CopyTrader {
    lead: UserId,
    registry: Arc<ConnectionRegistry>,
    executor: Arc<TradeExecutor>,
    store: Arc<dyn UserStore>,
    pacing: Duration,
}

impl CopyTrader {
    pub fn new(
        lead: UserId,
        registry: Arc<ConnectionRegistry>,
        executor: Arc<TradeExecutor>,
        store: Arc<dyn UserStore>,
        pacing: Duration,
    ) -> Self {
        Self {
            lead,
            registry,
            executor,
            store,
            pacing,
        }
    }

    pub fn lead(&self) -> UserId {
        self.lead
    }

    /// Consume the lead client's event stream, mirroring every trade open.
    /// Runs until the stream closes.
    pub async fn run(&self, mut events: broadcast::Receiver<ClientEvent>) {
        info!(lead = self.lead, "Copy trader watching lead events");
        loop {
            match events.recv().await {
                Ok(ClientEvent::TradeOpened(open)) => {
                    self.mirror(&open).await;
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(lead = self.lead, skipped, "Copy trader lagged behind lead events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!(lead = self.lead, "Lead event stream closed");
                    return;
                }
            }
        }
    }

    /// Fan one lead trade out to eligible followers.
    pub async fn mirror(&self, open: &TradeOpen) {
        let signal = signal_from_open(open);
        info!(
            lead = self.lead,
            asset = %signal.asset,
            direction = %signal.direction,
            "Mirroring lead trade"
        );

        for client in self.registry.connected() {
            let user_id = client.user_id();
            let user = self.store.get_user(user_id);
            if !copy_eligible(user.as_ref(), user_id, self.lead) {
                continue;
            }

            match self.executor.execute(&client, &signal).await {
                Ok(placed) => {
                    info!(
                        user = user_id,
                        trade_id = placed.trade_id,
                        amount = %placed.amount,
                        "Copy trade placed"
                    );
                }
                Err(e) => {
                    warn!(user = user_id, error = %e, "Copy trade failed");
                }
            }

            tokio::time::sleep(self.pacing).await;
        }
    }
}

/// Derive the copy signal from an observed trade open.
fn signal_from_open(open: &TradeOpen) -> Signal {
    let direction = open.direction.unwrap_or(blitz_core::Direction::Call);
    let duration = open.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
    Signal::new(open.asset.clone(), direction, duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blitz_core::Direction;
    use rust_decimal_macros::dec;

    #[test]
    fn test_signal_from_open() {
        let open = TradeOpen {
            trade_id: 1,
            asset: "GBPUSD".to_string(),
            direction: Some(Direction::Put),
            amount: dec!(9000), // Lead's stake must not influence the copy
            duration_minutes: Some(3),
            opened_at_ms: 0,
        };

        let signal = signal_from_open(&open);
        assert_eq!(signal.asset, "GBPUSD");
        assert_eq!(signal.direction, Direction::Put);
        assert_eq!(signal.duration_minutes, 3);
    }

    #[test]
    fn test_signal_from_open_defaults() {
        let open = TradeOpen {
            trade_id: 1,
            asset: "EURUSD".to_string(),
            direction: None,
            amount: dec!(10),
            duration_minutes: None,
            opened_at_ms: 0,
        };

        let signal = signal_from_open(&open);
        assert_eq!(signal.direction, Direction::Call);
        assert_eq!(signal.duration_minutes, 5);
    }
}
