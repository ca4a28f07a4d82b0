//! Serial per-user signal fan-out.

use crate::registry::ConnectionRegistry;
use blitz_core::{Signal, UserId, UserRecord, UserStore};
use blitz_trade::TradeExecutor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Dispatcher pacing.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Pause between users during signal fan-out.
    pub user_pacing: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            user_pacing: Duration::from_millis(800),
        }
    }
}

/// Per-signal fan-out summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub placed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Applies one signal to every connected user.
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    executor: Arc<TradeExecutor>,
    store: Arc<dyn UserStore>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        executor: Arc<TradeExecutor>,
        store: Arc<dyn UserStore>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            registry,
            executor,
            store,
            config,
        }
    }

    /// Fan one signal out across all connected users.
    ///
    /// Execution is deliberately serial with a fixed pause between users to
    /// stay under brokerage rate limits; one user's failure never stops the
    /// fan-out.
    pub async fn dispatch(&self, signal: &Signal) -> DispatchSummary {
        let clients = self.registry.connected();
        info!(
            signal = %signal.id,
            asset = %signal.asset,
            direction = %signal.direction,
            duration = signal.duration_minutes,
            users = clients.len(),
            "Dispatching signal"
        );

        let mut summary = DispatchSummary::default();

        for client in clients {
            let user_id = client.user_id();
            let user = self.store.get_user(user_id);

            if !auto_trading_enabled(user.as_ref()) {
                info!(user = user_id, "Auto-trading disabled, skipping");
                summary.skipped += 1;
                continue;
            }

            match self.executor.execute(&client, signal).await {
                Ok(placed) => {
                    info!(
                        user = user_id,
                        trade_id = placed.trade_id,
                        amount = %placed.amount,
                        "Trade placed"
                    );
                    summary.placed += 1;
                }
                Err(e) => {
                    warn!(user = user_id, error = %e, "Trade failed");
                    summary.failed += 1;
                }
            }

            tokio::time::sleep(self.config.user_pacing).await;
        }

        info!(
            signal = %signal.id,
            placed = summary.placed,
            skipped = summary.skipped,
            failed = summary.failed,
            "Signal dispatched"
        );
        summary
    }
}

/// A user with no stored record trades with defaults; a stored record must
/// have the flag on.
pub(crate) fn auto_trading_enabled(user: Option<&UserRecord>) -> bool {
    user.map(|u| u.auto_trading_enabled).unwrap_or(true)
}

/// Copy-trading eligibility: opted in, and never the lead themselves.
pub(crate) fn copy_eligible(user: Option<&UserRecord>, user_id: UserId, lead: UserId) -> bool {
    user_id != lead && user.map(|u| u.copy_trading_enabled).unwrap_or(false)
}
