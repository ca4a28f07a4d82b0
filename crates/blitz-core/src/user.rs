//! User records and the persistence seam.
//!
//! Durable user storage is an external collaborator; the core only sees the
//! narrow [`UserStore`] interface. [`MemoryUserStore`] backs tests and
//! single-process deployments.

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// User identifier (chat id of the controlling user).
pub type UserId = i64;

/// Persisted ladder position, written back after every settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LadderSnapshot {
    /// Base amount the ladder currently scales from.
    pub base_amount: Decimal,
    /// The configured amount this ladder was derived from. Detects
    /// configuration changes that must reset the ladder.
    pub configured_base: Decimal,
    /// Current rung index.
    pub step: usize,
    /// Consecutive losses.
    pub loss_streak: u32,
    /// Current computed amount.
    pub current_amount: Decimal,
    /// Balance baseline for growth detection.
    pub balance_baseline: Decimal,
}

/// Aggregate per-user trading statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeStats {
    pub total_trades: u64,
    pub wins: u64,
    pub losses: u64,
    pub total_profit: Decimal,
}

impl TradeStats {
    /// Fold one settlement into the aggregates.
    ///
    /// Wins add the realized profit; losses subtract the lost stake.
    pub fn record(&mut self, win: bool, profit: Decimal, stake: Decimal) {
        self.total_trades += 1;
        if win {
            self.wins += 1;
            self.total_profit += profit;
        } else {
            self.losses += 1;
            self.total_profit -= stake;
        }
    }
}

/// A stored user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    /// Account currency as last known by storage (the live connection's
    /// currency takes precedence when available).
    pub currency: String,
    /// User-configured flat trade amount, if set.
    pub trade_amount: Option<Decimal>,
    /// Money-management ladder enabled (default on).
    pub martingale_enabled: bool,
    /// Signal fan-out enabled for this user (default on).
    pub auto_trading_enabled: bool,
    /// Mirror the lead user's trades (default off).
    pub copy_trading_enabled: bool,
    /// Persisted ladder position, if any.
    pub ladder: Option<LadderSnapshot>,
    /// Aggregate statistics.
    pub stats: TradeStats,
}

impl UserRecord {
    /// A fresh record with defaults for a user storage has never seen.
    pub fn new(id: UserId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            currency: "USD".to_string(),
            trade_amount: None,
            martingale_enabled: true,
            auto_trading_enabled: true,
            copy_trading_enabled: false,
            ladder: None,
            stats: TradeStats::default(),
        }
    }
}

/// Partial update written back after a settlement.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub stats: Option<TradeStats>,
    pub ladder: Option<LadderSnapshot>,
}

/// Narrow interface over the external user-record store.
///
/// Implementations adapt whatever backend actually holds the records; the
/// core mutates only statistics and ladder state.
pub trait UserStore: Send + Sync {
    fn get_user(&self, id: UserId) -> Option<UserRecord>;
    fn update_user(&self, id: UserId, patch: UserPatch);
    /// Broadcast channels subscribed to trade-result announcements.
    fn active_channels(&self) -> Vec<String>;
}

/// In-memory user store for tests and single-process runs.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: DashMap<UserId, UserRecord>,
    channels: Vec<String>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channels(channels: Vec<String>) -> Self {
        Self {
            users: DashMap::new(),
            channels,
        }
    }

    pub fn insert(&self, user: UserRecord) {
        self.users.insert(user.id, user);
    }
}

impl UserStore for MemoryUserStore {
    fn get_user(&self, id: UserId) -> Option<UserRecord> {
        self.users.get(&id).map(|u| u.clone())
    }

    fn update_user(&self, id: UserId, patch: UserPatch) {
        let mut entry = self
            .users
            .entry(id)
            .or_insert_with(|| UserRecord::new(id, ""));
        if let Some(stats) = patch.stats {
            entry.stats = stats;
        }
        if let Some(ladder) = patch.ladder {
            entry.ladder = Some(ladder);
        }
    }

    fn active_channels(&self) -> Vec<String> {
        self.channels.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_stats_record_win() {
        let mut stats = TradeStats::default();
        stats.record(true, dec!(1350), dec!(1500));
        assert_eq!(stats.total_trades, 1);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.total_profit, dec!(1350));
    }

    #[test]
    fn test_stats_record_loss_subtracts_stake() {
        let mut stats = TradeStats::default();
        stats.record(false, dec!(0), dec!(1500));
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.total_profit, dec!(-1500));
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryUserStore::new();
        store.insert(UserRecord::new(42, "a@b.c"));

        let user = store.get_user(42).unwrap();
        assert!(user.martingale_enabled);
        assert!(user.auto_trading_enabled);
        assert!(!user.copy_trading_enabled);

        let mut stats = user.stats.clone();
        stats.record(true, dec!(10), dec!(5));
        store.update_user(
            42,
            UserPatch {
                stats: Some(stats),
                ladder: None,
            },
        );
        assert_eq!(store.get_user(42).unwrap().stats.wins, 1);
    }

    #[test]
    fn test_memory_store_unknown_user() {
        let store = MemoryUserStore::new();
        assert!(store.get_user(7).is_none());
    }
}
