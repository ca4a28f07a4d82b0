//! Keyed per-user engine store.
//!
//! One ladder entry per user id, mutated with per-key exclusive access
//! (never one global lock). Entries are rehydrated from the user record on
//! first use and snapshotted back after every settlement.

use crate::ladder::LadderConfig;
use crate::state::LadderState;
use blitz_core::{minimum_stake, LadderSnapshot, Outcome, UserId, UserRecord};
use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::{debug, info};

/// The money-management engine: ladder rules plus the keyed state map.
pub struct MoneyEngine {
    ladder: LadderConfig,
    states: DashMap<UserId, LadderState>,
}

impl MoneyEngine {
    pub fn new(ladder: LadderConfig) -> Self {
        Self {
            ladder,
            states: DashMap::new(),
        }
    }

    pub fn ladder(&self) -> &LadderConfig {
        &self.ladder
    }

    /// Base amount a user's ladder scales from: their configured amount
    /// when it clears the currency floor, else the floor itself.
    fn configured_base(user: &UserRecord, floor: Decimal) -> Decimal {
        user.trade_amount.filter(|a| *a >= floor).unwrap_or(floor)
    }

    /// Compute the amount for the next trade.
    ///
    /// Runs the balance-growth rebase check before sizing, so one decision
    /// never applies both a loss-advance and a rebase. The returned amount
    /// is clamped upward to the currency floor. With the ladder disabled,
    /// sizing is the user's flat configured amount (still floor-clamped).
    pub fn size_trade(&self, user: &UserRecord, currency: &str, live_balance: Decimal) -> Decimal {
        let floor = minimum_stake(currency);

        if !user.martingale_enabled {
            return user.trade_amount.unwrap_or(floor).max(floor);
        }

        let mut entry = self
            .states
            .entry(user.id)
            .or_insert_with(|| Self::rehydrate(user, floor));
        let state = entry.value_mut();

        // An externally changed configured amount must not size against the
        // old ladder position.
        let configured = Self::configured_base(user, floor);
        if state.configured_base != configured {
            info!(
                user = user.id,
                old = %state.configured_base,
                new = %configured,
                "Configured amount changed, resetting ladder"
            );
            *state = LadderState::fresh(configured);
        }

        if state.rebase_on_growth(live_balance) {
            info!(
                user = user.id,
                base = %state.base_amount,
                baseline = %state.balance_baseline,
                "Balance grew 10%, base rebased"
            );
        }

        state.current_amount.max(floor)
    }

    /// Apply a settled outcome, returning the snapshot to persist.
    ///
    /// Returns `None` (and mutates nothing) when the ladder is disabled for
    /// the user.
    pub fn apply_outcome(
        &self,
        user: &UserRecord,
        currency: &str,
        outcome: Outcome,
    ) -> Option<LadderSnapshot> {
        if !user.martingale_enabled {
            return None;
        }

        let floor = minimum_stake(currency);
        let mut entry = self
            .states
            .entry(user.id)
            .or_insert_with(|| Self::rehydrate(user, floor));
        let state = entry.value_mut();

        match outcome {
            Outcome::Win => {
                state.record_win();
                debug!(user = user.id, base = %state.base_amount, "Win, ladder reset");
            }
            Outcome::Loss => {
                state.record_loss(&self.ladder);
                debug!(
                    user = user.id,
                    losses = state.losses,
                    next = %state.current_amount,
                    "Loss recorded"
                );
            }
        }

        Some(state.to_snapshot())
    }

    /// Current ladder position, if one exists in memory.
    pub fn snapshot(&self, user_id: UserId) -> Option<LadderSnapshot> {
        self.states.get(&user_id).map(|s| s.to_snapshot())
    }

    /// Explicitly drop a user's state (configured amount changed through
    /// the command surface, or the feature was toggled).
    pub fn clear(&self, user_id: UserId) {
        self.states.remove(&user_id);
    }

    fn rehydrate(user: &UserRecord, floor: Decimal) -> LadderState {
        match &user.ladder {
            Some(snapshot) => {
                debug!(user = user.id, "Ladder rehydrated from storage");
                LadderState::from_snapshot(snapshot)
            }
            None => LadderState::fresh(Self::configured_base(user, floor)),
        }
    }
}
