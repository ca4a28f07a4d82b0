//! Per-user ladder state and its transition rules.

use crate::ladder::LadderConfig;
use blitz_core::LadderSnapshot;
use rust_decimal::Decimal;

/// 1.10 — the balance-growth trigger and the base bump factor.
fn growth_factor() -> Decimal {
    Decimal::new(110, 2)
}

/// One user's ladder position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadderState {
    /// Amount the ladder currently scales from (may exceed the configured
    /// amount after growth rebasing).
    pub base_amount: Decimal,
    /// Configured amount this ladder was derived from; a mismatch against
    /// the user record means the configuration changed under us.
    pub configured_base: Decimal,
    /// Current rung index.
    pub step: usize,
    /// Consecutive losses.
    pub losses: u32,
    /// Amount the next trade will stake.
    pub current_amount: Decimal,
    /// Balance baseline for growth detection; zero until first seeded.
    pub balance_baseline: Decimal,
}

impl LadderState {
    /// A fresh ladder scaled from `base`.
    pub fn fresh(base: Decimal) -> Self {
        Self {
            base_amount: base,
            configured_base: base,
            step: 0,
            losses: 0,
            current_amount: base,
            balance_baseline: Decimal::ZERO,
        }
    }

    pub fn from_snapshot(snapshot: &LadderSnapshot) -> Self {
        Self {
            base_amount: snapshot.base_amount,
            configured_base: snapshot.configured_base,
            step: snapshot.step,
            losses: snapshot.loss_streak,
            current_amount: snapshot.current_amount,
            balance_baseline: snapshot.balance_baseline,
        }
    }

    pub fn to_snapshot(&self) -> LadderSnapshot {
        LadderSnapshot {
            base_amount: self.base_amount,
            configured_base: self.configured_base,
            step: self.step,
            loss_streak: self.losses,
            current_amount: self.current_amount,
            balance_baseline: self.balance_baseline,
        }
    }

    fn reset(&mut self) {
        self.step = 0;
        self.losses = 0;
        self.current_amount = self.base_amount;
    }

    /// A win returns the ladder to base.
    pub fn record_win(&mut self) {
        self.reset();
    }

    /// A loss advances the ladder; hitting `max_steps` consecutive losses
    /// resets instead (circuit breaker), leaving state identical to a win.
    pub fn record_loss(&mut self, ladder: &LadderConfig) {
        self.losses += 1;
        if self.losses >= ladder.max_steps() {
            self.reset();
        } else {
            self.step = (self.step + 1).min(ladder.last_step());
            self.current_amount =
                self.base_amount * Decimal::from(ladder.multiplier(self.step));
        }
    }

    /// Growth rebase: when the live balance has grown at least 10% over the
    /// stored baseline, bump the base by 10% (rounded), reset the ladder,
    /// and move the baseline to the live balance.
    ///
    /// A zero baseline is seeded from the first positive balance without
    /// any other mutation. Idempotent for an unchanged balance.
    pub fn rebase_on_growth(&mut self, live_balance: Decimal) -> bool {
        if self.balance_baseline.is_zero() {
            if live_balance > Decimal::ZERO {
                self.balance_baseline = live_balance;
            }
            return false;
        }

        if live_balance >= self.balance_baseline * growth_factor() {
            self.base_amount = (self.base_amount * growth_factor()).round();
            self.balance_baseline = live_balance;
            self.reset();
            return true;
        }

        false
    }
}
