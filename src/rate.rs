//! Rate resolution and tier strategies.
//!
//! The `rate` module decides which rate applies once a rule's
//! conditions have been resolved, and defines the
//! [`TieredRateStrategy`] trait which turns a tiered base rate into the
//! percentage actually applied to a given amount.

use crate::models::{CommissionRule, ConditionRule, RateConfig};

/// Picks the effective rate for a rule.
///
/// Returns `None` when the condition set did not match, meaning the rule
/// does not fire.  Otherwise the first matched condition (in authoring
/// order) carrying a rate override wins, falling back to the rule's base
/// rate when none of them does.
pub fn resolve_rate(
    rule: &CommissionRule,
    matched_conditions: &[&ConditionRule],
    overall_match: bool,
) -> Option<RateConfig> {
    if !overall_match {
        return None;
    }
    let rate = matched_conditions
        .iter()
        .find_map(|c| c.rate_override)
        .unwrap_or_else(|| rule.base_rate());
    Some(rate)
}

/// A tier strategy maps a transaction amount and a base tier rate to the
/// percentage applied to that amount.
///
/// Strategies must be thread-safe (`Send + Sync`) because the engine
/// may invoke them concurrently across multiple threads.
pub trait TieredRateStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;
    /// Returns the percentage rate for `amount`, given the rule's
    /// `base_rate`.
    fn compute_tiered_rate(&self, amount: f64, base_rate: f64) -> f64;
}

/// Step schedule: every full `step` of amount moves the transaction one
/// tier up, and each tier adds `increment` percentage points on top of
/// the base rate.  `max_tiers` caps the number of increments applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteppedTiers {
    pub step: f64,
    pub increment: f64,
    pub max_tiers: Option<u32>,
}

impl Default for SteppedTiers {
    fn default() -> Self {
        Self {
            step: 10_000.0,
            increment: 1.0,
            max_tiers: None,
        }
    }
}

impl SteppedTiers {
    /// Zero-based tier index of `amount`.
    pub fn tier_of(&self, amount: f64) -> u32 {
        if !amount.is_finite() || amount <= 0.0 || self.step.is_nan() || self.step <= 0.0 {
            return 0;
        }
        // float-to-int casts saturate
        let tier = (amount / self.step).floor() as u32;
        match self.max_tiers {
            Some(max) => tier.min(max),
            None => tier,
        }
    }
}

impl TieredRateStrategy for SteppedTiers {
    fn name(&self) -> &str {
        "stepped"
    }

    fn compute_tiered_rate(&self, amount: f64, base_rate: f64) -> f64 {
        let tier = self.tier_of(amount);
        // a non-finite increment never leaves the base tier
        if tier == 0 || !self.increment.is_finite() {
            return base_rate;
        }
        base_rate + f64::from(tier) * self.increment.max(0.0)
    }
}

/// Applies the base rate at every amount.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatTier;

impl TieredRateStrategy for FlatTier {
    fn name(&self) -> &str {
        "flat"
    }

    fn compute_tiered_rate(&self, _amount: f64, base_rate: f64) -> f64 {
        base_rate
    }
}
