//! Commission computation engine.
//!
//! The `engine` module turns a [`CommissionRule`] and a
//! [`TransactionContext`] into an [`EvaluationResult`].  It uses the
//! [`rayon`] crate to parallelise batch evaluation across transactions.
//! Tiered rates are delegated to an implementation of the
//! [`TieredRateStrategy`] trait, so the tier schedule can be swapped
//! without touching the rest of the engine.

use crate::condition::resolve_conditions;
use crate::models::{
    BatchEvaluation, CommissionRule, EvaluationResult, RateConfig, RateType, RuleOutcome,
    TransactionContext, TransactionEvaluation,
};
use crate::rate::{resolve_rate, SteppedTiers, TieredRateStrategy};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Evaluates commission rules with a given tier strategy.
///
/// The engine holds no mutable state; one instance can be shared by any
/// number of threads.
#[derive(Clone)]
pub struct CommissionEngine {
    tiers: Arc<dyn TieredRateStrategy>,
}

impl Default for CommissionEngine {
    fn default() -> Self {
        Self::new(Arc::new(SteppedTiers::default()))
    }
}

impl std::fmt::Debug for CommissionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommissionEngine")
            .field("tiers", &self.tiers.name())
            .finish()
    }
}

impl CommissionEngine {
    pub fn new(tiers: Arc<dyn TieredRateStrategy>) -> Self {
        Self { tiers }
    }

    /// Evaluates one rule against one transaction.
    pub fn calculate(&self, rule: &CommissionRule, context: &TransactionContext) -> EvaluationResult {
        self.evaluate(rule, context).result
    }

    /// Like [`calculate`](Self::calculate), but also reports which
    /// conditions matched.
    pub fn evaluate(&self, rule: &CommissionRule, context: &TransactionContext) -> RuleOutcome {
        let outcome = |matched_condition_ids, result| RuleOutcome {
            rule_id: rule.id.clone(),
            matched_condition_ids,
            result,
        };

        if !rule.is_active {
            debug!(rule_id = %rule.id, "rule inactive");
            return outcome(Vec::new(), EvaluationResult::not_matched());
        }
        if !within_thresholds(rule, context.amount) {
            debug!(rule_id = %rule.id, amount = context.amount, "amount outside rule thresholds");
            return outcome(Vec::new(), EvaluationResult::not_matched());
        }

        let (overall_match, matched) = match &rule.advanced_conditions {
            Some(set) => {
                let resolution = resolve_conditions(set, context);
                (resolution.overall_match, resolution.matched_conditions)
            }
            None => (true, Vec::new()),
        };
        let matched_ids = matched.iter().map(|c| c.id.clone()).collect();

        let Some(rate) = resolve_rate(rule, &matched, overall_match) else {
            debug!(rule_id = %rule.id, "advanced conditions not satisfied");
            return outcome(matched_ids, EvaluationResult::not_matched());
        };

        let commission = clamp_commission(self.commission_for(rate, context.amount));
        debug!(
            rule_id = %rule.id,
            rate_type = ?rate.rate_type,
            rate = rate.rate,
            commission,
            "rule fired"
        );
        outcome(
            matched_ids,
            EvaluationResult {
                matched: true,
                effective_rate_type: Some(rate.rate_type),
                effective_rate: Some(rate.rate),
                commission_amount: Some(commission),
            },
        )
    }

    fn commission_for(&self, rate: RateConfig, amount: f64) -> f64 {
        match rate.rate_type {
            RateType::Percentage => amount * rate.rate / 100.0,
            RateType::Fixed => rate.rate,
            RateType::Tiered => amount * self.tiers.compute_tiered_rate(amount, rate.rate) / 100.0,
        }
    }

    /// Evaluates every active rule of a snapshot against one transaction.
    ///
    /// Inactive rules are left out of the result entirely.  How the
    /// outcomes are aggregated is up to the caller.
    pub fn evaluate_rules(
        &self,
        rules: &[CommissionRule],
        context: &TransactionContext,
    ) -> Vec<RuleOutcome> {
        rules
            .iter()
            .filter(|rule| rule.is_active)
            .map(|rule| self.evaluate(rule, context))
            .collect()
    }

    /// Evaluates a rule snapshot against many transactions in parallel.
    ///
    /// `cancel` is checked before each transaction starts; transactions
    /// not yet started when it is raised are skipped, and those already
    /// running finish normally.
    pub fn evaluate_batch(
        &self,
        rules: &[CommissionRule],
        transactions: &[TransactionContext],
        cancel: &AtomicBool,
    ) -> BatchEvaluation {
        let evaluations: Vec<TransactionEvaluation> = transactions
            .par_iter()
            .enumerate()
            .filter_map(|(index, context)| {
                if cancel.load(Ordering::Relaxed) {
                    return None;
                }
                Some(TransactionEvaluation {
                    index,
                    outcomes: self.evaluate_rules(rules, context),
                })
            })
            .collect();

        let cancelled = evaluations.len() < transactions.len();
        info!(
            transactions = transactions.len(),
            evaluated = evaluations.len(),
            rules = rules.len(),
            cancelled,
            "batch evaluation finished"
        );
        BatchEvaluation {
            evaluations,
            cancelled,
        }
    }
}

/// Evaluates one rule against one transaction using the default tier
/// schedule.
pub fn calculate_commission(rule: &CommissionRule, context: &TransactionContext) -> EvaluationResult {
    CommissionEngine::default().calculate(rule, context)
}

fn within_thresholds(rule: &CommissionRule, amount: f64) -> bool {
    if !amount.is_finite() {
        return false;
    }
    let above_min = rule.min_amount.map_or(true, |min| amount >= min);
    let below_max = rule.max_amount.map_or(true, |max| amount <= max);
    above_min && below_max
}

fn clamp_commission(value: f64) -> f64 {
    if value.is_nan() || value < 0.0 {
        0.0
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AdvancedConditions, ConditionField, ConditionLogic, ConditionRule, ConditionValue,
        Operator, RuleType,
    };
    use crate::rate::FlatTier;

    fn rule(rate_type: RateType, rate: f64) -> CommissionRule {
        CommissionRule {
            id: "r1".into(),
            name: "Test".into(),
            category: "consultation".into(),
            rule_type: RuleType::Doctor,
            rate_type,
            rate,
            min_amount: None,
            max_amount: None,
            conditions: String::new(),
            advanced_conditions: None,
            is_active: true,
        }
    }

    fn amount_gt(id: &str, value: f64, rate_override: Option<RateConfig>) -> ConditionRule {
        ConditionRule {
            id: id.into(),
            field: ConditionField::Amount,
            operator: Operator::Gt,
            value: ConditionValue::Number(value),
            second_value: None,
            rate_override,
        }
    }

    #[test]
    fn test_percentage_and_fixed() {
        let ctx = TransactionContext::with_amount(1000.0);
        let res = calculate_commission(&rule(RateType::Percentage, 10.0), &ctx);
        assert!(res.matched);
        assert_eq!(res.commission_amount, Some(100.0));

        let res = calculate_commission(&rule(RateType::Fixed, 500.0), &ctx);
        assert_eq!(res.commission_amount, Some(500.0));
        assert_eq!(res.effective_rate_type, Some(RateType::Fixed));
    }

    #[test]
    fn test_inactive_rule_never_fires() {
        let mut r = rule(RateType::Fixed, 10.0);
        r.is_active = false;
        let res = calculate_commission(&r, &TransactionContext::with_amount(100.0));
        assert_eq!(res, EvaluationResult::not_matched());
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        let mut r = rule(RateType::Fixed, 10.0);
        r.min_amount = Some(100.0);
        r.max_amount = Some(200.0);
        let fires = |amount| calculate_commission(&r, &TransactionContext::with_amount(amount)).matched;
        assert!(fires(100.0));
        assert!(fires(200.0));
        assert!(!fires(99.0));
        assert!(!fires(201.0));
        assert!(!fires(f64::NAN));
    }

    #[test]
    fn test_override_applies_only_when_matched() {
        let mut r = rule(RateType::Percentage, 5.0);
        r.advanced_conditions = Some(AdvancedConditions {
            logic: ConditionLogic::Or,
            conditions: vec![
                amount_gt(
                    "big",
                    5000.0,
                    Some(RateConfig {
                        rate_type: RateType::Percentage,
                        rate: 9.0,
                    }),
                ),
                amount_gt("any", 0.0, None),
            ],
        });
        let small = CommissionEngine::default().evaluate(&r, &TransactionContext::with_amount(1000.0));
        assert_eq!(small.result.commission_amount, Some(50.0));
        assert_eq!(small.matched_condition_ids, vec!["any"]);

        let big = calculate_commission(&r, &TransactionContext::with_amount(10_000.0));
        assert_eq!(big.effective_rate, Some(9.0));
        assert_eq!(big.commission_amount, Some(900.0));
    }

    #[test]
    fn test_tiered_uses_strategy() {
        let r = rule(RateType::Tiered, 2.0);
        let ctx = TransactionContext::with_amount(25_000.0);

        let stepped = CommissionEngine::default().calculate(&r, &ctx);
        // two full steps of 10,000 => 2% + 2 * 1%
        assert_eq!(stepped.commission_amount, Some(1000.0));
        assert_eq!(stepped.effective_rate, Some(2.0));

        let flat = CommissionEngine::new(Arc::new(FlatTier)).calculate(&r, &ctx);
        assert_eq!(flat.commission_amount, Some(500.0));
    }

    #[test]
    fn test_tiered_base_tier_with_unbounded_increment() {
        let tiers = SteppedTiers {
            increment: f64::INFINITY,
            ..SteppedTiers::default()
        };
        let engine = CommissionEngine::new(Arc::new(tiers));
        let res = engine.calculate(&rule(RateType::Tiered, 2.0), &TransactionContext::with_amount(500.0));
        assert_eq!(res.commission_amount, Some(10.0));
    }

    #[test]
    fn test_negative_commission_is_clamped() {
        let r = rule(RateType::Percentage, 10.0);
        let res = calculate_commission(&r, &TransactionContext::with_amount(-100.0));
        assert!(res.matched);
        assert_eq!(res.commission_amount, Some(0.0));

        let r = rule(RateType::Fixed, -5.0);
        let res = calculate_commission(&r, &TransactionContext::with_amount(100.0));
        assert_eq!(res.commission_amount, Some(0.0));
    }

    #[test]
    fn test_evaluate_rules_skips_inactive() {
        let mut off = rule(RateType::Fixed, 1.0);
        off.id = "off".into();
        off.is_active = false;
        let on = rule(RateType::Fixed, 2.0);
        let outcomes =
            CommissionEngine::default().evaluate_rules(&[off, on], &TransactionContext::with_amount(1.0));
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].rule_id, "r1");
    }

    #[test]
    fn test_batch_respects_cancellation() {
        let rules = vec![rule(RateType::Percentage, 10.0)];
        let txs: Vec<_> = (1..=50).map(|i| TransactionContext::with_amount(f64::from(i))).collect();
        let engine = CommissionEngine::default();

        let done = engine.evaluate_batch(&rules, &txs, &AtomicBool::new(false));
        assert!(!done.cancelled);
        assert_eq!(done.evaluations.len(), 50);
        assert_eq!(done.evaluations[9].index, 9);
        assert_eq!(done.evaluations[9].outcomes[0].result.commission_amount, Some(1.0));

        let stopped = engine.evaluate_batch(&rules, &txs, &AtomicBool::new(true));
        assert!(stopped.cancelled);
        assert!(stopped.evaluations.is_empty());
    }
}
