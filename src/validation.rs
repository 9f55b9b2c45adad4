//! Authoring-time rule validation.
//!
//! The evaluator fails closed on malformed rules, but those rules should
//! never get that far: [`validate_rule`] is run whenever a rule enters a
//! [`crate::ruleset::RuleSet`], including on import.

use crate::error::ValidationError;
use crate::models::{CommissionRule, ConditionRule, Operator};
use std::collections::HashSet;

fn valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate >= 0.0
}

/// Checks a rule for configuration errors, returning the first one found.
pub fn validate_rule(rule: &CommissionRule) -> Result<(), ValidationError> {
    if rule.id.trim().is_empty() {
        return Err(ValidationError::EmptyId);
    }
    if rule.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if !valid_rate(rule.rate) {
        return Err(ValidationError::InvalidRate(rule.rate));
    }
    for bound in [rule.min_amount, rule.max_amount].into_iter().flatten() {
        if !bound.is_finite() {
            return Err(ValidationError::InvalidBound(bound));
        }
    }
    if let (Some(min), Some(max)) = (rule.min_amount, rule.max_amount) {
        if max < min {
            return Err(ValidationError::InvertedBounds { min, max });
        }
    }

    if let Some(set) = &rule.advanced_conditions {
        let mut seen = HashSet::new();
        for condition in &set.conditions {
            if !seen.insert(condition.id.as_str()) {
                return Err(ValidationError::DuplicateConditionId(condition.id.clone()));
            }
            validate_condition(condition)?;
        }
    }
    Ok(())
}

fn validate_condition(condition: &ConditionRule) -> Result<(), ValidationError> {
    let id = || condition.id.clone();

    if condition.field.is_numeric() {
        let value = condition
            .value
            .as_number()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ValidationError::ValueKindMismatch(id()))?;
        if condition.operator == Operator::Between {
            match condition.second_value {
                Some(upper) if upper.is_finite() && upper >= value => {}
                _ => return Err(ValidationError::InvalidRange(id())),
            }
        }
    } else {
        if condition.value.as_text().is_none() {
            return Err(ValidationError::ValueKindMismatch(id()));
        }
        if !matches!(condition.operator, Operator::Eq | Operator::Neq) {
            return Err(ValidationError::UnsupportedTextOperator(id()));
        }
    }

    if let Some(rate) = condition.rate_override {
        if !valid_rate(rate.rate) {
            return Err(ValidationError::InvalidOverride(id()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AdvancedConditions, ConditionField, ConditionLogic, ConditionValue, RateConfig, RateType,
        RuleType,
    };

    fn rule(conditions: Vec<ConditionRule>) -> CommissionRule {
        CommissionRule {
            id: "r1".into(),
            name: "Rule".into(),
            category: "lab".into(),
            rule_type: RuleType::Department,
            rate_type: RateType::Percentage,
            rate: 3.0,
            min_amount: Some(10.0),
            max_amount: Some(1000.0),
            conditions: String::new(),
            advanced_conditions: Some(AdvancedConditions {
                logic: ConditionLogic::And,
                conditions,
            }),
            is_active: true,
        }
    }

    fn cond(id: &str, field: ConditionField, operator: Operator, value: ConditionValue) -> ConditionRule {
        ConditionRule {
            id: id.into(),
            field,
            operator,
            value,
            second_value: None,
            rate_override: None,
        }
    }

    #[test]
    fn test_valid_rule_passes() {
        let mut range = cond("c1", ConditionField::Amount, Operator::Between, 10.0.into());
        range.second_value = Some(20.0);
        let text = cond("c2", ConditionField::Category, Operator::Eq, "lab".into());
        assert_eq!(validate_rule(&rule(vec![range, text])), Ok(()));
    }

    #[test]
    fn test_rule_level_errors() {
        let mut r = rule(vec![]);
        r.rate = -1.0;
        assert_eq!(validate_rule(&r), Err(ValidationError::InvalidRate(-1.0)));

        let mut r = rule(vec![]);
        r.min_amount = Some(500.0);
        r.max_amount = Some(100.0);
        assert_eq!(
            validate_rule(&r),
            Err(ValidationError::InvertedBounds {
                min: 500.0,
                max: 100.0
            })
        );

        let mut r = rule(vec![]);
        r.name = "  ".into();
        assert_eq!(validate_rule(&r), Err(ValidationError::EmptyName));
    }

    #[test]
    fn test_condition_errors() {
        let open_range = cond("c1", ConditionField::Amount, Operator::Between, 10.0.into());
        assert_eq!(
            validate_rule(&rule(vec![open_range])),
            Err(ValidationError::InvalidRange("c1".into()))
        );

        let text_gt = cond("c2", ConditionField::Type, Operator::Gt, "doctor".into());
        assert_eq!(
            validate_rule(&rule(vec![text_gt])),
            Err(ValidationError::UnsupportedTextOperator("c2".into()))
        );

        let number_on_text = cond("c3", ConditionField::Category, Operator::Eq, 4.0.into());
        assert_eq!(
            validate_rule(&rule(vec![number_on_text])),
            Err(ValidationError::ValueKindMismatch("c3".into()))
        );

        let a = cond("dup", ConditionField::Amount, Operator::Gt, 1.0.into());
        assert_eq!(
            validate_rule(&rule(vec![a.clone(), a])),
            Err(ValidationError::DuplicateConditionId("dup".into()))
        );

        let mut bad_override = cond("c4", ConditionField::Amount, Operator::Gt, 1.0.into());
        bad_override.rate_override = Some(RateConfig {
            rate_type: RateType::Fixed,
            rate: f64::INFINITY,
        });
        assert_eq!(
            validate_rule(&rule(vec![bad_override])),
            Err(ValidationError::InvalidOverride("c4".into()))
        );
    }
}
