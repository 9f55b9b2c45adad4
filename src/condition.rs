//! Condition evaluation.
//!
//! A [`ConditionRule`] is evaluated against a [`TransactionContext`] by
//! reading the condition's field through a typed accessor and applying
//! the operator.  Evaluation is total: absent fields, operands of the
//! wrong kind and malformed ranges all yield `false` instead of an
//! error, so one badly authored rule can never abort a batch.

use crate::models::{
    AdvancedConditions, ConditionField, ConditionLogic, ConditionRule, Operator,
    TransactionContext,
};

/// A field value read from a transaction.
enum FieldValue<'a> {
    Number(f64),
    Text(&'a str),
}

fn read_field(field: ConditionField, context: &TransactionContext) -> Option<FieldValue<'_>> {
    match field {
        ConditionField::Amount => Some(FieldValue::Number(context.amount)),
        ConditionField::Quantity => context.quantity.map(FieldValue::Number),
        ConditionField::Category => context.category.as_deref().map(FieldValue::Text),
        ConditionField::Type => context.transaction_type.as_deref().map(FieldValue::Text),
    }
}

fn compare_numbers(operator: Operator, actual: f64, value: f64, second: Option<f64>) -> bool {
    if actual.is_nan() || value.is_nan() {
        return false;
    }
    match operator {
        Operator::Gt => actual > value,
        Operator::Gte => actual >= value,
        Operator::Lt => actual < value,
        Operator::Lte => actual <= value,
        Operator::Eq => actual == value,
        Operator::Neq => actual != value,
        Operator::Between => match second {
            Some(upper) if upper >= value => value <= actual && actual <= upper,
            _ => false,
        },
    }
}

fn compare_text(operator: Operator, actual: &str, value: &str) -> bool {
    match operator {
        Operator::Eq => actual == value,
        Operator::Neq => actual != value,
        _ => false,
    }
}

/// Evaluates a single condition against a transaction.
pub fn evaluate_condition(condition: &ConditionRule, context: &TransactionContext) -> bool {
    match read_field(condition.field, context) {
        Some(FieldValue::Number(actual)) => match condition.value.as_number() {
            Some(value) => {
                compare_numbers(condition.operator, actual, value, condition.second_value)
            }
            None => false,
        },
        Some(FieldValue::Text(actual)) => match condition.value.as_text() {
            Some(value) => compare_text(condition.operator, actual, value),
            None => false,
        },
        None => false,
    }
}

/// The outcome of evaluating a whole condition set.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionSetResolution<'a> {
    pub overall_match: bool,
    /// Conditions that evaluated true, in authoring order.
    pub matched_conditions: Vec<&'a ConditionRule>,
}

impl ConditionSetResolution<'_> {
    pub fn matched_ids(&self) -> Vec<String> {
        self.matched_conditions.iter().map(|c| c.id.clone()).collect()
    }
}

/// Evaluates every condition of `set` and combines them under its logic.
///
/// The matched subset is reported even when the set as a whole fails.
pub fn resolve_conditions<'a>(
    set: &'a AdvancedConditions,
    context: &TransactionContext,
) -> ConditionSetResolution<'a> {
    if set.conditions.is_empty() {
        return ConditionSetResolution {
            overall_match: true,
            matched_conditions: Vec::new(),
        };
    }

    let matched_conditions: Vec<&ConditionRule> = set
        .conditions
        .iter()
        .filter(|c| evaluate_condition(c, context))
        .collect();

    let overall_match = match set.logic {
        ConditionLogic::And => matched_conditions.len() == set.conditions.len(),
        ConditionLogic::Or => !matched_conditions.is_empty(),
    };

    ConditionSetResolution {
        overall_match,
        matched_conditions,
    }
}
