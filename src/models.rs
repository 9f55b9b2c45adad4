//! Data models for the Commission Engine.
//!
//! The `models` module defines the serialisable rule, condition and
//! transaction types the engine operates on.  Field names serialise in
//! camelCase so that the same types describe the rule interchange
//! document produced and consumed by [`crate::ruleset`].

use serde::{Deserialize, Serialize};

/// Who a commission rule pays out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    /// Paid to the attending or consulting doctor.
    Doctor,
    /// Paid to an external referral agent.
    Agent,
    /// Credited to a hospital department.
    Department,
}

/// How a rate is turned into a commission amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateType {
    /// `rate` is a percentage of the transaction amount.
    Percentage,
    /// `rate` is a flat amount, independent of the transaction amount.
    Fixed,
    /// `rate` is the base tier percentage; the applied percentage is
    /// produced by a [`crate::rate::TieredRateStrategy`].
    Tiered,
}

/// A rate type together with its rate.  Used both as a rule's base rate
/// and as a condition's override.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateConfig {
    /// How `rate` is interpreted.
    pub rate_type: RateType,
    /// A percentage, a flat amount or a base tier percentage depending
    /// on `rate_type`.  Expected to be non-negative.
    pub rate: f64,
}

/// A named, typed commission policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionRule {
    /// Unique identifier.  Never changes once the rule exists.
    pub id: String,
    /// Display name shown to administrators.
    pub name: String,
    /// Service category the rule belongs to, e.g. `"consultation"`.
    pub category: String,
    /// Who the commission is paid to.
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    /// How the base `rate` is applied.
    pub rate_type: RateType,
    /// Base rate, used unless a matched condition overrides it.
    pub rate: f64,
    /// Inclusive lower bound on the transaction amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,
    /// Inclusive upper bound on the transaction amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,
    /// Free-text description shown to administrators.  Never evaluated.
    #[serde(default)]
    pub conditions: String,
    /// Structured eligibility conditions.  `None` means the rule applies
    /// unconditionally (subject to the amount thresholds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advanced_conditions: Option<AdvancedConditions>,
    /// Inactive rules are never evaluated.
    pub is_active: bool,
}

impl CommissionRule {
    /// The rule's own rate, before any condition override.
    pub fn base_rate(&self) -> RateConfig {
        RateConfig {
            rate_type: self.rate_type,
            rate: self.rate,
        }
    }
}

/// How the conditions of a set combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConditionLogic {
    /// Every condition must hold.
    And,
    /// At least one condition must hold.
    Or,
}

/// A group of conditions combined under one logic.  An empty group is
/// always true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedConditions {
    /// How the individual results combine.
    pub logic: ConditionLogic,
    /// Conditions in authoring order.  The order decides which rate
    /// override wins when several match.
    #[serde(default)]
    pub conditions: Vec<ConditionRule>,
}

/// The transaction attribute a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionField {
    /// [`TransactionContext::amount`], numeric.
    Amount,
    /// [`TransactionContext::quantity`], numeric.
    Quantity,
    /// [`TransactionContext::category`], text.
    Category,
    /// [`TransactionContext::transaction_type`], text.
    Type,
}

impl ConditionField {
    /// Whether the field holds a number (as opposed to text).
    pub fn is_numeric(self) -> bool {
        matches!(self, ConditionField::Amount | ConditionField::Quantity)
    }
}

/// Comparison applied between a transaction field and a condition's
/// operand.  Only `Eq` and `Neq` apply to text fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    /// Field is strictly greater than the operand.
    Gt,
    /// Field is greater than or equal to the operand.
    Gte,
    /// Field is strictly less than the operand.
    Lt,
    /// Field is less than or equal to the operand.
    Lte,
    /// Field equals the operand.
    Eq,
    /// Field differs from the operand.
    Neq,
    /// Field lies in `[value, secondValue]`, both ends inclusive.
    Between,
}

/// A condition operand: a number for numeric fields, text otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    /// Operand for `amount` and `quantity`.
    Number(f64),
    /// Operand for `category` and `type`.
    Text(String),
}

impl ConditionValue {
    /// The numeric operand, or `None` for text.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ConditionValue::Number(n) => Some(*n),
            ConditionValue::Text(_) => None,
        }
    }

    /// The text operand, or `None` for a number.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ConditionValue::Text(s) => Some(s),
            ConditionValue::Number(_) => None,
        }
    }
}

impl From<f64> for ConditionValue {
    fn from(value: f64) -> Self {
        ConditionValue::Number(value)
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        ConditionValue::Text(value.to_string())
    }
}

/// One atomic predicate over a transaction field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionRule {
    /// Unique within the owning [`AdvancedConditions`].
    pub id: String,
    /// Transaction attribute being compared.
    pub field: ConditionField,
    /// Comparison applied between the field and `value`.
    pub operator: Operator,
    /// Operand; its kind must match `field`.
    pub value: ConditionValue,
    /// Inclusive upper bound, only meaningful for [`Operator::Between`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_value: Option<f64>,
    /// Rate used instead of the rule's base rate when this condition
    /// is the first matched one carrying an override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_override: Option<RateConfig>,
}

/// The record being tested against commission rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionContext {
    /// Billed amount of the transaction.
    pub amount: f64,
    /// Number of units, when relevant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    /// Service category, compared against `category` conditions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Free-form transaction type, compared against `type` conditions.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<String>,
}

impl TransactionContext {
    /// A context carrying only an amount.
    pub fn with_amount(amount: f64) -> Self {
        Self {
            amount,
            ..Self::default()
        }
    }
}

/// The outcome of evaluating one rule against one transaction.
///
/// When `matched` is false every other field is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    /// Whether the rule fired.
    pub matched: bool,
    /// Rate type after override resolution.
    pub effective_rate_type: Option<RateType>,
    /// Base or override rate that was applied.  For tiered rates this
    /// is the base tier rate, not the stepped-up percentage.
    pub effective_rate: Option<f64>,
    /// Commission owed, never negative.
    pub commission_amount: Option<f64>,
}

impl EvaluationResult {
    pub fn not_matched() -> Self {
        Self {
            matched: false,
            effective_rate_type: None,
            effective_rate: None,
            commission_amount: None,
        }
    }
}

/// A rule's evaluation result tagged with the rule it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleOutcome {
    pub rule_id: String,
    /// Conditions that evaluated true, in authoring order.  Reported
    /// even when the rule as a whole did not fire.
    pub matched_condition_ids: Vec<String>,
    pub result: EvaluationResult,
}

/// All rule outcomes for one transaction of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEvaluation {
    /// Position of the transaction in the submitted batch.
    pub index: usize,
    pub outcomes: Vec<RuleOutcome>,
}

/// The aggregate result of a batch evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEvaluation {
    /// Evaluations in input order.  Transactions skipped after a
    /// cancellation are absent.
    pub evaluations: Vec<TransactionEvaluation>,
    pub cancelled: bool,
}
