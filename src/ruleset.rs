//! Rule collection bookkeeping and the rule interchange document.
//!
//! A [`RuleSet`] is the in-memory rule collection administrators edit.
//! It never evaluates anything itself; evaluators are handed a
//! [`snapshot`](RuleSet::snapshot).  Every rule entering the set goes
//! through [`validate_rule`], and updates always replace whole records.
//!
//! Import follows a partial-success policy: the document as a whole is
//! rejected only when it is not JSON or has no `rules` array, while
//! individual records failing validation are reported in
//! [`ImportReport::rejected`] and skipped.

use crate::error::{ImportError, RuleSetError};
use crate::models::{AdvancedConditions, CommissionRule, RateType, RuleType};
use crate::validation::validate_rule;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{info, warn};
use uuid::Uuid;

/// Rule counts carried in the interchange document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSetMetadata {
    /// Number of rules in the collection.
    pub total_rules: usize,
    /// Rules with `isActive` set.
    pub active_rules: usize,
    /// Rules with `isActive` cleared.
    pub inactive_rules: usize,
}

/// The rule interchange document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    /// ISO-8601 timestamp of the export.
    pub export_date: String,
    /// Counts describing `rules`.
    pub metadata: RuleSetMetadata,
    /// Every rule of the collection, in collection order.
    pub rules: Vec<CommissionRule>,
}

/// A record skipped during import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRecord {
    /// Position of the record in the document's `rules` array.
    pub index: usize,
    /// The record's id, when one could be read.
    pub id: Option<String>,
    /// Why the record was skipped.
    pub reason: String,
}

/// What an import accepted and what it skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    /// Records that passed validation, in document order.
    pub imported: Vec<CommissionRule>,
    /// Records that were skipped, with the reason.
    pub rejected: Vec<RejectedRecord>,
}

impl ImportReport {
    pub fn imported_count(&self) -> usize {
        self.imported.len()
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }
}

/// Parses an interchange document and validates each of its records.
///
/// Records are checked against the full rule shape and the authoring
/// validation.  A record repeating an id seen earlier in the same
/// document is rejected.
pub fn parse_import(input: &str) -> Result<ImportReport, ImportError> {
    let document: Value = serde_json::from_str(input)?;
    let records = document
        .get("rules")
        .and_then(Value::as_array)
        .ok_or(ImportError::MissingRules)?;

    let mut report = ImportReport::default();
    let mut seen = HashSet::new();
    for (index, record) in records.iter().enumerate() {
        let id = record.get("id").and_then(Value::as_str).map(str::to_string);
        let reject = |reason: String| RejectedRecord {
            index,
            id: id.clone(),
            reason,
        };

        let rule = match serde_json::from_value::<CommissionRule>(record.clone()) {
            Ok(rule) => rule,
            Err(err) => {
                report.rejected.push(reject(err.to_string()));
                continue;
            }
        };
        if let Err(err) = validate_rule(&rule) {
            report.rejected.push(reject(err.to_string()));
            continue;
        }
        if !seen.insert(rule.id.clone()) {
            report
                .rejected
                .push(reject(format!("duplicate rule id in document: {}", rule.id)));
            continue;
        }
        report.imported.push(rule);
    }

    for rejected in &report.rejected {
        warn!(
            index = rejected.index,
            id = rejected.id.as_deref().unwrap_or("-"),
            reason = %rejected.reason,
            "skipping rule record"
        );
    }
    Ok(report)
}

/// A reusable starting point for a new rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleTemplate {
    /// Template name; also the name given to instantiated rules.
    pub name: String,
    /// Category copied onto instantiated rules.
    pub category: String,
    /// Who instantiated rules pay out to.
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    /// Rate type of instantiated rules.
    pub rate_type: RateType,
    /// Base rate of instantiated rules.
    pub rate: f64,
    /// Inclusive lower amount bound, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,
    /// Inclusive upper amount bound, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,
    /// Display-only description.
    #[serde(default)]
    pub conditions: String,
    /// Conditions copied onto instantiated rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advanced_conditions: Option<AdvancedConditions>,
}

impl RuleTemplate {
    /// Creates an active rule from this template with a fresh id.
    pub fn instantiate(&self) -> CommissionRule {
        CommissionRule {
            id: Uuid::new_v4().to_string(),
            name: self.name.clone(),
            category: self.category.clone(),
            rule_type: self.rule_type,
            rate_type: self.rate_type,
            rate: self.rate,
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            conditions: self.conditions.clone(),
            advanced_conditions: self.advanced_conditions.clone(),
            is_active: true,
        }
    }
}

/// Templates offered to administrators out of the box.
pub fn builtin_templates() -> Vec<RuleTemplate> {
    vec![
        RuleTemplate {
            name: "Doctor Consultation".into(),
            category: "consultation".into(),
            rule_type: RuleType::Doctor,
            rate_type: RateType::Percentage,
            rate: 10.0,
            min_amount: Some(100.0),
            max_amount: None,
            conditions: "10% of consultation fees of 100 and above".into(),
            advanced_conditions: None,
        },
        RuleTemplate {
            name: "Agent Referral".into(),
            category: "referral".into(),
            rule_type: RuleType::Agent,
            rate_type: RateType::Fixed,
            rate: 500.0,
            min_amount: None,
            max_amount: None,
            conditions: "Flat fee per referred patient".into(),
            advanced_conditions: None,
        },
        RuleTemplate {
            name: "Department Volume".into(),
            category: "department".into(),
            rule_type: RuleType::Department,
            rate_type: RateType::Tiered,
            rate: 2.0,
            min_amount: Some(1000.0),
            max_amount: None,
            conditions: "Tiered rate growing with billed volume".into(),
            advanced_conditions: None,
        },
    ]
}

/// The in-memory rule collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<CommissionRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from rules, validating each and rejecting duplicates.
    pub fn from_rules(rules: impl IntoIterator<Item = CommissionRule>) -> Result<Self, RuleSetError> {
        let mut set = Self::new();
        for rule in rules {
            set.insert(rule)?;
        }
        Ok(set)
    }

    pub fn rules(&self) -> &[CommissionRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CommissionRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// A read-only copy of the collection for one evaluation pass.
    pub fn snapshot(&self) -> Vec<CommissionRule> {
        self.rules.clone()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.rules.iter().position(|r| r.id == id)
    }

    fn check(rule: &CommissionRule) -> Result<(), RuleSetError> {
        validate_rule(rule).map_err(|source| RuleSetError::Invalid {
            id: rule.id.clone(),
            source,
        })
    }

    /// Adds a new rule.
    pub fn insert(&mut self, rule: CommissionRule) -> Result<(), RuleSetError> {
        Self::check(&rule)?;
        if self.position(&rule.id).is_some() {
            return Err(RuleSetError::DuplicateId(rule.id));
        }
        info!(rule_id = %rule.id, name = %rule.name, "rule added");
        self.rules.push(rule);
        Ok(())
    }

    /// Replaces the stored rule having the same id.
    pub fn replace(&mut self, rule: CommissionRule) -> Result<(), RuleSetError> {
        Self::check(&rule)?;
        let pos = self
            .position(&rule.id)
            .ok_or_else(|| RuleSetError::NotFound(rule.id.clone()))?;
        info!(rule_id = %rule.id, "rule replaced");
        self.rules[pos] = rule;
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<CommissionRule, RuleSetError> {
        let pos = self
            .position(id)
            .ok_or_else(|| RuleSetError::NotFound(id.to_string()))?;
        info!(rule_id = %id, "rule removed");
        Ok(self.rules.remove(pos))
    }

    /// Flips a rule's active flag and returns the new value.
    pub fn toggle(&mut self, id: &str) -> Result<bool, RuleSetError> {
        let pos = self
            .position(id)
            .ok_or_else(|| RuleSetError::NotFound(id.to_string()))?;
        let rule = &mut self.rules[pos];
        rule.is_active = !rule.is_active;
        info!(rule_id = %id, active = rule.is_active, "rule toggled");
        Ok(rule.is_active)
    }

    /// Sets the active flag on every listed rule.  Unknown ids are
    /// ignored; returns how many rules changed state.
    pub fn bulk_set_active(&mut self, ids: &[String], active: bool) -> usize {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut affected = 0;
        for rule in self.rules.iter_mut().filter(|r| ids.contains(r.id.as_str())) {
            if rule.is_active != active {
                rule.is_active = active;
                affected += 1;
            }
        }
        info!(affected, active, "bulk activation change");
        affected
    }

    /// Removes every listed rule.  Unknown ids are ignored; returns how
    /// many rules were removed.
    pub fn bulk_delete(&mut self, ids: &[String]) -> usize {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let before = self.rules.len();
        self.rules.retain(|r| !ids.contains(r.id.as_str()));
        let affected = before - self.rules.len();
        info!(affected, "bulk delete");
        affected
    }

    /// Instantiates the named built-in template and adds the result.
    pub fn add_from_template(&mut self, name: &str) -> Result<CommissionRule, RuleSetError> {
        let template = builtin_templates()
            .into_iter()
            .find(|t| t.name == name)
            .ok_or_else(|| RuleSetError::TemplateNotFound(name.to_string()))?;
        let rule = template.instantiate();
        self.insert(rule.clone())?;
        Ok(rule)
    }

    pub fn metadata(&self) -> RuleSetMetadata {
        let active_rules = self.rules.iter().filter(|r| r.is_active).count();
        RuleSetMetadata {
            total_rules: self.rules.len(),
            active_rules,
            inactive_rules: self.rules.len() - active_rules,
        }
    }

    /// Builds the interchange document, stamped with `at`.
    pub fn export(&self, at: DateTime<Utc>) -> ExportDocument {
        ExportDocument {
            export_date: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            metadata: self.metadata(),
            rules: self.snapshot(),
        }
    }

    pub fn export_json(&self, at: DateTime<Utc>) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.export(at))
    }

    /// Imports an interchange document into this set.
    ///
    /// Accepted rules whose id already exists replace the stored record;
    /// the others are appended.
    pub fn import_json(&mut self, input: &str) -> Result<ImportReport, ImportError> {
        let report = parse_import(input)?;
        for rule in &report.imported {
            match self.position(&rule.id) {
                Some(pos) => self.rules[pos] = rule.clone(),
                None => self.rules.push(rule.clone()),
            }
        }
        info!(
            imported = report.imported_count(),
            rejected = report.rejected_count(),
            "rule import finished"
        );
        Ok(report)
    }
}
