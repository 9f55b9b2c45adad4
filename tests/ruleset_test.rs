use chrono::{TimeZone, Utc};
use commission_engine::error::ImportError;
use commission_engine::models::{RateType, RuleType, TransactionContext};
use commission_engine::ruleset::{builtin_templates, RuleSet};
use commission_engine::{CommissionEngine, CommissionRule};
use serde_json::json;

fn rule(id: &str, rate: f64, active: bool) -> CommissionRule {
    CommissionRule {
        id: id.to_string(),
        name: format!("Rule {}", id),
        category: "pharmacy".to_string(),
        rule_type: RuleType::Agent,
        rate_type: RateType::Percentage,
        rate,
        min_amount: Some(50.0),
        max_amount: Some(5000.0),
        conditions: "display only".to_string(),
        advanced_conditions: None,
        is_active: active,
    }
}

#[test]
fn test_export_import_round_trip() {
    let mut source = RuleSet::from_rules([rule("a", 3.0, true), rule("b", 4.0, false)]).unwrap();
    source.add_from_template("Department Volume").unwrap();
    let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let exported = source.export_json(at).unwrap();

    let mut target = RuleSet::new();
    let report = target.import_json(&exported).unwrap();
    assert_eq!(report.imported_count(), 3);
    assert_eq!(report.rejected_count(), 0);
    assert_eq!(target, source);
    assert_eq!(target.metadata(), source.metadata());
}

#[test]
fn test_import_reports_reasons_and_keeps_valid_records() {
    let input = json!({
        "exportDate": "2026-03-01T12:00:00.000Z",
        "metadata": {"totalRules": 3, "activeRules": 3, "inactiveRules": 0},
        "rules": [
            {
                "id": "ok", "name": "Valid", "category": "lab", "type": "doctor",
                "rateType": "percentage", "rate": 5, "isActive": true,
                "advancedConditions": {"logic": "OR", "conditions": [
                    {"id": "c1", "field": "type", "operator": "eq", "value": "inpatient"}
                ]}
            },
            {
                "id": "range", "name": "Bad range", "category": "lab", "type": "doctor",
                "rateType": "percentage", "rate": 5, "isActive": true,
                "advancedConditions": {"logic": "AND", "conditions": [
                    {"id": "c1", "field": "amount", "operator": "between", "value": 10}
                ]}
            },
            "not an object"
        ]
    })
    .to_string();

    let mut set = RuleSet::new();
    let report = set.import_json(&input).unwrap();
    assert_eq!(report.imported_count(), 1);
    assert_eq!(report.rejected[0].id.as_deref(), Some("range"));
    assert!(report.rejected[0].reason.contains("between"));
    assert_eq!(report.rejected[1].index, 2);
    assert_eq!(report.rejected[1].id, None);
    assert_eq!(set.rules()[0].id, "ok");
}

#[test]
fn test_import_rejects_unusable_documents() {
    let mut set = RuleSet::from_rules([rule("a", 1.0, true)]).unwrap();
    assert!(matches!(set.import_json("[1, 2"), Err(ImportError::InvalidJson(_))));
    assert!(matches!(set.import_json("[]"), Err(ImportError::MissingRules)));
    assert_eq!(set.len(), 1);
}

#[test]
fn test_snapshot_is_unaffected_by_later_edits() {
    let mut set = RuleSet::from_rules([rule("a", 10.0, true)]).unwrap();
    let snapshot = set.snapshot();
    set.bulk_set_active(&["a".to_string()], false);

    let engine = CommissionEngine::default();
    let ctx = TransactionContext::with_amount(100.0);
    assert_eq!(engine.evaluate_rules(&snapshot, &ctx)[0].result.commission_amount, Some(10.0));
    assert!(engine.evaluate_rules(set.rules(), &ctx).is_empty());
}

#[test]
fn test_builtin_templates_fire() {
    let engine = CommissionEngine::default();
    let ctx = TransactionContext::with_amount(20_000.0);
    for template in builtin_templates() {
        let res = engine.calculate(&template.instantiate(), &ctx);
        assert!(res.matched, "template {} should fire", template.name);
    }
}
