//! Policy evaluation — final severity per drift record plus one
//! remediation decision each.
//!
//! A deliberate two-stage transform: the engine constructs records with a
//! default severity, the evaluator returns new records carrying the final
//! classification. Records are never mutated in place.

use chrono::Utc;

use super::rules::PolicyRuleSet;
use crate::model::{ActionKind, DriftRecord, RemediationAction, Severity};

/// Evaluates drift records against the loaded rule set.
pub struct PolicyEvaluator {
    rules: PolicyRuleSet,
    /// Environment the daemon reconciles for; auto-apply rules match
    /// against it. Default "dev".
    environment: String,
}

impl PolicyEvaluator {
    pub fn new(rules: PolicyRuleSet, environment: impl Into<String>) -> Self {
        Self {
            rules,
            environment: environment.into(),
        }
    }

    pub fn rules(&self) -> &PolicyRuleSet {
        &self.rules
    }

    /// Classify every record and derive its action.
    ///
    /// Returns parallel sequences: `records[i]` is the input record with the
    /// final severity applied, `actions[i]` is its decision. Ignored records
    /// still receive an action.
    pub fn evaluate(
        &self,
        records: Vec<DriftRecord>,
    ) -> (Vec<DriftRecord>, Vec<RemediationAction>) {
        let auto_apply = self.rules.allows_auto_apply(&self.environment);

        let mut classified = Vec::with_capacity(records.len());
        let mut actions = Vec::with_capacity(records.len());

        for record in records {
            let severity = self.classify(&record);
            let action = self.determine_action(&record, auto_apply);
            classified.push(DriftRecord {
                severity,
                ..record
            });
            actions.push(action);
        }

        (classified, actions)
    }

    /// First match wins: ignore, then critical, then the warning default.
    fn classify(&self, record: &DriftRecord) -> Severity {
        let key = record.rule_key();

        if self
            .rules
            .ignore_patterns
            .iter()
            .any(|pattern| key.contains(pattern.as_str()))
        {
            return Severity::Ignored;
        }

        if self
            .rules
            .critical_patterns
            .iter()
            .any(|pattern| key.contains(pattern.as_str()))
        {
            return Severity::Critical;
        }

        Severity::Warning
    }

    fn determine_action(&self, record: &DriftRecord, auto_apply: bool) -> RemediationAction {
        RemediationAction {
            kind: if auto_apply {
                ActionKind::Remediate
            } else {
                ActionKind::Alert
            },
            resource_type: record.resource_type.clone(),
            resource_id: record.resource_id.clone(),
            description: format!("Drift detected in {}", record.rule_key()),
            auto_apply,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Domain;
    use serde_json::json;

    fn record(resource_type: &str, field_path: &str) -> DriftRecord {
        DriftRecord {
            fingerprint: "f00dfeed0badcafe".into(),
            resource_type: resource_type.into(),
            resource_id: "r-1".into(),
            domain: Domain::Cloud,
            field_path: field_path.into(),
            expected_value: json!(1),
            actual_value: json!(2),
            severity: Severity::Warning,
            detected_at: Utc::now(),
        }
    }

    fn rules(ignore: &[&str], critical: &[&str]) -> PolicyRuleSet {
        PolicyRuleSet {
            ignore_patterns: ignore.iter().map(|s| s.to_string()).collect(),
            critical_patterns: critical.iter().map(|s| s.to_string()).collect(),
            auto_apply_rules: vec![],
        }
    }

    #[test]
    fn ignore_beats_critical() {
        let evaluator = PolicyEvaluator::new(rules(&["tags"], &["tags"]), "dev");
        let (records, _) = evaluator.evaluate(vec![record("aws_instance", "tags.env")]);
        assert_eq!(records[0].severity, Severity::Ignored);
    }

    #[test]
    fn critical_pattern_promotes() {
        let evaluator = PolicyEvaluator::new(rules(&[], &["security_group"]), "dev");
        let (records, _) = evaluator.evaluate(vec![record("aws_security_group", "ingress")]);
        assert_eq!(records[0].severity, Severity::Critical);
    }

    #[test]
    fn no_match_defaults_to_warning() {
        let evaluator = PolicyEvaluator::new(rules(&["tags"], &["sg"]), "dev");
        let (records, _) = evaluator.evaluate(vec![record("topic", "partitions")]);
        assert_eq!(records[0].severity, Severity::Warning);
    }

    #[test]
    fn dev_rule_enables_remediate_for_all_records() {
        let evaluator = PolicyEvaluator::new(PolicyRuleSet::default_rules(), "dev");
        let (_, actions) =
            evaluator.evaluate(vec![record("a", "x"), record("b", "y"), record("c", "z")]);
        assert!(actions
            .iter()
            .all(|a| a.kind == ActionKind::Remediate && a.auto_apply));
    }

    #[test]
    fn no_matching_environment_alerts() {
        let evaluator = PolicyEvaluator::new(PolicyRuleSet::default_rules(), "prod");
        let (_, actions) = evaluator.evaluate(vec![record("a", "x")]);
        assert_eq!(actions[0].kind, ActionKind::Alert);
        assert!(!actions[0].auto_apply);
    }

    #[test]
    fn ignored_records_still_get_actions() {
        let evaluator = PolicyEvaluator::new(
            PolicyRuleSet {
                ignore_patterns: vec!["x".into()],
                critical_patterns: vec![],
                auto_apply_rules: vec![],
            },
            "dev",
        );
        let (records, actions) = evaluator.evaluate(vec![record("a", "x")]);
        assert_eq!(records[0].severity, Severity::Ignored);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].description, "Drift detected in a.x");
    }

    #[test]
    fn evaluation_does_not_reorder() {
        let evaluator = PolicyEvaluator::new(PolicyRuleSet::default_rules(), "dev");
        let input = vec![record("a", "one"), record("b", "two")];
        let (records, actions) = evaluator.evaluate(input);
        assert_eq!(records[0].field_path, "one");
        assert_eq!(records[1].field_path, "two");
        assert_eq!(actions[0].resource_type, "a");
        assert_eq!(actions[1].resource_type, "b");
    }
}
