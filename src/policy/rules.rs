//! Policy rule set — loaded once at daemon start, read-only afterward.
//!
//! The artifact is YAML with `drift_rules.{ignore,critical}` substring
//! pattern lists and `remediation.auto_apply` environment rules. A missing
//! or malformed artifact degrades to the built-in default with a single
//! warning — policy problems never stop the daemon.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One auto-apply grant: remediations for this environment may be applied
/// without human approval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoApplyRule {
    pub environment: String,
    #[serde(default)]
    pub namespaces: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
}

/// Immutable rule set consulted by the policy evaluator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyRuleSet {
    /// Substring patterns over `"{resource_type}.{field_path}"`; a match
    /// classifies the drift as ignored. Checked before `critical_patterns`.
    pub ignore_patterns: Vec<String>,
    /// Substring patterns promoting a drift to critical.
    pub critical_patterns: Vec<String>,
    pub auto_apply_rules: Vec<AutoApplyRule>,
}

/// YAML shape of the policy artifact.
#[derive(Debug, Default, Deserialize)]
struct PolicyFile {
    #[serde(default)]
    remediation: RemediationSection,
    #[serde(default)]
    drift_rules: DriftRulesSection,
}

#[derive(Debug, Default, Deserialize)]
struct RemediationSection {
    #[serde(default)]
    auto_apply: Vec<AutoApplyRule>,
}

#[derive(Debug, Default, Deserialize)]
struct DriftRulesSection {
    #[serde(default)]
    ignore: Vec<String>,
    #[serde(default)]
    critical: Vec<String>,
}

impl PolicyRuleSet {
    /// Built-in rules used when no artifact exists: nothing ignored, nothing
    /// critical, one dev-environment wildcard auto-apply grant.
    pub fn default_rules() -> Self {
        Self {
            ignore_patterns: vec![],
            critical_patterns: vec![],
            auto_apply_rules: vec![AutoApplyRule {
                environment: "dev".to_string(),
                namespaces: vec!["default".to_string(), "staging".to_string()],
                resources: vec!["*".to_string()],
            }],
        }
    }

    /// Load the rule set from the first existing path among `candidates`.
    ///
    /// Falls back to [`PolicyRuleSet::default_rules`] (with one warning)
    /// when no candidate exists or the file does not parse.
    pub fn load(candidates: &[PathBuf]) -> Self {
        let Some(path) = candidates.iter().find(|p| p.exists()) else {
            warn!("no policy artifact found — using built-in default rules");
            return Self::default_rules();
        };
        Self::load_from_yaml(path)
    }

    fn load_from_yaml(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), err = %e, "policy artifact unreadable — using defaults");
                return Self::default_rules();
            }
        };

        let file: PolicyFile = match serde_yaml::from_str(&content) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %path.display(), err = %e, "policy artifact parse error — using defaults");
                return Self::default_rules();
            }
        };

        let rules = Self {
            ignore_patterns: file.drift_rules.ignore,
            critical_patterns: file.drift_rules.critical,
            auto_apply_rules: file.remediation.auto_apply,
        };
        info!(
            path = %path.display(),
            ignore = rules.ignore_patterns.len(),
            critical = rules.critical_patterns.len(),
            auto_apply = rules.auto_apply_rules.len(),
            "policy rules loaded"
        );
        rules
    }

    /// True when any auto-apply rule grants the given environment.
    pub fn allows_auto_apply(&self, environment: &str) -> bool {
        self.auto_apply_rules
            .iter()
            .any(|rule| rule.environment == environment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_artifact_falls_back_to_defaults() {
        let rules = PolicyRuleSet::load(&[PathBuf::from("/nonexistent/policies.yaml")]);
        assert!(rules.ignore_patterns.is_empty());
        assert!(rules.critical_patterns.is_empty());
        assert!(rules.allows_auto_apply("dev"));
        assert!(!rules.allows_auto_apply("prod"));
    }

    #[test]
    fn parses_full_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policies.yaml");
        std::fs::write(
            &path,
            r#"
remediation:
  auto_apply:
    - environment: dev
      namespaces: [default]
      resources: ["*"]
drift_rules:
  ignore:
    - ".tags."
  critical:
    - "security_group"
"#,
        )
        .unwrap();

        let rules = PolicyRuleSet::load(&[path]);
        assert_eq!(rules.ignore_patterns, vec![".tags.".to_string()]);
        assert_eq!(rules.critical_patterns, vec!["security_group".to_string()]);
        assert!(rules.allows_auto_apply("dev"));
    }

    #[test]
    fn malformed_artifact_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policies.yaml");
        std::fs::write(&path, "drift_rules: [not, a, mapping]").unwrap();

        let rules = PolicyRuleSet::load(&[path]);
        assert!(rules.allows_auto_apply("dev"));
        assert!(rules.critical_patterns.is_empty());
    }

    #[test]
    fn first_existing_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        let second = dir.path().join("second.yaml");
        std::fs::write(&second, "drift_rules:\n  critical: [replicas]\n").unwrap();

        let rules = PolicyRuleSet::load(&[dir.path().join("first.yaml"), second]);
        assert_eq!(rules.critical_patterns, vec!["replicas".to_string()]);
    }
}
