//! Shared data model — drift records, remediation actions, cycle reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Resource universe a drift belongs to. Closed set — adding a domain means
/// adding a comparator, not touching the comparison algorithm.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Cloud,
    Cluster,
    Messaging,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Cloud => "cloud",
            Domain::Cluster => "cluster",
            Domain::Messaging => "messaging",
        }
    }

    /// Parse a config-file domain key ("cloud", "cluster", "messaging").
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cloud" => Some(Domain::Cloud),
            "cluster" => Some(Domain::Cluster),
            "messaging" => Some(Domain::Messaging),
            _ => None,
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a detected drift.
///
/// `Safe` is reachable but never assigned by the classifier — reserved for
/// future rule types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Safe,
    Warning,
    Critical,
    Ignored,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Safe => "safe",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
            Severity::Ignored => "ignored",
        }
    }
}

/// One detected difference between a declared and an observed field value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftRecord {
    /// Stable dedup identifier — deterministic over (domain, resource_type,
    /// field_path). See [`crate::engine::fingerprint`].
    pub fingerprint: String,
    pub resource_type: String,
    pub resource_id: String,
    pub domain: Domain,
    /// Dot-delimited path into the flattened resource representation.
    pub field_path: String,
    pub expected_value: Value,
    pub actual_value: Value,
    pub severity: Severity,
    pub detected_at: DateTime<Utc>,
}

impl DriftRecord {
    /// The string the policy rules match against.
    pub fn rule_key(&self) -> String {
        format!("{}.{}", self.resource_type, self.field_path)
    }
}

/// Decision attached to exactly one [`DriftRecord`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationAction {
    pub kind: ActionKind,
    pub resource_type: String,
    pub resource_id: String,
    pub description: String,
    /// True only when policy permits applying the fix without human approval.
    /// The daemon decides, it never executes.
    pub auto_apply: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Remediate,
    Alert,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Remediate => "remediate",
            ActionKind::Alert => "alert",
        }
    }
}

/// Everything one reconciliation cycle hands to the report sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub drift_reports: Vec<DriftRecord>,
    pub actions: Vec<RemediationAction>,
}
