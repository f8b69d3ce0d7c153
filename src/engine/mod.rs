//! `engine` — the drift computation core.
//!
//! Turns two domain snapshots into a deduplicated, ordered sequence of
//! [`DriftRecord`]s:
//!
//! - **Flattening** — nested state to dot-path leaf maps.
//! - **Comparators** — one per domain, live lookup keyed by resource
//!   identity, with a generic whole-snapshot fallback.
//! - **Fingerprinting** — SHA-256 prefix over (domain, type, path).
//! - **Dedup store** — injected [`FingerprintStore`]; the only mutable
//!   state shared across cycles.

pub mod compare;
pub mod fingerprint;
pub mod flatten;
pub mod store;

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use crate::model::{Domain, DriftRecord, Severity};

pub use fingerprint::drift_fingerprint;
pub use store::{FingerprintStore, MemoryFingerprintStore, StoreError};

/// Computes deduplicated drift records for one domain per call.
///
/// Holds no per-cycle state of its own — everything that persists lives in
/// the injected store, so a computer is cheap to share and safe to call
/// sequentially for any number of domains.
pub struct DriftComputer {
    store: Arc<dyn FingerprintStore>,
}

impl DriftComputer {
    pub fn new(store: Arc<dyn FingerprintStore>) -> Self {
        Self { store }
    }

    /// Compute drift between `desired` and `live` for `domain`.
    ///
    /// Absent desired state yields an empty result. Any store failure is
    /// logged and converted to an empty result for this call — a bad cycle
    /// never propagates out of the engine.
    pub async fn compute(
        &self,
        domain: Domain,
        desired: Option<&Value>,
        live: Option<&Value>,
    ) -> Vec<DriftRecord> {
        let Some(desired) = desired else {
            debug!(domain = %domain, "no desired state — skipping drift computation");
            return Vec::new();
        };
        let live = live.unwrap_or(&Value::Null);

        match self.compute_inner(domain, desired, live).await {
            Ok(records) => records,
            Err(e) => {
                warn!(domain = %domain, error = %e, "drift computation failed — returning empty result");
                Vec::new()
            }
        }
    }

    async fn compute_inner(
        &self,
        domain: Domain,
        desired: &Value,
        live: &Value,
    ) -> Result<Vec<DriftRecord>, StoreError> {
        let candidates = compare::diff(domain, desired, live);
        let now = Utc::now();

        let mut records = Vec::new();
        for candidate in candidates {
            let fingerprint =
                drift_fingerprint(domain, &candidate.resource_type, &candidate.field_path);

            if !self.store.check_and_record(&fingerprint, now).await? {
                debug!(%fingerprint, "duplicate drift suppressed");
                continue;
            }

            records.push(DriftRecord {
                fingerprint,
                resource_type: candidate.resource_type,
                resource_id: candidate.resource_id,
                domain,
                field_path: candidate.field_path,
                expected_value: candidate.expected,
                actual_value: candidate.actual,
                severity: Severity::Warning,
                detected_at: now,
            });
        }

        debug!(domain = %domain, records = records.len(), "drift computed");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn computer() -> DriftComputer {
        DriftComputer::new(Arc::new(MemoryFingerprintStore::new(1024, 0)))
    }

    #[tokio::test]
    async fn absent_desired_state_is_empty() {
        let c = computer();
        let live = json!({"x": 1});
        assert!(c.compute(Domain::Cloud, None, Some(&live)).await.is_empty());
        assert!(c.compute(Domain::Cloud, None, None).await.is_empty());
    }

    #[tokio::test]
    async fn absent_live_state_drifts_against_null() {
        let c = computer();
        let desired = json!({"x": 1});
        let records = c.compute(Domain::Cloud, Some(&desired), None).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].actual_value, Value::Null);
        assert_eq!(records[0].severity, Severity::Warning);
    }

    #[tokio::test]
    async fn second_identical_computation_is_empty() {
        let c = computer();
        let desired = json!({"x": 1, "y": 2});
        let live = json!({"x": 9, "y": 9});

        let first = c.compute(Domain::Cluster, Some(&desired), Some(&live)).await;
        assert_eq!(first.len(), 2);

        let second = c.compute(Domain::Cluster, Some(&desired), Some(&live)).await;
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn fingerprints_unique_within_result() {
        let c = computer();
        let desired = json!({"resources": [
            {"type": "aws_instance", "address": "a", "values": {"t": 1}},
            {"type": "aws_instance", "address": "b", "values": {"t": 2}}
        ]});
        let live = json!({"resources": []});
        let records = c.compute(Domain::Cloud, Some(&desired), Some(&live)).await;
        // Same (domain, type, path) for both items — only the first survives
        // dedup, exactly as repeated cycles would collapse.
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].resource_id, "a");
    }
}
