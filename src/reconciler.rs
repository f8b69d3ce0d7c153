//! Cycle orchestration — fetch, compute, evaluate, report.
//!
//! One reconciliation cycle is strictly sequential: for each configured
//! domain, fetch desired/live state, compute drift, then evaluate policy
//! over the combined records and hand the result to the report sink. The
//! serve loop repeats this on a timer and never lets a bad cycle kill the
//! process; `once` mode propagates the failure instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::DaemonConfig;
use crate::engine::DriftComputer;
use crate::metrics::SharedMetrics;
use crate::model::{CycleReport, Domain, DriftRecord, RemediationAction};
use crate::policy::PolicyEvaluator;
use crate::providers::{SnapshotProvider, StateProvider};
use crate::report::Reporter;
use crate::storage::Storage;

/// Outcome of one completed cycle.
#[derive(Debug)]
pub struct CycleSummary {
    pub cycle_id: Uuid,
    pub drift_records: usize,
    pub actions: usize,
}

pub struct Reconciler {
    providers: Vec<Box<dyn StateProvider>>,
    computer: DriftComputer,
    evaluator: PolicyEvaluator,
    reporter: Reporter,
    /// Drift history sink; absent in `check` runs and lightweight tests.
    storage: Option<Arc<Storage>>,
    metrics: SharedMetrics,
    /// Abort the cycle on the first provider/report failure (`once` mode).
    /// Serve mode degrades instead: a failed fetch counts as absent state.
    fail_fast: bool,
}

impl Reconciler {
    pub fn new(
        providers: Vec<Box<dyn StateProvider>>,
        computer: DriftComputer,
        evaluator: PolicyEvaluator,
        reporter: Reporter,
        storage: Option<Arc<Storage>>,
        metrics: SharedMetrics,
        fail_fast: bool,
    ) -> Self {
        Self {
            providers,
            computer,
            evaluator,
            reporter,
            storage,
            metrics,
            fail_fast,
        }
    }

    /// Run one full reconciliation cycle across all configured domains.
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        let cycle_id = Uuid::new_v4();
        let started = Instant::now();
        info!(%cycle_id, domains = self.providers.len(), "reconciliation cycle starting");

        let mut all_records: Vec<DriftRecord> = Vec::new();
        for provider in &self.providers {
            let domain = provider.domain();
            let desired = self.fetch(domain, "desired", provider.desired_state().await)?;
            let live = self.fetch(domain, "live", provider.live_state().await)?;

            let records = self
                .computer
                .compute(domain, desired.as_ref(), live.as_ref())
                .await;
            info!(%cycle_id, domain = %domain, records = records.len(), "domain drift computed");
            all_records.extend(records);
        }

        let (records, actions) = self.evaluator.evaluate(all_records);
        self.count(&records, &actions);
        self.persist_history(&records).await;

        let report = CycleReport {
            cycle_id,
            timestamp: chrono::Utc::now(),
            drift_reports: records,
            actions,
        };

        if let Err(e) = self.reporter.publish(&report).await {
            if self.fail_fast {
                return Err(e).context("failed to publish cycle report");
            }
            warn!(%cycle_id, error = %e, "failed to publish cycle report");
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.metrics.inc_cycles();
        self.metrics.set_cycle_duration_ms(elapsed_ms);

        let summary = CycleSummary {
            cycle_id,
            drift_records: report.drift_reports.len(),
            actions: report.actions.len(),
        };
        info!(
            %cycle_id,
            drift = summary.drift_records,
            actions = summary.actions,
            elapsed_ms,
            "reconciliation cycle complete"
        );
        Ok(summary)
    }

    /// Translate a provider result per the failure policy: propagate in
    /// fail-fast mode, degrade to absent state otherwise.
    fn fetch(
        &self,
        domain: Domain,
        which: &str,
        result: Result<Value, crate::providers::ProviderError>,
    ) -> Result<Option<Value>> {
        match result {
            Ok(tree) => Ok(Some(tree)),
            Err(e) if self.fail_fast => {
                Err(e).with_context(|| format!("failed to fetch {which} state for {domain}"))
            }
            Err(e) => {
                warn!(domain = %domain, state = which, error = %e, "state fetch failed — treating as absent");
                Ok(None)
            }
        }
    }

    fn count(&self, records: &[DriftRecord], actions: &[RemediationAction]) {
        for record in records {
            self.metrics.record_drift(record.severity);
        }
        for action in actions {
            self.metrics.record_action(action.kind);
        }
    }

    async fn persist_history(&self, records: &[DriftRecord]) {
        let Some(storage) = &self.storage else {
            return;
        };
        for record in records {
            if let Err(e) = storage.record_drift(record).await {
                warn!(fingerprint = %record.fingerprint, error = %e, "failed to persist drift history");
            }
        }
    }

    /// Continuous mode: one cycle immediately, then one per interval.
    /// Flips `ready` after the first cycle; failures are logged and counted,
    /// never fatal.
    pub async fn run_loop(&self, interval_secs: u64, ready: Arc<AtomicBool>) {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            interval.tick().await;
            if let Err(e) = self.run_cycle().await {
                self.metrics.inc_cycle_failures();
                warn!(error = %e, "reconciliation cycle failed — continuing");
            }
            ready.store(true, Ordering::Release);
        }
    }
}

/// Build snapshot providers from the `[domains.*]` config sections.
/// Unknown domain names are logged and skipped.
pub fn providers_from_config(config: &DaemonConfig) -> Vec<Box<dyn StateProvider>> {
    let mut providers: Vec<Box<dyn StateProvider>> = Vec::new();
    for (name, snapshots) in &config.domains {
        let Some(domain) = Domain::parse(name) else {
            warn!(domain = %name, "unknown domain in config — skipping");
            continue;
        };
        providers.push(Box::new(SnapshotProvider::new(
            domain,
            snapshots.desired.clone(),
            snapshots.live.clone(),
        )));
    }
    providers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryFingerprintStore;
    use crate::metrics::EngineMetrics;
    use crate::policy::PolicyRuleSet;
    use crate::report::Destination;

    fn snapshot_reconciler(dir: &std::path::Path, fail_fast: bool) -> Reconciler {
        let providers: Vec<Box<dyn StateProvider>> = vec![Box::new(SnapshotProvider::new(
            Domain::Messaging,
            dir.join("desired.json"),
            dir.join("live.json"),
        ))];
        Reconciler::new(
            providers,
            DriftComputer::new(Arc::new(MemoryFingerprintStore::new(1024, 0))),
            PolicyEvaluator::new(PolicyRuleSet::default_rules(), "dev"),
            Reporter::new(Destination::File {
                dir: dir.join("reports"),
            }),
            None,
            Arc::new(EngineMetrics::new()),
            fail_fast,
        )
    }

    #[tokio::test]
    async fn cycle_over_snapshots_reports_drift() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("desired.json"),
            r#"{"topics": [{"name": "orders", "partitions": 6}]}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("live.json"),
            r#"{"topics": [{"name": "orders", "partitions": 3}]}"#,
        )
        .unwrap();

        let reconciler = snapshot_reconciler(dir.path(), true);
        let summary = reconciler.run_cycle().await.unwrap();
        assert_eq!(summary.drift_records, 1);
        assert_eq!(summary.actions, 1);

        // Same snapshots again — dedup leaves nothing to report.
        let summary = reconciler.run_cycle().await.unwrap();
        assert_eq!(summary.drift_records, 0);
    }

    #[tokio::test]
    async fn missing_snapshots_abort_in_fail_fast_mode() {
        let dir = tempfile::tempdir().unwrap();
        let reconciler = snapshot_reconciler(dir.path(), true);
        assert!(reconciler.run_cycle().await.is_err());
    }

    #[tokio::test]
    async fn missing_snapshots_degrade_in_serve_mode() {
        let dir = tempfile::tempdir().unwrap();
        let reconciler = snapshot_reconciler(dir.path(), false);
        let summary = reconciler.run_cycle().await.unwrap();
        assert_eq!(summary.drift_records, 0);
    }

    #[test]
    fn unknown_config_domains_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            r#"
[domains.cloud]
desired = "d.json"
live = "l.json"

[domains.dns]
desired = "d.json"
live = "l.json"
"#,
        )
        .unwrap();
        let config =
            crate::config::DaemonConfig::new(Some(dir.path().to_path_buf()), None, None, None);
        let providers = providers_from_config(&config);
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].domain(), Domain::Cloud);
    }
}
