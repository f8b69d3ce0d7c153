// SPDX-License-Identifier: MIT
//! Simple in-process counters exposed as `GET /metrics` in Prometheus text
//! format. No external library needed — all counters are `AtomicU64`
//! incremented inline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::model::{ActionKind, Severity};

/// In-process counters shared between the reconciler loop and the HTTP
/// responder.
#[derive(Debug)]
pub struct EngineMetrics {
    /// Reconciliation cycles completed since daemon start.
    pub cycles_total: AtomicU64,
    /// Cycles that failed (one-shot aborts and continuous-mode errors).
    pub cycle_failures_total: AtomicU64,
    /// Drift records reported since daemon start.
    pub drift_total: AtomicU64,
    pub drift_warning_total: AtomicU64,
    pub drift_critical_total: AtomicU64,
    pub drift_ignored_total: AtomicU64,
    pub drift_safe_total: AtomicU64,
    /// Actions by kind.
    pub remediations_total: AtomicU64,
    pub alerts_total: AtomicU64,
    /// Wall-clock duration of the most recent cycle.
    pub last_cycle_duration_ms: AtomicU64,
    /// Daemon start time — used to calculate uptime in the metrics response.
    pub started_at: Instant,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            cycles_total: AtomicU64::new(0),
            cycle_failures_total: AtomicU64::new(0),
            drift_total: AtomicU64::new(0),
            drift_warning_total: AtomicU64::new(0),
            drift_critical_total: AtomicU64::new(0),
            drift_ignored_total: AtomicU64::new(0),
            drift_safe_total: AtomicU64::new(0),
            remediations_total: AtomicU64::new(0),
            alerts_total: AtomicU64::new(0),
            last_cycle_duration_ms: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn inc_cycles(&self) {
        self.cycles_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cycle_failures(&self) {
        self.cycle_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drift(&self, severity: Severity) {
        self.drift_total.fetch_add(1, Ordering::Relaxed);
        let counter = match severity {
            Severity::Warning => &self.drift_warning_total,
            Severity::Critical => &self.drift_critical_total,
            Severity::Ignored => &self.drift_ignored_total,
            Severity::Safe => &self.drift_safe_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_action(&self, kind: ActionKind) {
        let counter = match kind {
            ActionKind::Remediate => &self.remediations_total,
            ActionKind::Alert => &self.alerts_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_cycle_duration_ms(&self, ms: u64) {
        self.last_cycle_duration_ms.store(ms, Ordering::Relaxed);
    }

    /// Render counters in Prometheus text format.
    pub fn render_prometheus(&self) -> String {
        let uptime = self.started_at.elapsed().as_secs();
        let cycles = self.cycles_total.load(Ordering::Relaxed);
        let cycle_failures = self.cycle_failures_total.load(Ordering::Relaxed);
        let drift = self.drift_total.load(Ordering::Relaxed);
        let warning = self.drift_warning_total.load(Ordering::Relaxed);
        let critical = self.drift_critical_total.load(Ordering::Relaxed);
        let ignored = self.drift_ignored_total.load(Ordering::Relaxed);
        let safe = self.drift_safe_total.load(Ordering::Relaxed);
        let remediations = self.remediations_total.load(Ordering::Relaxed);
        let alerts = self.alerts_total.load(Ordering::Relaxed);
        let duration = self.last_cycle_duration_ms.load(Ordering::Relaxed);

        format!(
            "# HELP driftd_uptime_seconds Daemon uptime in seconds.\n\
             # TYPE driftd_uptime_seconds gauge\n\
             driftd_uptime_seconds {uptime}\n\
             # HELP driftd_cycles_total Reconciliation cycles completed since start.\n\
             # TYPE driftd_cycles_total counter\n\
             driftd_cycles_total {cycles}\n\
             # HELP driftd_cycle_failures_total Reconciliation cycles that failed.\n\
             # TYPE driftd_cycle_failures_total counter\n\
             driftd_cycle_failures_total {cycle_failures}\n\
             # HELP driftd_drift_total Drift records reported since start.\n\
             # TYPE driftd_drift_total counter\n\
             driftd_drift_total {drift}\n\
             # HELP driftd_drift_by_severity_total Drift records by final severity.\n\
             # TYPE driftd_drift_by_severity_total counter\n\
             driftd_drift_by_severity_total{{severity=\"warning\"}} {warning}\n\
             driftd_drift_by_severity_total{{severity=\"critical\"}} {critical}\n\
             driftd_drift_by_severity_total{{severity=\"ignored\"}} {ignored}\n\
             driftd_drift_by_severity_total{{severity=\"safe\"}} {safe}\n\
             # HELP driftd_remediations_total Remediation decisions since start.\n\
             # TYPE driftd_remediations_total counter\n\
             driftd_remediations_total {remediations}\n\
             # HELP driftd_alerts_total Alert decisions since start.\n\
             # TYPE driftd_alerts_total counter\n\
             driftd_alerts_total {alerts}\n\
             # HELP driftd_last_cycle_duration_ms Duration of the most recent cycle.\n\
             # TYPE driftd_last_cycle_duration_ms gauge\n\
             driftd_last_cycle_duration_ms {duration}\n"
        )
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle — cheaply clonable.
pub type SharedMetrics = Arc<EngineMetrics>;
