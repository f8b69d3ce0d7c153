pub mod config;
pub mod engine;
pub mod metrics;
pub mod model;
pub mod policy;
pub mod providers;
pub mod reconciler;
pub mod report;
pub mod rest;
pub mod storage;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use config::DaemonConfig;
use metrics::SharedMetrics;
use storage::Storage;

/// Shared daemon state handed to the HTTP responder.
///
/// The reconciler loop and the responder share nothing mutable beyond the
/// metrics counters and the readiness flag.
pub struct AppContext {
    pub config: Arc<DaemonConfig>,
    pub storage: Arc<Storage>,
    pub metrics: SharedMetrics,
    /// Set after the first completed reconciliation cycle.
    pub ready: Arc<AtomicBool>,
}

impl AppContext {
    pub fn new(config: Arc<DaemonConfig>, storage: Arc<Storage>, metrics: SharedMetrics) -> Self {
        Self {
            config,
            storage,
            metrics,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }
}
