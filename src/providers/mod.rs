//! `providers` — sources of desired and live state snapshots.
//!
//! The engine treats providers as opaque producers of nested key-value
//! trees; how state is acquired (provisioning tools, control-plane APIs,
//! pagination, credentials) is the provider's problem. The shipped
//! [`SnapshotProvider`] reads both trees from files, which is also how the
//! integration tests drive the daemon end to end.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::model::Domain;

/// Errors surfaced by a state provider. The reconciler decides whether they
/// abort the cycle (one-shot mode) or degrade to absent state (continuous).
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("failed to read state snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse state snapshot {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// A source of desired/live state for exactly one domain.
#[async_trait]
pub trait StateProvider: Send + Sync {
    /// The domain this provider reconciles — selects the comparator.
    fn domain(&self) -> Domain;

    async fn desired_state(&self) -> Result<Value, ProviderError>;

    async fn live_state(&self) -> Result<Value, ProviderError>;
}

/// File-backed provider: desired and live trees from JSON or YAML snapshots
/// (format chosen by extension).
pub struct SnapshotProvider {
    domain: Domain,
    desired_path: PathBuf,
    live_path: PathBuf,
}

impl SnapshotProvider {
    pub fn new(domain: Domain, desired_path: PathBuf, live_path: PathBuf) -> Self {
        Self {
            domain,
            desired_path,
            live_path,
        }
    }

    async fn load(path: &Path) -> Result<Value, ProviderError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ProviderError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );

        if is_yaml {
            serde_yaml::from_str(&raw).map_err(|e| ProviderError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        } else {
            serde_json::from_str(&raw).map_err(|e| ProviderError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
    }
}

#[async_trait]
impl StateProvider for SnapshotProvider {
    fn domain(&self) -> Domain {
        self.domain
    }

    async fn desired_state(&self) -> Result<Value, ProviderError> {
        Self::load(&self.desired_path).await
    }

    async fn live_state(&self) -> Result<Value, ProviderError> {
        Self::load(&self.live_path).await
    }
}
