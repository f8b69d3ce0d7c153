//! `report` — serializes a cycle's drift records and actions to the
//! configured destination.
//!
//! Destinations: stdout (pretty JSON), a timestamped local file, or an HTTP
//! object store laid out by date. The sink also drops same-fingerprint
//! duplicates within one report before serializing, as a last line of
//! defense behind the engine's dedup store.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::info;

use crate::model::CycleReport;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write report file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to upload report to {url}: {message}")]
    Upload { url: String, message: String },
}

/// Where cycle reports go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    /// `{dir}/report_{YYYYmmdd_HHMMSS}.json`
    File { dir: PathBuf },
    /// `PUT {base_url}/{YYYY}/{MM}/{DD}/report.json`
    Http { base_url: String },
}

pub struct Reporter {
    destination: Destination,
    client: reqwest::Client,
}

impl Reporter {
    pub fn new(destination: Destination) -> Self {
        Self {
            destination,
            client: reqwest::Client::new(),
        }
    }

    /// Serialize and persist one cycle report.
    pub async fn publish(&self, report: &CycleReport) -> Result<(), ReportError> {
        let report = dedup_by_fingerprint(report);

        match &self.destination {
            Destination::Stdout => {
                let body = serde_json::to_string_pretty(&report)?;
                println!("{body}");
            }
            Destination::File { dir } => {
                let filename = format!(
                    "report_{}.json",
                    report.timestamp.format("%Y%m%d_%H%M%S")
                );
                let path = dir.join(filename);
                let body = serde_json::to_string_pretty(&report)?;
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|source| ReportError::Io {
                        path: dir.clone(),
                        source,
                    })?;
                tokio::fs::write(&path, body)
                    .await
                    .map_err(|source| ReportError::Io {
                        path: path.clone(),
                        source,
                    })?;
                info!(path = %path.display(), "cycle report written");
            }
            Destination::Http { base_url } => {
                let url = format!(
                    "{}/{}/report.json",
                    base_url.trim_end_matches('/'),
                    report.timestamp.format("%Y/%m/%d")
                );
                let response = self
                    .client
                    .put(&url)
                    .json(&report)
                    .send()
                    .await
                    .map_err(|e| ReportError::Upload {
                        url: url.clone(),
                        message: e.to_string(),
                    })?;
                if !response.status().is_success() {
                    return Err(ReportError::Upload {
                        url,
                        message: format!("unexpected status {}", response.status()),
                    });
                }
                info!(%url, "cycle report uploaded");
            }
        }
        Ok(())
    }
}

/// Keep the first record per fingerprint; actions are already one-per-record
/// and are left untouched.
fn dedup_by_fingerprint(report: &CycleReport) -> CycleReport {
    let mut seen = HashSet::new();
    let drift_reports = report
        .drift_reports
        .iter()
        .filter(|r| seen.insert(r.fingerprint.clone()))
        .cloned()
        .collect();
    CycleReport {
        cycle_id: report.cycle_id,
        timestamp: report.timestamp,
        drift_reports,
        actions: report.actions.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Domain, DriftRecord, Severity};
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn record(fingerprint: &str) -> DriftRecord {
        DriftRecord {
            fingerprint: fingerprint.into(),
            resource_type: "topic".into(),
            resource_id: "orders".into(),
            domain: Domain::Messaging,
            field_path: "partitions".into(),
            expected_value: json!(6),
            actual_value: json!(3),
            severity: Severity::Warning,
            detected_at: Utc::now(),
        }
    }

    fn report(records: Vec<DriftRecord>) -> CycleReport {
        CycleReport {
            cycle_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            drift_reports: records,
            actions: vec![],
        }
    }

    #[test]
    fn duplicate_fingerprints_collapse() {
        let deduped = dedup_by_fingerprint(&report(vec![
            record("aaaa"),
            record("bbbb"),
            record("aaaa"),
        ]));
        assert_eq!(deduped.drift_reports.len(), 2);
        assert_eq!(deduped.drift_reports[0].fingerprint, "aaaa");
        assert_eq!(deduped.drift_reports[1].fingerprint, "bbbb");
    }

    #[tokio::test]
    async fn file_destination_writes_timestamped_report() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = Reporter::new(Destination::File {
            dir: dir.path().to_path_buf(),
        });
        reporter.publish(&report(vec![record("aaaa")])).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].starts_with("report_"));
        assert!(entries[0].ends_with(".json"));

        let body = std::fs::read_to_string(dir.path().join(&entries[0])).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["drift_reports"][0]["fingerprint"], json!("aaaa"));
    }
}
