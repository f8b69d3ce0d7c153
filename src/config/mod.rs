use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::report::Destination;

const DEFAULT_PORT: u16 = 9044;
const DEFAULT_INTERVAL_SECS: u64 = 300;
const DEFAULT_ENVIRONMENT: &str = "dev";
const DEFAULT_DEDUP_CAPACITY: usize = 100_000;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── EngineConfig ─────────────────────────────────────────────────────────────

/// Drift engine tuning (`[engine]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on fingerprints held by the in-memory dedup store.
    pub dedup_capacity: usize,
    /// Seconds before a reported drift may be reported again. 0 = report at
    /// most once per store lifetime.
    pub dedup_retention_secs: u64,
    /// Persist dedup state in SQLite so it survives restarts. When false the
    /// bounded in-memory store is used.
    pub persist_fingerprints: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
            dedup_retention_secs: 0,
            persist_fingerprints: true,
        }
    }
}

// ─── ReportConfig ─────────────────────────────────────────────────────────────

/// Report sink configuration (`[report]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    /// "stdout" (default) | "file" | "http".
    pub destination: String,
    /// Directory for the file destination.
    pub dir: PathBuf,
    /// Base URL for the http destination; reports land under a
    /// `YYYY/MM/DD/report.json` key below it.
    pub url: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            destination: "stdout".to_string(),
            dir: PathBuf::from("reports"),
            url: None,
        }
    }
}

// ─── HttpConfig ───────────────────────────────────────────────────────────────

/// Health/metrics HTTP responder (`[http]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address (default "127.0.0.1"; use "0.0.0.0" to expose on LAN).
    pub bind_address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: DEFAULT_PORT,
        }
    }
}

// ─── Domain snapshots ─────────────────────────────────────────────────────────

/// Snapshot file pair for one domain (`[domains.<name>]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DomainSnapshotConfig {
    pub desired: PathBuf,
    pub live: PathBuf,
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// Seconds between reconciliation cycles in serve mode (default: 300).
    interval_secs: Option<u64>,
    /// Environment the auto-apply rules match against (default: "dev").
    environment: Option<String>,
    /// Log level filter string, e.g. "debug", "info,driftd=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default) | "json" (structured for log aggregators).
    log_format: Option<String>,
    /// Explicit policy artifact path; searched before the standard locations.
    policy_path: Option<PathBuf>,
    /// Drift engine tuning (`[engine]`).
    engine: Option<EngineConfig>,
    /// Report sink (`[report]`).
    report: Option<ReportConfig>,
    /// Health/metrics HTTP responder (`[http]`).
    http: Option<HttpConfig>,
    /// Per-domain snapshot paths (`[domains.cloud]` etc.).
    domains: Option<HashMap<String, DomainSnapshotConfig>>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── DaemonConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub data_dir: PathBuf,
    pub log: String,
    /// "pretty" (default) | "json".
    pub log_format: String,
    pub interval_secs: u64,
    /// Environment checked by auto-apply rules (DRIFTD_ENVIRONMENT env var).
    pub environment: String,
    pub engine: EngineConfig,
    /// Explicit policy artifact override (DRIFTD_POLICY_PATH env var).
    pub policy_path: Option<PathBuf>,
    pub report: ReportConfig,
    pub http: HttpConfig,
    /// Domain name → snapshot file pair. Unknown names are rejected at
    /// provider construction, not here.
    pub domains: HashMap<String, DomainSnapshotConfig>,
}

impl DaemonConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(
        data_dir: Option<PathBuf>,
        log: Option<String>,
        interval_secs: Option<u64>,
        port: Option<u16>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // Load TOML as the lowest-priority override layer
        let toml = load_toml(&data_dir).unwrap_or_default();

        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let log_format = std::env::var("DRIFTD_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let interval_secs = interval_secs
            .or(toml.interval_secs)
            .unwrap_or(DEFAULT_INTERVAL_SECS);

        let environment = std::env::var("DRIFTD_ENVIRONMENT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.environment)
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

        let policy_path = std::env::var("DRIFTD_POLICY_PATH")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .or(toml.policy_path);

        let engine = toml.engine.unwrap_or_default();
        let report = toml.report.unwrap_or_default();

        let mut http = toml.http.unwrap_or_default();
        if let Some(port) = port {
            http.port = port;
        }
        if let Ok(bind) = std::env::var("DRIFTD_BIND") {
            if !bind.is_empty() {
                http.bind_address = bind;
            }
        }

        let domains = toml.domains.unwrap_or_default();

        Self {
            data_dir,
            log,
            log_format,
            interval_secs,
            environment,
            engine,
            policy_path,
            report,
            http,
            domains,
        }
    }

    /// Ordered candidate locations for the policy artifact.
    pub fn policy_candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(path) = &self.policy_path {
            candidates.push(path.clone());
        }
        candidates.push(PathBuf::from("config/policies.yaml"));
        candidates.push(PathBuf::from("/etc/driftd/policies.yaml"));
        candidates.push(self.data_dir.join("policies.yaml"));
        candidates
    }

    /// Resolve the `[report]` section into a sink destination. Unknown
    /// destination strings degrade to stdout with an error log.
    pub fn report_destination(&self) -> Destination {
        match self.report.destination.as_str() {
            "stdout" => Destination::Stdout,
            "file" => Destination::File {
                dir: self.report.dir.clone(),
            },
            "http" => match &self.report.url {
                Some(url) if !url.is_empty() => Destination::Http {
                    base_url: url.clone(),
                },
                _ => {
                    error!("report.destination is \"http\" but report.url is unset — falling back to stdout");
                    Destination::Stdout
                }
            },
            other => {
                error!(destination = %other, "unknown report destination — falling back to stdout");
                Destination::Stdout
            }
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/driftd
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("driftd");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/driftd or ~/.local/share/driftd
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("driftd");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("driftd");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\driftd
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("driftd");
        }
    }
    // Fallback
    PathBuf::from(".driftd")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_toml() {
        let dir = tempfile::tempdir().unwrap();
        let config = DaemonConfig::new(Some(dir.path().to_path_buf()), None, None, None);
        assert_eq!(config.interval_secs, 300);
        assert_eq!(config.environment, "dev");
        assert_eq!(config.http.port, DEFAULT_PORT);
        assert!(config.engine.persist_fingerprints);
        assert!(config.domains.is_empty());
        assert_eq!(config.report_destination(), Destination::Stdout);
    }

    #[test]
    fn toml_layer_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            r#"
interval_secs = 60
environment = "prod"

[engine]
dedup_retention_secs = 3600

[report]
destination = "file"
dir = "/var/lib/driftd/reports"

[domains.cloud]
desired = "snapshots/cloud/desired.json"
live = "snapshots/cloud/live.json"
"#,
        )
        .unwrap();

        let config = DaemonConfig::new(Some(dir.path().to_path_buf()), None, None, None);
        assert_eq!(config.interval_secs, 60);
        assert_eq!(config.environment, "prod");
        assert_eq!(config.engine.dedup_retention_secs, 3600);
        assert!(config.domains.contains_key("cloud"));
        assert_eq!(
            config.report_destination(),
            Destination::File {
                dir: PathBuf::from("/var/lib/driftd/reports")
            }
        );
    }

    #[test]
    fn cli_beats_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "interval_secs = 60\n").unwrap();
        let config =
            DaemonConfig::new(Some(dir.path().to_path_buf()), None, Some(15), Some(9999));
        assert_eq!(config.interval_secs, 15);
        assert_eq!(config.http.port, 9999);
    }

    #[test]
    fn explicit_policy_path_is_first_candidate() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "policy_path = \"/opt/policies.yaml\"\n",
        )
        .unwrap();
        let config = DaemonConfig::new(Some(dir.path().to_path_buf()), None, None, None);
        let candidates = config.policy_candidates();
        assert_eq!(candidates[0], PathBuf::from("/opt/policies.yaml"));
        assert!(candidates.contains(&dir.path().join("policies.yaml")));
    }

    #[test]
    fn http_without_url_degrades_to_stdout() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[report]\ndestination = \"http\"\n",
        )
        .unwrap();
        let config = DaemonConfig::new(Some(dir.path().to_path_buf()), None, None, None);
        assert_eq!(config.report_destination(), Destination::Stdout);
    }
}
