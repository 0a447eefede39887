//! Run configuration
//!
//! All run parameters live in one immutable struct that is validated once
//! and handed to the controller. Every field has a default, so an empty
//! JSON object `{}` is a complete config reproducing the classic run:
//! 1000 rows, 4 clients, `./build/bin/rmdb test`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::errors::{HarnessError, HarnessResult};

/// Upper bound on n·3N; the whole plan is held in memory
pub const MAX_WORKLOAD_COMMANDS: usize = u32::MAX as usize;

/// How the harness decides the server is ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessPolicy {
    /// Sleep a fixed settling delay
    Fixed,
    /// Poll with throwaway clients until one exits cleanly
    Probe,
}

/// What happens to the stdout/stderr of a process the harness does not read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Share the harness terminal
    Inherit,
    /// Send to the null device
    Discard,
}

/// Whether verification mismatches fail the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VerifyPolicy {
    /// Log and record mismatches only
    Report,
    /// Fail the run on mismatch
    Enforce,
}

/// What the server's `count(*)` counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CountMode {
    /// Every stored row, duplicates included
    Rows,
    /// Distinct values of the single column
    Distinct,
}

/// Immutable run parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// N: size of each id range
    #[serde(default = "default_rows")]
    pub rows: u64,

    /// n: number of concurrent clients in phase 1
    #[serde(default = "default_clients")]
    pub clients: usize,

    /// Server executable, launched as `<server_bin> <storage_dir>`
    #[serde(default = "default_server_bin")]
    pub server_bin: PathBuf,

    /// Client executable, launched with no arguments
    #[serde(default = "default_client_bin")]
    pub client_bin: PathBuf,

    /// Server storage directory, relative to `work_dir` when not absolute
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Working directory for every spawned process (harness cwd when absent)
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    #[serde(default = "default_table")]
    pub table: String,

    #[serde(default = "default_column")]
    pub column: String,

    #[serde(default = "default_column_type")]
    pub column_type: String,

    /// Settling delay after the first boot
    #[serde(default = "default_first_boot_settle_ms")]
    pub first_boot_settle_ms: u64,

    /// Settling delay after the recovery boot
    #[serde(default = "default_recovery_settle_ms")]
    pub recovery_settle_ms: u64,

    /// Delay after the DDL before the load starts
    #[serde(default = "default_ddl_settle_ms")]
    pub ddl_settle_ms: u64,

    /// Per-client wait after `exit;` before force-stopping
    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,

    /// Wait after a graceful terminate request before force-killing the server
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    #[serde(default = "default_readiness")]
    pub readiness: ReadinessPolicy,

    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Output of load clients other than client 0
    #[serde(default = "default_output")]
    pub client_output: OutputMode,

    #[serde(default = "default_output")]
    pub server_output: OutputMode,

    #[serde(default = "default_verify")]
    pub verify: VerifyPolicy,

    #[serde(default = "default_count_mode")]
    pub count_mode: CountMode,
}

fn default_rows() -> u64 {
    1000
}
fn default_clients() -> usize {
    4
}
fn default_server_bin() -> PathBuf {
    PathBuf::from("./build/bin/rmdb")
}
fn default_client_bin() -> PathBuf {
    PathBuf::from("./build/bin/rmdb_client")
}
fn default_storage_dir() -> PathBuf {
    PathBuf::from("test")
}
fn default_table() -> String {
    "t".to_string()
}
fn default_column() -> String {
    "id".to_string()
}
fn default_column_type() -> String {
    "int".to_string()
}
fn default_first_boot_settle_ms() -> u64 {
    500
}
fn default_recovery_settle_ms() -> u64 {
    1000
}
fn default_ddl_settle_ms() -> u64 {
    200
}
fn default_close_timeout_ms() -> u64 {
    5000
}
fn default_shutdown_timeout_ms() -> u64 {
    5000
}
fn default_readiness() -> ReadinessPolicy {
    ReadinessPolicy::Fixed
}
fn default_probe_interval_ms() -> u64 {
    100
}
fn default_probe_timeout_ms() -> u64 {
    10_000
}
fn default_output() -> OutputMode {
    OutputMode::Inherit
}
fn default_verify() -> VerifyPolicy {
    VerifyPolicy::Report
}
fn default_count_mode() -> CountMode {
    CountMode::Rows
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            rows: default_rows(),
            clients: default_clients(),
            server_bin: default_server_bin(),
            client_bin: default_client_bin(),
            storage_dir: default_storage_dir(),
            work_dir: None,
            table: default_table(),
            column: default_column(),
            column_type: default_column_type(),
            first_boot_settle_ms: default_first_boot_settle_ms(),
            recovery_settle_ms: default_recovery_settle_ms(),
            ddl_settle_ms: default_ddl_settle_ms(),
            close_timeout_ms: default_close_timeout_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            readiness: default_readiness(),
            probe_interval_ms: default_probe_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            client_output: default_output(),
            server_output: default_output(),
            verify: default_verify(),
            count_mode: default_count_mode(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a JSON file and validate it
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HarnessError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let config: HarnessConfig = serde_json::from_str(&content)
            .map_err(|e| HarnessError::Config(format!("invalid config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no run could succeed with
    pub fn validate(&self) -> HarnessResult<()> {
        if self.rows == 0 {
            return Err(HarnessError::Config("rows must be > 0".into()));
        }
        if self.clients == 0 {
            return Err(HarnessError::Config("clients must be > 0".into()));
        }
        if self.workload_len().is_none() {
            return Err(HarnessError::Config(format!(
                "rows={} with clients={} exceeds {} load commands",
                self.rows, self.clients, MAX_WORKLOAD_COMMANDS
            )));
        }
        if self.server_bin.as_os_str().is_empty() {
            return Err(HarnessError::Config("server_bin must not be empty".into()));
        }
        if self.client_bin.as_os_str().is_empty() {
            return Err(HarnessError::Config("client_bin must not be empty".into()));
        }
        if self.storage_dir.as_os_str().is_empty() {
            return Err(HarnessError::Config("storage_dir must not be empty".into()));
        }
        for (name, value) in [
            ("table", &self.table),
            ("column", &self.column),
            ("column_type", &self.column_type),
        ] {
            if value.trim().is_empty() || value.contains(';') || value.contains('\n') {
                return Err(HarnessError::Config(format!(
                    "{} must be a non-empty identifier, got '{}'",
                    name, value
                )));
            }
        }
        if self.close_timeout_ms == 0 || self.shutdown_timeout_ms == 0 {
            return Err(HarnessError::Config(
                "close_timeout_ms and shutdown_timeout_ms must be > 0".into(),
            ));
        }
        if self.readiness == ReadinessPolicy::Probe
            && (self.probe_interval_ms == 0 || self.probe_timeout_ms < self.probe_interval_ms)
        {
            return Err(HarnessError::Config(
                "probe_interval_ms must be > 0 and <= probe_timeout_ms".into(),
            ));
        }
        Ok(())
    }

    /// n·3N, or `None` when the plan or its expected aggregates would not fit
    ///
    /// Ids go up to 2N-1 and the expected count is n·N, both as i64.
    pub fn workload_len(&self) -> Option<usize> {
        let upper = i64::try_from(self.rows.checked_mul(2)?).ok()?;
        upper.checked_mul(i64::try_from(self.clients).ok()?)?;

        usize::try_from(self.rows)
            .ok()?
            .checked_mul(self.clients)?
            .checked_mul(3)
            .filter(|len| *len <= MAX_WORKLOAD_COMMANDS)
    }

    /// Storage directory as the harness sees it
    ///
    /// The server runs with `work_dir` as its cwd, so a relative storage dir
    /// is resolved against it.
    pub fn storage_path(&self) -> PathBuf {
        match &self.work_dir {
            Some(work_dir) if self.storage_dir.is_relative() => work_dir.join(&self.storage_dir),
            _ => self.storage_dir.clone(),
        }
    }

    pub fn first_boot_settle(&self) -> Duration {
        Duration::from_millis(self.first_boot_settle_ms)
    }

    pub fn recovery_settle(&self) -> Duration {
        Duration::from_millis(self.recovery_settle_ms)
    }

    pub fn ddl_settle(&self) -> Duration {
        Duration::from_millis(self.ddl_settle_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_object_is_default() {
        let config: HarnessConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, HarnessConfig::default());
        assert_eq!(config.rows, 1000);
        assert_eq!(config.clients, 4);
        assert_eq!(config.readiness, ReadinessPolicy::Fixed);
        assert_eq!(config.verify, VerifyPolicy::Report);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("harness.json");
        fs::write(
            &path,
            r#"{"rows": 3, "clients": 2, "verify": "enforce", "count_mode": "distinct"}"#,
        )
        .unwrap();

        let config = HarnessConfig::load(&path).unwrap();
        assert_eq!(config.rows, 3);
        assert_eq!(config.clients, 2);
        assert_eq!(config.verify, VerifyPolicy::Enforce);
        assert_eq!(config.count_mode, CountMode::Distinct);
        assert_eq!(config.table, "t");
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("harness.json");
        fs::write(&path, "{ rows: ").unwrap();

        let err = HarnessConfig::load(&path).unwrap_err();
        assert_eq!(err.code(), "HARNESS_CONFIG_INVALID");
    }

    #[test]
    fn test_validate_rejects_zero_rows_and_clients() {
        let config = HarnessConfig {
            rows: 0,
            ..HarnessConfig::default()
        };
        assert!(config.validate().is_err());

        let config = HarnessConfig {
            clients: 0,
            ..HarnessConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_overflowing_workloads() {
        let config = HarnessConfig {
            rows: u64::MAX / 2,
            clients: 4,
            ..HarnessConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), "HARNESS_CONFIG_INVALID");
        assert_eq!(config.workload_len(), None);

        let config = HarnessConfig {
            rows: u64::MAX,
            clients: 1,
            ..HarnessConfig::default()
        };
        assert!(config.validate().is_err());

        let config = HarnessConfig {
            rows: 1 << 31,
            clients: 1 << 20,
            ..HarnessConfig::default()
        };
        assert!(config.validate().is_err());

        let config = HarnessConfig {
            rows: 1000,
            clients: 4,
            ..HarnessConfig::default()
        };
        assert_eq!(config.workload_len(), Some(12_000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_statement_breaking_identifiers() {
        let config = HarnessConfig {
            table: "t; drop".into(),
            ..HarnessConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_storage_path_resolves_against_work_dir() {
        let config = HarnessConfig {
            work_dir: Some(PathBuf::from("/srv/rmdb")),
            ..HarnessConfig::default()
        };
        assert_eq!(config.storage_path(), PathBuf::from("/srv/rmdb/test"));

        let config = HarnessConfig {
            work_dir: Some(PathBuf::from("/srv/rmdb")),
            storage_dir: PathBuf::from("/data/db"),
            ..HarnessConfig::default()
        };
        assert_eq!(config.storage_path(), PathBuf::from("/data/db"));

        assert_eq!(HarnessConfig::default().storage_path(), PathBuf::from("test"));
    }
}
