//! Ingestion configuration
//!
//! The flat `SFTP_*` option set that drives a sync run: where the remote
//! manifests live, where the local stage tree is rooted, how CSV is
//! delimited, which transform statement to run, and how often to run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default SFTP port
pub const DEFAULT_SFTP_PORT: u16 = 22;

/// Default CSV field separator
pub const DEFAULT_CSV_SEPARATOR: u8 = b',';

/// Default seconds between scheduled runs
pub const DEFAULT_FIXED_RATE_SECS: u64 = 300;

/// Default SFTP session timeout in seconds
pub const DEFAULT_SFTP_TIMEOUT_SECS: u64 = 300;

/// Main ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// SFTP host name
    pub hostname: String,
    /// SFTP port
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// Remote directory that is listed every run
    pub remote_files_dir_path: String,
    /// Local root holding the stage directories and both ledgers
    pub local_files_dir_path: PathBuf,
    /// Single-byte CSV delimiter used for both parsing and writing
    pub csv_separator: u8,
    /// File containing the transform statement executed against the staging store
    pub remap_query_file_path: PathBuf,
    /// Seconds between scheduled runs
    pub fixed_rate_value: u64,
    /// Whether the scheduler starts automatically
    pub task_enabled: bool,
    /// Blocking SFTP call timeout in seconds; 0 waits forever
    pub timeout_secs: u64,
}

impl IngestConfig {
    /// Load ingestion configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let csv_separator = match std::env::var("SFTP_CSV_SEPARATOR") {
            Ok(value) => parse_separator(&value)?,
            Err(_) => DEFAULT_CSV_SEPARATOR,
        };

        let config = Self {
            hostname: std::env::var("SFTP_HOSTNAME").unwrap_or_default(),
            port: std::env::var("SFTP_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SFTP_PORT),
            username: std::env::var("SFTP_USERNAME").unwrap_or_default(),
            password: std::env::var("SFTP_PASSWORD").unwrap_or_default(),
            remote_files_dir_path: std::env::var("SFTP_REMOTE_FILES_DIR_PATH")
                .unwrap_or_else(|_| "/".to_string()),
            local_files_dir_path: std::env::var("SFTP_LOCAL_FILES_DIR_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            csv_separator,
            remap_query_file_path: std::env::var("SFTP_REMAP_QUERY_FILE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./remap.sql")),
            fixed_rate_value: std::env::var("SFTP_FIXED_RATE_VALUE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_FIXED_RATE_SECS),
            task_enabled: std::env::var("SFTP_TASK_ENABLED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
            timeout_secs: std::env::var("SFTP_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SFTP_TIMEOUT_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.hostname.is_empty() {
            anyhow::bail!("SFTP_HOSTNAME cannot be empty");
        }
        if self.username.is_empty() {
            anyhow::bail!("SFTP_USERNAME cannot be empty");
        }
        if self.remote_files_dir_path.is_empty() {
            anyhow::bail!("SFTP_REMOTE_FILES_DIR_PATH cannot be empty");
        }
        if self.local_files_dir_path.as_os_str().is_empty() {
            anyhow::bail!("SFTP_LOCAL_FILES_DIR_PATH cannot be empty");
        }
        if self.fixed_rate_value == 0 {
            anyhow::bail!("SFTP_FIXED_RATE_VALUE must be greater than 0");
        }
        if matches!(self.csv_separator, b'\n' | b'\r' | b'"') {
            anyhow::bail!(
                "SFTP_CSV_SEPARATOR cannot be {:?}",
                self.csv_separator as char
            );
        }
        Ok(())
    }

    /// Interval between scheduled runs
    pub fn fixed_rate(&self) -> Duration {
        Duration::from_secs(self.fixed_rate_value)
    }

    /// SFTP session timeout, if any
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Parse a separator option. Accepts a single ASCII character or the word `tab`.
fn parse_separator(value: &str) -> anyhow::Result<u8> {
    if value.eq_ignore_ascii_case("tab") || value == "\\t" {
        return Ok(b'\t');
    }
    match value.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => anyhow::bail!(
            "SFTP_CSV_SEPARATOR must be a single ASCII character, got: {:?}",
            value
        ),
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            port: DEFAULT_SFTP_PORT,
            username: "manifests".to_string(),
            password: String::new(),
            remote_files_dir_path: "/".to_string(),
            local_files_dir_path: PathBuf::from("./data"),
            csv_separator: DEFAULT_CSV_SEPARATOR,
            remap_query_file_path: PathBuf::from("./remap.sql"),
            fixed_rate_value: DEFAULT_FIXED_RATE_SECS,
            task_enabled: false,
            timeout_secs: DEFAULT_SFTP_TIMEOUT_SECS,
        }
    }
}
