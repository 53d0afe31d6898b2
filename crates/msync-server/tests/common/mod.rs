//! Shared helpers for pipeline integration tests
//!
//! [`DirRemote`] stands in for the SFTP server: it lists and copies files
//! from a plain directory, with per-file modification times the test can
//! change to simulate re-uploads.

#![allow(dead_code)]

use async_trait::async_trait;
use msync_server::error::TransportError;
use msync_server::ingest::common::RemoteSource;
use msync_server::ingest::remap::StagingStore;
use msync_server::ingest::{IngestConfig, RemoteItem, SyncPipeline};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Copies source columns into the canonical table in source order
pub const PASS_THROUGH_SQL: &str = "\
INSERT INTO universal_manifest_entries (seller_id, item_tracking_number, price_currency, logistics_order_code)
SELECT company_name, barcode, price_currency, logistics_order_code
FROM iherb_manifest_entries
ORDER BY id;
";

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,msync_server=debug,sqlx=warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Remote directory backed by the local filesystem
pub struct DirRemote {
    dir: PathBuf,
    mtimes: Mutex<HashMap<String, u64>>,
    fetches: AtomicUsize,
    fail_listing: bool,
}

impl DirRemote {
    pub const DEFAULT_MTIME: u64 = 100;

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            mtimes: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
            fail_listing: false,
        }
    }

    /// A remote whose listing always fails
    pub fn unreachable(dir: impl Into<PathBuf>) -> Self {
        Self {
            fail_listing: true,
            ..Self::new(dir)
        }
    }

    /// Write `body` as remote file `name` with the given modification time
    pub fn upload(&self, name: &str, body: &str, mtime: u64) -> std::io::Result<()> {
        std::fs::write(self.dir.join(name), body)?;
        self.mtimes
            .lock()
            .map_err(|_| std::io::Error::other("mtime table poisoned"))?
            .insert(name.to_string(), mtime);
        Ok(())
    }

    pub fn remove(&self, name: &str) -> std::io::Result<()> {
        std::fs::remove_file(self.dir.join(name))
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn mtime_of(&self, name: &str) -> u64 {
        self.mtimes
            .lock()
            .ok()
            .and_then(|m| m.get(name).copied())
            .unwrap_or(Self::DEFAULT_MTIME)
    }
}

#[async_trait]
impl RemoteSource for DirRemote {
    async fn list(&self, dir: &str) -> Result<Vec<RemoteItem>, TransportError> {
        if self.fail_listing {
            return Err(TransportError::Connection(format!("cannot reach {}", dir)));
        }

        let mut items = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let remote_path = format!("{}/{}", dir.trim_end_matches('/'), name);
            let mtime = self.mtime_of(&name);
            items.push(RemoteItem::new(name, remote_path, mtime));
        }
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn fetch(&self, item: &RemoteItem, local_dir: &Path) -> Result<PathBuf, TransportError> {
        let source = self.dir.join(&item.name);
        if !source.exists() {
            return Err(TransportError::Unavailable(format!("{} is gone", item.remote_path)));
        }
        let target = local_dir.join(&item.name);
        std::fs::copy(&source, &target)?;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(target)
    }
}

/// Temporary remote and local roots plus a pipeline wired to them
pub struct Harness {
    pub remote_dir: TempDir,
    pub local_root: TempDir,
    pub remote: Arc<DirRemote>,
    pub pipeline: SyncPipeline,
}

impl Harness {
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_separator(b',').await
    }

    pub async fn with_separator(separator: u8) -> anyhow::Result<Self> {
        let remote_dir = TempDir::new()?;
        let remote = Arc::new(DirRemote::new(remote_dir.path()));
        Self::build(remote_dir, remote, separator).await
    }

    pub async fn unreachable() -> anyhow::Result<Self> {
        let remote_dir = TempDir::new()?;
        let remote = Arc::new(DirRemote::unreachable(remote_dir.path()));
        Self::build(remote_dir, remote, b',').await
    }

    async fn build(remote_dir: TempDir, remote: Arc<DirRemote>, separator: u8) -> anyhow::Result<Self> {
        let local_root = TempDir::new()?;
        let query_path = local_root.path().join("remap.sql");
        std::fs::write(&query_path, PASS_THROUGH_SQL)?;

        let config = IngestConfig {
            remote_files_dir_path: "/outbound".to_string(),
            local_files_dir_path: local_root.path().to_path_buf(),
            csv_separator: separator,
            remap_query_file_path: query_path,
            ..Default::default()
        };
        let store = StagingStore::connect("sqlite::memory:").await?;
        let pipeline = SyncPipeline::from_config(config, remote.clone(), store).await?;

        Ok(Self {
            remote_dir,
            local_root,
            remote,
            pipeline,
        })
    }

    pub fn root(&self) -> &Path {
        self.local_root.path()
    }

    /// Sorted file names in a stage directory
    pub fn stage_files(&self, dir_name: &str) -> anyhow::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(self.root().join(dir_name))? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    /// Non-blank lines of a ledger file
    pub fn ledger_lines(&self, file_name: &str) -> anyhow::Result<Vec<String>> {
        let content = std::fs::read_to_string(self.root().join(file_name))?;
        Ok(content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// An iHerb manifest with one row per `(barcode, order code)` pair
pub fn iherb_manifest(separator: char, rows: &[(&str, &str)]) -> String {
    let header = ["Company name", "barcode", "PriceCurrency", "LogisticsOrderCode"];
    let mut body = header.join(&separator.to_string());
    body.push('\n');
    for (barcode, order_code) in rows {
        let fields = ["iHerb", barcode, "USD", order_code];
        body.push_str(&fields.join(&separator.to_string()));
        body.push('\n');
    }
    body
}
