//! Durable append-only ledgers
//!
//! A ledger is a set of opaque tokens that only grows. The file form keeps
//! one token per line, byte for byte; the whole file is read into memory
//! when opened and every new token is appended and synced before `record`
//! returns, so a recorded token survives a crash that happens right after.

use crate::error::PipelineError;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Ingestion ledger file name (remote identity keys)
pub const ATTRIBUTES_LEDGER: &str = "attributes.txt";

/// Content dedup ledger file name (content hashes)
pub const CHECKSUMS_LEDGER: &str = "checksums.txt";

/// Membership test plus durable insert
pub trait Ledger: Send {
    fn contains(&self, token: &str) -> bool;

    /// Record a token. Returns `false` if it was already present.
    fn record(&mut self, token: &str) -> std::io::Result<bool>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Newline-delimited ledger file
#[derive(Debug)]
pub struct FileLedger {
    path: PathBuf,
    entries: HashSet<String>,
    file: File,
}

impl FileLedger {
    /// Open a ledger, creating the file if absent
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).read(true).open(&path)?;

        let mut entries = HashSet::new();
        for line in BufReader::new(&file).lines() {
            let line = line?;
            let token = line.strip_suffix('\r').unwrap_or(&line);
            if !token.trim().is_empty() {
                entries.insert(token.to_string());
            }
        }

        debug!(ledger = %path.display(), entries = entries.len(), "Loaded ledger");

        Ok(Self {
            path,
            entries,
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Ledger for FileLedger {
    fn contains(&self, token: &str) -> bool {
        self.entries.contains(token)
    }

    fn record(&mut self, token: &str) -> std::io::Result<bool> {
        check_token(token)?;
        if self.entries.contains(token) {
            return Ok(false);
        }

        self.file.write_all(format!("{}\n", token).as_bytes())?;
        self.file.flush()?;
        self.file.sync_data()?;

        self.entries.insert(token.to_string());
        Ok(true)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Whether `token` survives a write and reload unchanged
///
/// Tokens are stored verbatim, one per line, and blank lines are skipped
/// on load, so line breaks and all-whitespace tokens cannot be stored.
pub fn check_token(token: &str) -> std::io::Result<()> {
    if token.trim().is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "ledger tokens cannot be blank",
        ));
    }
    if token.contains(['\n', '\r']) {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "ledger tokens cannot contain line breaks",
        ));
    }
    Ok(())
}

/// The two ledgers kept under the local root
#[derive(Debug)]
pub struct Ledgers {
    /// Remote identities already fetched
    pub attributes: FileLedger,
    /// Content hashes already classified as changed
    pub checksums: FileLedger,
}

impl Ledgers {
    pub fn open(root: &Path) -> Result<Self, PipelineError> {
        Ok(Self {
            attributes: open_ledger(root.join(ATTRIBUTES_LEDGER))?,
            checksums: open_ledger(root.join(CHECKSUMS_LEDGER))?,
        })
    }
}

fn open_ledger(path: PathBuf) -> Result<FileLedger, PipelineError> {
    FileLedger::open(&path).map_err(|source| PipelineError::Ledger { path, source })
}
