//! Core ingestion types: remote items, ledger tokens and pipeline stages

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// File extension that marks a manifest
pub const MANIFEST_EXTENSION: &str = "csv";

/// Whether a file name carries the manifest extension
pub fn is_manifest_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == MANIFEST_EXTENSION)
}

/// One entry of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    pub name: String,
    pub remote_path: String,
    /// Modification time in seconds since the epoch, as reported by the remote
    pub modify_time: u64,
}

impl RemoteItem {
    pub fn new(name: impl Into<String>, remote_path: impl Into<String>, modify_time: u64) -> Self {
        Self {
            name: name.into(),
            remote_path: remote_path.into(),
            modify_time,
        }
    }

    /// Ledger key identifying this item independent of its content
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey(format!("{}_{}", self.name, self.modify_time))
    }
}

/// `name_modifytime` token recorded in the ingestion ledger
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Uppercase hex MD5 of a file's full content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(String);

impl ContentHash {
    /// Wrap a hex digest, normalizing it to uppercase
    pub fn new(hex: impl AsRef<str>) -> Self {
        Self(hex.as_ref().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pipeline stage. Each stage is one directory under the local root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Downloaded,
    Changed,
    Renamed,
    Remapped,
    Created,
    Exported,
}

impl Stage {
    /// All stages in directory order
    pub const ALL: [Stage; 6] = [
        Stage::Downloaded,
        Stage::Changed,
        Stage::Renamed,
        Stage::Remapped,
        Stage::Created,
        Stage::Exported,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            Stage::Downloaded => "01_downloaded",
            Stage::Changed => "02_changed",
            Stage::Renamed => "03_renamed",
            Stage::Remapped => "04_remapped",
            Stage::Created => "05_created",
            Stage::Exported => "06_exported",
        }
    }

    /// Files in a terminal stage never move again
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Renamed | Stage::Remapped | Stage::Exported)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}
