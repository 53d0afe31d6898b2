//! Schema remap
//!
//! Each manifest in the changed stage is parsed into source rows, loaded
//! into the staging store, pushed through the externally supplied transform
//! statement, and the resulting canonical rows are written as a new
//! `um_<stem>_<timestamp>.csv` artifact in the created stage. The source
//! file then moves to the remapped stage.
//!
//! Files are independent: a failure is logged, the file stays in the
//! changed stage for the next run, and the remaining files still run. The
//! staging tables are cleared before every load, so rows left behind by a
//! failed file never leak into the next one.

pub mod codec;
pub mod models;
pub mod staging;

pub use models::{IherbManifestEntry, StagedRecord, UniversalManifestEntry};
pub use staging::StagingStore;

use crate::error::{PipelineError, RemapError};
use crate::ingest::models::{Stage, MANIFEST_EXTENSION};
use crate::ingest::stages::{file_name_of, MoveOutcome, StageManager};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Timestamp format for created artifacts. No `:` so the name is portable.
const ARTIFACT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";

/// What happened to one changed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RemapOutcome {
    Remapped { created: PathBuf, rows: usize },
    /// Artifact written, but the source already existed in the remapped
    /// stage and was deleted instead of moved
    Discarded { created: PathBuf, rows: usize },
    Failed { reason: String },
}

/// Per-file results of one remap pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct RemapReport {
    pub files: Vec<(String, RemapOutcome)>,
}

impl RemapReport {
    pub fn remapped(&self) -> usize {
        self.files
            .iter()
            .filter(|(_, o)| matches!(o, RemapOutcome::Remapped { .. }))
            .count()
    }

    pub fn discarded(&self) -> usize {
        self.files
            .iter()
            .filter(|(_, o)| matches!(o, RemapOutcome::Discarded { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.files
            .iter()
            .filter(|(_, o)| matches!(o, RemapOutcome::Failed { .. }))
            .count()
    }

    /// Canonical rows written across all artifacts
    pub fn rows_written(&self) -> usize {
        self.files
            .iter()
            .map(|(_, o)| match o {
                RemapOutcome::Remapped { rows, .. } | RemapOutcome::Discarded { rows, .. } => *rows,
                RemapOutcome::Failed { .. } => 0,
            })
            .sum()
    }
}

/// Drives the remap step of a run
pub struct RemapOrchestrator {
    store: StagingStore,
    transform_sql: String,
    delimiter: u8,
}

impl RemapOrchestrator {
    pub fn new(store: StagingStore, transform_sql: impl Into<String>, delimiter: u8) -> Self {
        Self {
            store,
            transform_sql: transform_sql.into(),
            delimiter,
        }
    }

    pub fn store(&self) -> &StagingStore {
        &self.store
    }

    /// Remap every manifest currently in the changed stage
    pub async fn remap_all(&self, stages: &StageManager) -> Result<RemapReport, PipelineError> {
        let listing = stages
            .eligible_files(Stage::Changed)
            .map_err(PipelineError::Directories)?;

        let mut report = RemapReport::default();
        for file in &listing {
            let Some(name) = file_name_of(file) else {
                continue;
            };

            let outcome = match self.remap_file(stages, file, name).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(file = %name, error = %e, "Failed to remap file");
                    RemapOutcome::Failed {
                        reason: e.to_string(),
                    }
                },
            };
            report.files.push((name.to_string(), outcome));
        }

        Ok(report)
    }

    async fn remap_file(
        &self,
        stages: &StageManager,
        file: &Path,
        name: &str,
    ) -> Result<RemapOutcome, RemapError> {
        self.store.clear().await?;

        let entries = codec::read_manifest_entries(file, self.delimiter)?;
        self.store.load_manifest_entries(&entries).await?;
        self.store.apply_transform(&self.transform_sql).await?;
        let rows = self.store.universal_entries().await?;

        let created = stages
            .stage_dir(Stage::Created)
            .join(artifact_name(name, Local::now()));
        self.write_artifact(&created, &rows)?;
        info!(file = %name, created = %created.display(), rows = rows.len(), "File created");

        self.store.clear().await?;

        let rows = rows.len();
        match stages.move_or_discard(file, Stage::Remapped, name)? {
            MoveOutcome::Moved(_) => {
                info!(file = %name, source_rows = entries.len(), "File remapped");
                Ok(RemapOutcome::Remapped { created, rows })
            },
            MoveOutcome::Discarded(_) => Ok(RemapOutcome::Discarded { created, rows }),
        }
    }

    /// Write rows to a file that must not exist yet
    fn write_artifact(&self, path: &Path, rows: &[UniversalManifestEntry]) -> Result<(), RemapError> {
        let file = OpenOptions::new().write(true).create_new(true).open(path)?;

        if let Err(e) = codec::write_universal_entries(BufWriter::new(file), rows, self.delimiter) {
            if let Err(cleanup) = std::fs::remove_file(path) {
                error!(file = %path.display(), error = %cleanup, "Failed to remove partial artifact");
            }
            return Err(e);
        }
        Ok(())
    }
}

/// `um_<stem>_<timestamp>.csv`
pub fn artifact_name(source_name: &str, at: DateTime<Local>) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source_name);
    format!(
        "um_{}_{}.{}",
        stem,
        at.format(ARTIFACT_TIMESTAMP_FORMAT),
        MANIFEST_EXTENSION
    )
}
