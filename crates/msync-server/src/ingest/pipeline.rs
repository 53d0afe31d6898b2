//! One full sync run
//!
//! ensure directories → ingest → classify → remap → export (not
//! implemented). Per-item and per-file failures are folded into the
//! returned [`RunSummary`]; only failures that make the rest of the run
//! meaningless surface as a [`PipelineError`]. Whatever was committed before
//! such a failure (moved files, ledger lines) stays, and the next run
//! resumes from it.

use crate::error::PipelineError;
use crate::ingest::classify::{ClassifyOutcome, ClassifyReport, Classifier};
use crate::ingest::common::sftp::RemoteSource;
use crate::ingest::config::IngestConfig;
use crate::ingest::fetch::{FetchController, FetchOutcome, IngestReport};
use crate::ingest::ledger::Ledgers;
use crate::ingest::models::Stage;
use crate::ingest::remap::{RemapOrchestrator, RemapOutcome, RemapReport, StagingStore};
use crate::ingest::stages::StageManager;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// Final state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Ran to the end. Individual items may still have failed.
    Completed,
    /// Ended early
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchCounts {
    pub downloaded: usize,
    pub skipped: usize,
    pub unavailable: usize,
    pub failed: usize,
}

impl From<&IngestReport> for FetchCounts {
    fn from(report: &IngestReport) -> Self {
        Self {
            downloaded: report.downloaded(),
            skipped: report.skipped(),
            unavailable: report.unavailable(),
            failed: report.failed(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyCounts {
    pub changed: usize,
    pub renamed: usize,
    pub discarded: usize,
    pub failed: usize,
}

impl From<&ClassifyReport> for ClassifyCounts {
    fn from(report: &ClassifyReport) -> Self {
        Self {
            changed: report.changed(),
            renamed: report.renamed(),
            discarded: report.discarded(),
            failed: report.failed(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemapCounts {
    pub remapped: usize,
    pub discarded: usize,
    pub failed: usize,
    pub rows_written: usize,
}

impl From<&RemapReport> for RemapCounts {
    fn from(report: &RemapReport) -> Self {
        Self {
            remapped: report.remapped(),
            discarded: report.discarded(),
            failed: report.failed(),
            rows_written: report.rows_written(),
        }
    }
}

/// Aggregated, serializable result of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub fetch: FetchCounts,
    pub classify: ClassifyCounts,
    pub remap: RemapCounts,
    /// Set when the remote directory could not be listed
    pub listing_error: Option<String>,
    /// One line per failed item or file, or the run-ending error
    pub errors: Vec<String>,
}

impl RunSummary {
    /// Summary for a run that ended early
    pub fn failed(run_id: Uuid, started_at: DateTime<Utc>, error: impl ToString) -> Self {
        Self {
            run_id,
            status: RunStatus::Failed,
            started_at,
            finished_at: Utc::now(),
            fetch: FetchCounts::default(),
            classify: ClassifyCounts::default(),
            remap: RemapCounts::default(),
            listing_error: None,
            errors: vec![error.to_string()],
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == RunStatus::Failed
    }

    /// No fetches, no stage moves, nothing written
    pub fn is_idle(&self) -> bool {
        self.fetch.downloaded == 0
            && self.classify == ClassifyCounts::default()
            && self.remap == RemapCounts::default()
    }
}

/// Wires the stage steps for one local root
pub struct SyncPipeline {
    config: IngestConfig,
    remote: Arc<dyn RemoteSource>,
    stages: StageManager,
    remap: RemapOrchestrator,
}

impl SyncPipeline {
    /// Build a pipeline with the transform statement already in hand
    pub fn new(
        config: IngestConfig,
        remote: Arc<dyn RemoteSource>,
        store: StagingStore,
        transform_sql: impl Into<String>,
    ) -> Self {
        let stages = StageManager::new(&config.local_files_dir_path);
        let remap = RemapOrchestrator::new(store, transform_sql, config.csv_separator);
        Self {
            config,
            remote,
            stages,
            remap,
        }
    }

    /// Build a pipeline, reading the transform statement from
    /// `remap_query_file_path` and creating the staging schema
    pub async fn from_config(
        config: IngestConfig,
        remote: Arc<dyn RemoteSource>,
        store: StagingStore,
    ) -> Result<Self, PipelineError> {
        let path = config.remap_query_file_path.clone();
        let transform_sql = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| PipelineError::RemapQuery { path, source })?;

        store.init_schema().await?;
        info!(
            remap_query = %config.remap_query_file_path.display(),
            "Loaded remap query"
        );

        Ok(Self::new(config, remote, store, transform_sql))
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn stages(&self) -> &StageManager {
        &self.stages
    }

    /// Run once under a fresh run id
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        self.run_with_id(Uuid::new_v4()).await
    }

    /// Run once under the given run id
    pub async fn run_with_id(&self, run_id: Uuid) -> Result<RunSummary, PipelineError> {
        let span = tracing::info_span!("sync_run", %run_id);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid) -> Result<RunSummary, PipelineError> {
        let started_at = Utc::now();
        info!("Sync run start...");

        self.stages
            .ensure_directories()
            .map_err(PipelineError::Directories)?;
        let mut ledgers = Ledgers::open(self.stages.root())?;

        let ingest = FetchController::ingest(
            self.remote.as_ref(),
            &mut ledgers.attributes,
            &self.stages.stage_dir(Stage::Downloaded),
            &self.config.remote_files_dir_path,
        )
        .await?;

        let classify = Classifier::classify(&self.stages, &mut ledgers.checksums)?;
        let remap = self.remap.remap_all(&self.stages).await?;

        info!("Export to remote is not implemented, skipping");

        let mut errors = Vec::new();
        for (name, outcome) in &ingest.items {
            if let FetchOutcome::Unavailable { reason } | FetchOutcome::Failed { reason } = outcome {
                errors.push(format!("{}: {}", name, reason));
            }
        }
        for (name, outcome) in &classify.files {
            if let ClassifyOutcome::Failed { reason } = outcome {
                errors.push(format!("{}: {}", name, reason));
            }
        }
        for (name, outcome) in &remap.files {
            if let RemapOutcome::Failed { reason } = outcome {
                errors.push(format!("{}: {}", name, reason));
            }
        }

        let summary = RunSummary {
            run_id,
            status: RunStatus::Completed,
            started_at,
            finished_at: Utc::now(),
            fetch: FetchCounts::from(&ingest),
            classify: ClassifyCounts::from(&classify),
            remap: RemapCounts::from(&remap),
            listing_error: ingest.listing_error.clone(),
            errors,
        };

        if summary.errors.is_empty() && summary.listing_error.is_none() {
            info!(
                downloaded = summary.fetch.downloaded,
                skipped = summary.fetch.skipped,
                changed = summary.classify.changed,
                renamed = summary.classify.renamed,
                remapped = summary.remap.remapped,
                "Sync run end"
            );
        } else {
            warn!(
                downloaded = summary.fetch.downloaded,
                changed = summary.classify.changed,
                remapped = summary.remap.remapped,
                errors = summary.errors.len(),
                listing_failed = summary.listing_error.is_some(),
                "Sync run end with errors"
            );
        }

        Ok(summary)
    }
}
