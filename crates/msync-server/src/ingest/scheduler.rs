//! Run scheduling
//!
//! [`RunCoordinator`] enforces that at most one run touches the local root
//! at a time. A trigger that arrives while a run is active is rejected, not
//! queued. [`SyncScheduler`] fires the coordinator at a fixed rate.

use crate::error::PipelineError;
use crate::ingest::pipeline::{RunSummary, SyncPipeline};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Why a run was not started
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunRejected {
    #[error("A sync run is already in progress")]
    AlreadyRunning,
}

/// A started run
pub struct RunHandle {
    pub run_id: Uuid,
    handle: JoinHandle<RunSummary>,
}

impl RunHandle {
    /// Wait for the run to finish
    pub async fn wait(self) -> RunSummary {
        let run_id = self.run_id;
        match self.handle.await {
            Ok(summary) => summary,
            Err(e) => RunSummary::failed(run_id, Utc::now(), PipelineError::Task(e.to_string())),
        }
    }
}

/// Single-flight owner of the pipeline
pub struct RunCoordinator {
    pipeline: Arc<SyncPipeline>,
    guard: Arc<Mutex<()>>,
    last: Arc<RwLock<Option<RunSummary>>>,
}

impl RunCoordinator {
    pub fn new(pipeline: Arc<SyncPipeline>) -> Self {
        Self {
            pipeline,
            guard: Arc::new(Mutex::new(())),
            last: Arc::new(RwLock::new(None)),
        }
    }

    /// Start a run unless one is already active
    ///
    /// The spawned task holds the guard until the run's summary is stored.
    /// A failed or panicked run is recorded as a failed summary; it never
    /// propagates further.
    pub fn try_start(&self) -> Result<RunHandle, RunRejected> {
        let permit = self
            .guard
            .clone()
            .try_lock_owned()
            .map_err(|_| RunRejected::AlreadyRunning)?;

        let run_id = Uuid::new_v4();
        let pipeline = self.pipeline.clone();
        let last = self.last.clone();

        let handle = tokio::spawn(async move {
            let started_at = Utc::now();
            let run = tokio::spawn(async move { pipeline.run_with_id(run_id).await });

            let summary = match run.await {
                Ok(Ok(summary)) => summary,
                Ok(Err(e)) => {
                    error!(%run_id, error = %e, "Sync run failed");
                    RunSummary::failed(run_id, started_at, e)
                },
                Err(e) => {
                    error!(%run_id, error = %e, "Sync run task panicked");
                    RunSummary::failed(run_id, started_at, PipelineError::Task(e.to_string()))
                },
            };

            *last.write().await = Some(summary.clone());
            drop(permit);
            summary
        });

        Ok(RunHandle { run_id, handle })
    }

    pub fn is_running(&self) -> bool {
        self.guard.try_lock().is_err()
    }

    /// Summary of the most recently finished run
    pub async fn last_summary(&self) -> Option<RunSummary> {
        self.last.read().await.clone()
    }
}

/// Fixed-rate trigger
pub struct SyncScheduler {
    coordinator: Arc<RunCoordinator>,
    period: Duration,
}

impl SyncScheduler {
    pub fn new(coordinator: Arc<RunCoordinator>, period: Duration) -> Self {
        Self {
            coordinator,
            period,
        }
    }

    /// Start ticking. The first run starts immediately.
    pub fn start(self) -> JoinHandle<()> {
        info!(period_secs = self.period.as_secs(), "Starting sync scheduler");

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                match self.coordinator.try_start() {
                    Ok(handle) => info!(run_id = %handle.run_id, "Scheduled sync run started"),
                    Err(e) => warn!("Skipping scheduled run: {}", e),
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::ingest::common::sftp::RemoteSource;
    use crate::ingest::config::IngestConfig;
    use crate::ingest::models::RemoteItem;
    use crate::ingest::pipeline::RunStatus;
    use crate::ingest::remap::StagingStore;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;
    use tokio::sync::Notify;

    /// Listing blocks until released
    struct GatedRemote {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl RemoteSource for GatedRemote {
        async fn list(&self, _dir: &str) -> Result<Vec<RemoteItem>, TransportError> {
            self.gate.notified().await;
            Ok(Vec::new())
        }

        async fn fetch(&self, item: &RemoteItem, _local_dir: &Path) -> Result<PathBuf, TransportError> {
            Err(TransportError::Unavailable(item.name.clone()))
        }
    }

    /// Listing panics
    struct PanickingRemote;

    #[async_trait]
    impl RemoteSource for PanickingRemote {
        async fn list(&self, _dir: &str) -> Result<Vec<RemoteItem>, TransportError> {
            panic!("listing blew up");
        }

        async fn fetch(&self, item: &RemoteItem, _local_dir: &Path) -> Result<PathBuf, TransportError> {
            Err(TransportError::Unavailable(item.name.clone()))
        }
    }

    async fn coordinator_with(root: &Path, remote: Arc<dyn RemoteSource>) -> RunCoordinator {
        let config = IngestConfig {
            local_files_dir_path: root.to_path_buf(),
            ..Default::default()
        };
        let store = StagingStore::connect("sqlite::memory:").await.unwrap();
        store.init_schema().await.unwrap();
        let pipeline = SyncPipeline::new(config, remote, store, "SELECT 1;");
        RunCoordinator::new(Arc::new(pipeline))
    }

    async fn coordinator(root: &Path, gate: Arc<Notify>) -> RunCoordinator {
        coordinator_with(root, Arc::new(GatedRemote { gate })).await
    }

    #[tokio::test]
    async fn test_overlapping_start_is_rejected() {
        let dir = TempDir::new().unwrap();
        let gate = Arc::new(Notify::new());
        let coordinator = coordinator(dir.path(), gate.clone()).await;

        let first = coordinator.try_start().unwrap();
        let first_id = first.run_id;
        assert!(coordinator.is_running());
        assert_eq!(coordinator.try_start().err(), Some(RunRejected::AlreadyRunning));

        gate.notify_one();
        let summary = first.wait().await;

        assert_eq!(summary.status, RunStatus::Completed);
        assert!(!coordinator.is_running());
        assert_eq!(summary.run_id, first_id);
        assert_eq!(coordinator.last_summary().await.unwrap().run_id, first_id);

        // Guard released, a new run may start
        gate.notify_one();
        let second = coordinator.try_start().unwrap();
        assert_ne!(second.run_id, first_id);
        second.wait().await;
    }

    #[tokio::test]
    async fn test_failed_run_is_recorded() {
        let dir = TempDir::new().unwrap();
        // A file where the root directory should be
        let root = dir.path().join("root");
        std::fs::write(&root, "not a directory").unwrap();
        let coordinator = coordinator(&root, Arc::new(Notify::new())).await;

        let summary = coordinator.try_start().unwrap().wait().await;

        assert!(summary.is_failed());
        assert!(!summary.errors.is_empty());
        assert!(coordinator.last_summary().await.unwrap().is_failed());
        assert!(!coordinator.is_running());
    }

    #[tokio::test]
    async fn test_panicking_run_is_recorded_and_releases_guard() {
        let dir = TempDir::new().unwrap();
        let coordinator = coordinator_with(dir.path(), Arc::new(PanickingRemote)).await;

        let summary = coordinator.try_start().unwrap().wait().await;

        assert!(summary.is_failed());
        assert!(!summary.errors.is_empty());
        assert!(coordinator.last_summary().await.unwrap().is_failed());
        assert!(!coordinator.is_running());

        // The coordinator survives and accepts the next trigger
        let next = coordinator.try_start().unwrap();
        assert!(next.wait().await.is_failed());
    }

    #[tokio::test]
    async fn test_no_summary_before_first_run() {
        let dir = TempDir::new().unwrap();
        let coordinator = coordinator(dir.path(), Arc::new(Notify::new())).await;
        assert!(coordinator.last_summary().await.is_none());
    }
}
