//! Fetch controller
//!
//! Lists the remote directory and fetches every manifest whose identity is
//! not yet in the ingestion ledger. An identity is recorded only once its
//! file is fully on local disk, so a failed fetch is retried next run.

use crate::error::{PipelineError, TransportError};
use crate::ingest::common::sftp::RemoteSource;
use crate::ingest::ledger::{check_token, Ledger};
use crate::ingest::models::{is_manifest_name, RemoteItem};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// What happened to one remote item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FetchOutcome {
    Downloaded { path: PathBuf },
    /// Identity already recorded
    Skipped,
    /// The remote refused the item; retried next run
    Unavailable { reason: String },
    Failed { reason: String },
}

/// Per-item results of one ingest pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// Set when the remote directory could not be listed at all
    pub listing_error: Option<String>,
    pub items: Vec<(String, FetchOutcome)>,
}

impl IngestReport {
    fn count(&self, pred: impl Fn(&FetchOutcome) -> bool) -> usize {
        self.items.iter().filter(|(_, o)| pred(o)).count()
    }

    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, FetchOutcome::Downloaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FetchOutcome::Skipped))
    }

    pub fn unavailable(&self) -> usize {
        self.count(|o| matches!(o, FetchOutcome::Unavailable { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FetchOutcome::Failed { .. }))
    }
}

/// Drives the ingest step of a run
pub struct FetchController;

impl FetchController {
    /// Fetch every unseen manifest from `remote_dir` into `downloaded_dir`
    ///
    /// Transport failures are per item and never abort the pass. A ledger
    /// write failure does, since the fetch it belongs to cannot be committed.
    pub async fn ingest(
        remote: &dyn RemoteSource,
        ledger: &mut dyn Ledger,
        downloaded_dir: &Path,
        remote_dir: &str,
    ) -> Result<IngestReport, PipelineError> {
        let mut report = IngestReport::default();

        let listing = match remote.list(remote_dir).await {
            Ok(listing) => listing,
            Err(e) => {
                error!(remote_dir, error = %e, "Failed to list remote directory");
                report.listing_error = Some(e.to_string());
                return Ok(report);
            },
        };

        let manifests: Vec<RemoteItem> = listing
            .into_iter()
            .filter(|item| is_manifest_name(&item.name))
            .collect();
        info!(remote_dir, count = manifests.len(), "Listed remote manifests");

        for item in manifests {
            let outcome = Self::ingest_item(remote, ledger, downloaded_dir, &item).await?;
            report.items.push((item.name, outcome));
        }

        Ok(report)
    }

    async fn ingest_item(
        remote: &dyn RemoteSource,
        ledger: &mut dyn Ledger,
        downloaded_dir: &Path,
        item: &RemoteItem,
    ) -> Result<FetchOutcome, PipelineError> {
        let identity = item.identity_key();

        if ledger.contains(identity.as_str()) {
            info!(identity = %identity, "File skipped");
            return Ok(FetchOutcome::Skipped);
        }

        // An identity that cannot be recorded would be fetched forever
        if let Err(e) = check_token(identity.as_str()) {
            error!(identity = ?identity.as_str(), error = %e, "Remote name cannot be recorded, not fetching");
            return Ok(FetchOutcome::Failed {
                reason: format!("{:?}: {}", item.name, e),
            });
        }

        match remote.fetch(item, downloaded_dir).await {
            Ok(path) => {
                ledger
                    .record(identity.as_str())
                    .map_err(|source| PipelineError::Record {
                        token: identity.to_string(),
                        source,
                    })?;
                info!(identity = %identity, file = %path.display(), "File downloaded");
                Ok(FetchOutcome::Downloaded { path })
            },
            Err(e @ TransportError::Unavailable(_)) => {
                warn!(identity = %identity, error = %e, "File not available, will retry next run");
                Ok(FetchOutcome::Unavailable {
                    reason: e.to_string(),
                })
            },
            Err(e) => {
                error!(identity = %identity, error = %e, "Failed to fetch file");
                Ok(FetchOutcome::Failed {
                    reason: e.to_string(),
                })
            },
        }
    }
}
