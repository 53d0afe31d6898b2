//! Content classification
//!
//! Every manifest in the downloaded stage is hashed. New content goes to the
//! changed stage and its hash is recorded; content seen before is a
//! duplicate upload and goes to the renamed sink. Either move is named
//! `<stem>_<HASH>.csv`.

use crate::error::{PipelineError, StageError};
use crate::ingest::ledger::Ledger;
use crate::ingest::models::{ContentHash, Stage};
use crate::ingest::stages::{file_name_of, hashed_name, MoveOutcome, StageManager};
use msync_common::checksum::compute_file_md5_upper;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// What happened to one downloaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClassifyOutcome {
    /// New content, now eligible for remap
    Changed { path: PathBuf, hash: String },
    /// Known content, moved to the renamed sink
    Renamed { path: PathBuf, hash: String },
    /// Target already existed; the source was deleted
    Discarded { hash: String },
    Failed { reason: String },
}

/// Per-file results of one classification pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassifyReport {
    pub files: Vec<(String, ClassifyOutcome)>,
}

impl ClassifyReport {
    fn count(&self, pred: impl Fn(&ClassifyOutcome) -> bool) -> usize {
        self.files.iter().filter(|(_, o)| pred(o)).count()
    }

    pub fn changed(&self) -> usize {
        self.count(|o| matches!(o, ClassifyOutcome::Changed { .. }))
    }

    pub fn renamed(&self) -> usize {
        self.count(|o| matches!(o, ClassifyOutcome::Renamed { .. }))
    }

    pub fn discarded(&self) -> usize {
        self.count(|o| matches!(o, ClassifyOutcome::Discarded { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ClassifyOutcome::Failed { .. }))
    }
}

pub struct Classifier;

impl Classifier {
    /// Classify every manifest currently in the downloaded stage
    pub fn classify(
        stages: &StageManager,
        ledger: &mut dyn Ledger,
    ) -> Result<ClassifyReport, PipelineError> {
        let listing = stages
            .eligible_files(Stage::Downloaded)
            .map_err(PipelineError::Directories)?;

        let mut report = ClassifyReport::default();
        for file in &listing {
            let Some(name) = file_name_of(file) else {
                continue;
            };
            let outcome = Self::classify_file(stages, ledger, file, name)?;
            report.files.push((name.to_string(), outcome));
        }

        Ok(report)
    }

    fn classify_file(
        stages: &StageManager,
        ledger: &mut dyn Ledger,
        file: &Path,
        name: &str,
    ) -> Result<ClassifyOutcome, PipelineError> {
        let hash = match compute_file_md5_upper(file) {
            Ok(hex) => ContentHash::new(hex),
            Err(e) => {
                error!(file = %file.display(), error = %e, "Failed to hash file");
                return Ok(ClassifyOutcome::Failed {
                    reason: e.to_string(),
                });
            },
        };
        let new_name = hashed_name(name, hash.as_str());

        if ledger.contains(hash.as_str()) {
            return Ok(match stages.move_or_discard(file, Stage::Renamed, &new_name) {
                Ok(MoveOutcome::Moved(path)) => {
                    info!(file = %name, hash = %hash, "File renamed");
                    ClassifyOutcome::Renamed {
                        path,
                        hash: hash.to_string(),
                    }
                },
                Ok(MoveOutcome::Discarded(_)) => ClassifyOutcome::Discarded {
                    hash: hash.to_string(),
                },
                Err(e) => move_failed(name, e),
            });
        }

        // Hash is durable before the file becomes remap-eligible
        ledger
            .record(hash.as_str())
            .map_err(|source| PipelineError::Record {
                token: hash.to_string(),
                source,
            })?;

        Ok(match stages.move_or_discard(file, Stage::Changed, &new_name) {
            Ok(MoveOutcome::Moved(path)) => {
                info!(file = %name, hash = %hash, "File changed");
                ClassifyOutcome::Changed {
                    path,
                    hash: hash.to_string(),
                }
            },
            Ok(MoveOutcome::Discarded(_)) => ClassifyOutcome::Discarded {
                hash: hash.to_string(),
            },
            Err(source) => {
                error!(
                    file = %name,
                    hash = %hash,
                    error = %source,
                    "Hash recorded but file not moved to changed; content needs manual requeue"
                );
                return Err(PipelineError::Unclassified {
                    file: file.to_path_buf(),
                    hash: hash.to_string(),
                    source,
                });
            },
        })
    }
}

fn move_failed(name: &str, e: StageError) -> ClassifyOutcome {
    error!(file = %name, error = %e, "Failed to move file");
    ClassifyOutcome::Failed {
        reason: e.to_string(),
    }
}
