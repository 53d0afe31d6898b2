//! Stage directory state machine
//!
//! `StageManager` is the only component that changes where a file lives.
//! Every transition is a rename inside the local root and never overwrites
//! an existing destination.

use crate::error::StageError;
use crate::ingest::models::{is_manifest_name, Stage, MANIFEST_EXTENSION};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Result of a move that tolerates collisions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The file now lives at this path
    Moved(PathBuf),
    /// The destination already existed; the source was deleted
    Discarded(PathBuf),
}

/// Snapshot of the manifests sitting in one stage directory
///
/// Taken once, sorted by file name, and independent of later moves, so
/// callers may iterate it more than once while mutating the directory.
#[derive(Debug, Clone, Default)]
pub struct StageListing {
    stage: Option<Stage>,
    files: Vec<PathBuf>,
}

impl StageListing {
    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.files.iter()
    }
}

impl<'a> IntoIterator for &'a StageListing {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

/// Owns the stage directories under one local root
#[derive(Debug, Clone)]
pub struct StageManager {
    root: PathBuf,
}

impl StageManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stage_dir(&self, stage: Stage) -> PathBuf {
        self.root.join(stage.dir_name())
    }

    /// Create the root and every stage directory. Safe to call repeatedly.
    pub fn ensure_directories(&self) -> Result<(), StageError> {
        for stage in Stage::ALL {
            let dir = self.stage_dir(stage);
            std::fs::create_dir_all(&dir).map_err(|source| StageError::Io {
                path: dir.clone(),
                source,
            })?;
        }
        debug!(root = %self.root.display(), "Stage directories ready");
        Ok(())
    }

    /// List the regular manifest files currently in a stage
    pub fn eligible_files(&self, stage: Stage) -> Result<StageListing, StageError> {
        let dir = self.stage_dir(stage);
        let io_err = |source: std::io::Error| StageError::Io {
            path: dir.clone(),
            source,
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            if !entry.file_type().map_err(io_err)?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if name.to_str().is_some_and(is_manifest_name) {
                files.push(entry.path());
            }
        }
        files.sort();

        Ok(StageListing {
            stage: Some(stage),
            files,
        })
    }

    /// Rename `file` into `stage` as `new_name`
    ///
    /// Fails with [`StageError::AlreadyExists`] instead of replacing an
    /// existing destination.
    pub fn move_to(&self, file: &Path, stage: Stage, new_name: &str) -> Result<PathBuf, StageError> {
        let target = self.stage_dir(stage).join(new_name);

        match target.try_exists() {
            Ok(true) => return Err(StageError::AlreadyExists { path: target }),
            Ok(false) => {},
            Err(source) => return Err(StageError::Io { path: target, source }),
        }

        std::fs::rename(file, &target).map_err(|source| StageError::Io {
            path: file.to_path_buf(),
            source,
        })?;

        debug!(file = %file.display(), target = %target.display(), stage = %stage, "Moved");
        Ok(target)
    }

    /// Like [`move_to`](Self::move_to), but deletes the source on collision
    pub fn move_or_discard(
        &self,
        file: &Path,
        stage: Stage,
        new_name: &str,
    ) -> Result<MoveOutcome, StageError> {
        match self.move_to(file, stage, new_name) {
            Ok(target) => Ok(MoveOutcome::Moved(target)),
            Err(StageError::AlreadyExists { path }) => {
                std::fs::remove_file(file).map_err(|source| StageError::Io {
                    path: file.to_path_buf(),
                    source,
                })?;
                info!(file = %file.display(), target = %path.display(), stage = %stage, "File already exists");
                Ok(MoveOutcome::Discarded(path))
            },
            Err(e) => Err(e),
        }
    }
}

/// `<stem>_<HASH>.csv` for a manifest file name
pub fn hashed_name(file_name: &str, hash: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    format!("{}_{}.{}", stem, hash, MANIFEST_EXTENSION)
}

/// File name component of a path as UTF-8, if any
pub fn file_name_of(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager() -> (TempDir, StageManager) {
        let dir = TempDir::new().unwrap();
        let stages = StageManager::new(dir.path());
        stages.ensure_directories().unwrap();
        (dir, stages)
    }

    #[test]
    fn test_ensure_directories_is_idempotent() {
        let (dir, stages) = manager();
        stages.ensure_directories().unwrap();
        for stage in Stage::ALL {
            assert!(dir.path().join(stage.dir_name()).is_dir());
        }
    }

    #[test]
    fn test_eligible_files_filters_and_sorts() {
        let (_dir, stages) = manager();
        let downloaded = stages.stage_dir(Stage::Downloaded);
        std::fs::write(downloaded.join("b.csv"), "x").unwrap();
        std::fs::write(downloaded.join("a.csv"), "x").unwrap();
        std::fs::write(downloaded.join("notes.txt"), "x").unwrap();
        std::fs::write(downloaded.join(".c.csv.part"), "x").unwrap();
        std::fs::create_dir(downloaded.join("nested.csv")).unwrap();

        let listing = stages.eligible_files(Stage::Downloaded).unwrap();
        let names: Vec<_> = listing.iter().map(|p| file_name_of(p).unwrap()).collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
        assert_eq!(listing.stage(), Some(Stage::Downloaded));
    }

    #[test]
    fn test_listing_is_a_snapshot() {
        let (_dir, stages) = manager();
        let downloaded = stages.stage_dir(Stage::Downloaded);
        std::fs::write(downloaded.join("a.csv"), "x").unwrap();

        let listing = stages.eligible_files(Stage::Downloaded).unwrap();
        for file in &listing {
            stages.move_to(file, Stage::Changed, "a.csv").unwrap();
        }
        // Still iterable after the directory changed underneath it
        assert_eq!(listing.iter().count(), 1);
        assert!(stages.eligible_files(Stage::Downloaded).unwrap().is_empty());
    }

    #[test]
    fn test_move_to_renames() {
        let (_dir, stages) = manager();
        let source = stages.stage_dir(Stage::Downloaded).join("a.csv");
        std::fs::write(&source, "content").unwrap();

        let target = stages.move_to(&source, Stage::Changed, "a_ABC.csv").unwrap();
        assert!(!source.exists());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "content");
    }

    #[test]
    fn test_move_to_refuses_to_overwrite() {
        let (_dir, stages) = manager();
        let source = stages.stage_dir(Stage::Downloaded).join("a.csv");
        let existing = stages.stage_dir(Stage::Renamed).join("a_ABC.csv");
        std::fs::write(&source, "new").unwrap();
        std::fs::write(&existing, "old").unwrap();

        let err = stages.move_to(&source, Stage::Renamed, "a_ABC.csv").unwrap_err();
        assert!(err.is_already_exists());
        assert!(source.exists());
        assert_eq!(std::fs::read_to_string(&existing).unwrap(), "old");
    }

    #[test]
    fn test_move_or_discard_deletes_source_on_collision() {
        let (_dir, stages) = manager();
        let source = stages.stage_dir(Stage::Downloaded).join("a.csv");
        let existing = stages.stage_dir(Stage::Renamed).join("a_ABC.csv");
        std::fs::write(&source, "new").unwrap();
        std::fs::write(&existing, "old").unwrap();

        let outcome = stages.move_or_discard(&source, Stage::Renamed, "a_ABC.csv").unwrap();
        assert_eq!(outcome, MoveOutcome::Discarded(existing.clone()));
        assert!(!source.exists());
        assert_eq!(std::fs::read_to_string(&existing).unwrap(), "old");
    }

    #[test]
    fn test_move_missing_source_is_io_error() {
        let (_dir, stages) = manager();
        let source = stages.stage_dir(Stage::Downloaded).join("ghost.csv");
        let err = stages.move_to(&source, Stage::Changed, "ghost.csv").unwrap_err();
        assert!(matches!(err, StageError::Io { .. }));
    }

    #[test]
    fn test_hashed_name() {
        assert_eq!(hashed_name("a.csv", "ABC"), "a_ABC.csv");
        assert_eq!(hashed_name("manifest.2024.csv", "ABC"), "manifest.2024_ABC.csv");
    }
}
