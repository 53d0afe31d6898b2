//! Manifest ingestion
//!
//! # Architecture
//!
//! - **config**: `SFTP_*` options for the pipeline
//! - **models**: remote items, ledger tokens, stages
//! - **ledger**: durable append-only token sets (`attributes.txt`, `checksums.txt`)
//! - **stages**: stage directories and the no-overwrite move
//! - **common**: remote transport (SFTP)
//! - **fetch**: list remote, fetch unseen items
//! - **classify**: content dedup into changed / renamed
//! - **remap**: source rows → staging store → canonical CSV artifact
//! - **pipeline**: one full run and its summary
//! - **scheduler**: single-flight coordinator and fixed-rate trigger
//!
//! # Local layout
//!
//! ```text
//! <local root>/
//!   01_downloaded/  02_changed/  03_renamed/
//!   04_remapped/    05_created/  06_exported/
//!   attributes.txt  checksums.txt
//! ```

pub mod classify;
pub mod common;
pub mod config;
pub mod fetch;
pub mod ledger;
pub mod models;
pub mod pipeline;
pub mod remap;
pub mod scheduler;
pub mod stages;

pub use config::IngestConfig;
pub use models::{ContentHash, IdentityKey, RemoteItem, Stage};
pub use pipeline::{RunStatus, RunSummary, SyncPipeline};
pub use scheduler::{RunCoordinator, RunRejected, SyncScheduler};
