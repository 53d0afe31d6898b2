//! MSync Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities for the manifest sync workspace.
//!
//! - **Error Handling**: [`MsyncError`] and the [`Result`] alias
//! - **Checksums**: streaming file digests used for content deduplication
//! - **Logging**: `tracing` subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use msync_common::checksum::compute_file_md5_upper;
//!
//! fn fingerprint(path: &str) -> msync_common::Result<()> {
//!     let hash = compute_file_md5_upper(path)?;
//!     tracing::info!(%hash, "Fingerprinted manifest");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;

pub use error::{MsyncError, Result};
