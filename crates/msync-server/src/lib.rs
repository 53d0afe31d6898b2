//! MSync Server Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Periodically pulls CSV manifests from an SFTP directory into a local
//! multi-stage pipeline and remaps new content into the canonical manifest
//! schema.
//!
//! # Overview
//!
//! - **Ingestion**: list the remote directory, fetch each `name + mtime`
//!   identity once ([`ingest::fetch`])
//! - **Deduplication**: hash downloaded files, route new content to
//!   `02_changed` and re-uploads to `03_renamed` ([`ingest::classify`])
//! - **Remap**: source rows → SQLite staging store → external transform
//!   statement → canonical CSV artifact ([`ingest::remap`])
//! - **Scheduling**: fixed-rate trigger with a single-flight guard
//!   ([`ingest::scheduler`])
//! - **Status API**: health, last run summary, manual trigger ([`api`])
//!
//! # Example
//!
//! ```no_run
//! use msync_server::ingest::{common::SftpClient, remap::StagingStore, IngestConfig, SyncPipeline};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let remote = Arc::new(SftpClient::new((&config).into()));
//!     let store = StagingStore::connect("sqlite::memory:").await?;
//!     let pipeline = SyncPipeline::from_config(config, remote, store).await?;
//!     let summary = pipeline.run().await?;
//!     println!("{}", serde_json::to_string_pretty(&summary)?);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;

pub use error::{AppError, PipelineError};
