//! Common utilities shared across the ingestion pipeline
//!
//! - **sftp**: remote listing and fetch over SFTP

pub mod sftp;

pub use sftp::{RemoteSource, SftpClient, SftpConfig};
