//! SFTP remote source
//!
//! Lists and fetches manifests over SFTP with password authentication.
//! Each operation opens its own session on a blocking thread, so a dropped
//! connection only costs the operation that was using it.
//!
//! ```rust,ignore
//! use msync_server::ingest::common::sftp::{RemoteSource, SftpClient, SftpConfig};
//!
//! let client = SftpClient::new(SftpConfig::from(&ingest_config));
//! for item in client.list("/outbox").await? {
//!     client.fetch(&item, downloaded_dir).await?;
//! }
//! ```

use crate::error::TransportError;
use crate::ingest::config::IngestConfig;
use crate::ingest::models::RemoteItem;
use async_trait::async_trait;
use ssh2::{ErrorCode, Session, Sftp};
use std::fs::File;
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Lists and fetches remote manifests
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Regular files directly under `dir`
    async fn list(&self, dir: &str) -> Result<Vec<RemoteItem>, TransportError>;

    /// Copy one item into `local_dir`, returning the local path
    async fn fetch(&self, item: &RemoteItem, local_dir: &Path) -> Result<PathBuf, TransportError>;
}

/// SFTP connection settings
#[derive(Debug, Clone)]
pub struct SftpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Applies to every blocking session call; `None` waits forever
    pub timeout: Option<Duration>,
}

impl From<&IngestConfig> for SftpConfig {
    fn from(config: &IngestConfig) -> Self {
        Self {
            host: config.hostname.clone(),
            port: config.port,
            username: config.username.clone(),
            password: config.password.clone(),
            timeout: config.timeout(),
        }
    }
}

/// SFTP implementation of [`RemoteSource`]
pub struct SftpClient {
    config: SftpConfig,
}

impl SftpClient {
    pub fn new(config: SftpConfig) -> Self {
        Self { config }
    }

    fn connect(config: &SftpConfig) -> Result<(Session, Sftp), TransportError> {
        debug!("Connecting to SFTP server: {}:{}", config.host, config.port);

        let tcp = open_tcp(config).map_err(|e| {
            TransportError::Connection(format!("{}:{}: {}", config.host, config.port, e))
        })?;
        tcp.set_read_timeout(config.timeout)?;
        tcp.set_write_timeout(config.timeout)?;

        let mut session = Session::new().map_err(connection_error)?;
        if let Some(timeout) = config.timeout {
            session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
        }
        session.set_tcp_stream(tcp);
        session.handshake().map_err(connection_error)?;

        debug!("Logging in as: {}", config.username);
        session
            .userauth_password(&config.username, &config.password)
            .map_err(connection_error)?;
        if !session.authenticated() {
            return Err(TransportError::Connection(format!(
                "authentication failed for {}",
                config.username
            )));
        }

        let sftp = session.sftp().map_err(connection_error)?;
        Ok((session, sftp))
    }

    fn list_sync(config: &SftpConfig, dir: &str) -> Result<Vec<RemoteItem>, TransportError> {
        let (session, sftp) = Self::connect(config)?;

        let entries = sftp.readdir(Path::new(dir)).map_err(item_error)?;
        let items = entries
            .into_iter()
            .filter(|(_, stat)| stat.is_file())
            .filter_map(|(path, stat)| {
                let name = path.file_name()?.to_str()?.to_string();
                Some(RemoteItem {
                    name,
                    remote_path: path.to_string_lossy().into_owned(),
                    modify_time: stat.mtime.unwrap_or(0),
                })
            })
            .collect();

        close(&session);
        Ok(items)
    }

    fn fetch_sync(
        config: &SftpConfig,
        item: &RemoteItem,
        local_dir: &Path,
    ) -> Result<PathBuf, TransportError> {
        let (session, sftp) = Self::connect(config)?;

        let mut remote = sftp.open(Path::new(&item.remote_path)).map_err(item_error)?;

        let partial = local_dir.join(format!(".{}.part", item.name));
        let target = local_dir.join(&item.name);

        let copied = (|| -> std::io::Result<u64> {
            let mut local = File::create(&partial)?;
            let bytes = std::io::copy(&mut remote, &mut local)?;
            local.sync_all()?;
            Ok(bytes)
        })();

        let bytes = match copied {
            Ok(bytes) => bytes,
            Err(e) => {
                if let Err(cleanup) = std::fs::remove_file(&partial) {
                    debug!("Failed to remove partial file {}: {}", partial.display(), cleanup);
                }
                return Err(TransportError::Io(e));
            },
        };
        std::fs::rename(&partial, &target)?;

        debug!("Fetched {} ({} bytes)", item.remote_path, bytes);
        close(&session);
        Ok(target)
    }
}

#[async_trait]
impl RemoteSource for SftpClient {
    async fn list(&self, dir: &str) -> Result<Vec<RemoteItem>, TransportError> {
        let config = self.config.clone();
        let dir = dir.to_string();

        tokio::task::spawn_blocking(move || Self::list_sync(&config, &dir))
            .await
            .map_err(|e| TransportError::Connection(format!("SFTP list task panicked: {}", e)))?
    }

    async fn fetch(&self, item: &RemoteItem, local_dir: &Path) -> Result<PathBuf, TransportError> {
        let config = self.config.clone();
        let item = item.clone();
        let local_dir = local_dir.to_path_buf();

        tokio::task::spawn_blocking(move || Self::fetch_sync(&config, &item, &local_dir))
            .await
            .map_err(|e| TransportError::Connection(format!("SFTP fetch task panicked: {}", e)))?
    }
}

/// The configured timeout bounds the TCP connect as well as later reads
/// and writes; each resolved address is tried in turn.
fn open_tcp(config: &SftpConfig) -> io::Result<TcpStream> {
    let Some(timeout) = config.timeout else {
        return TcpStream::connect((config.host.as_str(), config.port));
    };

    let mut last_err = None;
    for addr in (config.host.as_str(), config.port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(tcp) => return Ok(tcp),
            Err(e) => {
                debug!(%addr, error = %e, "SFTP address unreachable");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
    }))
}

fn connection_error(e: ssh2::Error) -> TransportError {
    TransportError::Connection(e.to_string())
}

/// SFTP status codes (no such file, permission denied, failure) are scoped
/// to the one item; session-level codes mean the connection is unusable.
fn item_error(e: ssh2::Error) -> TransportError {
    match e.code() {
        ErrorCode::SFTP(_) => TransportError::Unavailable(e.to_string()),
        ErrorCode::Session(_) => TransportError::Connection(e.to_string()),
    }
}

fn close(session: &Session) {
    if let Err(e) = session.disconnect(None, "done", None) {
        warn!("Failed to close SFTP session gracefully: {}", e);
    }
}
