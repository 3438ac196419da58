//! Scoped connections to the remote file store.
//!
//! A [`TransportSession`] owns one authenticated connection. It is released
//! when the session is closed or dropped, whichever comes first, so an error
//! in the middle of a transfer never leaks the connection.

use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::remote::retry::{retry_transient, RetryConfig, RetryError};
use log::{debug, info, log_enabled, warn, Level};
use std::fmt;
use std::path::Path;

/// Outcome of a failed connection handshake.
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeError {
    /// The server closed the socket before sending its protocol banner.
    /// Happens under load and usually succeeds on a fresh attempt.
    Transient(String),
    /// Anything else: refused connections, bad credentials, protocol errors.
    Fatal(String),
}

impl HandshakeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, HandshakeError::Transient(_))
    }
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeError::Transient(msg) | HandshakeError::Fatal(msg) => write!(f, "{}", msg),
        }
    }
}

/// Failure reported by a connected store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    NotFound,
    Failed(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "no such file"),
            StoreError::Failed(msg) => write!(f, "{}", msg),
        }
    }
}

/// An open connection to a remote file store.
pub trait RemoteStore {
    /// Probes `path`, returning `StoreError::NotFound` when it is missing.
    fn stat(&mut self, path: &Path) -> std::result::Result<(), StoreError>;

    /// Names of the entries directly under `path`.
    fn list(&mut self, path: &Path) -> std::result::Result<Vec<String>, StoreError>;

    /// Copies `remote` to `local`, returning the number of bytes written.
    fn download(&mut self, remote: &Path, local: &Path) -> std::result::Result<u64, StoreError>;

    /// Shuts down the sub-channel and the transport.
    fn close(&mut self) -> std::result::Result<(), StoreError>;
}

/// Performs a single connection handshake.
pub trait Connector {
    fn connect_once(
        &self,
        config: &TransportConfig,
    ) -> std::result::Result<Box<dyn RemoteStore>, HandshakeError>;
}

/// One authenticated connection to the remote store.
pub struct TransportSession {
    store: Option<Box<dyn RemoteStore>>,
    label: String,
}

impl TransportSession {
    /// Connects, retrying transient banner failures up to
    /// `retry.max_attempts` times.
    ///
    /// # Errors
    ///
    /// - `ConnectionExhausted` once every attempt failed transiently
    /// - `Transfer` on the first non-transient handshake failure
    pub fn connect(
        connector: &dyn Connector,
        config: &TransportConfig,
        retry: &RetryConfig,
    ) -> Result<Self> {
        let label = config.connection_string();

        let result = retry_transient(
            retry,
            |attempt| {
                info!("trying to connect to {} attempt {}", label, attempt);
                connector.connect_once(config)
            },
            HandshakeError::is_transient,
            &format!("connection to {}", label),
        );

        let store = match result {
            Ok(store) => store,
            Err(RetryError::Fatal(e)) => {
                return Err(Error::Transfer(format!(
                    "cannot connect to {}: {}",
                    label, e
                )))
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                return Err(Error::ConnectionExhausted {
                    attempts,
                    last: last.to_string(),
                })
            }
        };

        info!("connected to {}", label);
        let mut session = Self {
            store: Some(store),
            label,
        };
        session.log_root_listing();
        Ok(session)
    }

    fn log_root_listing(&mut self) {
        if !log_enabled!(Level::Debug) {
            return;
        }
        match self.list(Path::new(".")) {
            Ok(entries) => debug!(
                "Can see the following directory listings: {}",
                entries.join(" ")
            ),
            Err(e) => debug!("could not list the remote root: {}", e),
        }
    }

    fn store(&mut self) -> Result<&mut Box<dyn RemoteStore>> {
        self.store
            .as_mut()
            .ok_or_else(|| Error::Transfer(format!("session to {} is closed", self.label)))
    }

    /// Returns whether `path` exists on the remote.
    ///
    /// A missing path is `Ok(false)`; any other failure is an error.
    pub fn exists(&mut self, path: &Path) -> Result<bool> {
        match self.store()?.stat(path) {
            Ok(()) => Ok(true),
            Err(StoreError::NotFound) => Ok(false),
            Err(StoreError::Failed(msg)) => Err(Error::Transfer(format!(
                "cannot stat {}: {}",
                path.display(),
                msg
            ))),
        }
    }

    pub fn list(&mut self, path: &Path) -> Result<Vec<String>> {
        self.store()?.list(path).map_err(|e| {
            Error::Transfer(format!("cannot list {}: {}", path.display(), e))
        })
    }

    /// Downloads `remote` into `local`, returning the bytes transferred.
    pub fn download(&mut self, remote: &Path, local: &Path) -> Result<u64> {
        info!("downloading {} -> {}", remote.display(), local.display());
        let bytes = self.store()?.download(remote, local).map_err(|e| {
            Error::Transfer(format!("cannot download {}: {}", remote.display(), e))
        })?;
        debug!("downloaded {} bytes", bytes);
        Ok(bytes)
    }

    /// Releases the connection, reporting any failure to shut it down.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        let Some(mut store) = self.store.take() else {
            return Ok(());
        };
        let result = store.close();
        info!("disconnected from {}", self.label);
        result.map_err(|e| Error::Transfer(format!("error while disconnecting: {}", e)))
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("{}", e);
        }
    }
}

/// Everything needed to open sessions against one remote store.
pub struct RemoteAccess {
    connector: Box<dyn Connector>,
    config: TransportConfig,
    retry: RetryConfig,
}

impl RemoteAccess {
    pub fn new(connector: Box<dyn Connector>, config: TransportConfig, retry: RetryConfig) -> Self {
        Self {
            connector,
            config,
            retry,
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Opens a fresh session.
    pub fn session(&self) -> Result<TransportSession> {
        TransportSession::connect(self.connector.as_ref(), &self.config, &self.retry)
    }

    /// Runs `body` inside a fresh session that is released afterwards, even
    /// when `body` fails.
    pub fn with_session<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut TransportSession) -> Result<T>,
    {
        let mut session = self.session()?;
        let value = body(&mut session)?;
        session.close()?;
        Ok(value)
    }

    pub fn exists(&self, path: &Path) -> Result<bool> {
        self.with_session(|session| session.exists(path))
    }

    pub fn download(&self, remote: &Path, local: &Path) -> Result<u64> {
        self.with_session(|session| session.download(remote, local))
    }
}
