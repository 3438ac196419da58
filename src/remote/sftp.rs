//! SFTP access over `ssh2`.

use crate::config::TransportConfig;
use crate::remote::session::{Connector, HandshakeError, RemoteStore, StoreError};
use log::debug;
use ssh2::{ErrorCode, Session, Sftp};
use std::fs::{self, File};
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

/// libssh2: the server closed the socket before its banner was read.
const LIBSSH2_ERROR_BANNER_RECV: i32 = -2;

/// SFTP status: no such file.
const LIBSSH2_FX_NO_SUCH_FILE: i32 = 2;

/// Returns true for the banner race that a fresh connection usually clears.
pub fn is_transient_banner_failure(code: ErrorCode, message: &str) -> bool {
    code == ErrorCode::Session(LIBSSH2_ERROR_BANNER_RECV)
        || message.to_lowercase().contains("protocol banner")
}

fn classify(e: ssh2::Error) -> HandshakeError {
    let message = format!("SSH handshake failed: {}", e);
    if is_transient_banner_failure(e.code(), e.message()) {
        HandshakeError::Transient(message)
    } else {
        HandshakeError::Fatal(message)
    }
}

fn store_error(e: ssh2::Error) -> StoreError {
    if e.code() == ErrorCode::SFTP(LIBSSH2_FX_NO_SUCH_FILE) {
        StoreError::NotFound
    } else {
        StoreError::Failed(e.to_string())
    }
}

/// Connects to an SFTP server with password authentication.
#[derive(Debug, Default, Clone, Copy)]
pub struct SftpConnector;

impl Connector for SftpConnector {
    fn connect_once(
        &self,
        config: &TransportConfig,
    ) -> Result<Box<dyn RemoteStore>, HandshakeError> {
        let timeout = Duration::from_secs(config.timeout_secs);

        let addr = (config.server.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|e| {
                HandshakeError::Fatal(format!("Failed to resolve host '{}': {}", config.server, e))
            })?
            .next()
            .ok_or_else(|| {
                HandshakeError::Fatal(format!("No addresses found for host '{}'", config.server))
            })?;

        let tcp = TcpStream::connect_timeout(&addr, timeout).map_err(|e| {
            HandshakeError::Fatal(format!("Failed to connect to {}: {}", config.server, e))
        })?;
        tcp.set_read_timeout(Some(timeout))
            .and_then(|_| tcp.set_write_timeout(Some(timeout)))
            .map_err(|e| HandshakeError::Fatal(e.to_string()))?;

        let mut session = Session::new().map_err(|e| {
            HandshakeError::Fatal(format!("Failed to create SSH session: {}", e))
        })?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(classify)?;

        session
            .userauth_password(&config.user, config.password())
            .map_err(|e| HandshakeError::Fatal(format!("authentication failed: {}", e)))?;
        if !session.authenticated() {
            return Err(HandshakeError::Fatal(format!(
                "authentication failed for {}",
                config.user
            )));
        }

        let sftp = session.sftp().map_err(|e| {
            HandshakeError::Fatal(format!("Failed to open SFTP channel: {}", e))
        })?;

        debug!("SFTP channel open to {}", config.connection_string());
        Ok(Box::new(SftpStore {
            session,
            sftp: Some(sftp),
        }))
    }
}

struct SftpStore {
    session: Session,
    sftp: Option<Sftp>,
}

impl SftpStore {
    fn sftp(&self) -> Result<&Sftp, StoreError> {
        self.sftp
            .as_ref()
            .ok_or_else(|| StoreError::Failed("SFTP channel already closed".to_string()))
    }
}

impl RemoteStore for SftpStore {
    fn stat(&mut self, path: &Path) -> Result<(), StoreError> {
        self.sftp()?.stat(path).map(|_| ()).map_err(store_error)
    }

    fn list(&mut self, path: &Path) -> Result<Vec<String>, StoreError> {
        let entries = self.sftp()?.readdir(path).map_err(store_error)?;
        Ok(entries
            .into_iter()
            .filter_map(|(p, _)| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .collect())
    }

    fn download(&mut self, remote: &Path, local: &Path) -> Result<u64, StoreError> {
        let mut source = self.sftp()?.open(remote).map_err(store_error)?;
        let mut target = File::create(local)
            .map_err(|e| StoreError::Failed(format!("{}: {}", local.display(), e)))?;

        match io::copy(&mut source, &mut target) {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                drop(target);
                let _ = fs::remove_file(local);
                Err(StoreError::Failed(e.to_string()))
            }
        }
    }

    fn close(&mut self) -> Result<(), StoreError> {
        // The channel has to go before the transport.
        drop(self.sftp.take());
        self.session
            .disconnect(None, "cfdbox session finished", None)
            .map_err(|e| StoreError::Failed(e.to_string()))
    }
}
