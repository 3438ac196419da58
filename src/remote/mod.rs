//! Remote file store access.
//!
//! Result files frequently live on a storage server that is only reachable
//! over SFTP. This module provides scoped sessions against such a store,
//! with bounded retries for the flaky part of connection setup.

#[cfg(test)]
pub(crate) mod memory;
pub mod retry;
pub mod session;
pub mod sftp;

pub use retry::{diagnose_connection_error, retry_transient, RetryConfig, RetryError};
pub use session::{
    Connector, HandshakeError, RemoteAccess, RemoteStore, StoreError, TransportSession,
};
pub use sftp::SftpConnector;
