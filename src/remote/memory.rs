//! In-memory remote store.
//!
//! Behaves like a small SFTP server held in a map, with scripted handshake
//! failures and per-path faults, so that staging and export can be exercised
//! without a network.

use crate::config::TransportConfig;
use crate::remote::session::{Connector, HandshakeError, RemoteStore, StoreError};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
    faults: HashMap<PathBuf, String>,
    handshake_failures: VecDeque<HandshakeError>,
    handshake_attempts: u32,
    open_sessions: u32,
    closed_sessions: u32,
    downloads: Vec<PathBuf>,
}

impl MemoryState {
    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.contains(path) || self.files.keys().any(|f| f.starts_with(path) && f != path)
    }
}

/// Shared handle to an in-memory store. Clones observe the same state.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds a file with the given contents.
    pub fn with_file(self, path: impl Into<PathBuf>, contents: &[u8]) -> Self {
        self.state().files.insert(path.into(), contents.to_vec());
        self
    }

    /// Adds an empty directory.
    pub fn with_dir(self, path: impl Into<PathBuf>) -> Self {
        self.state().dirs.insert(path.into());
        self
    }

    /// Makes every operation on `path` fail with `message`.
    pub fn with_fault(self, path: impl Into<PathBuf>, message: &str) -> Self {
        self.state().faults.insert(path.into(), message.to_string());
        self
    }

    /// Queues `count` handshake failures ahead of the next successful one.
    pub fn fail_handshakes(&self, count: u32, error: HandshakeError) {
        let mut state = self.state();
        for _ in 0..count {
            state.handshake_failures.push_back(error.clone());
        }
    }

    pub fn handshake_attempts(&self) -> u32 {
        self.state().handshake_attempts
    }

    /// Sessions opened and not yet closed.
    pub fn open_sessions(&self) -> u32 {
        self.state().open_sessions
    }

    pub fn closed_sessions(&self) -> u32 {
        self.state().closed_sessions
    }

    /// Remote paths downloaded so far, in order.
    pub fn downloads(&self) -> Vec<PathBuf> {
        self.state().downloads.clone()
    }
}

impl Connector for MemoryConnector {
    fn connect_once(
        &self,
        _config: &TransportConfig,
    ) -> Result<Box<dyn RemoteStore>, HandshakeError> {
        let mut state = self.state();
        state.handshake_attempts += 1;
        if let Some(failure) = state.handshake_failures.pop_front() {
            return Err(failure);
        }
        state.open_sessions += 1;
        Ok(Box::new(MemoryStore {
            connector: self.clone(),
            closed: false,
        }))
    }
}

struct MemoryStore {
    connector: MemoryConnector,
    closed: bool,
}

impl MemoryStore {
    fn check_fault(state: &MemoryState, path: &Path) -> Result<(), StoreError> {
        match state.faults.get(path) {
            Some(message) => Err(StoreError::Failed(message.clone())),
            None => Ok(()),
        }
    }
}

impl RemoteStore for MemoryStore {
    fn stat(&mut self, path: &Path) -> Result<(), StoreError> {
        let state = self.connector.state();
        Self::check_fault(&state, path)?;
        if state.files.contains_key(path) || state.is_dir(path) {
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }

    fn list(&mut self, path: &Path) -> Result<Vec<String>, StoreError> {
        let state = self.connector.state();
        Self::check_fault(&state, path)?;
        if path == Path::new(".") {
            return Ok(Vec::new());
        }
        if !state.is_dir(path) {
            return Err(StoreError::NotFound);
        }

        let mut names: BTreeSet<String> = BTreeSet::new();
        for entry in state.files.keys().chain(state.dirs.iter()) {
            if let Ok(rest) = entry.strip_prefix(path) {
                if let Some(first) = rest.components().next() {
                    names.insert(first.as_os_str().to_string_lossy().to_string());
                }
            }
        }
        Ok(names.into_iter().collect())
    }

    fn download(&mut self, remote: &Path, local: &Path) -> Result<u64, StoreError> {
        let mut state = self.connector.state();
        Self::check_fault(&state, remote)?;
        let contents = state.files.get(remote).ok_or(StoreError::NotFound)?.clone();
        fs::write(local, &contents).map_err(|e| StoreError::Failed(e.to_string()))?;
        state.downloads.push(remote.to_path_buf());
        Ok(contents.len() as u64)
    }

    fn close(&mut self) -> Result<(), StoreError> {
        if !self.closed {
            self.closed = true;
            let mut state = self.connector.state();
            state.open_sessions -= 1;
            state.closed_sessions += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_direct_children() {
        let connector = MemoryConnector::new()
            .with_file("/runs/job/1.trn", b"1")
            .with_file("/runs/job/2.trn", b"2")
            .with_file("/runs/job/sub/deep.trn", b"x")
            .with_dir("/runs/job/empty");
        let mut store = connector
            .connect_once(&TransportConfig::new("h", "u", "p"))
            .ok()
            .unwrap();

        let names = store.list(Path::new("/runs/job")).unwrap();
        assert_eq!(names, vec!["1.trn", "2.trn", "empty", "sub"]);
        assert_eq!(
            store.list(Path::new("/missing")).unwrap_err(),
            StoreError::NotFound
        );
    }
}
