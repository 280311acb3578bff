//! In-process transport over a map of remote paths
//!
//! Lets the whole pipeline run without a server, with failures injectable per
//! name or per path.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{SetupError, TransferError, TransportError};
use crate::transfer::download_into;
use crate::transport::{Connector, RemoteQuery, RemoteSession};

#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    files: Arc<BTreeMap<String, Vec<u8>>>,
    dirs: Arc<BTreeSet<String>>,
    broken_lookups: Arc<BTreeSet<String>>,
    broken_fetches: Arc<BTreeSet<String>>,
    refuse: bool,
    connects: Arc<AtomicUsize>,
    fetches: Arc<AtomicUsize>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file of `size` filler bytes
    pub fn file(self, path: &str, size: usize) -> Self {
        self.file_with(path, vec![b'r'; size])
    }

    pub fn file_with(mut self, path: &str, contents: Vec<u8>) -> Self {
        Arc::make_mut(&mut self.files).insert(path.to_string(), contents);
        self
    }

    /// Add an empty directory. Parents of added files exist implicitly.
    pub fn dir(mut self, path: &str) -> Self {
        Arc::make_mut(&mut self.dirs).insert(path.trim_end_matches('/').to_string());
        self
    }

    /// Every connection attempt fails authentication
    pub fn refuse_connections(mut self) -> Self {
        self.refuse = true;
        self
    }

    /// Looking up `name` fails like a dropped connection
    pub fn break_lookup_of(mut self, name: &str) -> Self {
        Arc::make_mut(&mut self.broken_lookups).insert(name.to_string());
        self
    }

    /// Downloading `path` fails part way through
    pub fn break_fetch_of(mut self, path: &str) -> Self {
        Arc::make_mut(&mut self.broken_fetches).insert(path.to_string());
        self
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Connector for MemoryRemote {
    type Session = MemorySession;

    fn connect(&self) -> Result<MemorySession, SetupError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(SetupError::Auth {
                user: "memory".into(),
                message: "connections refused".into(),
            });
        }
        Ok(MemorySession {
            remote: self.clone(),
        })
    }
}

pub struct MemorySession {
    remote: MemoryRemote,
}

impl RemoteQuery for MemorySession {
    fn dir_exists(&mut self, root: &str) -> Result<bool, TransportError> {
        let root = root.trim_end_matches('/');
        if root.is_empty() || self.remote.dirs.contains(root) {
            return Ok(true);
        }
        let prefix = format!("{}/", root);
        Ok(self.remote.files.keys().any(|p| p.starts_with(&prefix)))
    }

    fn find_by_name(&mut self, root: &str, name: &str) -> Result<Option<String>, TransportError> {
        if self.remote.broken_lookups.contains(name) {
            return Err(TransportError::Channel(format!("connection lost looking up {}", name)));
        }
        let prefix = format!("{}/", root.trim_end_matches('/'));
        // Keys are ordered, so the first hit is the smallest path
        Ok(self
            .remote
            .files
            .keys()
            .find(|p| p.starts_with(&prefix) && p.rsplit('/').next() == Some(name))
            .cloned())
    }

    fn stat_size(&mut self, path: &str) -> Result<Option<u64>, TransportError> {
        Ok(self.remote.files.get(path).map(|data| data.len() as u64))
    }
}

impl RemoteSession for MemorySession {
    fn fetch_file(&mut self, remote: &str, local: &Path) -> Result<u64, TransferError> {
        self.remote.fetches.fetch_add(1, Ordering::SeqCst);
        if self.remote.broken_fetches.contains(remote) {
            return Err(TransferError::RemoteRead {
                path: remote.to_string(),
                message: "connection reset".into(),
            });
        }
        let data = self
            .remote
            .files
            .get(remote)
            .ok_or_else(|| TransferError::RemoteOpen {
                path: remote.to_string(),
                message: "no such file".into(),
            })?;
        download_into(Cursor::new(data.as_slice()), remote, local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_scoped_to_root_and_exact_name() {
        let remote = MemoryRemote::new()
            .file("/srv/b/x.txt", 1)
            .file("/srv/a/x.txt", 2)
            .file("/srv/x.txt.bak", 3)
            .file("/other/x.txt", 4);
        let mut session = remote.connect().unwrap();

        assert_eq!(
            session.find_by_name("/srv", "x.txt").unwrap().as_deref(),
            Some("/srv/a/x.txt")
        );
        assert_eq!(session.find_by_name("/srv/", "y.txt").unwrap(), None);
        assert_eq!(session.stat_size("/srv/b/x.txt").unwrap(), Some(1));
        assert_eq!(session.stat_size("/srv/none").unwrap(), None);
    }

    #[test]
    fn test_dir_exists() {
        let remote = MemoryRemote::new().file("/srv/a/x.txt", 1).dir("/empty/");
        let mut session = remote.connect().unwrap();

        assert!(session.dir_exists("/srv").unwrap());
        assert!(session.dir_exists("/srv/a/").unwrap());
        assert!(session.dir_exists("/empty").unwrap());
        assert!(session.dir_exists("/").unwrap());
        assert!(!session.dir_exists("/sr").unwrap());
        assert!(!session.dir_exists("/srv/a/x.txt").unwrap());
    }

    #[test]
    fn test_injected_failures() {
        let remote = MemoryRemote::new()
            .file("/srv/a.txt", 1)
            .break_lookup_of("a.txt")
            .break_fetch_of("/srv/a.txt");
        let mut session = remote.connect().unwrap();
        assert!(session.find_by_name("/srv", "a.txt").is_err());
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(session.fetch_file("/srv/a.txt", &tmp.path().join("a.txt")).is_err());
        assert_eq!(remote.fetch_count(), 1);

        assert!(MemoryRemote::new().refuse_connections().connect().is_err());
    }
}
