//! Capabilities the sync core needs from a remote transport
//!
//! The core never talks to SSH directly. It opens sessions through a
//! [`Connector`], asks typed questions through [`RemoteQuery`] and pulls
//! files through [`RemoteSession::fetch_file`]. Closing a session is dropping it.

use std::path::Path;

use crate::error::{SetupError, TransferError, TransportError};

/// Result of running one command on the remote host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// Raw command execution on the remote side
pub trait RemoteShell {
    fn exec(&mut self, command: &str) -> Result<CommandOutput, TransportError>;
}

/// Typed lookups used to build the remote manifest
pub trait RemoteQuery {
    /// Whether `root` names a directory the session can see
    fn dir_exists(&mut self, root: &str) -> Result<bool, TransportError>;

    /// Full path of the regular file called exactly `name` under `root`.
    /// `Ok(None)` when there is no such file.
    fn find_by_name(&mut self, root: &str, name: &str) -> Result<Option<String>, TransportError>;

    /// Size in bytes of the file at `path`; `Ok(None)` when it cannot be stat'ed
    fn stat_size(&mut self, path: &str) -> Result<Option<u64>, TransportError>;
}

/// One established session: discovery queries plus downloads
pub trait RemoteSession: RemoteQuery + Send {
    /// Copy `remote` into `local`, replacing whatever is there. Returns bytes written.
    fn fetch_file(&mut self, remote: &str, local: &Path) -> Result<u64, TransferError>;
}

/// Opens sessions. Shared by all transfer workers, each of which opens its own.
pub trait Connector: Sync {
    type Session: RemoteSession;

    fn connect(&self) -> Result<Self::Session, SetupError>;
}
