//! Error taxonomy for a sync run
//!
//! Setup and transport errors abort the run, parse errors send the operator
//! back to the prompt, transfer errors stay attached to the one file that
//! failed.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Anything that stops a run before the first transfer is dispatched
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("remote query failed: {0}")]
    Transport(#[from] TransportError),

    #[error("cannot read local root {}: {source}", .path.display())]
    LocalRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("remote root {0} does not exist or is not a directory")]
    RemoteRootMissing(String),

    #[error("selection input closed before a valid selection was entered")]
    SelectionClosed,

    #[error("failed to read selection: {0}")]
    SelectionInput(#[source] io::Error),
}

/// Configuration or session establishment failure
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("cannot read config file {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file {}: {message}", .path.display())]
    ConfigParse { path: PathBuf, message: String },

    #[error("config field `{0}` is missing or empty")]
    MissingField(&'static str),

    #[error("config field `workers` must be at least 1")]
    NoWorkers,

    #[error("private key not found: {}", .0.display())]
    KeyNotFound(PathBuf),

    #[error("cannot connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("SSH handshake with {addr} failed: {message}")]
    Handshake { addr: String, message: String },

    #[error("authentication as {user} failed: {message}")]
    Auth { user: String, message: String },
}

/// Failure of a discovery command while resolving the remote manifest
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("channel error: {0}")]
    Channel(String),

    #[error("remote command timed out: {0}")]
    Timeout(String),

    #[error("unexpected output from `{command}`: {output:?}")]
    UnexpectedOutput { command: String, output: String },
}

/// Why one download failed
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("no session: {0}")]
    Connect(String),

    #[error("cannot open remote file {path}: {message}")]
    RemoteOpen { path: String, message: String },

    #[error("read from {path} failed: {message}")]
    RemoteRead { path: String, message: String },

    #[error("cannot write {}: {source}", .path.display())]
    LocalWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("timed out")]
    Timeout,
}
