//! One sync run from connection to summary
//!
//! connect -> local manifest -> remote lookups -> diff -> operator selection
//! -> parallel downloads. Anything failing before the downloads start is a
//! [`SyncError`]; download failures end up in the [`TransferSummary`].

use std::path::Path;

use crate::diff::{diff, DiffSet};
use crate::error::SyncError;
use crate::fs_enum::{LocalEntry, LocalManifest};
use crate::logger::Logger;
use crate::progress::TransferProgress;
use crate::remote::resolve_remote_manifest;
use crate::select::{parse_selection, SelectionSource, TransferRequest};
use crate::transfer::{TransferScheduler, TransferSummary};
use crate::transport::{Connector, RemoteQuery};

/// How a run that was not aborted ended
#[derive(Debug)]
pub enum SyncOutcome {
    /// No file differs in size; nothing was asked or fetched
    NothingToSync,
    /// Downloads ran; the summary says how many failed
    Completed(TransferSummary),
}

impl SyncOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncOutcome::NothingToSync => 0,
            SyncOutcome::Completed(summary) if summary.is_success() => 0,
            SyncOutcome::Completed(_) => 2,
        }
    }
}

pub struct Synchronizer<'a, C: Connector> {
    connector: &'a C,
    workers: usize,
    logger: &'a dyn Logger,
    show_progress: bool,
}

impl<'a, C: Connector> Synchronizer<'a, C> {
    pub fn new(connector: &'a C, workers: usize, logger: &'a dyn Logger) -> Self {
        Self {
            connector,
            workers,
            logger,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Compare both trees and return the differences in display order
    pub fn compare(&self, local_root: &Path, remote_root: &str) -> Result<DiffSet, SyncError> {
        let mut control = self.connector.connect()?;

        let manifest = LocalManifest::open(local_root).map_err(|source| SyncError::LocalRoot {
            path: local_root.to_path_buf(),
            source,
        })?;
        let local: Vec<LocalEntry> = manifest.entries().collect();
        log::info!("{} local files under {}", local.len(), local_root.display());

        // find exits quietly on a missing root, which would read as "no matches"
        if !control.dir_exists(remote_root)? {
            return Err(SyncError::RemoteRootMissing(remote_root.to_string()));
        }

        let names = local.iter().filter_map(|entry| {
            let name = entry.file_name();
            if name.is_none() {
                log::warn!("skipping {}: name is not valid UTF-8", entry.path.display());
            }
            name
        });
        let remote = resolve_remote_manifest(&mut control, remote_root, names)?;
        drop(control);
        log::info!("{} of those names found under {}", remote.len(), remote_root);

        Ok(diff(&local, &remote))
    }

    /// Ask `selection` until it yields a valid expression
    pub fn select<S: SelectionSource + ?Sized>(
        &self,
        diff_set: &DiffSet,
        local_root: &Path,
        selection: &mut S,
    ) -> Result<Vec<TransferRequest>, SyncError> {
        selection.present(diff_set);
        loop {
            let expression = selection
                .next_expression()
                .map_err(SyncError::SelectionInput)?
                .ok_or(SyncError::SelectionClosed)?;
            match parse_selection(&expression, diff_set, local_root) {
                Ok(requests) => return Ok(requests),
                Err(err) => {
                    log::debug!("rejected selection {:?}: {}", expression, err);
                    selection.reject(&err);
                }
            }
        }
    }

    pub fn run<S: SelectionSource + ?Sized>(
        &self,
        local_root: &Path,
        remote_root: &str,
        selection: &mut S,
    ) -> Result<SyncOutcome, SyncError> {
        let diff_set = self.compare(local_root, remote_root)?;
        if diff_set.is_empty() {
            log::info!("All files are synchronized in size.");
            return Ok(SyncOutcome::NothingToSync);
        }

        let requests = self.select(&diff_set, local_root, selection)?;
        let progress = if self.show_progress {
            TransferProgress::new(requests.len())
        } else {
            TransferProgress::hidden(requests.len())
        };
        let summary = TransferScheduler::new(self.connector, self.workers, self.logger)
            .run(requests, &progress);
        progress.finish();
        Ok(SyncOutcome::Completed(summary))
    }
}
