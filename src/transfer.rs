//! Bounded parallel downloads
//!
//! Up to `workers` threads pull requests off a shared queue. Each worker opens
//! its own session on first use and keeps it for later jobs. Every job ends in
//! exactly one [`TransferOutcome`] posted back on the result channel, so a
//! failing file never stops the others.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

use crate::error::TransferError;
use crate::logger::Logger;
use crate::progress::TransferProgress;
use crate::select::TransferRequest;
use crate::transport::{Connector, RemoteSession};

/// Simultaneous transfers when the config does not say otherwise
pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug)]
pub enum TransferOutcome {
    Success { bytes: u64 },
    Failure(TransferError),
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Success { .. })
    }
}

#[derive(Debug)]
pub struct TransferFailure {
    pub request: TransferRequest,
    pub cause: TransferError,
}

/// Aggregate result of a download run
#[derive(Debug, Default)]
pub struct TransferSummary {
    pub total: usize,
    pub succeeded: usize,
    pub bytes: u64,
    /// In the order the requests were submitted
    pub failures: Vec<TransferFailure>,
    pub duration: Duration,
}

impl TransferSummary {
    fn record(&mut self, request: TransferRequest, outcome: TransferOutcome) {
        self.total += 1;
        match outcome {
            TransferOutcome::Success { bytes } => {
                self.succeeded += 1;
                self.bytes += bytes;
            }
            TransferOutcome::Failure(cause) => self.failures.push(TransferFailure { request, cause }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for TransferSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_success() {
            return write!(
                f,
                "All {} selected files downloaded ({} bytes in {:.1}s)",
                self.total,
                self.bytes,
                self.duration.as_secs_f64()
            );
        }
        write!(
            f,
            "{} of {} files downloaded; failures:",
            self.succeeded, self.total
        )?;
        for failure in &self.failures {
            write!(f, "\n  - {}: {}", failure.request.remote_source, failure.cause)?;
        }
        Ok(())
    }
}

pub struct TransferScheduler<'a, C: Connector> {
    connector: &'a C,
    workers: usize,
    logger: &'a dyn Logger,
}

impl<'a, C: Connector> TransferScheduler<'a, C> {
    pub fn new(connector: &'a C, workers: usize, logger: &'a dyn Logger) -> Self {
        Self {
            connector,
            workers: workers.max(1),
            logger,
        }
    }

    /// Run every request to completion and collect the outcomes
    pub fn run(&self, requests: Vec<TransferRequest>, progress: &TransferProgress) -> TransferSummary {
        let start = Instant::now();
        let total = requests.len();
        let (job_tx, job_rx) = unbounded::<(usize, TransferRequest)>();
        for job in requests.into_iter().enumerate() {
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        let (result_tx, result_rx) = unbounded::<(usize, TransferRequest, TransferOutcome)>();
        let mut reports = Vec::with_capacity(total);
        let connector = self.connector;
        let logger = self.logger;

        thread::scope(|scope| {
            for id in 0..self.workers.min(total) {
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                scope.spawn(move || worker_loop(id, connector, logger, jobs, results));
            }
            // Workers hold the only senders now; the loop ends when the last one exits
            drop(result_tx);

            for (index, request, outcome) in result_rx.iter() {
                let name = request
                    .local_destination
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| request.remote_source.clone());
                progress.complete(&name, outcome.is_success());
                reports.push((index, request, outcome));
            }
        });

        reports.sort_by_key(|(index, _, _)| *index);
        let mut summary = TransferSummary::default();
        for (_, request, outcome) in reports {
            summary.record(request, outcome);
        }
        summary.duration = start.elapsed();
        logger.done(
            summary.succeeded,
            summary.failures.len(),
            summary.bytes,
            summary.duration.as_secs_f64(),
        );
        summary
    }
}

fn worker_loop<C: Connector>(
    id: usize,
    connector: &C,
    logger: &dyn Logger,
    jobs: Receiver<(usize, TransferRequest)>,
    results: Sender<(usize, TransferRequest, TransferOutcome)>,
) {
    let mut session: Option<C::Session> = None;
    for (index, request) in jobs.iter() {
        let outcome = fetch_one(connector, &mut session, logger, &request);
        if let TransferOutcome::Failure(ref err) = outcome {
            log::debug!("worker {} failed {}: {}", id, request.remote_source, err);
        }
        if results.send((index, request, outcome)).is_err() {
            break;
        }
    }
}

fn fetch_one<C: Connector>(
    connector: &C,
    session: &mut Option<C::Session>,
    logger: &dyn Logger,
    request: &TransferRequest,
) -> TransferOutcome {
    let remote = request.remote_source.as_str();
    let local = request.local_destination.as_path();
    logger.start(remote, local);

    if session.is_none() {
        match connector.connect() {
            Ok(s) => *session = Some(s),
            Err(e) => {
                logger.error("connect", remote, &e.to_string());
                return TransferOutcome::Failure(TransferError::Connect(e.to_string()));
            }
        }
    }
    let Some(active) = session.as_mut() else {
        return TransferOutcome::Failure(TransferError::Connect("session unavailable".into()));
    };

    match active.fetch_file(remote, local) {
        Ok(bytes) => {
            logger.fetch_done(remote, local, bytes);
            log::debug!("Downloaded {} to {}", remote, local.display());
            TransferOutcome::Success { bytes }
        }
        Err(err) => {
            logger.error("fetch", remote, &err.to_string());
            // The connection itself may be gone; start over on the next job
            if matches!(
                err,
                TransferError::Timeout | TransferError::RemoteRead { .. } | TransferError::Connect(_)
            ) {
                *session = None;
            }
            TransferOutcome::Failure(err)
        }
    }
}

/// Stream `reader` into `local` through a temporary file in the same
/// directory, replacing `local` only once every byte has arrived
pub fn download_into<R: Read>(mut reader: R, remote: &str, local: &Path) -> Result<u64, TransferError> {
    let local_err = |source: io::Error| TransferError::LocalWrite {
        path: local.to_path_buf(),
        source,
    };
    let dir = match local.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(local_err)?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(local_err)?;

    let mut buffer = vec![0u8; 1024 * 1024];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => return Err(TransferError::Timeout),
            Err(e) => {
                return Err(TransferError::RemoteRead {
                    path: remote.to_string(),
                    message: e.to_string(),
                })
            }
        };
        tmp.write_all(&buffer[..n]).map_err(local_err)?;
        total += n as u64;
    }
    tmp.flush().map_err(local_err)?;
    tmp.persist(local).map_err(|e| local_err(e.error))?;
    Ok(total)
}
