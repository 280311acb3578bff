use anyhow::Result;
use chrono::Utc;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Per-transfer event sink, chosen once at startup
pub trait Logger: Send + Sync {
    fn start(&self, _remote: &str, _local: &Path) {}
    fn fetch_done(&self, _remote: &str, _local: &Path, _bytes: u64) {}
    fn error(&self, _context: &str, _remote: &str, _msg: &str) {}
    fn done(&self, _files: usize, _failures: usize, _bytes: u64, _seconds: f64) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

pub struct TextLogger {
    file: Mutex<File>,
}

impl TextLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, s: &str) {
        let mut f = self.file.lock();
        let _ = writeln!(f, "[{}] {}", Utc::now().to_rfc3339(), s);
    }
}

impl Logger for TextLogger {
    fn start(&self, remote: &str, local: &Path) {
        self.line(&format!("START remote={} local={}", remote, local.display()));
    }
    fn fetch_done(&self, remote: &str, local: &Path, bytes: u64) {
        self.line(&format!(
            "FETCH remote={} local={} bytes={}",
            remote,
            local.display(),
            bytes
        ));
    }
    fn error(&self, context: &str, remote: &str, msg: &str) {
        self.line(&format!("ERROR ctx={} remote={} msg={}", context, remote, msg));
    }
    fn done(&self, files: usize, failures: usize, bytes: u64, seconds: f64) {
        self.line(&format!(
            "DONE files={files} failures={failures} bytes={bytes} seconds={seconds:.3}"
        ));
    }
}
