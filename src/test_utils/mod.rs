//! Shared fixtures for unit tests: a temp log file that can be grown and
//! truncated, a fast-polling config and helpers to collect delivered lines.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::TailConfig;

pub(crate) const POLL_INTERVAL_MS: u64 = 10;

/// Generous upper bound for a line to travel file -> watcher -> sink
pub(crate) const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Window used to assert that nothing arrives
pub(crate) const QUIET_PERIOD: Duration = Duration::from_millis(150);

pub(crate) fn fast_config() -> TailConfig {
    TailConfig {
        poll_interval_ms: POLL_INTERVAL_MS,
        ..Default::default()
    }
}

/// A log file inside its own temp directory, removed on drop
pub(crate) struct TempLog {
    _dir: TempDir,
    path: PathBuf,
}

impl TempLog {
    pub(crate) fn new(content: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, content).unwrap();
        Self { _dir: dir, path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn append(
        &self,
        content: &str,
    ) {
        let mut file = OpenOptions::new().append(true).open(&self.path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
    }

    /// Replaces the whole content, shrinking the file
    pub(crate) fn truncate_to(
        &self,
        content: &str,
    ) {
        std::fs::write(&self.path, content).unwrap();
    }

    /// Shrinks the file in place to `len` bytes
    pub(crate) fn set_len(
        &self,
        len: u64,
    ) {
        let file = OpenOptions::new().write(true).open(&self.path).unwrap();
        file.set_len(len).unwrap();
    }

    /// A write-only handle: stat works, every read fails
    pub(crate) fn unreadable_handle(&self) -> tokio::fs::File {
        let file = OpenOptions::new().write(true).open(&self.path).unwrap();
        tokio::fs::File::from_std(file)
    }
}

/// Receives exactly `n` lines or panics after [`DELIVERY_TIMEOUT`]
pub(crate) async fn recv_lines<T: ToString>(
    rx: &mut mpsc::UnboundedReceiver<T>,
    n: usize,
) -> Vec<String> {
    let mut lines = Vec::with_capacity(n);
    while lines.len() < n {
        match timeout(DELIVERY_TIMEOUT, rx.recv()).await {
            Ok(Some(line)) => lines.push(line.to_string()),
            Ok(None) => panic!("channel closed after {} of {n} lines: {lines:?}", lines.len()),
            Err(_) => panic!("timed out after {} of {n} lines: {lines:?}", lines.len()),
        }
    }
    lines
}

/// Asserts that nothing is received during [`QUIET_PERIOD`]
pub(crate) async fn assert_quiet<T: std::fmt::Debug>(rx: &mut mpsc::UnboundedReceiver<T>) {
    if let Ok(Some(line)) = timeout(QUIET_PERIOD, rx.recv()).await {
        panic!("unexpected line: {line:?}");
    }
}

/// Polls `condition` until it holds or [`DELIVERY_TIMEOUT`] elapses
pub(crate) async fn wait_for<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + DELIVERY_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// [`recv_lines`] for a subscriber queue
pub(crate) async fn recv_queued(
    rx: &mut mpsc::Receiver<crate::subscriber::Line>,
    n: usize,
) -> Vec<String> {
    let mut lines = Vec::with_capacity(n);
    while lines.len() < n {
        match timeout(DELIVERY_TIMEOUT, rx.recv()).await {
            Ok(Some(line)) => lines.push(line.to_string()),
            Ok(None) => panic!("queue closed after {} of {n} lines: {lines:?}", lines.len()),
            Err(_) => panic!("timed out after {} of {n} lines: {lines:?}", lines.len()),
        }
    }
    lines
}
