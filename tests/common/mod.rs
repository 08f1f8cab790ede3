use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use logfetcher::TailConfig;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;

pub const POLL_INTERVAL_MS: u64 = 10;

pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

pub const QUIET_PERIOD: Duration = Duration::from_millis(150);

pub fn test_config() -> TailConfig {
    TailConfig {
        poll_interval_ms: POLL_INTERVAL_MS,
        ..Default::default()
    }
}

pub struct LogFile {
    _dir: TempDir,
    path: PathBuf,
}

impl LogFile {
    pub fn with_lines(lines: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.log");
        let content: String = lines.iter().map(|l| format!("{l}\n")).collect();
        std::fs::write(&path, content).unwrap();
        Self { _dir: dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append_lines(
        &self,
        lines: &[&str],
    ) {
        let mut file = OpenOptions::new().append(true).open(&self.path).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file.flush().unwrap();
    }
}

pub async fn recv_lines(
    rx: &mut mpsc::UnboundedReceiver<String>,
    n: usize,
) -> Vec<String> {
    let mut lines = Vec::with_capacity(n);
    while lines.len() < n {
        match timeout(DELIVERY_TIMEOUT, rx.recv()).await {
            Ok(Some(line)) => lines.push(line),
            Ok(None) => panic!("sink closed after {} of {n} lines: {lines:?}", lines.len()),
            Err(_) => panic!("timed out after {} of {n} lines: {lines:?}", lines.len()),
        }
    }
    lines
}

pub async fn assert_no_more_lines(rx: &mut mpsc::UnboundedReceiver<String>) {
    if let Ok(Some(line)) = timeout(QUIET_PERIOD, rx.recv()).await {
        panic!("unexpected line: {line:?}");
    }
}

pub async fn eventually<F>(mut condition: F) -> bool
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
