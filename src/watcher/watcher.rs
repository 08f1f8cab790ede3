use std::io::SeekFrom;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncSeekExt;
use tokio::time::interval;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::metrics::ACTIVE_SUBSCRIBERS;
use crate::metrics::ACTIVE_WATCHERS;
use crate::metrics::EVICTED_SUBSCRIBERS;
use crate::metrics::LINES_BROADCAST;
use crate::metrics::READ_ERRORS;
use crate::reader::LineBuffer;
use crate::subscriber::Line;
use crate::subscriber::Offer;
use crate::Result;
use crate::Subscriber;
use crate::SubscriberId;
use crate::TailConfig;
use crate::TailError;
use crate::TruncationPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherStatus {
    /// Created, file not opened yet
    Idle,
    /// File open, detection loop active
    Running,
    /// File closed; terminal
    Stopped,
}

#[derive(Debug)]
struct WatcherState {
    status: WatcherStatus,
    /// Bytes of the file consumed so far, including `pending`
    read_offset: u64,
    pending: LineBuffer,
    subscribers: Vec<Subscriber>,
}

impl WatcherState {
    /// Offset of the first byte not yet delivered as part of a complete line
    fn line_boundary(&self) -> u64 {
        self.read_offset - self.pending.pending_len() as u64
    }

    /// Hands every line to every subscriber, evicting the ones that cannot
    /// take them. Returns the number of evicted subscribers.
    fn broadcast(
        &mut self,
        lines: &[Line],
        path: &Path,
    ) -> usize {
        let before = self.subscribers.len();

        self.subscribers.retain(|subscriber| {
            for line in lines {
                match subscriber.offer(line) {
                    Offer::Queued => {}
                    Offer::Overflow => {
                        warn!(
                            subscriber_id = %subscriber.id(),
                            path = %path.display(),
                            "subscriber queue full, evicting"
                        );
                        return false;
                    }
                    Offer::Closed => {
                        debug!(
                            subscriber_id = %subscriber.id(),
                            path = %path.display(),
                            "subscriber gone, evicting"
                        );
                        return false;
                    }
                }
            }
            true
        });

        before - self.subscribers.len()
    }
}

/// Consecutive failed detection cycles of one watcher
#[derive(Debug)]
pub(crate) struct ReadFailures {
    count: u32,
    /// 0 never gives up
    limit: u32,
}

impl ReadFailures {
    pub(crate) fn new(limit: u32) -> Self {
        Self { count: 0, limit }
    }

    pub(crate) fn succeeded(&mut self) {
        self.count = 0;
    }

    /// Records a failure; true once the limit is reached
    pub(crate) fn failed(&mut self) -> bool {
        self.count = self.count.saturating_add(1);
        self.limit > 0 && self.count >= self.limit
    }

    pub(crate) fn count(&self) -> u32 {
        self.count
    }
}

/// Tails one file on behalf of all its subscribers
#[derive(Debug)]
pub struct Watcher {
    path: PathBuf,
    config: TailConfig,
    state: Mutex<WatcherState>,
    shutdown: CancellationToken,
}

impl Watcher {
    pub fn new(
        path: PathBuf,
        config: TailConfig,
    ) -> Self {
        Self {
            path,
            config,
            state: Mutex::new(WatcherState {
                status: WatcherStatus::Idle,
                read_offset: 0,
                pending: LineBuffer::new(),
                subscribers: Vec::new(),
            }),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn status(&self) -> WatcherStatus {
        self.state.lock().status
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.status() == WatcherStatus::Running
    }

    pub fn read_offset(&self) -> u64 {
        self.state.lock().read_offset
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    /// `Idle -> Running`: opens the file and positions the read offset at its
    /// current end. The returned handle must be moved into [`Watcher::run`].
    pub(crate) fn start(&self) -> Result<File> {
        let file = std::fs::File::open(&self.path)
            .map_err(|e| TailError::from_open(self.path.clone(), e))?;
        let len = file
            .metadata()
            .map_err(|e| TailError::from_open(self.path.clone(), e))?
            .len();

        let mut state = self.state.lock();
        if state.status != WatcherStatus::Idle {
            return Err(TailError::WatcherStopped {
                path: self.path.clone(),
            }
            .into());
        }
        state.status = WatcherStatus::Running;
        state.read_offset = len;
        ACTIVE_WATCHERS.inc();

        debug!(path = %self.path.display(), offset = len, "watcher started");
        Ok(File::from_std(file))
    }

    /// Adds a subscriber and returns its replay boundary: every complete line
    /// starting at or after that offset will reach the subscriber through
    /// broadcast, every line before it will not.
    ///
    /// Hands the subscriber back when the watcher is not running.
    pub(crate) fn attach(
        &self,
        subscriber: Subscriber,
    ) -> std::result::Result<u64, Subscriber> {
        let mut state = self.state.lock();
        if state.status != WatcherStatus::Running {
            return Err(subscriber);
        }

        let boundary = state.line_boundary();
        debug!(
            subscriber_id = %subscriber.id(),
            path = %self.path.display(),
            boundary,
            "subscriber attached"
        );
        state.subscribers.push(subscriber);
        ACTIVE_SUBSCRIBERS.inc();

        Ok(boundary)
    }

    /// Removes a subscriber. Returns false when it was not attached
    /// (already detached or evicted).
    pub(crate) fn detach(
        &self,
        id: SubscriberId,
    ) -> bool {
        let mut state = self.state.lock();
        let before = state.subscribers.len();
        state.subscribers.retain(|s| s.id() != id);

        let removed = state.subscribers.len() != before;
        if removed {
            ACTIVE_SUBSCRIBERS.dec();
            debug!(subscriber_id = %id, path = %self.path.display(), "subscriber detached");
        }
        removed
    }

    /// Moves to `Stopped`, drops every remaining subscriber queue and ends the
    /// detection loop, which closes the file. Idempotent.
    pub(crate) fn stop(&self) {
        let mut state = self.state.lock();
        self.stop_locked(&mut state);
    }

    fn stop_locked(
        &self,
        state: &mut WatcherState,
    ) {
        if state.status == WatcherStatus::Stopped {
            return;
        }

        if state.status == WatcherStatus::Running {
            ACTIVE_WATCHERS.dec();
        }
        state.status = WatcherStatus::Stopped;

        let dropped = state.subscribers.len();
        state.subscribers.clear();
        ACTIVE_SUBSCRIBERS.sub(dropped as i64);

        self.shutdown.cancel();
        debug!(path = %self.path.display(), dropped, "watcher stopped");
    }

    /// Detection loop. Owns the file handle for its whole life.
    pub(crate) async fn run(
        self: Arc<Self>,
        mut file: File,
    ) {
        let mut ticker = interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures = ReadFailures::new(self.config.max_consecutive_read_failures);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.poll(&mut file).await {
                Ok(()) => failures.succeeded(),
                Err(e) => {
                    let give_up = failures.failed();
                    READ_ERRORS.inc();
                    warn!(
                        path = %self.path.display(),
                        error = %e,
                        attempt = failures.count(),
                        "failed to read appended bytes"
                    );

                    if give_up {
                        error!(
                            path = %self.path.display(),
                            failures = failures.count(),
                            "giving up on file after repeated read failures"
                        );
                        self.stop();
                        break;
                    }
                }
            }
        }

        trace!(path = %self.path.display(), "detection loop exited");
    }

    /// One detection cycle: reads until caught up with the current size.
    async fn poll(
        &self,
        file: &mut File,
    ) -> std::io::Result<()> {
        loop {
            if self.shutdown.is_cancelled() {
                return Ok(());
            }

            let size = file.metadata().await?.len();
            let offset = {
                let mut state = self.state.lock();
                if state.status != WatcherStatus::Running {
                    return Ok(());
                }
                if size < state.read_offset {
                    self.on_truncated(&mut state, size);
                }
                state.read_offset
            };

            if size <= offset {
                return Ok(());
            }

            let want = (size - offset).min(self.config.max_read_bytes_per_tick);
            let bytes = read_at(file, offset, want).await?;
            if bytes.is_empty() {
                return Ok(());
            }

            let caught_up = (bytes.len() as u64) < want || offset + want >= size;
            self.consume(&bytes);

            if caught_up {
                return Ok(());
            }
        }
    }

    fn on_truncated(
        &self,
        state: &mut WatcherState,
        size: u64,
    ) {
        let new_offset = match self.config.truncation_policy {
            TruncationPolicy::Resync => 0,
            TruncationPolicy::WaitForGrowth => size,
        };
        info!(
            path = %self.path.display(),
            previous_offset = state.read_offset,
            current_size = size,
            new_offset,
            "file truncated or rotated"
        );
        state.read_offset = new_offset;
        state.pending.clear();
    }

    /// Advances the read offset by `bytes` and broadcasts the lines they complete
    fn consume(
        &self,
        bytes: &[u8],
    ) {
        let mut state = self.state.lock();
        if state.status != WatcherStatus::Running {
            return;
        }

        state.read_offset += bytes.len() as u64;
        let lines: Vec<Line> = state.pending.push(bytes).into_iter().map(Line::from).collect();
        if lines.is_empty() {
            return;
        }

        let evicted = state.broadcast(&lines, &self.path);
        LINES_BROADCAST.inc_by(lines.len() as u64);
        if evicted > 0 {
            EVICTED_SUBSCRIBERS.inc_by(evicted as u64);
            ACTIVE_SUBSCRIBERS.sub(evicted as i64);

            // never keep reading for nobody; the registry replaces or reaps us
            if state.subscribers.is_empty() {
                info!(path = %self.path.display(), "every subscriber evicted");
                self.stop_locked(&mut state);
                return;
            }
        }

        trace!(
            path = %self.path.display(),
            lines = lines.len(),
            subscribers = state.subscribers.len(),
            offset = state.read_offset,
            "broadcast"
        );
    }
}

async fn read_at(
    file: &mut File,
    offset: u64,
    max_bytes: u64,
) -> std::io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset)).await?;

    let mut buffer = vec![0u8; max_bytes as usize];
    let mut total_read = 0usize;
    while total_read < buffer.len() {
        let n = file.read(&mut buffer[total_read..]).await?;
        if n == 0 {
            break;
        }
        total_read += n;
    }
    buffer.truncate(total_read);
    Ok(buffer)
}
