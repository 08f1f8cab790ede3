//! Boundary-facing tail operation.
//!
//! The transport adapter turns each inbound `tail` call into a [`TailRequest`]
//! and hands it to [`TailHandler::tail`] together with the [`Connection`] it
//! arrived on. The handler validates the path, registers a subscriber, replays
//! the requested trailing lines straight into the sink and only then starts
//! the subscriber's live delivery, so replayed lines always come first.

mod connection;
pub use connection::*;


use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::metrics::REPLAYED_LINES;
use crate::reader::offset_lines_before;
use crate::subscriber::Delivery;
use crate::LineSink;
use crate::Registry;
use crate::Result;
use crate::Subscriber;
use crate::SubscriberId;
use crate::TailConfig;
use crate::TailError;

pub struct TailRequest {
    pub path: PathBuf,
    /// Number of trailing lines to replay before live delivery; 0 disables replay
    pub line_offset: usize,
    /// Remote callback every line is delivered to
    pub watch: Arc<dyn LineSink>,
}

impl TailRequest {
    pub fn new(
        path: impl Into<PathBuf>,
        watch: impl LineSink,
    ) -> Self {
        Self {
            path: path.into(),
            line_offset: 0,
            watch: Arc::new(watch),
        }
    }

    pub fn with_line_offset(
        mut self,
        line_offset: usize,
    ) -> Self {
        self.line_offset = line_offset;
        self
    }
}

impl fmt::Debug for TailRequest {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("TailRequest")
            .field("path", &self.path)
            .field("line_offset", &self.line_offset)
            .finish_non_exhaustive()
    }
}

/// Acknowledgement returned once the subscription is live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailAck {
    pub subscriber_id: SubscriberId,
    /// Canonical path the subscription is registered under
    pub path: PathBuf,
    /// Lines delivered through replay
    pub replayed: usize,
}

#[derive(Debug, Clone)]
pub struct TailHandler {
    registry: Registry,
}

impl TailHandler {
    /// Fails with [`crate::Error::InvalidConfig`] on unusable tuning
    pub fn new(config: TailConfig) -> Result<Self> {
        Ok(Self {
            registry: Registry::new(config)?,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Starts tailing `request.path` for `connection`.
    ///
    /// Replayed lines are delivered to the sink before this returns. On error,
    /// on disconnect during replay and when the returned future is dropped
    /// early, nothing stays registered.
    pub async fn tail(
        &self,
        request: TailRequest,
        connection: &Connection,
    ) -> Result<TailAck> {
        let TailRequest {
            path,
            line_offset,
            watch,
        } = request;

        let path = resolve(&path)?;
        if connection.is_closed() {
            return Err(TailError::ConnectionClosed.into());
        }

        let mut replay_file = if line_offset > 0 {
            Some(std::fs::File::open(&path).map_err(|e| TailError::from_open(path.clone(), e))?)
        } else {
            None
        };

        let (subscriber, receiver) = Subscriber::channel(self.registry.config().subscriber_buffer_size);
        let attachment = self.registry.subscribe(&path, subscriber)?;
        let subscriber_id = attachment.subscriber_id;
        let registration = Registration {
            registry: &self.registry,
            path: &path,
            id: subscriber_id,
            armed: true,
        };

        let mut replayed = 0;
        if let Some(file) = replay_file.as_mut() {
            let lines = offset_lines_before(file, line_offset, attachment.replay_boundary).map_err(|e| {
                TailError::Unreadable {
                    path: path.clone(),
                    source: e,
                }
            })?;

            for line in lines {
                let delivered = tokio::select! {
                    biased;
                    _ = connection.closed() => {
                        debug!(subscriber_id = %subscriber_id, path = %path.display(), "connection closed during replay");
                        return Err(TailError::ConnectionClosed.into());
                    }
                    result = watch.deliver(line) => result,
                };
                if let Err(e) = delivered {
                    warn!(subscriber_id = %subscriber_id, path = %path.display(), error = %e, "sink rejected replayed line");
                    return Err(e);
                }
                replayed += 1;
            }
            REPLAYED_LINES.inc_by(replayed as u64);
        }
        registration.disarm();

        let delivery = Delivery {
            id: subscriber_id,
            path: path.clone(),
            receiver,
            sink: watch,
            connection: connection.clone(),
            registry: self.registry.clone(),
        };
        tokio::spawn(delivery.run());

        debug!(
            subscriber_id = %subscriber_id,
            connection_id = %connection.id(),
            path = %path.display(),
            replayed,
            "tail started"
        );

        Ok(TailAck {
            subscriber_id,
            path,
            replayed,
        })
    }

    /// Disconnect notification from the transport: every subscriber created
    /// through `connection` detaches. Idempotent.
    pub fn disconnect(
        &self,
        connection: &Connection,
    ) {
        if !connection.is_closed() {
            debug!(connection_id = %connection.id(), "connection dropped");
        }
        connection.close();
    }

    /// Stops every watcher. Pending deliveries end once their queues drain.
    pub fn shutdown(&self) {
        info!(watchers = self.registry.watcher_count(), "tail handler shutting down");
        self.registry.shutdown();
    }
}

/// Subscriber registered by an unfinished `tail`. Unsubscribes on drop unless
/// its delivery task took over.
struct Registration<'a> {
    registry: &'a Registry,
    path: &'a Path,
    id: SubscriberId,
    armed: bool,
}

impl Registration<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!(subscriber_id = %self.id, path = %self.path.display(), "rolling back subscription");
            self.registry.unsubscribe(self.path, self.id);
        }
    }
}

/// Checks that `path` names an existing regular file and returns its
/// canonical form, so different spellings share one watcher.
fn resolve(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(TailError::EmptyPath.into());
    }

    let canonical = std::fs::canonicalize(path).map_err(|e| TailError::from_open(path.to_path_buf(), e))?;
    let metadata = std::fs::metadata(&canonical).map_err(|e| TailError::from_open(canonical.clone(), e))?;
    if !metadata.is_file() {
        return Err(TailError::NotAFile { path: canonical }.into());
    }

    Ok(canonical)
}
