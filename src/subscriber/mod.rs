//! Subscriber management for tail requests
//!
//! Each tail request gets a `Subscriber` on the watcher side, holding:
//! - Unique ID for the request
//! - Bounded channel sender the watcher broadcasts into
//!
//! and a [`Delivery`] task on the consumer side that drains the channel into
//! the request's [`LineSink`] until the connection closes or the sink fails.
//! A slow sink only ever fills its own queue.

mod sink;
pub use sink::*;


use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;
use tracing::warn;

use crate::Connection;
use crate::Registry;

/// Counter for generating unique subscriber IDs
static SUBSCRIBER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A line shared by every subscriber of one broadcast
pub type Line = Arc<str>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    fn next() -> Self {
        Self(SUBSCRIBER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of handing a line to a subscriber's queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Offer {
    Queued,
    /// Queue full; the subscriber fell too far behind
    Overflow,
    /// Delivery side is gone
    Closed,
}

/// Watcher-side half of a subscriber
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    sender: mpsc::Sender<Line>,
}

impl Subscriber {
    /// Creates a subscriber with a queue of `buffer_size` lines and returns
    /// the receiving end for its delivery task.
    pub fn channel(buffer_size: usize) -> (Self, mpsc::Receiver<Line>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        (
            Self {
                id: SubscriberId::next(),
                sender,
            },
            receiver,
        )
    }

    #[inline]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Non-blocking hand-off used by the broadcast loop
    #[inline]
    pub(crate) fn offer(
        &self,
        line: &Line,
    ) -> Offer {
        match self.sender.try_send(Arc::clone(line)) {
            Ok(()) => Offer::Queued,
            Err(TrySendError::Full(_)) => Offer::Overflow,
            Err(TrySendError::Closed(_)) => Offer::Closed,
        }
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Consumer-side half of a subscriber: forwards queued lines to the sink in
/// order, then detaches the subscriber from the registry exactly when it stops.
pub(crate) struct Delivery {
    pub(crate) id: SubscriberId,
    pub(crate) path: PathBuf,
    pub(crate) receiver: mpsc::Receiver<Line>,
    pub(crate) sink: Arc<dyn LineSink>,
    pub(crate) connection: Connection,
    pub(crate) registry: Registry,
}

impl Delivery {
    pub(crate) async fn run(mut self) {
        loop {
            let line = tokio::select! {
                biased;
                _ = self.connection.closed() => {
                    debug!(subscriber_id = %self.id, connection_id = %self.connection.id(), "connection closed");
                    break;
                }
                line = self.receiver.recv() => match line {
                    Some(line) => line,
                    None => {
                        debug!(subscriber_id = %self.id, path = %self.path.display(), "subscriber queue closed by watcher");
                        break;
                    }
                },
            };

            let result = tokio::select! {
                biased;
                _ = self.connection.closed() => break,
                result = self.sink.deliver(line.to_string()) => result,
            };

            if let Err(e) = result {
                warn!(subscriber_id = %self.id, path = %self.path.display(), error = %e, "sink rejected line, detaching subscriber");
                break;
            }
        }

        self.registry.unsubscribe(&self.path, self.id);
    }
}
