//! Path -> watcher registry.
//!
//! Guarantees at most one running [`Watcher`] per path. Insertion and the first
//! attach happen under the same map-entry lock, and so do the last detach and
//! the removal (`DashMap::remove_if`), so no subscriber can join a watcher
//! between "set became empty" and "watcher removed".
//!
//! A new watcher opens its file before the entry lock is taken, so a slow
//! filesystem never stalls other paths of the same shard. When two subscribes
//! race, the loser's unused watcher is stopped before it ever runs.
//!
//! Lock order is always map entry, then watcher state. The watcher never
//! touches the map while holding its own lock.


use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Weak;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;
use tracing::info;

use crate::Result;
use crate::Subscriber;
use crate::SubscriberId;
use crate::TailConfig;
use crate::TailError;
use crate::Watcher;

/// Result of a successful subscribe
#[derive(Debug, Clone)]
pub struct Attachment {
    pub subscriber_id: SubscriberId,
    pub watcher: Arc<Watcher>,
    /// Lines before this byte offset are not broadcast to the new subscriber
    pub replay_boundary: u64,
}

#[derive(Debug)]
struct RegistryInner {
    watchers: DashMap<PathBuf, Arc<Watcher>>,
    config: TailConfig,
}

impl RegistryInner {
    /// Drops the entry for `path` if it still points at `watcher`
    fn reap(
        &self,
        path: &Path,
        watcher: &Arc<Watcher>,
    ) {
        if self.watchers.remove_if(path, |_, current| Arc::ptr_eq(current, watcher)).is_some() {
            debug!(path = %path.display(), "reaped stopped watcher");
        }
    }
}

/// Cheaply cloneable handle; clones share the same map.
#[derive(Debug, Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    /// Fails with [`crate::Error::InvalidConfig`] on unusable tuning
    pub fn new(config: TailConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(RegistryInner {
                watchers: DashMap::new(),
                config,
            }),
        })
    }

    pub fn config(&self) -> &TailConfig {
        &self.inner.config
    }

    /// Attaches `subscriber` to the watcher of `path`, starting one if none is
    /// running. Fails without side effects when the file cannot be opened.
    pub fn subscribe(
        &self,
        path: &Path,
        subscriber: Subscriber,
    ) -> Result<Attachment> {
        let subscriber_id = subscriber.id();
        let subscriber = match self.attach_running(path, subscriber) {
            Ok(attachment) => return Ok(attachment),
            Err(subscriber) => subscriber,
        };

        let fresh = Arc::new(Watcher::new(path.to_path_buf(), self.inner.config.clone()));
        let file = fresh.start()?;

        let (watcher, replay_boundary) = match self.inner.watchers.entry(path.to_path_buf()) {
            Entry::Occupied(mut entry) => match entry.get().attach(subscriber) {
                Ok(boundary) => {
                    // another subscribe won the race
                    fresh.stop();
                    (Arc::clone(entry.get()), boundary)
                }
                Err(subscriber) => {
                    // stopped on its own and not reaped yet
                    let boundary = Self::attach_fresh(&fresh, subscriber)?;
                    entry.insert(Arc::clone(&fresh));
                    self.spawn_detection(Arc::clone(&fresh), file);
                    (fresh, boundary)
                }
            },
            Entry::Vacant(entry) => {
                let boundary = Self::attach_fresh(&fresh, subscriber)?;
                entry.insert(Arc::clone(&fresh));
                self.spawn_detection(Arc::clone(&fresh), file);
                (fresh, boundary)
            }
        };

        Ok(Attachment {
            subscriber_id,
            watcher,
            replay_boundary,
        })
    }

    /// Detaches a subscriber; stops and removes the watcher when it was the
    /// last one. Returns false when the subscriber was not attached.
    /// Idempotent.
    pub fn unsubscribe(
        &self,
        path: &Path,
        id: SubscriberId,
    ) -> bool {
        let mut detached = false;
        let removed = self.inner.watchers.remove_if(path, |_, watcher| {
            detached = watcher.detach(id);
            if watcher.subscriber_count() == 0 {
                watcher.stop();
                true
            } else {
                false
            }
        });

        if removed.is_some() {
            info!(path = %path.display(), "last subscriber left, watcher torn down");
        }
        detached
    }

    pub fn watcher(
        &self,
        path: &Path,
    ) -> Option<Arc<Watcher>> {
        self.inner.watchers.get(path).map(|w| Arc::clone(w.value()))
    }

    pub fn contains(
        &self,
        path: &Path,
    ) -> bool {
        self.inner.watchers.contains_key(path)
    }

    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.len()
    }

    /// Subscribers currently attached to the watcher of `path`, 0 if none
    pub fn subscriber_count(
        &self,
        path: &Path,
    ) -> usize {
        self.inner.watchers.get(path).map(|w| w.subscriber_count()).unwrap_or(0)
    }

    /// Stops every watcher and empties the map
    pub fn shutdown(&self) {
        let count = self.inner.watchers.len();
        self.inner.watchers.retain(|_, watcher| {
            watcher.stop();
            false
        });
        info!(count, "registry shut down");
    }

    /// Attaches to the current watcher of `path` if it is running. The read
    /// guard keeps `unsubscribe` from removing it meanwhile.
    fn attach_running(
        &self,
        path: &Path,
        subscriber: Subscriber,
    ) -> std::result::Result<Attachment, Subscriber> {
        let Some(entry) = self.inner.watchers.get(path) else {
            return Err(subscriber);
        };

        let subscriber_id = subscriber.id();
        let replay_boundary = entry.attach(subscriber)?;
        Ok(Attachment {
            subscriber_id,
            watcher: Arc::clone(entry.value()),
            replay_boundary,
        })
    }

    /// Spawns the detection loop of a started watcher. The task removes its
    /// own entry once the loop exits, unless a newer watcher replaced it.
    fn spawn_detection(
        &self,
        watcher: Arc<Watcher>,
        file: tokio::fs::File,
    ) {
        let inner: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        let path = watcher.path().to_path_buf();
        info!(path = %path.display(), "watcher created");

        tokio::spawn(async move {
            Arc::clone(&watcher).run(file).await;
            if let Some(inner) = inner.upgrade() {
                inner.reap(&path, &watcher);
            }
        });
    }

    fn attach_fresh(
        watcher: &Arc<Watcher>,
        subscriber: Subscriber,
    ) -> Result<u64> {
        watcher.attach(subscriber).map_err(|_| {
            watcher.stop();
            TailError::WatcherStopped {
                path: watcher.path().to_path_buf(),
            }
            .into()
        })
    }
}
