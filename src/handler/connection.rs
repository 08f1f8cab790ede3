use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use tokio_util::sync::CancellationToken;

static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Liveness token for one transport connection.
///
/// The transport creates one per accepted connection, passes it with every
/// tail request made over that connection and calls [`Connection::close`]
/// when the peer goes away. Every subscriber created through it then detaches.
/// Clones share the same state.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    token: CancellationToken,
}

impl Connection {
    pub fn new() -> Self {
        Self {
            id: ConnectionId(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed)),
            token: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Signals the disconnect. Idempotent.
    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the connection is closed
    pub async fn closed(&self) {
        self.token.cancelled().await
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}
