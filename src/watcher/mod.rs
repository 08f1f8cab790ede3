//! Per-file growth detection and fan-out.
//!
//! A [`Watcher`] owns the open handle of one file, the number of bytes already
//! consumed and the pending partial line, plus the subscribers attached to it.
//! Its detection loop runs as one tokio task:
//!
//! ```text
//! tick ──► stat ──► size > read_offset? ──► read delta ──► LineBuffer
//!                                                              │
//!                                                 complete lines (file order)
//!                                                              │
//!                                       try_send to every attached subscriber
//! ```
//!
//! Lifecycle is `Idle -> Running -> Stopped`; a stopped watcher is never
//! restarted, the registry creates a fresh one instead.

mod watcher;
pub use watcher::*;
