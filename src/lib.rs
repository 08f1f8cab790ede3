//! # logfetcher
//!
//! Remote log-tailing engine. Streams newly appended lines of a file to any
//! number of independent subscribers, optionally prefaced by the file's most
//! recent existing lines.
//!
//! ```text
//! TailHandler::tail ──► offset replay ──► sink
//!        │
//!        └──► Registry ──► Watcher (one per path) ──► Subscriber queues ──► sinks
//!
//! Connection::close ──► delivery task stops ──► Registry::unsubscribe
//! ```
//!
//! The transport that accepts connections and marshals lines to remote
//! callbacks is left to the host process; it plugs in through [`LineSink`]
//! and [`Connection`].

mod config;
mod constants;
mod errors;
mod handler;
mod metrics;
mod reader;
mod registry;
mod subscriber;
pub mod utils;
mod watcher;

pub use config::*;
pub use errors::*;
pub use handler::*;
pub use metrics::gather_metrics;
pub use reader::*;
pub use registry::*;
pub use subscriber::FnSink;
pub use subscriber::Line;
pub use subscriber::LineSink;
pub use subscriber::Subscriber;
pub use subscriber::SubscriberId;
pub use utils::init_observability;
pub use watcher::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
