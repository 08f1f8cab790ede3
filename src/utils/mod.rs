pub mod file_io;
mod observability;

pub use observability::init_observability;
pub(crate) use observability::env_filter;
