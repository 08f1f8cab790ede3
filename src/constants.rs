// -
// Replay

/// Chunk size used when scanning a file backwards for its trailing lines
pub(crate) const REPLAY_CHUNK_SIZE: u64 = 8 * 1024;

// -
// Logging

/// File name used by the binary when `log.dir` is configured
pub(crate) const LOG_FILE_NAME: &str = "logfetcher.log";
