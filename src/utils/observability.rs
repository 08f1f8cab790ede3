use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

use super::file_io::open_file_for_append;
use crate::constants::LOG_FILE_NAME;
use crate::Error;
use crate::LogConfig;
use crate::Result;

/// Builds the filter: `RUST_LOG` wins over the configured directive.
pub(crate) fn env_filter(config: &LogConfig) -> Result<EnvFilter> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directive) if !directive.is_empty() => EnvFilter::try_new(directive),
        _ => EnvFilter::try_new(&config.filter),
    };
    filter.map_err(|e| Error::InvalidConfig(format!("log filter: {e}")))
}

/// Installs the global tracing subscriber.
///
/// With `log.dir` set, events go to `<dir>/logfetcher.log` through a
/// non-blocking writer whose guard must be held until exit. Otherwise they go
/// to stderr and no guard is returned.
pub fn init_observability(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = env_filter(config)?;

    match &config.dir {
        Some(dir) => {
            let log_file = open_file_for_append(&dir.join(LOG_FILE_NAME))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(filter);
            tracing_subscriber::registry()
                .with(layer)
                .try_init()
                .map_err(|e| Error::Fatal(format!("tracing subscriber: {e}")))?;
            Ok(Some(guard))
        }
        None => {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter);
            tracing_subscriber::registry()
                .with(layer)
                .try_init()
                .map_err(|e| Error::Fatal(format!("tracing subscriber: {e}")))?;
            Ok(None)
        }
    }
}
