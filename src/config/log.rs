use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    /// Directory for `logfetcher.log`; stderr when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// `tracing_subscriber::EnvFilter` directive, e.g. "info,logfetcher=debug".
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: None,
            filter: default_filter(),
        }
    }
}

impl LogConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(dir) = &self.dir {
            if dir.as_os_str().is_empty() {
                return Err(Error::InvalidConfig("log.dir path cannot be empty".into()));
            }
        }

        if self.filter.trim().is_empty() {
            return Err(Error::InvalidConfig("log.filter cannot be empty".into()));
        }

        Ok(())
    }
}

fn default_filter() -> String {
    "info".to_string()
}
