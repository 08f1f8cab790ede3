//! Configuration management for the tailing engine.
//!
//! Provides hierarchical configuration loading from multiple sources with priority:
//! 1. Default values (hardcoded)
//! 2. `config/logfetcher` file in the working directory (optional)
//! 3. File named by the `CONFIG_PATH` environment variable
//! 4. Environment variables prefixed `LOGFETCHER__` (highest priority)
//!

mod log;
mod tail;
pub use log::*;
pub use tail::*;


//---
use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// Watcher and subscriber tuning
    #[serde(default)]
    pub tail: TailConfig,

    /// Log output for the binary
    #[serde(default)]
    pub log: LogConfig,
}

impl Settings {
    /// Load configuration from defaults, the optional local file, `CONFIG_PATH`
    /// and `LOGFETCHER__*` environment variables, in increasing priority.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder()
            .add_source(File::with_name("config/logfetcher").required(false));

        if let Ok(path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&path));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("LOGFETCHER")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Merge an additional configuration file on top of the current values.
    ///
    /// Environment variables are applied again afterwards so they keep the
    /// highest priority.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("LOGFETCHER")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.tail.validate()?;
        self.log.validate()?;
        Ok(())
    }
}
