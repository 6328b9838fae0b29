//! Settings read through the `config` crate: an optional TOML file, then
//! `TAGSTACK_*` environment variables (nested keys separated by `__`).

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Diagnostic name of the engine, generated when absent.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub stress: StressSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StressSettings {
    /// 0 picks 2 x (available parallelism + 1).
    #[serde(default)]
    pub threads: usize,
    #[serde(default = "items_per_thread")]
    pub items_per_thread: usize,
}

fn log_filter() -> String {
    "info".to_string()
}

fn items_per_thread() -> usize {
    500_000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: None,
            log_filter: log_filter(),
            stress: StressSettings::default(),
        }
    }
}

impl Default for StressSettings {
    fn default() -> Self {
        Self {
            threads: 0,
            items_per_thread: items_per_thread(),
        }
    }
}

impl StressSettings {
    pub fn thread_count(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        (parallelism + 1) * 2
    }
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix("TAGSTACK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}
