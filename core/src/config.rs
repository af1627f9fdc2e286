//! Configuration
//!
//! Layered with increasing precedence:
//! 1. Built-in defaults
//! 2. TOML file: explicit path, else `TRELLIS_CONFIG_PATH`, else `./trellis.toml` if present
//! 3. Environment variables prefixed `TRELLIS_`, nested with `__`
//!    (e.g. `TRELLIS_RENDER__MAX_PASSES=10`)
//! 4. Builder overrides

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use config::{Environment, File};
use serde::{Deserialize, Serialize};

use crate::logging::LoggingConfig;
use crate::render::RenderOptions;

const ENV_PREFIX: &str = "TRELLIS";
const CONFIG_PATH_VAR: &str = "TRELLIS_CONFIG_PATH";
const DEFAULT_CONFIG_BASENAME: &str = "trellis";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub render: RenderOptions,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load from the default file search and the process environment
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    fn validate(&self) -> Result<()> {
        if self.render.max_passes == Some(0) {
            bail!("render.max_passes must be at least 1");
        }
        self.logging.level_filter()?;
        Ok(())
    }

    /// Effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    max_passes: Option<usize>,
    log_level: Option<String>,
    environment: Option<HashMap<String, String>>,
}

impl ConfigBuilder {
    /// Set the config file path (overrides default search)
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn max_passes(mut self, limit: Option<usize>) -> Self {
        self.max_passes = limit;
        self
    }

    pub fn log_level(mut self, level: Option<String>) -> Self {
        self.log_level = level;
        self
    }

    /// Read variables from `vars` instead of the process environment
    pub fn environment(mut self, vars: HashMap<String, String>) -> Self {
        self.environment = Some(vars);
        self
    }

    pub fn build(self) -> Result<Config> {
        let path = self
            .config_path
            .clone()
            .or_else(|| self.env_var(CONFIG_PATH_VAR).map(PathBuf::from));

        let mut builder = config::Config::builder();
        builder = match &path {
            Some(path) => builder.add_source(File::from(path.as_path()).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false)),
        };
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(self.environment.clone()),
        );

        let mut config: Config = builder
            .build()
            .and_then(|raw| raw.try_deserialize())
            .with_context(|| match &path {
                Some(path) => format!("Failed to load configuration from {}", path.display()),
                None => "Failed to load configuration".to_string(),
            })?;

        if let Some(limit) = self.max_passes {
            config.render.max_passes = Some(limit);
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }

    fn env_var(&self, key: &str) -> Option<String> {
        match &self.environment {
            Some(vars) => vars.get(key).cloned(),
            None => std::env::var(key).ok(),
        }
    }
}
