//! Engine configuration
//!
//! `EngineConfig` is per-executor; nothing here is global. It can be built in
//! code or read from a TOML file with a `[batch]` table:
//!
//! ```toml
//! [batch]
//! max_binds_per_query = 500
//! redact_bind_values = true
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlbatch_core::{BindSet, Connection, RedactedBindSet};

use crate::error::{BatchError, BatchResult};

/// Default cap on bind sets per physical call
pub const DEFAULT_MAX_BINDS_PER_QUERY: usize = 500;

/// Batch engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Largest number of bind sets sent to the engine in one chunk
    pub max_binds_per_query: usize,
    /// Whether error reports hide literal bind values. Logs always do.
    pub redact_bind_values: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_binds_per_query: DEFAULT_MAX_BINDS_PER_QUERY,
            redact_bind_values: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    batch: EngineConfig,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the chunk size; values below 1 are raised to 1
    pub fn with_max_binds_per_query(mut self, max: usize) -> Self {
        self.max_binds_per_query = max.max(1);
        self
    }

    pub fn with_redact_bind_values(mut self, redact: bool) -> Self {
        self.redact_bind_values = redact;
        self
    }

    /// Parse a configuration from TOML text.
    ///
    /// A missing `[batch]` table or missing keys fall back to defaults. An
    /// explicit `max_binds_per_query = 0` is rejected.
    pub fn from_toml_str(text: &str) -> BatchResult<Self> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| BatchError::Config(e.message().to_string()))?;
        file.batch.validate()
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml_str(&text).with_context(|| format!("Invalid config file: {:?}", path))
    }

    /// Load the file at `default_path()`, or defaults when it does not exist
    pub fn load_or_default() -> anyhow::Result<Self> {
        let path = default_path()?;
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    fn validate(self) -> BatchResult<Self> {
        if self.max_binds_per_query == 0 {
            return Err(BatchError::Config(
                "max_binds_per_query must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }

    /// Report form of a bind set, honoring `redact_bind_values`
    pub(crate) fn report_binds(&self, binds: &BindSet) -> RedactedBindSet {
        if self.redact_bind_values {
            binds.redacted()
        } else {
            binds.revealed()
        }
    }
}

/// Location of the user configuration file (`<config dir>/sqlbatch/config.toml`)
pub fn default_path() -> anyhow::Result<PathBuf> {
    dirs::config_dir()
        .context("Could not determine config directory")
        .map(|p| p.join("sqlbatch").join("config.toml"))
}

/// Per-call execution options
#[derive(Clone)]
pub struct ExecuteOptions {
    /// Caller-owned connection; never closed by the executor
    pub connection: Option<Arc<dyn Connection>>,
    /// Whether the executor opens and finishes a transaction per chunk
    pub manage_transaction: bool,
    /// Whether read cursors are drained and released before `execute` returns
    pub eager_close: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            connection: None,
            manage_transaction: true,
            eager_close: true,
        }
    }
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connection(mut self, connection: Arc<dyn Connection>) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn with_manage_transaction(mut self, manage: bool) -> Self {
        self.manage_transaction = manage;
        self
    }

    pub fn with_eager_close(mut self, eager: bool) -> Self {
        self.eager_close = eager;
        self
    }
}

impl std::fmt::Debug for ExecuteOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecuteOptions")
            .field(
                "connection",
                &self.connection.as_ref().map(|c| c.driver_name().to_string()),
            )
            .field("manage_transaction", &self.manage_transaction)
            .field("eager_close", &self.eager_close)
            .finish()
    }
}
