use crate::core::{NtliteError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Path value that opens a transient in-process store.
pub const MEMORY_PATH: &str = ":memory:";

const JOURNAL_MODES: &[&str] = &["DELETE", "TRUNCATE", "PERSIST", "MEMORY", "WAL", "OFF"];

/// How a transaction is opened before a data-modifying statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionMode {
    /// `BEGIN DEFERRED`
    #[default]
    Deferred,
    /// `BEGIN IMMEDIATE`
    Immediate,
    /// `BEGIN EXCLUSIVE`
    Exclusive,
    /// Never begin implicitly; every statement commits on its own.
    Autocommit,
}

impl TransactionMode {
    /// The statement issued to open a transaction, if any.
    pub fn begin_sql(self) -> Option<&'static str> {
        match self {
            TransactionMode::Deferred => Some("BEGIN DEFERRED"),
            TransactionMode::Immediate => Some("BEGIN IMMEDIATE"),
            TransactionMode::Exclusive => Some("BEGIN EXCLUSIVE"),
            TransactionMode::Autocommit => None,
        }
    }
}

/// Settings applied when a handle opens its connection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HandleConfig {
    pub path: String,
    pub transaction_mode: TransactionMode,
    pub busy_timeout_ms: u64,
    pub foreign_keys: Option<bool>,
    pub journal_mode: Option<String>,
}

impl Default for HandleConfig {
    fn default() -> Self {
        HandleConfig {
            path: MEMORY_PATH.to_string(),
            transaction_mode: TransactionMode::default(),
            busy_timeout_ms: 5000,
            foreign_keys: None,
            journal_mode: None,
        }
    }
}

impl HandleConfig {
    /// Default settings for the store at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        HandleConfig {
            path: path.into(),
            ..HandleConfig::default()
        }
    }

    pub fn with_transaction_mode(mut self, mode: TransactionMode) -> Self {
        self.transaction_mode = mode;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = Some(enabled);
        self
    }

    pub fn with_journal_mode(mut self, mode: impl Into<String>) -> Self {
        self.journal_mode = Some(mode.into());
        self
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn is_memory(&self) -> bool {
        self.path == MEMORY_PATH
    }

    /// Parses settings from TOML text and validates them.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: HandleConfig =
            toml::from_str(content).map_err(|e| NtliteError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads settings from a TOML file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// let config = ntlite::HandleConfig::load("ntlite.toml")?;
    /// # Ok::<(), ntlite::NtliteError>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        HandleConfig::from_toml_str(&content)
    }

    /// Checks values SQLite would otherwise reject or silently ignore.
    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(NtliteError::Config("path must not be empty".to_string()));
        }
        if let Some(mode) = &self.journal_mode {
            if !JOURNAL_MODES.contains(&mode.to_uppercase().as_str()) {
                return Err(NtliteError::Config(format!(
                    "unknown journal_mode '{}', expected one of {}",
                    mode,
                    JOURNAL_MODES.join(", ")
                )));
            }
        }
        Ok(())
    }
}
