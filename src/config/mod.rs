//! Configuration management.
//!
//! Two inputs configure a run:
//!
//! - the lookup file ([`LookupConfig`]): contact, journals, topics;
//! - optional runtime settings ([`Settings`]): a TOML file layered with
//!   environment variables such as `JOURNAL_LOOKUP__RETRIEVAL__MAX_ATTEMPTS=3`.
//!
//! # Settings File Format
//!
//! ```toml
//! [retrieval]
//! max_attempts = 2
//! backoff_secs = 10
//! pacing_secs = 1
//! retmax = 100000
//! timeout_secs = 30
//! tool = "journal-lookup"
//! # api_key = "your-ncbi-key"
//!
//! [report]
//! output = "publications.html"
//! format = "html"
//!
//! [report.budgets]
//! title = 75
//! abstract_text = 115
//! authors = 170
//! affiliations = 170
//! keywords = 100
//!
//! [logging]
//! level = "info"
//! ```

mod lookup_file;

pub use lookup_file::{LookupConfig, DEFAULT_LOOKUP_FILE};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::report::{LayoutBudgets, OutputFormat};
use crate::sources::EUTILS_BASE_URL;
use crate::utils::RetryPolicy;

/// Environment variable prefix for settings overrides
pub const ENV_PREFIX: &str = "JOURNAL_LOOKUP";

/// Configuration errors; always fatal and raised before any network activity
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{} not found", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },

    #[error("Lookup file is empty")]
    Empty,

    #[error(
        "Lookup file improperly formatted: expected three paragraphs separated by a blank line, found {0}"
    )]
    Sections(usize),

    #[error("Please provide exactly one contact e-mail (found {0} '@')")]
    Contact(usize),

    #[error("Lookup file has no {0}")]
    MissingSection(&'static str),

    #[error("Settings error: {0}")]
    Settings(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Settings(err.to_string())
    }
}

/// Build-time facts about the program, shown on the report's intro page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    /// Last update marker, `YYYYMMDD`
    pub updated: String,
}

impl AppInfo {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        updated: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            updated: updated.into(),
        }
    }
}

impl Default for AppInfo {
    fn default() -> Self {
        Self::new("Journal Lookup Tool", crate::VERSION, crate::LAST_UPDATED)
    }
}

/// Runtime settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub retrieval: RetrievalSettings,

    #[serde(default)]
    pub report: ReportSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Remote service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,

    #[serde(default = "default_pacing_secs")]
    pub pacing_secs: u64,

    #[serde(default = "default_retmax")]
    pub retmax: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_tool")]
    pub tool: String,

    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_attempts: default_max_attempts(),
            backoff_secs: default_backoff_secs(),
            pacing_secs: default_pacing_secs(),
            retmax: default_retmax(),
            timeout_secs: default_timeout_secs(),
            tool: default_tool(),
            api_key: None,
        }
    }
}

impl RetrievalSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .max_attempts(self.max_attempts)
            .backoff(Duration::from_secs(self.backoff_secs))
            .pacing(Duration::from_secs(self.pacing_secs))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String {
    EUTILS_BASE_URL.to_string()
}

fn default_max_attempts() -> u32 {
    2
}

fn default_backoff_secs() -> u64 {
    10
}

fn default_pacing_secs() -> u64 {
    1
}

fn default_retmax() -> u32 {
    100_000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_tool() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

/// Report output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSettings {
    #[serde(default = "default_output")]
    pub output: PathBuf,

    #[serde(default)]
    pub format: OutputFormat,

    #[serde(default)]
    pub budgets: LayoutBudgets,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            output: default_output(),
            format: OutputFormat::default(),
            budgets: LayoutBudgets::default(),
        }
    }
}

fn default_output() -> PathBuf {
    PathBuf::from("publications.html")
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load settings from an optional file plus environment overrides
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        builder = builder.add_source(config::File::from(path));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Default settings file location, if one exists
///
/// Checks `./journal-lookup.toml`, then `<config dir>/journal-lookup/settings.toml`.
pub fn find_settings_file() -> Option<PathBuf> {
    let local = PathBuf::from("journal-lookup.toml");
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("journal-lookup").join("settings.toml"))
        .filter(|path| path.is_file())
}
