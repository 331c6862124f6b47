//! Configuration loading.
//!
//! The configuration file is YAML (plain JSON works too). `${VAR}` references
//! are resolved from the environment before parsing, which keeps credentials
//! out of the file.

mod vars;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::path::{Path, PathBuf};

use crate::error::{
    ConfigError, EmptyCursorFileSnafu, EmptyIndexNameSnafu, EmptySinkUrlSnafu,
    EnvInterpolationSnafu, ReadFileSnafu, YamlParseSnafu,
};
use crate::normalize::NormalizerConfig;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG: &str = "./config.yaml";

/// Default location of the cursor file.
pub const DEFAULT_CURSOR_FILE: &str = "./cursor";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the sink delivers documents.
    pub sink: SinkConfig,

    /// File holding the last delivered cursor.
    #[serde(default = "default_cursor_file")]
    pub cursor_file: PathBuf,

    /// Try to extract a JSON object from each message.
    #[serde(default)]
    pub parse_json_messages: bool,

    /// How the journal is read.
    #[serde(default)]
    pub journal: JournalConfig,

    /// Metrics configuration (optional, disabled by default).
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Normalize entries without delivering them or advancing the cursor.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_cursor_file() -> PathBuf {
    PathBuf::from(DEFAULT_CURSOR_FILE)
}

/// Elasticsearch sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Base URL of the cluster, e.g. `http://127.0.0.1:9200`.
    pub url: String,

    /// Index name prefix; documents go to `{name}-YYYY.MM.DD`.
    #[serde(default = "default_index_name")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Per-request timeout in seconds (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_index_name() -> String {
    "journalbeat".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Journal reader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    /// journalctl binary to run (default: `journalctl` from `PATH`).
    #[serde(default = "default_journal_command")]
    pub command: String,

    /// Read journal files from this directory instead of the system journal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            command: default_journal_command(),
            directory: None,
        }
    }
}

fn default_journal_command() -> String {
    "journalctl".to_string()
}

/// Metrics configuration for the Prometheus endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Address to bind the metrics HTTP server (default: "0.0.0.0:9090").
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: default_metrics_address(),
        }
    }
}

fn default_metrics_address() -> String {
    "0.0.0.0:9090".to_string()
}

impl Config {
    /// Load configuration from a file, resolving environment variables.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
        Self::from_str_with_env(&content)
    }

    /// Parse configuration text, resolving environment variables.
    pub fn from_str_with_env(content: &str) -> Result<Self, ConfigError> {
        let content = vars::interpolate(content).map_err(|missing| {
            let message = missing
                .iter()
                .map(|name| format!("environment variable '{name}' is not set"))
                .collect::<Vec<_>>()
                .join("\n");
            EnvInterpolationSnafu { message }.build()
        })?;

        let config: Config = serde_yaml::from_str(&content).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.sink.url.trim().is_empty(), EmptySinkUrlSnafu);
        ensure!(!self.sink.name.trim().is_empty(), EmptyIndexNameSnafu);
        ensure!(
            !self.cursor_file.as_os_str().is_empty(),
            EmptyCursorFileSnafu
        );
        Ok(())
    }

    /// The configuration printed by `--print-config`.
    pub fn sample() -> Self {
        Self {
            sink: SinkConfig {
                url: "http://127.0.0.1:9200".to_string(),
                name: default_index_name(),
                username: None,
                password: None,
                timeout_secs: default_timeout_secs(),
            },
            cursor_file: default_cursor_file(),
            parse_json_messages: false,
            journal: JournalConfig::default(),
            metrics: MetricsConfig::default(),
            dry_run: false,
        }
    }

    /// Render as YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).context(YamlParseSnafu)
    }

    pub fn normalizer(&self) -> NormalizerConfig {
        NormalizerConfig {
            parse_json_messages: self.parse_json_messages,
        }
    }
}
