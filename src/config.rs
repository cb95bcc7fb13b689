use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;

/// Shortest coalescing window the badge writer accepts.
pub const MIN_BADGE_DEBOUNCE_MS: u64 = 200;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub azure: AzureConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub badge: BadgeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Azure DevOps connection settings. `organization`, `project_name` and
/// `board_name` are the defaults the preference store falls back to.
#[derive(Deserialize, Clone)]
pub struct AzureConfig {
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub board_name: String,
    #[serde(default = "default_api_root")]
    pub api_root: String,
    /// Personal access token. Requests go out unauthenticated without it.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_exclude_self_authored")]
    pub exclude_self_authored: bool,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            organization: String::new(),
            project_name: String::new(),
            board_name: String::new(),
            api_root: default_api_root(),
            token: None,
            exclude_self_authored: default_exclude_self_authored(),
        }
    }
}

impl AzureConfig {
    /// The personal access token, treating an empty value as unset.
    pub fn access_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}

// Manual Debug impl to avoid leaking the access token
impl std::fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureConfig")
            .field("organization", &self.organization)
            .field("project_name", &self.project_name)
            .field("board_name", &self.board_name)
            .field("api_root", &self.api_root)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("exclude_self_authored", &self.exclude_self_authored)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollConfig {
    #[serde(default = "default_interval_secs")]
    pub repositories_interval_secs: u64,
    #[serde(default = "default_interval_secs")]
    pub pull_requests_interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            repositories_interval_secs: default_interval_secs(),
            pull_requests_interval_secs: default_interval_secs(),
        }
    }
}

impl PollConfig {
    pub fn repositories_interval(&self) -> Duration {
        Duration::from_secs(self.repositories_interval_secs.max(1))
    }

    pub fn pull_requests_interval(&self) -> Duration {
        Duration::from_secs(self.pull_requests_interval_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BadgeConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Write the badge text to this file instead of the log.
    #[serde(default)]
    pub output_path: Option<PathBuf>,
}

impl Default for BadgeConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            output_path: None,
        }
    }
}

impl BadgeConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.max(MIN_BADGE_DEBOUNCE_MS))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7878
}

fn default_api_root() -> String {
    "https://dev.azure.com".to_string()
}

fn default_exclude_self_authored() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    30
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("azure-prs-state.json")
}

fn default_debounce_ms() -> u64 {
    MIN_BADGE_DEBOUNCE_MS
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("azure-prs").required(false));
        }

        // Environment variable overrides with AZURE_PRS_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("AZURE_PRS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}
