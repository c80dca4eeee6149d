//! Configuration: an optional TOML file overlaid with environment variables.
//!
//! ```toml
//! [sanity]
//! project_id = "abc123"
//! dataset = "production"
//! api_version = "2024-07-01"
//!
//! [migration]
//! export_path = "./wordpress-export.xml"
//! default_language = "ja"
//! first_category_only = true
//! continue_on_error = true
//!
//! [http]
//! timeout_secs = 30
//! ```
//!
//! Environment variables win over the file. The write token is normally only
//! supplied through `SANITY_API_WRITE_TOKEN`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{MigrateError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "./wpmigrate.toml";

pub const ENV_PROJECT_ID: [&str; 2] = ["SANITY_PROJECT_ID", "NEXT_PUBLIC_SANITY_PROJECT_ID"];
pub const ENV_DATASET: [&str; 2] = ["SANITY_DATASET", "NEXT_PUBLIC_SANITY_DATASET"];
pub const ENV_TOKEN: &str = "SANITY_API_WRITE_TOKEN";
pub const ENV_EXPORT_PATH: &str = "WP_EXPORT_PATH";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub sanity: SanityConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SanityConfig {
    pub project_id: Option<String>,
    pub dataset: Option<String>,
    pub token: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Override for the API host, e.g. a local mock.
    pub api_host: Option<String>,
}

impl Default for SanityConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            dataset: None,
            token: None,
            api_version: default_api_version(),
            api_host: None,
        }
    }
}

fn default_api_version() -> String {
    "2024-07-01".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct MigrationConfig {
    pub export_path: Option<PathBuf>,
    #[serde(default = "default_language")]
    pub default_language: String,
    #[serde(default = "default_true")]
    pub first_category_only: bool,
    #[serde(default = "default_true")]
    pub continue_on_error: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            export_path: None,
            default_language: default_language(),
            first_category_only: true,
            continue_on_error: true,
        }
    }
}

fn default_language() -> String {
    "ja".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Per-request timeout. Unset means no timeout.
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            user_agent: default_user_agent(),
        }
    }
}

fn default_user_agent() -> String {
    format!("wpmigrate/{}", env!("CARGO_PKG_VERSION"))
}

impl HttpConfig {
    /// HTTP client shared by thumbnail downloads and the Sanity client.
    pub fn client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().user_agent(&self.user_agent);
        if let Some(secs) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(builder.build()?)
    }
}

/// Everything needed to write to Sanity, all present.
#[derive(Debug, Clone)]
pub struct SanityCredentials {
    pub project_id: String,
    pub dataset: String,
    pub token: String,
    pub api_version: String,
    pub api_host: Option<String>,
}

impl Config {
    /// Overlay environment variables read through `lookup`. Empty values
    /// count as unset.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = ENV_PROJECT_ID.iter().find_map(|n| get(*n)) {
            self.sanity.project_id = Some(v);
        }
        if let Some(v) = ENV_DATASET.iter().find_map(|n| get(*n)) {
            self.sanity.dataset = Some(v);
        }
        if let Some(v) = get(ENV_TOKEN) {
            self.sanity.token = Some(v);
        }
        if let Some(v) = get(ENV_EXPORT_PATH) {
            self.migration.export_path = Some(PathBuf::from(v));
        }
    }

    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Check that project, dataset and token are all set. The error names
    /// every missing variable at once.
    pub fn validate_for_write(&self) -> Result<SanityCredentials> {
        let present = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let project_id = present(&self.sanity.project_id);
        let dataset = present(&self.sanity.dataset);
        let token = present(&self.sanity.token);

        let mut missing = Vec::new();
        if project_id.is_none() {
            missing.push(ENV_PROJECT_ID[0]);
        }
        if dataset.is_none() {
            missing.push(ENV_DATASET[0]);
        }
        if token.is_none() {
            missing.push(ENV_TOKEN);
        }

        match (project_id, dataset, token) {
            (Some(project_id), Some(dataset), Some(token)) => Ok(SanityCredentials {
                project_id,
                dataset,
                token,
                api_version: self.sanity.api_version.clone(),
                api_host: self.sanity.api_host.clone(),
            }),
            _ => Err(MigrateError::Config(format!(
                "missing Sanity settings: {} (set them in the environment, .env, or [sanity] in the config file)",
                missing.join(", ")
            ))),
        }
    }

    fn validate(&self) -> Result<()> {
        if !is_valid_api_version(&self.sanity.api_version) {
            return Err(MigrateError::Config(format!(
                "sanity.api_version must be a date like 2024-07-01, '1' or 'X' (got '{}')",
                self.sanity.api_version
            )));
        }
        if self.migration.default_language.trim().is_empty() {
            return Err(MigrateError::Config(
                "migration.default_language must not be empty".to_string(),
            ));
        }
        if self.http.timeout_secs == Some(0) {
            return Err(MigrateError::Config(
                "http.timeout_secs must be > 0 when set".to_string(),
            ));
        }
        Ok(())
    }
}

fn is_valid_api_version(version: &str) -> bool {
    let v = version.trim_start_matches('v');
    v == "1" || v == "X" || chrono::NaiveDate::parse_from_str(v, "%Y-%m-%d").is_ok()
}

/// Parse config text without touching the environment.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)
        .map_err(|e| MigrateError::Config(format!("failed to parse config file: {}", e)))?;
    config.validate()?;
    Ok(config)
}

/// Load `path` and overlay the process environment.
///
/// A missing file is fine unless it was asked for explicitly; then it is a
/// configuration error.
pub fn load_config(path: &Path, explicit: bool) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrateError::Config(format!("failed to read config file {}: {}", path.display(), e))
        })?;
        parse_config(&content)?
    } else if explicit {
        return Err(MigrateError::Config(format!(
            "config file not found: {}",
            path.display()
        )));
    } else {
        Config::default()
    };

    config.apply_env();
    config.validate()?;
    Ok(config)
}
