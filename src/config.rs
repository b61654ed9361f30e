//! Configuration file handling.
//!
//! The configuration file is stored at `$EXPENSES_HOME/config.json` and holds the address of the
//! expense service, the request timeout and, optionally, the location of the credential storage.

use crate::error::{ErrorType, IntoResult, Res};
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const APP_NAME: &str = "expenses";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const STORAGE_JSON: &str = "storage.json";
const CONFIG_JSON: &str = "config.json";

/// Requests that take longer than this are abandoned.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$EXPENSES_HOME` and from there it loads `$EXPENSES_HOME/config.json`.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    api_url: Url,
}

impl Config {
    /// Creates the home directory, its `.secrets` subdirectory and an initial `config.json` that
    /// points at `api_url`.
    ///
    /// # Errors
    /// - Returns an error if `api_url` is not an absolute http(s) URL or if any file operation
    ///   fails.
    pub async fn create(dir: impl Into<PathBuf>, api_url: &str) -> Result<Self> {
        Self::create_inner(dir.into(), api_url)
            .await
            .pub_result(ErrorType::Config)
    }

    async fn create_inner(maybe_relative: PathBuf, api_url: &str) -> Res<Self> {
        let parsed = parse_api_url(api_url)?;
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the expenses home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let secrets = root.join(SECRETS);
        utils::make_dir(&secrets).await?;

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile {
            api_url: parsed.to_string(),
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            secrets,
            config_path,
            config_file,
            api_url: parsed,
        })
    }

    /// This will
    /// - validate that the home directory and the config file exist
    /// - load and validate the config file
    /// - validate that the secrets directory exists
    pub async fn load(home: impl Into<PathBuf>) -> Result<Self> {
        Self::load_inner(home.into())
            .await
            .pub_result(ErrorType::Config)
    }

    async fn load_inner(maybe_relative: PathBuf) -> Res<Self> {
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The expenses home directory is missing, run 'expenses init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        let api_url = parse_api_url(&config_file.api_url)
            .with_context(|| format!("Invalid api_url in {}", config_path.display()))?;

        let secrets = root.join(SECRETS);
        if !secrets.is_dir() {
            bail!("The secrets directory is missing '{}'", secrets.display())
        }

        Ok(Self {
            root,
            secrets,
            config_path,
            config_file,
            api_url,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    /// The fixed base address every request is resolved against.
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config_file.timeout_secs)
    }

    /// Returns the stored `storage_path` if it is absolute, otherwise resolves it against the home
    /// directory.
    pub fn storage_path(&self) -> PathBuf {
        let p = self.config_file.storage_path();
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "expenses",
///   "config_version": 1,
///   "api_url": "http://127.0.0.1:8000/",
///   "timeout_secs": 15
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "expenses"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// The base address of the expense service
    api_url: String,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,

    /// Path to the credential storage file (optional, relative to the home directory or absolute)
    /// Defaults to $EXPENSES_HOME/.secrets/storage.json if not specified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    storage_path: Option<PathBuf>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            api_url: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            storage_path: None,
        }
    }
}

impl ConfigFile {
    async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            config.timeout_secs > 0,
            "Invalid timeout_secs in config file: it must be greater than zero"
        );

        Ok(config)
    }

    async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    fn storage_path(&self) -> PathBuf {
        self.storage_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(STORAGE_JSON))
    }
}

/// Parses and normalizes the service address. The result always ends with a slash so that it can
/// be used as a base for `Url::join`.
fn parse_api_url(s: &str) -> Res<Url> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        bail!("The api_url cannot be empty")
    }
    let mut url = Url::parse(trimmed).with_context(|| format!("Unable to parse URL '{trimmed}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("The api_url must be http or https, got '{}'", url.scheme())
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
