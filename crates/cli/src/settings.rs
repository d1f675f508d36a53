//! Layered CLI configuration: file, then `HASHVAULT_*` environment, then flags.

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File as ConfigFile};
use hashvault_core::CoreConfig;
use hashvault_files::{DEFAULT_API_URL, DEFAULT_GATEWAY_URL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "hashvault.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ipfs_api_url: String,
    pub gateway_url: String,
    /// JSON snapshot backing the local ledger.
    pub ledger_path: PathBuf,
    /// Non-interactive signing identity.
    pub identity: Option<String>,
    pub log_level: String,
    /// `pretty` or `compact`.
    pub log_format: String,
    pub confirmation_timeout_secs: u64,
    pub fetch_concurrency: usize,
    pub cache_ttl_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let core = CoreConfig::default();
        Self {
            ipfs_api_url: DEFAULT_API_URL.to_string(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            ledger_path: PathBuf::from("./hashvault-ledger.json"),
            identity: None,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            confirmation_timeout_secs: core.confirmation_timeout_secs,
            fetch_concurrency: core.fetch_concurrency,
            cache_ttl_secs: core.cache_ttl_secs,
        }
    }
}

impl AppConfig {
    pub fn load(config_path_override: Option<&Path>) -> Result<Self> {
        let resolved_path = match config_path_override {
            Some(path) => {
                if !path.exists() {
                    bail!(
                        "Configuration file {} not found (specified via --config)",
                        path.display()
                    );
                }
                Some(path.to_path_buf())
            }
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                path.exists().then_some(path)
            }
        };

        let mut builder = Config::builder();
        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }
        builder = builder.add_source(Environment::with_prefix("HASHVAULT").try_parsing(true));

        builder
            .build()
            .context("failed to assemble configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }

    pub fn core(&self) -> CoreConfig {
        CoreConfig {
            confirmation_timeout_secs: self.confirmation_timeout_secs,
            fetch_concurrency: self.fetch_concurrency,
            cache_ttl_secs: self.cache_ttl_secs,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (key, url) in [
            ("ipfs_api_url", &self.ipfs_api_url),
            ("gateway_url", &self.gateway_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                bail!("{key} must be an http(s) URL, got `{url}`");
            }
        }
        if !matches!(self.log_format.as_str(), "pretty" | "compact") {
            bail!(
                "log_format must be `pretty` or `compact`, got `{}`",
                self.log_format
            );
        }
        if self.ledger_path.as_os_str().is_empty() {
            bail!("ledger_path must not be empty");
        }
        self.core()
            .validate()
            .context("invalid core configuration")
    }
}
