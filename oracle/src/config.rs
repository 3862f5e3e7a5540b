//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable
//! overrides. The file path defaults to `config.yaml` but can be specified
//! via the `-f` flag or the `ORACLE_CONFIG` environment variable.
//!
//! ## Loading Priority
//!
//! Sources are merged in the following order (later sources override earlier
//! ones):
//!
//! 1. **Built-in defaults**
//! 2. **YAML config file** - Base configuration (default: `config.yaml`,
//!    missing file is fine)
//! 3. **Environment variables** - the names the original deployment used,
//!    verbatim: `BACKEND_URL`, `account_id`, `access_key_id`,
//!    `access_key_secret`, `bucket_name`, plus `HOST` and `PORT`
//!
//! ## Lenient startup
//!
//! The backend and storage settings are all optional. The process boots
//! without them; a request that depends on a missing setting fails with a
//! 500 instead of the server refusing to start. `--validate` parses the
//! configuration and exits, for catching config errors in CI.

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "ORACLE_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Inference backend endpoint. Requests to /process fail while unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<Url>,
    /// Cloudflare account id; forms the R2 endpoint
    /// `https://{account_id}.r2.cloudflarestorage.com`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    /// R2 access key id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    /// R2 secret access key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key_secret: Option<String>,
    /// Target bucket for image uploads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    /// Backend call tuning
    pub backend: BackendConfig,
    /// Request limits
    pub limits: LimitsConfig,
}

/// Tuning for the inference backend call.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    /// Bound on the request phase (connect through response headers).
    /// The streamed body read itself is not time-limited.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Request limits for protecting the upload path.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes for /process uploads
    pub max_upload_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 25 * 1024 * 1024, // 25 MiB
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            backend_url: None,
            account_id: None,
            access_key_id: None,
            access_key_secret: None,
            bucket_name: None,
            backend: BackendConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        Self::figment(args).extract()
    }

    fn figment(args: &Args) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(&args.config))
            .merge(Env::raw().only(&[
                "host",
                "port",
                "backend_url",
                "account_id",
                "access_key_id",
                "access_key_secret",
                "bucket_name",
            ]))
    }

    /// Address for the HTTP listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// True when every storage setting needed for uploads is present
    pub fn storage_configured(&self) -> bool {
        self.account_id.is_some()
            && self.access_key_id.is_some()
            && self.access_key_secret.is_some()
            && self.bucket_name.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_for(path: &str) -> Args {
        Args {
            config: path.to_string(),
            validate: false,
        }
    }

    #[test]
    fn environment_variables_are_recognized_verbatim() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("BACKEND_URL", "http://backend.test/generate");
            jail.set_env("account_id", "acct123");
            jail.set_env("access_key_id", "ak");
            jail.set_env("access_key_secret", "sk");
            jail.set_env("bucket_name", "images");

            let config = Config::load(&args_for("config.yaml"))?;
            assert_eq!(
                config.backend_url.as_ref().map(Url::as_str),
                Some("http://backend.test/generate")
            );
            assert_eq!(config.account_id.as_deref(), Some("acct123"));
            assert_eq!(config.access_key_id.as_deref(), Some("ak"));
            assert_eq!(config.access_key_secret.as_deref(), Some("sk"));
            assert_eq!(config.bucket_name.as_deref(), Some("images"));
            assert!(config.storage_configured());
            Ok(())
        });
    }

    #[test]
    fn missing_settings_do_not_fail_load() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(&args_for("config.yaml"))?;
            assert!(config.backend_url.is_none());
            assert!(!config.storage_configured());
            assert_eq!(config.port, 5001);
            Ok(())
        });
    }

    #[test]
    fn yaml_file_overrides_defaults_and_env_overrides_yaml() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                "port: 9000\nbucket_name: from-yaml\nbackend:\n  request_timeout: 5s\n",
            )?;
            jail.set_env("bucket_name", "from-env");

            let config = Config::load(&args_for("config.yaml"))?;
            assert_eq!(config.port, 9000);
            assert_eq!(config.bucket_name.as_deref(), Some("from-env"));
            assert_eq!(config.backend.request_timeout, Duration::from_secs(5));
            Ok(())
        });
    }
}
