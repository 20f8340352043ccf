//! Shared configuration for Calico datastore tools.
//!
//! A TOML file in the platform config directory, overridden by the
//! `ETCD_*` environment variables, resolved into a
//! `calico_core::DatastoreConfig`. Core never reads files; callers hand it
//! the result of [`EtcdSettings::to_datastore_config`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use calico_core::config::{DEFAULT_AUTHORITY, DEFAULT_SCHEME, DEFAULT_TIMEOUT};
use calico_core::{ClientCertificate, DatastoreConfig, TlsVerification};

/// Prefix of the environment variables mapped onto the `[etcd]` table.
pub const ENV_PREFIX: &str = "ETCD_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// etcd connection settings.
    #[serde(default)]
    pub etcd: EtcdSettings,

    /// Output defaults for the CLI.
    #[serde(default)]
    pub defaults: Defaults,
}

/// The `[etcd]` table. Each field can be overridden by the matching
/// upper-cased `ETCD_*` variable (`ETCD_AUTHORITY`, `ETCD_CA_CERT_FILE`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EtcdSettings {
    /// `<host>:<port>` of an etcd client endpoint.
    #[serde(default = "default_authority")]
    pub authority: String,

    /// `http` or `https`.
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// CA bundle used to verify the etcd server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert_file: Option<PathBuf>,

    /// Client certificate; requires `key_file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,

    /// Skip server certificate verification.
    #[serde(default)]
    pub insecure: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for EtcdSettings {
    fn default() -> Self {
        Self {
            authority: default_authority(),
            scheme: default_scheme(),
            ca_cert_file: None,
            cert_file: None,
            key_file: None,
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_authority() -> String {
    DEFAULT_AUTHORITY.into()
}
fn default_scheme() -> String {
    DEFAULT_SCHEME.into()
}
fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}
fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "projectcalico", "calicoctl").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("calicoctl");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Layered provider: defaults, then the TOML file at `path` (if present),
/// then `ETCD_*` variables mapped onto `[etcd]`.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(
            Env::prefixed(ENV_PREFIX)
                .map(|key| format!("etcd.{}", key.as_str().to_ascii_lowercase()).into()),
        )
}

/// Load the config from the canonical path and the environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the config from `path` and the environment.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    Ok(figment(path).extract()?)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(&path, cfg)?;
    Ok(path)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation to DatastoreConfig ──────────────────────────────────

impl EtcdSettings {
    /// Validate these settings and build the runtime connection config.
    pub fn to_datastore_config(&self) -> Result<DatastoreConfig, ConfigError> {
        if !matches!(self.scheme.as_str(), "http" | "https") {
            return Err(invalid(
                "etcd.scheme",
                format!("expected 'http' or 'https', got '{}'", self.scheme),
            ));
        }
        if self.timeout == 0 {
            return Err(invalid("etcd.timeout", "must be at least 1 second".into()));
        }

        let mut config = DatastoreConfig::from_authority(&self.scheme, &self.authority)
            .map_err(|e| invalid("etcd.authority", e.to_string()))?;
        config.timeout = Duration::from_secs(self.timeout);

        config.tls = if self.insecure {
            TlsVerification::DangerAcceptInvalid
        } else if let Some(ref ca) = self.ca_cert_file {
            TlsVerification::CustomCa(ca.clone())
        } else {
            TlsVerification::SystemDefaults
        };

        config.client_cert = match (&self.cert_file, &self.key_file) {
            (Some(cert), Some(key)) => Some(ClientCertificate {
                cert_file: cert.clone(),
                key_file: key.clone(),
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(invalid("etcd.key_file", "required when cert_file is set".into()));
            }
            (None, Some(_)) => {
                return Err(invalid("etcd.cert_file", "required when key_file is set".into()));
            }
        };

        Ok(config)
    }
}

fn invalid(field: &str, reason: String) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason,
    }
}
