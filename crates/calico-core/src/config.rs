// ── Runtime connection configuration ──
//
// These types describe *how* to reach the etcd cluster. They never touch
// disk; calico-config (or a test) builds a `DatastoreConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use calico_etcd::{ClientIdentity, TlsMode, TransportConfig};
use url::Url;

use crate::error::CoreError;

pub const DEFAULT_AUTHORITY: &str = "127.0.0.1:4001";
pub const DEFAULT_SCHEME: &str = "http";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// TLS verification strategy for https endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification.
    DangerAcceptInvalid,
}

/// Client certificate presented to etcd.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCertificate {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

/// Configuration for connecting to an etcd cluster.
#[derive(Debug, Clone)]
pub struct DatastoreConfig {
    /// etcd client URL (e.g. `http://127.0.0.1:4001`).
    pub url: Url,
    pub tls: TlsVerification,
    pub client_cert: Option<ClientCertificate>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            url: Url::parse(&format!("{DEFAULT_SCHEME}://{DEFAULT_AUTHORITY}"))
                .unwrap_or_else(|_| unreachable!("default etcd URL is valid")),
            tls: TlsVerification::default(),
            client_cert: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl DatastoreConfig {
    /// Build a config from a `host:port` authority and a scheme.
    pub fn from_authority(scheme: &str, authority: &str) -> Result<Self, CoreError> {
        if !matches!(scheme, "http" | "https") {
            return Err(CoreError::Config {
                message: format!("unsupported etcd scheme '{scheme}' (expected http or https)"),
            });
        }
        if authority.rsplit_once(':').is_none_or(|(host, port)| {
            host.is_empty() || port.parse::<u16>().is_err()
        }) {
            return Err(CoreError::Config {
                message: format!("invalid etcd authority '{authority}' (expected <host>:<port>)"),
            });
        }
        let url = Url::parse(&format!("{scheme}://{authority}")).map_err(|e| CoreError::Config {
            message: format!("invalid etcd authority '{authority}': {e}"),
        })?;
        Ok(Self {
            url,
            ..Self::default()
        })
    }

    /// Store-level transport settings for this config.
    pub fn transport(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        TransportConfig {
            tls,
            identity: self.client_cert.as_ref().map(|c| ClientIdentity {
                cert: c.cert_file.clone(),
                key: c.key_file.clone(),
            }),
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_local_etcd() {
        let config = DatastoreConfig::default();
        assert_eq!(config.url.as_str(), "http://127.0.0.1:4001/");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn authority_requires_host_and_port() {
        let config = DatastoreConfig::from_authority("https", "etcd.local:2379").unwrap();
        assert_eq!(config.url.host_str(), Some("etcd.local"));
        assert_eq!(config.url.port(), Some(2379));

        assert!(DatastoreConfig::from_authority("http", "etcd.local").is_err());
        assert!(DatastoreConfig::from_authority("http", ":2379").is_err());
        assert!(DatastoreConfig::from_authority("ftp", "etcd:2379").is_err());
    }

    #[test]
    fn transport_carries_tls_and_identity() {
        let config = DatastoreConfig {
            tls: TlsVerification::CustomCa("/etc/ca.pem".into()),
            client_cert: Some(ClientCertificate {
                cert_file: "/etc/cert.pem".into(),
                key_file: "/etc/key.pem".into(),
            }),
            ..DatastoreConfig::default()
        };
        let transport = config.transport();
        assert!(matches!(transport.tls, TlsMode::CustomCa(ref p) if p.to_str() == Some("/etc/ca.pem")));
        assert!(transport.identity.is_some());
    }
}
