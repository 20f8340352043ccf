// Transport configuration for building the reqwest::Client used to talk
// to etcd. TLS is only involved when the etcd endpoint is https.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

/// TLS verification mode (store-level mirror of core's TlsVerification).
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate.
    DangerAcceptInvalid,
}

/// Client certificate and key presented to etcd (PEM files).
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub identity: Option<ClientIdentity>,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            identity: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("calico-etcd/", env!("CARGO_PKG_VERSION")));

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        if let Some(identity) = &self.identity {
            // rustls wants certificate and key in one PEM buffer.
            let mut pem = std::fs::read(&identity.cert)
                .map_err(|e| Error::Tls(format!("failed to read client cert: {e}")))?;
            pem.push(b'\n');
            pem.extend(
                std::fs::read(&identity.key)
                    .map_err(|e| Error::Tls(format!("failed to read client key: {e}")))?,
            );
            let identity = reqwest::Identity::from_pem(&pem)
                .map_err(|e| Error::Tls(format!("invalid client identity: {e}")))?;
            builder = builder.identity(identity);
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}
