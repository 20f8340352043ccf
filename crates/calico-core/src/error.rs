// ── Core error types ──
//
// User-facing errors from calico-core. No store-level error type crosses
// this boundary: every `calico_etcd::Error` is translated by
// `CoreError::from_store` at the datastore call site, and not-found
// conditions become the entity-specific variant the operation expects.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Not found ────────────────────────────────────────────────────
    #[error("Host not found: {hostname}")]
    HostNotFound { hostname: String },

    #[error("Profile not found: {name}")]
    ProfileNotFound { name: String },

    #[error("Endpoint not found: {endpoint_id}")]
    EndpointNotFound { endpoint_id: String },

    #[error("Container {container_id} not found on host {hostname}")]
    ContainerNotFound {
        hostname: String,
        container_id: String,
    },

    #[error("Container {container_id} on host {hostname} has no endpoint")]
    NoEndpointForContainer {
        hostname: String,
        container_id: String,
    },

    #[error("IP pool not found: {cidr}")]
    PoolNotFound { cidr: String },

    #[error("{address} is not a configured BGP peer")]
    PeerNotFound { address: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Field '{field}' is not allowed on a rule")]
    InvalidField { field: String },

    #[error("'{value}' is not a valid rule action (expected allow or deny)")]
    InvalidAction { value: String },

    #[error("Invalid value for rule field '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid network '{value}': {reason}")]
    InvalidNetwork { value: String, reason: String },

    #[error("Invalid address '{value}': {reason}")]
    InvalidAddress { value: String, reason: String },

    #[error("Invalid {kind} '{value}': must be non-empty and contain no '/'")]
    InvalidSegment { kind: &'static str, value: String },

    #[error("Malformed document at {key}: {reason}")]
    MalformedDocument { key: String, reason: String },

    // ── Conflicts ────────────────────────────────────────────────────
    #[error("Profile {profile} is already in endpoint {endpoint_id}")]
    ProfileAlreadyInEndpoint {
        profile: String,
        endpoint_id: String,
    },

    #[error("Profile {profile} is not in endpoint {endpoint_id}")]
    ProfileNotInEndpoint {
        profile: String,
        endpoint_id: String,
    },

    #[error("{key} was modified concurrently; re-read and retry")]
    ConcurrentUpdate { key: String },

    // ── Backend (wrapped, not exposed raw) ───────────────────────────
    #[error("Error accessing etcd during {operation}: {message}. Is etcd running?")]
    Backend { operation: String, message: String },

    #[error("etcd request timed out during {operation}")]
    Timeout { operation: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from store-layer errors ───────────────────────────────

impl CoreError {
    /// Translate a store failure that the calling operation does not handle
    /// itself. The store error type and its HTTP details are flattened into
    /// a message.
    pub fn from_store(operation: &str, err: calico_etcd::Error) -> Self {
        match err {
            calico_etcd::Error::Transport(ref e) if e.is_timeout() => Self::Timeout {
                operation: operation.to_owned(),
            },
            calico_etcd::Error::Transport(e) => Self::Backend {
                operation: operation.to_owned(),
                message: if e.is_connect() {
                    "connection refused".into()
                } else {
                    e.without_url().to_string()
                },
            },
            other => Self::Backend {
                operation: operation.to_owned(),
                message: other.to_string(),
            },
        }
    }

    /// Attach the store key to a document decoding error raised before the
    /// key was known.
    pub fn at_key(self, key: &str) -> Self {
        match self {
            Self::MalformedDocument { reason, .. } => Self::MalformedDocument {
                key: key.to_owned(),
                reason,
            },
            other => other,
        }
    }

    /// Returns `true` if a required entity was absent.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::HostNotFound { .. }
                | Self::ProfileNotFound { .. }
                | Self::EndpointNotFound { .. }
                | Self::ContainerNotFound { .. }
                | Self::NoEndpointForContainer { .. }
                | Self::PoolNotFound { .. }
                | Self::PeerNotFound { .. }
        )
    }

    /// Returns `true` for profile membership conflicts on an endpoint.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::ProfileAlreadyInEndpoint { .. } | Self::ProfileNotInEndpoint { .. }
        )
    }

    /// Returns `true` if a compare-and-swap lost to another writer.
    pub fn is_concurrent_update(&self) -> bool {
        matches!(self, Self::ConcurrentUpdate { .. })
    }

    /// Returns `true` for errors raised before any store interaction.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidField { .. }
                | Self::InvalidAction { .. }
                | Self::InvalidValue { .. }
                | Self::InvalidNetwork { .. }
                | Self::InvalidAddress { .. }
                | Self::InvalidSegment { .. }
                | Self::MalformedDocument { .. }
        )
    }
}
