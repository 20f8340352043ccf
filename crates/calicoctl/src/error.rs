//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use calico_config::ConfigError;
use calico_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(calicoctl::etcd_unavailable),
        help(
            "Check that etcd is running and reachable.\n\
             Override the endpoint with --etcd-authority or ETCD_AUTHORITY."
        )
    )]
    EtcdUnavailable { message: String },

    #[error("etcd request timed out during {operation}")]
    #[diagnostic(
        code(calicoctl::timeout),
        help("Increase the timeout with --timeout or check etcd responsiveness.")
    )]
    Timeout { operation: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(calicoctl::not_found), help("Run: calicoctl {list_command}"))]
    NotFound {
        message: String,
        list_command: String,
    },

    #[error("{message}")]
    #[diagnostic(code(calicoctl::conflict))]
    Conflict { message: String },

    #[error("Profile '{name}' is still applied to {count} endpoint(s)")]
    #[diagnostic(
        code(calicoctl::profile_in_use),
        help(
            "Remove it from those endpoints first (calicoctl profile members {name}),\n\
             or pass --no-check to delete it anyway."
        )
    )]
    ProfileInUse { name: String, count: usize },

    #[error("Gave up updating endpoint {endpoint_id} after {attempts} concurrent modifications")]
    #[diagnostic(
        code(calicoctl::contended),
        help("Another client keeps modifying this endpoint. Try again later.")
    )]
    Contended { endpoint_id: String, attempts: u32 },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(calicoctl::validation))]
    Validation { field: String, reason: String },

    #[error("Stored data is corrupt: {message}")]
    #[diagnostic(
        code(calicoctl::corrupt),
        help("The document was written by another tool or by hand. Fix or remove it.")
    )]
    Corrupt { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("{source}")]
    #[diagnostic(
        code(calicoctl::config),
        help("Check the config file ({path}) and the ETCD_* environment variables.")
    )]
    Config {
        #[source]
        source: ConfigError,
        path: String,
    },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(calicoctl::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::EtcdUnavailable { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } | Self::ProfileInUse { .. } | Self::Contended { .. } => {
                exit_code::CONFLICT
            }
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } | Self::Config { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

fn list_command(err: &CoreError) -> &'static str {
    match err {
        CoreError::HostNotFound { .. } => "node show",
        CoreError::ProfileNotFound { .. } => "profile list",
        CoreError::PoolNotFound { .. } => "pool show",
        CoreError::PeerNotFound { .. } => "bgp show",
        _ => "endpoint show",
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Backend { .. } => Self::EtcdUnavailable {
                message: err.to_string(),
            },
            CoreError::Timeout { operation } => Self::Timeout { operation },
            CoreError::MalformedDocument { .. } => Self::Corrupt {
                message: err.to_string(),
            },
            CoreError::Config { message } => Self::Validation {
                field: "etcd".into(),
                reason: message,
            },
            CoreError::InvalidSegment { kind, .. } => Self::Validation {
                field: kind.into(),
                reason: err.to_string(),
            },
            ref e if e.is_not_found() => Self::NotFound {
                list_command: list_command(e).into(),
                message: err.to_string(),
            },
            ref e if e.is_conflict() || e.is_concurrent_update() => Self::Conflict {
                message: err.to_string(),
            },
            ref e if e.is_validation() => Self::Validation {
                field: "input".into(),
                reason: err.to_string(),
            },
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(source: ConfigError) -> Self {
        Self::Config {
            source,
            path: calico_config::config_path().display().to_string(),
        }
    }
}
