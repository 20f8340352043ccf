use thiserror::Error;

/// etcd v2 `errorCode` values this crate distinguishes.
pub mod code {
    pub const KEY_NOT_FOUND: u64 = 100;
    pub const TEST_FAILED: u64 = 101;
    pub const NOT_FILE: u64 = 102;
    pub const NOT_DIR: u64 = 104;
    pub const NODE_EXIST: u64 = 105;
    pub const ROOT_READ_ONLY: u64 = 107;
    pub const DIR_NOT_EMPTY: u64 = 108;
}

/// Top-level error type for the `calico-etcd` crate.
///
/// Covers every failure mode of a key-value round-trip: store-level
/// conditions reported by etcd (missing key, failed precondition, wrong
/// node kind), transport failures and malformed responses.
/// `calico-core` maps these into domain errors; nothing here is meant to
/// reach an end user directly.
#[derive(Debug, Error)]
pub enum Error {
    // ── Store conditions ────────────────────────────────────────────
    /// The key (or one of its parents) does not exist.
    #[error("Key not found: {key}")]
    KeyNotFound { key: String },

    /// A `prevValue` precondition did not match the stored value.
    #[error("Compare failed on {key}: {cause}")]
    CompareFailed { key: String, cause: String },

    /// A value operation was attempted on a directory.
    #[error("Not a file: {key}")]
    NotAFile { key: String },

    /// A directory operation was attempted on a value.
    #[error("Not a directory: {key}")]
    NotADirectory { key: String },

    /// The node already exists (e.g. creating a directory twice).
    #[error("Key already exists: {key}")]
    NodeExists { key: String },

    /// A non-recursive delete targeted a directory with children.
    #[error("Directory not empty: {key}")]
    DirectoryNotEmpty { key: String },

    /// Any other error reported in an etcd error body.
    #[error("etcd error {code}: {message} ({cause})")]
    Api {
        code: u64,
        message: String,
        cause: String,
    },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup error (unreadable CA bundle, bad client identity).
    #[error("TLS error: {0}")]
    Tls(String),

    /// Non-JSON or unexpected HTTP response.
    #[error("Unexpected HTTP {status} from etcd: {message}")]
    Http { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Build the matching variant from an etcd error body.
    pub fn from_etcd(code: u64, message: String, cause: String) -> Self {
        match code {
            code::KEY_NOT_FOUND => Self::KeyNotFound { key: cause },
            code::TEST_FAILED => Self::CompareFailed {
                key: String::new(),
                cause,
            },
            code::NOT_FILE => Self::NotAFile { key: cause },
            code::NOT_DIR => Self::NotADirectory { key: cause },
            code::NODE_EXIST => Self::NodeExists { key: cause },
            code::DIR_NOT_EMPTY => Self::DirectoryNotEmpty { key: cause },
            _ => Self::Api {
                code,
                message,
                cause,
            },
        }
    }

    /// Returns `true` if the key (or its parent directory) was absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. })
    }

    /// Returns `true` if a `prevValue` precondition was not met.
    pub fn is_compare_failed(&self) -> bool {
        matches!(self, Self::CompareFailed { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn etcd_codes_map_to_variants() {
        let err = Error::from_etcd(100, "Key not found".into(), "/calico/v1".into());
        assert!(err.is_not_found());

        let err = Error::from_etcd(101, "Compare failed".into(), "[a != b]".into());
        assert!(err.is_compare_failed());
        assert!(!err.is_not_found());

        let err = Error::from_etcd(105, "Key already exists".into(), "/a".into());
        assert!(matches!(err, Error::NodeExists { ref key } if key == "/a"));

        let err = Error::from_etcd(300, "Raft Internal Error".into(), String::new());
        assert!(matches!(err, Error::Api { code: 300, .. }));
    }

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Http {
            status: 503,
            message: "unavailable".into(),
        };
        assert!(err.is_transient());
        assert!(!Error::NotAFile { key: "/a".into() }.is_transient());
    }
}
