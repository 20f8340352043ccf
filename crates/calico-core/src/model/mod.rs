// ── Domain model ──
//
// Typed forms of the documents stored under /calico/v1. Every type here
// (de)serializes its own stored representation; key construction lives in
// `crate::paths`.

pub mod endpoint;
pub mod host;
pub mod mac;
pub mod net;
pub mod pool;
pub mod profile;
pub mod rule;
pub mod rules;

// ── Re-exports ──────────────────────────────────────────────────────

pub use endpoint::{Endpoint, EndpointTree, StoredEndpoint};
pub use host::NextHops;
pub use mac::MacAddress;
pub use net::IpVersion;
pub use pool::IpPool;
pub use profile::Profile;
pub use rule::{Action, Port, Protocol, Rule};
pub use rules::Rules;
