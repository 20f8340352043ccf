// calico-core: Typed domain model and datastore client for the Calico etcd key space.

pub mod config;
pub mod datastore;
pub mod error;
pub mod model;
pub mod paths;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ClientCertificate, DatastoreConfig, TlsVerification};
pub use datastore::DatastoreClient;
pub use error::CoreError;

pub use model::{
    Action, Endpoint, EndpointTree, IpPool, IpVersion, MacAddress, NextHops, Port, Profile,
    Protocol, Rule, Rules, StoredEndpoint,
};
