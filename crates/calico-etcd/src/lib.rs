// calico-etcd: Async key-value store layer for the Calico datastore (etcd v2 + in-memory)

pub mod client;
pub mod error;
pub mod memory;
pub mod node;
pub mod store;
pub mod transport;

pub use client::EtcdClient;
pub use error::Error;
pub use memory::MemoryStore;
pub use node::Node;
pub use store::KvStore;
pub use transport::{ClientIdentity, TlsMode, TransportConfig};
