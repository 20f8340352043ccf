// ── Key-value store abstraction ──
//
// The datastore client is written against this trait so that it can run
// over a real etcd cluster or the in-process `MemoryStore`.

use std::future::Future;

use crate::error::Error;
use crate::node::Node;

/// The operations the Calico datastore needs from a hierarchical
/// key-value store.
///
/// Every write is last-writer-wins unless a precondition is supplied
/// ([`write_if_value`](Self::write_if_value)). Implementations must report
/// a missing key as [`Error::KeyNotFound`] and a failed precondition as
/// [`Error::CompareFailed`] so callers can tell them apart from any other
/// failure.
pub trait KvStore: Send + Sync {
    /// Read a key. For a directory, the returned node lists its immediate
    /// children (sub-directories appear without their contents).
    fn read(&self, key: &str) -> impl Future<Output = Result<Node, Error>> + Send;

    /// Read a key and everything beneath it.
    fn read_recursive(&self, key: &str) -> impl Future<Output = Result<Node, Error>> + Send;

    /// Unconditionally set a value, creating parent directories as needed.
    fn write(&self, key: &str, value: &str) -> impl Future<Output = Result<Node, Error>> + Send;

    /// Set a value only if the current value equals `prev_value`.
    fn write_if_value(
        &self,
        key: &str,
        value: &str,
        prev_value: &str,
    ) -> impl Future<Output = Result<Node, Error>> + Send;

    /// Create an empty directory.
    fn mkdir(&self, key: &str) -> impl Future<Output = Result<Node, Error>> + Send;

    /// Delete a single value.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), Error>> + Send;

    /// Delete a key or directory together with everything beneath it.
    fn delete_recursive(&self, key: &str) -> impl Future<Output = Result<(), Error>> + Send;

    /// Create a new, uniquely named, ordered value inside `dir`.
    fn append(&self, dir: &str, value: &str) -> impl Future<Output = Result<Node, Error>> + Send;
}
