// ── Key layout ──
//
// Builders from domain identifiers to etcd keys, and structural parsers
// back from keys to identifiers. The layout is shared with the Felix agent
// and the BIRD templates, so every literal here is load-bearing.
//
// Parsers never fail: a key of the wrong shape is simply not an instance
// of the entity being scanned for and yields `None`.

use ipnet::IpNet;

use crate::error::CoreError;
use crate::model::IpVersion;

pub const CALICO_ROOT: &str = "/calico";
pub const CONFIG_PATH: &str = "/calico/v1/config/";
pub const READY_PATH: &str = "/calico/v1/Ready";
pub const HOSTS_PATH: &str = "/calico/v1/host/";
pub const PROFILES_PATH: &str = "/calico/v1/policy/profile/";

/// Prefix of host-side veth names; also the `InterfacePrefix` global config.
pub const IF_PREFIX: &str = "cali";
/// Interface name inside the workload namespace when none is stored.
pub const VETH_NAME: &str = "eth1";
/// Orchestrator segment used for containers managed by this tooling.
pub const DOCKER_ORCHESTRATOR: &str = "docker";

// Segment counts of `key.split('/')`, leading empty segment included.
const ENDPOINT_SEGMENTS: usize = 10;
const PROFILE_NAME_SEGMENT: usize = 5;
const HOST_NAME_SEGMENT: usize = 4;
const MIN_HOST_SEGMENTS: usize = 6;

/// Reject identifiers that would change the shape of a key.
pub fn ensure_segment(kind: &'static str, value: &str) -> Result<(), CoreError> {
    if value.is_empty() || value.contains('/') {
        return Err(CoreError::InvalidSegment {
            kind,
            value: value.to_owned(),
        });
    }
    Ok(())
}

// ── Builders ─────────────────────────────────────────────────────────

pub fn interface_prefix_path() -> String {
    format!("{CONFIG_PATH}InterfacePrefix")
}

pub fn host_path(hostname: &str) -> String {
    format!("{HOSTS_PATH}{hostname}/")
}

pub fn bird_ip_path(hostname: &str) -> String {
    format!("{}bird_ip", host_path(hostname))
}

pub fn bird6_ip_path(hostname: &str) -> String {
    format!("{}bird6_ip", host_path(hostname))
}

pub fn host_marker_path(hostname: &str) -> String {
    format!("{}config/marker", host_path(hostname))
}

pub fn workloads_path(hostname: &str) -> String {
    format!("{}workload/", host_path(hostname))
}

pub fn container_path(hostname: &str, container_id: &str) -> String {
    format!(
        "{}{DOCKER_ORCHESTRATOR}/{container_id}/",
        workloads_path(hostname)
    )
}

pub fn container_endpoints_path(hostname: &str, container_id: &str) -> String {
    format!("{}endpoint/", container_path(hostname, container_id))
}

pub fn endpoint_path(
    hostname: &str,
    orchestrator_id: &str,
    workload_id: &str,
    endpoint_id: &str,
) -> String {
    format!(
        "{}{orchestrator_id}/{workload_id}/endpoint/{endpoint_id}",
        workloads_path(hostname)
    )
}

pub fn profile_path(name: &str) -> String {
    format!("{PROFILES_PATH}{name}/")
}

pub fn profile_tags_path(name: &str) -> String {
    format!("{}tags", profile_path(name))
}

pub fn profile_rules_path(name: &str) -> String {
    format!("{}rules", profile_path(name))
}

pub fn pools_path(version: IpVersion) -> String {
    format!("/calico/v1/ipam/{version}/pool/")
}

/// Pool key for an already-canonical CIDR; `/` is not legal inside a key
/// segment and is written as `-`.
pub fn pool_path(cidr: &IpNet) -> String {
    format!(
        "{}{}",
        pools_path(IpVersion::of_net(cidr)),
        cidr.to_string().replace('/', "-")
    )
}

pub fn bgp_peers_path(version: IpVersion) -> String {
    format!("{CONFIG_PATH}bgp_peer_rr_{version}/")
}

// ── Parsers ──────────────────────────────────────────────────────────

/// Identity of an endpoint, as encoded in its key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    pub hostname: String,
    pub orchestrator_id: String,
    pub workload_id: String,
    pub endpoint_id: String,
}

impl EndpointKey {
    /// Split `/calico/v1/host/<h>/workload/<o>/<w>/endpoint/<e>` into its
    /// identifiers. Only the segment count is checked.
    pub fn parse(key: &str) -> Option<Self> {
        let segments: Vec<&str> = key.split('/').collect();
        let [_, _, _, _, hostname, _, orchestrator_id, workload_id, _, endpoint_id] =
            <[&str; ENDPOINT_SEGMENTS]>::try_from(segments).ok()?;
        Some(Self {
            hostname: hostname.to_owned(),
            orchestrator_id: orchestrator_id.to_owned(),
            workload_id: workload_id.to_owned(),
            endpoint_id: endpoint_id.to_owned(),
        })
    }

    pub fn path(&self) -> String {
        endpoint_path(
            &self.hostname,
            &self.orchestrator_id,
            &self.workload_id,
            &self.endpoint_id,
        )
    }
}

/// Profile name from any key at or below `/calico/v1/policy/profile/<name>`.
pub fn profile_name_from_key(key: &str) -> Option<&str> {
    key.split('/').nth(PROFILE_NAME_SEGMENT).filter(|s| !s.is_empty())
}

/// Hostname from a key strictly inside a host subtree that is not an
/// endpoint key (`bird_ip`, `config/marker`, an empty `workload/...` dir).
pub fn hostname_from_key(key: &str) -> Option<&str> {
    let segments: Vec<&str> = key.split('/').collect();
    if (MIN_HOST_SEGMENTS..ENDPOINT_SEGMENTS).contains(&segments.len()) {
        segments.get(HOST_NAME_SEGMENT).copied()
    } else {
        None
    }
}

/// CIDR text from a pool key. The pool directory itself (which a listing
/// of an empty directory reports as its only leaf) yields `None`.
pub fn pool_cidr_from_key(pools_dir: &str, key: &str) -> Option<String> {
    let dir = pools_dir.trim_end_matches('/');
    let name = key.strip_prefix(dir)?.strip_prefix('/')?;
    if name.is_empty() || name.contains('/') {
        return None;
    }
    Some(name.replace('-', "/"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::net::parse_net;

    #[test]
    fn endpoint_key_round_trips() {
        let path = endpoint_path("node1", "docker", "abc123", "ep1");
        assert_eq!(
            path,
            "/calico/v1/host/node1/workload/docker/abc123/endpoint/ep1"
        );
        let key = EndpointKey::parse(&path).unwrap();
        assert_eq!(key.hostname, "node1");
        assert_eq!(key.orchestrator_id, "docker");
        assert_eq!(key.workload_id, "abc123");
        assert_eq!(key.endpoint_id, "ep1");
        assert_eq!(key.path(), path);
    }

    #[test]
    fn wrong_segment_count_is_not_an_endpoint() {
        assert!(EndpointKey::parse("/calico/v1/host/node1/bird_ip").is_none());
        assert!(EndpointKey::parse("/calico/v1/host/node1/workload/docker/abc/endpoint").is_none());
        assert!(EndpointKey::parse("/calico/v1/host/n/workload/docker/abc/endpoint/ep/x").is_none());
        assert!(EndpointKey::parse("").is_none());
    }

    #[test]
    fn host_and_profile_paths() {
        assert_eq!(bird_ip_path("h"), "/calico/v1/host/h/bird_ip");
        assert_eq!(host_marker_path("h"), "/calico/v1/host/h/config/marker");
        assert_eq!(
            container_endpoints_path("h", "c"),
            "/calico/v1/host/h/workload/docker/c/endpoint/"
        );
        assert_eq!(profile_rules_path("web"), "/calico/v1/policy/profile/web/rules");
        assert_eq!(bgp_peers_path(IpVersion::V6), "/calico/v1/config/bgp_peer_rr_v6/");
    }

    #[test]
    fn pool_key_replaces_separator() {
        let net = parse_net("10.1.0.0/16").unwrap();
        let path = pool_path(&net);
        assert_eq!(path, "/calico/v1/ipam/v4/pool/10.1.0.0-16");

        let dir = pools_path(IpVersion::V4);
        assert_eq!(pool_cidr_from_key(&dir, &path).as_deref(), Some("10.1.0.0/16"));
    }

    #[test]
    fn pool_directory_self_entry_is_filtered() {
        let dir = pools_path(IpVersion::V4);
        assert_eq!(pool_cidr_from_key(&dir, "/calico/v1/ipam/v4/pool"), None);
        assert_eq!(pool_cidr_from_key(&dir, "/calico/v1/ipam/v4/pool/"), None);
    }

    #[test]
    fn profile_and_host_names_from_keys() {
        assert_eq!(
            profile_name_from_key("/calico/v1/policy/profile/web/tags"),
            Some("web")
        );
        assert_eq!(profile_name_from_key("/calico/v1/policy/profile"), None);
        assert_eq!(hostname_from_key("/calico/v1/host/node1/bird_ip"), Some("node1"));
        assert_eq!(hostname_from_key("/calico/v1/host/node1"), None);
        assert_eq!(
            hostname_from_key("/calico/v1/host/node1/workload/docker/c/endpoint/e"),
            None
        );
    }

    #[test]
    fn segments_reject_separators() {
        assert!(ensure_segment("hostname", "node1").is_ok());
        assert!(ensure_segment("hostname", "a/b").is_err());
        assert!(ensure_segment("hostname", "").is_err());
    }
}
