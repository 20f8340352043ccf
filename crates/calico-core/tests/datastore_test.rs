#![allow(clippy::unwrap_used)]
// Integration tests for `DatastoreClient` over the in-memory store.

use std::net::IpAddr;

use pretty_assertions::assert_eq;

use calico_core::model::net::parse_net;
use calico_core::paths::{self, EndpointKey};
use calico_core::{
    CoreError, DatastoreClient, Endpoint, IpPool, IpVersion, MacAddress, Profile, Rule, Rules,
};
use calico_etcd::{Error, KvStore, MemoryStore, Node};

// ── Helpers ─────────────────────────────────────────────────────────

fn setup() -> (MemoryStore, DatastoreClient<MemoryStore>) {
    let store = MemoryStore::new();
    let client = DatastoreClient::new(store.clone());
    (store, client)
}

fn endpoint(host: &str, container: &str, ep_id: &str, profiles: &[&str]) -> Endpoint {
    let key = EndpointKey::parse(&paths::endpoint_path(host, "docker", container, ep_id)).unwrap();
    let mut ep = Endpoint::new(key, "active", MacAddress::new("ee:ee:ee:ee:ee:ee"));
    ep.add_ipv4_net("192.168.0.2/32".parse().unwrap());
    ep.profile_ids = profiles.iter().map(|p| (*p).to_owned()).collect();
    ep
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_owned()).collect()
}

// ── Global config and hosts ─────────────────────────────────────────

#[tokio::test]
async fn test_ensure_global_config_keeps_existing_config() {
    let (store, client) = setup();

    client.ensure_global_config().await.unwrap();
    let dump = store.dump().await;
    assert_eq!(dump.get("/calico/v1/config/InterfacePrefix").unwrap(), "cali");
    assert_eq!(dump.get("/calico/v1/Ready").unwrap(), "true");

    store
        .write("/calico/v1/config/InterfacePrefix", "tap")
        .await
        .unwrap();
    client.ensure_global_config().await.unwrap();
    let dump = store.dump().await;
    assert_eq!(dump.get("/calico/v1/config/InterfacePrefix").unwrap(), "tap");
}

#[tokio::test]
async fn test_create_host_is_repeatable() {
    let (store, client) = setup();
    let ip: IpAddr = "10.0.0.1".parse().unwrap();

    client.create_host("node1", ip, None).await.unwrap();
    client.set_endpoint(endpoint("node1", "c1", "ep1", &[])).await.unwrap();
    client.create_host("node1", ip, None).await.unwrap();

    let dump = store.dump().await;
    assert_eq!(dump.get("/calico/v1/host/node1/bird_ip").unwrap(), "10.0.0.1");
    assert_eq!(dump.get("/calico/v1/host/node1/bird6_ip").unwrap(), "");
    assert_eq!(dump.get("/calico/v1/host/node1/config/marker").unwrap(), "created");
    assert!(client.get_endpoint("node1", "c1", "ep1").await.is_ok());
}

/// Reports the workload directory as absent even though it exists, as if
/// another creator made it between the check and the mkdir.
struct RacingStore(MemoryStore);

impl KvStore for RacingStore {
    async fn read(&self, key: &str) -> Result<Node, Error> {
        if key.trim_end_matches('/').ends_with("/workload") {
            return Err(Error::KeyNotFound { key: key.to_owned() });
        }
        self.0.read(key).await
    }

    async fn read_recursive(&self, key: &str) -> Result<Node, Error> {
        self.0.read_recursive(key).await
    }

    async fn write(&self, key: &str, value: &str) -> Result<Node, Error> {
        self.0.write(key, value).await
    }

    async fn write_if_value(&self, key: &str, value: &str, prev_value: &str) -> Result<Node, Error> {
        self.0.write_if_value(key, value, prev_value).await
    }

    async fn mkdir(&self, key: &str) -> Result<Node, Error> {
        self.0.mkdir(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.0.delete(key).await
    }

    async fn delete_recursive(&self, key: &str) -> Result<(), Error> {
        self.0.delete_recursive(key).await
    }

    async fn append(&self, dir: &str, value: &str) -> Result<Node, Error> {
        self.0.append(dir, value).await
    }
}

#[tokio::test]
async fn test_create_host_tolerates_concurrent_mkdir() {
    let store = MemoryStore::new();
    store.mkdir("/calico/v1/host/node1/workload").await.unwrap();
    let client = DatastoreClient::new(RacingStore(store.clone()));

    client
        .create_host("node1", "10.0.0.1".parse().unwrap(), None)
        .await
        .unwrap();
    assert_eq!(
        store.dump().await.get("/calico/v1/host/node1/bird_ip").unwrap(),
        "10.0.0.1"
    );
}

#[tokio::test]
async fn test_get_hosts_includes_hosts_without_endpoints() {
    let (_store, client) = setup();
    client
        .create_host("bare", "10.0.0.2".parse().unwrap(), None)
        .await
        .unwrap();
    client.set_endpoint(endpoint("busy", "c1", "ep1", &[])).await.unwrap();

    let hosts = client.get_hosts().await.unwrap();
    assert!(hosts["bare"].is_empty());
    assert_eq!(hosts["busy"]["docker"]["c1"]["ep1"].endpoint_id, "ep1");
}

#[tokio::test]
async fn test_remove_host_swallows_missing() {
    let (store, client) = setup();
    client
        .create_host("node1", "10.0.0.1".parse().unwrap(), None)
        .await
        .unwrap();
    client.remove_host("node1").await.unwrap();
    client.remove_host("node1").await.unwrap();
    assert!(store.dump().await.is_empty());
}

#[tokio::test]
async fn test_default_next_hops() {
    let (_store, client) = setup();
    client
        .create_host(
            "node1",
            "10.0.0.1".parse().unwrap(),
            Some("fd80::1".parse().unwrap()),
        )
        .await
        .unwrap();
    let hops = client.get_default_next_hops("node1").await.unwrap();
    assert_eq!(hops.ipv4, Some("10.0.0.1".parse().unwrap()));
    assert_eq!(hops.ipv6, Some("fd80::1".parse().unwrap()));

    let err = client.get_default_next_hops("ghost").await.unwrap_err();
    assert!(matches!(err, CoreError::HostNotFound { .. }));
}

// ── IP pools ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_add_ip_pool_twice_keeps_last_flag() {
    let (_store, client) = setup();
    let cidr = parse_net("10.1.1.1/16").unwrap();

    client.add_ip_pool(&IpPool::new(cidr, false)).await.unwrap();
    client.add_ip_pool(&IpPool::new(cidr, true)).await.unwrap();

    let pools = client.get_ip_pools(IpVersion::V4).await.unwrap();
    assert_eq!(pools, vec![parse_net("10.1.0.0/16").unwrap()]);
    assert!(client.get_ip_pool_config(&cidr).await.unwrap().ipip);

    client.add_ip_pool(&IpPool::new(cidr, false)).await.unwrap();
    assert!(!client.get_ip_pool_config(&cidr).await.unwrap().ipip);
}

#[tokio::test]
async fn test_empty_pool_directory_lists_nothing() {
    let (store, client) = setup();
    assert!(client.get_ip_pools(IpVersion::V6).await.unwrap().is_empty());

    store.mkdir("/calico/v1/ipam/v6/pool").await.unwrap();
    assert!(client.get_ip_pools(IpVersion::V6).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_unknown_pool() {
    let (_store, client) = setup();
    let cidr = parse_net("fd80:24e2::/64").unwrap();
    client.add_ip_pool(&IpPool::new(cidr, false)).await.unwrap();
    client.remove_ip_pool(&cidr).await.unwrap();

    let err = client.remove_ip_pool(&cidr).await.unwrap_err();
    assert!(matches!(err, CoreError::PoolNotFound { ref cidr } if cidr == "fd80:24e2::/64"));
    assert!(client.get_ip_pool_config(&cidr).await.unwrap_err().is_not_found());
}

// ── BGP peers ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_bgp_peer_add_is_idempotent() {
    let (_store, client) = setup();
    let peer: IpAddr = "192.0.2.10".parse().unwrap();

    assert!(client.add_bgp_peer(peer).await.unwrap());
    assert!(!client.add_bgp_peer(peer).await.unwrap());
    assert_eq!(client.get_bgp_peers(IpVersion::V4).await.unwrap(), vec![peer]);
    assert!(client.get_bgp_peers(IpVersion::V6).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_unknown_bgp_peer_leaves_directory() {
    let (store, client) = setup();
    let peer: IpAddr = "192.0.2.10".parse().unwrap();
    client.add_bgp_peer(peer).await.unwrap();
    let before = store.dump().await;

    let err = client
        .remove_bgp_peer("192.0.2.99".parse().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::PeerNotFound { ref address } if address == "192.0.2.99"));
    assert_eq!(store.dump().await, before);

    client.remove_bgp_peer(peer).await.unwrap();
    assert!(client.get_bgp_peers(IpVersion::V4).await.unwrap().is_empty());
}

// ── Profiles ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_profile_resets_to_defaults() {
    let (_store, client) = setup();
    client.create_profile("web").await.unwrap();

    let mut profile = client.get_profile("web").await.unwrap();
    profile.tags.insert("extra".into());
    profile.set_rules(Rules {
        id: "web".into(),
        inbound_rules: vec![Rule::allow().with_protocol("tcp")],
        outbound_rules: vec![],
    });
    client.profile_update_tags(&profile).await.unwrap();
    client.profile_update_rules(&profile).await.unwrap();

    client.create_profile("web").await.unwrap();
    let profile = client.get_profile("web").await.unwrap();
    assert_eq!(profile.tags.iter().cloned().collect::<Vec<_>>(), names(&["web"]));
    assert_eq!(profile.rules(), &Rules::default_for("web"));
}

#[tokio::test]
async fn test_partial_profile_reads_as_empty() {
    let (store, client) = setup();
    store
        .write("/calico/v1/policy/profile/half/tags", r#"["half"]"#)
        .await
        .unwrap();

    let profile = client.get_profile("half").await.unwrap();
    assert!(profile.tags.contains("half"));
    assert_eq!(profile.rules(), &Rules::empty("half"));

    let err = client.get_profile("nope").await.unwrap_err();
    assert!(matches!(err, CoreError::ProfileNotFound { .. }));
}

#[tokio::test]
async fn test_profile_names_and_removal() {
    let (_store, client) = setup();
    assert!(client.get_profile_names().await.unwrap().is_empty());

    client.create_profile("a").await.unwrap();
    client.create_profile("b").await.unwrap();
    let listed: Vec<String> = client.get_profile_names().await.unwrap().into_iter().collect();
    assert_eq!(listed, names(&["a", "b"]));

    assert!(client.profile_exists("a").await.unwrap());
    client.remove_profile("a").await.unwrap();
    assert!(!client.profile_exists("a").await.unwrap());
    assert!(client.remove_profile("a").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_update_tags_creates_profile() {
    let (_store, client) = setup();
    let mut profile = Profile::new("fresh");
    profile.tags.insert("t1".into());
    client.profile_update_tags(&profile).await.unwrap();
    assert!(client.profile_exists("fresh").await.unwrap());
}

#[tokio::test]
async fn test_profile_members_skip_stray_leaves() {
    let (store, client) = setup();
    client.set_endpoint(endpoint("h1", "c1", "ep1", &["A"])).await.unwrap();
    client.set_endpoint(endpoint("h1", "c2", "ep2", &["B"])).await.unwrap();
    client.set_endpoint(endpoint("h2", "c3", "ep3", &["A", "B"])).await.unwrap();
    client
        .create_host("h3", "10.0.0.3".parse().unwrap(), None)
        .await
        .unwrap();
    store
        .mkdir("/calico/v1/host/h2/workload/docker/c4/endpoint")
        .await
        .unwrap();
    store
        .write("/calico/v1/host/h2/workload/docker/c5/endpoint/bad", "garbage")
        .await
        .unwrap();

    let mut ids = client.get_profile_members_ep_ids("A").await.unwrap();
    ids.sort();
    assert_eq!(ids, names(&["ep1", "ep3"]));

    let members = client.get_profile_members("B").await.unwrap();
    assert_eq!(members.len(), 2);
    assert!(members["h1"]["docker"].contains_key("c2"));
    assert!(members["h2"]["docker"]["c3"].contains_key("ep3"));
}

#[tokio::test]
async fn test_profile_members_without_hosts() {
    let (_store, client) = setup();
    assert!(client.get_profile_members_ep_ids("A").await.unwrap().is_empty());
    assert!(client.get_profile_members("A").await.unwrap().is_empty());
}

// ── Endpoints ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_set_then_get_endpoint() {
    let (_store, client) = setup();
    let ep = endpoint("h1", "c1", "ep1", &["A"]);
    let written = client.set_endpoint(ep.clone()).await.unwrap();

    let read = client.get_endpoint("h1", "c1", "ep1").await.unwrap();
    assert_eq!(read.endpoint, ep);
    assert_eq!(read.revision(), written.revision());

    let err = client.get_endpoint("h1", "c1", "nope").await.unwrap_err();
    assert!(matches!(err, CoreError::EndpointNotFound { .. }));
}

#[tokio::test]
async fn test_stale_update_is_rejected() {
    let (store, client) = setup();
    client.set_endpoint(endpoint("h1", "c1", "ep1", &["A"])).await.unwrap();

    let mut mine = client.get_endpoint("h1", "c1", "ep1").await.unwrap();
    let mut theirs = client.get_endpoint("h1", "c1", "ep1").await.unwrap();
    theirs.endpoint.state = "inactive".into();
    client.update_endpoint(&mut theirs).await.unwrap();
    let stored_by_them = store
        .dump()
        .await
        .get(&mine.endpoint.path())
        .cloned()
        .unwrap();

    let revision_before = mine.revision().to_owned();
    mine.endpoint.profile_ids.push("B".into());
    let err = client.update_endpoint(&mut mine).await.unwrap_err();
    assert!(err.is_concurrent_update());
    assert!(!err.is_not_found());
    assert_eq!(mine.revision(), revision_before);

    let now = store.dump().await.get(&mine.endpoint.path()).cloned().unwrap();
    assert_eq!(now, stored_by_them);
}

#[tokio::test]
async fn test_update_rebinds_revision() {
    let (_store, client) = setup();
    client.set_endpoint(endpoint("h1", "c1", "ep1", &[])).await.unwrap();

    let mut stored = client.get_endpoint("h1", "c1", "ep1").await.unwrap();
    stored.endpoint.state = "inactive".into();
    client.update_endpoint(&mut stored).await.unwrap();
    stored.endpoint.state = "active".into();
    client.update_endpoint(&mut stored).await.unwrap();

    let read = client.get_endpoint("h1", "c1", "ep1").await.unwrap();
    assert_eq!(read.endpoint.state, "active");
}

#[tokio::test]
async fn test_update_of_removed_endpoint() {
    let (_store, client) = setup();
    let mut stored = client.set_endpoint(endpoint("h1", "c1", "ep1", &[])).await.unwrap();
    client.remove_container("h1", "c1").await.unwrap();

    let err = client.update_endpoint(&mut stored).await.unwrap_err();
    assert!(matches!(err, CoreError::EndpointNotFound { .. }));
}

#[tokio::test]
async fn test_container_lookups() {
    let (store, client) = setup();
    let err = client.get_ep_id_from_cont("h1", "c1").await.unwrap_err();
    assert!(matches!(err, CoreError::ContainerNotFound { .. }));

    store
        .mkdir("/calico/v1/host/h1/workload/docker/c1/endpoint")
        .await
        .unwrap();
    let err = client.get_ep_id_from_cont("h1", "c1").await.unwrap_err();
    assert!(matches!(err, CoreError::NoEndpointForContainer { .. }));
    assert!(client.get_endpoints("h1", "c1").await.unwrap().is_empty());

    client.set_endpoint(endpoint("h1", "c1", "ep1", &[])).await.unwrap();
    assert_eq!(client.get_ep_id_from_cont("h1", "c1").await.unwrap(), "ep1");
    let eps = client.get_endpoints("h1", "c1").await.unwrap();
    assert_eq!(eps.len(), 1);
    assert_eq!(eps[0].endpoint.endpoint_id, "ep1");
}

#[tokio::test]
async fn test_get_endpoint_from_id_scans_all_hosts() {
    let (_store, client) = setup();
    client.set_endpoint(endpoint("h1", "c1", "ep1", &[])).await.unwrap();
    client.set_endpoint(endpoint("h2", "c2", "ep2", &[])).await.unwrap();

    let found = client.get_endpoint_from_id("ep2").await.unwrap();
    assert_eq!(found.endpoint.hostname, "h2");
    assert!(client.get_endpoint_from_id("ep9").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_append_conflict_leaves_endpoint_unchanged() {
    let (store, client) = setup();
    client.set_endpoint(endpoint("h1", "c1", "ep1", &["A", "B"])).await.unwrap();
    let before = store.dump().await;

    let err = client
        .append_profiles_to_endpoint("ep1", &names(&["C", "B", "D"]))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ProfileAlreadyInEndpoint { ref profile, .. } if profile == "B"));
    assert!(err.is_conflict());
    assert_eq!(store.dump().await, before);

    client
        .append_profiles_to_endpoint("ep1", &names(&["C", "D"]))
        .await
        .unwrap();
    let ep = client.get_endpoint_from_id("ep1").await.unwrap().endpoint;
    assert_eq!(ep.profile_ids, names(&["A", "B", "C", "D"]));
}

#[tokio::test]
async fn test_remove_profiles_validates_batch() {
    let (store, client) = setup();
    client.set_endpoint(endpoint("h1", "c1", "ep1", &["A", "B", "C"])).await.unwrap();
    let before = store.dump().await;

    let err = client
        .remove_profiles_from_endpoint("ep1", &names(&["A", "Z"]))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ProfileNotInEndpoint { ref profile, .. } if profile == "Z"));
    assert_eq!(store.dump().await, before);

    client
        .remove_profiles_from_endpoint("ep1", &names(&["A", "C"]))
        .await
        .unwrap();
    let ep = client.get_endpoint_from_id("ep1").await.unwrap().endpoint;
    assert_eq!(ep.profile_ids, names(&["B"]));
}

#[tokio::test]
async fn test_remove_profiles_rejects_repeated_name() {
    let (store, client) = setup();
    client.set_endpoint(endpoint("h1", "c1", "ep1", &["A", "B"])).await.unwrap();
    let before = store.dump().await;

    let err = client
        .remove_profiles_from_endpoint("ep1", &names(&["A", "A"]))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ProfileNotInEndpoint { ref profile, .. } if profile == "A"));
    assert_eq!(store.dump().await, before);
}

#[tokio::test]
async fn test_profile_update_keeps_stored_mac_text() {
    let (store, client) = setup();
    let key = paths::endpoint_path("h1", "docker", "c1", "ep1");
    store
        .write(
            &key,
            r#"{"state":"active","name":"caliep1","mac":"EE-EE-EE-EE-EE-EE","profile_ids":[],"ipv4_nets":[],"ipv6_nets":[]}"#,
        )
        .await
        .unwrap();

    client
        .append_profiles_to_endpoint("ep1", &names(&["A"]))
        .await
        .unwrap();
    let doc: serde_json::Value =
        serde_json::from_str(store.dump().await.get(&key).unwrap()).unwrap();
    assert_eq!(doc["mac"], "EE-EE-EE-EE-EE-EE");
    assert_eq!(doc["profile_ids"], serde_json::json!(["A"]));
}

#[tokio::test]
async fn test_set_profiles_replaces_list() {
    let (_store, client) = setup();
    client.set_endpoint(endpoint("h1", "c1", "ep1", &["A"])).await.unwrap();

    client
        .set_profiles_on_endpoint("ep1", &names(&["X", "Y"]))
        .await
        .unwrap();
    let ep = client.get_endpoint_from_id("ep1").await.unwrap().endpoint;
    assert_eq!(ep.profile_ids, names(&["X", "Y"]));

    let err = client
        .set_profiles_on_endpoint("ep1", &names(&["X", "X"]))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_remove_container_and_all_data() {
    let (store, client) = setup();
    client.set_endpoint(endpoint("h1", "c1", "ep1", &[])).await.unwrap();

    client.remove_container("h1", "c1").await.unwrap();
    let err = client.remove_container("h1", "c1").await.unwrap_err();
    assert!(matches!(err, CoreError::ContainerNotFound { .. }));

    client.create_profile("web").await.unwrap();
    client.remove_all_data().await.unwrap();
    client.remove_all_data().await.unwrap();
    assert!(store.dump().await.is_empty());
}

#[tokio::test]
async fn test_identifiers_with_separators_are_rejected() {
    let (store, client) = setup();
    let err = client.create_profile("a/b").await.unwrap_err();
    assert!(err.is_validation());
    assert!(store.dump().await.is_empty());
}
