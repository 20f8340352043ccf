// ── Datastore client ──
//
// The façade over the /calico/v1 key space. Every store call goes through
// one of the adapter helpers at the bottom of this file, which turn
// "key not found" into `None`/`false` where absence is a normal outcome
// and convert every other store failure into `CoreError`. Callers never
// see `calico_etcd::Error`.
//
// Only endpoint updates are conditional. Everything else is a plain
// last-writer-wins write.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

use calico_etcd::{EtcdClient, KvStore, Node};
use ipnet::IpNet;
use tracing::{debug, info, warn};

use crate::config::DatastoreConfig;
use crate::error::CoreError;
use crate::model::profile::{tags_from_json, tags_to_json};
use crate::model::{
    Endpoint, EndpointTree, IpPool, IpVersion, NextHops, Profile, Rules, StoredEndpoint,
};
use crate::paths::{self, EndpointKey, ensure_segment};

/// Value written to a host's `config/marker` once it is provisioned.
const HOST_MARKER: &str = "created";

/// Outcome of a conditional write.
enum Swap {
    Done,
    Stale,
    Missing,
}

/// Typed access to the Calico datastore.
///
/// Generic over the key-value backend so the same operations run against
/// etcd or the in-process [`calico_etcd::MemoryStore`].
#[derive(Debug, Clone)]
pub struct DatastoreClient<S = EtcdClient> {
    store: S,
}

impl DatastoreClient<EtcdClient> {
    /// Build a client for the etcd cluster described by `config`. No
    /// request is made until the first operation.
    pub fn connect(config: &DatastoreConfig) -> Result<Self, CoreError> {
        let store = EtcdClient::new(config.url.clone(), &config.transport()).map_err(|e| {
            CoreError::Config {
                message: e.to_string(),
            }
        })?;
        debug!(url = %config.url, "created etcd datastore client");
        Ok(Self::new(store))
    }
}

impl<S: KvStore> DatastoreClient<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Global config and hosts
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Write the global defaults if no global config exists yet, then mark
    /// the datastore ready.
    pub async fn ensure_global_config(&self) -> Result<(), CoreError> {
        const OP: &str = "ensure_global_config";
        if self.fetch(OP, paths::CONFIG_PATH).await?.is_none() {
            info!("initializing global config");
            self.put(OP, &paths::interface_prefix_path(), paths::IF_PREFIX)
                .await?;
        }
        self.put(OP, paths::READY_PATH, "true").await
    }

    /// Register a host with its BIRD listen addresses. Safe to repeat; an
    /// existing workload subtree is left in place.
    pub async fn create_host(
        &self,
        hostname: &str,
        bird_ip: IpAddr,
        bird6_ip: Option<IpAddr>,
    ) -> Result<(), CoreError> {
        const OP: &str = "create_host";
        ensure_segment("hostname", hostname)?;
        info!(hostname, %bird_ip, "registering host");

        let bird6 = bird6_ip.map(|ip| ip.to_string()).unwrap_or_default();
        self.put(OP, &paths::bird_ip_path(hostname), &bird_ip.to_string())
            .await?;
        self.put(OP, &paths::bird6_ip_path(hostname), &bird6).await?;
        self.put(OP, &paths::host_marker_path(hostname), HOST_MARKER)
            .await?;

        let workloads = paths::workloads_path(hostname);
        if self.fetch(OP, &workloads).await?.is_none() {
            self.make_dir(OP, &workloads).await?;
        }
        Ok(())
    }

    /// Delete a host and everything under it. An unknown host is not an
    /// error.
    pub async fn remove_host(&self, hostname: &str) -> Result<(), CoreError> {
        ensure_segment("hostname", hostname)?;
        info!(hostname, "removing host");
        self.remove_tree("remove_host", &paths::host_path(hostname))
            .await
            .map(|_| ())
    }

    /// Every host with its endpoints. Hosts with keys but no endpoints are
    /// included with an empty map.
    pub async fn get_hosts(&self) -> Result<EndpointTree, CoreError> {
        let mut hosts = EndpointTree::new();
        let Some(tree) = self.fetch_tree("get_hosts", paths::HOSTS_PATH).await? else {
            return Ok(hosts);
        };
        for leaf in tree.leaves() {
            match decode_endpoint(leaf) {
                Some(stored) => insert_endpoint(&mut hosts, stored.endpoint),
                None => {
                    if let Some(hostname) = paths::hostname_from_key(&leaf.key) {
                        hosts.entry(hostname.to_owned()).or_default();
                    }
                }
            }
        }
        Ok(hosts)
    }

    /// The default-route next hops configured for a host.
    pub async fn get_default_next_hops(&self, hostname: &str) -> Result<NextHops, CoreError> {
        const OP: &str = "get_default_next_hops";
        ensure_segment("hostname", hostname)?;
        let not_found = || CoreError::HostNotFound {
            hostname: hostname.to_owned(),
        };
        let ipv4 = self
            .fetch_value(OP, &paths::bird_ip_path(hostname))
            .await?
            .ok_or_else(not_found)?;
        let ipv6 = self
            .fetch_value(OP, &paths::bird6_ip_path(hostname))
            .await?
            .ok_or_else(not_found)?;
        Ok(NextHops::parse(&ipv4, &ipv6))
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // IP pools
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// CIDRs of the configured pools of one address family.
    pub async fn get_ip_pools(&self, version: IpVersion) -> Result<Vec<IpNet>, CoreError> {
        let dir = paths::pools_path(version);
        let Some(listing) = self.fetch("get_ip_pools", &dir).await? else {
            return Ok(Vec::new());
        };
        let mut pools = Vec::new();
        for leaf in listing.leaves() {
            let Some(cidr) = paths::pool_cidr_from_key(&dir, &leaf.key) else {
                continue;
            };
            match cidr.parse::<IpNet>() {
                Ok(net) => pools.push(net.trunc()),
                Err(e) => warn!(key = %leaf.key, error = %e, "skipping unparsable pool key"),
            }
        }
        Ok(pools)
    }

    /// Stored config of a pool; `cidr` is truncated to its network first.
    pub async fn get_ip_pool_config(&self, cidr: &IpNet) -> Result<IpPool, CoreError> {
        let cidr = cidr.trunc();
        let key = paths::pool_path(&cidr);
        let doc = self
            .fetch_value("get_ip_pool_config", &key)
            .await?
            .ok_or_else(|| CoreError::PoolNotFound {
                cidr: cidr.to_string(),
            })?;
        IpPool::from_json(&doc).map_err(|e| e.at_key(&key))
    }

    /// Add a pool, or overwrite the config of an existing one.
    pub async fn add_ip_pool(&self, pool: &IpPool) -> Result<(), CoreError> {
        let cidr = pool.cidr.trunc();
        info!(%cidr, ipip = pool.ipip, "adding IP pool");
        self.put(
            "add_ip_pool",
            &paths::pool_path(&cidr),
            &IpPool::new(cidr, pool.ipip).to_json(),
        )
        .await
    }

    pub async fn remove_ip_pool(&self, cidr: &IpNet) -> Result<(), CoreError> {
        let cidr = cidr.trunc();
        info!(%cidr, "removing IP pool");
        if self
            .remove_value("remove_ip_pool", &paths::pool_path(&cidr))
            .await?
        {
            Ok(())
        } else {
            Err(CoreError::PoolNotFound {
                cidr: cidr.to_string(),
            })
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // BGP peers
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Configured route-reflector peers of one address family.
    pub async fn get_bgp_peers(&self, version: IpVersion) -> Result<Vec<IpAddr>, CoreError> {
        let peers = self.peer_keys("get_bgp_peers", version).await?;
        Ok(peers
            .keys()
            .filter_map(|value| match value.parse::<IpAddr>() {
                Ok(addr) => Some(addr),
                Err(e) => {
                    warn!(value, error = %e, "skipping unparsable BGP peer");
                    None
                }
            })
            .collect())
    }

    /// Add a peer. Returns `false` if it was already configured.
    pub async fn add_bgp_peer(&self, address: IpAddr) -> Result<bool, CoreError> {
        const OP: &str = "add_bgp_peer";
        let version = IpVersion::of_addr(&address);
        if self.get_bgp_peers(version).await?.contains(&address) {
            debug!(%address, "BGP peer already configured");
            return Ok(false);
        }
        info!(%address, "adding BGP peer");
        self.append(OP, &paths::bgp_peers_path(version), &address.to_string())
            .await?;
        Ok(true)
    }

    pub async fn remove_bgp_peer(&self, address: IpAddr) -> Result<(), CoreError> {
        const OP: &str = "remove_bgp_peer";
        let not_found = || CoreError::PeerNotFound {
            address: address.to_string(),
        };
        let peers = self.peer_keys(OP, IpVersion::of_addr(&address)).await?;
        let key = peers.get(&address.to_string()).ok_or_else(not_found)?;
        info!(%address, "removing BGP peer");
        if self.remove_value(OP, key).await? {
            Ok(())
        } else {
            Err(not_found())
        }
    }

    /// Peer directory as value -> key.
    async fn peer_keys(
        &self,
        op: &str,
        version: IpVersion,
    ) -> Result<BTreeMap<String, String>, CoreError> {
        let Some(listing) = self.fetch(op, &paths::bgp_peers_path(version)).await? else {
            return Ok(BTreeMap::new());
        };
        Ok(listing
            .leaves()
            .into_iter()
            .filter_map(|leaf| {
                leaf.value
                    .as_ref()
                    .filter(|v| !v.is_empty())
                    .map(|v| (v.clone(), leaf.key.clone()))
            })
            .collect())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Profiles
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn profile_exists(&self, name: &str) -> Result<bool, CoreError> {
        ensure_segment("profile name", name)?;
        Ok(self
            .fetch("profile_exists", &paths::profile_path(name))
            .await?
            .is_some())
    }

    /// Create a profile with its own name as the only tag and the default
    /// policy. An existing profile is reset to these defaults.
    pub async fn create_profile(&self, name: &str) -> Result<(), CoreError> {
        const OP: &str = "create_profile";
        ensure_segment("profile name", name)?;
        info!(profile = name, "creating profile");
        let tags = BTreeSet::from([name.to_owned()]);
        self.put(OP, &paths::profile_tags_path(name), &tags_to_json(&tags))
            .await?;
        self.put(
            OP,
            &paths::profile_rules_path(name),
            &Rules::default_for(name).to_json(),
        )
        .await
    }

    pub async fn remove_profile(&self, name: &str) -> Result<(), CoreError> {
        ensure_segment("profile name", name)?;
        info!(profile = name, "removing profile");
        if self
            .remove_tree("remove_profile", &paths::profile_path(name))
            .await?
        {
            Ok(())
        } else {
            Err(CoreError::ProfileNotFound {
                name: name.to_owned(),
            })
        }
    }

    pub async fn get_profile_names(&self) -> Result<BTreeSet<String>, CoreError> {
        let Some(tree) = self
            .fetch_tree("get_profile_names", paths::PROFILES_PATH)
            .await?
        else {
            return Ok(BTreeSet::new());
        };
        Ok(tree
            .leaves()
            .into_iter()
            .filter_map(|leaf| paths::profile_name_from_key(&leaf.key))
            .map(str::to_owned)
            .collect())
    }

    /// Read a profile. Missing tags or rules documents leave the
    /// corresponding field empty.
    pub async fn get_profile(&self, name: &str) -> Result<Profile, CoreError> {
        const OP: &str = "get_profile";
        ensure_segment("profile name", name)?;
        if self.fetch(OP, &paths::profile_path(name)).await?.is_none() {
            return Err(CoreError::ProfileNotFound {
                name: name.to_owned(),
            });
        }

        let mut profile = Profile::new(name);
        let tags_key = paths::profile_tags_path(name);
        if let Some(doc) = self.fetch_value(OP, &tags_key).await? {
            profile.tags = tags_from_json(&doc).map_err(|e| e.at_key(&tags_key))?;
        }
        let rules_key = paths::profile_rules_path(name);
        if let Some(doc) = self.fetch_value(OP, &rules_key).await? {
            profile.set_rules(Rules::from_json(&doc).map_err(|e| e.at_key(&rules_key))?);
        }
        Ok(profile)
    }

    /// Overwrite a profile's tags, creating the profile if needed.
    pub async fn profile_update_tags(&self, profile: &Profile) -> Result<(), CoreError> {
        ensure_segment("profile name", profile.name())?;
        info!(profile = profile.name(), "updating profile tags");
        self.put(
            "profile_update_tags",
            &paths::profile_tags_path(profile.name()),
            &tags_to_json(&profile.tags),
        )
        .await
    }

    /// Overwrite a profile's rules, creating the profile if needed.
    pub async fn profile_update_rules(&self, profile: &Profile) -> Result<(), CoreError> {
        ensure_segment("profile name", profile.name())?;
        info!(profile = profile.name(), "updating profile rules");
        self.put(
            "profile_update_rules",
            &paths::profile_rules_path(profile.name()),
            &profile.rules().to_json(),
        )
        .await
    }

    /// Ids of every endpoint whose profile list contains `name`.
    pub async fn get_profile_members_ep_ids(&self, name: &str) -> Result<Vec<String>, CoreError> {
        Ok(self
            .scan_endpoints("get_profile_members_ep_ids")
            .await?
            .into_iter()
            .filter(|stored| stored.endpoint.profile_ids.iter().any(|p| p == name))
            .map(|stored| stored.endpoint.endpoint_id)
            .collect())
    }

    /// Every endpoint whose profile list contains `name`, nested by host.
    pub async fn get_profile_members(&self, name: &str) -> Result<EndpointTree, CoreError> {
        let mut members = EndpointTree::new();
        for stored in self.scan_endpoints("get_profile_members").await? {
            if stored.endpoint.profile_ids.iter().any(|p| p == name) {
                insert_endpoint(&mut members, stored.endpoint);
            }
        }
        Ok(members)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Endpoints
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn get_endpoint(
        &self,
        hostname: &str,
        container_id: &str,
        endpoint_id: &str,
    ) -> Result<StoredEndpoint, CoreError> {
        ensure_segment("hostname", hostname)?;
        ensure_segment("container id", container_id)?;
        ensure_segment("endpoint id", endpoint_id)?;
        let key = paths::endpoint_path(
            hostname,
            paths::DOCKER_ORCHESTRATOR,
            container_id,
            endpoint_id,
        );
        let doc = self
            .fetch_value("get_endpoint", &key)
            .await?
            .ok_or_else(|| CoreError::EndpointNotFound {
                endpoint_id: endpoint_id.to_owned(),
            })?;
        let endpoint = Endpoint::from_json(&key, &doc)?.ok_or_else(|| {
            CoreError::MalformedDocument {
                key: key.clone(),
                reason: "not an endpoint key".into(),
            }
        })?;
        Ok(StoredEndpoint::new(endpoint, doc))
    }

    /// Every endpoint of a container.
    pub async fn get_endpoints(
        &self,
        hostname: &str,
        container_id: &str,
    ) -> Result<Vec<StoredEndpoint>, CoreError> {
        let listing = self.container_endpoints(hostname, container_id).await?;
        listing
            .leaves()
            .into_iter()
            .filter_map(|leaf| {
                let doc = leaf.value.as_ref()?;
                match Endpoint::from_json(&leaf.key, doc) {
                    Ok(ep) => ep.map(|ep| Ok(StoredEndpoint::new(ep, doc.clone()))),
                    Err(e) => Some(Err(e)),
                }
            })
            .collect()
    }

    /// Id of the first endpoint of a container.
    pub async fn get_ep_id_from_cont(
        &self,
        hostname: &str,
        container_id: &str,
    ) -> Result<String, CoreError> {
        let listing = self.container_endpoints(hostname, container_id).await?;
        listing
            .leaves()
            .into_iter()
            .filter(|leaf| leaf.value.is_some())
            .find_map(|leaf| EndpointKey::parse(&leaf.key))
            .map(|key| key.endpoint_id)
            .ok_or_else(|| CoreError::NoEndpointForContainer {
                hostname: hostname.to_owned(),
                container_id: container_id.to_owned(),
            })
    }

    /// Find an endpoint by id on any host. Scans the whole host tree.
    pub async fn get_endpoint_from_id(&self, endpoint_id: &str) -> Result<StoredEndpoint, CoreError> {
        ensure_segment("endpoint id", endpoint_id)?;
        self.scan_endpoints("get_endpoint_from_id")
            .await?
            .into_iter()
            .find(|stored| stored.endpoint.endpoint_id == endpoint_id)
            .ok_or_else(|| CoreError::EndpointNotFound {
                endpoint_id: endpoint_id.to_owned(),
            })
    }

    /// Write an endpoint unconditionally, returning it bound to the
    /// document just written.
    pub async fn set_endpoint(&self, endpoint: Endpoint) -> Result<StoredEndpoint, CoreError> {
        ensure_segment("hostname", &endpoint.hostname)?;
        ensure_segment("orchestrator id", &endpoint.orchestrator_id)?;
        ensure_segment("workload id", &endpoint.workload_id)?;
        ensure_segment("endpoint id", &endpoint.endpoint_id)?;
        info!(endpoint_id = %endpoint.endpoint_id, hostname = %endpoint.hostname, "writing endpoint");
        let doc = endpoint.to_json();
        self.put("set_endpoint", &endpoint.path(), &doc).await?;
        Ok(StoredEndpoint::new(endpoint, doc))
    }

    /// Write back a modified endpoint, provided the stored document is still
    /// the one `stored` was read as.
    ///
    /// On success the record is rebound to the new document. If another
    /// writer got there first this fails with `ConcurrentUpdate`, the stored
    /// value is untouched and so is `stored`; re-read and reapply to retry.
    pub async fn update_endpoint(&self, stored: &mut StoredEndpoint) -> Result<(), CoreError> {
        let key = stored.endpoint.path();
        let doc = stored.endpoint.to_json();
        debug!(%key, "conditionally updating endpoint");
        match self
            .swap("update_endpoint", &key, &doc, stored.revision())
            .await?
        {
            Swap::Done => {
                stored.set_revision(doc);
                Ok(())
            }
            Swap::Stale => {
                warn!(%key, "endpoint changed since it was read");
                Err(CoreError::ConcurrentUpdate { key })
            }
            Swap::Missing => Err(CoreError::EndpointNotFound {
                endpoint_id: stored.endpoint.endpoint_id.clone(),
            }),
        }
    }

    /// Append profiles to an endpoint's list. Fails without writing if any
    /// of them is already present (or repeated in `profiles`).
    pub async fn append_profiles_to_endpoint(
        &self,
        endpoint_id: &str,
        profiles: &[String],
    ) -> Result<(), CoreError> {
        let mut stored = self.get_endpoint_from_id(endpoint_id).await?;
        let current = &stored.endpoint.profile_ids;
        let mut seen = BTreeSet::new();
        if let Some(dup) = profiles
            .iter()
            .find(|p| current.contains(p) || !seen.insert(p.as_str()))
        {
            return Err(CoreError::ProfileAlreadyInEndpoint {
                profile: dup.clone(),
                endpoint_id: endpoint_id.to_owned(),
            });
        }
        stored.endpoint.profile_ids.extend_from_slice(profiles);
        self.update_endpoint(&mut stored).await
    }

    /// Replace an endpoint's profile list.
    pub async fn set_profiles_on_endpoint(
        &self,
        endpoint_id: &str,
        profiles: &[String],
    ) -> Result<(), CoreError> {
        let mut seen = BTreeSet::new();
        if let Some(dup) = profiles.iter().find(|p| !seen.insert(p.as_str())) {
            return Err(CoreError::ProfileAlreadyInEndpoint {
                profile: dup.clone(),
                endpoint_id: endpoint_id.to_owned(),
            });
        }
        let mut stored = self.get_endpoint_from_id(endpoint_id).await?;
        stored.endpoint.profile_ids = profiles.to_vec();
        self.update_endpoint(&mut stored).await
    }

    /// Remove profiles from an endpoint's list. Fails without writing if any
    /// of them is not present. A name repeated in `profiles` is absent by
    /// the time its second occurrence is removed, so it fails the same way.
    pub async fn remove_profiles_from_endpoint(
        &self,
        endpoint_id: &str,
        profiles: &[String],
    ) -> Result<(), CoreError> {
        let mut stored = self.get_endpoint_from_id(endpoint_id).await?;
        let current = &stored.endpoint.profile_ids;
        let mut seen = BTreeSet::new();
        if let Some(missing) = profiles
            .iter()
            .find(|p| !current.contains(p) || !seen.insert(p.as_str()))
        {
            return Err(CoreError::ProfileNotInEndpoint {
                profile: missing.clone(),
                endpoint_id: endpoint_id.to_owned(),
            });
        }
        stored.endpoint.profile_ids.retain(|p| !profiles.contains(p));
        self.update_endpoint(&mut stored).await
    }

    /// Delete a container and its endpoints.
    pub async fn remove_container(&self, hostname: &str, container_id: &str) -> Result<(), CoreError> {
        ensure_segment("hostname", hostname)?;
        ensure_segment("container id", container_id)?;
        info!(hostname, container_id, "removing container");
        if self
            .remove_tree(
                "remove_container",
                &paths::container_path(hostname, container_id),
            )
            .await?
        {
            Ok(())
        } else {
            Err(CoreError::ContainerNotFound {
                hostname: hostname.to_owned(),
                container_id: container_id.to_owned(),
            })
        }
    }

    /// Delete everything under `/calico`.
    pub async fn remove_all_data(&self) -> Result<(), CoreError> {
        warn!("removing all Calico data");
        self.remove_tree("remove_all_data", paths::CALICO_ROOT)
            .await
            .map(|_| ())
    }

    async fn container_endpoints(
        &self,
        hostname: &str,
        container_id: &str,
    ) -> Result<Node, CoreError> {
        ensure_segment("hostname", hostname)?;
        ensure_segment("container id", container_id)?;
        self.fetch(
            "get_endpoints",
            &paths::container_endpoints_path(hostname, container_id),
        )
        .await?
        .ok_or_else(|| CoreError::ContainerNotFound {
            hostname: hostname.to_owned(),
            container_id: container_id.to_owned(),
        })
    }

    /// Every decodable endpoint on every host.
    async fn scan_endpoints(&self, op: &str) -> Result<Vec<StoredEndpoint>, CoreError> {
        let Some(tree) = self.fetch_tree(op, paths::HOSTS_PATH).await? else {
            return Ok(Vec::new());
        };
        Ok(tree.leaves().into_iter().filter_map(decode_endpoint).collect())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Store adapters
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn fetch(&self, op: &str, key: &str) -> Result<Option<Node>, CoreError> {
        debug!(op, key, "read");
        absent_as_none(op, self.store.read(key).await)
    }

    async fn fetch_tree(&self, op: &str, key: &str) -> Result<Option<Node>, CoreError> {
        debug!(op, key, "recursive read");
        absent_as_none(op, self.store.read_recursive(key).await)
    }

    /// Value at `key`; a directory reads as an empty value.
    async fn fetch_value(&self, op: &str, key: &str) -> Result<Option<String>, CoreError> {
        Ok(self
            .fetch(op, key)
            .await?
            .map(|node| node.value.unwrap_or_default()))
    }

    async fn put(&self, op: &str, key: &str, value: &str) -> Result<(), CoreError> {
        debug!(op, key, "write");
        self.store
            .write(key, value)
            .await
            .map(|_| ())
            .map_err(|e| CoreError::from_store(op, e))
    }

    async fn swap(&self, op: &str, key: &str, value: &str, prev: &str) -> Result<Swap, CoreError> {
        match self.store.write_if_value(key, value, prev).await {
            Ok(_) => Ok(Swap::Done),
            Err(e) if e.is_compare_failed() => Ok(Swap::Stale),
            Err(e) if e.is_not_found() => Ok(Swap::Missing),
            Err(e) => Err(CoreError::from_store(op, e)),
        }
    }

    async fn make_dir(&self, op: &str, key: &str) -> Result<(), CoreError> {
        debug!(op, key, "mkdir");
        match self.store.mkdir(key).await {
            // Lost a race with another creator.
            Ok(_)
            | Err(calico_etcd::Error::NotAFile { .. } | calico_etcd::Error::NodeExists { .. }) => {
                Ok(())
            }
            Err(e) => Err(CoreError::from_store(op, e)),
        }
    }

    async fn append(&self, op: &str, dir: &str, value: &str) -> Result<(), CoreError> {
        debug!(op, dir, "append");
        self.store
            .append(dir, value)
            .await
            .map(|_| ())
            .map_err(|e| CoreError::from_store(op, e))
    }

    /// Delete a value. Returns `false` if it did not exist.
    async fn remove_value(&self, op: &str, key: &str) -> Result<bool, CoreError> {
        debug!(op, key, "delete");
        absent_as_none(op, self.store.delete(key).await).map(|r| r.is_some())
    }

    /// Delete a subtree. Returns `false` if it did not exist.
    async fn remove_tree(&self, op: &str, key: &str) -> Result<bool, CoreError> {
        debug!(op, key, "recursive delete");
        absent_as_none(op, self.store.delete_recursive(key).await).map(|r| r.is_some())
    }
}

fn absent_as_none<T>(op: &str, result: Result<T, calico_etcd::Error>) -> Result<Option<T>, CoreError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(CoreError::from_store(op, e)),
    }
}

/// Decode a scanned leaf as an endpoint. Directories, keys of another shape
/// and undecodable documents yield `None`.
fn decode_endpoint(leaf: &Node) -> Option<StoredEndpoint> {
    let doc = leaf.value.as_ref()?;
    match Endpoint::from_json(&leaf.key, doc) {
        Ok(ep) => ep.map(|ep| StoredEndpoint::new(ep, doc.clone())),
        Err(e) => {
            warn!(key = %leaf.key, error = %e, "skipping undecodable endpoint");
            None
        }
    }
}

fn insert_endpoint(tree: &mut EndpointTree, ep: Endpoint) {
    tree.entry(ep.hostname.clone())
        .or_default()
        .entry(ep.orchestrator_id.clone())
        .or_default()
        .entry(ep.workload_id.clone())
        .or_default()
        .insert(ep.endpoint_id.clone(), ep);
}
