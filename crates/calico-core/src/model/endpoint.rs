// ── Workload endpoints ──
//
// An endpoint is one workload's network attachment. Its identity lives in
// the store key; the stored JSON document carries everything else.

use std::collections::{BTreeMap, BTreeSet};
use std::net::{Ipv4Addr, Ipv6Addr};

use ipnet::{Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::mac::MacAddress;
use super::net::{parse_addr, parse_v4_net, parse_v6_net};
use crate::error::CoreError;
use crate::paths::{EndpointKey, IF_PREFIX, VETH_NAME};

/// Length of the endpoint id prefix used in the host-side interface name.
const IF_NAME_ID_CHARS: usize = 11;

/// A workload endpoint.
///
/// Equality compares every field. A plain `Endpoint` carries no record of
/// what is stored; see [`StoredEndpoint`] for the read-back form used by
/// conditional updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub hostname: String,
    pub orchestrator_id: String,
    pub workload_id: String,
    pub endpoint_id: String,
    pub state: String,
    pub mac: MacAddress,
    /// Interface name inside the workload's namespace.
    pub if_name: String,
    /// Applied profiles, in application order.
    pub profile_ids: Vec<String>,
    pub ipv4_nets: BTreeSet<Ipv4Net>,
    pub ipv6_nets: BTreeSet<Ipv6Net>,
    pub ipv4_gateway: Option<Ipv4Addr>,
    pub ipv6_gateway: Option<Ipv6Addr>,
}

/// Stored form. `profile_id` is the legacy single-profile field.
#[derive(Deserialize)]
struct EndpointDocument {
    state: String,
    mac: String,
    #[serde(rename = "container:if_name", default)]
    if_name: Option<String>,
    #[serde(default)]
    profile_id: Option<String>,
    #[serde(default)]
    profile_ids: Option<Vec<String>>,
    #[serde(default)]
    ipv4_nets: Vec<String>,
    #[serde(default)]
    ipv6_nets: Vec<String>,
    #[serde(default)]
    ipv4_gateway: Option<String>,
    #[serde(default)]
    ipv6_gateway: Option<String>,
}

impl Endpoint {
    /// A new endpoint with no addresses and no profiles.
    pub fn new(key: EndpointKey, state: impl Into<String>, mac: MacAddress) -> Self {
        Self {
            hostname: key.hostname,
            orchestrator_id: key.orchestrator_id,
            workload_id: key.workload_id,
            endpoint_id: key.endpoint_id,
            state: state.into(),
            mac,
            if_name: VETH_NAME.to_owned(),
            profile_ids: Vec::new(),
            ipv4_nets: BTreeSet::new(),
            ipv6_nets: BTreeSet::new(),
            ipv4_gateway: None,
            ipv6_gateway: None,
        }
    }

    pub fn key(&self) -> EndpointKey {
        EndpointKey {
            hostname: self.hostname.clone(),
            orchestrator_id: self.orchestrator_id.clone(),
            workload_id: self.workload_id.clone(),
            endpoint_id: self.endpoint_id.clone(),
        }
    }

    /// Store key of this endpoint.
    pub fn path(&self) -> String {
        self.key().path()
    }

    /// Host-side interface name: `cali` plus the first 11 characters of
    /// the endpoint id.
    pub fn interface_name(&self) -> String {
        let id: String = self.endpoint_id.chars().take(IF_NAME_ID_CHARS).collect();
        format!("{IF_PREFIX}{id}")
    }

    pub fn add_ipv4_net(&mut self, net: Ipv4Net) {
        self.ipv4_nets.insert(net.trunc());
    }

    pub fn add_ipv6_net(&mut self, net: Ipv6Net) {
        self.ipv6_nets.insert(net.trunc());
    }

    /// The stored document. Address sets are written as sorted strings and
    /// absent gateways as `null`.
    pub fn to_json(&self) -> String {
        let v4: Vec<String> = self.ipv4_nets.iter().map(|n| n.trunc().to_string()).collect();
        let v6: Vec<String> = self.ipv6_nets.iter().map(|n| n.trunc().to_string()).collect();
        json!({
            "state": self.state,
            "name": self.interface_name(),
            "mac": self.mac.as_str(),
            "container:if_name": self.if_name,
            "profile_ids": self.profile_ids,
            "ipv4_nets": sorted(v4),
            "ipv6_nets": sorted(v6),
            "ipv4_gateway": self.ipv4_gateway.map(|a| a.to_string()),
            "ipv6_gateway": self.ipv6_gateway.map(|a| a.to_string()),
        })
        .to_string()
    }

    /// Parse the document stored at `key`.
    ///
    /// Returns `Ok(None)` when `key` does not have the shape of an endpoint
    /// key; scans rely on this to skip unrelated leaves. A document that
    /// cannot be decoded is an error.
    pub fn from_json(key: &str, doc: &str) -> Result<Option<Self>, CoreError> {
        let Some(ids) = EndpointKey::parse(key) else {
            return Ok(None);
        };
        let raw: EndpointDocument =
            serde_json::from_str(doc).map_err(|e| CoreError::MalformedDocument {
                key: key.to_owned(),
                reason: e.to_string(),
            })?;

        let mut ep = Self::new(ids, raw.state, MacAddress::new(raw.mac));
        for net in &raw.ipv4_nets {
            ep.ipv4_nets.insert(parse_v4_net(net)?);
        }
        for net in &raw.ipv6_nets {
            ep.ipv6_nets.insert(parse_v6_net(net)?);
        }
        ep.ipv4_gateway = non_blank(raw.ipv4_gateway).map(|a| parse_addr(&a)).transpose()?;
        ep.ipv6_gateway = non_blank(raw.ipv6_gateway).map(|a| parse_addr(&a)).transpose()?;

        ep.profile_ids = match non_blank(raw.profile_id) {
            Some(legacy) => vec![legacy],
            None => raw.profile_ids.unwrap_or_default(),
        };
        if let Some(if_name) = raw.if_name {
            ep.if_name = if_name;
        }
        Ok(Some(ep))
    }
}

fn sorted(mut items: Vec<String>) -> Vec<String> {
    items.sort();
    items
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// ── Stored endpoints ─────────────────────────────────────────────────

/// An endpoint together with the exact document it was read from (or last
/// written as). The revision is the precondition of the next conditional
/// update; it can only be obtained from the datastore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEndpoint {
    pub endpoint: Endpoint,
    revision: String,
}

impl StoredEndpoint {
    pub(crate) fn new(endpoint: Endpoint, revision: String) -> Self {
        Self { endpoint, revision }
    }

    /// The stored document this record was bound to.
    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub(crate) fn set_revision(&mut self, revision: String) {
        self.revision = revision;
    }

    pub fn into_endpoint(self) -> Endpoint {
        self.endpoint
    }
}

/// Endpoints nested by hostname, orchestrator id, workload id and endpoint
/// id. A host without endpoints maps to an empty orchestrator map.
pub type EndpointTree =
    BTreeMap<String, BTreeMap<String, BTreeMap<String, BTreeMap<String, Endpoint>>>>;
