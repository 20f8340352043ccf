// ── IP pools ──

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use super::net::parse_net;
use crate::error::CoreError;

/// Tunnel device named in the stored config of an IP-in-IP pool.
pub const IPIP_DEVICE: &str = "tunl0";

/// An address range available for allocation to endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpPool {
    pub cidr: IpNet,
    /// Route traffic for this pool through an IP-in-IP tunnel.
    pub ipip: bool,
}

#[derive(Serialize, Deserialize)]
struct PoolDocument {
    cidr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ipip: Option<String>,
}

impl IpPool {
    pub fn new(cidr: IpNet, ipip: bool) -> Self {
        Self {
            cidr: cidr.trunc(),
            ipip,
        }
    }

    /// The stored config: `{"cidr": ..., "ipip": "tunl0"}`, with `ipip`
    /// omitted when disabled.
    pub fn to_json(&self) -> String {
        let mut doc = serde_json::json!({ "cidr": self.cidr.trunc().to_string() });
        if self.ipip {
            doc["ipip"] = IPIP_DEVICE.into();
        }
        doc.to_string()
    }

    pub fn from_json(doc: &str) -> Result<Self, CoreError> {
        let raw: PoolDocument = serde_json::from_str(doc).map_err(|e| CoreError::MalformedDocument {
            key: "pool".into(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(
            parse_net(&raw.cidr)?,
            raw.ipip.is_some_and(|dev| !dev.is_empty()),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ipip_flag_controls_device_field() {
        let pool = IpPool::new("10.1.2.3/16".parse().unwrap(), false);
        assert_eq!(pool.to_json(), r#"{"cidr":"10.1.0.0/16"}"#);

        let pool = IpPool::new(pool.cidr, true);
        let back = IpPool::from_json(&pool.to_json()).unwrap();
        assert!(back.ipip);
        assert_eq!(back.cidr.to_string(), "10.1.0.0/16");
    }
}
