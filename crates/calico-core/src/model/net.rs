// ── Address and network helpers ──

use std::net::IpAddr;
use std::str::FromStr;

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::error::CoreError;

/// IP address family, rendered `v4` / `v6` as in the key layout.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    pub fn of_net(net: &IpNet) -> Self {
        match net {
            IpNet::V4(_) => Self::V4,
            IpNet::V6(_) => Self::V6,
        }
    }

    pub fn of_addr(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Self::V4,
            IpAddr::V6(_) => Self::V6,
        }
    }
}

/// Parse a CIDR and truncate it to its network address, so `10.1.1.1/8`
/// becomes `10.0.0.0/8`. A bare address is taken as a host network.
pub fn parse_net(value: &str) -> Result<IpNet, CoreError> {
    let net = match IpNet::from_str(value) {
        Ok(net) => net,
        Err(e) => match IpAddr::from_str(value) {
            Ok(addr) => IpNet::from(addr),
            Err(_) => {
                return Err(CoreError::InvalidNetwork {
                    value: value.to_owned(),
                    reason: e.to_string(),
                });
            }
        },
    };
    Ok(net.trunc())
}

pub fn parse_v4_net(value: &str) -> Result<Ipv4Net, CoreError> {
    match parse_net(value)? {
        IpNet::V4(net) => Ok(net),
        IpNet::V6(_) => Err(CoreError::InvalidNetwork {
            value: value.to_owned(),
            reason: "expected an IPv4 network".into(),
        }),
    }
}

pub fn parse_v6_net(value: &str) -> Result<Ipv6Net, CoreError> {
    match parse_net(value)? {
        IpNet::V6(net) => Ok(net),
        IpNet::V4(_) => Err(CoreError::InvalidNetwork {
            value: value.to_owned(),
            reason: "expected an IPv6 network".into(),
        }),
    }
}

pub fn parse_addr<T: FromStr>(value: &str) -> Result<T, CoreError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| CoreError::InvalidAddress {
        value: value.to_owned(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn nets_are_truncated_to_network_address() {
        assert_eq!(parse_net("10.1.1.1/8").unwrap().to_string(), "10.0.0.0/8");
        assert_eq!(
            parse_net("fd80:24e2::1/64").unwrap().to_string(),
            "fd80:24e2::/64"
        );
        assert_eq!(parse_net("192.168.0.7").unwrap().to_string(), "192.168.0.7/32");
    }

    #[test]
    fn canonical_net_is_unchanged() {
        let once = parse_net("172.16.0.0/12").unwrap();
        assert_eq!(parse_net(&once.to_string()).unwrap(), once);
    }

    #[test]
    fn family_mismatch_is_rejected() {
        assert!(parse_v4_net("fd80::/64").is_err());
        assert!(parse_v6_net("10.0.0.0/8").is_err());
        assert!(matches!(
            parse_net("not-a-net"),
            Err(CoreError::InvalidNetwork { .. })
        ));
    }

    #[test]
    fn version_renders_as_key_segment() {
        assert_eq!(IpVersion::V4.to_string(), "v4");
        assert_eq!("v6".parse::<IpVersion>().unwrap(), IpVersion::V6);
        let addr: Ipv4Addr = parse_addr("10.0.0.1").unwrap();
        assert_eq!(IpVersion::of_addr(&IpAddr::V4(addr)), IpVersion::V4);
    }
}
