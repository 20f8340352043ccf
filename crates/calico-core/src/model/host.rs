// ── Host routing info ──

use std::net::{Ipv4Addr, Ipv6Addr};

use serde::Serialize;

/// Default-route next hops of a host, taken from its BIRD listen
/// addresses. A blank or unparsable address is left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NextHops {
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
}

impl NextHops {
    pub fn parse(ipv4: &str, ipv6: &str) -> Self {
        Self {
            ipv4: ipv4.trim().parse().ok(),
            ipv6: ipv6.trim().parse().ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_addresses_are_dropped() {
        let hops = NextHops::parse("10.0.0.1", "");
        assert_eq!(hops.ipv4, Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(hops.ipv6, None);
    }
}
