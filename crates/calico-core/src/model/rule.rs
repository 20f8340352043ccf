// ── Traffic rules ──
//
// A rule is stored as a JSON object inside a profile's rules document.
// Unknown fields are rejected when a rule is read, never dropped, and
// network fields are kept as truncated `IpNet` values so that any later
// rendering is canonical.

use std::fmt;

use ipnet::IpNet;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};

use super::net::parse_net;
use crate::error::CoreError;

/// Fields a stored rule may carry.
pub const ALLOWED_FIELDS: [&str; 9] = [
    "protocol",
    "src_tag",
    "src_ports",
    "src_net",
    "dst_tag",
    "dst_ports",
    "dst_net",
    "icmp_type",
    "action",
];

/// What to do with matching traffic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Action {
    Allow,
    Deny,
}

/// A port match: a single port or a `low:high` range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Port {
    Number(u16),
    Range(String),
}

impl Port {
    fn to_json_value(&self) -> Value {
        match self {
            Self::Number(n) => Value::from(*n),
            Self::Range(r) => Value::from(r.as_str()),
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Range(r) => f.write_str(r),
        }
    }
}

/// An IP protocol, by name (`tcp`) or by number (`6`). Written back in
/// the same JSON type it was read in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Protocol {
    Number(u8),
    Name(String),
}

impl Protocol {
    fn to_json_value(&self) -> Value {
        match self {
            Self::Number(n) => Value::from(*n),
            Self::Name(name) => Value::from(name.as_str()),
        }
    }
}

impl From<&str> for Protocol {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for Protocol {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<u8> for Protocol {
    fn from(number: u8) -> Self {
        Self::Number(number)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// One inbound or outbound traffic rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub action: Action,
    pub protocol: Option<Protocol>,
    pub src_tag: Option<String>,
    pub src_net: Option<IpNet>,
    pub src_ports: Option<Vec<Port>>,
    pub dst_tag: Option<String>,
    pub dst_net: Option<IpNet>,
    pub dst_ports: Option<Vec<Port>>,
    pub icmp_type: Option<u8>,
}

impl Rule {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            protocol: None,
            src_tag: None,
            src_net: None,
            src_ports: None,
            dst_tag: None,
            dst_net: None,
            dst_ports: None,
            icmp_type: None,
        }
    }

    pub fn allow() -> Self {
        Self::new(Action::Allow)
    }

    pub fn deny() -> Self {
        Self::new(Action::Deny)
    }

    pub fn with_protocol(mut self, protocol: impl Into<Protocol>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn with_src_tag(mut self, tag: impl Into<String>) -> Self {
        self.src_tag = Some(tag.into());
        self
    }

    pub fn with_dst_tag(mut self, tag: impl Into<String>) -> Self {
        self.dst_tag = Some(tag.into());
        self
    }

    /// Match traffic from `net`, truncated to its network address.
    pub fn with_src_net(mut self, net: IpNet) -> Self {
        self.src_net = Some(net.trunc());
        self
    }

    /// Match traffic to `net`, truncated to its network address.
    pub fn with_dst_net(mut self, net: IpNet) -> Self {
        self.dst_net = Some(net.trunc());
        self
    }

    pub fn with_src_ports(mut self, ports: Vec<Port>) -> Self {
        self.src_ports = Some(ports);
        self
    }

    pub fn with_dst_ports(mut self, ports: Vec<Port>) -> Self {
        self.dst_ports = Some(ports);
        self
    }

    pub fn with_icmp_type(mut self, icmp_type: u8) -> Self {
        self.icmp_type = Some(icmp_type);
        self
    }

    /// Build a rule from a stored JSON object.
    ///
    /// Fails with `InvalidField` for a key outside [`ALLOWED_FIELDS`],
    /// `InvalidAction` for an action other than allow/deny, and
    /// `InvalidNetwork` / `InvalidValue` for badly typed values. A JSON
    /// `null` is treated as an absent field.
    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self, CoreError> {
        if let Some(field) = fields.keys().find(|k| !ALLOWED_FIELDS.contains(&k.as_str())) {
            return Err(CoreError::InvalidField {
                field: field.clone(),
            });
        }
        let get = |name: &str| field(fields, name);

        let action = match get("action") {
            Some(Value::String(s)) => s.parse::<Action>().map_err(|_| CoreError::InvalidAction {
                value: s.clone(),
            })?,
            Some(other) => {
                return Err(CoreError::InvalidAction {
                    value: other.to_string(),
                });
            }
            None => {
                return Err(CoreError::InvalidAction {
                    value: String::new(),
                });
            }
        };

        let mut rule = Self::new(action);
        rule.protocol = get("protocol").map(protocol).transpose()?;
        rule.src_tag = get("src_tag").map(|v| text("src_tag", v)).transpose()?;
        rule.dst_tag = get("dst_tag").map(|v| text("dst_tag", v)).transpose()?;
        rule.src_net = get("src_net").map(|v| net("src_net", v)).transpose()?;
        rule.dst_net = get("dst_net").map(|v| net("dst_net", v)).transpose()?;
        rule.src_ports = get("src_ports").map(|v| ports("src_ports", v)).transpose()?;
        rule.dst_ports = get("dst_ports").map(|v| ports("dst_ports", v)).transpose()?;
        rule.icmp_type = get("icmp_type").map(icmp_type).transpose()?;
        Ok(rule)
    }

    /// The JSON object stored for this rule; networks are rendered in
    /// canonical form and absent fields are omitted.
    pub fn to_json_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("action".into(), Value::from(self.action.as_ref()));
        if let Some(protocol) = &self.protocol {
            map.insert("protocol".into(), protocol.to_json_value());
        }
        if let Some(tag) = &self.src_tag {
            map.insert("src_tag".into(), Value::from(tag.as_str()));
        }
        if let Some(net) = &self.src_net {
            map.insert("src_net".into(), Value::from(net.trunc().to_string()));
        }
        if let Some(ports) = &self.src_ports {
            map.insert("src_ports".into(), ports.iter().map(Port::to_json_value).collect());
        }
        if let Some(tag) = &self.dst_tag {
            map.insert("dst_tag".into(), Value::from(tag.as_str()));
        }
        if let Some(net) = &self.dst_net {
            map.insert("dst_net".into(), Value::from(net.trunc().to_string()));
        }
        if let Some(ports) = &self.dst_ports {
            map.insert("dst_ports".into(), ports.iter().map(Port::to_json_value).collect());
        }
        if let Some(icmp_type) = self.icmp_type {
            map.insert("icmp_type".into(), Value::from(icmp_type));
        }
        Value::Object(map)
    }
}

impl Serialize for Rule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_value().serialize(serializer)
    }
}

fn field<'a>(fields: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    fields.get(name).filter(|v| !v.is_null())
}

fn text(field: &str, value: &Value) -> Result<String, CoreError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(CoreError::InvalidValue {
            field: field.to_owned(),
            reason: format!("expected a string, got {other}"),
        }),
    }
}

fn protocol(value: &Value) -> Result<Protocol, CoreError> {
    let invalid = || CoreError::InvalidValue {
        field: "protocol".into(),
        reason: format!("{value} is not a protocol name or number"),
    };
    match value {
        Value::String(s) => Ok(Protocol::Name(s.clone())),
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u8::try_from(n).ok())
            .map(Protocol::Number)
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

fn net(field: &str, value: &Value) -> Result<IpNet, CoreError> {
    match value {
        Value::String(s) => parse_net(s),
        other => Err(CoreError::InvalidValue {
            field: field.to_owned(),
            reason: format!("expected a CIDR string, got {other}"),
        }),
    }
}

fn ports(field: &str, value: &Value) -> Result<Vec<Port>, CoreError> {
    let invalid = |reason: String| CoreError::InvalidValue {
        field: field.to_owned(),
        reason,
    };
    let Value::Array(items) = value else {
        return Err(invalid(format!("expected a list of ports, got {value}")));
    };
    items
        .iter()
        .map(|item| match item {
            Value::Number(n) => n
                .as_u64()
                .and_then(|n| u16::try_from(n).ok())
                .map(Port::Number)
                .ok_or_else(|| invalid(format!("{n} is not a port number"))),
            Value::String(s) => Ok(Port::Range(s.clone())),
            other => Err(invalid(format!("{other} is not a port or range"))),
        })
        .collect()
}

fn icmp_type(value: &Value) -> Result<u8, CoreError> {
    value
        .as_u64()
        .and_then(|n| u8::try_from(n).ok())
        .ok_or_else(|| CoreError::InvalidValue {
            field: "icmp_type".into(),
            reason: format!("{value} is not an ICMP type"),
        })
}

fn write_ports(f: &mut fmt::Formatter<'_>, ports: &[Port]) -> fmt::Result {
    f.write_str(" ports [")?;
    for (i, port) in ports.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{port}")?;
    }
    f.write_str("]")
}

/// Short human-readable form, e.g. `allow tcp from tag web to ports [80]`.
impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.action)?;
        if let Some(protocol) = &self.protocol {
            write!(f, " {protocol}")?;
        }
        if let Some(icmp_type) = self.icmp_type {
            write!(f, " type {icmp_type}")?;
        }

        if self.src_tag.is_some() || self.src_net.is_some() || self.src_ports.is_some() {
            f.write_str(" from")?;
            if let Some(tag) = &self.src_tag {
                write!(f, " tag {tag}")?;
            } else if let Some(net) = &self.src_net {
                write!(f, " {net}")?;
            }
            if let Some(ports) = &self.src_ports {
                write_ports(f, ports)?;
            }
        }

        if self.dst_tag.is_some() || self.dst_net.is_some() || self.dst_ports.is_some() {
            f.write_str(" to")?;
            if let Some(tag) = &self.dst_tag {
                write!(f, " tag {tag}")?;
            } else if let Some(net) = &self.dst_net {
                write!(f, " {net}")?;
            }
            if let Some(ports) = &self.dst_ports {
                write_ports(f, ports)?;
            }
        }
        Ok(())
    }
}
