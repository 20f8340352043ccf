// ── Profile rule sets ──

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::rule::Rule;
use crate::error::CoreError;

/// Ordered inbound and outbound rules of one profile. Order is stored and
/// restored exactly; evaluation order is the consumer's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rules {
    /// Name of the owning profile.
    pub id: String,
    pub inbound_rules: Vec<Rule>,
    pub outbound_rules: Vec<Rule>,
}

#[derive(Deserialize)]
struct RawRules {
    id: String,
    inbound_rules: Vec<Map<String, Value>>,
    outbound_rules: Vec<Map<String, Value>>,
}

impl Rules {
    /// No rules at all.
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inbound_rules: Vec::new(),
            outbound_rules: Vec::new(),
        }
    }

    /// The policy a new profile starts with: accept traffic from members
    /// of the profile's own tag, drop other inbound traffic, allow all
    /// outbound traffic.
    pub fn default_for(profile: &str) -> Self {
        Self {
            id: profile.to_owned(),
            inbound_rules: vec![Rule::allow().with_src_tag(profile), Rule::deny()],
            outbound_rules: vec![Rule::allow()],
        }
    }

    pub fn to_json_value(&self) -> Value {
        json!({
            "id": self.id,
            "inbound_rules": self.inbound_rules.iter().map(Rule::to_json_value).collect::<Vec<_>>(),
            "outbound_rules": self.outbound_rules.iter().map(Rule::to_json_value).collect::<Vec<_>>(),
        })
    }

    /// The stored document.
    pub fn to_json(&self) -> String {
        self.to_json_value().to_string()
    }

    /// Parse a stored document, rebuilding every rule through
    /// [`Rule::from_fields`].
    pub fn from_json(doc: &str) -> Result<Self, CoreError> {
        let raw: RawRules = serde_json::from_str(doc).map_err(|e| CoreError::MalformedDocument {
            key: "rules".into(),
            reason: e.to_string(),
        })?;
        let build = |rules: &[Map<String, Value>]| {
            rules.iter().map(Rule::from_fields).collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            inbound_rules: build(&raw.inbound_rules)?,
            outbound_rules: build(&raw.outbound_rules)?,
            id: raw.id,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::rule::Port;

    #[test]
    fn order_survives_round_trip() {
        let rules = Rules {
            id: "web".into(),
            inbound_rules: vec![
                Rule::allow().with_protocol("tcp").with_dst_ports(vec![Port::Number(443)]),
                Rule::allow().with_src_net("10.0.0.0/8".parse().unwrap()),
                Rule::deny().with_protocol("udp"),
                Rule::deny(),
            ],
            outbound_rules: vec![Rule::deny().with_dst_tag("db"), Rule::allow()],
        };
        let back = Rules::from_json(&rules.to_json()).unwrap();
        assert_eq!(back, rules);
    }

    #[test]
    fn stored_document_is_rewritten_unchanged() {
        let doc = json!({
            "id": "web",
            "inbound_rules": [
                {"action": "allow", "protocol": 6, "dst_ports": [22, "8000:8080"]},
                {"action": "allow", "protocol": "udp", "src_tag": "dns"}
            ],
            "outbound_rules": [{"action": "deny", "protocol": 17}]
        });
        let rules = Rules::from_json(&doc.to_string()).unwrap();
        assert_eq!(rules.to_json_value(), doc);
    }

    #[test]
    fn default_policy_shape() {
        let rules = Rules::default_for("web");
        assert_eq!(
            rules.to_json_value(),
            json!({
                "id": "web",
                "inbound_rules": [{"action": "allow", "src_tag": "web"}, {"action": "deny"}],
                "outbound_rules": [{"action": "allow"}],
            })
        );
    }

    #[test]
    fn bad_rule_fails_whole_document() {
        let doc = r#"{"id":"x","inbound_rules":[{"action":"allow"},{"action":"allow","bogus":1}],"outbound_rules":[]}"#;
        assert!(matches!(
            Rules::from_json(doc),
            Err(CoreError::InvalidField { ref field }) if field == "bogus"
        ));
    }

    #[test]
    fn missing_lists_are_malformed() {
        assert!(matches!(
            Rules::from_json(r#"{"id":"x"}"#),
            Err(CoreError::MalformedDocument { .. })
        ));
    }
}
