// ── Policy profiles ──

use std::collections::BTreeSet;

use serde::Serialize;

use super::rules::Rules;
use crate::error::CoreError;

/// A named bundle of tags and rules applied to endpoints.
///
/// The rules' `id` always equals the profile name; `set_rules` enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    name: String,
    pub tags: BTreeSet<String>,
    rules: Rules,
}

impl Profile {
    /// A profile with no tags and no rules.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            rules: Rules::empty(name.clone()),
            name,
            tags: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// Replace the rules, re-labelling them with this profile's name.
    pub fn set_rules(&mut self, mut rules: Rules) {
        rules.id.clone_from(&self.name);
        self.rules = rules;
    }
}

/// Render a tag set as the stored JSON array.
pub fn tags_to_json(tags: &BTreeSet<String>) -> String {
    serde_json::Value::from(tags.iter().map(String::as_str).collect::<Vec<_>>()).to_string()
}

/// Parse the stored JSON array of tags.
pub fn tags_from_json(doc: &str) -> Result<BTreeSet<String>, CoreError> {
    serde_json::from_str(doc).map_err(|e| CoreError::MalformedDocument {
        key: "tags".into(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rules_follow_profile_name() {
        let mut profile = Profile::new("web");
        assert_eq!(profile.rules().id, "web");

        profile.set_rules(Rules::default_for("other"));
        assert_eq!(profile.rules().id, "web");
        assert_eq!(profile.rules().inbound_rules.len(), 2);
    }

    #[test]
    fn tags_round_trip_as_array() {
        let tags: BTreeSet<String> = ["b".to_owned(), "a".to_owned()].into();
        let doc = tags_to_json(&tags);
        assert_eq!(doc, r#"["a","b"]"#);
        assert_eq!(tags_from_json(&doc).unwrap(), tags);
        assert!(tags_from_json("{}").is_err());
    }
}
