//! Actor identities and the naming rules that isolate tenants or environments
//! sharing one placement service.
use std::fmt;

pub const DEFAULT_DELIMITER: &str = "-";

/// Logical key of a virtual actor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActorIdentity {
    type_name: String,
    id: String,
}

impl ActorIdentity {
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// `type:id`, the key used for runtime introspection.
    pub fn qualified(&self) -> String {
        format!("{}:{}", self.type_name, self.id)
    }
}

impl fmt::Display for ActorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_name, self.id)
    }
}

/// Prefix rules applied to identities before they reach the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingRules {
    prefix: String,
    delimiter: String,
    type_name_prefix: String,
}

impl Default for NamingRules {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            delimiter: DEFAULT_DELIMITER.to_string(),
            type_name_prefix: String::new(),
        }
    }
}

impl NamingRules {
    pub fn new(
        prefix: impl Into<String>,
        delimiter: impl Into<String>,
        type_name_prefix: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: delimiter.into(),
            type_name_prefix: type_name_prefix.into(),
        }
    }

    pub fn set_prefix(&mut self, prefix: impl Into<String>, delimiter: Option<&str>) {
        self.prefix = prefix.into();
        self.delimiter = delimiter.unwrap_or(DEFAULT_DELIMITER).to_string();
    }

    pub fn set_type_name_prefix(&mut self, prefix: impl Into<String>) {
        self.type_name_prefix = prefix.into();
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn type_name_prefix(&self) -> &str {
        &self.type_name_prefix
    }

    /// `prefix + delimiter + id`; ids pass through untouched while no prefix is set.
    pub fn resolve_id(&self, id: &str) -> String {
        if self.prefix.is_empty() {
            return id.to_string();
        }
        format!("{}{}{}", self.prefix, self.delimiter, id)
    }

    pub fn resolve_type_name(&self, type_name: &str) -> String {
        format!("{}{}", self.type_name_prefix, type_name)
    }

    pub fn resolve(&self, type_name: &str, id: &str) -> ActorIdentity {
        ActorIdentity::new(self.resolve_type_name(type_name), self.resolve_id(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn prefixed_id_is_prefix_delimiter_id() {
        let ids = ["1", "abc", "", "with-dash", "Ünïcode", "a:b"];
        for (prefix, delimiter) in [("tenant", "-"), ("env", "::"), ("x", "")] {
            let mut rules = NamingRules::default();
            rules.set_prefix(prefix, Some(delimiter));
            for id in ids {
                assert_eq!(rules.resolve_id(id), format!("{prefix}{delimiter}{id}"));
            }
        }
    }

    #[test]
    fn resolution_is_injective_for_a_fixed_prefix() {
        let mut rules = NamingRules::default();
        rules.set_prefix("acme", None);
        let ids: Vec<String> = (0..200).map(|i| format!("actor-{i}")).collect();
        let resolved: HashSet<String> = ids.iter().map(|id| rules.resolve_id(id)).collect();
        assert_eq!(resolved.len(), ids.len());
    }

    #[test]
    fn default_delimiter_is_dash() {
        let mut rules = NamingRules::default();
        rules.set_prefix("dev", None);
        rules.set_type_name_prefix("Dev");
        let identity = rules.resolve("CounterActor", "7");
        assert_eq!(identity.type_name(), "DevCounterActor");
        assert_eq!(identity.id(), "dev-7");
        assert_eq!(identity.qualified(), "DevCounterActor:dev-7");
    }

    #[test]
    fn empty_prefix_leaves_id_untouched() {
        assert_eq!(NamingRules::default().resolve_id("42"), "42");
    }
}
