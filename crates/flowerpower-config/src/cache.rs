use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// `RunConfig.cache`: either disabled outright, or a mapping describing
/// which nodes to recompute (node name -> cache directive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheConfig {
    Disabled(bool),
    Nodes(HashMap<String, Value>),
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig::Disabled(false)
    }
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        match self {
            CacheConfig::Disabled(enabled) => *enabled,
            CacheConfig::Nodes(nodes) => !nodes.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_disabled() {
        assert!(!CacheConfig::default().is_enabled());
    }

    #[test]
    fn nodes_map_with_entries_is_enabled() {
        let mut nodes = HashMap::new();
        nodes.insert("a".to_string(), Value::Bool(true));
        assert!(CacheConfig::Nodes(nodes).is_enabled());
    }

    #[test]
    fn empty_nodes_map_is_not_enabled() {
        assert!(!CacheConfig::Nodes(HashMap::new()).is_enabled());
    }
}
