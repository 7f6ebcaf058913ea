use nebula_core::NodeTypeKey;

/// Static metadata describing a node type, returned by the registry's
/// `schema(type_id)` lookup and used for node discovery in the admin
/// layer.
#[derive(Debug, Clone)]
pub struct ActionMetadata {
    /// Registry key identifying this node type (e.g. `"http.request"`).
    pub key: NodeTypeKey,
    /// Human-readable display name (e.g. `"HTTP Request"`).
    pub name: String,
    /// Short description of what this node does.
    pub description: String,
    /// Category for UI grouping (e.g. `"network"`, `"transform"`, `"control"`).
    pub category: String,
    /// JSON Schema describing valid `config` values for this node type.
    pub config_schema: Option<serde_json::Value>,
}

impl ActionMetadata {
    pub fn new(key: NodeTypeKey, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            description: description.into(),
            category: String::new(),
            config_schema: None,
        }
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    #[must_use]
    pub fn with_config_schema(mut self, schema: serde_json::Value) -> Self {
        self.config_schema = Some(schema);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> NodeTypeKey {
        NodeTypeKey::new(s).unwrap()
    }

    #[test]
    fn metadata_builder() {
        let meta = ActionMetadata::new(key("http.request"), "HTTP Request", "Make HTTP calls")
            .with_category("network");

        assert_eq!(meta.key.as_str(), "http.request");
        assert_eq!(meta.name, "HTTP Request");
        assert_eq!(meta.category, "network");
    }

    #[test]
    fn default_metadata_has_no_schema() {
        let meta = ActionMetadata::new(key("test"), "Test", "A test node");
        assert!(meta.config_schema.is_none());
        assert_eq!(meta.category, "");
    }

    #[test]
    fn with_config_schema_sets_schema() {
        let schema = serde_json::json!({ "type": "object" });
        let meta = ActionMetadata::new(key("http.request"), "HTTP Request", "Make HTTP calls")
            .with_config_schema(schema.clone());
        assert_eq!(meta.config_schema, Some(schema));
    }
}
