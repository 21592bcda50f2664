use crate::lifecycle::NodeInstance;
use nanocore::{NanoError, Node, NodeConfig, NodeError};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Factory trait for creating node instances
pub trait NodeFactory: Send + Sync {
    /// Create a fresh instance of the node
    fn create(&self) -> Result<Box<dyn Node>, NodeError>;

    /// Name the node is registered and requested under
    fn node_type(&self) -> &str;

    /// Optional: Get node metadata (description, category)
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::default()
    }
}

/// Metadata about a node type
#[derive(Debug, Clone, Serialize)]
pub struct NodeMetadata {
    pub description: String,
    pub category: String,
}

impl Default for NodeMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
        }
    }
}

/// Registry of available node types
///
/// Built once at startup and shared read-only afterwards.
pub struct NodeRegistry {
    factories: HashMap<String, Arc<dyn NodeFactory>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a node factory
    pub fn register(&mut self, factory: Arc<dyn NodeFactory>) {
        let node_type = factory.node_type().to_string();
        tracing::info!("Registering node type: {}", node_type);
        self.factories.insert(node_type, factory);
    }

    /// Resolve a node by name and seed its instance flags from `config`.
    pub fn resolve(&self, name: &str, config: &Map<String, Value>) -> Result<NodeInstance, NanoError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| NanoError::UnknownNode(name.to_string()))?;

        let instance = NodeInstance::new(factory.create()?)?
            .with_config(NodeConfig::from_config(config))
            .with_original_config(config.clone());

        tracing::debug!(node = name, instance = %instance.name(), "Resolved node");
        Ok(instance)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Get all registered node types, sorted
    pub fn list_node_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    /// Get metadata for a node type
    pub fn get_metadata(&self, node_type: &str) -> Option<NodeMetadata> {
        self.factories.get(node_type).map(|f| f.metadata())
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
