use crate::{ExecutionContext, ResponseEnvelope, DEFAULT_CONTENT_TYPE};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Core trait that all executable nodes implement
#[async_trait]
pub trait Node: Send + Sync {
    /// Registry key (e.g., "api_call", "echo")
    fn node_type(&self) -> &str;

    /// JSON schema the resolved config must satisfy. Empty accepts anything.
    fn input_schema(&self) -> Value {
        json!({})
    }

    /// JSON schema the handler's result data must satisfy.
    fn output_schema(&self) -> Value {
        json!({})
    }

    fn content_type(&self) -> &str {
        DEFAULT_CONTENT_TYPE
    }

    /// Business logic. `inputs` is the fully resolved, validated config.
    ///
    /// Returning `Err` is treated like an unexpected exception: the
    /// lifecycle turns it into a 500 error carrying the cause chain.
    async fn handle(
        &self,
        ctx: &mut ExecutionContext,
        inputs: Map<String, Value>,
    ) -> anyhow::Result<NodeOutput>;
}

/// What a handler hands back
#[derive(Debug, Clone)]
pub enum NodeOutput {
    Response(ResponseEnvelope),
    /// Composite nodes fan out into further steps for the orchestrator.
    Steps(Vec<NodeStep>),
}

impl From<ResponseEnvelope> for NodeOutput {
    fn from(response: ResponseEnvelope) -> Self {
        NodeOutput::Response(response)
    }
}

/// A further node to run, as understood by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStep {
    pub node: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl NodeStep {
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            name: String::new(),
            config: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}
