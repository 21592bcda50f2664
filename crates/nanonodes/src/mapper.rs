use async_trait::async_trait;
use nanocore::{ExecutionContext, Node, NodeError, NodeOutput, ResponseEnvelope};
use nanoruntime::{NodeFactory, NodeMetadata};
use serde_json::{json, Map, Value};

/// Reshape data: returns the resolved `model` object
///
/// Placeholders inside `model` are resolved before the handler runs, so
/// `{"model": {"id": "${data.user.id}"}}` projects fields of the previous step.
pub struct MapperNode;

#[async_trait]
impl Node for MapperNode {
    fn node_type(&self) -> &str {
        "mapper"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "model": {"type": "object"}
            },
            "required": ["model"]
        })
    }

    async fn handle(
        &self,
        _ctx: &mut ExecutionContext,
        mut inputs: Map<String, Value>,
    ) -> anyhow::Result<NodeOutput> {
        let model = inputs.remove("model").unwrap_or_else(|| json!({}));
        Ok(ResponseEnvelope::success(model).into())
    }
}

pub struct MapperNodeFactory;

impl NodeFactory for MapperNodeFactory {
    fn create(&self) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(MapperNode))
    }

    fn node_type(&self) -> &str {
        "mapper"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Builds an object from a resolved model".to_string(),
            category: "transform".to_string(),
        }
    }
}
