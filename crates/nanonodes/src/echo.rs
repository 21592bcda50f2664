use async_trait::async_trait;
use nanocore::{ExecutionContext, Node, NodeError, NodeOutput, ResponseEnvelope};
use nanoruntime::{NodeFactory, NodeMetadata};
use serde_json::{Map, Value};

/// Simple node that logs its inputs and returns them as its data
pub struct EchoNode;

#[async_trait]
impl Node for EchoNode {
    fn node_type(&self) -> &str {
        "echo"
    }

    async fn handle(
        &self,
        ctx: &mut ExecutionContext,
        inputs: Map<String, Value>,
    ) -> anyhow::Result<NodeOutput> {
        tracing::info!(workflow = %ctx.workflow_name, "ECHO: {} input(s)", inputs.len());

        // Also log all inputs for visibility
        for (key, value) in &inputs {
            tracing::debug!("  {}: {}", key, value);
        }

        Ok(ResponseEnvelope::success(Value::Object(inputs)).into())
    }
}

pub struct EchoNodeFactory;

impl NodeFactory for EchoNodeFactory {
    fn create(&self) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(EchoNode))
    }

    fn node_type(&self) -> &str {
        "echo"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Returns its resolved configuration".to_string(),
            category: "debug".to_string(),
        }
    }
}
