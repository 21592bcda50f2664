use async_trait::async_trait;
use nanocore::{ErrorModel, ExecutionContext, Node, NodeError, NodeOutput, ResponseEnvelope};
use nanoruntime::{NodeFactory, NodeMetadata};
use serde_json::{json, Map, Value};

/// Always fails with the configured `message`
pub struct ErrorNode;

#[async_trait]
impl Node for ErrorNode {
    fn node_type(&self) -> &str {
        "error"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {"type": "string"}
            },
            "required": ["message"]
        })
    }

    fn content_type(&self) -> &str {
        "text/html"
    }

    async fn handle(
        &self,
        _ctx: &mut ExecutionContext,
        inputs: Map<String, Value>,
    ) -> anyhow::Result<NodeOutput> {
        let message = inputs
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let cause = anyhow::anyhow!("{}", message).context("error node raised");
        let error = ErrorModel::new(message).with_stack(format!("{:?}", cause));
        Ok(ResponseEnvelope::failure(error).into())
    }
}

pub struct ErrorNodeFactory;

impl NodeFactory for ErrorNodeFactory {
    fn create(&self) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(ErrorNode))
    }

    fn node_type(&self) -> &str {
        "error"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Fails with the configured message".to_string(),
            category: "debug".to_string(),
        }
    }
}
