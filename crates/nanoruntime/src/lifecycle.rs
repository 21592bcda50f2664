use crate::schema::Schemas;
use nanocore::{
    ErrorModel, ExecutionContext, Mapper, Node, NodeConfig, NodeError, NodeOutput, NodeStep,
    ResponseEnvelope, DEFAULT_CONTENT_TYPE,
};
use serde_json::{Map, Value};
use std::time::Instant;

/// What a finished node hands back to its caller
#[derive(Debug, Clone)]
pub enum NodeOutcome {
    Response(ResponseEnvelope),
    Steps(Vec<NodeStep>),
}

/// A resolved node, ready for one execution
///
/// Wraps the node implementation with the per-execution state the
/// lifecycle needs: instance flags, the pre-resolution config snapshot and
/// the compiled schemas.
pub struct NodeInstance {
    node: Box<dyn Node>,
    config: NodeConfig,
    original_config: Map<String, Value>,
    schemas: Schemas,
}

impl NodeInstance {
    pub fn new(node: Box<dyn Node>) -> Result<Self, NodeError> {
        let schemas = Schemas::new(node.input_schema(), node.output_schema())?;
        Ok(Self {
            node,
            config: NodeConfig::default(),
            original_config: Map::new(),
            schemas,
        })
    }

    pub fn with_config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_original_config(mut self, config: Map<String, Value>) -> Self {
        self.original_config = config;
        self
    }

    pub fn node_type(&self) -> &str {
        self.node.node_type()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Display name, falling back to the node type for unnamed instances.
    pub fn name(&self) -> &str {
        if self.config.name.is_empty() {
            self.node.node_type()
        } else {
            &self.config.name
        }
    }

    pub fn original_config(&self) -> &Map<String, Value> {
        &self.original_config
    }

    pub fn set_schemas(&mut self, input: Value, output: Value) -> Result<(), NodeError> {
        self.schemas = Schemas::new(input, output)?;
        Ok(())
    }

    pub fn schemas(&self) -> (&Value, &Value) {
        (self.schemas.input(), self.schemas.output())
    }

    /// Build an error owned by this node from a string or mapping.
    pub fn set_error(&self, value: Value) -> ErrorModel {
        ErrorModel::from_value(value).with_name(self.name())
    }

    /// Run the node against `ctx`.
    ///
    /// On return `ctx.config` holds the resolved config and `ctx.response`
    /// this node's envelope. A handler error is written to `ctx.response`
    /// and then returned as `NodeError::Handler`.
    pub async fn process(
        &mut self,
        ctx: &mut ExecutionContext,
        mapper: &Mapper,
    ) -> Result<NodeOutcome, NodeError> {
        self.original_config = ctx.config.clone();

        let mut config = ctx.config.clone();
        mapper.resolve_object(&mut config, ctx, None);
        ctx.config = config;

        let outcome = self.run(ctx, mapper).await?;

        if let NodeOutcome::Response(response) = &outcome {
            ctx.response = response.clone();

            if let Some(error) = response.error() {
                ctx.error = Some(error.clone());
                return Err(NodeError::Handler(error.clone()));
            }
            if self.config.set_var {
                ctx.set_var(self.name().to_string(), response.data().clone());
            }
        }

        Ok(outcome)
    }

    async fn run(
        &self,
        ctx: &mut ExecutionContext,
        mapper: &Mapper,
    ) -> Result<NodeOutcome, NodeError> {
        let mut response = ResponseEnvelope::new().with_content_type(self.node.content_type());

        let mut config = ctx.config.clone();
        let data = ctx.response.present_data().or_else(|| ctx.body());
        mapper.resolve_object(&mut config, ctx, data);

        let inputs = Value::Object(config.clone());
        self.schemas.validate_input(&inputs)?;
        tracing::info!(node = %self.name(), config = %inputs, "Running node");

        let start = Instant::now();
        let result = self.node.handle(ctx, config).await;

        let result = match result {
            Ok(NodeOutput::Response(result)) => result,
            Ok(NodeOutput::Steps(steps)) => {
                tracing::info!(node = %self.name(), steps = steps.len(), "Node fanned out");
                return Ok(NodeOutcome::Steps(steps));
            }
            Err(cause) => {
                tracing::error!(node = %self.name(), "Node handler failed: {:#}", cause);
                ResponseEnvelope::failure(ErrorModel::from_cause(&cause))
            }
        };

        match result.error() {
            Some(error) => response.set_error(error.clone().with_name(self.name())),
            None => {
                self.schemas.validate_output(result.data())?;
                if result.content_type() != DEFAULT_CONTENT_TYPE {
                    response.set_content_type(result.content_type());
                }
                response.set_success(result.into_data());
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            node = %self.name(),
            duration_ms,
            success = response.is_success(),
            "Executed node"
        );

        Ok(NodeOutcome::Response(response))
    }
}
