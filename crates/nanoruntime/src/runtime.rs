use crate::codec::{decode_request, NodeReply, NodeRequest, Payload};
use crate::lifecycle::NodeOutcome;
use crate::registry::NodeRegistry;
use nanocore::{ExecutionContext, Mapper, NanoError, NodeError, TransportError};
use serde_json::{json, Value};
use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Configuration for the runtime
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Upper bound for one node execution. `None` waits indefinitely.
    pub max_execution_time_ms: Option<u64>,
}

/// Result of running one node
#[derive(Debug)]
pub struct RunOutcome {
    /// The context as the lifecycle left it
    pub context: ExecutionContext,
    pub outcome: NodeOutcome,
    /// The node asked the orchestrator to stop after this step
    pub stop: bool,
    /// The node was inactive and did not run
    pub skipped: bool,
}

/// Main runtime for executing nodes on behalf of the orchestrator
pub struct NodeRuntime {
    registry: Arc<NodeRegistry>,
    mapper: Arc<Mapper>,
    config: RuntimeConfig,
    shutdown: CancellationToken,
}

impl NodeRuntime {
    /// Create a runtime over a pre-configured registry
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self::with_config(registry, RuntimeConfig::default())
    }

    pub fn with_config(registry: Arc<NodeRegistry>, config: RuntimeConfig) -> Self {
        Self {
            registry,
            mapper: Arc::new(Mapper::new()),
            config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn mapper(&self) -> &Arc<Mapper> {
        &self.mapper
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Resolve `name` and run it through the lifecycle.
    pub async fn run(&self, name: &str, ctx: ExecutionContext) -> Result<RunOutcome, NanoError> {
        let execution_id = if ctx.id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            ctx.id.clone()
        };
        let span = tracing::info_span!("execution", id = %execution_id, node = name);

        self.run_instrumented(name, ctx).instrument(span).await
    }

    async fn run_instrumented(
        &self,
        name: &str,
        mut ctx: ExecutionContext,
    ) -> Result<RunOutcome, NanoError> {
        let mut instance = self.registry.resolve(name, &ctx.config)?;
        let stop = instance.config().stop;

        if !instance.config().active {
            tracing::info!(node = %instance.name(), "Node inactive, passing previous response through");
            let outcome = NodeOutcome::Response(ctx.response.clone());
            return Ok(RunOutcome {
                context: ctx,
                outcome,
                stop,
                skipped: true,
            });
        }

        let result = tokio::select! {
            _ = self.shutdown.cancelled() => Err(NodeError::Cancelled),
            result = self.bounded(instance.process(&mut ctx, &self.mapper)) => result,
        };

        let outcome = result.map_err(|e| {
            tracing::error!(node = %instance.name(), "Node execution failed: {}", e);
            NanoError::Node(e)
        })?;

        if stop {
            tracing::info!(node = %instance.name(), "Node requested stop");
        }

        Ok(RunOutcome {
            context: ctx,
            outcome,
            stop,
            skipped: false,
        })
    }

    async fn bounded<F>(&self, execution: F) -> Result<NodeOutcome, NodeError>
    where
        F: Future<Output = Result<NodeOutcome, NodeError>>,
    {
        match self.config.max_execution_time_ms {
            Some(millis) => timeout(Duration::from_millis(millis), execution)
                .await
                .map_err(|_| NodeError::Timeout { millis })?,
            None => execution.await,
        }
    }

    /// Run a node against a context dict and return only its result data,
    /// or the step descriptors when the node fans out.
    pub async fn execute(&self, name: &str, context: Value) -> Result<Value, NanoError> {
        let ctx = ExecutionContext::from_value(context)
            .map_err(|e| TransportError::InvalidContext(e.to_string()))?;

        let run = self.run(name, ctx).await?;
        match run.outcome {
            NodeOutcome::Response(response) => Ok(response.into_data()),
            NodeOutcome::Steps(steps) => Ok(serde_json::to_value(steps)?),
        }
    }

    /// Serve one transport request. Always yields a well-formed reply.
    pub async fn handle_request(&self, request: NodeRequest) -> NodeReply {
        match self.dispatch(&request).await {
            Ok(data) => NodeReply::json(&data),
            Err(e) => {
                tracing::error!(node = %request.name, "Request failed: {}", e);
                NodeReply::json(&error_payload(&e))
            }
        }
    }

    async fn dispatch(&self, request: &NodeRequest) -> Result<Value, NanoError> {
        match decode_request(request)? {
            Payload::Json(context) => self.execute(&request.name, context).await,
            other => Err(TransportError::InvalidContext(format!(
                "expected a JSON context, got {}",
                other.message_type()
            ))
            .into()),
        }
    }

    /// Cancel every in-flight execution.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down node runtime");
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// Wire payload for a failed execution.
///
/// Handler failures surface their error dict. Anything else becomes
/// `{error, stack}`, unless some message in the cause chain is itself a JSON
/// object, which is returned as is.
pub fn error_payload(error: &NanoError) -> Value {
    if let Some(model) = error.error_model() {
        return model.to_dict();
    }

    let chain: Vec<String> = std::iter::successors(Some(error as &dyn StdError), |e: &&dyn StdError| (*e).source())
        .map(|e| e.to_string())
        .collect();

    let structured = chain
        .iter()
        .find_map(|message| match serde_json::from_str::<Value>(message) {
            Ok(value @ Value::Object(_)) => Some(value),
            _ => None,
        });
    if let Some(value) = structured {
        return value;
    }

    json!({
        "error": error.to_string(),
        "stack": chain.join("\n  caused by: "),
    })
}
