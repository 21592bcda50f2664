// crates/nanoruntime/tests/lifecycle_test.rs

use anyhow::anyhow;
use async_trait::async_trait;
use nanocore::{
    ErrorModel, ExecutionContext, Mapper, NanoError, Node, NodeError, NodeOutput, NodeStep,
    ResponseEnvelope,
};
use nanoruntime::{
    NodeFactory, NodeOutcome, NodeRegistry, NodeReply, NodeRequest, NodeRuntime, Payload,
    RuntimeConfig,
};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Returns its resolved config
struct Echo;

#[async_trait]
impl Node for Echo {
    fn node_type(&self) -> &str {
        "echo"
    }

    async fn handle(
        &self,
        _ctx: &mut ExecutionContext,
        inputs: Map<String, Value>,
    ) -> anyhow::Result<NodeOutput> {
        Ok(ResponseEnvelope::success(Value::Object(inputs)).into())
    }
}

/// Requires `url` and `method`, counts how often its handler ran
struct Request {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Node for Request {
    fn node_type(&self) -> &str {
        "request"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"url": {"type": "string"}, "method": {"type": "string"}},
            "required": ["url", "method"]
        })
    }

    async fn handle(
        &self,
        _ctx: &mut ExecutionContext,
        _inputs: Map<String, Value>,
    ) -> anyhow::Result<NodeOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ResponseEnvelope::success(json!({"status": 200})).into())
    }
}

struct Failing;

#[async_trait]
impl Node for Failing {
    fn node_type(&self) -> &str {
        "failing"
    }

    async fn handle(
        &self,
        _ctx: &mut ExecutionContext,
        _inputs: Map<String, Value>,
    ) -> anyhow::Result<NodeOutput> {
        Err(anyhow!("connection refused").context("upstream call failed"))
    }
}

struct Slow;

#[async_trait]
impl Node for Slow {
    fn node_type(&self) -> &str {
        "slow"
    }

    async fn handle(
        &self,
        _ctx: &mut ExecutionContext,
        _inputs: Map<String, Value>,
    ) -> anyhow::Result<NodeOutput> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(ResponseEnvelope::new().into())
    }
}

struct FanOut;

#[async_trait]
impl Node for FanOut {
    fn node_type(&self) -> &str {
        "fan-out"
    }

    fn output_schema(&self) -> Value {
        json!({"type": "string"})
    }

    async fn handle(
        &self,
        _ctx: &mut ExecutionContext,
        _inputs: Map<String, Value>,
    ) -> anyhow::Result<NodeOutput> {
        Ok(NodeOutput::Steps(vec![
            NodeStep::new("echo").with_name("left"),
            NodeStep::new("echo").with_name("right"),
        ]))
    }
}

/// Promises an object but answers with an array, or fails when `fail` is set
struct Shaped;

#[async_trait]
impl Node for Shaped {
    fn node_type(&self) -> &str {
        "shaped"
    }

    fn output_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn handle(
        &self,
        _ctx: &mut ExecutionContext,
        inputs: Map<String, Value>,
    ) -> anyhow::Result<NodeOutput> {
        if inputs.get("fail").and_then(Value::as_bool).unwrap_or(false) {
            return Ok(ResponseEnvelope::failure(ErrorModel::new("quota exceeded")).into());
        }
        Ok(ResponseEnvelope::success(json!([1])).into())
    }
}

/// Factory over a closure, for test nodes with captured state
struct TestFactory<F> {
    node_type: &'static str,
    create: F,
}

impl<F> NodeFactory for TestFactory<F>
where
    F: Fn() -> Box<dyn Node> + Send + Sync,
{
    fn create(&self) -> Result<Box<dyn Node>, NodeError> {
        Ok((self.create)())
    }

    fn node_type(&self) -> &str {
        self.node_type
    }
}

fn factory<F>(node_type: &'static str, create: F) -> Arc<dyn NodeFactory>
where
    F: Fn() -> Box<dyn Node> + Send + Sync + 'static,
{
    Arc::new(TestFactory { node_type, create })
}

// Helper function to create a test registry
fn create_test_registry(calls: Arc<AtomicUsize>) -> Arc<NodeRegistry> {
    let mut registry = NodeRegistry::new();
    registry.register(factory("echo", || Box::new(Echo)));
    registry.register(factory("request", move || {
        Box::new(Request {
            calls: calls.clone(),
        })
    }));
    registry.register(factory("failing", || Box::new(Failing)));
    registry.register(factory("slow", || Box::new(Slow)));
    registry.register(factory("fan-out", || Box::new(FanOut)));
    registry.register(factory("shaped", || Box::new(Shaped)));
    Arc::new(registry)
}

// Helper function to create a test context
fn create_test_context(config: Value, body: Value) -> ExecutionContext {
    ExecutionContext::from_value(json!({
        "id": "exec-1",
        "workflowName": "test-flow",
        "workflowPath": "/flows/test",
        "request": {"body": body},
        "config": config,
    }))
    .unwrap()
}

fn decode_reply(reply: &NodeReply) -> Value {
    match reply.decode().unwrap() {
        Payload::Json(value) => value,
        other => panic!("unexpected reply payload: {:?}", other),
    }
}

#[tokio::test]
async fn test_echo_resolves_placeholders_from_body() {
    let runtime = NodeRuntime::new(create_test_registry(Arc::default()));
    let ctx = create_test_context(json!({"greeting": "hi ${name}"}), json!({"name": "Ada"}));

    let run = runtime.run("echo", ctx).await.unwrap();

    let response = &run.context.response;
    assert!(response.is_success());
    assert_eq!(response.data(), &json!({"greeting": "hi Ada"}));
    assert!(!run.skipped);
    assert_eq!(run.context.workflow_name, "test-flow");
    assert_eq!(run.context.id, "exec-1");
}

#[tokio::test]
async fn test_previous_response_wins_over_body() {
    let runtime = NodeRuntime::new(create_test_registry(Arc::default()));
    let mut ctx = create_test_context(json!({"who": "${name}"}), json!({"name": "body"}));
    ctx.response = ResponseEnvelope::success(json!({"name": "previous"}));

    let data = runtime.execute("echo", ctx.to_value()).await.unwrap();
    assert_eq!(data, json!({"who": "previous"}));
}

#[tokio::test]
async fn test_missing_required_input_fails_before_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let runtime = NodeRuntime::new(create_test_registry(calls.clone()));
    let ctx = create_test_context(json!({"method": "GET"}), json!({}));

    let err = runtime.run("request", ctx).await.unwrap_err();

    match err {
        NanoError::Node(NodeError::Validation(message)) => {
            assert!(message.contains("url"), "{}", message)
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_handler_failure_becomes_error_envelope() {
    let registry = create_test_registry(Arc::default());
    let mapper = Mapper::new();
    let config = json!({"name": "fetch-user"});
    let mut ctx = create_test_context(config.clone(), json!({}));

    let mut instance = registry
        .resolve("failing", config.as_object().unwrap())
        .unwrap();
    let err = instance.process(&mut ctx, &mapper).await.unwrap_err();

    let NodeError::Handler(model) = err else {
        panic!("expected a handler error");
    };
    assert_eq!(model.code(), 500);
    assert_eq!(model.name(), Some("fetch-user"));
    assert!(!model.stack().unwrap_or_default().is_empty());
    assert!(model.message().to_string().contains("upstream call failed"));

    assert!(!ctx.response.is_success());
    assert_eq!(ctx.response.error(), Some(&model));
    assert_eq!(ctx.error.as_ref(), Some(&model));
    assert_eq!(instance.original_config(), config.as_object().unwrap());
}

#[tokio::test]
async fn test_output_violating_schema_fails_validation() {
    let registry = create_test_registry(Arc::default());
    let config = json!({"name": "shape-check"});
    let mut ctx = create_test_context(config.clone(), json!({}));
    ctx.response = ResponseEnvelope::success(json!({"previous": true}));

    let mut instance = registry
        .resolve("shaped", config.as_object().unwrap())
        .unwrap();
    let err = instance.process(&mut ctx, &Mapper::new()).await.unwrap_err();

    assert!(matches!(err, NodeError::Validation(_)), "{:?}", err);
    assert!(ctx.response.is_success());
    assert_eq!(ctx.response.data(), &json!({"previous": true}));

    let err = NodeRuntime::new(registry)
        .run("shaped", create_test_context(config, json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, NanoError::Node(NodeError::Validation(_))), "{:?}", err);
}

#[tokio::test]
async fn test_error_result_skips_output_validation() {
    let registry = create_test_registry(Arc::default());
    let config = json!({"name": "shape-check", "fail": true});
    let mut ctx = create_test_context(config.clone(), json!({}));

    let mut instance = registry
        .resolve("shaped", config.as_object().unwrap())
        .unwrap();
    let err = instance.process(&mut ctx, &Mapper::new()).await.unwrap_err();

    let NodeError::Handler(model) = err else {
        panic!("expected a handler error");
    };
    assert_eq!(model.message().to_string(), "quota exceeded");
    assert_eq!(model.name(), Some("shape-check"));
    assert!(!ctx.response.is_success());
}

#[tokio::test]
async fn test_set_var_captures_output() {
    let runtime = NodeRuntime::new(create_test_registry(Arc::default()));
    let ctx = create_test_context(
        json!({"name": "greet", "setVar": true, "text": "hello"}),
        json!({}),
    );

    let run = runtime.run("echo", ctx).await.unwrap();

    let captured = run.context.get_var("greet").unwrap();
    assert_eq!(captured["text"], json!("hello"));
}

#[tokio::test]
async fn test_inactive_node_passes_response_through() {
    let calls = Arc::new(AtomicUsize::new(0));
    let runtime = NodeRuntime::new(create_test_registry(calls.clone()));
    let mut ctx = create_test_context(json!({"active": false}), json!({}));
    ctx.response = ResponseEnvelope::success(json!({"kept": true}));

    let run = runtime.run("request", ctx).await.unwrap();

    assert!(run.skipped);
    assert_eq!(run.context.response.data(), &json!({"kept": true}));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stop_flag_is_surfaced() {
    let runtime = NodeRuntime::new(create_test_registry(Arc::default()));
    let ctx = create_test_context(json!({"stop": true}), json!({}));

    let run = runtime.run("echo", ctx).await.unwrap();
    assert!(run.stop);
}

#[tokio::test]
async fn test_fan_out_returns_steps() {
    let runtime = NodeRuntime::new(create_test_registry(Arc::default()));
    let ctx = create_test_context(json!({}), json!({}));

    let run = runtime.run("fan-out", ctx).await.unwrap();
    match run.outcome {
        NodeOutcome::Steps(steps) => {
            assert_eq!(steps.len(), 2);
            assert_eq!(steps[0].name, "left");
        }
        other => panic!("expected steps, got {:?}", other),
    }
}

#[tokio::test]
async fn test_execution_timeout() {
    let runtime = NodeRuntime::with_config(
        create_test_registry(Arc::default()),
        RuntimeConfig {
            max_execution_time_ms: Some(50),
        },
    );

    let err = runtime
        .run("slow", create_test_context(json!({}), json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, NanoError::Node(NodeError::Timeout { millis: 50 })));
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_executions() {
    let runtime = Arc::new(NodeRuntime::new(create_test_registry(Arc::default())));

    let task = {
        let runtime = runtime.clone();
        tokio::spawn(async move {
            runtime
                .run("slow", create_test_context(json!({}), json!({})))
                .await
                .map(|_| ())
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    runtime.shutdown();

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, NanoError::Node(NodeError::Cancelled)));
    assert!(runtime.is_shut_down());
}

#[tokio::test]
async fn test_request_reply_returns_only_data() {
    let runtime = NodeRuntime::new(create_test_registry(Arc::default()));
    let context = create_test_context(json!({"greeting": "hi ${name}"}), json!({"name": "Ada"}));

    let reply = runtime
        .handle_request(NodeRequest::json("echo", &context.to_value()))
        .await;

    assert_eq!(decode_reply(&reply), json!({"greeting": "hi Ada"}));
}

#[tokio::test]
async fn test_request_reply_carries_handler_error() {
    let runtime = NodeRuntime::new(create_test_registry(Arc::default()));
    let context = create_test_context(json!({"name": "fetch-user"}), json!({}));

    let reply = runtime
        .handle_request(NodeRequest::json("failing", &context.to_value()))
        .await;
    let payload = decode_reply(&reply);

    assert_eq!(payload["code"], json!(500));
    assert_eq!(payload["name"], json!("fetch-user"));
    assert!(payload["stack"].as_str().is_some());
}

#[tokio::test]
async fn test_request_reply_for_unknown_node_and_bad_encoding() {
    let runtime = NodeRuntime::new(create_test_registry(Arc::default()));

    let reply = runtime
        .handle_request(NodeRequest::json("ghost", &json!({})))
        .await;
    assert_eq!(decode_reply(&reply)["error"], json!("Node not found: ghost"));

    let reply = runtime
        .handle_request(NodeRequest {
            name: "echo".to_string(),
            message: "{}".to_string(),
            encoding: "ROT13".to_string(),
            message_type: "JSON".to_string(),
        })
        .await;
    let payload = decode_reply(&reply);
    assert!(payload["error"].as_str().unwrap().contains("ROT13"));
}

#[tokio::test]
async fn test_instance_helpers() {
    let registry = create_test_registry(Arc::default());
    let config = json!({"name": "lookup"});
    let mut instance = registry
        .resolve("echo", config.as_object().unwrap())
        .unwrap();

    let error = instance.set_error(json!({"message": "not found", "code": 404, "name": "other"}));
    assert_eq!(error.message().to_string(), "not found");
    assert_eq!(error.code(), 404);
    assert_eq!(error.name(), Some("lookup"));

    let error = instance.set_error(json!("plain failure"));
    assert_eq!(error.code(), 500);
    assert_eq!(error.name(), Some("lookup"));

    let input = json!({"type": "object", "required": ["id"]});
    instance.set_schemas(input.clone(), json!({})).unwrap();
    assert_eq!(instance.schemas(), (&input, &json!({})));

    let mut ctx = create_test_context(json!({"name": "lookup"}), json!({}));
    let err = instance
        .process(&mut ctx, &Mapper::new())
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::Validation(ref m) if m.contains("id")));
}
