mod config;

use actix_cors::Cors;
use actix_web::{get, post, web, App, HttpResponse, HttpServer, Responder};
use config::ServerConfig;
use nanocore::NanoError;
use nanoruntime::{error_payload, NodeRegistry, NodeReply, NodeRequest, NodeRuntime};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
struct AppState {
    runtime: Arc<NodeRuntime>,
}

/// Health check endpoint
#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "nanoserver"
    }))
}

/// Execute one node
///
/// Always answers 200: failures travel inside the reply message.
#[post("/execute")]
async fn execute_node(data: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    let reply = match serde_json::from_slice::<NodeRequest>(&body) {
        Ok(request) => {
            info!("Executing node: {}", request.name);
            data.runtime.handle_request(request).await
        }
        Err(e) => {
            error!("Malformed execute request: {}", e);
            NodeReply::json(&error_payload(&NanoError::Serialization(e)))
        }
    };

    HttpResponse::Ok().json(reply)
}

/// List available node types
#[get("/api/nodes")]
async fn list_node_types(data: web::Data<AppState>) -> impl Responder {
    let registry = data.runtime.registry();

    let nodes: Vec<_> = registry
        .list_node_types()
        .iter()
        .map(|node_type| {
            let metadata = registry.get_metadata(node_type).unwrap_or_default();
            serde_json::json!({
                "type": node_type,
                "description": metadata.description,
                "category": metadata.category,
            })
        })
        .collect();

    HttpResponse::Ok().json(nodes)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting nanoservice node server");

    let config = ServerConfig::from_env()?;

    // Create runtime with registered nodes
    let mut registry = NodeRegistry::new();
    nanonodes::register_all(&mut registry);

    let runtime = Arc::new(NodeRuntime::with_config(
        Arc::new(registry),
        config.runtime_config(),
    ));

    info!(
        timeout_ms = ?config.node_timeout_ms,
        "Runtime initialized with standard nodes"
    );

    let app_state = web::Data::new(AppState {
        runtime: runtime.clone(),
    });

    info!("Server starting on http://{}", config.bind_address);

    // Start HTTP server
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(actix_web::middleware::Logger::default())
            .service(health_check)
            .service(execute_node)
            .service(list_node_types)
    })
    .bind(&config.bind_address)?
    .run()
    .await?;

    runtime.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;
    use nanoruntime::Payload;
    use serde_json::{json, Value};

    fn app_state() -> web::Data<AppState> {
        let mut registry = NodeRegistry::new();
        nanonodes::register_all(&mut registry);
        web::Data::new(AppState {
            runtime: Arc::new(NodeRuntime::new(Arc::new(registry))),
        })
    }

    fn reply_payload(reply: &NodeReply) -> Value {
        match reply.decode().unwrap() {
            Payload::Json(value) => value,
            other => panic!("unexpected reply payload: {:?}", other),
        }
    }

    #[actix_web::test]
    async fn test_execute_returns_node_data() {
        let app = test::init_service(App::new().app_data(app_state()).service(execute_node)).await;
        let context = json!({
            "config": {"greeting": "hi ${name}"},
            "request": {"body": {"name": "Ada"}}
        });

        let req = test::TestRequest::post()
            .uri("/execute")
            .set_json(NodeRequest::json("echo", &context))
            .to_request();
        let reply: NodeReply = test::call_and_read_body_json(&app, req).await;

        assert_eq!(reply_payload(&reply), json!({"greeting": "hi Ada"}));
    }

    #[actix_web::test]
    async fn test_malformed_request_still_gets_a_reply() {
        let app = test::init_service(App::new().app_data(app_state()).service(execute_node)).await;

        let req = test::TestRequest::post()
            .uri("/execute")
            .set_payload("not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let reply: NodeReply = test::read_body_json(resp).await;
        assert!(reply_payload(&reply)["error"].is_string());
    }

    #[actix_web::test]
    async fn test_list_nodes() {
        let app =
            test::init_service(App::new().app_data(app_state()).service(list_node_types)).await;

        let req = test::TestRequest::get().uri("/api/nodes").to_request();
        let nodes: Vec<Value> = test::call_and_read_body_json(&app, req).await;

        let types: Vec<&str> = nodes.iter().filter_map(|n| n["type"].as_str()).collect();
        assert_eq!(types, vec!["api_call", "echo", "error", "mapper"]);
    }
}
