use anyhow::{bail, Context as _};
use async_trait::async_trait;
use nanocore::{
    stringify, ExecutionContext, Node, NodeError, NodeOutput, ResponseEnvelope,
    DEFAULT_CONTENT_TYPE,
};
use nanoruntime::{NodeFactory, NodeMetadata};
use reqwest::{Method, StatusCode};
use serde_json::{json, Map, Value};

/// HTTP request node
///
/// Inputs: `url`, `method`, optional `headers`, `body` and `responseType`
/// (default `application/json`). Without a `body`, the previous step's data
/// is sent instead.
pub struct ApiCallNode {
    client: reqwest::Client,
}

impl ApiCallNode {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ApiCallNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for ApiCallNode {
    fn node_type(&self) -> &str {
        "api_call"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string"},
                "method": {"type": "string"},
                "body": {"type": "object"},
                "headers": {"type": "object"},
                "responseType": {"type": "string"}
            },
            "required": ["url", "method"]
        })
    }

    async fn handle(
        &self,
        ctx: &mut ExecutionContext,
        inputs: Map<String, Value>,
    ) -> anyhow::Result<NodeOutput> {
        let text = |key: &str| inputs.get(key).and_then(Value::as_str);
        let url = text("url").unwrap_or_default();
        let method = text("method").unwrap_or("GET").to_uppercase();
        let response_type = text("responseType").unwrap_or(DEFAULT_CONTENT_TYPE);

        let method = Method::from_bytes(method.as_bytes())
            .with_context(|| format!("Unsupported method: {}", method))?;

        let mut request = self.client.request(method.clone(), url);
        if method != Method::GET && method != Method::DELETE {
            let body = match inputs.get("body") {
                Some(body) if !body.is_null() => body,
                _ => ctx.response.data(),
            };
            request = request.json(body);
        }

        // Add headers if provided
        if let Some(Value::Object(headers)) = inputs.get("headers") {
            for (key, value) in headers {
                request = request.header(key.as_str(), stringify(value));
            }
        }

        tracing::info!("{} {}", method, url);
        let response = request
            .send()
            .await
            .with_context(|| format!("HTTP request to {} failed", url))?;

        let status = response.status();
        tracing::info!("Response status: {}", status.as_u16());

        let result = if response_type == DEFAULT_CONTENT_TYPE {
            if status != StatusCode::OK {
                let body = response.text().await.context("Failed to read response")?;
                bail!("{}", body);
            }
            response
                .json::<Value>()
                .await
                .context("Response body is not valid JSON")?
        } else {
            Value::String(response.text().await.context("Failed to read response")?)
        };

        Ok(ResponseEnvelope::success(result).into())
    }
}

/// Hands every node a clone of one shared client, so connections are pooled
/// across executions.
#[derive(Default)]
pub struct ApiCallNodeFactory {
    client: reqwest::Client,
}

impl ApiCallNodeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl NodeFactory for ApiCallNodeFactory {
    fn create(&self) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(ApiCallNode::with_client(self.client.clone())))
    }

    fn node_type(&self) -> &str {
        "api_call"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Make HTTP requests".to_string(),
            category: "http".to_string(),
        }
    }
}
