use crate::error_model::deserialize_lenient;
use crate::value::null_as_default;
use crate::{ErrorModel, ResponseEnvelope};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// State threaded through one node execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,

    #[serde(default, alias = "workflow_name", deserialize_with = "null_as_default")]
    pub workflow_name: String,

    #[serde(default, alias = "workflow_path", deserialize_with = "null_as_default")]
    pub workflow_path: String,

    /// Inbound payload (`body`, headers, ...). Read-only to the pipeline.
    #[serde(default, deserialize_with = "null_as_default")]
    pub request: Map<String, Value>,

    /// Previous step's response on entry, this node's response on exit.
    #[serde(default, deserialize_with = "null_as_default")]
    pub response: ResponseEnvelope,

    /// This node's configuration; resolved in place by the lifecycle.
    #[serde(default, deserialize_with = "null_as_default")]
    pub config: Map<String, Value>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub func: Map<String, Value>,

    /// Scratchpad shared by every node of the workflow.
    #[serde(default, deserialize_with = "null_as_default")]
    pub vars: Map<String, Value>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub env: Map<String, Value>,

    #[serde(default, deserialize_with = "deserialize_lenient", skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorModel>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a decoded transport payload.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::Null => Ok(Self::default()),
            other => serde_json::from_value(other),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    pub fn with_config(mut self, config: Map<String, Value>) -> Self {
        self.config = config;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.request.insert("body".to_string(), body);
        self
    }

    pub fn body(&self) -> Option<&Value> {
        self.request.get("body")
    }

    /// Merge values into the variable scratchpad.
    pub fn set_vars(&mut self, vars: Map<String, Value>) {
        self.vars.extend(vars);
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn get_var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }
}

/// Per-node instance settings, seeded by the resolver before each run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    pub node: String,
    pub active: bool,
    pub stop: bool,
    #[serde(rename = "setVar", alias = "set_var")]
    pub set_var: bool,
}

impl NodeConfig {
    /// Read the instance flags out of a node's declarative config.
    pub fn from_config(config: &Map<String, Value>) -> Self {
        let text = |key: &str| {
            config
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let flag = |keys: &[&str], default: bool| {
            keys.iter()
                .find_map(|key| config.get(*key).and_then(Value::as_bool))
                .unwrap_or(default)
        };

        Self {
            name: text("name"),
            node: text("node"),
            active: flag(&["active"], true),
            stop: flag(&["stop"], false),
            set_var: flag(&["set_var", "setVar"], false),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            node: String::new(),
            active: true,
            stop: false,
            set_var: false,
        }
    }
}
