use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub const DEFAULT_ERROR_CODE: i64 = 500;

/// Human readable part of an error: a single line or an ordered list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    Text(String),
    Lines(Vec<String>),
}

impl ErrorMessage {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(ErrorMessage::Text(text.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(ErrorMessage::Lines),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorMessage::Text(text) => f.write_str(text),
            ErrorMessage::Lines(lines) => f.write_str(&lines.join("\n")),
        }
    }
}

/// Structured failure produced by a node or by validation.
///
/// This is the only error representation that crosses the process
/// boundary; `to_dict`/`from_dict` are lossless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorModel {
    message: ErrorMessage,
    #[serde(default = "default_code")]
    code: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    json: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

fn default_code() -> i64 {
    DEFAULT_ERROR_CODE
}

impl ErrorModel {
    pub fn new(message: impl Into<String>) -> Self {
        Self::from_message(ErrorMessage::Text(message.into()))
    }

    pub fn from_message(message: ErrorMessage) -> Self {
        Self {
            message,
            code: DEFAULT_ERROR_CODE,
            json: None,
            stack: None,
            name: None,
        }
    }

    /// Build an error from whatever a node handed over.
    ///
    /// Strings become the message. A mapping with a `message` uses it, any
    /// other mapping is stringified into the message and kept under `json`.
    /// `json`, `stack` and `code` keys are then applied on top; a `code`
    /// that is not an integer falls back to 500.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(text) => Self::new(text),
            Value::Object(map) => Self::from_map(map),
            other => Self::new(other.to_string()).with_json(other),
        }
    }

    fn from_map(map: Map<String, Value>) -> Self {
        let mut model = match map.get("message").and_then(ErrorMessage::from_value) {
            Some(message) => Self::from_message(message),
            None => {
                let raw = Value::Object(map.clone());
                Self::new(raw.to_string()).with_json(raw)
            }
        };

        if let Some(json) = map.get("json") {
            model.json = Some(json.clone());
        }
        if let Some(stack) = map.get("stack").and_then(Value::as_str) {
            model.stack = Some(stack.to_string());
        }
        if let Some(code) = map.get("code") {
            model.code = code.as_i64().unwrap_or(DEFAULT_ERROR_CODE);
        }
        model
    }

    /// Wrap an arbitrary handler failure; the cause chain becomes the stack.
    pub fn from_cause(cause: &anyhow::Error) -> Self {
        let stack = format!("{:?}", cause);
        Self::new(cause.to_string()).with_stack(stack)
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    pub fn with_json(mut self, json: Value) -> Self {
        self.json = Some(json);
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Attach the owning node's name, replacing any previous one.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn message(&self) -> &ErrorMessage {
        &self.message
    }

    pub fn code(&self) -> i64 {
        self.code
    }

    pub fn json(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn to_dict(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    pub fn from_dict(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

impl fmt::Display for ErrorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.json {
            Some(json) => write!(f, "{}", json),
            None => write!(f, "{}", self.message),
        }
    }
}

impl From<&str> for ErrorModel {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ErrorModel {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Accepts `null`, a proper error dict, or any loose shape an orchestrator
/// may have written into an `error` slot.
pub(crate) fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<ErrorModel>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) if map.is_empty() => None,
        Some(value) => Some(
            ErrorModel::from_dict(value.clone()).unwrap_or_else(|_| ErrorModel::from_value(value)),
        ),
    })
}
