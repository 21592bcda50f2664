use crate::error_model::deserialize_lenient;
use crate::value::{is_truthy, null_as_default};
use crate::ErrorModel;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Uniform `{data, error, success, contentType}` result of a node.
///
/// `success` always equals `error.is_none()`; the only ways to change the
/// outcome are `set_success` and `set_error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "EnvelopeRepr")]
pub struct ResponseEnvelope {
    data: Value,
    error: Option<ErrorModel>,
    success: bool,
    content_type: String,
}

impl ResponseEnvelope {
    /// Empty successful envelope.
    pub fn new() -> Self {
        Self {
            data: Value::Object(Map::new()),
            error: None,
            success: true,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }

    pub fn success(data: Value) -> Self {
        let mut envelope = Self::new();
        envelope.set_success(data);
        envelope
    }

    pub fn failure(error: impl Into<ErrorModel>) -> Self {
        let mut envelope = Self::new();
        envelope.set_error(error.into());
        envelope
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn set_success(&mut self, data: Value) {
        self.data = data;
        self.error = None;
        self.success = true;
    }

    pub fn set_error(&mut self, error: ErrorModel) {
        self.data = Value::Object(Map::new());
        self.error = Some(error);
        self.success = false;
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = content_type.into();
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// The data if it carries anything; empty objects, `null` and other
    /// falsy values count as absent.
    pub fn present_data(&self) -> Option<&Value> {
        Some(&self.data).filter(|data| is_truthy(data))
    }

    pub fn into_data(self) -> Value {
        self.data
    }

    pub fn error(&self) -> Option<&ErrorModel> {
        self.error.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn to_dict(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

impl Default for ResponseEnvelope {
    fn default() -> Self {
        Self::new()
    }
}

/// Wire shape accepted from callers; `success` is recomputed.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeRepr {
    #[serde(default = "empty_object", deserialize_with = "null_as_default")]
    data: Value,
    #[serde(default, deserialize_with = "deserialize_lenient")]
    error: Option<ErrorModel>,
    #[serde(default = "default_content_type", alias = "content_type")]
    content_type: String,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

impl From<EnvelopeRepr> for ResponseEnvelope {
    fn from(repr: EnvelopeRepr) -> Self {
        Self {
            success: repr.error.is_none(),
            data: repr.data,
            error: repr.error,
            content_type: repr.content_type,
        }
    }
}
