use crate::ErrorModel;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NanoError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Node not found: {0}")]
    UnknownNode(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Execution error: {0}")]
    Execution(String),
}

impl NanoError {
    /// The structured error carried by a failed handler, if any.
    pub fn error_model(&self) -> Option<&ErrorModel> {
        match self {
            NanoError::Node(NodeError::Handler(model)) => Some(model),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum NodeError {
    /// Every schema violation, joined into one message.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Handler(ErrorModel),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Timeout after {millis}ms")]
    Timeout { millis: u64 },

    #[error("Cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Unsupported encoding type: {0}")]
    UnsupportedEncoding(String),

    #[error("Unsupported message type: {0}")]
    UnsupportedType(String),

    #[error("Invalid base64 payload: {0}")]
    Base64(String),

    #[error("Payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid XML payload: {0}")]
    Xml(String),

    #[error("Invalid execution context: {0}")]
    InvalidContext(String),
}

/// Raised while evaluating an expression. Never leaves the mapper.
#[derive(Error, Debug)]
pub enum MapperError {
    #[error("Expression failed: {0}")]
    Evaluation(String),

    #[error("Cannot convert value: {0}")]
    Conversion(String),
}
