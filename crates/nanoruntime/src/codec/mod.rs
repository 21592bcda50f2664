//! Envelope codec for crossing the process boundary
//!
//! Inbound messages carry an `encoding` (`BASE64` or `STRING`) and a payload
//! `type`. Outbound messages are always serialized per type and then
//! base64-encoded.

mod xml;

pub use xml::{XmlElement, XmlNode};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use nanocore::{ErrorModel, ExecutionContext, ResponseEnvelope, TransportError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Encoding {
    Base64,
    String,
}

impl FromStr for Encoding {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BASE64" => Ok(Encoding::Base64),
            "STRING" => Ok(Encoding::String),
            other => Err(TransportError::UnsupportedEncoding(other.to_string())),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Base64 => write!(f, "BASE64"),
            Encoding::String => write!(f, "STRING"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    Json,
    Xml,
    Text,
    Html,
    Binary,
}

impl FromStr for MessageType {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "JSON" => Ok(MessageType::Json),
            "XML" => Ok(MessageType::Xml),
            "TEXT" => Ok(MessageType::Text),
            "HTML" => Ok(MessageType::Html),
            "BINARY" => Ok(MessageType::Binary),
            other => Err(TransportError::UnsupportedType(other.to_string())),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageType::Json => "JSON",
            MessageType::Xml => "XML",
            MessageType::Text => "TEXT",
            MessageType::Html => "HTML",
            MessageType::Binary => "BINARY",
        };
        f.write_str(name)
    }
}

/// Values with a plain mapping projection
pub trait ToDict {
    fn to_dict(&self) -> Value;
}

impl ToDict for ErrorModel {
    fn to_dict(&self) -> Value {
        ErrorModel::to_dict(self)
    }
}

impl ToDict for ResponseEnvelope {
    fn to_dict(&self) -> Value {
        ResponseEnvelope::to_dict(self)
    }
}

impl ToDict for ExecutionContext {
    fn to_dict(&self) -> Value {
        self.to_value()
    }
}

/// A decoded message body
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Xml(XmlElement),
    Text(String),
    Html(String),
    Binary(Vec<u8>),
}

impl Payload {
    /// JSON payload from anything with a dict projection.
    pub fn from_dict(value: &impl ToDict) -> Self {
        Payload::Json(value.to_dict())
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Payload::Json(_) => MessageType::Json,
            Payload::Xml(_) => MessageType::Xml,
            Payload::Text(_) => MessageType::Text,
            Payload::Html(_) => MessageType::Html,
            Payload::Binary(_) => MessageType::Binary,
        }
    }
}

/// Inbound transport message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRequest {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Message")]
    pub message: String,
    #[serde(alias = "Encoding")]
    pub encoding: String,
    #[serde(rename = "type", alias = "Type")]
    pub message_type: String,
}

impl NodeRequest {
    /// A `BASE64`/`JSON` request carrying `context`.
    pub fn json(name: impl Into<String>, context: &Value) -> Self {
        Self {
            name: name.into(),
            message: encode_json(context),
            encoding: Encoding::Base64.to_string(),
            message_type: MessageType::Json.to_string(),
        }
    }
}

/// Outbound transport message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReply {
    pub message: String,
    pub encoding: Encoding,
    #[serde(rename = "type")]
    pub message_type: MessageType,
}

impl NodeReply {
    /// Replies are always `BASE64`/`JSON`.
    pub fn json(value: &Value) -> Self {
        Self {
            message: encode_json(value),
            encoding: Encoding::Base64,
            message_type: MessageType::Json,
        }
    }

    pub fn decode(&self) -> Result<Payload, TransportError> {
        decode_message(&self.message, self.encoding, self.message_type)
    }
}

/// Decode one message according to its declared encoding and type.
pub fn decode_message(
    message: &str,
    encoding: Encoding,
    message_type: MessageType,
) -> Result<Payload, TransportError> {
    let bytes = match encoding {
        Encoding::Base64 => STANDARD
            .decode(message.trim())
            .map_err(|e| TransportError::Base64(e.to_string()))?,
        Encoding::String => message.as_bytes().to_vec(),
    };
    tracing::debug!(%encoding, %message_type, len = bytes.len(), "Decoding message");

    match message_type {
        MessageType::Binary => Ok(Payload::Binary(bytes)),
        MessageType::Json => Ok(Payload::Json(serde_json::from_slice(&bytes)?)),
        MessageType::Xml => {
            let text = String::from_utf8(bytes)?;
            Ok(Payload::Xml(XmlElement::parse(&text)?))
        }
        MessageType::Text => Ok(Payload::Text(String::from_utf8(bytes)?)),
        MessageType::Html => Ok(Payload::Html(String::from_utf8(bytes)?)),
    }
}

/// Decode the body of an inbound request, failing closed on unknown
/// encodings or types.
pub fn decode_request(request: &NodeRequest) -> Result<Payload, TransportError> {
    let encoding = request.encoding.parse::<Encoding>()?;
    let message_type = request.message_type.parse::<MessageType>()?;
    decode_message(&request.message, encoding, message_type)
}

/// Serialize a payload by type, then base64 the result.
pub fn encode_message(payload: &Payload) -> Result<String, TransportError> {
    let body = match payload {
        Payload::Json(value) => serde_json::to_string(value)?,
        Payload::Xml(root) => root.to_xml()?,
        Payload::Text(text) | Payload::Html(text) => text.clone(),
        Payload::Binary(bytes) => STANDARD.encode(bytes),
    };
    Ok(STANDARD.encode(body))
}

pub fn encode_json(value: &Value) -> String {
    STANDARD.encode(value.to_string())
}
