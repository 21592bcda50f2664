//! Node execution runtime
//!
//! This crate provides the engine that runs a single node: the
//! schema-validated lifecycle, the node registry, the transport envelope
//! codec and the `NodeRuntime` service tying them together.

pub mod codec;
mod lifecycle;
mod registry;
mod runtime;
mod schema;

pub use codec::{
    decode_message, decode_request, encode_json, encode_message, Encoding, MessageType,
    NodeReply, NodeRequest, Payload, ToDict, XmlElement, XmlNode,
};
pub use lifecycle::{NodeInstance, NodeOutcome};
pub use registry::{NodeFactory, NodeMetadata, NodeRegistry};
pub use runtime::{error_payload, NodeRuntime, RunOutcome, RuntimeConfig};
pub use schema::Schemas;
