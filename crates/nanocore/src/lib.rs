//! Core abstractions for the node runner
//!
//! This crate provides the execution context, the result envelope, the
//! error model and the `Node` contract, plus the expression mapper that
//! resolves node configuration. It has no runtime dependencies.

mod context;
mod envelope;
mod error;
mod error_model;
mod mapper;
mod node;
mod value;

pub use context::{ExecutionContext, NodeConfig};
pub use envelope::{ResponseEnvelope, DEFAULT_CONTENT_TYPE};
pub use error::{MapperError, NanoError, NodeError, TransportError};
pub use error_model::{ErrorMessage, ErrorModel, DEFAULT_ERROR_CODE};
pub use mapper::{Mapper, EXPRESSION_PREFIX};
pub use node::{Node, NodeOutput, NodeStep};
pub use value::{is_truthy, stringify};

/// Result type for runner operations
pub type Result<T> = std::result::Result<T, NanoError>;
