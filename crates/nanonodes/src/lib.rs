//! Standard node library
//!
//! Collection of built-in nodes for common operations

mod api_call;
mod echo;
mod error;
mod mapper;

pub use api_call::{ApiCallNode, ApiCallNodeFactory};
pub use echo::{EchoNode, EchoNodeFactory};
pub use error::{ErrorNode, ErrorNodeFactory};
pub use mapper::{MapperNode, MapperNodeFactory};
use nanoruntime::NodeRegistry;

use std::sync::Arc;

/// Register all standard nodes with a registry
pub fn register_all(registry: &mut NodeRegistry) {
    registry.register(Arc::new(api_call::ApiCallNodeFactory::new()));
    registry.register(Arc::new(echo::EchoNodeFactory));
    registry.register(Arc::new(error::ErrorNodeFactory));
    registry.register(Arc::new(mapper::MapperNodeFactory));
}
