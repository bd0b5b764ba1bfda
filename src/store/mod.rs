//! Columnar storage for the model's equation graph.
pub mod registry;
pub mod types;

pub use registry::{Registry, StockDef, StockInit};
pub use types::{CacheScope, NodeId, NodeKind, NodeMetadata, Operation, Unit};
