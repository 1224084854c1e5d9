//! Tessera Core - paged views of columnar tables for table and chart widgets
//!
//! This crate provides the core functionality:
//! - Data: Arrow-backed DataFrame and Series, CSV input and output
//! - Accessors: filtering, aggregation, paging, sorting, decimation and
//!   encoding of host tables for the front-end
//! - Mutations: cell edits, row deletion and insertion
//! - Registries: host functions (cell styles, aggregates, decimators,
//!   comparisons) and accessor selection
//! - Adapters: list-of-values items for selectors and trees

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Data operations module - DataFrame, Series, and Arrow integration
pub mod data;

/// Accessor pipeline and wire payloads
pub mod accessor;

/// Host function and accessor registries
pub mod registry;

/// List-of-values adapters
pub mod adapter;

/// Accessor settings loaded from TOML
pub mod config;

pub use accessor::{
    ArrayAccessor, ArrayValue, DataAccessor, DataFormat, DataRequest, DataResponse,
    FrameAccessor, MutationRequest, TabularValue,
};
pub use adapter::{Adapter, LovItem, LovResult};
pub use config::AccessorConfig;
pub use data::{DataError, DataFrame, DataResult, Series, Value};
pub use registry::{AccessorRegistry, FunctionRegistry};
