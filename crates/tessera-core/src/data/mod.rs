//! Columnar table layer
//!
//! This module provides:
//! - DataFrame: Apache Arrow-backed columnar table
//! - Series: Single column representation
//! - Value: dynamic cell value used by host functions and the wire codec
//! - Type mapping between Arrow types and client dtype names
//! - CSV input and output

mod dataframe;
mod error;
pub mod io;
mod series;
mod types;
mod value;

pub use dataframe::DataFrame;
pub use error::{DataError, DataResult};
pub use io::{read_csv, write_csv, write_csv_to};
pub use series::{parse_naive_timestamp, Series};
pub use types::{column_kind, dtype_name, is_flat_type, ColumnKind};
pub use value::Value;
pub(crate) use value::format_timestamp;
