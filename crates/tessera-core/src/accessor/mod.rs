//! Data accessors: turn a host table into paged, wire-ready output
//!
//! A request flows through these stages, each building a new table:
//!
//! 1. filter ([`filter`])
//! 2. aggregate ([`aggregate`]) or decimate and merge ([`decimate`])
//! 3. window and sort ([`paging`])
//! 4. transferred columns: host cell functions and date strings ([`transform`])
//! 5. encoding ([`format`])
//!
//! [`FrameAccessor`] runs the pipeline for tables, series and lists of
//! tables; [`ArrayAccessor`] serves raw arrays through an injected
//! [`FrameAccessor`]. Mutations live in [`mutate`].

pub mod aggregate;
mod array;
pub mod columns;
pub mod decimate;
pub mod filter;
pub mod format;
mod frame;
pub mod mutate;
pub mod paging;
pub mod payload;
pub mod transform;

use std::path::PathBuf;

pub use array::{ArrayAccessor, ArrayValue};
pub use columns::{columns_dict, ColsDescription, ColumnMeta, ColumnsDict, ColumnsSpec};
pub use decimate::{Decimated, Decimator, LttbDecimator, MinMaxDecimator};
pub use frame::FrameAccessor;
pub use payload::{
    DataFormat, DataRequest, DataResponse, DecimatorPayload, DecimatorSpec, FilterClause,
    MutationRequest, Orient, PageData, PageValue,
};

use crate::data::{DataError, DataFrame, DataResult, Series, Value};

/// Name of the row-locator column added to paged output
pub const INDEX_COL: &str = "_tp_index";

/// Error text for tables with nested columns
pub const UNSUPPORTED_TABLE: &str = "MultiIndex columns are not supported.";

/// A value held by the host and bound to a table or chart
#[derive(Debug, Clone)]
pub enum TabularValue {
    Frame(DataFrame),
    /// Served as a one-column table
    Series(Series),
    Array(ArrayValue),
    /// One table per chart trace
    List(Vec<TabularValue>),
}

impl TabularValue {
    /// Name of the container kind, used in error messages
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            TabularValue::Frame(_) => "DataFrame",
            TabularValue::Series(_) => "Series",
            TabularValue::Array(_) => "Array",
            TabularValue::List(_) => "List",
        }
    }

    /// View the value as a table
    ///
    /// # Errors
    /// Returns `InvalidArgument` for lists, which hold several tables
    pub fn to_frame(&self) -> DataResult<DataFrame> {
        match self {
            TabularValue::Frame(frame) => Ok(frame.clone()),
            TabularValue::Series(series) => DataFrame::from_series(vec![series.clone()]),
            TabularValue::Array(array) => array.to_frame(),
            TabularValue::List(_) => Err(DataError::InvalidArgument(
                "a list of tables has no single table view".to_string(),
            )),
        }
    }

    /// Rebuild a value of the same container kind from a table
    ///
    /// # Errors
    /// Returns error if the table cannot be stored in this kind of container
    pub fn with_frame(&self, frame: DataFrame) -> DataResult<TabularValue> {
        match self {
            TabularValue::Frame(_) => Ok(TabularValue::Frame(frame)),
            TabularValue::Series(series) => {
                let column = if frame.has_column(series.name()) {
                    frame.column(series.name())?
                } else {
                    frame.column_by_index(0)?
                };
                Ok(TabularValue::Series(column))
            }
            TabularValue::Array(_) => Ok(TabularValue::Array(ArrayValue::from_frame(&frame)?)),
            TabularValue::List(_) => Err(DataError::InvalidArgument(
                "cannot rebuild a list of tables from one table".to_string(),
            )),
        }
    }

    #[must_use]
    pub fn as_frame(&self) -> Option<&DataFrame> {
        match self {
            TabularValue::Frame(frame) => Some(frame),
            _ => None,
        }
    }
}

impl From<DataFrame> for TabularValue {
    fn from(frame: DataFrame) -> Self {
        TabularValue::Frame(frame)
    }
}

impl From<Series> for TabularValue {
    fn from(series: Series) -> Self {
        TabularValue::Series(series)
    }
}

impl From<ArrayValue> for TabularValue {
    fn from(array: ArrayValue) -> Self {
        TabularValue::Array(array)
    }
}

/// Serves one kind of host value to the front-end
pub trait DataAccessor: Send + Sync {
    /// Short accessor name, used in logs
    fn name(&self) -> &'static str;

    /// Column name -> dtype of the value; list entries are prefixed `<i>/`
    ///
    /// # Errors
    /// Returns error if the value cannot be viewed as a table
    fn cols_description(&self, var_name: &str, value: &TabularValue) -> DataResult<ColsDescription>;

    /// Answer a page request
    ///
    /// # Errors
    /// Returns error for unusable values or encoding failures; soft failures
    /// are reported in [`DataResponse::warnings`] instead
    fn get_data(
        &self,
        var_name: &str,
        value: &TabularValue,
        request: &DataRequest,
        format: DataFormat,
    ) -> DataResult<DataResponse>;

    /// Replace one cell
    ///
    /// # Errors
    /// Returns `InvalidArgument` when the locator is not a number or misses
    fn on_edit(&self, value: &TabularValue, request: &MutationRequest) -> DataResult<TabularValue>;

    /// Remove one row
    ///
    /// # Errors
    /// Returns `InvalidArgument` when the locator is not a number or misses
    fn on_delete(&self, value: &TabularValue, request: &MutationRequest)
        -> DataResult<TabularValue>;

    /// Insert one row, defaulted per column type unless `new_row` is given
    ///
    /// # Errors
    /// Returns `InvalidArgument` when the locator is not a number
    fn on_add(
        &self,
        value: &TabularValue,
        request: &MutationRequest,
        new_row: Option<Vec<Value>>,
    ) -> DataResult<TabularValue>;

    /// Export the full transferred table to a temporary CSV file
    ///
    /// # Errors
    /// Returns error if the value is not a single table or writing fails
    fn to_csv(&self, var_name: &str, value: &TabularValue) -> DataResult<Option<PathBuf>>;
}
