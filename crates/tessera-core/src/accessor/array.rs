//! Raw array values, served through the frame accessor

use std::path::PathBuf;
use std::sync::Arc;

use super::columns::ColsDescription;
use super::frame::FrameAccessor;
use super::payload::{DataFormat, DataRequest, DataResponse, MutationRequest};
use super::{DataAccessor, TabularValue};
use crate::data::{DataError, DataFrame, DataResult, Series, Value};

/// A row-major 2-D array of cells
///
/// Viewed as a table, column `i` is named `"i"`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    rows: Vec<Vec<Value>>,
    width: usize,
}

impl ArrayValue {
    /// A 1-D array, stored as a single column
    #[must_use]
    pub fn from_1d(values: Vec<Value>) -> Self {
        Self {
            rows: values.into_iter().map(|v| vec![v]).collect(),
            width: 1,
        }
    }

    /// Row-major 2-D array
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the rows have different lengths
    pub fn from_rows(rows: Vec<Vec<Value>>) -> DataResult<Self> {
        let width = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|r| r.len() != width) {
            return Err(DataError::InvalidArgument(format!(
                "row {bad} has {} values, expected {width}",
                rows[bad].len()
            )));
        }
        Ok(Self { rows, width })
    }

    /// `(rows, columns)`
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.width)
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Table view with columns `"0"`, `"1"`, ...
    ///
    /// # Errors
    /// Returns error if a column mixes incompatible cell types
    pub fn to_frame(&self) -> DataResult<DataFrame> {
        let columns = (0..self.width)
            .map(|c| {
                let cells: Vec<Value> = self.rows.iter().map(|r| r[c].clone()).collect();
                Series::from_values(c.to_string(), &cells)
            })
            .collect::<DataResult<Vec<_>>>()?;
        DataFrame::from_series(columns)
    }

    /// 2-D array holding the cells of `frame`
    ///
    /// # Errors
    /// Returns error if a row cannot be read
    pub fn from_frame(frame: &DataFrame) -> DataResult<Self> {
        let rows = (0..frame.num_rows())
            .map(|i| frame.row(i))
            .collect::<DataResult<Vec<_>>>()?;
        Ok(Self {
            rows,
            width: frame.num_columns(),
        })
    }
}

/// Serves arrays by delegating to a [`FrameAccessor`]
#[derive(Debug, Clone)]
pub struct ArrayAccessor {
    frame: Arc<FrameAccessor>,
}

impl ArrayAccessor {
    #[must_use]
    pub fn new(frame: Arc<FrameAccessor>) -> Self {
        Self { frame }
    }
}

impl DataAccessor for ArrayAccessor {
    fn name(&self) -> &'static str {
        "array"
    }

    fn cols_description(&self, var_name: &str, value: &TabularValue) -> DataResult<ColsDescription> {
        self.frame.cols_description(var_name, value)
    }

    fn get_data(
        &self,
        var_name: &str,
        value: &TabularValue,
        request: &DataRequest,
        format: DataFormat,
    ) -> DataResult<DataResponse> {
        self.frame.get_data(var_name, value, request, format)
    }

    fn on_edit(&self, value: &TabularValue, request: &MutationRequest) -> DataResult<TabularValue> {
        self.frame.on_edit(value, request)
    }

    fn on_delete(
        &self,
        value: &TabularValue,
        request: &MutationRequest,
    ) -> DataResult<TabularValue> {
        self.frame.on_delete(value, request)
    }

    fn on_add(
        &self,
        value: &TabularValue,
        request: &MutationRequest,
        new_row: Option<Vec<Value>>,
    ) -> DataResult<TabularValue> {
        self.frame.on_add(value, request, new_row)
    }

    fn to_csv(&self, var_name: &str, value: &TabularValue) -> DataResult<Option<PathBuf>> {
        self.frame.to_csv(var_name, value)
    }
}
