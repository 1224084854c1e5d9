//! Row and cell mutations requested by editable tables
//!
//! Every operation returns a new value of the same container kind; the
//! source value is never modified.

use tracing::debug;

use super::payload::MutationRequest;
use super::TabularValue;
use crate::data::{column_kind, ColumnKind, DataError, DataFrame, DataResult, Series, Value};

/// Read the row locator of a request
///
/// Accepts integers and floats with an integral value.
///
/// # Errors
/// Returns `InvalidArgument` with `message` for anything else
pub fn locator(request: &MutationRequest, message: impl FnOnce() -> String) -> DataResult<i64> {
    let number = match &request.index {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        _ => None,
    };
    number.ok_or_else(|| DataError::InvalidArgument(message()))
}

fn index_text(request: &MutationRequest) -> String {
    request
        .index
        .as_ref()
        .map_or_else(|| "None".to_string(), ToString::to_string)
}

/// Resolve the table and locator, or fail with the operation's message
fn target(
    value: &TabularValue,
    request: &MutationRequest,
    describe: impl Fn(&str, &str) -> String,
) -> DataResult<(DataFrame, i64)> {
    let message = || describe(value.kind_name(), &index_text(request));
    if matches!(value, TabularValue::List(_)) {
        return Err(DataError::InvalidArgument(message()));
    }
    let row = locator(request, message)?;
    Ok((value.to_frame()?, row))
}

fn existing_row(frame: &DataFrame, row: i64, message: impl FnOnce() -> String) -> DataResult<usize> {
    usize::try_from(row)
        .ok()
        .filter(|&r| r < frame.num_rows())
        .ok_or_else(|| DataError::InvalidArgument(message()))
}

/// Replace one cell, casting the new value to the column type
///
/// # Errors
/// Returns `InvalidArgument` for a bad locator or a missing row, and
/// `ColumnNotFound` or `TypeMismatch` when the cell cannot be written
pub fn edit(value: &TabularValue, request: &MutationRequest) -> DataResult<TabularValue> {
    let describe = |kind: &str, index: &str| format!("Cannot edit {kind} at {index}.");
    let (frame, row) = target(value, request, describe)?;
    let row = existing_row(&frame, row, || {
        describe(value.kind_name(), &index_text(request))
    })?;
    let name = request
        .col
        .as_deref()
        .ok_or_else(|| DataError::InvalidArgument("edit request has no column".to_string()))?;

    let column = frame.column(name)?;
    let mut cells = column.to_values()?;
    cells[row] = request.value.as_ref().map_or(Value::Null, Value::from_json);
    let edited = Series::from_values_typed(name, &cells, column.data_type())?;
    debug!(column = name, row, "edited cell");
    value.with_frame(frame.with_column(edited)?)
}

/// Remove one row
///
/// # Errors
/// Returns `InvalidArgument` for a bad locator or a missing row
pub fn delete(value: &TabularValue, request: &MutationRequest) -> DataResult<TabularValue> {
    let describe = |kind: &str, index: &str| format!("Cannot delete a row from {kind} at {index}.");
    let (frame, row) = target(value, request, describe)?;
    let row = existing_row(&frame, row, || {
        describe(value.kind_name(), &index_text(request))
    })?;
    let before = frame.slice(0, row)?;
    let after = frame.slice(row + 1, frame.num_rows())?;
    debug!(row, "deleted row");
    value.with_frame(DataFrame::concat(&[&before, &after])?)
}

/// Insert one row at the locator
///
/// A locator of 0 or below prepends; a locator past the end appends.
/// Without `new_row`, numeric cells default to 0, strings to `""`, booleans
/// to `false` and other types to null. A value with no columns is returned
/// unchanged.
///
/// # Errors
/// Returns `InvalidArgument` for a bad locator or a `new_row` of the wrong
/// width, and `TypeMismatch` when a cell does not fit its column
pub fn add(
    value: &TabularValue,
    request: &MutationRequest,
    new_row: Option<Vec<Value>>,
) -> DataResult<TabularValue> {
    let (frame, index) = target(value, request, |kind, index| {
        format!("Cannot add a row to {kind} at {index}.")
    })?;
    if frame.num_columns() == 0 {
        return Ok(value.clone());
    }

    let cells = match new_row {
        Some(cells) if cells.len() != frame.num_columns() => {
            return Err(DataError::InvalidArgument(format!(
                "new row has {} values for {} columns",
                cells.len(),
                frame.num_columns()
            )))
        }
        Some(cells) => cells,
        None => default_row(&frame),
    };
    let row = single_row(&frame, &cells)?;

    let split = usize::try_from(index).unwrap_or(0).min(frame.num_rows());
    let before = frame.slice(0, split)?;
    let after = frame.slice(split, frame.num_rows())?;
    debug!(row = split, "added row");
    value.with_frame(DataFrame::concat(&[&before, &row, &after])?)
}

fn default_row(frame: &DataFrame) -> Vec<Value> {
    frame
        .schema()
        .fields()
        .iter()
        .map(|field| match column_kind(field.data_type()) {
            ColumnKind::Numeric => Value::Int(0),
            ColumnKind::String | ColumnKind::Categorical => Value::string(""),
            ColumnKind::Boolean => Value::Bool(false),
            ColumnKind::DateTime | ColumnKind::Other => Value::Null,
        })
        .collect()
}

fn single_row(frame: &DataFrame, cells: &[Value]) -> DataResult<DataFrame> {
    let columns = frame
        .schema()
        .fields()
        .iter()
        .zip(cells)
        .map(|(field, cell)| {
            Series::from_values_typed(field.name().as_str(), std::slice::from_ref(cell), field.data_type())
        })
        .collect::<DataResult<Vec<_>>>()?;
    DataFrame::from_series(columns)
}
