//! Page windows and sorting

use std::ops::Range;

use crate::data::{DataError, DataFrame, DataResult};

/// Read a `start`/`end` bound: integers as-is, strings as base-10 integers
///
/// A missing bound yields `default`.
///
/// # Errors
/// Returns `InvalidArgument` for anything else
pub fn parse_bound(value: Option<&serde_json::Value>, default: i64) -> DataResult<i64> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| DataError::InvalidArgument(format!("{n} is not an integer"))),
        Some(serde_json::Value::Bool(b)) => Ok(i64::from(*b)),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| DataError::InvalidArgument(format!("'{s}' is not a base-10 integer"))),
        Some(other) => Err(DataError::InvalidArgument(format!(
            "{other} is not an integer"
        ))),
    }
}

/// Inclusive row window `[start, end]`; empty when `end < start`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub start: i64,
    pub end: i64,
}

impl PageWindow {
    /// Clamp the requested bounds into the table, mirroring for `reverse`
    ///
    /// Out-of-range starts become 0 and out-of-range ends the last row. A
    /// reversed window keeps its width and ends at `rowcount - 1 - start`.
    #[must_use]
    pub fn compute(rowcount: usize, start: i64, end: i64, reverse: bool) -> Self {
        let rows = rowcount as i64;
        let mut start = if start < 0 || start >= rows { 0 } else { start };
        let mut end = if end < 0 || end >= rows { rows - 1 } else { end };
        if reverse {
            let diff = end - start;
            end = rows - 1 - start;
            if end < 0 {
                end = rows - 1;
            }
            start = (end - diff).max(0);
        }
        Self { start, end }
    }

    /// First row, as reported to the client
    #[must_use]
    pub fn first_row(&self) -> usize {
        self.start.max(0) as usize
    }

    /// Row positions covered by the window
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        let start = self.first_row();
        let end = (self.end + 1).max(self.start.max(0)) as usize;
        start..end
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.range().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Row positions of the window, after an optional full-column sort
///
/// The sort is stable with nulls last; `descending` reverses the whole
/// permutation before the window is cut.
///
/// # Errors
/// Returns error if the sort column is missing or unsortable
pub fn sorted_indices(
    frame: &DataFrame,
    orderby: Option<&str>,
    descending: bool,
    window: PageWindow,
) -> DataResult<Vec<usize>> {
    let Some(column) = orderby.filter(|c| !c.is_empty()) else {
        return Ok(plain_indices(frame, window));
    };
    let mut permutation = frame.argsort(column)?;
    if descending {
        permutation.reverse();
    }
    let range = window.range();
    let end = range.end.min(permutation.len());
    let start = range.start.min(end);
    Ok(permutation[start..end].to_vec())
}

/// Row positions of the window without sorting
#[must_use]
pub fn plain_indices(frame: &DataFrame, window: PageWindow) -> Vec<usize> {
    let range = window.range();
    let end = range.end.min(frame.num_rows());
    (range.start.min(end)..end).collect()
}
