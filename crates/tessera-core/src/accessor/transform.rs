//! Transferred columns: the table actually sent to the client
//!
//! Adds the columns computed by host cell functions (styles, tooltips,
//! formats), replaces datetime columns with UTC ISO strings and drops the
//! columns the client did not ask for.

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use rayon::prelude::*;
use tracing::warn;

use super::columns::{date_col_str_name, parse_dtype, ColsDescription};
use super::INDEX_COL;
use crate::config::AccessorConfig;
use crate::data::{DataFrame, DataResult, Series, Value};
use crate::registry::{CellArgs, CellFn, FunctionRegistry};

/// Wire format of transferred dates
pub const WS_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

const STYLE_PREFIX: &str = "tps__";
const TOOLTIP_PREFIX: &str = "tpt__";
const FORMAT_PREFIX: &str = "tpf__";

/// What to compute on top of the source columns
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferOptions<'a> {
    /// Requested columns; all when empty
    pub columns: &'a [String],
    pub styles: &'a [(String, String)],
    pub tooltips: &'a [(String, String)],
    pub formats: &'a [(String, String)],
    /// Emit `"NaT"` for missing dates instead of null
    pub handle_nan: bool,
}

/// Transferred table and the soft failures met while building it
#[derive(Debug, Clone)]
pub struct Transferred {
    pub frame: DataFrame,
    pub warnings: Vec<String>,
}

/// Build the table sent to the client
///
/// `new_indexes` selects (and orders) the rows first. Cell function columns
/// are named `<prefix><column>__<function>`, or after the function alone
/// when it is not bound to a displayed column. A style naming an unknown
/// function becomes a constant column holding that name. Each datetime
/// column is replaced by `<column>_str`; naive datetimes are read in the
/// configured timezone.
///
/// # Errors
/// Returns error if the rows cannot be selected or the configured timezone
/// is invalid
pub fn build_transferred_cols(
    frame: &DataFrame,
    new_indexes: Option<&[usize]>,
    options: &TransferOptions<'_>,
    registry: &FunctionRegistry,
    config: &AccessorConfig,
) -> DataResult<Transferred> {
    let frame = match new_indexes {
        Some(indexes) => frame.take(indexes)?,
        None => frame.clone(),
    };
    let mut description = ColsDescription::of_frame(&frame);
    if !options.columns.is_empty() {
        description = description.retain_names(options.columns);
    }
    let mut cols: Vec<String> = description.names().map(str::to_string).collect();

    let mut warnings = Vec::new();
    let mut new_cols: Vec<Series> = Vec::new();
    let mut push = |series: Series| match new_cols.iter().position(|s| s.name() == series.name()) {
        Some(i) => new_cols[i] = series,
        None => new_cols.push(series),
    };

    let needs_rows = !(options.styles.is_empty()
        && options.tooltips.is_empty()
        && options.formats.is_empty());
    let rows = if needs_rows {
        Some(RowTable::new(&frame)?)
    } else {
        None
    };

    if let Some(rows) = &rows {
        for (column, function) in options.styles {
            let applied = registry.cell_function(function).and_then(|f| {
                rows.apply(f, bound_column(&cols, column), function, STYLE_PREFIX, config, &mut warnings)
            });
            push(applied.unwrap_or_else(|| {
                Series::from_optional_strings(
                    function.as_str(),
                    vec![Some(function.clone()); frame.num_rows()],
                )
            }));
        }
        for (prefix, pairs) in [(TOOLTIP_PREFIX, options.tooltips), (FORMAT_PREFIX, options.formats)] {
            for (column, function) in pairs {
                if let Some(series) = registry.cell_function(function).and_then(|f| {
                    rows.apply(f, bound_column(&cols, column), function, prefix, config, &mut warnings)
                }) {
                    push(series);
                }
            }
        }
    }

    let date_cols: Vec<(String, String)> = description
        .iter()
        .filter(|(_, dtype)| dtype.starts_with("datetime"))
        .map(|(name, dtype)| (name.to_string(), dtype.to_string()))
        .collect();
    if !date_cols.is_empty() {
        let local = config.tz()?;
        for (name, dtype) in &date_cols {
            let tz_aware = parse_dtype(dtype).tz.is_some();
            let str_name = date_col_str_name(cols.iter().map(String::as_str), name);
            let series = frame.column(name)?;
            push(date_strings(&series, &str_name, tz_aware, local, options.handle_nan)?);
        }
        cols.retain(|c| !date_cols.iter().any(|(d, _)| d == c));
    }

    let mut frame = frame;
    for series in &new_cols {
        frame = frame.with_column(series.clone())?;
    }
    cols.extend(new_cols.iter().map(|s| s.name().to_string()));
    Ok(Transferred {
        frame: frame.retain_columns(&cols)?,
        warnings,
    })
}

fn bound_column<'a>(cols: &[String], column: &'a str) -> Option<&'a str> {
    cols.iter().any(|c| c == column).then_some(column)
}

/// Row-major view of a frame for per-row host functions
struct RowTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    labels: Vec<usize>,
}

impl RowTable {
    fn new(frame: &DataFrame) -> DataResult<Self> {
        let series = frame.iter_columns().collect::<DataResult<Vec<_>>>()?;
        let rows = (0..frame.num_rows())
            .map(|r| series.iter().map(|s| s.get(r)).collect::<DataResult<Vec<_>>>())
            .collect::<DataResult<Vec<_>>>()?;
        let labels = row_labels(frame, &rows)?;
        Ok(Self {
            columns: frame.columns(),
            rows,
            labels,
        })
    }

    /// Evaluate `f` on every row; a failing row yields an empty string
    fn apply(
        &self,
        f: &CellFn,
        column: Option<&str>,
        function: &str,
        prefix: &str,
        config: &AccessorConfig,
        warnings: &mut Vec<String>,
    ) -> Option<Series> {
        let position = match column {
            Some(c) => Some(self.columns.iter().position(|n| n == c)?),
            None => None,
        };
        let call = |r: usize| -> Result<String, String> {
            let row = &self.rows[r];
            f(&CellArgs {
                value: position.map(|p| &row[p]),
                index: self.labels[r],
                columns: &self.columns,
                row,
                column,
            })
        };
        let results: Vec<Result<String, String>> = if self.rows.len() > config.parallel_threshold {
            (0..self.rows.len()).into_par_iter().map(call).collect()
        } else {
            (0..self.rows.len()).map(call).collect()
        };

        let failures = results.iter().filter(|r| r.is_err()).count();
        if let Some(Err(first)) = results.iter().find(|r| r.is_err()) {
            let message = format!(
                "Exception raised when calling user function {function}() on {failures} row(s): {first}"
            );
            warn!("{message}");
            warnings.push(message);
        }

        let name = match column {
            Some(c) => format!("{prefix}{c}__{function}"),
            None => function.to_string(),
        };
        let values = results
            .into_iter()
            .map(|r| Some(r.unwrap_or_default()))
            .collect();
        Some(Series::from_optional_strings(name, values))
    }
}

/// Row locators: the index column when present, positions otherwise
fn row_labels(frame: &DataFrame, rows: &[Vec<Value>]) -> DataResult<Vec<usize>> {
    let Ok(position) = frame.schema().index_of(INDEX_COL) else {
        return Ok((0..rows.len()).collect());
    };
    Ok(rows
        .iter()
        .enumerate()
        .map(|(i, row)| match row[position] {
            Value::Int(label) if label >= 0 => label as usize,
            _ => i,
        })
        .collect())
}

/// Format one datetime column as UTC ISO strings
fn date_strings(
    series: &Series,
    name: &str,
    tz_aware: bool,
    local: Tz,
    handle_nan: bool,
) -> DataResult<Series> {
    let missing = handle_nan.then(|| "NaT".to_string());
    let values = series
        .to_values()?
        .into_iter()
        .map(|value| match value {
            Value::Timestamp(micros) => to_utc(micros, tz_aware, local)
                .map(|dt| dt.format(WS_DATE_FORMAT).to_string())
                .or_else(|| missing.clone()),
            _ => missing.clone(),
        })
        .collect();
    Ok(Series::from_optional_strings(name, values))
}

fn to_utc(micros: i64, tz_aware: bool, local: Tz) -> Option<DateTime<Utc>> {
    let instant = DateTime::from_timestamp_micros(micros)?;
    if tz_aware {
        return Some(instant);
    }
    local
        .from_local_datetime(&instant.naive_utc())
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
