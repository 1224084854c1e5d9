//! Row reduction for chart traces and the merge of several traces
//!
//! Every decimated output remembers the source row of each of its rows, so
//! traces reduced independently can be merged back on row position.

use tracing::{debug, warn};

use super::payload::{DecimatorPayload, DecimatorSpec};
use crate::data::{DataError, DataFrame, DataResult, Series, Value};
use crate::registry::FunctionRegistry;

/// Output of a decimator
#[derive(Debug, Clone)]
pub struct Decimated {
    /// Kept rows, restricted to the trace's axes
    pub frame: DataFrame,
    /// Source row position of each kept row
    pub rows: Vec<usize>,
    /// Whether the decimator reduced the data
    pub applied: bool,
    /// Whether a new table was materialised
    pub is_copied: bool,
}

impl Decimated {
    /// Copy of the axis columns, every row kept
    ///
    /// # Errors
    /// Returns error if the columns cannot be selected
    pub fn axes_only(frame: &DataFrame, spec: &DecimatorSpec) -> DataResult<Self> {
        Ok(Self {
            frame: frame.retain_columns(&spec.axes())?,
            rows: (0..frame.num_rows()).collect(),
            applied: false,
            is_copied: true,
        })
    }
}

/// A pluggable row-reduction strategy for large chart datasets
pub trait Decimator: Send + Sync {
    /// Row count above which the decimator runs; always runs when `None`
    fn threshold(&self) -> Option<usize> {
        None
    }

    /// Whether the decimator honours the chart's zoom window
    fn zoom(&self) -> bool {
        true
    }

    /// Select the points to keep
    ///
    /// `points` are `(x, y)` pairs in row order; the returned mask has one
    /// entry per point.
    fn decimate(&self, points: &[[f64; 2]], payload: &DecimatorPayload) -> Vec<bool>;

    /// Reduce one trace of `frame`
    ///
    /// Reads x/y as numbers (the row position stands in for a missing x
    /// column), restricts to the zoom window, then keeps the rows selected
    /// by [`Decimator::decimate`] when the row count exceeds the threshold.
    ///
    /// # Errors
    /// Returns error if the axes cannot be read
    fn on_decimate(
        &self,
        frame: &DataFrame,
        spec: &DecimatorSpec,
        payload: &DecimatorPayload,
        is_copied: bool,
    ) -> DataResult<Decimated> {
        decimate_trace(self, frame, spec, payload, is_copied)
    }
}

fn axis_values(frame: &DataFrame, name: &str) -> DataResult<Option<Vec<f64>>> {
    if !frame.has_column(name) {
        return Ok(None);
    }
    let values = frame.column(name)?.to_values()?;
    Ok(Some(
        values
            .iter()
            .map(|v| v.as_f64().unwrap_or(f64::NAN))
            .collect(),
    ))
}

fn decimate_trace<D: Decimator + ?Sized>(
    decimator: &D,
    frame: &DataFrame,
    spec: &DecimatorSpec,
    payload: &DecimatorPayload,
    is_copied: bool,
) -> DataResult<Decimated> {
    let ys = axis_values(frame, &spec.y_axis)?.ok_or_else(|| {
        DataError::ColumnNotFound(spec.y_axis.clone())
    })?;
    let xs_column = axis_values(frame, &spec.x_axis)?;
    let xs: Vec<f64> = match &xs_column {
        Some(xs) => xs.clone(),
        None => (0..frame.num_rows()).map(|i| i as f64).collect(),
    };

    let mut rows: Vec<usize> = (0..frame.num_rows()).collect();
    let mut is_copied = is_copied;
    if let (true, Some(window), Some(_)) = (decimator.zoom(), payload.zoom, &xs_column) {
        let (lo, hi) = if window.x0 <= window.x1 {
            (window.x0, window.x1)
        } else {
            (window.x1, window.x0)
        };
        rows.retain(|&r| xs[r] >= lo && xs[r] <= hi);
        is_copied = true;
    }

    let applied = decimator.threshold().map_or(true, |t| rows.len() > t);
    if applied {
        rows.retain(|&r| xs[r].is_finite() && ys[r].is_finite());
        let points: Vec<[f64; 2]> = rows.iter().map(|&r| [xs[r], ys[r]]).collect();
        let mask = decimator.decimate(&points, payload);
        rows = rows
            .into_iter()
            .zip(mask.into_iter().chain(std::iter::repeat(false)))
            .filter_map(|(row, keep)| keep.then_some(row))
            .collect();
        is_copied = true;
    }

    let frame = frame.take(&rows)?.retain_columns(&spec.axes())?;
    Ok(Decimated {
        frame,
        rows,
        applied,
        is_copied,
    })
}

/// Keeps the minimum and maximum y of every bucket of consecutive points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinMaxDecimator {
    /// Target number of points
    pub n_out: usize,
    pub threshold: Option<usize>,
}

impl MinMaxDecimator {
    #[must_use]
    pub fn new(n_out: usize) -> Self {
        Self {
            n_out,
            threshold: None,
        }
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

impl Decimator for MinMaxDecimator {
    fn threshold(&self) -> Option<usize> {
        self.threshold
    }

    fn decimate(&self, points: &[[f64; 2]], _payload: &DecimatorPayload) -> Vec<bool> {
        let n = points.len();
        let buckets = self.n_out / 2;
        if buckets == 0 || n <= self.n_out {
            return vec![true; n];
        }
        let mut mask = vec![false; n];
        for b in 0..buckets {
            let lo = b * n / buckets;
            let hi = ((b + 1) * n / buckets).min(n);
            if lo >= hi {
                continue;
            }
            let bucket = &points[lo..hi];
            let argmin = (0..bucket.len())
                .min_by(|&a, &c| bucket[a][1].total_cmp(&bucket[c][1]))
                .unwrap_or(0);
            let argmax = (0..bucket.len())
                .max_by(|&a, &c| bucket[a][1].total_cmp(&bucket[c][1]))
                .unwrap_or(0);
            mask[lo + argmin] = true;
            mask[lo + argmax] = true;
        }
        mask
    }
}

/// Largest-triangle-three-buckets downsampling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LttbDecimator {
    /// Target number of points
    pub n_out: usize,
    pub threshold: Option<usize>,
}

impl LttbDecimator {
    #[must_use]
    pub fn new(n_out: usize) -> Self {
        Self {
            n_out,
            threshold: None,
        }
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

impl Decimator for LttbDecimator {
    fn threshold(&self) -> Option<usize> {
        self.threshold
    }

    fn decimate(&self, points: &[[f64; 2]], _payload: &DecimatorPayload) -> Vec<bool> {
        let n = points.len();
        if self.n_out < 3 || n <= self.n_out {
            return vec![true; n];
        }
        let mut mask = vec![false; n];
        mask[0] = true;
        mask[n - 1] = true;

        let every = (n - 2) as f64 / (self.n_out - 2) as f64;
        let mut selected = 0usize;
        for bucket in 0..self.n_out - 2 {
            let start = (bucket as f64 * every) as usize + 1;
            let end = (((bucket + 1) as f64 * every) as usize + 1).min(n - 1);

            // average of the next bucket (the last point for the final one)
            let next_start = end;
            let next_end = (((bucket + 2) as f64 * every) as usize + 1).min(n);
            let next = &points[next_start..next_end.max(next_start + 1).min(n)];
            let avg_x = next.iter().map(|p| p[0]).sum::<f64>() / next.len() as f64;
            let avg_y = next.iter().map(|p| p[1]).sum::<f64>() / next.len() as f64;

            let [ax, ay] = points[selected];
            let mut best = start;
            let mut best_area = f64::NEG_INFINITY;
            for (i, [bx, by]) in points.iter().enumerate().take(end).skip(start) {
                let area = ((ax - avg_x) * (by - ay) - (ax - bx) * (avg_y - ay)).abs();
                if area > best_area {
                    best_area = area;
                    best = i;
                }
            }
            mask[best] = true;
            selected = best;
        }
        mask
    }
}

/// Merge decimated traces on source row position
///
/// Rows are the sorted union of every trace's rows; columns appear in
/// first-appearance order. A column shared by several traces takes, per
/// row, the first non-missing value in trace order.
///
/// # Errors
/// Returns error if a column cannot be rebuilt
pub fn merge(outputs: &[Decimated]) -> DataResult<Decimated> {
    let mut rows: Vec<usize> = outputs.iter().flat_map(|o| o.rows.iter().copied()).collect();
    rows.sort_unstable();
    rows.dedup();

    let mut names: Vec<String> = Vec::new();
    for output in outputs {
        for name in output.frame.columns() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }

    let mut columns = Vec::with_capacity(names.len());
    for name in &names {
        let mut values = vec![Value::Null; rows.len()];
        let mut data_type = None;
        for output in outputs.iter().filter(|o| o.frame.has_column(name)) {
            let series = output.frame.column(name)?;
            data_type.get_or_insert_with(|| series.data_type().clone());
            for (local, row) in output.rows.iter().enumerate() {
                let Ok(pos) = rows.binary_search(row) else {
                    continue;
                };
                if values[pos].is_missing() {
                    values[pos] = series.get(local)?;
                }
            }
        }
        let series = match &data_type {
            Some(dt) => Series::from_values_typed(name.as_str(), &values, dt)?,
            None => Series::from_values(name.as_str(), &values)?,
        };
        columns.push(series);
    }

    Ok(Decimated {
        frame: DataFrame::from_series(columns)?,
        rows,
        applied: outputs.iter().any(|o| o.applied),
        is_copied: true,
    })
}

/// Result of running every trace of a chart request
#[derive(Debug)]
pub struct TraceOutcome {
    /// The merged table, `None` when the request names no trace
    pub frame: Option<DataFrame>,
    pub is_copied: bool,
    pub warnings: Vec<String>,
}

/// Run each trace's decimator (or axis selection) and merge the results
///
/// Unknown or failing decimators are skipped with a warning. Each applied
/// decimator notifies `<var_name>.<decimator>.nb_rows`.
///
/// # Errors
/// Returns error if axis selection or the merge fails
pub fn apply_decimators(
    var_name: &str,
    frame: &DataFrame,
    payload: &DecimatorPayload,
    registry: &FunctionRegistry,
    is_copied: bool,
) -> DataResult<TraceOutcome> {
    let mut is_copied = is_copied;
    let mut warnings = Vec::new();
    let mut outputs = Vec::new();

    for spec in payload.decimators.iter().flatten() {
        let Some(name) = spec.decimator.as_deref() else {
            outputs.push(Decimated::axes_only(frame, spec)?);
            continue;
        };
        let Some(decimator) = registry.decimator(name) else {
            let message = format!("Decimator '{name}' is not registered.");
            warn!("{message}");
            warnings.push(message);
            continue;
        };
        match decimator.on_decimate(frame, spec, payload, is_copied) {
            Ok(decimated) => {
                is_copied = decimated.is_copied;
                if decimated.applied {
                    let rows = decimated.frame.num_rows() as i64;
                    registry.notify_change(&format!("{var_name}.{name}.nb_rows"), &Value::Int(rows));
                }
                debug!(decimator = name, rows = decimated.rows.len(), "decimated trace");
                outputs.push(decimated);
            }
            Err(e) => {
                let message = format!("Decimator '{name}' failed on {var_name}: {e}");
                warn!("{message}");
                warnings.push(message);
            }
        }
    }

    let frame = match outputs.len() {
        0 => None,
        1 => outputs.pop().map(|o| o.frame),
        _ => Some(merge(&outputs)?.frame),
    };
    Ok(TraceOutcome {
        frame,
        is_copied,
        warnings,
    })
}
