//! Group-by aggregation of paged tables

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::data::{DataError, DataFrame, DataResult, Series, Value};
use crate::registry::{AggregateFn, FunctionRegistry};

/// Built-in aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggOp {
    /// Count of non-missing values
    Count,
    Sum,
    Mean,
    Median,
    Min,
    Max,
    /// Sample standard deviation
    Std,
    /// First non-missing value
    First,
    /// Last non-missing value
    Last,
}

impl AggOp {
    pub const ALL: [AggOp; 9] = [
        AggOp::Count,
        AggOp::Sum,
        AggOp::Mean,
        AggOp::Median,
        AggOp::Min,
        AggOp::Max,
        AggOp::Std,
        AggOp::First,
        AggOp::Last,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            AggOp::Count => "count",
            AggOp::Sum => "sum",
            AggOp::Mean => "mean",
            AggOp::Median => "median",
            AggOp::Min => "min",
            AggOp::Max => "max",
            AggOp::Std => "std",
            AggOp::First => "first",
            AggOp::Last => "last",
        }
    }

    /// Whether the result keeps the source column's type
    fn keeps_type(self) -> bool {
        matches!(self, AggOp::Min | AggOp::Max | AggOp::First | AggOp::Last)
    }
}

impl FromStr for AggOp {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AggOp::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| DataError::InvalidArgument(format!("unknown aggregate '{s}'")))
    }
}

impl fmt::Display for AggOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A built-in or host aggregate
#[derive(Clone)]
enum Aggregator {
    Builtin(AggOp),
    Host(String, AggregateFn),
}

impl Aggregator {
    fn resolve(name: &str, registry: &FunctionRegistry) -> DataResult<Self> {
        if let Ok(op) = name.parse::<AggOp>() {
            return Ok(Aggregator::Builtin(op));
        }
        registry
            .aggregate(name)
            .map(|f| Aggregator::Host(name.to_string(), f.clone()))
            .ok_or_else(|| DataError::InvalidArgument(format!("unknown aggregate function '{name}'")))
    }

    fn apply(&self, values: &[Value]) -> DataResult<Value> {
        match self {
            Aggregator::Builtin(op) => compute(*op, values),
            Aggregator::Host(name, f) => f(values).map_err(|e| {
                DataError::InvalidOperation(format!("aggregate function {name}() failed: {e}"))
            }),
        }
    }

    fn keeps_type(&self) -> bool {
        matches!(self, Aggregator::Builtin(op) if op.keeps_type())
    }
}

/// Hashable, ordered group key component
#[derive(Debug, Clone, PartialEq)]
enum GroupKey {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(i64),
}

impl GroupKey {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Float(f) if f.is_nan() => None,
            Value::Bool(b) => Some(GroupKey::Bool(b)),
            Value::Int(i) => Some(GroupKey::Int(i)),
            Value::Float(f) => Some(GroupKey::Float(f)),
            Value::String(s) => Some(GroupKey::String(s)),
            Value::Timestamp(t) => Some(GroupKey::Timestamp(t)),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            GroupKey::Bool(b) => Value::Bool(*b),
            GroupKey::Int(i) => Value::Int(*i),
            GroupKey::Float(f) => Value::Float(*f),
            GroupKey::String(s) => Value::String(s.clone()),
            GroupKey::Timestamp(t) => Value::Timestamp(*t),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            GroupKey::Bool(_) => 0,
            GroupKey::Int(_) | GroupKey::Float(_) => 1,
            GroupKey::Timestamp(_) => 2,
            GroupKey::String(_) => 3,
        }
    }
}

impl Eq for GroupKey {}

impl std::hash::Hash for GroupKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            GroupKey::Bool(b) => (0u8, b).hash(state),
            GroupKey::Int(i) => (1u8, i).hash(state),
            GroupKey::Float(f) => (2u8, f.to_bits()).hash(state),
            GroupKey::String(s) => (3u8, s).hash(state),
            GroupKey::Timestamp(t) => (4u8, t).hash(state),
        }
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (GroupKey::Bool(a), GroupKey::Bool(b)) => a.cmp(b),
            (GroupKey::Int(a), GroupKey::Int(b)) => a.cmp(b),
            (GroupKey::Float(a), GroupKey::Float(b)) => a.total_cmp(b),
            (GroupKey::Int(a), GroupKey::Float(b)) => (*a as f64).total_cmp(b),
            (GroupKey::Float(a), GroupKey::Int(b)) => a.total_cmp(&(*b as f64)),
            (GroupKey::String(a), GroupKey::String(b)) => a.cmp(b),
            (GroupKey::Timestamp(a), GroupKey::Timestamp(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Group `frame` by `group_by` and reduce every other column
///
/// `applies` maps columns to aggregate names; unlisted columns use
/// `first`. Key columns hold their key value, groups come out in sorted key
/// order and rows with a missing key are dropped.
///
/// # Errors
/// Returns error for unknown columns or functions, or a failing aggregate
pub fn aggregate(
    frame: &DataFrame,
    group_by: &[String],
    applies: &[(String, String)],
    registry: &FunctionRegistry,
) -> DataResult<DataFrame> {
    if group_by.is_empty() {
        return Err(DataError::InvalidArgument(
            "aggregation needs at least one group-by column".to_string(),
        ));
    }
    let key_columns = group_by
        .iter()
        .map(|name| frame.column(name))
        .collect::<DataResult<Vec<Series>>>()?;

    let mut aggregators: HashMap<&str, Aggregator> = HashMap::new();
    for (column, function) in applies {
        if !frame.has_column(column) {
            return Err(DataError::ColumnNotFound(column.clone()));
        }
        aggregators.insert(column.as_str(), Aggregator::resolve(function, registry)?);
    }

    let groups = build_groups(&key_columns, frame.num_rows())?;
    let mut sorted: Vec<(&Vec<GroupKey>, &Vec<usize>)> = groups.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let first = Aggregator::Builtin(AggOp::First);
    let mut output = Vec::with_capacity(frame.num_columns());
    for column in frame.iter_columns() {
        let column = column?;
        let series = if let Some(k) = group_by.iter().position(|g| g == column.name()) {
            let keys: Vec<Value> = sorted.iter().map(|(key, _)| key[k].to_value()).collect();
            Series::from_values_typed(column.name(), &keys, column.data_type())?
        } else {
            let aggregator = aggregators.get(column.name()).unwrap_or(&first);
            let cells = column.to_values()?;
            let reduced = sorted
                .iter()
                .map(|(_, rows)| {
                    let group: Vec<Value> = rows.iter().map(|&r| cells[r].clone()).collect();
                    aggregator.apply(&group)
                })
                .collect::<DataResult<Vec<_>>>()?;
            if aggregator.keeps_type() {
                Series::from_values_typed(column.name(), &reduced, column.data_type())?
            } else {
                Series::from_values(column.name(), &reduced)?
            }
        };
        output.push(series);
    }

    debug!(groups = sorted.len(), keys = ?group_by, "aggregated table");
    DataFrame::from_series(output)
}

fn build_groups(
    key_columns: &[Series],
    num_rows: usize,
) -> DataResult<HashMap<Vec<GroupKey>, Vec<usize>>> {
    let mut groups: HashMap<Vec<GroupKey>, Vec<usize>> = HashMap::new();
    'rows: for row in 0..num_rows {
        let mut key = Vec::with_capacity(key_columns.len());
        for column in key_columns {
            match GroupKey::from_value(column.get(row)?) {
                Some(k) => key.push(k),
                None => continue 'rows,
            }
        }
        groups.entry(key).or_default().push(row);
    }
    Ok(groups)
}

fn present(values: &[Value]) -> impl Iterator<Item = &Value> {
    values.iter().filter(|v| !v.is_missing())
}

fn numbers(op: AggOp, values: &[Value]) -> DataResult<Vec<f64>> {
    present(values)
        .map(|v| match v {
            Value::Int(_) | Value::Float(_) | Value::Bool(_) => v.as_f64().ok_or_else(|| {
                DataError::InvalidOperation(format!("cannot {op} value {v}"))
            }),
            other => Err(DataError::InvalidOperation(format!(
                "cannot compute {op} of non-numeric value: {}",
                other.type_name()
            ))),
        })
        .collect()
}

/// Apply one built-in aggregate to the values of a group
///
/// # Errors
/// Returns error when a numeric aggregate meets non-numeric values
pub fn compute(op: AggOp, values: &[Value]) -> DataResult<Value> {
    match op {
        AggOp::Count => Ok(Value::Int(present(values).count() as i64)),
        AggOp::Sum => {
            if present(values).all(|v| matches!(v, Value::Int(_) | Value::Bool(_))) {
                Ok(Value::Int(
                    present(values)
                        .map(|v| match v {
                            Value::Int(i) => *i,
                            Value::Bool(b) => i64::from(*b),
                            _ => 0,
                        })
                        .sum(),
                ))
            } else {
                Ok(Value::Float(numbers(op, values)?.iter().sum()))
            }
        }
        AggOp::Mean => {
            let nums = numbers(op, values)?;
            if nums.is_empty() {
                return Ok(Value::Null);
            }
            Ok(Value::Float(nums.iter().sum::<f64>() / nums.len() as f64))
        }
        AggOp::Median => {
            let mut nums = numbers(op, values)?;
            if nums.is_empty() {
                return Ok(Value::Null);
            }
            nums.sort_by(f64::total_cmp);
            let mid = nums.len() / 2;
            if nums.len() % 2 == 0 {
                Ok(Value::Float((nums[mid - 1] + nums[mid]) / 2.0))
            } else {
                Ok(Value::Float(nums[mid]))
            }
        }
        AggOp::Std => {
            let nums = numbers(op, values)?;
            if nums.len() < 2 {
                return Ok(Value::Null);
            }
            let n = nums.len() as f64;
            let mean = nums.iter().sum::<f64>() / n;
            let variance = nums.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
            Ok(Value::Float(variance.sqrt()))
        }
        AggOp::Min | AggOp::Max => {
            let mut best: Option<&Value> = None;
            for v in present(values) {
                let Some(current) = best else {
                    best = Some(v);
                    continue;
                };
                let ordering = v.compare(current).ok_or_else(|| {
                    DataError::InvalidOperation(format!(
                        "cannot compare {} with {}",
                        v.type_name(),
                        current.type_name()
                    ))
                })?;
                let better = if op == AggOp::Min {
                    ordering == Ordering::Less
                } else {
                    ordering == Ordering::Greater
                };
                if better {
                    best = Some(v);
                }
            }
            Ok(best.cloned().unwrap_or(Value::Null))
        }
        AggOp::First => Ok(present(values).next().cloned().unwrap_or(Value::Null)),
        AggOp::Last => Ok(present(values).last().cloned().unwrap_or(Value::Null)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff() -> DataFrame {
        DataFrame::from_series(vec![
            Series::from_strings("dept", vec!["eng", "ops", "eng", "ops", "hr"]),
            Series::from_strings("name", vec!["ann", "bo", "cy", "di", "ed"]),
            Series::from_floats("salary", vec![100.0, 60.0, 120.0, 80.0, 70.0]),
            Series::from_ints("age", vec![30, 40, 50, 20, 35]),
        ])
        .unwrap()
    }

    fn applies(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(a, b)| ((*a).to_string(), (*b).to_string()))
            .collect()
    }

    #[test]
    fn test_mean_by_dept() {
        let out = aggregate(
            &staff(),
            &["dept".to_string()],
            &applies(&[("salary", "mean")]),
            &FunctionRegistry::default(),
        )
        .unwrap();
        assert_eq!(out.num_rows(), 3);
        assert_eq!(out.columns(), vec!["dept", "name", "salary", "age"]);
        let depts = out.column("dept").unwrap().to_values().unwrap();
        assert_eq!(
            depts,
            vec![Value::string("eng"), Value::string("hr"), Value::string("ops")]
        );
        let salary = out.column("salary").unwrap().to_values().unwrap();
        assert_eq!(
            salary,
            vec![Value::Float(110.0), Value::Float(70.0), Value::Float(70.0)]
        );
        // unlisted columns take the first value of the group
        assert_eq!(out.column("name").unwrap().get(0).unwrap(), Value::string("ann"));
        assert_eq!(out.column("age").unwrap().get(2).unwrap(), Value::Int(40));
    }

    #[test]
    fn test_builtins() {
        let values = vec![Value::Int(2), Value::Null, Value::Int(4), Value::Int(9)];
        assert_eq!(compute(AggOp::Count, &values).unwrap(), Value::Int(3));
        assert_eq!(compute(AggOp::Sum, &values).unwrap(), Value::Int(15));
        assert_eq!(compute(AggOp::Mean, &values).unwrap(), Value::Float(5.0));
        assert_eq!(compute(AggOp::Median, &values).unwrap(), Value::Float(4.0));
        assert_eq!(compute(AggOp::Min, &values).unwrap(), Value::Int(2));
        assert_eq!(compute(AggOp::Max, &values).unwrap(), Value::Int(9));
        assert_eq!(compute(AggOp::First, &values).unwrap(), Value::Int(2));
        assert_eq!(compute(AggOp::Last, &values).unwrap(), Value::Int(9));
        let std = compute(AggOp::Std, &values).unwrap().as_f64().unwrap();
        assert!((std - 3.605_551_275).abs() < 1e-6);
        assert_eq!(compute(AggOp::Std, &[Value::Int(1)]).unwrap(), Value::Null);
    }

    #[test]
    fn test_host_aggregate() {
        let registry = FunctionRegistry::builder()
            .aggregate("spread", |values| {
                let nums: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
                let max = nums.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let min = nums.iter().copied().fold(f64::INFINITY, f64::min);
                Ok(Value::Float(max - min))
            })
            .build();
        let out = aggregate(
            &staff(),
            &["dept".to_string()],
            &applies(&[("age", "spread")]),
            &registry,
        )
        .unwrap();
        assert_eq!(out.column("age").unwrap().get(0).unwrap(), Value::Float(20.0));
    }

    #[test]
    fn test_failures() {
        let registry = FunctionRegistry::default();
        let df = staff();
        assert!(aggregate(&df, &[], &[], &registry).is_err());
        assert!(aggregate(&df, &["ghost".to_string()], &[], &registry).is_err());
        assert!(aggregate(&df, &["dept".to_string()], &applies(&[("age", "mode")]), &registry).is_err());
        assert!(aggregate(&df, &["dept".to_string()], &applies(&[("name", "mean")]), &registry).is_err());
    }

    #[test]
    fn test_missing_keys_dropped() {
        let df = DataFrame::from_series(vec![
            Series::from_optional_strings("k", vec![Some("a".into()), None, Some("a".into())]),
            Series::from_ints("v", vec![1, 2, 3]),
        ])
        .unwrap();
        let out = aggregate(
            &df,
            &["k".to_string()],
            &applies(&[("v", "sum")]),
            &FunctionRegistry::default(),
        )
        .unwrap();
        assert_eq!(out.num_rows(), 1);
        assert_eq!(out.column("v").unwrap().get(0).unwrap(), Value::Int(4));
    }
}
