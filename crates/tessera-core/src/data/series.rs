//! Series: A single column of data backed by Arrow arrays

use std::fmt;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray,
    TimestampMicrosecondArray, UInt32Array,
};
use arrow::compute;
use arrow::datatypes::{
    DataType, Float16Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
    TimeUnit, TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use chrono::NaiveDateTime;

use super::error::{DataError, DataResult};
use super::types::{column_kind, dtype_name, ColumnKind};
use super::value::Value;

const MICROS_PER_DAY: i64 = 86_400_000_000;

/// A single column of homogeneous data backed by an Arrow array
#[derive(Clone)]
pub struct Series {
    /// Column name
    name: String,
    /// The underlying Arrow array (reference-counted for zero-copy)
    array: ArrayRef,
}

impl Series {
    /// Create a new Series from an Arrow array
    #[must_use]
    pub fn new(name: impl Into<String>, array: ArrayRef) -> Self {
        Self {
            name: name.into(),
            array,
        }
    }

    /// Create a Series from a vector of integers
    #[must_use]
    pub fn from_ints(name: impl Into<String>, values: Vec<i64>) -> Self {
        let array = Arc::new(Int64Array::from(values)) as ArrayRef;
        Self::new(name, array)
    }

    /// Create a Series from a vector of floats
    #[must_use]
    pub fn from_floats(name: impl Into<String>, values: Vec<f64>) -> Self {
        let array = Arc::new(Float64Array::from(values)) as ArrayRef;
        Self::new(name, array)
    }

    /// Create a Series from a vector of booleans
    #[must_use]
    pub fn from_bools(name: impl Into<String>, values: Vec<bool>) -> Self {
        let array = Arc::new(BooleanArray::from(values)) as ArrayRef;
        Self::new(name, array)
    }

    /// Create a Series from a vector of strings
    #[must_use]
    pub fn from_strings(name: impl Into<String>, values: Vec<&str>) -> Self {
        let array = Arc::new(StringArray::from(values)) as ArrayRef;
        Self::new(name, array)
    }

    /// Create a Series from a vector of optional integers
    #[must_use]
    pub fn from_optional_ints(name: impl Into<String>, values: Vec<Option<i64>>) -> Self {
        let array = Arc::new(Int64Array::from(values)) as ArrayRef;
        Self::new(name, array)
    }

    /// Create a Series from a vector of optional floats
    #[must_use]
    pub fn from_optional_floats(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        let array = Arc::new(Float64Array::from(values)) as ArrayRef;
        Self::new(name, array)
    }

    /// Create a Series from optional strings
    #[must_use]
    pub fn from_optional_strings(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        let array = Arc::new(StringArray::from(values)) as ArrayRef;
        Self::new(name, array)
    }

    /// Create a timestamp Series from microseconds since the epoch
    ///
    /// `tz` is the column timezone; `None` makes a naive (wall clock) column.
    #[must_use]
    pub fn from_timestamps(
        name: impl Into<String>,
        micros: Vec<Option<i64>>,
        tz: Option<&str>,
    ) -> Self {
        let array =
            TimestampMicrosecondArray::from(micros).with_timezone_opt(tz.map(Arc::<str>::from));
        Self::new(name, Arc::new(array) as ArrayRef)
    }

    /// Create a Series from a slice of Values
    ///
    /// The type is inferred from the non-null values; ints are widened to
    /// floats when both appear.
    ///
    /// # Errors
    /// Returns error if values have mixed, incompatible types
    pub fn from_values(name: impl Into<String>, values: &[Value]) -> DataResult<Self> {
        let mut has_int = false;
        let mut has_float = false;
        let mut first_other: Option<&Value> = None;

        for v in values {
            match v {
                Value::Null => {}
                Value::Int(_) => has_int = true,
                Value::Float(_) => has_float = true,
                other => {
                    if first_other.is_none() {
                        first_other = Some(other);
                    }
                }
            }
        }

        let target = match (first_other, has_int, has_float) {
            (None, _, true) => DataType::Float64,
            (None, true, false) => DataType::Int64,
            // All null values - default to Int64
            (None, false, false) => DataType::Int64,
            (Some(Value::Bool(_)), false, false) => DataType::Boolean,
            (Some(Value::String(_)), false, false) => DataType::Utf8,
            (Some(Value::Timestamp(_)), false, false) => {
                DataType::Timestamp(TimeUnit::Microsecond, None)
            }
            (Some(other), _, _) => {
                return Err(DataError::InvalidOperation(format!(
                    "cannot create Series from mixed {} and numeric values",
                    other.type_name()
                )));
            }
        };

        Self::from_values_typed(name, values, &target)
    }

    /// Create a Series of the given Arrow type from Values, casting each value
    ///
    /// # Errors
    /// Returns error if a value cannot be represented in the target type
    pub fn from_values_typed(
        name: impl Into<String>,
        values: &[Value],
        data_type: &DataType,
    ) -> DataResult<Self> {
        let canonical: ArrayRef = match column_kind(data_type) {
            ColumnKind::Numeric if is_integer_type(data_type) => {
                let ints = values
                    .iter()
                    .map(coerce_int)
                    .collect::<DataResult<Vec<_>>>()?;
                Arc::new(Int64Array::from(ints))
            }
            ColumnKind::Numeric => {
                let floats = values
                    .iter()
                    .map(coerce_float)
                    .collect::<DataResult<Vec<_>>>()?;
                Arc::new(Float64Array::from(floats))
            }
            ColumnKind::Boolean => {
                let bools = values
                    .iter()
                    .map(coerce_bool)
                    .collect::<DataResult<Vec<_>>>()?;
                Arc::new(BooleanArray::from(bools))
            }
            ColumnKind::DateTime => {
                let micros = values
                    .iter()
                    .map(coerce_timestamp)
                    .collect::<DataResult<Vec<_>>>()?;
                let tz = match data_type {
                    DataType::Timestamp(_, tz) => tz.clone(),
                    _ => None,
                };
                Arc::new(TimestampMicrosecondArray::from(micros).with_timezone_opt(tz))
            }
            ColumnKind::String | ColumnKind::Categorical | ColumnKind::Other => {
                let strings: Vec<Option<String>> = values
                    .iter()
                    .map(|v| match v {
                        Value::Null => None,
                        other => Some(other.to_string()),
                    })
                    .collect();
                Arc::new(StringArray::from(strings))
            }
        };

        let array = if canonical.data_type() == data_type {
            canonical
        } else {
            compute::cast(&canonical, data_type)?
        };
        Ok(Self::new(name, array))
    }

    /// Get the column name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.array.len()
    }

    /// Check if the series is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    /// Get the Arrow data type
    #[must_use]
    pub fn data_type(&self) -> &DataType {
        self.array.data_type()
    }

    /// Semantic category of the column
    #[must_use]
    pub fn kind(&self) -> ColumnKind {
        column_kind(self.data_type())
    }

    /// Client-facing dtype name
    #[must_use]
    pub fn dtype_name(&self) -> String {
        dtype_name(self.data_type())
    }

    /// Timezone of a timestamp column, if any
    #[must_use]
    pub fn timezone(&self) -> Option<&str> {
        match self.data_type() {
            DataType::Timestamp(_, Some(tz)) => Some(tz.as_ref()),
            _ => None,
        }
    }

    /// Get the underlying Arrow array
    #[must_use]
    pub fn array(&self) -> &ArrayRef {
        &self.array
    }

    /// Get the number of null values
    #[must_use]
    pub fn null_count(&self) -> usize {
        self.array.null_count()
    }

    /// Check if a value at index is null
    #[must_use]
    pub fn is_null(&self, index: usize) -> bool {
        self.array.is_null(index)
    }

    /// Get a value at the given index
    ///
    /// Timestamps and dates are returned as microseconds since the epoch.
    ///
    /// # Errors
    /// Returns error if index is out of bounds or the type has no cell representation
    pub fn get(&self, index: usize) -> DataResult<Value> {
        if index >= self.len() {
            return Err(DataError::OutOfBounds {
                index,
                length: self.len(),
            });
        }

        if self.is_null(index) {
            return Ok(Value::Null);
        }

        let arr = &self.array;
        let value = match arr.data_type() {
            DataType::Int8 => Value::Int(arr.as_primitive::<Int8Type>().value(index).into()),
            DataType::Int16 => Value::Int(arr.as_primitive::<Int16Type>().value(index).into()),
            DataType::Int32 => Value::Int(arr.as_primitive::<Int32Type>().value(index).into()),
            DataType::Int64 => Value::Int(arr.as_primitive::<Int64Type>().value(index)),
            DataType::UInt8 => Value::Int(arr.as_primitive::<UInt8Type>().value(index).into()),
            DataType::UInt16 => Value::Int(arr.as_primitive::<UInt16Type>().value(index).into()),
            DataType::UInt32 => Value::Int(arr.as_primitive::<UInt32Type>().value(index).into()),
            DataType::UInt64 => {
                let v = arr.as_primitive::<UInt64Type>().value(index);
                Value::Int(i64::try_from(v).map_err(|_| {
                    DataError::InvalidOperation(format!("value {v} does not fit in int64"))
                })?)
            }
            DataType::Float16 => {
                Value::Float(arr.as_primitive::<Float16Type>().value(index).to_f64())
            }
            DataType::Float32 => {
                Value::Float(arr.as_primitive::<Float32Type>().value(index).into())
            }
            DataType::Float64 => Value::Float(arr.as_primitive::<Float64Type>().value(index)),
            DataType::Boolean => Value::Bool(arr.as_boolean().value(index)),
            DataType::Utf8 => Value::string(arr.as_string::<i32>().value(index)),
            DataType::LargeUtf8 => Value::string(arr.as_string::<i64>().value(index)),
            DataType::Utf8View => Value::string(arr.as_string_view().value(index)),
            DataType::Timestamp(unit, _) => Value::Timestamp(match unit {
                TimeUnit::Second => {
                    arr.as_primitive::<TimestampSecondType>().value(index) * 1_000_000
                }
                TimeUnit::Millisecond => {
                    arr.as_primitive::<TimestampMillisecondType>().value(index) * 1_000
                }
                TimeUnit::Microsecond => arr.as_primitive::<TimestampMicrosecondType>().value(index),
                TimeUnit::Nanosecond => {
                    arr.as_primitive::<TimestampNanosecondType>().value(index) / 1_000
                }
            }),
            DataType::Date32 => Value::Timestamp(
                i64::from(arr.as_primitive::<arrow::datatypes::Date32Type>().value(index))
                    * MICROS_PER_DAY,
            ),
            DataType::Date64 => Value::Timestamp(
                arr.as_primitive::<arrow::datatypes::Date64Type>().value(index) * 1_000,
            ),
            DataType::Dictionary(_, _) | DataType::Decimal128(_, _) | DataType::Decimal256(_, _) => {
                let target = if self.kind() == ColumnKind::Numeric {
                    DataType::Float64
                } else {
                    DataType::Utf8
                };
                let single = compute::cast(&arr.slice(index, 1), &target)?;
                return Series::new(self.name.clone(), single).get(0);
            }
            other => {
                return Err(DataError::InvalidOperation(format!(
                    "cannot get value of type {other:?}"
                )))
            }
        };
        Ok(value)
    }

    /// Count non-null values
    #[must_use]
    pub fn count(&self) -> usize {
        self.len() - self.null_count()
    }

    /// Convert to a vector of Values
    ///
    /// # Errors
    /// Returns error if conversion fails
    pub fn to_values(&self) -> DataResult<Vec<Value>> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }

    /// Gather the rows at the given positions into a new Series
    ///
    /// # Errors
    /// Returns error if an index is out of bounds
    pub fn take(&self, indices: &UInt32Array) -> DataResult<Self> {
        let array = compute::take(self.array.as_ref(), indices, None)?;
        Ok(Self::new(self.name.clone(), array))
    }

    /// Contiguous slice of the Series (zero-copy)
    #[must_use]
    pub fn slice(&self, offset: usize, length: usize) -> Self {
        Self::new(self.name.clone(), self.array.slice(offset, length))
    }
}

fn is_integer_type(data_type: &DataType) -> bool {
    data_type.is_integer()
}

fn coerce_int(value: &Value) -> DataResult<Option<i64>> {
    match value {
        Value::Null => Ok(None),
        Value::Int(i) => Ok(Some(*i)),
        Value::Float(f) if f.is_nan() => Ok(None),
        Value::Float(f) => Ok(Some(*f as i64)),
        Value::Bool(b) => Ok(Some(i64::from(*b))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .or_else(|_| s.trim().parse::<f64>().map(|f| Some(f as i64)))
            .map_err(|_| mismatch("Int", value)),
        Value::Timestamp(_) => Err(mismatch("Int", value)),
    }
}

fn coerce_float(value: &Value) -> DataResult<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| mismatch("Float", value)),
        Value::Timestamp(_) => Err(mismatch("Float", value)),
        other => Ok(other.as_f64()),
    }
}

fn coerce_bool(value: &Value) -> DataResult<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        Value::Int(i) => Ok(Some(*i != 0)),
        Value::Float(f) => Ok(Some(*f != 0.0)),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" | "" => Ok(Some(false)),
            _ => Err(mismatch("Bool", value)),
        },
        Value::Timestamp(_) => Err(mismatch("Bool", value)),
    }
}

fn coerce_timestamp(value: &Value) -> DataResult<Option<i64>> {
    match value {
        Value::Null => Ok(None),
        Value::Timestamp(t) => Ok(Some(*t)),
        Value::Int(i) => Ok(Some(*i)),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => parse_naive_timestamp(s)
            .map(Some)
            .ok_or_else(|| mismatch("Timestamp", value)),
        _ => Err(mismatch("Timestamp", value)),
    }
}

/// Parse an ISO-8601 date or date-time without zone into epoch microseconds
#[must_use]
pub fn parse_naive_timestamp(text: &str) -> Option<i64> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|dt| dt.and_utc().timestamp_micros())
}

fn mismatch(expected: &str, found: &Value) -> DataError {
    DataError::TypeMismatch {
        expected: expected.to_string(),
        found: format!("{} ({found})", found.type_name()),
    }
}

impl fmt::Debug for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Series")
            .field("name", &self.name)
            .field("dtype", &self.dtype_name())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_creation() {
        let s = Series::from_ints("numbers", vec![1, 2, 3]);
        assert_eq!(s.name(), "numbers");
        assert_eq!(s.len(), 3);
        assert_eq!(s.dtype_name(), "int64");
        assert_eq!(s.get(1).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_get_out_of_bounds() {
        let s = Series::from_ints("n", vec![1]);
        assert!(matches!(s.get(5), Err(DataError::OutOfBounds { index: 5, length: 1 })));
    }

    #[test]
    fn test_get_wide_and_narrow_numbers() {
        use arrow::array::UInt64Array;

        let floats: ArrayRef = Arc::new(Float64Array::from(vec![1.5]));
        let halves = Series::new("h", compute::cast(&floats, &DataType::Float16).unwrap());
        assert_eq!(halves.get(0).unwrap(), Value::Float(1.5));

        let big = Series::new("u", Arc::new(UInt64Array::from(vec![7, u64::MAX])));
        assert_eq!(big.get(0).unwrap(), Value::Int(7));
        assert!(matches!(big.get(1), Err(DataError::InvalidOperation(_))));
    }

    #[test]
    fn test_from_values_widens_ints() {
        let s = Series::from_values("x", &[Value::Int(1), Value::Float(2.5), Value::Null]).unwrap();
        assert_eq!(s.data_type(), &DataType::Float64);
        assert_eq!(s.get(0).unwrap(), Value::Float(1.0));
        assert_eq!(s.get(2).unwrap(), Value::Null);
    }

    #[test]
    fn test_from_values_mixed_fails() {
        let result = Series::from_values("x", &[Value::Int(1), Value::string("a")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_values_typed_keeps_dtype() {
        let s = Series::from_values_typed(
            "x",
            &[Value::Int(1), Value::string("7")],
            &DataType::Int32,
        )
        .unwrap();
        assert_eq!(s.data_type(), &DataType::Int32);
        assert_eq!(s.get(1).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_timestamps() {
        let s = Series::from_timestamps("t", vec![Some(1_000_000), None], Some("UTC"));
        assert_eq!(s.kind(), ColumnKind::DateTime);
        assert_eq!(s.timezone(), Some("UTC"));
        assert_eq!(s.get(0).unwrap(), Value::Timestamp(1_000_000));
        assert_eq!(s.get(1).unwrap(), Value::Null);
    }

    #[test]
    fn test_parse_naive_timestamp() {
        assert_eq!(parse_naive_timestamp("1970-01-01T00:00:01"), Some(1_000_000));
        assert_eq!(parse_naive_timestamp("1970-01-02"), Some(MICROS_PER_DAY));
        assert_eq!(parse_naive_timestamp("yesterday"), None);
    }

    #[test]
    fn test_take() {
        let s = Series::from_strings("s", vec!["a", "b", "c"]);
        let taken = s.take(&UInt32Array::from(vec![2, 0])).unwrap();
        assert_eq!(taken.to_values().unwrap(), vec![Value::string("c"), Value::string("a")]);
    }
}
