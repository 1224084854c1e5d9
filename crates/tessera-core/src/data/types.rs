//! Type mapping between Arrow data types and the dtype names sent to clients
//!
//! Clients understand pandas-style dtype strings (`int64`, `float64`,
//! `object`, `datetime64[ns, UTC]`, ...), so every Arrow type is described
//! with the closest such name.

use arrow::datatypes::{DataType as ArrowDataType, TimeUnit};

/// Semantic category of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Numeric,
    String,
    DateTime,
    Boolean,
    Categorical,
    Other,
}

impl ColumnKind {
    #[must_use]
    pub fn is_numeric(self) -> bool {
        self == ColumnKind::Numeric
    }
}

/// Semantic category of an Arrow data type
#[must_use]
pub fn column_kind(arrow_type: &ArrowDataType) -> ColumnKind {
    match arrow_type {
        ArrowDataType::Int8
        | ArrowDataType::Int16
        | ArrowDataType::Int32
        | ArrowDataType::Int64
        | ArrowDataType::UInt8
        | ArrowDataType::UInt16
        | ArrowDataType::UInt32
        | ArrowDataType::UInt64
        | ArrowDataType::Float16
        | ArrowDataType::Float32
        | ArrowDataType::Float64
        | ArrowDataType::Decimal128(_, _)
        | ArrowDataType::Decimal256(_, _) => ColumnKind::Numeric,
        ArrowDataType::Utf8 | ArrowDataType::LargeUtf8 | ArrowDataType::Utf8View => {
            ColumnKind::String
        }
        ArrowDataType::Boolean => ColumnKind::Boolean,
        ArrowDataType::Timestamp(_, _) | ArrowDataType::Date32 | ArrowDataType::Date64 => {
            ColumnKind::DateTime
        }
        ArrowDataType::Dictionary(_, _) => ColumnKind::Categorical,
        _ => ColumnKind::Other,
    }
}

fn unit_name(unit: TimeUnit) -> &'static str {
    match unit {
        TimeUnit::Second => "s",
        TimeUnit::Millisecond => "ms",
        TimeUnit::Microsecond => "us",
        TimeUnit::Nanosecond => "ns",
    }
}

/// Client-facing dtype name of an Arrow data type
#[must_use]
pub fn dtype_name(arrow_type: &ArrowDataType) -> String {
    match arrow_type {
        ArrowDataType::Int8 => "int8".to_string(),
        ArrowDataType::Int16 => "int16".to_string(),
        ArrowDataType::Int32 => "int32".to_string(),
        ArrowDataType::Int64 => "int64".to_string(),
        ArrowDataType::UInt8 => "uint8".to_string(),
        ArrowDataType::UInt16 => "uint16".to_string(),
        ArrowDataType::UInt32 => "uint32".to_string(),
        ArrowDataType::UInt64 => "uint64".to_string(),
        ArrowDataType::Float16 => "float16".to_string(),
        ArrowDataType::Float32 => "float32".to_string(),
        ArrowDataType::Float64 | ArrowDataType::Decimal128(_, _) | ArrowDataType::Decimal256(_, _) => {
            "float64".to_string()
        }
        ArrowDataType::Boolean => "bool".to_string(),
        ArrowDataType::Timestamp(unit, None) => format!("datetime64[{}]", unit_name(*unit)),
        ArrowDataType::Timestamp(unit, Some(tz)) => {
            format!("datetime64[{}, {}]", unit_name(*unit), tz)
        }
        ArrowDataType::Date32 | ArrowDataType::Date64 => "datetime64[ms]".to_string(),
        ArrowDataType::Dictionary(_, _) => "category".to_string(),
        _ => "object".to_string(),
    }
}

/// Whether a column of this type can be served to a table widget
///
/// Nested struct columns are the Arrow counterpart of multi-level headers.
#[must_use]
pub fn is_flat_type(arrow_type: &ArrowDataType) -> bool {
    !matches!(
        arrow_type,
        ArrowDataType::Struct(_) | ArrowDataType::Union(_, _) | ArrowDataType::Map(_, _)
    )
}
