//! Page encoding: JSON records, JSON column lists or an Arrow IPC stream

use serde_json::Map;

use super::payload::{DataFormat, Orient, PageData, PageValue};
use crate::data::{DataError, DataFrame, DataResult};

/// Metadata attached to an encoded page
#[derive(Debug, Clone, Copy)]
pub struct FormatOptions {
    pub format: DataFormat,
    pub orient: Orient,
    pub start: Option<usize>,
    pub rowcount: Option<usize>,
    /// Reported only when it differs from `rowcount`
    pub fullrowcount: Option<usize>,
    pub data_extraction: Option<bool>,
}

impl FormatOptions {
    #[must_use]
    pub fn new(format: DataFormat, orient: Orient) -> Self {
        Self {
            format,
            orient,
            start: None,
            rowcount: None,
            fullrowcount: None,
            data_extraction: None,
        }
    }
}

/// Encode a transferred table into the `value` block of a response
///
/// # Errors
/// Returns `Unsupported` for CSV, or for Arrow when the `arrow-stream`
/// feature is disabled, and `Arrow` if the stream cannot be written
pub fn format_data(frame: &DataFrame, options: &FormatOptions) -> DataResult<PageValue> {
    let mut value = PageValue {
        format: Some(options.format),
        rowcount: options.rowcount,
        fullrowcount: options.fullrowcount.filter(|&n| Some(n) != options.rowcount),
        start: options.start,
        data_extraction: options.data_extraction,
        ..PageValue::default()
    };
    match options.format {
        DataFormat::Json => value.data = Some(PageData::Json(to_json(frame, options.orient)?)),
        DataFormat::ApacheArrow => {
            value.data = Some(PageData::Arrow(to_arrow_stream(frame)?));
            value.orient = Some(options.orient);
        }
        DataFormat::Csv => {
            return Err(DataError::Unsupported(
                "CSV output is written to a file, not encoded in a page".to_string(),
            ))
        }
    }
    Ok(value)
}

/// JSON rendering of a table; missing and non-finite cells become `null`
///
/// # Errors
/// Returns error if a column cannot be read
pub fn to_json(frame: &DataFrame, orient: Orient) -> DataResult<serde_json::Value> {
    let columns = frame.iter_columns().collect::<DataResult<Vec<_>>>()?;
    let values = columns
        .iter()
        .map(|s| s.to_values())
        .collect::<DataResult<Vec<_>>>()?;

    Ok(match orient {
        Orient::List => serde_json::Value::Object(
            columns
                .iter()
                .zip(&values)
                .map(|(s, cells)| {
                    let cells = cells.iter().map(crate::data::Value::to_json).collect();
                    (s.name().to_string(), serde_json::Value::Array(cells))
                })
                .collect(),
        ),
        Orient::Records => serde_json::Value::Array(
            (0..frame.num_rows())
                .map(|row| {
                    let record: Map<String, serde_json::Value> = columns
                        .iter()
                        .zip(&values)
                        .map(|(s, cells)| (s.name().to_string(), cells[row].to_json()))
                        .collect();
                    serde_json::Value::Object(record)
                })
                .collect(),
        ),
    })
}

/// Encode a table as an Arrow IPC stream
///
/// # Errors
/// Returns `Arrow` if writing fails
#[cfg(feature = "arrow-stream")]
pub fn to_arrow_stream(frame: &DataFrame) -> DataResult<Vec<u8>> {
    use arrow_ipc::writer::StreamWriter;

    let mut buffer = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut buffer, frame.schema().as_ref())?;
        for batch in frame.batches() {
            writer.write(batch)?;
        }
        writer.finish()?;
    }
    Ok(buffer)
}

/// Arrow output needs the `arrow-stream` feature
///
/// # Errors
/// Always returns `Unsupported`
#[cfg(not(feature = "arrow-stream"))]
pub fn to_arrow_stream(_frame: &DataFrame) -> DataResult<Vec<u8>> {
    Err(DataError::Unsupported(
        "Arrow output requires the arrow-stream feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Series;
    use serde_json::json;

    fn frame() -> DataFrame {
        DataFrame::from_series(vec![
            Series::from_strings("name", vec!["a", "b"]),
            Series::from_optional_floats("score", vec![Some(1.5), Some(f64::NAN)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_records() {
        let mut options = FormatOptions::new(DataFormat::Json, Orient::Records);
        options.start = Some(10);
        options.rowcount = Some(2);
        options.fullrowcount = Some(2);
        let value = format_data(&frame(), &options).unwrap();
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({
                "format": "JSON",
                "rowcount": 2,
                "start": 10,
                "data": [{"name": "a", "score": 1.5}, {"name": "b", "score": null}]
            })
        );
    }

    #[test]
    fn test_column_lists() {
        let mut options = FormatOptions::new(DataFormat::Json, Orient::List);
        options.data_extraction = Some(true);
        options.rowcount = Some(2);
        options.fullrowcount = Some(5);
        let value = format_data(&frame(), &options).unwrap();
        assert_eq!(value.fullrowcount, Some(5));
        assert_eq!(value.orient, None);
        assert_eq!(
            serde_json::to_value(value.data.unwrap()).unwrap(),
            json!({"name": ["a", "b"], "score": [1.5, null]})
        );
    }

    #[test]
    fn test_csv_is_not_a_page_format() {
        let options = FormatOptions::new(DataFormat::Csv, Orient::Records);
        assert!(matches!(
            format_data(&frame(), &options),
            Err(DataError::Unsupported(_))
        ));
    }

    #[cfg(feature = "arrow-stream")]
    #[test]
    fn test_arrow_stream_round_trips() {
        use arrow_ipc::reader::StreamReader;

        let options = FormatOptions::new(DataFormat::ApacheArrow, Orient::Records);
        let value = format_data(&frame(), &options).unwrap();
        assert_eq!(value.orient, Some(Orient::Records));
        let Some(PageData::Arrow(bytes)) = value.data else {
            panic!("expected arrow bytes");
        };
        let reader = StreamReader::try_new(std::io::Cursor::new(bytes), None).unwrap();
        let rows: usize = reader.map(|b| b.unwrap().num_rows()).sum();
        assert_eq!(rows, 2);
    }
}
