//! CSV input and output for DataFrames
//!
//! The CLI loads its tables here; exports go through [`write_csv_to`].

use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use arrow_csv::reader::Format;
use arrow_csv::{ReaderBuilder, WriterBuilder};

use super::dataframe::DataFrame;
use super::error::{DataError, DataResult};

/// Rows sampled to infer column types
const SCHEMA_INFERENCE_ROWS: usize = 100;

fn open(path: &Path) -> DataResult<File> {
    File::open(path)
        .map_err(|e| DataError::Io(format!("failed to open file '{}': {e}", path.display())))
}

/// Read a comma-separated file with a header row
///
/// # Errors
/// Returns error if the file cannot be read or is not valid CSV
pub fn read_csv<P: AsRef<Path>>(path: P) -> DataResult<DataFrame> {
    let mut file = open(path.as_ref())?;
    let format = Format::default().with_header(true);
    let (schema, _) = format
        .infer_schema(BufReader::new(&file), Some(SCHEMA_INFERENCE_ROWS))
        .map_err(|e| DataError::Csv(format!("failed to infer schema: {e}")))?;
    file.seek(SeekFrom::Start(0))?;

    let schema = Arc::new(schema);
    let batches = ReaderBuilder::new(schema.clone())
        .with_format(format)
        .build(BufReader::new(file))
        .map_err(|e| DataError::Csv(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| DataError::Csv(format!("failed to read rows: {e}")))?;
    DataFrame::from_batches(schema, batches)
}

/// Write a table with a header row to a new file
///
/// # Errors
/// Returns error if the file cannot be written
pub fn write_csv<P: AsRef<Path>>(df: &DataFrame, path: P) -> DataResult<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .map_err(|e| DataError::Io(format!("failed to create file '{}': {e}", path.display())))?;
    write_csv_to(df, BufWriter::new(file))
}

/// Write a table with a header row into any writer
///
/// # Errors
/// Returns error if writing fails
pub fn write_csv_to<W: Write>(df: &DataFrame, writer: W) -> DataResult<()> {
    let mut writer = WriterBuilder::new().with_header(true).build(writer);
    for batch in df.batches() {
        writer
            .write(batch)
            .map_err(|e| DataError::Csv(format!("failed to write rows: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Series, Value};

    #[test]
    fn test_csv_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.csv");

        let df = DataFrame::from_series(vec![
            Series::from_strings("name", vec!["Alice", "Bob"]),
            Series::from_ints("age", vec![30, 25]),
        ])
        .unwrap();
        write_csv(&df, &path).unwrap();

        let back = read_csv(&path).unwrap();
        assert_eq!(back.columns(), vec!["name", "age"]);
        assert_eq!(back.num_rows(), 2);
        assert_eq!(back.column("age").unwrap().get(1).unwrap(), Value::Int(25));
    }

    #[test]
    fn test_write_to_buffer() {
        let df = DataFrame::from_series(vec![Series::from_ints("n", vec![1, 2])]).unwrap();
        let mut out = Vec::new();
        write_csv_to(&df, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "n\n1\n2\n");
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_csv("/definitely/not/here.csv");
        assert!(matches!(result, Err(DataError::Io(_))));
    }
}
