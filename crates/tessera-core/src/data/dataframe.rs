//! DataFrame: A columnar data structure backed by Apache Arrow

use std::fmt;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, RecordBatch, UInt32Array};
use arrow::compute::{
    concat_batches, filter_record_batch, lexsort_to_indices, SortColumn, SortOptions,
};
use arrow::datatypes::{Field, Schema, SchemaRef};

use super::error::{DataError, DataResult};
use super::series::Series;
use super::types::is_flat_type;
use super::value::Value;

/// A DataFrame is a two-dimensional, column-oriented data structure
/// backed by Apache Arrow.
///
/// Arrow arrays are immutable: every operation returns a new DataFrame and
/// leaves `self` untouched, so a frame handed out by the host can be shared
/// freely between requests.
#[derive(Clone)]
pub struct DataFrame {
    /// The Arrow schema (column names and types)
    schema: SchemaRef,
    /// The data as Arrow RecordBatches
    batches: Vec<RecordBatch>,
}

impl DataFrame {
    /// Create an empty DataFrame with a schema
    #[must_use]
    pub fn empty(schema: SchemaRef) -> Self {
        Self {
            schema,
            batches: Vec::new(),
        }
    }

    /// Create a DataFrame from a single RecordBatch
    #[must_use]
    pub fn from_batch(batch: RecordBatch) -> Self {
        let schema = batch.schema();
        Self {
            schema,
            batches: vec![batch],
        }
    }

    /// Create a DataFrame from multiple RecordBatches
    ///
    /// # Errors
    /// Returns error if batches have incompatible schemas
    pub fn from_batches(schema: SchemaRef, batches: Vec<RecordBatch>) -> DataResult<Self> {
        for (i, batch) in batches.iter().enumerate() {
            if batch.schema() != schema {
                return Err(DataError::SchemaMismatch(format!(
                    "batch {i} has incompatible schema"
                )));
            }
        }
        Ok(Self { schema, batches })
    }

    /// Create a DataFrame from a vector of Series
    ///
    /// # Errors
    /// Returns error if series have different lengths or duplicate names
    pub fn from_series(columns: Vec<Series>) -> DataResult<Self> {
        if columns.is_empty() {
            let schema = Arc::new(Schema::empty());
            return Ok(Self::empty(schema));
        }

        let len = columns[0].len();
        for (i, col) in columns.iter().enumerate() {
            if col.len() != len {
                return Err(DataError::SchemaMismatch(format!(
                    "column '{}' has {} rows, expected {}",
                    col.name(),
                    col.len(),
                    len
                )));
            }
            if columns[..i].iter().any(|c| c.name() == col.name()) {
                return Err(DataError::SchemaMismatch(format!(
                    "duplicate column name '{}'",
                    col.name()
                )));
            }
        }

        let fields: Vec<Field> = columns
            .iter()
            .map(|s| Field::new(s.name(), s.data_type().clone(), true))
            .collect();
        let schema = Arc::new(Schema::new(fields));
        let arrays = columns.iter().map(|s| s.array().clone()).collect();
        let batch = RecordBatch::try_new(schema.clone(), arrays)?;

        Ok(Self {
            schema,
            batches: vec![batch],
        })
    }

    /// Get the schema
    #[must_use]
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Get column names
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Check whether a column exists
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.schema.index_of(name).is_ok()
    }

    /// Get the number of columns
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.schema.fields().len()
    }

    /// Get the number of rows
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Check if the DataFrame is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Whether every column is flat (no nested struct/map columns)
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.schema
            .fields()
            .iter()
            .all(|f| is_flat_type(f.data_type()))
    }

    /// Get a column by name as a Series
    ///
    /// # Errors
    /// Returns error if column not found
    pub fn column(&self, name: &str) -> DataResult<Series> {
        let idx = self
            .schema
            .index_of(name)
            .map_err(|_| DataError::ColumnNotFound(name.to_string()))?;
        self.column_by_index(idx)
    }

    /// Get a column by index as a Series
    ///
    /// # Errors
    /// Returns error if index is out of bounds
    pub fn column_by_index(&self, index: usize) -> DataResult<Series> {
        if index >= self.num_columns() {
            return Err(DataError::InvalidColumnIndex(index));
        }

        let field = self.schema.field(index);
        let name = field.name().clone();

        if self.batches.is_empty() {
            let array = arrow::array::new_empty_array(field.data_type());
            return Ok(Series::new(name, array));
        }

        if self.batches.len() == 1 {
            let array = self.batches[0].column(index).clone();
            return Ok(Series::new(name, array));
        }

        // Multiple batches - need to concatenate
        let arrays: Vec<_> = self
            .batches
            .iter()
            .map(|b| b.column(index).as_ref())
            .collect();
        let concatenated = arrow::compute::concat(&arrays)?;
        Ok(Series::new(name, concatenated))
    }

    /// Iterate over columns, returning each column as a Series
    pub fn iter_columns(&self) -> impl Iterator<Item = DataResult<Series>> + '_ {
        (0..self.num_columns()).map(move |i| self.column_by_index(i))
    }

    /// Get the underlying RecordBatches
    #[must_use]
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Merge all batches into a single RecordBatch
    ///
    /// # Errors
    /// Returns error if concatenation fails
    pub fn to_record_batch(&self) -> DataResult<RecordBatch> {
        match self.batches.as_slice() {
            [single] => Ok(single.clone()),
            [] => Ok(RecordBatch::new_empty(self.schema.clone())),
            batches => Ok(concat_batches(&self.schema, batches)?),
        }
    }

    /// Get all values of one row, in column order
    ///
    /// # Errors
    /// Returns error if the row is out of bounds
    pub fn row(&self, index: usize) -> DataResult<Vec<Value>> {
        self.iter_columns()
            .map(|col| col.and_then(|c| c.get(index)))
            .collect()
    }

    /// Get the first n rows
    ///
    /// # Errors
    /// Returns error if slicing fails
    pub fn head(&self, n: usize) -> DataResult<Self> {
        self.slice(0, n)
    }

    /// Contiguous range of rows, clamped to the frame
    ///
    /// # Errors
    /// Returns error if batch concatenation fails
    pub fn slice(&self, offset: usize, length: usize) -> DataResult<Self> {
        let total = self.num_rows();
        let offset = offset.min(total);
        let length = length.min(total - offset);
        let batch = self.to_record_batch()?;
        Ok(Self::from_batches(
            self.schema.clone(),
            vec![batch.slice(offset, length)],
        )?)
    }

    /// Keep the named columns that exist, in frame order
    ///
    /// Unknown names are ignored.
    ///
    /// # Errors
    /// Returns error if building the frame fails
    pub fn retain_columns<S: AsRef<str>>(&self, columns: &[S]) -> DataResult<Self> {
        let keep: Vec<Series> = self
            .iter_columns()
            .filter(|col| match col {
                Ok(c) => columns.iter().any(|n| n.as_ref() == c.name()),
                Err(_) => true,
            })
            .collect::<DataResult<Vec<_>>>()?;
        if keep.is_empty() {
            return Ok(Self::empty(Arc::new(Schema::empty())));
        }
        DataFrame::from_series(keep)
    }

    /// Add or replace a column with a Series
    ///
    /// If a column with the same name exists, it is replaced in place.
    /// Otherwise, the column is appended.
    ///
    /// # Errors
    /// Returns error if the Series has a different length than the DataFrame
    pub fn with_column(&self, series: Series) -> DataResult<Self> {
        if series.len() != self.num_rows() && self.num_columns() > 0 {
            return Err(DataError::SchemaMismatch(format!(
                "cannot add column '{}' with {} rows to DataFrame with {} rows",
                series.name(),
                series.len(),
                self.num_rows()
            )));
        }

        let mut columns: Vec<Series> = Vec::with_capacity(self.num_columns() + 1);
        let mut replaced = false;
        for col in self.iter_columns() {
            let col = col?;
            if col.name() == series.name() {
                columns.push(series.clone());
                replaced = true;
            } else {
                columns.push(col);
            }
        }
        if !replaced {
            columns.push(series);
        }

        DataFrame::from_series(columns)
    }

    /// Gather rows by position
    ///
    /// # Errors
    /// Returns error if any index is out of bounds
    pub fn take(&self, indices: &[usize]) -> DataResult<Self> {
        let num_rows = self.num_rows();
        if let Some(&bad) = indices.iter().find(|&&idx| idx >= num_rows) {
            return Err(DataError::OutOfBounds {
                index: bad,
                length: num_rows,
            });
        }
        let indices = UInt32Array::from(indices.iter().map(|&i| i as u32).collect::<Vec<_>>());
        let batch = self.to_record_batch()?;
        let columns = batch
            .columns()
            .iter()
            .map(|col| arrow::compute::take(col.as_ref(), &indices, None))
            .collect::<Result<Vec<_>, _>>()?;
        let batch = RecordBatch::try_new(self.schema.clone(), columns)?;
        Ok(Self::from_batch(batch))
    }

    /// Keep the rows where `mask` is true
    ///
    /// # Errors
    /// Returns error if the mask length does not match the row count
    pub fn filter(&self, mask: &BooleanArray) -> DataResult<Self> {
        if mask.len() != self.num_rows() {
            return Err(DataError::SchemaMismatch(format!(
                "filter mask has {} entries for {} rows",
                mask.len(),
                self.num_rows()
            )));
        }
        let batch = self.to_record_batch()?;
        Ok(Self::from_batch(filter_record_batch(&batch, mask)?))
    }

    /// Row permutation that sorts the frame by one column
    ///
    /// The sort is stable and places nulls last.
    ///
    /// # Errors
    /// Returns error if the column is not found or cannot be sorted
    pub fn argsort(&self, column: &str) -> DataResult<Vec<usize>> {
        let series = self.column(column)?;
        let positions: ArrayRef = Arc::new(UInt32Array::from_iter_values(
            (0..series.len()).map(|i| i as u32),
        ));
        let indices = lexsort_to_indices(
            &[
                SortColumn {
                    values: series.array().clone(),
                    options: Some(SortOptions {
                        descending: false,
                        nulls_first: false,
                    }),
                },
                SortColumn {
                    values: positions,
                    options: None,
                },
            ],
            None,
        )?;
        Ok(indices.values().iter().map(|&i| i as usize).collect())
    }

    /// Concatenate DataFrames vertically (stack rows)
    ///
    /// All DataFrames must share the same schema.
    ///
    /// # Errors
    /// Returns error if schemas don't match
    pub fn concat(dataframes: &[&DataFrame]) -> DataResult<Self> {
        let first = dataframes.first().ok_or_else(|| {
            DataError::InvalidOperation("cannot concatenate zero DataFrames".to_string())
        })?;
        let schema = first.schema.clone();
        let mut batches = Vec::new();
        for (i, df) in dataframes.iter().enumerate() {
            if df.columns() != first.columns() {
                return Err(DataError::SchemaMismatch(format!(
                    "DataFrame at index {} has different columns: expected {:?}, got {:?}",
                    i,
                    first.columns(),
                    df.columns()
                )));
            }
            batches.extend(df.batches.iter().cloned());
        }
        Ok(Self::from_batch(concat_batches(&schema, &batches)?))
    }

    /// Render the first rows as a table
    #[must_use]
    pub fn to_pretty_string(&self, max_rows: usize) -> String {
        let head = match self.head(max_rows).and_then(|h| h.to_record_batch()) {
            Ok(batch) => batch,
            Err(e) => return format!("<{e}>"),
        };
        match arrow::util::pretty::pretty_format_batches(&[head]) {
            Ok(table) => {
                let mut out = table.to_string();
                if self.num_rows() > max_rows {
                    out.push_str(&format!("\n... {} more rows", self.num_rows() - max_rows));
                }
                out
            }
            Err(e) => format!("<{e}>"),
        }
    }
}

impl fmt::Debug for DataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFrame")
            .field("columns", &self.columns())
            .field("rows", &self.num_rows())
            .field("batches", &self.batches.len())
            .finish()
    }
}

impl fmt::Display for DataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_pretty_string(20))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dataframe() -> DataFrame {
        let names = Series::from_strings("name", vec!["Alice", "Bob", "Charlie"]);
        let ages = Series::from_ints("age", vec![30, 25, 35]);
        let scores = Series::from_floats("score", vec![85.5, 92.0, 78.3]);

        DataFrame::from_series(vec![names, ages, scores]).unwrap()
    }

    #[test]
    fn test_from_series() {
        let df = sample_dataframe();
        assert_eq!(df.num_columns(), 3);
        assert_eq!(df.num_rows(), 3);
        assert_eq!(df.columns(), vec!["name", "age", "score"]);
    }

    #[test]
    fn test_from_series_rejects_ragged() {
        let a = Series::from_ints("a", vec![1, 2]);
        let b = Series::from_ints("b", vec![1]);
        assert!(DataFrame::from_series(vec![a, b]).is_err());
    }

    #[test]
    fn test_column_not_found() {
        let df = sample_dataframe();
        assert!(matches!(
            df.column("nonexistent"),
            Err(DataError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_slice_clamps() {
        let df = sample_dataframe();
        assert_eq!(df.slice(1, 10).unwrap().num_rows(), 2);
        assert_eq!(df.slice(5, 1).unwrap().num_rows(), 0);
    }

    #[test]
    fn test_retain_columns_ignores_unknown() {
        let df = sample_dataframe();
        let kept = df.retain_columns(&["score", "missing", "name"]).unwrap();
        assert_eq!(kept.columns(), vec!["name", "score"]);
    }

    #[test]
    fn test_with_column_replaces() {
        let df = sample_dataframe();
        let replaced = df
            .with_column(Series::from_ints("age", vec![1, 2, 3]))
            .unwrap();
        assert_eq!(replaced.columns(), vec!["name", "age", "score"]);
        assert_eq!(replaced.column("age").unwrap().get(2).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_take_and_argsort() {
        let df = sample_dataframe();
        let order = df.argsort("age").unwrap();
        assert_eq!(order, vec![1, 0, 2]);
        let sorted = df.take(&order).unwrap();
        assert_eq!(sorted.column("name").unwrap().get(0).unwrap(), Value::string("Bob"));
    }

    #[test]
    fn test_filter_mask() {
        let df = sample_dataframe();
        let mask = BooleanArray::from(vec![true, false, true]);
        let filtered = df.filter(&mask).unwrap();
        assert_eq!(filtered.num_rows(), 2);
        assert_eq!(filtered.row(1).unwrap()[0], Value::string("Charlie"));
    }

    #[test]
    fn test_concat() {
        let df = sample_dataframe();
        let both = DataFrame::concat(&[&df, &df]).unwrap();
        assert_eq!(both.num_rows(), 6);
        assert_eq!(both.batches().len(), 1);
    }

    #[test]
    fn test_empty_dataframe() {
        let schema = Arc::new(Schema::new(vec![Field::new(
            "a",
            arrow::datatypes::DataType::Int64,
            true,
        )]));
        let df = DataFrame::empty(schema);
        assert!(df.is_empty());
        assert_eq!(df.num_columns(), 1);
        assert_eq!(df.column("a").unwrap().len(), 0);
    }
}
