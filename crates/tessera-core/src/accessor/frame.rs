//! Accessor for tables, series and lists of tables

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use super::aggregate::aggregate;
use super::columns::{columns_dict, ColsDescription, ColumnsDict, ColumnsSpec};
use super::decimate::apply_decimators;
use super::filter::apply_filters;
use super::format::{format_data, FormatOptions};
use super::mutate;
use super::paging::{parse_bound, plain_indices, sorted_indices, PageWindow};
use super::payload::{DataFormat, DataRequest, DataResponse, MutationRequest, Orient, PageData};
use super::transform::{build_transferred_cols, TransferOptions};
use super::{DataAccessor, TabularValue, INDEX_COL, UNSUPPORTED_TABLE};
use crate::config::AccessorConfig;
use crate::data::{write_csv_to, DataError, DataFrame, DataResult, Series, Value};
use crate::registry::FunctionRegistry;

/// Serves Arrow-backed tables to tables and charts
pub struct FrameAccessor {
    config: AccessorConfig,
    functions: Arc<FunctionRegistry>,
}

impl FrameAccessor {
    #[must_use]
    pub fn new(config: AccessorConfig, functions: Arc<FunctionRegistry>) -> Self {
        Self { config, functions }
    }

    #[must_use]
    pub fn config(&self) -> &AccessorConfig {
        &self.config
    }

    #[must_use]
    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Client column descriptors of a value, with the configured date and
    /// number formats as defaults
    ///
    /// # Errors
    /// Returns error if the value cannot be viewed as a table
    pub fn columns_dict(
        &self,
        var_name: &str,
        value: &TabularValue,
        columns: &ColumnsSpec,
        opt_columns: &[String],
    ) -> DataResult<Option<ColumnsDict>> {
        let description = self.cols_description(var_name, value)?;
        Ok(columns_dict(
            columns,
            Some(&description),
            self.config.date_format.as_deref(),
            self.config.number_format.as_deref(),
            opt_columns,
        ))
    }

    fn page_key(&self, request: &DataRequest) -> String {
        request
            .pagekey
            .clone()
            .unwrap_or_else(|| self.config.default_page_key.clone())
    }

    /// Run the request pipeline over one table
    ///
    /// `col_prefix` is stripped from requested column names; list entries
    /// are addressed as `<i>/<column>`.
    fn frame_data(
        &self,
        var_name: &str,
        frame: &DataFrame,
        request: &DataRequest,
        format: DataFormat,
        col_prefix: &str,
    ) -> DataResult<DataResponse> {
        let mut response = DataResponse::new(self.page_key(request));
        if !frame.is_flat() {
            warn!(var_name, "{UNSUPPORTED_TABLE}");
            response.error = Some(UNSUPPORTED_TABLE.to_string());
            return Ok(response);
        }

        let mut columns: Vec<String> = request
            .columns
            .iter()
            .map(|c| c.strip_prefix(col_prefix).unwrap_or(c).to_string())
            .collect();
        let paged = !request.alldata;

        let mut df = frame.clone();
        if paged {
            if !df.has_column(INDEX_COL) {
                let positions = (0..df.num_rows() as i64).collect();
                df = df.with_column(Series::from_ints(INDEX_COL, positions))?;
            }
            if !columns.is_empty() && !columns.iter().any(|c| c == INDEX_COL) {
                columns.push(INDEX_COL.to_string());
            }
        }

        let fullrowcount = df.num_rows();
        if !request.filters.is_empty() {
            let descriptions = ColsDescription::of_frame(&df);
            match apply_filters(&df, &request.filters, &descriptions) {
                Ok(filtered) => df = filtered,
                Err(e) => soft_failure(&mut response, format!("Cannot filter {var_name}: {e}")),
            }
        }

        if paged {
            self.page(var_name, frame, df, request, format, &columns, fullrowcount, response)
        } else {
            self.all_rows(var_name, df, request, format, &columns, response)
        }
    }

    fn page(
        &self,
        var_name: &str,
        source: &DataFrame,
        mut df: DataFrame,
        request: &DataRequest,
        format: DataFormat,
        columns: &[String],
        fullrowcount: usize,
        mut response: DataResponse,
    ) -> DataResult<DataResponse> {
        if let (false, Some(applies)) = (request.aggregates.is_empty(), &request.applies) {
            match aggregate(&df, &request.aggregates, applies, &self.functions) {
                Ok(grouped) => df = grouped,
                Err(e) => {
                    warn!(error = %e, "aggregation failed");
                    soft_failure(
                        &mut response,
                        format!(
                            "Cannot aggregate {var_name} with groupby {:?} and aggregates {:?}.",
                            request.aggregates, applies
                        ),
                    );
                }
            }
        }
        response.infinite.clone_from(&request.infinite);

        let rowcount = df.num_rows();
        let start = parse_bound(request.start.as_ref(), 0).unwrap_or_else(|_| {
            let shown = request.start.as_ref().map(ToString::to_string).unwrap_or_default();
            soft_failure(&mut response, format!("start should be an int value {shown}."));
            0
        });
        let end = parse_bound(request.end.as_ref(), -1).unwrap_or(-1);
        let window = PageWindow::compute(rowcount, start, end, request.reverse);

        let orderby = request.orderby.as_deref();
        let indexes = sorted_indices(&df, orderby, request.is_descending(), window)
            .unwrap_or_else(|_| {
                soft_failure(
                    &mut response,
                    format!("Cannot sort {var_name} on columns {}.", orderby.unwrap_or_default()),
                );
                plain_indices(&df, window)
            });
        debug!(var_name, rowcount, start = window.start, end = window.end, "serving page");

        let transferred = build_transferred_cols(
            &df,
            Some(&indexes),
            &TransferOptions {
                columns,
                styles: &request.styles,
                tooltips: &request.tooltips,
                formats: &request.formats,
                handle_nan: request.handlenan,
            },
            &self.functions,
            &self.config,
        )?;
        response.warnings.extend(transferred.warnings);

        let mut options = FormatOptions::new(format, Orient::Records);
        options.start = Some(window.first_row());
        options.rowcount = Some(rowcount);
        options.fullrowcount = Some(fullrowcount);
        response.value = format_data(&transferred.frame, &options)?;

        if let Some(name) = request.compare.as_deref() {
            match self.compare_page(var_name, name, source, request, columns, &indexes, format) {
                Ok(comp) => response.value.comp = comp,
                Err(e) => soft_failure(
                    &mut response,
                    format!("Compare function {name} raised an error on {var_name}: {e}"),
                ),
            }
        }
        Ok(response)
    }

    /// Rows of the comparison table matching the page, if the function
    /// returned one
    fn compare_page(
        &self,
        var_name: &str,
        name: &str,
        source: &DataFrame,
        request: &DataRequest,
        columns: &[String],
        indexes: &[usize],
        format: DataFormat,
    ) -> DataResult<Option<PageData>> {
        let compare = self
            .functions
            .compare(name)
            .ok_or_else(|| DataError::InvalidArgument(format!("'{name}' is not registered")))?;
        let Some(comp) = compare(var_name, source, &request.compare_datas) else {
            return Ok(None);
        };
        if comp.is_empty() {
            return Ok(None);
        }

        let mut kept = Vec::new();
        for series in comp.iter_columns() {
            let series = series?;
            if series.null_count() < series.len() {
                kept.push(series.name().to_string());
            }
        }
        let comp = comp.retain_columns(&kept)?;
        let transferred = build_transferred_cols(
            &comp,
            Some(indexes),
            &TransferOptions {
                columns,
                ..TransferOptions::default()
            },
            &self.functions,
            &self.config,
        )?;
        let options = FormatOptions::new(format, Orient::Records);
        Ok(format_data(&transferred.frame, &options)?.data)
    }

    fn all_rows(
        &self,
        var_name: &str,
        mut df: DataFrame,
        request: &DataRequest,
        format: DataFormat,
        columns: &[String],
        mut response: DataResponse,
    ) -> DataResult<DataResponse> {
        response.alldata = Some(true);
        let outcome = apply_decimators(
            var_name,
            &df,
            &request.decimator_payload,
            &self.functions,
            false,
        )?;
        response.warnings.extend(outcome.warnings);
        if let Some(decimated) = outcome.frame {
            df = decimated;
        }

        if format == DataFormat::Csv {
            let transferred = build_transferred_cols(
                &df,
                None,
                &TransferOptions {
                    columns,
                    handle_nan: request.handlenan,
                    ..TransferOptions::default()
                },
                &self.functions,
                &self.config,
            )?;
            response.warnings.extend(transferred.warnings);
            response.frame = Some(transferred.frame);
            return Ok(response);
        }

        let transferred = build_transferred_cols(
            &df,
            None,
            &TransferOptions {
                columns,
                styles: &request.styles,
                tooltips: &request.tooltips,
                formats: &request.formats,
                handle_nan: request.handlenan,
            },
            &self.functions,
            &self.config,
        )?;
        response.warnings.extend(transferred.warnings);
        let mut options = FormatOptions::new(format, Orient::List);
        options.data_extraction = Some(true);
        response.value = format_data(&transferred.frame, &options)?;
        Ok(response)
    }

    /// One response for every table of a list, in list order
    fn multi_data(
        &self,
        var_name: &str,
        items: &[TabularValue],
        request: &DataRequest,
        format: DataFormat,
    ) -> DataResult<DataResponse> {
        let mut response = DataResponse::new(self.page_key(request));
        response.alldata = Some(true);
        response.value.multi = Some(true);

        let mut data = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            if matches!(item, TabularValue::List(_)) {
                data.push(None);
                continue;
            }
            let prefix = format!("{i}/");
            let mut entry = self.frame_data(var_name, &item.to_frame()?, request, format, &prefix)?;
            response.warnings.append(&mut entry.warnings);
            data.push(entry.value.data.take());
            response.value.merge_meta(entry.value);
        }
        response.value.data = Some(PageData::Multi(data));
        Ok(response)
    }
}

fn soft_failure(response: &mut DataResponse, message: String) {
    warn!("{message}");
    response.warnings.push(message);
}

impl fmt::Debug for FrameAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameAccessor")
            .field("config", &self.config)
            .field("functions", &self.functions)
            .finish()
    }
}

impl DataAccessor for FrameAccessor {
    fn name(&self) -> &'static str {
        "frame"
    }

    fn cols_description(&self, var_name: &str, value: &TabularValue) -> DataResult<ColsDescription> {
        match value {
            TabularValue::List(items) => {
                let mut description = ColsDescription::default();
                for (i, item) in items.iter().enumerate() {
                    if let Ok(entry) = self.cols_description(var_name, item) {
                        description.extend_prefixed(&format!("{i}/"), entry);
                    }
                }
                Ok(description)
            }
            other => Ok(ColsDescription::of_frame(&other.to_frame()?)),
        }
    }

    fn get_data(
        &self,
        var_name: &str,
        value: &TabularValue,
        request: &DataRequest,
        format: DataFormat,
    ) -> DataResult<DataResponse> {
        match value {
            TabularValue::List(items) if request.alldata => {
                self.multi_data(var_name, items, request, format)
            }
            TabularValue::List(items) => {
                let first = items.first().ok_or_else(|| {
                    DataError::InvalidArgument(format!("{var_name} holds an empty list"))
                })?;
                self.get_data(var_name, first, request, format)
            }
            other => self.frame_data(var_name, &other.to_frame()?, request, format, ""),
        }
    }

    fn on_edit(&self, value: &TabularValue, request: &MutationRequest) -> DataResult<TabularValue> {
        mutate::edit(value, request)
    }

    fn on_delete(
        &self,
        value: &TabularValue,
        request: &MutationRequest,
    ) -> DataResult<TabularValue> {
        mutate::delete(value, request)
    }

    fn on_add(
        &self,
        value: &TabularValue,
        request: &MutationRequest,
        new_row: Option<Vec<Value>>,
    ) -> DataResult<TabularValue> {
        mutate::add(value, request, new_row)
    }

    fn to_csv(&self, var_name: &str, value: &TabularValue) -> DataResult<Option<PathBuf>> {
        if matches!(value, TabularValue::List(_)) {
            return Err(DataError::InvalidArgument(format!(
                "Cannot export {} to csv.",
                value.kind_name()
            )));
        }
        let response = self.frame_data(
            var_name,
            &value.to_frame()?,
            &DataRequest::all_data(),
            DataFormat::Csv,
            "",
        )?;
        let Some(table) = response.frame else {
            return Ok(None);
        };

        let file = tempfile::Builder::new()
            .prefix(var_name)
            .suffix(".csv")
            .tempfile()?;
        write_csv_to(&table, file.as_file())?;
        let (_, path) = file.keep().map_err(|e| DataError::Io(e.to_string()))?;
        debug!(var_name, path = %path.display(), "exported table");
        Ok(Some(path))
    }
}
