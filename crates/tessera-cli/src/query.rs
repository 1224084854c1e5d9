//! Implementation of the `tessera describe`, `query` and `export` commands.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use tessera_core::accessor::ColumnsSpec;
use tessera_core::data::read_csv;
use tessera_core::{
    AccessorConfig, AccessorRegistry, DataFormat, DataRequest, FunctionRegistry, TabularValue,
};

/// Options for the `query` command.
#[derive(Debug)]
pub struct QueryOptions {
    /// Variable name reported to host functions.
    pub var: String,
    /// Request payload as JSON text; an empty request when absent.
    pub payload: Option<String>,
    /// Encode the page as an Arrow stream instead of JSON.
    pub arrow: bool,
}

/// Load a CSV file as a host table.
pub fn load_table(path: &Path) -> Result<TabularValue> {
    let frame = read_csv(path).with_context(|| format!("Failed to read {}", path.display()))?;
    info!(rows = frame.num_rows(), columns = frame.num_columns(), "loaded table");
    Ok(TabularValue::Frame(frame))
}

fn registry(config: AccessorConfig) -> AccessorRegistry {
    AccessorRegistry::new(config, FunctionRegistry::default())
}

/// Print the column descriptions of a table.
pub fn describe(path: &Path, config: AccessorConfig) -> Result<()> {
    let value = load_table(path)?;
    let registry = registry(config);
    let description = registry
        .accessor_for(&value)
        .cols_description("table", &value)
        .context("Failed to describe table")?;
    println!("{}", serde_json::to_string_pretty(&description.to_json())?);
    Ok(())
}

/// Parse a columns selection: JSON (list or name -> metadata object), or
/// `;`-separated names.
pub fn parse_columns(text: Option<&str>) -> ColumnsSpec {
    match text {
        Some(text) => serde_json::from_str(text)
            .unwrap_or_else(|_| ColumnsSpec::Text(text.to_string())),
        None => ColumnsSpec::default(),
    }
}

/// Print the client column descriptors of a table.
pub fn columns(path: &Path, config: AccessorConfig, selection: Option<&str>) -> Result<()> {
    let value = load_table(path)?;
    let registry = registry(config);
    let dict = registry
        .frame_accessor()
        .columns_dict("table", &value, &parse_columns(selection), &[])
        .context("Failed to describe columns")?;
    let json = dict.map_or(serde_json::Value::Null, |dict| dict.to_json());
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

/// Parse a request payload.
pub fn parse_request(payload: Option<&str>) -> Result<DataRequest> {
    match payload {
        Some(text) => serde_json::from_str(text).context("Invalid request payload"),
        None => Ok(DataRequest::default()),
    }
}

/// Run a page request and print the response envelope.
pub fn query(path: &Path, config: AccessorConfig, options: &QueryOptions) -> Result<()> {
    let value = load_table(path)?;
    let request = parse_request(options.payload.as_deref())?;
    let format = if options.arrow {
        DataFormat::ApacheArrow
    } else {
        DataFormat::Json
    };

    let registry = registry(config);
    let response = registry
        .accessor_for(&value)
        .get_data(&options.var, &value, &request, format)
        .context("Request failed")?;
    for warning in &response.warnings {
        warn!("{warning}");
    }
    println!("{}", serde_json::to_string_pretty(&response.to_json()?)?);
    Ok(())
}

/// Export the full table to a temporary CSV file and print its path.
pub fn export(path: &Path, config: AccessorConfig, var: &str) -> Result<()> {
    let value = load_table(path)?;
    let registry = registry(config);
    match registry
        .accessor_for(&value)
        .to_csv(var, &value)
        .context("Export failed")?
    {
        Some(exported) => println!("{}", exported.display()),
        None => return Err(anyhow::anyhow!("Nothing to export from {}", path.display())),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request() {
        let request = parse_request(Some(r#"{"start": "5", "reverse": true}"#)).unwrap();
        assert!(request.reverse);
        assert_eq!(request.start, Some(serde_json::json!("5")));
        assert_eq!(parse_request(None).unwrap(), DataRequest::default());
        assert!(parse_request(Some("not json")).is_err());
    }

    #[test]
    fn test_parse_columns() {
        assert_eq!(
            parse_columns(Some("a;b")),
            ColumnsSpec::Text("a;b".to_string())
        );
        assert_eq!(
            parse_columns(Some(r#"["a"]"#)),
            ColumnsSpec::List(vec!["a".to_string()])
        );
        assert!(matches!(
            parse_columns(Some(r#"{"a": {"title": "A"}}"#)),
            ColumnsSpec::Map(_)
        ));
        assert_eq!(parse_columns(None), ColumnsSpec::default());
    }

    #[test]
    fn test_load_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        std::fs::write(&path, "a,b\n1,x\n2,y\n").unwrap();
        let value = load_table(&path).unwrap();
        assert_eq!(value.to_frame().unwrap().num_rows(), 2);
        assert!(load_table(&dir.path().join("missing.csv")).is_err());
    }
}
