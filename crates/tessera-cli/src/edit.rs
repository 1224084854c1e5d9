//! Implementation of the `tessera edit`, `delete` and `add` commands.

use anyhow::{Context, Result};
use std::path::Path;

use tessera_core::data::write_csv;
use tessera_core::{
    AccessorConfig, AccessorRegistry, FunctionRegistry, MutationRequest, TabularValue, Value,
};

use crate::query::load_table;

/// A mutation to apply.
#[derive(Debug)]
pub enum Mutation {
    Edit { col: String, value: String },
    Delete,
    /// Cells as a JSON array; defaults per column type when absent.
    Add { row: Option<String> },
}

/// Command-line text as JSON, falling back to a plain string.
fn json_arg(text: &str) -> serde_json::Value {
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
}

fn parse_row(text: &str) -> Result<Vec<Value>> {
    let cells: Vec<serde_json::Value> =
        serde_json::from_str(text).context("--row must be a JSON array")?;
    Ok(cells.iter().map(Value::from_json).collect())
}

/// Apply a mutation, then write or print the resulting table.
pub fn apply(
    path: &Path,
    config: AccessorConfig,
    index: &str,
    mutation: Mutation,
    output: Option<&Path>,
) -> Result<()> {
    let value = load_table(path)?;
    let result = mutate(&value, config, index, mutation)?;
    let frame = result.to_frame()?;

    match output {
        Some(output) => {
            write_csv(&frame, output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Wrote {} rows to {}", frame.num_rows(), output.display());
        }
        None => println!("{frame}"),
    }
    Ok(())
}

/// Apply a mutation to a loaded table.
pub fn mutate(
    value: &TabularValue,
    config: AccessorConfig,
    index: &str,
    mutation: Mutation,
) -> Result<TabularValue> {
    let registry = AccessorRegistry::new(config, FunctionRegistry::default());
    let accessor = registry.accessor_for(value);
    let index = json_arg(index);

    let result = match mutation {
        Mutation::Edit { col, value: cell } => {
            accessor.on_edit(value, &MutationRequest::edit(index, col, json_arg(&cell)))
        }
        Mutation::Delete => accessor.on_delete(value, &MutationRequest::at(index)),
        Mutation::Add { row } => {
            let row = row.as_deref().map(parse_row).transpose()?;
            accessor.on_add(value, &MutationRequest::at(index), row)
        }
    };
    result.context("Mutation failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{DataFrame, Series};

    fn table() -> TabularValue {
        TabularValue::Frame(
            DataFrame::from_series(vec![
                Series::from_strings("name", vec!["a", "b"]),
                Series::from_ints("qty", vec![1, 2]),
            ])
            .unwrap(),
        )
    }

    fn qty(value: &TabularValue) -> Vec<Value> {
        value.to_frame().unwrap().column("qty").unwrap().to_values().unwrap()
    }

    #[test]
    fn test_json_arg() {
        assert_eq!(json_arg("3"), serde_json::json!(3));
        assert_eq!(json_arg("x"), serde_json::json!("x"));
    }

    #[test]
    fn test_edit_and_delete() {
        let config = AccessorConfig::default();
        let edited = mutate(
            &table(),
            config.clone(),
            "0",
            Mutation::Edit {
                col: "qty".to_string(),
                value: "7".to_string(),
            },
        )
        .unwrap();
        assert_eq!(qty(&edited), vec![Value::Int(7), Value::Int(2)]);

        let deleted = mutate(&table(), config.clone(), "1", Mutation::Delete).unwrap();
        assert_eq!(qty(&deleted), vec![Value::Int(1)]);

        assert!(mutate(&table(), config, "first", Mutation::Delete).is_err());
    }

    #[test]
    fn test_add_row() {
        let added = mutate(
            &table(),
            AccessorConfig::default(),
            "1",
            Mutation::Add {
                row: Some(r#"["z", 9]"#.to_string()),
            },
        )
        .unwrap();
        assert_eq!(qty(&added), vec![Value::Int(1), Value::Int(9), Value::Int(2)]);
        assert!(parse_row("{}").is_err());
    }

    #[test]
    fn test_apply_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let output = dir.path().join("out.csv");
        std::fs::write(&input, "name,qty\na,1\nb,2\n").unwrap();
        apply(&input, AccessorConfig::default(), "0", Mutation::Delete, Some(&output)).unwrap();
        let text = std::fs::read_to_string(&output).unwrap();
        assert_eq!(text, "name,qty\nb,2\n");
    }
}
