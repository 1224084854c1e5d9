//! Row filtering from client filter clauses

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use arrow::array::BooleanArray;
use tracing::debug;

use super::columns::ColsDescription;
use super::payload::FilterClause;
use crate::data::{parse_naive_timestamp, DataError, DataFrame, DataResult, Value};

/// Comparison requested by a filter clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAction {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
}

impl FromStr for FilterAction {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "==" => Ok(FilterAction::Eq),
            "!=" => Ok(FilterAction::Ne),
            "<" => Ok(FilterAction::Lt),
            "<=" => Ok(FilterAction::Le),
            ">" => Ok(FilterAction::Gt),
            ">=" => Ok(FilterAction::Ge),
            "contains" => Ok(FilterAction::Contains),
            other => Err(DataError::InvalidArgument(format!(
                "unknown filter action '{other}'"
            ))),
        }
    }
}

impl fmt::Display for FilterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FilterAction::Eq => "==",
            FilterAction::Ne => "!=",
            FilterAction::Lt => "<",
            FilterAction::Le => "<=",
            FilterAction::Gt => ">",
            FilterAction::Ge => ">=",
            FilterAction::Contains => "contains",
        };
        write!(f, "{s}")
    }
}

/// A clause resolved against the table
#[derive(Debug)]
struct Predicate {
    column: String,
    action: FilterAction,
    operand: Value,
    /// Lowercase column strings before comparing
    fold_case: bool,
}

impl Predicate {
    fn resolve(clause: &FilterClause, descriptions: &ColsDescription) -> DataResult<Self> {
        let action: FilterAction = clause.action.parse()?;
        let is_date = descriptions
            .dtype(&clause.col)
            .is_some_and(|t| t.starts_with("datetime"));

        let mut fold_case = false;
        let operand = match &clause.value {
            serde_json::Value::String(text) if is_date => {
                // strip the trailing zone marker
                let mut chars = text.chars();
                chars.next_back();
                let micros = parse_naive_timestamp(chars.as_str()).ok_or_else(|| {
                    DataError::InvalidArgument(format!("invalid date '{text}' for '{}'", clause.col))
                })?;
                Value::Timestamp(micros)
            }
            serde_json::Value::String(text) if !clause.match_case => {
                fold_case = true;
                Value::String(text.to_lowercase())
            }
            other => Value::from_json(other),
        };

        Ok(Self {
            column: clause.col.clone(),
            action,
            operand,
            fold_case,
        })
    }

    fn test(&self, cell: &Value) -> DataResult<bool> {
        if cell.is_missing() {
            return Ok(self.action == FilterAction::Ne);
        }

        if self.action == FilterAction::Contains {
            let (Value::String(haystack), Value::String(needle)) = (cell, &self.operand) else {
                return Err(DataError::InvalidOperation(format!(
                    "'contains' needs string values, found {} in '{}'",
                    cell.type_name(),
                    self.column
                )));
            };
            return Ok(if self.fold_case {
                haystack.to_lowercase().contains(needle.as_str())
            } else {
                haystack.contains(needle.as_str())
            });
        }

        let folded;
        let cell = match cell {
            Value::String(s) if self.fold_case => {
                folded = Value::String(s.to_lowercase());
                &folded
            }
            other => other,
        };

        let ordering = cell.compare(&self.operand);
        Ok(match (self.action, ordering) {
            (FilterAction::Eq, o) => o == Some(Ordering::Equal),
            (FilterAction::Ne, o) => o != Some(Ordering::Equal),
            (_, None) => {
                return Err(DataError::TypeMismatch {
                    expected: cell.type_name().to_string(),
                    found: self.operand.type_name().to_string(),
                })
            }
            (FilterAction::Lt, Some(o)) => o == Ordering::Less,
            (FilterAction::Le, Some(o)) => o != Ordering::Greater,
            (FilterAction::Gt, Some(o)) => o == Ordering::Greater,
            (FilterAction::Ge, Some(o)) => o != Ordering::Less,
            (FilterAction::Contains, Some(_)) => false,
        })
    }
}

/// Keep the rows matching every clause
///
/// Clauses are AND-ed in order into one mask. An unknown column or
/// operator, a type mismatch or an unreadable date fails the whole call.
///
/// # Errors
/// Returns error on the first malformed clause
pub fn apply_filters(
    frame: &DataFrame,
    filters: &[FilterClause],
    descriptions: &ColsDescription,
) -> DataResult<DataFrame> {
    if filters.is_empty() {
        return Ok(frame.clone());
    }

    let mut keep = vec![true; frame.num_rows()];
    for clause in filters {
        let predicate = Predicate::resolve(clause, descriptions)?;
        let column = frame.column(&predicate.column)?;
        for (row, flag) in keep.iter_mut().enumerate() {
            if *flag {
                *flag = predicate.test(&column.get(row)?)?;
            }
        }
        debug!(
            column = %predicate.column,
            action = %predicate.action,
            "applied filter clause"
        );
    }

    frame.filter(&BooleanArray::from(keep))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Series;
    use serde_json::json;

    fn people() -> DataFrame {
        DataFrame::from_series(vec![
            Series::from_strings("name", vec!["Alice", "bob", "ALBERT", "Carol"]),
            Series::from_ints("age", vec![30, 25, 41, 35]),
            Series::from_timestamps(
                "joined",
                vec![
                    parse_naive_timestamp("2020-01-01"),
                    parse_naive_timestamp("2021-06-15"),
                    None,
                    parse_naive_timestamp("2023-03-01"),
                ],
                None,
            ),
        ])
        .unwrap()
    }

    fn clause(col: &str, action: &str, value: serde_json::Value, match_case: bool) -> FilterClause {
        FilterClause {
            col: col.to_string(),
            value,
            action: action.to_string(),
            match_case,
        }
    }

    fn names(frame: &DataFrame) -> Vec<String> {
        frame
            .column("name")
            .unwrap()
            .to_values()
            .unwrap()
            .into_iter()
            .map(|v| v.to_string())
            .collect()
    }

    #[test]
    fn test_contains_ignoring_case() {
        let df = people();
        let desc = ColsDescription::of_frame(&df);
        let out = apply_filters(&df, &[clause("name", "contains", json!("Al"), false)], &desc)
            .unwrap();
        assert_eq!(names(&out), vec!["Alice", "ALBERT"]);
    }

    #[test]
    fn test_contains_matching_case() {
        let df = people();
        let desc = ColsDescription::of_frame(&df);
        let out =
            apply_filters(&df, &[clause("name", "contains", json!("Al"), true)], &desc).unwrap();
        assert_eq!(names(&out), vec!["Alice"]);
    }

    #[test]
    fn test_equality_ignoring_case() {
        let df = people();
        let desc = ColsDescription::of_frame(&df);
        let out = apply_filters(&df, &[clause("name", "==", json!("BOB"), false)], &desc).unwrap();
        assert_eq!(names(&out), vec!["bob"]);
    }

    #[test]
    fn test_clauses_are_anded() {
        let df = people();
        let desc = ColsDescription::of_frame(&df);
        let out = apply_filters(
            &df,
            &[
                clause("age", ">=", json!(30), true),
                clause("age", "<", json!(40), true),
            ],
            &desc,
        )
        .unwrap();
        assert_eq!(names(&out), vec!["Alice", "Carol"]);
    }

    #[test]
    fn test_date_operand_drops_zone_marker() {
        let df = people();
        let desc = ColsDescription::of_frame(&df);
        let out = apply_filters(
            &df,
            &[clause("joined", ">", json!("2021-01-01T00:00:00.000Z"), true)],
            &desc,
        )
        .unwrap();
        assert_eq!(names(&out), vec!["bob", "Carol"]);
    }

    #[test]
    fn test_missing_cells_only_match_not_equal() {
        let df = people();
        let desc = ColsDescription::of_frame(&df);
        let out = apply_filters(
            &df,
            &[clause("joined", "!=", json!("2020-01-01T00:00:00Z"), true)],
            &desc,
        )
        .unwrap();
        assert_eq!(names(&out), vec!["bob", "ALBERT", "Carol"]);
    }

    #[test]
    fn test_malformed_clauses_fail() {
        let df = people();
        let desc = ColsDescription::of_frame(&df);
        assert!(apply_filters(&df, &[clause("ghost", "==", json!(1), true)], &desc).is_err());
        assert!(apply_filters(&df, &[clause("age", "~", json!(1), true)], &desc).is_err());
        assert!(apply_filters(&df, &[clause("age", "<", json!("x"), true)], &desc).is_err());
        assert!(apply_filters(&df, &[clause("age", "contains", json!("3"), true)], &desc).is_err());
    }
}
