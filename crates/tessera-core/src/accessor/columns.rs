//! Column descriptors sent to table widgets

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::data::DataFrame;

/// Pandas-style dtype: semantic name, bit width, optional `[unit, tz]`
static DTYPE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^\s\d\[]+)(\d+)(\[(.*,\s(\S+))\])?").expect("valid dtype pattern")
});

const NUMBER_TYPES: &[&str] = &["int", "uint", "float", "int32", "int64", "float32", "float64"];

/// Free-form metadata of one column (`type`, `index`, `format`, `title`, ...)
pub type ColumnMeta = serde_json::Map<String, serde_json::Value>;

/// Columns selection as written by the page author
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnsSpec {
    /// Semicolon-separated names
    Text(String),
    List(Vec<String>),
    /// Name -> metadata
    Map(serde_json::Map<String, serde_json::Value>),
}

impl Default for ColumnsSpec {
    fn default() -> Self {
        ColumnsSpec::List(Vec::new())
    }
}

/// Source column name -> dtype string, in column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColsDescription {
    entries: Vec<(String, String)>,
}

impl ColsDescription {
    /// Describe every column of a frame
    #[must_use]
    pub fn of_frame(frame: &DataFrame) -> Self {
        Self {
            entries: frame
                .schema()
                .fields()
                .iter()
                .map(|f| (f.name().clone(), crate::data::dtype_name(f.data_type())))
                .collect(),
        }
    }

    /// Append the entries of `other`, each key prefixed
    pub fn extend_prefixed(&mut self, prefix: &str, other: ColsDescription) {
        self.entries.extend(
            other
                .entries
                .into_iter()
                .map(|(name, dtype)| (format!("{prefix}{name}"), dtype)),
        );
    }

    /// Dtype of a column
    #[must_use]
    pub fn dtype(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t.as_str())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.dtype(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + Clone {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, t)| (n.as_str(), t.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only the named columns
    #[must_use]
    pub fn retain_names<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.entries
            .retain(|(n, _)| names.iter().any(|k| k.as_ref() == n));
        self
    }

    /// `{name: {"type": dtype}}`
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<_, _> = self
            .entries
            .iter()
            .map(|(n, t)| (n.clone(), serde_json::json!({ "type": t })))
            .collect();
        serde_json::Value::Object(map)
    }
}

impl FromIterator<(String, String)> for ColsDescription {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Parsed pandas-style dtype
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDtype<'a> {
    /// Semantic name (`int`, `float`, `datetime`, ...) or the whole dtype
    /// string when it carries no bit width (`bool`, `object`)
    pub type_name: &'a str,
    /// Timezone embedded in `datetime64[unit, tz]`
    pub tz: Option<&'a str>,
}

/// Split a dtype string into its semantic name and timezone
#[must_use]
pub fn parse_dtype(dtype: &str) -> ParsedDtype<'_> {
    match DTYPE_PATTERN.captures(dtype) {
        Some(caps) => ParsedDtype {
            type_name: caps.get(1).map_or(dtype, |m| m.as_str()),
            tz: caps.get(5).map(|m| m.as_str()),
        },
        None => ParsedDtype {
            type_name: dtype,
            tz: None,
        },
    }
}

/// Name of the string column carrying the formatted values of date column `col`
#[must_use]
pub fn date_col_str_name<'a, I>(existing: I, col: &str) -> String
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    let mut name = format!("{col}_str");
    while existing.clone().into_iter().any(|c| c == name) {
        name.push('_');
    }
    name
}

/// Ordered column name -> descriptor map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnsDict {
    entries: Vec<(String, ColumnMeta)>,
}

impl ColumnsDict {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ColumnMeta> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, m)| m)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut ColumnMeta> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert at the end, or replace in place
    pub fn insert(&mut self, name: impl Into<String>, meta: ColumnMeta) {
        let name = name.into();
        match self.get_mut(&name) {
            Some(existing) => *existing = meta,
            None => self.entries.push((name, meta)),
        }
    }

    fn remove(&mut self, name: &str) -> Option<ColumnMeta> {
        let pos = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + Clone {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnMeta)> {
        self.entries.iter().map(|(n, m)| (n.as_str(), m))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.entries
                .iter()
                .map(|(n, m)| (n.clone(), serde_json::Value::Object(m.clone())))
                .collect(),
        )
    }
}

fn index_meta(index: usize) -> ColumnMeta {
    let mut meta = ColumnMeta::new();
    meta.insert("index".to_string(), index.into());
    meta
}

fn dict_from_list<'a>(
    names: impl IntoIterator<Item = &'a str>,
    description: &ColsDescription,
) -> ColumnsDict {
    let mut dict = ColumnsDict::default();
    for name in names {
        if description.contains(name) {
            if !dict.contains(name) {
                let index = dict.len();
                dict.insert(name, index_meta(index));
            }
        } else if !name.is_empty() {
            let available: Vec<&str> = description.names().collect();
            warn!("Column \"{name}\" is not present. Available columns: {available:?}.");
        }
    }
    dict
}

/// Build the descriptor of every displayed column
///
/// Returns `None` when no description is available.
#[must_use]
pub fn columns_dict(
    columns: &ColumnsSpec,
    description: Option<&ColsDescription>,
    date_format: Option<&str>,
    number_format: Option<&str>,
    opt_columns: &[String],
) -> Option<ColumnsDict> {
    let description = description?;

    let mut dict = match columns {
        ColumnsSpec::Text(text) => dict_from_list(text.split(';').map(str::trim), description),
        ColumnsSpec::List(names) => dict_from_list(names.iter().map(String::as_str), description),
        ColumnsSpec::Map(map) => {
            let mut dict = ColumnsDict::default();
            for (name, meta) in map {
                let meta = match meta {
                    serde_json::Value::Object(m) => m.clone(),
                    _ => ColumnMeta::new(),
                };
                dict.insert(name.clone(), meta);
            }
            dict
        }
    };

    if dict.is_empty() {
        for (index, name) in description.names().enumerate() {
            dict.insert(name, index_meta(index));
        }
    } else {
        for col in opt_columns {
            if description.contains(col) && !dict.contains(col) {
                let index = dict.len();
                dict.insert(col.clone(), index_meta(index));
            }
        }
    }

    let mut position = 0usize;
    for (source, dtype) in description.iter() {
        let Some(meta) = dict.get_mut(source) else {
            continue;
        };
        let parsed = parse_dtype(dtype);
        if let Some(tz) = parsed.tz {
            meta.insert("tz".to_string(), tz.into());
        }
        let is_date = parsed.type_name == "datetime";
        if is_date {
            if let Some(fmt) = date_format {
                meta.entry("format").or_insert_with(|| fmt.into());
            }
        } else if let Some(fmt) = number_format.filter(|_| NUMBER_TYPES.contains(&parsed.type_name)) {
            meta.entry("format").or_insert_with(|| fmt.into());
        }
        meta.entry("index").or_insert_with(|| position.into());
        position += 1;
        meta.insert("type".to_string(), parsed.type_name.into());
        meta.insert("dfid".to_string(), source.into());
        if is_date {
            // date columns travel as formatted strings under a new name
            if let Some(meta) = dict.remove(source) {
                dict.insert(date_col_str_name(description.names(), source), meta);
            }
        }
    }

    Some(dict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn description() -> ColsDescription {
        [
            ("name", "object"),
            ("age", "int64"),
            ("when", "datetime64[ns, Europe/Paris]"),
            ("score", "float64"),
        ]
        .into_iter()
        .map(|(n, t)| (n.to_string(), t.to_string()))
        .collect()
    }

    #[test]
    fn test_parse_dtype() {
        assert_eq!(parse_dtype("int64").type_name, "int");
        assert_eq!(parse_dtype("bool").type_name, "bool");
        let parsed = parse_dtype("datetime64[ns, UTC]");
        assert_eq!(parsed.type_name, "datetime");
        assert_eq!(parsed.tz, Some("UTC"));
        assert_eq!(parse_dtype("datetime64[us]").tz, None);
    }

    #[test]
    fn test_date_col_str_name() {
        assert_eq!(date_col_str_name(["a", "b"], "a"), "a_str");
        assert_eq!(date_col_str_name(["a", "a_str"], "a"), "a_str_");
    }

    #[test]
    fn test_none_without_description() {
        assert!(columns_dict(&ColumnsSpec::default(), None, None, None, &[]).is_none());
    }

    #[test]
    fn test_all_columns_by_default() {
        let dict =
            columns_dict(&ColumnsSpec::default(), Some(&description()), None, None, &[]).unwrap();
        let names: Vec<&str> = dict.names().collect();
        assert_eq!(names, vec!["name", "age", "score", "when_str"]);
        assert_eq!(dict.get("when_str").unwrap()["dfid"], json!("when"));
        assert_eq!(dict.get("when_str").unwrap()["tz"], json!("Europe/Paris"));
        assert_eq!(dict.get("when_str").unwrap()["index"], json!(2));
        assert_eq!(dict.get("score").unwrap()["type"], json!("float"));
    }

    #[test]
    fn test_text_form_drops_unknown() {
        let dict = columns_dict(
            &ColumnsSpec::Text("age; missing ;;name".to_string()),
            Some(&description()),
            None,
            Some("%.1f"),
            &[],
        )
        .unwrap();
        let names: Vec<&str> = dict.names().collect();
        assert_eq!(names, vec!["age", "name"]);
        assert_eq!(dict.get("age").unwrap()["index"], json!(0));
        assert_eq!(dict.get("name").unwrap()["index"], json!(1));
        assert_eq!(dict.get("age").unwrap()["format"], json!("%.1f"));
        assert!(dict.get("name").unwrap().get("format").is_none());
    }

    #[test]
    fn test_map_form_keeps_metadata() {
        let spec: ColumnsSpec =
            serde_json::from_value(json!({"when": {"title": "When", "format": "dd/MM"}})).unwrap();
        let dict =
            columns_dict(&spec, Some(&description()), Some("yyyy-MM-dd"), None, &[]).unwrap();
        let meta = dict.get("when_str").unwrap();
        assert_eq!(meta["title"], json!("When"));
        assert_eq!(meta["format"], json!("dd/MM"));
        assert_eq!(meta["index"], json!(0));
    }

    #[test]
    fn test_optional_columns_appended() {
        let dict = columns_dict(
            &ColumnsSpec::List(vec!["name".to_string()]),
            Some(&description()),
            None,
            None,
            &["score".to_string(), "ghost".to_string(), "name".to_string()],
        )
        .unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get("score").unwrap()["index"], json!(1));
    }
}
