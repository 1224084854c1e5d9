//! Request and response payloads exchanged with the front-end widget

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::Deserializer;
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use super::columns::ColumnsSpec;
use crate::data::DataFrame;

/// Ordered `key -> function name` pairs (styles, tooltips, formats, applies)
pub type FunctionMap = Vec<(String, String)>;

/// Output encoding of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataFormat {
    #[serde(rename = "JSON")]
    Json,
    #[serde(rename = "ARROW")]
    ApacheArrow,
    /// Only used by CSV export
    #[serde(rename = "CSV")]
    Csv,
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormat::Json => write!(f, "JSON"),
            DataFormat::ApacheArrow => write!(f, "ARROW"),
            DataFormat::Csv => write!(f, "CSV"),
        }
    }
}

/// Row layout of JSON data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orient {
    /// One object per row
    Records,
    /// One array per column
    List,
}

/// Row filter clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    pub col: String,
    #[serde(default)]
    pub value: serde_json::Value,
    pub action: String,
    #[serde(rename = "matchCase", default = "default_true")]
    pub match_case: bool,
}

fn default_true() -> bool {
    true
}

/// Visible x range of a zoomed chart
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomWindow {
    pub x0: f64,
    pub x1: f64,
}

/// One trace of a chart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecimatorSpec {
    /// Registered decimator name; axis-only when absent
    #[serde(default)]
    pub decimator: Option<String>,
    #[serde(rename = "xAxis", default)]
    pub x_axis: String,
    #[serde(rename = "yAxis", default)]
    pub y_axis: String,
    #[serde(rename = "zAxis", default)]
    pub z_axis: Option<String>,
    #[serde(rename = "chartMode", default)]
    pub chart_mode: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DecimatorSpec {
    /// The x, y and (when set) z column names
    #[must_use]
    pub fn axes(&self) -> Vec<&str> {
        let mut axes = vec![self.x_axis.as_str(), self.y_axis.as_str()];
        if let Some(z) = self.z_axis.as_deref().filter(|z| !z.is_empty()) {
            axes.push(z);
        }
        axes
    }
}

/// Chart geometry shared by every trace's decimator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecimatorPayload {
    #[serde(default)]
    pub decimators: Vec<Option<DecimatorSpec>>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub zoom: Option<ZoomWindow>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Page request sent by a table or chart
///
/// Every key is optional; see the field docs for defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DataRequest {
    /// Opaque key echoed back; the configured default when absent
    pub pagekey: Option<String>,
    /// Requested columns; all columns when empty
    ///
    /// Accepts a list or a single `;`-separated string.
    #[serde(deserialize_with = "column_list")]
    pub columns: Vec<String>,
    /// First row, an integer or a base-10 string
    pub start: Option<serde_json::Value>,
    /// Last row (inclusive), an integer or a base-10 string
    pub end: Option<serde_json::Value>,
    pub reverse: bool,
    pub filters: Vec<FilterClause>,
    pub orderby: Option<String>,
    /// `"asc"` or `"desc"`
    pub sort: Option<String>,
    /// Group-by columns
    pub aggregates: Vec<String>,
    /// Column -> aggregate function name; grouping needs an object here,
    /// even an empty one
    #[serde(deserialize_with = "optional_pairs")]
    pub applies: Option<FunctionMap>,
    #[serde(deserialize_with = "ordered_pairs")]
    pub styles: FunctionMap,
    #[serde(deserialize_with = "ordered_pairs")]
    pub tooltips: FunctionMap,
    #[serde(deserialize_with = "ordered_pairs")]
    pub formats: FunctionMap,
    #[serde(rename = "decimatorPayload")]
    pub decimator_payload: DecimatorPayload,
    /// Full, unpaged extraction (charts)
    pub alldata: bool,
    /// Emit `"NaT"` instead of `null` for missing dates
    pub handlenan: bool,
    /// Registered comparison function name
    pub compare: Option<String>,
    pub compare_datas: String,
    /// Echoed back untouched
    pub infinite: Option<serde_json::Value>,
}

impl DataRequest {
    /// Request for every row, as used by chart traces and CSV export
    #[must_use]
    pub fn all_data() -> Self {
        Self {
            alldata: true,
            ..Self::default()
        }
    }

    /// Whether rows are sorted descending
    #[must_use]
    pub fn is_descending(&self) -> bool {
        self.sort.as_deref() == Some("desc")
    }
}

/// Accepts a JSON object (kept in document order) or `null`
fn ordered_pairs<'de, D>(deserializer: D) -> Result<FunctionMap, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_pairs(deserializer)?.unwrap_or_default())
}

fn optional_pairs<'de, D>(deserializer: D) -> Result<Option<FunctionMap>, D::Error>
where
    D: Deserializer<'de>,
{
    let map: Option<serde_json::Map<String, serde_json::Value>> =
        Option::deserialize(deserializer)?;
    Ok(map.map(|map| {
        map.into_iter()
            .filter_map(|(k, v)| match v {
                serde_json::Value::String(s) => Some((k, s)),
                _ => None,
            })
            .collect()
    }))
}

/// Accepts a list of names, a `;`-separated string, a name -> metadata
/// object or `null`
fn column_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<ColumnsSpec>::deserialize(deserializer)? {
        Some(ColumnsSpec::List(names)) => names,
        Some(ColumnsSpec::Text(text)) => text
            .split(';')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
        Some(ColumnsSpec::Map(map)) => map.into_iter().map(|(name, _)| name).collect(),
        None => Vec::new(),
    })
}

/// Locator and cell payload for `on_edit`, `on_delete` and `on_add`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationRequest {
    /// Row locator; must be a JSON number
    pub index: Option<serde_json::Value>,
    /// Edited column
    pub col: Option<String>,
    /// New cell value
    pub value: Option<serde_json::Value>,
}

impl MutationRequest {
    #[must_use]
    pub fn at(index: impl Into<serde_json::Value>) -> Self {
        Self {
            index: Some(index.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn edit(
        index: impl Into<serde_json::Value>,
        col: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            index: Some(index.into()),
            col: Some(col.into()),
            value: Some(value.into()),
        }
    }
}

/// Encoded rows of a page
#[derive(Debug, Clone, PartialEq)]
pub enum PageData {
    /// Records or column lists
    Json(serde_json::Value),
    /// Arrow IPC stream, base64 encoded on the wire
    Arrow(Vec<u8>),
    /// One entry per table of a multi-table value
    Multi(Vec<Option<PageData>>),
}

impl Serialize for PageData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PageData::Json(value) => value.serialize(serializer),
            PageData::Arrow(bytes) => serializer.serialize_str(&BASE64.encode(bytes)),
            PageData::Multi(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// The `value` block of a response
///
/// Absent fields are not serialised, so `PageValue::default()` is `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<DataFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rowcount: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fullrowcount: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<usize>,
    #[serde(rename = "dataExtraction", skip_serializing_if = "Option::is_none")]
    pub data_extraction: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PageData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orient: Option<Orient>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comp: Option<PageData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multi: Option<bool>,
}

impl PageValue {
    /// Overwrite metadata with every field set in `other`, except `data`
    pub fn merge_meta(&mut self, other: PageValue) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        take!(format, rowcount, fullrowcount, start, data_extraction, orient, comp, multi);
    }

    /// Number of encoded JSON rows, when the data is JSON records
    #[must_use]
    pub fn record_count(&self) -> Option<usize> {
        match &self.data {
            Some(PageData::Json(serde_json::Value::Array(rows))) => Some(rows.len()),
            _ => None,
        }
    }
}

/// Response envelope returned by `get_data`
#[derive(Debug, Clone, Default, Serialize)]
pub struct DataResponse {
    pub pagekey: String,
    pub value: PageValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alldata: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infinite: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Soft failures recorded while serving the request
    #[serde(skip)]
    pub warnings: Vec<String>,
    /// Transferred table of a CSV export
    #[serde(skip)]
    pub frame: Option<DataFrame>,
}

impl DataResponse {
    #[must_use]
    pub fn new(pagekey: impl Into<String>) -> Self {
        Self {
            pagekey: pagekey.into(),
            ..Self::default()
        }
    }

    /// Serialise to a JSON value
    ///
    /// # Errors
    /// Returns error if serialisation fails
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_defaults() {
        let request: DataRequest = serde_json::from_value(json!({})).unwrap();
        assert!(request.columns.is_empty());
        assert!(!request.alldata);
        assert!(request.pagekey.is_none());
    }

    #[test]
    fn test_request_keys() {
        let request: DataRequest = serde_json::from_value(json!({
            "pagekey": "0-100--asc",
            "start": "0",
            "end": 99,
            "filters": [{"col": "name", "value": "Al", "action": "contains"}],
            "styles": {"b": "style_fn", "a": "other_fn", "ignored": 3},
            "decimatorPayload": {"width": 800, "decimators": [null, {"xAxis": "x", "yAxis": "y"}]},
            "compare_datas": "ref"
        }))
        .unwrap();
        assert_eq!(request.start, Some(json!("0")));
        assert!(request.filters[0].match_case);
        assert_eq!(
            request.styles,
            vec![
                ("b".to_string(), "style_fn".to_string()),
                ("a".to_string(), "other_fn".to_string())
            ]
        );
        assert_eq!(request.decimator_payload.width, Some(800.0));
        assert!(request.decimator_payload.decimators[0].is_none());
        assert_eq!(request.compare_datas, "ref");
    }

    #[test]
    fn test_columns_list_or_joined_string() {
        let joined: DataRequest =
            serde_json::from_value(json!({"columns": "dept;salary"})).unwrap();
        assert_eq!(joined.columns, vec!["dept", "salary"]);

        let list: DataRequest =
            serde_json::from_value(json!({"columns": ["dept", "salary"]})).unwrap();
        assert_eq!(list.columns, joined.columns);

        let map: DataRequest =
            serde_json::from_value(json!({"columns": {"salary": {}, "dept": {}}})).unwrap();
        assert_eq!(map.columns, vec!["salary", "dept"]);

        let null: DataRequest = serde_json::from_value(json!({"columns": null})).unwrap();
        assert!(null.columns.is_empty());
    }

    #[test]
    fn test_applies_presence() {
        let absent: DataRequest = serde_json::from_value(json!({"aggregates": ["a"]})).unwrap();
        assert!(absent.applies.is_none());

        let empty: DataRequest =
            serde_json::from_value(json!({"aggregates": ["a"], "applies": {}})).unwrap();
        assert_eq!(empty.applies, Some(Vec::new()));
    }

    #[test]
    fn test_empty_value_serialises_to_empty_object() {
        assert_eq!(serde_json::to_value(PageValue::default()).unwrap(), json!({}));
    }

    #[test]
    fn test_arrow_data_is_base64() {
        let data = PageData::Arrow(vec![0, 1, 2]);
        assert_eq!(serde_json::to_value(&data).unwrap(), json!("AAEC"));
    }

    #[test]
    fn test_merge_meta_keeps_data() {
        let mut value = PageValue {
            data: Some(PageData::Json(json!([]))),
            ..PageValue::default()
        };
        value.merge_meta(PageValue {
            rowcount: Some(3),
            format: Some(DataFormat::Json),
            ..PageValue::default()
        });
        assert_eq!(value.rowcount, Some(3));
        assert!(value.data.is_some());
    }

    #[test]
    fn test_axes() {
        let spec = DecimatorSpec {
            x_axis: "x".into(),
            y_axis: "y".into(),
            z_axis: Some(String::new()),
            ..DecimatorSpec::default()
        };
        assert_eq!(spec.axes(), vec!["x", "y"]);
    }
}
