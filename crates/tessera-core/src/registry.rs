//! Host function and accessor registries
//!
//! Both registries are assembled once with a builder and never change
//! afterwards; accessors hold them behind an `Arc` and share them across
//! threads.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::accessor::{ArrayAccessor, DataAccessor, Decimator, FrameAccessor, TabularValue};
use crate::config::AccessorConfig;
use crate::data::{DataFrame, Value};

/// Arguments handed to a per-row cell function (style, tooltip, format)
#[derive(Debug, Clone, Copy)]
pub struct CellArgs<'a> {
    /// Cell value when the function is bound to a column
    pub value: Option<&'a Value>,
    /// Row locator
    pub index: usize,
    /// Column names of `row`
    pub columns: &'a [String],
    /// Every value of the row
    pub row: &'a [Value],
    /// Bound column name
    pub column: Option<&'a str>,
}

impl CellArgs<'_> {
    /// Value of another column of the same row
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.row.get(i))
    }
}

/// Per-row function producing a style class, tooltip or formatted text
pub type CellFn = Arc<dyn Fn(&CellArgs<'_>) -> Result<String, String> + Send + Sync>;

/// User aggregate over the values of one group
pub type AggregateFn = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// Builds the comparison table of `(var_name, table, compare_datas)`
pub type CompareFn = Arc<dyn Fn(&str, &DataFrame, &str) -> Option<DataFrame> + Send + Sync>;

/// Receives `(name, value)` change notifications
pub type ChangeFn = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Named host functions available to accessors
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    cell_functions: HashMap<String, CellFn>,
    aggregates: HashMap<String, AggregateFn>,
    decimators: HashMap<String, Arc<dyn Decimator>>,
    compares: HashMap<String, CompareFn>,
    on_change: Option<ChangeFn>,
}

impl FunctionRegistry {
    #[must_use]
    pub fn builder() -> FunctionRegistryBuilder {
        FunctionRegistryBuilder::default()
    }

    #[must_use]
    pub fn cell_function(&self, name: &str) -> Option<&CellFn> {
        self.cell_functions.get(name)
    }

    #[must_use]
    pub fn aggregate(&self, name: &str) -> Option<&AggregateFn> {
        self.aggregates.get(name)
    }

    #[must_use]
    pub fn decimator(&self, name: &str) -> Option<&Arc<dyn Decimator>> {
        self.decimators.get(name)
    }

    #[must_use]
    pub fn compare(&self, name: &str) -> Option<&CompareFn> {
        self.compares.get(name)
    }

    /// Forward a change notification to the host, if one listens
    pub fn notify_change(&self, name: &str, value: &Value) {
        if let Some(on_change) = &self.on_change {
            on_change(name, value);
        }
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn keys<V>(map: &HashMap<String, V>) -> Vec<&String> {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            keys
        }
        f.debug_struct("FunctionRegistry")
            .field("cell_functions", &keys(&self.cell_functions))
            .field("aggregates", &keys(&self.aggregates))
            .field("decimators", &keys(&self.decimators))
            .field("compares", &keys(&self.compares))
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}

/// Builder for [`FunctionRegistry`]
#[derive(Default)]
pub struct FunctionRegistryBuilder {
    registry: FunctionRegistry,
}

impl FunctionRegistryBuilder {
    #[must_use]
    pub fn cell_function<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&CellArgs<'_>) -> Result<String, String> + Send + Sync + 'static,
    {
        self.registry.cell_functions.insert(name.into(), Arc::new(f));
        self
    }

    #[must_use]
    pub fn aggregate<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.registry.aggregates.insert(name.into(), Arc::new(f));
        self
    }

    #[must_use]
    pub fn decimator(mut self, name: impl Into<String>, decimator: impl Decimator + 'static) -> Self {
        self.registry
            .decimators
            .insert(name.into(), Arc::new(decimator));
        self
    }

    #[must_use]
    pub fn compare<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str, &DataFrame, &str) -> Option<DataFrame> + Send + Sync + 'static,
    {
        self.registry.compares.insert(name.into(), Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.registry.on_change = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn build(self) -> FunctionRegistry {
        self.registry
    }
}

/// Chooses the accessor serving a host value
#[derive(Debug, Clone)]
pub struct AccessorRegistry {
    frame: Arc<FrameAccessor>,
    array: Arc<ArrayAccessor>,
}

impl AccessorRegistry {
    /// Build the frame accessor and the array accessor delegating to it
    #[must_use]
    pub fn new(config: AccessorConfig, functions: FunctionRegistry) -> Self {
        let frame = Arc::new(FrameAccessor::new(config, Arc::new(functions)));
        let array = Arc::new(ArrayAccessor::new(Arc::clone(&frame)));
        Self { frame, array }
    }

    /// Accessor for a value: raw arrays go to the array accessor, everything
    /// else to the frame accessor
    #[must_use]
    pub fn accessor_for(&self, value: &TabularValue) -> &dyn DataAccessor {
        match value {
            TabularValue::Array(_) => self.array.as_ref(),
            TabularValue::List(items)
                if !items.is_empty()
                    && items.iter().all(|v| matches!(v, TabularValue::Array(_))) =>
            {
                self.array.as_ref()
            }
            _ => self.frame.as_ref(),
        }
    }

    #[must_use]
    pub fn frame_accessor(&self) -> &Arc<FrameAccessor> {
        &self.frame
    }

    #[must_use]
    pub fn array_accessor(&self) -> &Arc<ArrayAccessor> {
        &self.array
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::ArrayValue;
    use crate::data::Series;
    use std::sync::Mutex;

    #[test]
    fn test_lookup() {
        let registry = FunctionRegistry::builder()
            .cell_function("upper", |args| {
                Ok(args.value.map(ToString::to_string).unwrap_or_default().to_uppercase())
            })
            .aggregate("span", |values| {
                let nums: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
                let max = nums.iter().copied().fold(f64::MIN, f64::max);
                let min = nums.iter().copied().fold(f64::MAX, f64::min);
                Ok(Value::Float(max - min))
            })
            .build();

        assert!(registry.cell_function("upper").is_some());
        assert!(registry.cell_function("lower").is_none());
        let span = registry.aggregate("span").unwrap();
        assert_eq!(
            span(&[Value::Int(1), Value::Float(4.5)]).unwrap(),
            Value::Float(3.5)
        );
    }

    #[test]
    fn test_cell_args_get() {
        let columns = vec!["a".to_string(), "b".to_string()];
        let row = vec![Value::Int(1), Value::string("x")];
        let args = CellArgs {
            value: None,
            index: 0,
            columns: &columns,
            row: &row,
            column: None,
        };
        assert_eq!(args.get("b"), Some(&Value::string("x")));
        assert_eq!(args.get("c"), None);
    }

    #[test]
    fn test_notify_change() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let registry = FunctionRegistry::builder()
            .on_change(move |name, value| {
                sink.lock().unwrap().push((name.to_string(), value.clone()));
            })
            .build();
        registry.notify_change("x.minmax.nb_rows", &Value::Int(10));
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[("x.minmax.nb_rows".to_string(), Value::Int(10))]
        );
    }

    #[test]
    fn test_accessor_for() {
        let registry = AccessorRegistry::new(AccessorConfig::default(), FunctionRegistry::default());
        let array = TabularValue::Array(ArrayValue::from_1d(vec![Value::Int(1)]));
        let series = TabularValue::Series(Series::from_ints("a", vec![1]));
        assert_eq!(registry.accessor_for(&array).name(), "array");
        assert_eq!(registry.accessor_for(&series).name(), "frame");
    }
}
