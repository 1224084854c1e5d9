//! List-of-values adapters
//!
//! Selectors and trees display host items through an adapter that maps
//! each item to an id, a label and optional children. Adapters are looked up
//! per variable first, then per item type.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeSeq, Serializer};
use tracing::warn;

/// An item of a list of values, as held by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LovItem {
    Text(String),
    Entity {
        id: String,
        label: Option<String>,
        children: Option<Vec<LovItem>>,
    },
    /// Positional form: `(id, label, children)`
    Tuple(Vec<LovItem>),
}

impl LovItem {
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        LovItem::Text(s.into())
    }

    /// Type name used to look up a per-type adapter
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            LovItem::Text(_) => "Text",
            LovItem::Entity { .. } => "Entity",
            LovItem::Tuple(_) => "Tuple",
        }
    }

    fn id(&self) -> String {
        match self {
            LovItem::Text(s) => s.clone(),
            LovItem::Tuple(items) => items.first().map(LovItem::id).unwrap_or_default(),
            LovItem::Entity { id, .. } => id.clone(),
        }
    }

    fn label(&self) -> Option<String> {
        match self {
            LovItem::Text(s) => Some(s.clone()),
            LovItem::Tuple(items) => items.get(1).and_then(LovItem::label),
            LovItem::Entity { label, .. } => label.clone(),
        }
    }

    fn children(&self) -> Option<Vec<LovItem>> {
        match self {
            LovItem::Tuple(items) => match items.get(2)? {
                LovItem::Tuple(children) => Some(children.clone()),
                single => Some(vec![single.clone()]),
            },
            LovItem::Entity { children, .. } => children.clone(),
            LovItem::Text(_) => None,
        }
    }
}

/// Adapted item sent to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LovResult {
    /// Serialised as a plain string
    Id(String),
    /// Serialised as `[id, label]` or `[id, label, children]`
    Item {
        id: String,
        label: String,
        children: Option<Vec<LovResult>>,
    },
}

impl Serialize for LovResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LovResult::Id(id) => serializer.serialize_str(id),
            LovResult::Item {
                id,
                label,
                children,
            } => {
                let len = if children.is_some() { 3 } else { 2 };
                let mut seq = serializer.serialize_seq(Some(len))?;
                seq.serialize_element(id)?;
                seq.serialize_element(label)?;
                if let Some(children) = children {
                    seq.serialize_element(children)?;
                }
                seq.end()
            }
        }
    }
}

/// Host function turning an item into its displayable form
pub type AdapterFn = Arc<dyn Fn(&LovItem) -> Result<LovItem, String> + Send + Sync>;

/// Adapter lookup tables
#[derive(Clone, Default)]
pub struct Adapter {
    for_type: HashMap<String, AdapterFn>,
    type_for_var: HashMap<String, String>,
}

impl Adapter {
    #[must_use]
    pub fn builder() -> AdapterBuilder {
        AdapterBuilder::default()
    }

    /// `type_name`, suffixed until no adapter uses it
    #[must_use]
    pub fn get_unique_type(&self, type_name: &str) -> String {
        let mut name = type_name.to_string();
        let mut index = 0;
        while self.for_type.contains_key(&name) {
            name = format!("{name}{index}");
            index += 1;
        }
        name
    }

    fn for_var(&self, var_name: &str, value: Option<&LovItem>) -> Option<&AdapterFn> {
        match self.type_for_var.get(var_name) {
            Some(type_name) => self.for_type.get(type_name),
            None => self
                .for_type
                .get(var_name)
                .or_else(|| value.and_then(|v| self.for_type.get(v.type_name()))),
        }
    }

    /// Adapt one item of the list bound to `var_name`
    ///
    /// With `id_only`, only the id is produced. Failures are logged and give
    /// `None`.
    #[must_use]
    pub fn run_for_var(&self, var_name: &str, value: &LovItem, id_only: bool) -> Option<LovResult> {
        self.run(self.for_var(var_name, Some(value)), value, var_name, id_only)
    }

    fn run(
        &self,
        adapter: Option<&AdapterFn>,
        value: &LovItem,
        var_name: &str,
        id_only: bool,
    ) -> Option<LovResult> {
        let adapted = match adapter {
            Some(adapter) => match adapter(value) {
                Ok(adapted) => adapted,
                Err(e) => {
                    warn!("Can't run adapter for {var_name}: {e}");
                    return None;
                }
            },
            None => {
                if let LovItem::Text(s) = value {
                    return Some(LovResult::Id(s.clone()));
                }
                value.clone()
            }
        };

        let id = adapted.id();
        if id_only {
            return Some(LovResult::Id(id));
        }
        let Some(label) = adapted.label() else {
            warn!(
                "Adapter for {var_name} did not return a valid result. Please check the documentation on List of Values Adapters."
            );
            return None;
        };
        let children = adapted.children().map(|tree| {
            tree.iter()
                .filter_map(|item| self.run(adapter, item, "adapter", false))
                .collect()
        });
        Some(LovResult::Item {
            id,
            label,
            children,
        })
    }

    /// Every item of a list and of its subtrees, by adapted id
    #[must_use]
    pub fn elements_by_id(&self, var_name: &str, lov: &[LovItem]) -> BTreeMap<String, LovItem> {
        let mut elements = BTreeMap::new();
        let adapter = self.for_var(var_name, lov.first());
        for value in lov {
            let adapted = match adapter {
                Some(adapter) => match adapter(value) {
                    Ok(adapted) => adapted,
                    Err(e) => {
                        warn!("Can't run adapter for {var_name}: {e}");
                        continue;
                    }
                },
                None => value.clone(),
            };
            elements.insert(adapted.id(), value.clone());
            if let Some(children) = adapted.children() {
                elements.extend(self.elements_by_id(var_name, &children));
            }
        }
        elements
    }
}

impl fmt::Debug for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&String> = self.for_type.keys().collect();
        types.sort();
        f.debug_struct("Adapter")
            .field("types", &types)
            .field("type_for_var", &self.type_for_var)
            .finish()
    }
}

/// Builds an [`Adapter`]
#[derive(Default)]
pub struct AdapterBuilder {
    adapter: Adapter,
}

impl AdapterBuilder {
    #[must_use]
    pub fn for_type<F>(mut self, type_name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&LovItem) -> Result<LovItem, String> + Send + Sync + 'static,
    {
        self.adapter.for_type.insert(type_name.into(), Arc::new(f));
        self
    }

    #[must_use]
    pub fn type_for_var(mut self, var_name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.adapter
            .type_for_var
            .insert(var_name.into(), type_name.into());
        self
    }

    #[must_use]
    pub fn build(self) -> Adapter {
        self.adapter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(id: &str, label: &str) -> LovItem {
        LovItem::Entity {
            id: id.to_string(),
            label: Some(label.to_string()),
            children: None,
        }
    }

    #[test]
    fn test_plain_text_is_its_own_id() {
        let adapter = Adapter::default();
        assert_eq!(
            adapter.run_for_var("lov", &LovItem::text("red"), false),
            Some(LovResult::Id("red".to_string()))
        );
    }

    #[test]
    fn test_tuple_tree() {
        let adapter = Adapter::default();
        let tree = LovItem::Tuple(vec![
            LovItem::text("root"),
            LovItem::text("Root"),
            LovItem::Tuple(vec![LovItem::text("leaf")]),
        ]);
        let result = adapter.run_for_var("tree", &tree, false).unwrap();
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!(["root", "Root", ["leaf"]])
        );
    }

    #[test]
    fn test_type_adapter() {
        let adapter = Adapter::builder()
            .for_type("Entity", |item| match item {
                LovItem::Entity { id, label, .. } => Ok(LovItem::Tuple(vec![
                    LovItem::text(id.clone()),
                    LovItem::text(label.clone().unwrap_or_default().to_uppercase()),
                ])),
                _ => Err("not an entity".to_string()),
            })
            .build();
        let result = adapter.run_for_var("users", &entity("u1", "ann"), false).unwrap();
        assert_eq!(serde_json::to_value(&result).unwrap(), json!(["u1", "ANN"]));
        assert_eq!(
            adapter.run_for_var("users", &entity("u1", "ann"), true),
            Some(LovResult::Id("u1".to_string()))
        );
    }

    #[test]
    fn test_var_binding_wins_over_type() {
        let adapter = Adapter::builder()
            .for_type("short", |item| Ok(LovItem::Tuple(vec![LovItem::text(item.id()), LovItem::text("s")])))
            .for_type("Entity", |_| Err("unused".to_string()))
            .type_for_var("users", "short")
            .build();
        let result = adapter.run_for_var("users", &entity("u1", "ann"), false).unwrap();
        assert_eq!(serde_json::to_value(&result).unwrap(), json!(["u1", "s"]));
    }

    #[test]
    fn test_failures_yield_none() {
        let adapter = Adapter::builder()
            .for_type("Entity", |_| Err("boom".to_string()))
            .build();
        assert_eq!(adapter.run_for_var("users", &entity("u1", "ann"), false), None);

        let unlabelled = LovItem::Entity {
            id: "x".to_string(),
            label: None,
            children: None,
        };
        assert_eq!(Adapter::default().run_for_var("v", &unlabelled, false), None);
    }

    #[test]
    fn test_unique_type() {
        let adapter = Adapter::builder().for_type("T", |i| Ok(i.clone())).build();
        assert_eq!(adapter.get_unique_type("T"), "T0");
        assert_eq!(adapter.get_unique_type("U"), "U");
    }

    #[test]
    fn test_elements_by_id_flattens_trees() {
        let tree = LovItem::Entity {
            id: "root".to_string(),
            label: Some("Root".to_string()),
            children: Some(vec![entity("a", "A"), entity("b", "B")]),
        };
        let elements = Adapter::default().elements_by_id("tree", &[tree]);
        assert_eq!(elements.keys().collect::<Vec<_>>(), vec!["a", "b", "root"]);
        assert_eq!(elements["a"], entity("a", "A"));
    }
}
