//! Hooked access to host-owned fields.
//!
//! A host exposes its mutable state through [`FieldStore`]. [`HookedFields`]
//! wraps the store so that every read goes through the `get_field` override
//! hook and every write through the `set_field` chain hook.

use crate::callback::Strategy;
use crate::table::HookTable;
use crate::{names, HookError};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Capability a host implements to expose named fields.
pub trait FieldStore: Send + Sync {
    fn get_field(&self, name: &str) -> Option<Value>;
    fn set_field(&self, name: &str, value: Value);
    fn field_names(&self) -> Vec<String>;
}

/// Coarse JSON kind of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl FieldKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => FieldKind::Null,
            Value::Bool(_) => FieldKind::Bool,
            Value::Number(_) => FieldKind::Number,
            Value::String(_) => FieldKind::String,
            Value::Array(_) => FieldKind::Array,
            Value::Object(_) => FieldKind::Object,
        }
    }
}

/// Name to kind table of every field a store exposes.
///
/// Filled once, either by a background warm-up or lazily on first use,
/// whichever comes first.
#[derive(Debug, Default)]
pub struct FieldCatalog {
    kinds: OnceLock<HashMap<String, FieldKind>>,
}

impl FieldCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the catalog from `store`. Returns the number of catalogued
    /// fields; a second call keeps the first result.
    pub fn warm(&self, store: &dyn FieldStore) -> usize {
        self.kinds.get_or_init(|| Self::build(store)).len()
    }

    pub fn is_warm(&self) -> bool {
        self.kinds.get().is_some()
    }

    /// Kind of a field, building the catalog if the warm-up never ran.
    pub fn kind_of(&self, name: &str, store: &dyn FieldStore) -> Option<FieldKind> {
        self.kinds
            .get_or_init(|| {
                debug!("Field catalog requested before warm-up, building it now");
                Self::build(store)
            })
            .get(name)
            .copied()
    }

    pub fn len(&self) -> usize {
        self.kinds.get().map(HashMap::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn build(store: &dyn FieldStore) -> HashMap<String, FieldKind> {
        store
            .field_names()
            .into_iter()
            .filter_map(|name| {
                let kind = FieldKind::of(&store.get_field(&name)?);
                Some((name, kind))
            })
            .collect()
    }
}

/// Field access routed through the field hooks.
pub struct HookedFields {
    store: Arc<dyn FieldStore>,
    hooks: Arc<HookTable>,
    catalog: Arc<FieldCatalog>,
}

impl HookedFields {
    /// Wraps `store` and declares the two field hooks on `hooks`.
    pub fn new(store: Arc<dyn FieldStore>, hooks: Arc<HookTable>) -> Result<Self, HookError> {
        hooks.register(names::GET_FIELD, Strategy::Override)?;
        hooks.register(names::SET_FIELD, Strategy::Chain)?;
        Ok(Self {
            store,
            hooks,
            catalog: Arc::new(FieldCatalog::new()),
        })
    }

    pub fn store(&self) -> Arc<dyn FieldStore> {
        self.store.clone()
    }

    pub fn catalog(&self) -> Arc<FieldCatalog> {
        self.catalog.clone()
    }

    /// Reads a field. The stored value (or null) is the override baseline.
    pub fn get(&self, name: &str) -> Result<Value, HookError> {
        let baseline = self.store.get_field(name).unwrap_or(Value::Null);
        self.hooks
            .dispatch_override(names::GET_FIELD, &json!({ "field": name }), baseline)
    }

    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, HookError> {
        Ok(serde_json::from_value(self.get(name)?)?)
    }

    /// Writes a field after letting `set_field` subscribers rewrite the value.
    ///
    /// If the rewritten value no longer matches the catalogued kind of the
    /// field, the caller's original value is stored instead.
    pub fn set(&self, name: &str, value: Value) -> Result<(), HookError> {
        let proposed =
            self.hooks
                .dispatch_chain(names::SET_FIELD, &json!({ "field": name }), value.clone())?;

        let stored = match self.catalog.kind_of(name, self.store.as_ref()) {
            Some(kind) if kind != FieldKind::of(&proposed) => {
                warn!(
                    field = name,
                    "⚠️ set_field subscribers produced {:?} for a {:?} field, keeping the original value",
                    FieldKind::of(&proposed),
                    kind
                );
                value
            }
            _ => proposed,
        };

        self.store.set_field(name, stored);
        Ok(())
    }
}

/// Concurrent in-memory [`FieldStore`].
#[derive(Debug, Default)]
pub struct MapFieldStore {
    fields: DashMap<String, Value>,
}

impl MapFieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }
}

impl FieldStore for MapFieldStore {
    fn get_field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).map(|entry| entry.value().clone())
    }

    fn set_field(&self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HookCallback;

    fn player() -> Arc<MapFieldStore> {
        Arc::new(
            MapFieldStore::new()
                .with_field("health", json!(5))
                .with_field("can_dash", json!(false))
                .with_field("name", json!("knight")),
        )
    }

    #[test]
    fn test_get_routes_through_override() {
        let hooks = Arc::new(HookTable::new());
        let fields = HookedFields::new(player(), hooks.clone()).unwrap();

        hooks
            .subscribe(
                names::GET_FIELD,
                HookCallback::overriding(|args, baseline| {
                    if args["field"] == "can_dash" {
                        Ok(json!(true))
                    } else {
                        Ok(baseline.clone())
                    }
                }),
                Some("dash_unlock"),
            )
            .unwrap();

        assert!(fields.get_as::<bool>("can_dash").unwrap());
        assert_eq!(fields.get_as::<i64>("health").unwrap(), 5);
        assert_eq!(fields.get("missing").unwrap(), Value::Null);
    }

    #[test]
    fn test_set_routes_through_chain() {
        let hooks = Arc::new(HookTable::new());
        let store = player();
        let fields = HookedFields::new(store.clone(), hooks.clone()).unwrap();

        hooks
            .subscribe(
                names::SET_FIELD,
                HookCallback::chain(|args, value| {
                    if args["field"] == "health" {
                        Ok(json!(value.as_i64().unwrap_or(0).max(1)))
                    } else {
                        Ok(value)
                    }
                }),
                None,
            )
            .unwrap();

        fields.set("health", json!(0)).unwrap();
        assert_eq!(store.get_field("health"), Some(json!(1)));
    }

    #[test]
    fn test_set_rejects_kind_change() {
        let hooks = Arc::new(HookTable::new());
        let store = player();
        let fields = HookedFields::new(store.clone(), hooks.clone()).unwrap();
        hooks
            .subscribe(
                names::SET_FIELD,
                HookCallback::chain(|_, _| Ok(json!("not a number"))),
                None,
            )
            .unwrap();

        fields.set("health", json!(3)).unwrap();
        assert_eq!(store.get_field("health"), Some(json!(3)));

        // Uncatalogued fields accept whatever the chain produced.
        fields.set("new_field", json!(1)).unwrap();
        assert_eq!(store.get_field("new_field"), Some(json!("not a number")));
    }

    #[test]
    fn test_catalog_lazy_and_warm() {
        let store = player();
        let catalog = FieldCatalog::new();
        assert!(!catalog.is_warm());
        assert_eq!(catalog.kind_of("can_dash", store.as_ref()), Some(FieldKind::Bool));
        assert!(catalog.is_warm());

        let warmed = FieldCatalog::new();
        assert_eq!(warmed.warm(store.as_ref()), 3);
        assert_eq!(warmed.kind_of("name", store.as_ref()), Some(FieldKind::String));
    }

    #[test]
    fn test_field_hooks_strategy_conflict() {
        let hooks = Arc::new(HookTable::new());
        hooks.register(names::GET_FIELD, Strategy::Chain).unwrap();
        assert!(HookedFields::new(player(), hooks).is_err());
    }
}
