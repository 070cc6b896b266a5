//! Conversion between structured values and JSON.

use crate::value::{Heap, Object, ObjectRef, Slot, StructuredValue, Value};
use serde_json::{Map, Number};

impl StructuredValue {
    /// Builds a structured value from JSON. Objects become ordinary objects
    /// with enumerable data properties, arrays become dense arrays.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        let mut heap = Heap::new();
        let root = import(&mut heap, json);
        Self::new(heap, root)
    }

    /// Renders the value as JSON.
    ///
    /// Returns `None` when the graph holds anything JSON cannot express:
    /// `undefined`, non-finite numbers, bigints, symbols, cycles, or objects
    /// other than ordinary objects and arrays. Array holes render as `null`.
    #[must_use]
    pub fn to_json(&self) -> Option<serde_json::Value> {
        export(self.heap(), self.root(), &mut Vec::new())
    }
}

fn import(heap: &mut Heap, json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(|item| import(heap, item)).collect();
            heap.array(values)
        }
        serde_json::Value::Object(map) => {
            let props: Vec<(String, Value)> = map
                .iter()
                .map(|(k, v)| (k.clone(), import(heap, v)))
                .collect();
            heap.object(props)
        }
    }
}

fn export(heap: &Heap, value: &Value, path: &mut Vec<ObjectRef>) -> Option<serde_json::Value> {
    match value {
        Value::Null => Some(serde_json::Value::Null),
        Value::Bool(b) => Some(serde_json::Value::Bool(*b)),
        Value::Number(n) => Number::from_f64(*n).map(serde_json::Value::Number),
        Value::String(s) => Some(serde_json::Value::String(s.clone())),
        Value::Object(r) => {
            if path.contains(r) {
                return None;
            }
            path.push(*r);
            let out = match heap.get(*r)? {
                Object::Array { elements: items, .. } => items
                    .iter()
                    .map(|item| match item {
                        Some(v) => export(heap, v, path),
                        None => Some(serde_json::Value::Null),
                    })
                    .collect::<Option<Vec<_>>>()
                    .map(serde_json::Value::Array),
                Object::Ordinary { properties, .. } => {
                    let mut map = Map::new();
                    for property in properties.iter().filter(|p| p.enumerable) {
                        let Slot::Data(v) = &property.slot else {
                            return None;
                        };
                        map.insert(property.key.clone(), export(heap, v, path)?);
                    }
                    Some(serde_json::Value::Object(map))
                }
                _ => None,
            };
            path.pop();
            out
        }
        Value::Undefined | Value::BigInt(_) | Value::Symbol(_) => None,
    }
}
