//! Structured clone.
//!
//! Copies the graph reachable from a value into a fresh [`Heap`]. Shared
//! references and cycles are kept through a memo table keyed by source
//! object. Ordinary objects keep only their own enumerable properties: each
//! enumerable getter runs exactly once and its result is stored as data,
//! non-enumerable properties are dropped without being touched, and the
//! prototype is discarded.

use crate::error::{CodecError, CodecResult};
use crate::value::{Heap, Object, ObjectRef, Property, Slot, StructuredValue, Value};
use std::collections::HashMap;

/// Clones `value`, which lives in `heap`, into a self-contained
/// [`StructuredValue`].
///
/// # Errors
///
/// Returns [`CodecError::DataClone`] if the graph reaches a symbol, a
/// function, the global object, or a platform object.
pub fn structured_clone(heap: &Heap, value: &Value) -> CodecResult<StructuredValue> {
    let mut cloner = Cloner {
        source: heap,
        target: Heap::new(),
        memo: HashMap::new(),
    };
    let root = cloner.value(value)?;
    Ok(StructuredValue::new(cloner.target, root))
}

struct Cloner<'a> {
    source: &'a Heap,
    target: Heap,
    memo: HashMap<ObjectRef, ObjectRef>,
}

impl Cloner<'_> {
    fn value(&mut self, value: &Value) -> CodecResult<Value> {
        match value {
            Value::Symbol(description) => Err(CodecError::data_clone(format!(
                "Symbol({description}) could not be cloned"
            ))),
            Value::Object(r) => self.object(*r).map(Value::Object),
            primitive => Ok(primitive.clone()),
        }
    }

    fn object(&mut self, r: ObjectRef) -> CodecResult<ObjectRef> {
        if let Some(&copy) = self.memo.get(&r) {
            return Ok(copy);
        }
        let source = self.source;
        let object = source
            .get(r)
            .ok_or_else(|| CodecError::data_clone(format!("dangling reference {r}")))?;

        // Reserve the slot before descending so cycles resolve to it.
        let copy = self.target.alloc(Object::Global);
        self.memo.insert(r, copy);

        let cloned = match object {
            Object::Function { .. } | Object::Global | Object::Platform { .. } => {
                return Err(CodecError::data_clone(format!(
                    "{} could not be cloned",
                    object.class_name()
                )));
            }
            Object::Boxed(Value::Symbol(_)) => {
                return Err(CodecError::data_clone("Symbol object could not be cloned"));
            }
            Object::Ordinary { properties, .. } => Object::Ordinary {
                properties: self.properties(properties)?,
                prototype: None,
            },
            Object::Array {
                elements,
                properties,
            } => Object::Array {
                elements: elements
                    .iter()
                    .map(|e| e.as_ref().map(|v| self.value(v)).transpose())
                    .collect::<CodecResult<_>>()?,
                properties: self.properties(properties)?,
            },
            Object::View {
                kind,
                buffer,
                byte_offset,
                length,
            } => Object::View {
                kind: *kind,
                buffer: self.object(*buffer)?,
                byte_offset: *byte_offset,
                length: *length,
            },
            Object::Map(entries) => Object::Map(
                entries
                    .iter()
                    .map(|(k, v)| -> CodecResult<(Value, Value)> {
                        Ok((self.value(k)?, self.value(v)?))
                    })
                    .collect::<CodecResult<_>>()?,
            ),
            Object::Set(items) => Object::Set(
                items
                    .iter()
                    .map(|v| self.value(v))
                    .collect::<CodecResult<_>>()?,
            ),
            leaf => leaf.clone(),
        };
        self.target[copy] = cloned;
        Ok(copy)
    }

    fn properties(&mut self, properties: &[Property]) -> CodecResult<Vec<Property>> {
        let source = self.source;
        let mut out = Vec::with_capacity(properties.len());
        for property in properties.iter().filter(|p| p.enumerable) {
            let value = match &property.slot {
                Slot::Data(v) => v.clone(),
                Slot::Accessor(getter) => getter.call(source),
            };
            out.push(Property::data(property.key.clone(), self.value(&value)?));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{ErrorKind, Getter, ViewKind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn primitives_clone_as_themselves() {
        let heap = Heap::new();
        for v in [
            Value::Undefined,
            Value::Null,
            Value::Bool(false),
            Value::Number(-0.0),
            Value::BigInt(-12_345_678_901_234_567_890),
            Value::from("text"),
        ] {
            let cloned = structured_clone(&heap, &v).unwrap();
            assert_eq!(cloned.root(), &v);
            assert!(cloned.heap().is_empty());
        }
    }

    #[test]
    fn symbols_are_rejected() {
        let heap = Heap::new();
        let err = structured_clone(&heap, &Value::Symbol("s".into())).unwrap_err();
        assert!(matches!(err, CodecError::DataClone { .. }));
    }

    #[test]
    fn non_cloneable_objects_are_rejected() {
        for object in [
            Object::Function { name: "f".into() },
            Object::Global,
            Object::Platform {
                interface: "WebSocket".into(),
            },
            Object::Boxed(Value::Symbol("s".into())),
        ] {
            let mut heap = Heap::new();
            let r = heap.alloc(object);
            let wrapper = heap.object([("inner", Value::Object(r))]);
            assert!(structured_clone(&heap, &wrapper).is_err());
        }
    }

    #[test]
    fn cycles_survive() {
        let mut heap = Heap::new();
        let r = heap.object::<&str>([]).as_object().unwrap();
        heap.set_property(r, "me", Value::Object(r));

        let cloned = structured_clone(&heap, &Value::Object(r)).unwrap();
        let root = cloned.root().as_object().unwrap();
        assert_eq!(cloned.heap().own_data_property(root, "me"), Some(&Value::Object(root)));
    }

    #[test]
    fn shared_references_stay_shared() {
        let mut heap = Heap::new();
        let shared = heap.array([Value::from(1)]);
        let root = heap.array([shared.clone(), shared]);

        let cloned = structured_clone(&heap, &root).unwrap();
        let Some(Object::Array { elements: items, .. }) = cloned.root_object() else {
            panic!("expected array");
        };
        assert_eq!(items[0], items[1]);
        assert_eq!(cloned.heap().len(), 2);
    }

    #[test]
    fn getters_run_once_and_non_enumerable_never() {
        let calls = Arc::new(AtomicUsize::new(0));
        let hidden_calls = Arc::new(AtomicUsize::new(0));

        let mut heap = Heap::new();
        let r = heap.object([("plain", Value::from(1))]).as_object().unwrap();
        let counter = Arc::clone(&calls);
        heap.define_getter(
            r,
            "visible",
            Getter::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Value::from("computed")
            }),
            true,
        );
        let counter = Arc::clone(&hidden_calls);
        heap.define_getter(
            r,
            "hidden",
            Getter::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Value::Null
            }),
            false,
        );

        let cloned = structured_clone(&heap, &Value::Object(r)).unwrap();
        let root = cloned.root().as_object().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(hidden_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            cloned.heap().own_data_property(root, "visible"),
            Some(&Value::from("computed"))
        );
        assert_eq!(cloned.heap().own_data_property(root, "hidden"), None);
    }

    #[test]
    fn prototype_is_dropped() {
        let mut heap = Heap::new();
        let proto = heap.object([("inherited", Value::from(1))]).as_object();
        let r = heap.alloc(Object::Ordinary {
            properties: vec![],
            prototype: proto,
        });
        let cloned = structured_clone(&heap, &Value::Object(r)).unwrap();
        assert_eq!(
            cloned.root_object(),
            Some(&Object::Ordinary {
                properties: vec![],
                prototype: None
            })
        );
    }

    #[test]
    fn views_share_a_cloned_buffer() {
        let mut heap = Heap::new();
        let buffer = heap.alloc(Object::ArrayBuffer(vec![1, 2, 3, 4]));
        let a = heap.alloc(Object::View {
            kind: ViewKind::Uint8,
            buffer,
            byte_offset: 0,
            length: 4,
        });
        let b = heap.alloc(Object::View {
            kind: ViewKind::Uint16,
            buffer,
            byte_offset: 2,
            length: 1,
        });
        let root = heap.array([Value::Object(a), Value::Object(b)]);

        let cloned = structured_clone(&heap, &root).unwrap();
        let Some(Object::Array { elements: items, .. }) = cloned.root_object() else {
            panic!("expected array");
        };
        let view = |v: &Option<Value>| {
            let r = v.as_ref().and_then(Value::as_object).unwrap();
            match &cloned.heap()[r] {
                Object::View { buffer, .. } => *buffer,
                other => panic!("expected view, got {other:?}"),
            }
        };
        assert_eq!(view(&items[0]), view(&items[1]));
        let r = items[1].as_ref().and_then(Value::as_object).unwrap();
        assert_eq!(cloned.heap().buffer_source_bytes(r), Some(&[3, 4][..]));
    }

    #[test]
    fn leaf_objects_copy_verbatim() {
        let mut heap = Heap::new();
        let err = heap.alloc(Object::Error {
            kind: ErrorKind::RangeError,
            message: "out".into(),
        });
        let re = heap.alloc(Object::RegExp {
            source: "a+".into(),
            flags: "gi".into(),
        });
        let root = heap.array([Value::Object(err), Value::Object(re)]);
        let cloned = structured_clone(&heap, &root).unwrap();
        assert!(cloned.structurally_eq(&StructuredValue::new(heap, root)));
    }

    #[test]
    fn clone_is_independent_of_source() {
        let mut heap = Heap::new();
        let r = heap.object([("n", Value::from(1))]).as_object().unwrap();
        let cloned = structured_clone(&heap, &Value::Object(r)).unwrap();
        heap.set_property(r, "n", Value::from(2));
        let root = cloned.root().as_object().unwrap();
        assert_eq!(cloned.heap().own_data_property(root, "n"), Some(&Value::from(1)));
    }

    #[test]
    fn array_named_properties_are_cloned() {
        let mut heap = Heap::new();
        let root = heap.array([Value::from("a")]);
        let r = root.as_object().unwrap();
        heap.set_property(r, "id", Value::from(3));
        heap.define_getter(r, "hidden", Getter::new(|_| Value::Null), false);

        let cloned = structured_clone(&heap, &root).unwrap();
        let copy = cloned.root().as_object().unwrap();
        assert_eq!(cloned.heap().own_data_property(copy, "id"), Some(&Value::from(3)));
        let Some(Object::Array { properties, .. }) = cloned.root_object() else {
            panic!("expected array");
        };
        assert_eq!(properties.len(), 1);
    }

    #[test]
    fn map_and_set_entries_are_cloned() {
        let mut heap = Heap::new();
        let key = heap.object([("k", Value::from(1))]);
        let map = heap.alloc(Object::Map(vec![(key.clone(), Value::from("v"))]));
        let set = heap.alloc(Object::Set(vec![key]));
        let root = heap.array([Value::Object(map), Value::Object(set)]);
        let cloned = structured_clone(&heap, &root).unwrap();
        assert!(cloned.structurally_eq(&StructuredValue::new(heap, root)));
    }
}
