//! Property-based test generators using proptest.
//!
//! Provides strategies for keys, key ranges, values and key paths that
//! respect the engine's invariants: numbers are never NaN, and array keys
//! nest only a few levels deep.

use idb_core::{Heap, Key, KeyRange, StructuredValue, Value};
use proptest::prelude::*;

/// Strategy for finite numbers, including both zeros and infinities.
pub fn number_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![
        4 => -1e9f64..1e9,
        1 => Just(0.0),
        1 => Just(-0.0),
        1 => Just(f64::INFINITY),
        1 => Just(f64::NEG_INFINITY),
        1 => Just(f64::MAX),
        1 => Just(f64::MIN_POSITIVE),
    ]
}

/// Strategy for strings, biased toward characters that exercise escaping
/// and UTF-16 ordering.
pub fn key_string_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => prop::string::string_regex("[a-z]{0,8}").expect("Invalid regex"),
        1 => prop::collection::vec(
            prop_oneof![Just('\u{0}'), Just('\u{ff}'), Just('\u{ffff}'), Just('\u{1F600}'), any::<char>()],
            0..6,
        )
        .prop_map(|chars| chars.into_iter().collect()),
    ]
}

/// Strategy for keys of every type, up to three levels of array nesting.
pub fn key_strategy() -> impl Strategy<Value = Key> {
    let leaf = prop_oneof![
        number_strategy().prop_map(Key::Number),
        (-8.64e15f64..8.64e15).prop_map(|t| Key::Date(t.trunc())),
        key_string_strategy().prop_map(Key::String),
        prop::collection::vec(any::<u8>(), 0..12).prop_map(|b| Key::Binary(b.into())),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| prop::collection::vec(inner, 0..4).prop_map(Key::Array))
}

/// Strategy for a sorted, deduplicated batch of keys.
pub fn sorted_keys_strategy(max: usize) -> impl Strategy<Value = Vec<Key>> {
    prop::collection::vec(key_strategy(), 0..max).prop_map(|mut keys| {
        keys.sort();
        keys.dedup();
        keys
    })
}

/// Strategy for key ranges built from two keys. Ranges whose bounds are
/// out of order or open on a single key are skipped.
pub fn key_range_strategy() -> impl Strategy<Value = KeyRange> {
    (key_strategy(), key_strategy(), any::<bool>(), any::<bool>()).prop_filter_map(
        "bounds must be in order",
        |(a, b, lower_open, upper_open)| {
            let (lower, upper) = if a <= b { (a, b) } else { (b, a) };
            KeyRange::bound(lower, upper, lower_open, upper_open).ok()
        },
    )
}

/// Strategy for valid dotted identifier paths.
pub fn key_path_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::string::string_regex("[a-zA-Z_$][a-zA-Z0-9_$]{0,6}").expect("Invalid regex"), 0..4)
        .prop_map(|parts| parts.join("."))
}

/// Strategy for primitive values that clone without a heap.
pub fn primitive_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Undefined),
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        number_strategy().prop_map(Value::Number),
        any::<i64>().prop_map(|n| Value::BigInt(i128::from(n))),
        key_string_strategy().prop_map(Value::String),
    ]
}

/// A tree of values that [`ValueShape::build`] turns into a heap graph.
#[derive(Debug, Clone)]
pub enum ValueShape {
    /// A primitive.
    Primitive(Value),
    /// An ordinary object.
    Object(Vec<(String, ValueShape)>),
    /// An array.
    Array(Vec<ValueShape>),
    /// A `Date`.
    Date(f64),
    /// An `ArrayBuffer`.
    Buffer(Vec<u8>),
}

impl ValueShape {
    /// Allocates the tree on `heap` and returns its root.
    pub fn alloc(&self, heap: &mut Heap) -> Value {
        match self {
            Self::Primitive(value) => value.clone(),
            Self::Object(props) => {
                let props: Vec<(String, Value)> = props.iter().map(|(k, v)| (k.clone(), v.alloc(heap))).collect();
                heap.object(props)
            }
            Self::Array(elements) => {
                let elements: Vec<Value> = elements.iter().map(|e| e.alloc(heap)).collect();
                heap.array(elements)
            }
            Self::Date(time) => heap.date(*time),
            Self::Buffer(bytes) => heap.array_buffer(bytes.clone()),
        }
    }

    /// Builds a standalone structured value.
    pub fn build(&self) -> StructuredValue {
        let mut heap = Heap::new();
        let root = self.alloc(&mut heap);
        StructuredValue::new(heap, root)
    }
}

/// Strategy for cloneable value shapes.
pub fn value_shape_strategy() -> impl Strategy<Value = ValueShape> {
    let leaf = prop_oneof![
        4 => primitive_strategy().prop_map(ValueShape::Primitive),
        1 => (-8.64e15f64..8.64e15).prop_map(ValueShape::Date),
        1 => prop::collection::vec(any::<u8>(), 0..16).prop_map(ValueShape::Buffer),
    ];
    leaf.prop_recursive(3, 32, 5, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(ValueShape::Array),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..5)
                .prop_map(|props| ValueShape::Object(props.into_iter().collect())),
        ]
    })
}

/// Strategy for structured values.
pub fn structured_value_strategy() -> impl Strategy<Value = StructuredValue> {
    value_shape_strategy().prop_map(|tree| tree.build())
}
