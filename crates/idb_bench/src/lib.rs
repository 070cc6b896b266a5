//! Benchmark utilities.

use idb_core::{Heap, Key, StructuredValue, Value};
use rand::Rng;

/// Generate random bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate `count` random keys mixing numbers, strings and arrays.
pub fn random_keys(count: usize) -> Vec<Key> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| match rng.gen_range(0..3) {
            0 => Key::Number(rng.gen_range(-1e9..1e9)),
            1 => {
                let len = rng.gen_range(1..24);
                Key::from((0..len).map(|_| rng.gen_range('a'..='z')).collect::<String>())
            }
            _ => Key::Array(vec![Key::Number(f64::from(rng.gen::<u16>())), Key::from("k")]),
        })
        .collect()
}

/// Build a record value: an object with an `id`, a `name` and a `payload`
/// string of `payload_size` characters.
pub fn record(id: u32, payload_size: usize) -> StructuredValue {
    let mut heap = Heap::new();
    let root = heap.object([
        ("id", Value::from(f64::from(id))),
        ("name", Value::from(format!("record-{id}"))),
        ("payload", Value::from("x".repeat(payload_size))),
    ]);
    StructuredValue::new(heap, root)
}

/// Build a nested object tree `depth` levels deep with `width` children
/// per level.
pub fn nested(depth: usize, width: usize) -> StructuredValue {
    fn build(heap: &mut Heap, depth: usize, width: usize) -> Value {
        if depth == 0 {
            return Value::from("leaf");
        }
        let children: Vec<(String, Value)> = (0..width)
            .map(|i| (format!("key_{i}"), build(heap, depth - 1, width)))
            .collect();
        heap.object(children)
    }
    let mut heap = Heap::new();
    let root = build(&mut heap, depth, width);
    StructuredValue::new(heap, root)
}
