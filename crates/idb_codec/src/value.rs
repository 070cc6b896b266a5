//! Structured values.
//!
//! Values that can be stored live in a [`Heap`]: primitives are held inline in
//! [`Value`], everything else is an [`Object`] addressed by an [`ObjectRef`].
//! Because objects refer to each other by reference, a heap can express
//! shared sub-objects and cycles, which structured clone must preserve.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::sync::Arc;

/// Reference to an object inside a [`Heap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef(u32);

impl ObjectRef {
    /// Returns the slot index of this reference.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A value: either a primitive or a reference to a heap object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// `undefined`.
    Undefined,
    /// `null`.
    Null,
    /// A boolean.
    Bool(bool),
    /// A double-precision number.
    Number(f64),
    /// An arbitrary-precision integer, limited to 128 bits here.
    BigInt(i128),
    /// A string.
    String(String),
    /// A symbol with its description. Never cloneable.
    Symbol(String),
    /// A heap object.
    Object(ObjectRef),
}

impl Value {
    /// Returns the object reference if this is an object.
    #[must_use]
    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            Self::Object(r) => Some(*r),
            _ => None,
        }
    }

    /// Returns the number if this is a number.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true for `undefined`.
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// A short name of the value's type, used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::BigInt(_) => "bigint",
            Self::String(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::Object(_) => "object",
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<ObjectRef> for Value {
    fn from(r: ObjectRef) -> Self {
        Self::Object(r)
    }
}

/// A property getter, run against the heap that owns the object.
#[derive(Clone)]
pub struct Getter(Arc<dyn Fn(&Heap) -> Value + Send + Sync>);

impl Getter {
    /// Wraps a closure as a getter.
    pub fn new(f: impl Fn(&Heap) -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Invokes the getter.
    #[must_use]
    pub fn call(&self, heap: &Heap) -> Value {
        (self.0)(heap)
    }
}

impl fmt::Debug for Getter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Getter(..)")
    }
}

impl PartialEq for Getter {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// The slot of an own property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Slot {
    /// A plain data property.
    Data(Value),
    /// An accessor property. Only exists on values that were never cloned.
    #[serde(skip)]
    Accessor(Getter),
}

/// A named own property of an ordinary object or an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Property name.
    pub key: String,
    /// Data or accessor slot.
    pub slot: Slot,
    /// Whether the property shows up in enumeration.
    pub enumerable: bool,
}

impl Property {
    /// An enumerable data property.
    pub fn data(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            slot: Slot::Data(value),
            enumerable: true,
        }
    }
}

/// Element type of a typed-array view, or `DataView`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum ViewKind {
    Int8,
    Uint8,
    Uint8Clamped,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
    BigInt64,
    BigUint64,
    DataView,
}

impl ViewKind {
    /// Size in bytes of one element.
    #[must_use]
    pub const fn element_size(self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 | Self::Uint8Clamped | Self::DataView => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Float64 | Self::BigInt64 | Self::BigUint64 => 8,
        }
    }
}

/// Error constructor of an `Error` object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum ErrorKind {
    Error,
    EvalError,
    RangeError,
    ReferenceError,
    SyntaxError,
    TypeError,
    UriError,
}

impl ErrorKind {
    /// Maps an error name to its kind. Unknown names become `Error`.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "EvalError" => Self::EvalError,
            "RangeError" => Self::RangeError,
            "ReferenceError" => Self::ReferenceError,
            "SyntaxError" => Self::SyntaxError,
            "TypeError" => Self::TypeError,
            "URIError" => Self::UriError,
            _ => Self::Error,
        }
    }

    /// The constructor name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::EvalError => "EvalError",
            Self::RangeError => "RangeError",
            Self::ReferenceError => "ReferenceError",
            Self::SyntaxError => "SyntaxError",
            Self::TypeError => "TypeError",
            Self::UriError => "URIError",
        }
    }
}

/// Blob contents and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blob {
    /// Contents.
    pub data: Bytes,
    /// MIME type, possibly empty.
    pub mime_type: String,
}

/// A file: a blob with a name and modification time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    /// Contents and type.
    pub blob: Blob,
    /// File name.
    pub name: String,
    /// Last modification time in milliseconds since the epoch.
    pub last_modified: f64,
}

/// RGBA pixel data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes of pixel data.
    pub data: Bytes,
}

/// Geometry value objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    /// `DOMPoint` / `DOMPointReadOnly`.
    Point {
        /// Coordinates `x, y, z, w`.
        coords: [f64; 4],
        /// Read-only variant.
        read_only: bool,
    },
    /// `DOMRect` / `DOMRectReadOnly`.
    Rect {
        /// `x, y, width, height`.
        dims: [f64; 4],
        /// Read-only variant.
        read_only: bool,
    },
    /// `DOMQuad`: four points.
    Quad {
        /// Corner points, each `x, y, z, w`.
        points: [[f64; 4]; 4],
    },
    /// `DOMMatrix` / `DOMMatrixReadOnly`, stored as 16 elements.
    Matrix {
        /// Column-major elements `m11..m44`.
        elements: Vec<f64>,
        /// Whether the matrix is 2D.
        is_2d: bool,
        /// Read-only variant.
        read_only: bool,
    },
}

/// A heap object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Object {
    /// A plain object with ordered own properties.
    Ordinary {
        /// Own properties in insertion order.
        properties: Vec<Property>,
        /// Prototype object, never followed by clone or key paths.
        prototype: Option<ObjectRef>,
    },
    /// An array; `None` entries are holes.
    Array {
        /// Indexed elements.
        elements: Vec<Option<Value>>,
        /// Named own properties besides the indices and `length`.
        properties: Vec<Property>,
    },
    /// A `Date` holding its time value.
    Date(f64),
    /// A regular expression.
    RegExp {
        /// Pattern source.
        source: String,
        /// Flags.
        flags: String,
    },
    /// A boxed primitive (`new Number(1)`, `new String("a")`, ...).
    Boxed(Value),
    /// An `ArrayBuffer`.
    ArrayBuffer(Vec<u8>),
    /// A typed-array or `DataView` over an `ArrayBuffer`.
    View {
        /// Element type.
        kind: ViewKind,
        /// The viewed buffer.
        buffer: ObjectRef,
        /// Offset into the buffer in bytes.
        byte_offset: usize,
        /// Length in elements.
        length: usize,
    },
    /// A `Map` in insertion order.
    Map(Vec<(Value, Value)>),
    /// A `Set` in insertion order.
    Set(Vec<Value>),
    /// An `Error` or one of its standard subclasses.
    Error {
        /// Constructor.
        kind: ErrorKind,
        /// Message.
        message: String,
    },
    /// A `Blob`.
    Blob(Blob),
    /// A `File`.
    File(File),
    /// An `ImageData`.
    ImageData(ImageData),
    /// A geometry value.
    Geometry(Geometry),
    /// A function. Not cloneable.
    Function {
        /// Function name.
        name: String,
    },
    /// The global object. Not cloneable.
    Global,
    /// A platform object without a serialization. Not cloneable.
    Platform {
        /// Interface name.
        interface: String,
    },
}

impl Object {
    /// An ordinary object with enumerable data properties and no prototype.
    pub fn ordinary<K: Into<String>>(props: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Ordinary {
            properties: props
                .into_iter()
                .map(|(k, v)| Property::data(k, v))
                .collect(),
            prototype: None,
        }
    }

    /// A dense array.
    pub fn array(elements: impl IntoIterator<Item = Value>) -> Self {
        Self::Array {
            elements: elements.into_iter().map(Some).collect(),
            properties: Vec::new(),
        }
    }

    /// The object's class name, used in error messages.
    #[must_use]
    pub fn class_name(&self) -> &str {
        match self {
            Self::Ordinary { .. } => "Object",
            Self::Array { .. } => "Array",
            Self::Date(_) => "Date",
            Self::RegExp { .. } => "RegExp",
            Self::Boxed(_) => "boxed primitive",
            Self::ArrayBuffer(_) => "ArrayBuffer",
            Self::View { .. } => "ArrayBufferView",
            Self::Map(_) => "Map",
            Self::Set(_) => "Set",
            Self::Error { kind, .. } => kind.name(),
            Self::Blob(_) => "Blob",
            Self::File(_) => "File",
            Self::ImageData(_) => "ImageData",
            Self::Geometry(_) => "geometry",
            Self::Function { .. } => "Function",
            Self::Global => "global",
            Self::Platform { interface } => interface,
        }
    }
}

/// Arena holding every object a value graph can reach.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Heap {
    objects: Vec<Object>,
}

impl Heap {
    /// Creates an empty heap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of allocated objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if nothing has been allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Allocates an object and returns its reference.
    pub fn alloc(&mut self, object: Object) -> ObjectRef {
        let index = u32::try_from(self.objects.len()).unwrap_or(u32::MAX);
        self.objects.push(object);
        ObjectRef(index)
    }

    /// Returns the object behind a reference.
    #[must_use]
    pub fn get(&self, r: ObjectRef) -> Option<&Object> {
        self.objects.get(r.index())
    }

    /// Returns the object behind a reference mutably.
    pub fn get_mut(&mut self, r: ObjectRef) -> Option<&mut Object> {
        self.objects.get_mut(r.index())
    }

    /// Allocates an ordinary object and returns it as a value.
    pub fn object<K: Into<String>>(&mut self, props: impl IntoIterator<Item = (K, Value)>) -> Value {
        Value::Object(self.alloc(Object::ordinary(props)))
    }

    /// Allocates a dense array and returns it as a value.
    pub fn array(&mut self, elements: impl IntoIterator<Item = Value>) -> Value {
        Value::Object(self.alloc(Object::array(elements)))
    }

    /// Allocates a `Date`.
    pub fn date(&mut self, time: f64) -> Value {
        Value::Object(self.alloc(Object::Date(time)))
    }

    /// Allocates an `ArrayBuffer`.
    pub fn array_buffer(&mut self, bytes: impl Into<Vec<u8>>) -> Value {
        Value::Object(self.alloc(Object::ArrayBuffer(bytes.into())))
    }

    /// Allocates a fresh buffer holding `bytes` and a view of `kind` over all of it.
    pub fn typed_array(&mut self, kind: ViewKind, bytes: impl Into<Vec<u8>>) -> Value {
        let bytes = bytes.into();
        let length = bytes.len() / kind.element_size();
        let buffer = self.alloc(Object::ArrayBuffer(bytes));
        Value::Object(self.alloc(Object::View {
            kind,
            buffer,
            byte_offset: 0,
            length,
        }))
    }

    /// Returns the value of a named own data property of an ordinary object
    /// or an array.
    ///
    /// Accessor properties yield `None`: they only exist on uncloned values.
    #[must_use]
    pub fn own_data_property(&self, r: ObjectRef, key: &str) -> Option<&Value> {
        match self.get(r)? {
            Object::Ordinary { properties, .. } | Object::Array { properties, .. } => properties
                .iter()
                .find(|p| p.key == key)
                .and_then(|p| match &p.slot {
                    Slot::Data(v) => Some(v),
                    Slot::Accessor(_) => None,
                }),
            _ => None,
        }
    }

    /// Creates or overwrites an enumerable named data property on an
    /// ordinary object or an array.
    ///
    /// Returns false if `r` is neither.
    pub fn set_property(&mut self, r: ObjectRef, key: &str, value: Value) -> bool {
        let properties = match self.get_mut(r) {
            Some(Object::Ordinary { properties, .. } | Object::Array { properties, .. }) => {
                properties
            }
            _ => return false,
        };
        match properties.iter_mut().find(|p| p.key == key) {
            Some(p) => {
                p.slot = Slot::Data(value);
                p.enumerable = true;
            }
            None => properties.push(Property::data(key, value)),
        }
        true
    }

    /// Defines an accessor property on an ordinary object or an array.
    ///
    /// Returns false if `r` is neither.
    pub fn define_getter(
        &mut self,
        r: ObjectRef,
        key: &str,
        getter: Getter,
        enumerable: bool,
    ) -> bool {
        let properties = match self.get_mut(r) {
            Some(Object::Ordinary { properties, .. } | Object::Array { properties, .. }) => {
                properties
            }
            _ => return false,
        };
        properties.retain(|p| p.key != key);
        properties.push(Property {
            key: key.to_string(),
            slot: Slot::Accessor(getter),
            enumerable,
        });
        true
    }

    /// Returns the bytes a buffer or view covers.
    #[must_use]
    pub fn buffer_source_bytes(&self, r: ObjectRef) -> Option<&[u8]> {
        match self.get(r)? {
            Object::ArrayBuffer(bytes) => Some(bytes),
            Object::View {
                kind,
                buffer,
                byte_offset,
                length,
            } => {
                let Object::ArrayBuffer(bytes) = self.get(*buffer)? else {
                    return None;
                };
                let end = byte_offset.checked_add(length.checked_mul(kind.element_size())?)?;
                bytes.get(*byte_offset..end)
            }
            _ => None,
        }
    }
}

impl Index<ObjectRef> for Heap {
    type Output = Object;

    /// # Panics
    ///
    /// Panics if the reference belongs to another heap.
    fn index(&self, r: ObjectRef) -> &Object {
        &self.objects[r.index()]
    }
}

impl IndexMut<ObjectRef> for Heap {
    fn index_mut(&mut self, r: ObjectRef) -> &mut Object {
        &mut self.objects[r.index()]
    }
}

/// A self-contained value: a root plus the heap it lives in.
///
/// This is what object stores hold and what requests hand back. Each
/// `StructuredValue` owns its heap, so cloning one with `.clone()` yields a
/// fully independent copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredValue {
    heap: Heap,
    root: Value,
}

impl StructuredValue {
    /// Assembles a structured value from a heap and a root.
    #[must_use]
    pub fn new(heap: Heap, root: Value) -> Self {
        Self { heap, root }
    }

    /// `undefined`.
    #[must_use]
    pub fn undefined() -> Self {
        Self::new(Heap::new(), Value::Undefined)
    }

    /// The heap.
    #[must_use]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// The heap, mutably.
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// The root value.
    #[must_use]
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Splits into heap and root.
    #[must_use]
    pub fn into_parts(self) -> (Heap, Value) {
        (self.heap, self.root)
    }

    /// The root object, if the root is an object.
    #[must_use]
    pub fn root_object(&self) -> Option<&Object> {
        self.root.as_object().and_then(|r| self.heap.get(r))
    }

    /// Structural equality over the reachable graph, including its shape of
    /// shared references and cycles. `NaN` equals `NaN`.
    #[must_use]
    pub fn structurally_eq(&self, other: &Self) -> bool {
        GraphEq {
            left: &self.heap,
            right: &other.heap,
            pairs: HashMap::new(),
        }
        .values(&self.root, &other.root)
    }
}

impl From<Value> for StructuredValue {
    /// Wraps a primitive. Object references are meaningless without their
    /// heap, so callers should only pass primitives here.
    fn from(value: Value) -> Self {
        Self::new(Heap::new(), value)
    }
}

impl From<f64> for StructuredValue {
    fn from(n: f64) -> Self {
        Value::Number(n).into()
    }
}

impl From<&str> for StructuredValue {
    fn from(s: &str) -> Self {
        Value::from(s).into()
    }
}

impl From<String> for StructuredValue {
    fn from(s: String) -> Self {
        Value::String(s).into()
    }
}

struct GraphEq<'a> {
    left: &'a Heap,
    right: &'a Heap,
    pairs: HashMap<ObjectRef, ObjectRef>,
}

impl GraphEq<'_> {
    fn values(&mut self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => numbers_eq(*x, *y),
            (Value::Object(x), Value::Object(y)) => self.objects(*x, *y),
            _ => a == b,
        }
    }

    fn properties(&mut self, p: &[Property], q: &[Property]) -> bool {
        p.len() == q.len()
            && p.iter().zip(q).all(|(p, q)| {
                p.key == q.key
                    && p.enumerable == q.enumerable
                    && match (&p.slot, &q.slot) {
                        (Slot::Data(v), Slot::Data(w)) => self.values(v, w),
                        (Slot::Accessor(g), Slot::Accessor(h)) => g == h,
                        _ => false,
                    }
            })
    }

    fn objects(&mut self, a: ObjectRef, b: ObjectRef) -> bool {
        if let Some(seen) = self.pairs.get(&a) {
            return *seen == b;
        }
        self.pairs.insert(a, b);
        let (left, right) = (self.left, self.right);
        let (Some(x), Some(y)) = (left.get(a), right.get(b)) else {
            return false;
        };
        match (x, y) {
            (
                Object::Ordinary { properties: p, .. },
                Object::Ordinary { properties: q, .. },
            ) => self.properties(p, q),
            (
                Object::Array {
                    elements: p,
                    properties: pp,
                },
                Object::Array {
                    elements: q,
                    properties: qp,
                },
            ) => {
                p.len() == q.len()
                    && p.iter().zip(q).all(|pair| match pair {
                        (Some(v), Some(w)) => self.values(v, w),
                        (None, None) => true,
                        _ => false,
                    })
                    && self.properties(pp, qp)
            }
            (Object::Date(x), Object::Date(y)) => numbers_eq(*x, *y),
            (Object::Boxed(v), Object::Boxed(w)) => self.values(v, w),
            (
                Object::View {
                    kind: k1,
                    buffer: b1,
                    byte_offset: o1,
                    length: l1,
                },
                Object::View {
                    kind: k2,
                    buffer: b2,
                    byte_offset: o2,
                    length: l2,
                },
            ) => k1 == k2 && o1 == o2 && l1 == l2 && self.objects(*b1, *b2),
            (Object::Map(p), Object::Map(q)) => {
                p.len() == q.len()
                    && p
                        .iter()
                        .zip(q)
                        .all(|((k1, v1), (k2, v2))| self.values(k1, k2) && self.values(v1, v2))
            }
            (Object::Set(p), Object::Set(q)) => {
                p.len() == q.len() && p.iter().zip(q).all(|(v, w)| self.values(v, w))
            }
            _ => x == y,
        }
    }
}

fn numbers_eq(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}
