//! Value: the dynamically typed key model.
//!
//! `Value` is a tagged union with one variant per key category. Scalars are
//! compared by value; `Sequence` by recursive element equality; `Object`
//! by reference identity through `ObjectRef`.

use crate::classify::integral;
use core::cell::{Cell, RefCell};
use core::fmt;
use std::rc::{Rc, Weak};

/// A dynamically typed value usable as a map key (and as a map value).
#[derive(Clone, Debug)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(Rc<str>),
    Pattern(Pattern),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    Sequence(Rc<[Value]>),
    Object(ObjectRef),
}

/// A regular-expression-like literal: compared by its source and flags.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pattern {
    source: Rc<str>,
    flags: Rc<str>,
}

impl Pattern {
    pub fn new(source: &str, flags: &str) -> Self {
        Self {
            source: Rc::from(source),
            flags: Rc::from(flags),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

impl Value {
    pub fn text(s: &str) -> Self {
        Value::Text(Rc::from(s))
    }

    pub fn pattern(source: &str, flags: &str) -> Self {
        Value::Pattern(Pattern::new(source, flags))
    }

    pub fn sequence<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Value::Sequence(items.into_iter().collect())
    }

    /// Empty sequence.
    pub fn empty() -> Self {
        Value::Sequence(Rc::from(Vec::new()))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Host-language truthiness: absent values, `false`, `0`, `NaN` and the
    /// empty string are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => !(f.is_nan() || *f == 0.0),
            Value::Text(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }
}

/// Value equality: scalars by value, sequences element-wise, objects by
/// identity. Floats follow IEEE rules here (`NaN != NaN`); key equality is
/// decided by fingerprints, not by this impl.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Undefined, Undefined) | (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Float(b)) | (Float(b), Int(a)) => integral(*b) == Some(*a),
            (Text(a), Text(b)) => a == b,
            (Pattern(a), Pattern(b)) => a == b,
            (Timestamp(a), Timestamp(b)) => a == b,
            (Sequence(a), Sequence(b)) => a == b,
            (Object(a), Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(Rc::from(items))
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}

/// What kind of object a reference points at. Informational only: every
/// kind is keyed by identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Plain,
    Function(String),
    Container,
}

#[derive(Debug)]
pub(crate) struct ObjectData {
    kind: ObjectKind,
    properties: RefCell<Vec<(String, Value)>>,
    frozen: Cell<bool>,
}

/// Shared handle to a host object. Clones alias the same object; two
/// separately created objects are never the same key, whatever their
/// properties.
#[derive(Clone)]
pub struct ObjectRef {
    inner: Rc<ObjectData>,
}

impl ObjectRef {
    pub fn new() -> Self {
        Self::with_kind(ObjectKind::Plain)
    }

    pub fn function(name: &str) -> Self {
        Self::with_kind(ObjectKind::Function(name.to_string()))
    }

    pub fn with_kind(kind: ObjectKind) -> Self {
        Self {
            inner: Rc::new(ObjectData {
                kind,
                properties: RefCell::new(Vec::new()),
                frozen: Cell::new(false),
            }),
        }
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.inner.kind
    }

    /// Set an own property. Returns `false` (and changes nothing) on a
    /// frozen object.
    pub fn set_property(&self, name: &str, value: Value) -> bool {
        if self.is_frozen() {
            return false;
        }
        let mut props = self.inner.properties.borrow_mut();
        match props.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value,
            None => props.push((name.to_string(), value)),
        }
        true
    }

    pub fn property(&self, name: &str) -> Option<Value> {
        self.inner
            .properties
            .borrow()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    /// Own enumerable property names, in definition order.
    pub fn property_names(&self) -> Vec<String> {
        self.inner
            .properties
            .borrow()
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Make the object non-extensible. Irreversible.
    pub fn freeze(&self) {
        self.inner.frozen.set(true);
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.frozen.get()
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Address used as the identity key in the surrogate registry.
    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    pub(crate) fn downgrade(&self) -> Weak<ObjectData> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn is(&self, weak: &Weak<ObjectData>) -> bool {
        core::ptr::eq(Rc::as_ptr(&self.inner), weak.as_ptr())
    }
}

impl Default for ObjectRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("kind", &self.inner.kind)
            .field("addr", &format_args!("{:#x}", self.addr()))
            .finish_non_exhaustive()
    }
}
