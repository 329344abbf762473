//! Key normalizer: turns a `Value` into its fingerprint and hash code.
//!
//! Two keys are the same key iff their fingerprints are equal. The hash
//! code is derived alongside, in the same pass, and only routes the key to
//! a bucket.
//!
//! Rendered forms (`Display`), used for scalar hashing and for inspection:
//!
//! | category  | example key        | fingerprint text |
//! |-----------|--------------------|------------------|
//! | absent    | `null`             | `null`           |
//! | boolean   | `true`             | `true`           |
//! | integer   | `1`, `1.0`         | `1`              |
//! | float     | `1.1`              | `1.1`            |
//! | NaN       | `NaN`              | `NaN`            |
//! | text      | `"1.1"`            | `♠1.1`           |
//! | pattern   | `/test/g`          | `/test/g`        |
//! | timestamp | 524502300000 ms    | `♣524502300000`  |
//! | sequence  | `[1, 2, 3]`        | `♥1⁞2⁞3`         |
//! | object    | first object seen  | `♦1`             |

use crate::classify::integral;
use crate::error::InsertError;
use crate::hash::{sequence_hash, string_hash, StringHasher};
use crate::identity::{with_registry, SurrogateRegistry};
use crate::value::{ObjectRef, Pattern, Value};
use core::fmt::{self, Write};
use core::hash::{Hash, Hasher};
use core::mem;
use std::rc::Rc;

pub const TEXT_TAG: char = '♠';
pub const TIMESTAMP_TAG: char = '♣';
pub const SEQUENCE_TAG: char = '♥';
pub const SEQUENCE_SEPARATOR: char = '⁞';
pub const OPAQUE_TAG: char = '♦';

/// Canonical identity of a key.
///
/// Sequences may nest arbitrarily deep, so comparison, hashing, rendering
/// and teardown all walk an explicit stack instead of recursing.
#[derive(Clone, Debug)]
pub enum Fingerprint {
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    /// Non-integral float. `digest` is the string hash of the decimal text;
    /// `bits` is the exact value and settles equality.
    Float {
        digest: i32,
        bits: u64,
    },
    NaN,
    Text(Rc<str>),
    Pattern(Pattern),
    Timestamp(i64),
    Sequence(Rc<[Fingerprint]>),
    Opaque(u64),
}

/// A key's hash code and fingerprint, computed once per operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Digest {
    hash: i32,
    fingerprint: Fingerprint,
}

impl Digest {
    /// Digest for storing `key`. Objects seen for the first time are
    /// stamped with a surrogate identity.
    pub fn of(key: &Value) -> Result<Self, InsertError> {
        with_registry(|reg| Self::of_in(reg, key))
    }

    /// Like [`Digest::of`] against an explicit registry.
    pub fn of_in(reg: &mut SurrogateRegistry, key: &Value) -> Result<Self, InsertError> {
        digest_with(key, &mut |o| reg.stamp(o))
    }

    /// Digest for finding `key`; never stamps. `None` means the key
    /// contains an object that was never stamped, so it cannot be stored
    /// in any map.
    pub fn lookup(key: &Value) -> Option<Self> {
        with_registry(|reg| Self::lookup_in(reg, key))
    }

    pub fn lookup_in(reg: &SurrogateRegistry, key: &Value) -> Option<Self> {
        digest_with(key, &mut |o| reg.peek(o).ok_or(())).ok()
    }

    pub(crate) fn from_parts(hash: i32, fingerprint: Fingerprint) -> Self {
        Self { hash, fingerprint }
    }

    pub fn hash(&self) -> i32 {
        self.hash
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

fn scalar(fingerprint: Fingerprint) -> Digest {
    let hash = StringHasher::new().push_display(&fingerprint).finish();
    Digest { hash, fingerprint }
}

/// One key resolved a level deep: either a finished digest or the
/// elements of a sequence still to be digested.
enum Step<'a> {
    Done(Digest),
    Descend(&'a [Value]),
}

fn step<'a, E>(
    key: &'a Value,
    resolve: &mut dyn FnMut(&ObjectRef) -> Result<u64, E>,
) -> Result<Step<'a>, E> {
    let digest = match key {
        Value::Sequence(items) => return Ok(Step::Descend(items)),
        Value::Undefined => scalar(Fingerprint::Undefined),
        Value::Null => scalar(Fingerprint::Null),
        Value::Bool(b) => scalar(Fingerprint::Bool(*b)),
        Value::Int(i) => scalar(Fingerprint::Int(*i)),
        Value::Float(f) if f.is_nan() => scalar(Fingerprint::NaN),
        Value::Float(f) => match integral(*f) {
            Some(i) => scalar(Fingerprint::Int(i)),
            None => {
                let digest = StringHasher::new().push_display(&FloatText(*f)).finish();
                Digest {
                    hash: digest,
                    fingerprint: Fingerprint::Float {
                        digest,
                        bits: f.to_bits(),
                    },
                }
            }
        },
        Value::Text(s) => Digest {
            hash: StringHasher::new().push_char(TEXT_TAG).push_str(s).finish(),
            fingerprint: Fingerprint::Text(s.clone()),
        },
        Value::Pattern(p) => scalar(Fingerprint::Pattern(p.clone())),
        Value::Timestamp(ms) => scalar(Fingerprint::Timestamp(*ms)),
        Value::Object(o) => scalar(Fingerprint::Opaque(resolve(o)?)),
    };
    Ok(Step::Done(digest))
}

/// A sequence whose elements are being digested left to right.
struct Frame<'a> {
    items: &'a [Value],
    hashes: Vec<i32>,
    prints: Vec<Fingerprint>,
}

impl<'a> Frame<'a> {
    fn new(items: &'a [Value]) -> Self {
        Self {
            items,
            hashes: Vec::with_capacity(items.len()),
            prints: Vec::with_capacity(items.len()),
        }
    }

    fn accept(&mut self, digest: Digest) {
        self.hashes.push(digest.hash);
        self.prints.push(digest.fingerprint);
    }

    fn finish(self) -> Digest {
        Digest {
            hash: sequence_hash(self.items.len(), self.hashes),
            fingerprint: Fingerprint::Sequence(Rc::from(self.prints)),
        }
    }
}

/// Post-order walk over the key. Objects are resolved in left-to-right
/// order, and nesting depth costs heap, not stack.
fn digest_with<E>(
    key: &Value,
    resolve: &mut dyn FnMut(&ObjectRef) -> Result<u64, E>,
) -> Result<Digest, E> {
    let mut root = match step(key, resolve)? {
        Step::Done(digest) => return Ok(digest),
        Step::Descend(items) => Frame::new(items),
    };
    let mut nested: Vec<Frame<'_>> = Vec::new();
    loop {
        let frame = nested.last_mut().unwrap_or(&mut root);
        let items = frame.items;
        match items.get(frame.prints.len()) {
            Some(element) => match step(element, resolve)? {
                Step::Done(digest) => frame.accept(digest),
                Step::Descend(inner) => nested.push(Frame::new(inner)),
            },
            None => match nested.pop() {
                Some(done) => {
                    let digest = done.finish();
                    nested.last_mut().unwrap_or(&mut root).accept(digest);
                }
                None => return Ok(root.finish()),
            },
        }
    }
}

/// Host-style number text: shortest round-trip digits, exponent form
/// (`1e+21`, `1.5e-7`) outside `[1e-6, 1e21)`, infinities spelled out.
struct FloatText(f64);

impl fmt::Display for FloatText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_float(f, self.0)
    }
}

fn write_float(w: &mut dyn Write, f: f64) -> fmt::Result {
    let magnitude = f.abs();
    if f == f64::INFINITY {
        w.write_str("Infinity")
    } else if f == f64::NEG_INFINITY {
        w.write_str("-Infinity")
    } else if magnitude >= 1e21 || (magnitude != 0.0 && magnitude < 1e-6) {
        write!(
            ExponentSign {
                inner: w,
                after_e: false,
            },
            "{:e}",
            f
        )
    } else {
        write!(w, "{}", f)
    }
}

/// Adds the explicit `+` the host prints on non-negative exponents.
struct ExponentSign<'a> {
    inner: &'a mut dyn Write,
    after_e: bool,
}

impl Write for ExponentSign<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.after_e && c != '-' {
                self.inner.write_char('+')?;
            }
            self.after_e = c == 'e';
            self.inner.write_char(c)?;
        }
        Ok(())
    }
}

impl Fingerprint {
    /// Equality of everything but sequence contents.
    fn shallow_eq(&self, other: &Self) -> bool {
        use Fingerprint::*;
        match (self, other) {
            (Undefined, Undefined) | (Null, Null) | (NaN, NaN) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float { bits: a, .. }, Float { bits: b, .. }) => a == b,
            (Text(a), Text(b)) => a == b,
            (Pattern(a), Pattern(b)) => a == b,
            (Timestamp(a), Timestamp(b)) => a == b,
            (Sequence(a), Sequence(b)) => a.len() == b.len(),
            (Opaque(a), Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        let mut pending: Vec<(&Fingerprint, &Fingerprint)> = Vec::new();
        let mut next = Some((self, other));
        while let Some((a, b)) = next.take().or_else(|| pending.pop()) {
            if !a.shallow_eq(b) {
                return false;
            }
            if let (Fingerprint::Sequence(x), Fingerprint::Sequence(y)) = (a, b) {
                if !Rc::ptr_eq(x, y) {
                    pending.extend(x.iter().zip(y.iter()));
                }
            }
        }
        true
    }
}

impl Eq for Fingerprint {}

impl Hash for Fingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut pending: Vec<&Fingerprint> = Vec::new();
        let mut next = Some(self);
        while let Some(fp) = next.take().or_else(|| pending.pop()) {
            mem::discriminant(fp).hash(state);
            match fp {
                Fingerprint::Undefined | Fingerprint::Null | Fingerprint::NaN => {}
                Fingerprint::Bool(b) => b.hash(state),
                Fingerprint::Int(i) | Fingerprint::Timestamp(i) => i.hash(state),
                Fingerprint::Float { bits, .. } => bits.hash(state),
                Fingerprint::Text(s) => s.hash(state),
                Fingerprint::Pattern(p) => p.hash(state),
                Fingerprint::Opaque(id) => id.hash(state),
                Fingerprint::Sequence(items) => {
                    items.len().hash(state);
                    pending.extend(items.iter().rev());
                }
            }
        }
    }
}

/// Unique sequence nodes are unlinked one level at a time so dropping a
/// deep fingerprint never recurses.
impl Drop for Fingerprint {
    fn drop(&mut self) {
        let Fingerprint::Sequence(items) = self else {
            return;
        };
        if items.is_empty() || Rc::strong_count(items) > 1 {
            return;
        }
        let mut pending = vec![mem::replace(items, Rc::from(Vec::new()))];
        while let Some(mut node) = pending.pop() {
            let Some(children) = Rc::get_mut(&mut node) else {
                continue;
            };
            for child in children.iter_mut() {
                if let Fingerprint::Sequence(inner) = child {
                    if !inner.is_empty() {
                        pending.push(mem::replace(inner, Rc::from(Vec::new())));
                    }
                }
            }
        }
    }
}

enum Render<'a> {
    Print(&'a Fingerprint),
    Separator,
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pending: Vec<Render<'_>> = Vec::new();
        let mut next = Some(Render::Print(self));
        while let Some(render) = next.take().or_else(|| pending.pop()) {
            let fp = match render {
                Render::Separator => {
                    f.write_char(SEQUENCE_SEPARATOR)?;
                    continue;
                }
                Render::Print(fp) => fp,
            };
            match fp {
                Fingerprint::Undefined => f.write_str("undefined")?,
                Fingerprint::Null => f.write_str("null")?,
                Fingerprint::Bool(b) => write!(f, "{}", b)?,
                Fingerprint::Int(i) => write!(f, "{}", i)?,
                Fingerprint::Float { bits, .. } => write_float(f, f64::from_bits(*bits))?,
                Fingerprint::NaN => f.write_str("NaN")?,
                Fingerprint::Text(s) => write!(f, "{}{}", TEXT_TAG, s)?,
                Fingerprint::Pattern(p) => write!(f, "{}", p)?,
                Fingerprint::Timestamp(ms) => write!(f, "{}{}", TIMESTAMP_TAG, ms)?,
                Fingerprint::Opaque(id) => write!(f, "{}{}", OPAQUE_TAG, id)?,
                Fingerprint::Sequence(items) => {
                    f.write_char(SEQUENCE_TAG)?;
                    for (i, item) in items.iter().enumerate().rev() {
                        pending.push(Render::Print(item));
                        if i > 0 {
                            pending.push(Render::Separator);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Hash code of a rendered scalar fingerprint.
pub fn text_hash(fingerprint: &Fingerprint) -> i32 {
    string_hash(&fingerprint.to_string())
}
