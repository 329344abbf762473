//! Type classifier: reports the key category of a `Value`.

use crate::value::Value;

/// Which kind of absence an absent value is.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Absence {
    Null,
    Undefined,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Category {
    Absent(Absence),
    Boolean,
    Integer,
    Float,
    NaN,
    Text,
    Pattern,
    Timestamp,
    Sequence,
    Opaque,
}

/// Labels some hosts report for absent values when introspecting special
/// global objects.
const ANOMALOUS_ABSENT_LABELS: &[&str] = &["domwindow", "global", "window"];

/// Classify a value. Total and side-effect free.
///
/// Floats holding an integral value within `i64` range (including `-0.0`)
/// are integers: the host has a single number type. Integral floats
/// outside that range (`1e300`, `9.3e18`) stay `Float` and keep their own
/// fingerprint, so they never meet an `Int` key.
pub fn classify(value: &Value) -> Category {
    match value {
        Value::Null => Category::Absent(Absence::Null),
        Value::Undefined => Category::Absent(Absence::Undefined),
        Value::Bool(_) => Category::Boolean,
        Value::Int(_) => Category::Integer,
        Value::Float(f) if f.is_nan() => Category::NaN,
        Value::Float(f) if integral(*f).is_some() => Category::Integer,
        Value::Float(_) => Category::Float,
        Value::Text(_) => Category::Text,
        Value::Pattern(_) => Category::Pattern,
        Value::Timestamp(_) => Category::Timestamp,
        Value::Sequence(_) => Category::Sequence,
        Value::Object(_) => Category::Opaque,
    }
}

/// The exact `i64` a float stands for, if it is integral and in range.
pub(crate) fn integral(f: f64) -> Option<i64> {
    // 2^63 is exactly representable; anything at or beyond it overflows i64.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.is_finite() && f.fract() == 0.0 && f >= -LIMIT && f < LIMIT {
        Some(f as i64)
    } else {
        None
    }
}

impl Category {
    /// Host-style lower-case type label.
    pub fn label(self) -> &'static str {
        match self {
            Category::Absent(Absence::Null) => "null",
            Category::Absent(Absence::Undefined) => "undefined",
            Category::Boolean => "boolean",
            Category::Integer | Category::Float | Category::NaN => "number",
            Category::Text => "string",
            Category::Pattern => "regexp",
            Category::Timestamp => "date",
            Category::Sequence => "array",
            Category::Opaque => "object",
        }
    }

    /// Resolve a type label reported by a host bridge for `value`.
    ///
    /// Known labels map to the value's own category. An anomalous global
    /// label reported for an absent value falls back to that absence
    /// instead of `Opaque`; any other unknown label is `Opaque`.
    pub fn from_host_label(label: &str, value: &Value) -> Category {
        let own = classify(value);
        let label = label.to_ascii_lowercase();
        if label == own.label() {
            return own;
        }
        match own {
            Category::Absent(_) if ANOMALOUS_ABSENT_LABELS.contains(&label.as_str()) => own,
            _ => match label.as_str() {
                "null" => Category::Absent(Absence::Null),
                "undefined" => Category::Absent(Absence::Undefined),
                _ => Category::Opaque,
            },
        }
    }
}
