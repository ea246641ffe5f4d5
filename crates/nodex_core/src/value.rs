//! Property values and their indexed forms.
//!
//! A property reaches the index layer as a [`FieldValue`]: either a single
//! [`Scalar`] or a sequence of scalars. Before it is handed to an engine each
//! scalar is converted into an [`IndexValue`], whose variant is chosen by the
//! field's declared kind rather than by inspecting the value:
//!
//! - numeric fields produce [`IndexValue::Numeric`], which engines keep in a
//!   sortable form so range queries work;
//! - every other field produces [`IndexValue::Text`].
//!
//! Every indexed value also has a canonical term string. Removal wraps the
//! value the same way and matches on that term, so `"7.0"` removes what `7`
//! added.
//!
//! Numbers are held as `f64`. Integers beyond ±2^53 cannot be represented
//! exactly and are rejected by numeric fields.

use crate::config::FieldKind;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single property value as stored on a graph entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Boolean value.
    Bool(bool),
    /// String value.
    Text(String),
}

/// Largest integer magnitude an `f64` holds exactly.
pub const MAX_EXACT_INT: u64 = 1 << 53;

impl Scalar {
    /// Returns the integer value, parsing text if needed.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(i) => Some(*i),
            Scalar::Text(s) => s.trim().parse().ok(),
            Scalar::Float(_) | Scalar::Bool(_) => None,
        }
    }

    /// Returns the numeric value, parsing text if needed.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            Scalar::Text(s) => s.trim().parse().ok(),
            Scalar::Bool(_) => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(v) => f.write_str(&format_number(*v)),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(i64::from(v))
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

/// A property value: one scalar or a sequence of scalars.
///
/// Sequences are indexed element-wise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A single value.
    Scalar(Scalar),
    /// Several values, each indexed separately.
    Sequence(Vec<Scalar>),
}

impl FieldValue {
    /// Returns the scalars contained in this value.
    #[must_use]
    pub fn scalars(&self) -> &[Scalar] {
        match self {
            FieldValue::Scalar(s) => std::slice::from_ref(s),
            FieldValue::Sequence(items) => items,
        }
    }
}

impl From<Scalar> for FieldValue {
    fn from(v: Scalar) -> Self {
        FieldValue::Scalar(v)
    }
}

macro_rules! field_value_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(v: $ty) -> Self {
                    FieldValue::Scalar(Scalar::from(v))
                }
            }
        )*
    };
}

field_value_from!(i64, i32, f64, bool, &str, String);

impl From<Vec<Scalar>> for FieldValue {
    fn from(items: Vec<Scalar>) -> Self {
        FieldValue::Sequence(items)
    }
}

/// A value in the form an index engine stores it.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    /// Numeric value, range-queryable.
    Numeric(f64),
    /// Text value.
    Text(String),
}

impl IndexValue {
    /// Wraps a scalar according to the field's declared kind.
    pub fn wrap(field: &str, kind: FieldKind, scalar: &Scalar) -> CoreResult<Self> {
        match kind {
            FieldKind::Numeric => {
                if let Some(i) = scalar.as_i64() {
                    if i.unsigned_abs() > MAX_EXACT_INT {
                        return Err(CoreError::invalid_value(
                            field,
                            format!("integer {i} is outside ±2^53 and cannot be indexed exactly"),
                        ));
                    }
                }
                let value = scalar.as_f64().ok_or_else(|| {
                    CoreError::invalid_value(field, format!("expected a number, got '{scalar}'"))
                })?;
                Self::numeric(field, value)
            }
            FieldKind::Text => Ok(Self::raw(scalar)),
        }
    }

    /// Converts a scalar without numeric wrapping.
    #[must_use]
    pub fn raw(scalar: &Scalar) -> Self {
        IndexValue::Text(scalar.to_string())
    }

    /// Creates a numeric value, rejecting NaN.
    pub fn numeric(field: &str, value: f64) -> CoreResult<Self> {
        if value.is_nan() {
            return Err(CoreError::invalid_value(field, "NaN cannot be indexed"));
        }
        Ok(IndexValue::Numeric(value))
    }

    /// Returns the canonical term string.
    #[must_use]
    pub fn term(&self) -> String {
        match self {
            IndexValue::Numeric(v) => format_number(*v),
            IndexValue::Text(s) => s.clone(),
        }
    }

    /// Returns the sortable key for numeric values.
    #[must_use]
    pub fn numeric_key(&self) -> Option<NumericKey> {
        match self {
            IndexValue::Numeric(v) => Some(NumericKey::from_f64(*v)),
            IndexValue::Text(_) => None,
        }
    }

    /// Returns true for numeric values.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, IndexValue::Numeric(_))
    }
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.term())
    }
}

/// Order-preserving integer encoding of an `f64`.
///
/// Comparing two keys gives the same result as comparing the original
/// numbers, with `-0.0` folded into `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NumericKey(u64);

impl NumericKey {
    /// Encodes a number.
    #[must_use]
    pub fn from_f64(value: f64) -> Self {
        let value = if value == 0.0 { 0.0 } else { value };
        let bits = value.to_bits();
        if bits & (1 << 63) != 0 {
            Self(!bits)
        } else {
            Self(bits ^ (1 << 63))
        }
    }

    /// Decodes the key back into a number.
    #[must_use]
    pub fn to_f64(self) -> f64 {
        let bits = if self.0 & (1 << 63) != 0 {
            self.0 ^ (1 << 63)
        } else {
            !self.0
        };
        f64::from_bits(bits)
    }
}

fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{value}")
}
