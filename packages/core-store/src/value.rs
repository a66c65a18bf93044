//! Typed values and type inference for textual reads.
//!
//! Stores keep every non-byte value as its canonical text, so reading a key
//! back without a declared type means guessing. The guess order is fixed:
//! Boolean, ByteSequence (from the byte slot, never the text), Int32, Int64,
//! Float, Double, then Text.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::error::{Error, Result};

/// The seven declared value types.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum TypeTag {
    Boolean,
    ByteSequence,
    Double,
    Float,
    Int32,
    Int64,
    Text,
}

impl TypeTag {
    pub const ALL: [TypeTag; 7] = [
        TypeTag::Boolean,
        TypeTag::ByteSequence,
        TypeTag::Double,
        TypeTag::Float,
        TypeTag::Int32,
        TypeTag::Int64,
        TypeTag::Text,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Boolean => "Boolean",
            TypeTag::ByteSequence => "ByteSequence",
            TypeTag::Double => "Double",
            TypeTag::Float => "Float",
            TypeTag::Int32 => "Int32",
            TypeTag::Int64 => "Int64",
            TypeTag::Text => "Text",
        }
    }

    /// Accepts the canonical names plus the short aliases older exports use.
    fn from_selector(s: &str) -> Option<TypeTag> {
        if let Some(tag) = TypeTag::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(s))
        {
            return Some(tag);
        }
        match s {
            "boolean" | "bool" => Some(TypeTag::Boolean),
            "byte[]" | "bytes" => Some(TypeTag::ByteSequence),
            "double" | "f64" => Some(TypeTag::Double),
            "float" | "f32" => Some(TypeTag::Float),
            "int" | "i32" => Some(TypeTag::Int32),
            "long" | "i64" => Some(TypeTag::Int64),
            "String" | "string" => Some(TypeTag::Text),
            _ => None,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TypeTag::from_selector(s)
            .ok_or_else(|| Error::validation(format!("unrecognized value type '{}'", s)))
    }
}

/// A value with exactly one representation.
#[derive(Clone, Debug, PartialEq)]
pub enum TypedValue {
    Boolean(bool),
    ByteSequence(Vec<u8>),
    Double(f64),
    Float(f32),
    Int32(i32),
    Int64(i64),
    Text(String),
}

impl TypedValue {
    pub fn tag(&self) -> TypeTag {
        match self {
            TypedValue::Boolean(_) => TypeTag::Boolean,
            TypedValue::ByteSequence(_) => TypeTag::ByteSequence,
            TypedValue::Double(_) => TypeTag::Double,
            TypedValue::Float(_) => TypeTag::Float,
            TypedValue::Int32(_) => TypeTag::Int32,
            TypedValue::Int64(_) => TypeTag::Int64,
            TypedValue::Text(_) => TypeTag::Text,
        }
    }

    /// The value a typed read yields when the key is missing.
    pub fn default_for(tag: TypeTag) -> TypedValue {
        match tag {
            TypeTag::Boolean => TypedValue::Boolean(false),
            TypeTag::ByteSequence => TypedValue::ByteSequence(Vec::new()),
            TypeTag::Double => TypedValue::Double(0.0),
            TypeTag::Float => TypedValue::Float(0.0),
            TypeTag::Int32 => TypedValue::Int32(0),
            TypeTag::Int64 => TypedValue::Int64(0),
            TypeTag::Text => TypedValue::Text(String::new()),
        }
    }

    /// Canonical text form. Byte sequences render as standard base64.
    pub fn to_raw_text(&self) -> String {
        match self {
            TypedValue::Boolean(b) => b.to_string(),
            TypedValue::ByteSequence(bytes) => BASE64.encode(bytes),
            TypedValue::Double(d) => d.to_string(),
            TypedValue::Float(f) => f.to_string(),
            TypedValue::Int32(i) => i.to_string(),
            TypedValue::Int64(i) => i.to_string(),
            TypedValue::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_raw_text())
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        TypedValue::Text(s.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(s: String) -> Self {
        TypedValue::Text(s)
    }
}

impl From<bool> for TypedValue {
    fn from(b: bool) -> Self {
        TypedValue::Boolean(b)
    }
}

impl From<i32> for TypedValue {
    fn from(i: i32) -> Self {
        TypedValue::Int32(i)
    }
}

impl From<i64> for TypedValue {
    fn from(i: i64) -> Self {
        TypedValue::Int64(i)
    }
}

impl From<f32> for TypedValue {
    fn from(f: f32) -> Self {
        TypedValue::Float(f)
    }
}

impl From<f64> for TypedValue {
    fn from(d: f64) -> Self {
        TypedValue::Double(d)
    }
}

impl From<Vec<u8>> for TypedValue {
    fn from(bytes: Vec<u8>) -> Self {
        TypedValue::ByteSequence(bytes)
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Non-finite floats only count when the text says so outright.
fn spells_non_finite(text: &str) -> bool {
    let t = text.trim_start_matches(['+', '-']);
    t.eq_ignore_ascii_case("inf") || t.eq_ignore_ascii_case("infinity") || t.eq_ignore_ascii_case("nan")
}

fn parse_f32(text: &str) -> Option<f32> {
    let value = text.parse::<f32>().ok()?;
    (value.is_finite() || spells_non_finite(text)).then_some(value)
}

fn parse_f64(text: &str) -> Option<f64> {
    let value = text.parse::<f64>().ok()?;
    (value.is_finite() || spells_non_finite(text)).then_some(value)
}

/// Guess the type of a textual value.
///
/// `has_bytes` is the side channel: whether the key currently holds a
/// non-empty byte-sequence value. It is consulted after Boolean and before
/// any numeric parse.
///
/// ```rust
/// use preftree_core_store::{infer_type, TypeTag};
///
/// assert_eq!(infer_type("TRUE", false), TypeTag::Boolean);
/// assert_eq!(infer_type("42", false), TypeTag::Int32);
/// assert_eq!(infer_type("hello", false), TypeTag::Text);
/// ```
pub fn infer_type(raw_text: &str, has_bytes: bool) -> TypeTag {
    if parse_bool(raw_text).is_some() {
        TypeTag::Boolean
    } else if has_bytes {
        TypeTag::ByteSequence
    } else if raw_text.parse::<i32>().is_ok() {
        TypeTag::Int32
    } else if raw_text.parse::<i64>().is_ok() {
        TypeTag::Int64
    } else if parse_f32(raw_text).is_some() {
        TypeTag::Float
    } else if parse_f64(raw_text).is_some() {
        TypeTag::Double
    } else {
        TypeTag::Text
    }
}

/// Convert text to a declared type.
pub fn coerce(raw_text: &str, target: TypeTag) -> Result<TypedValue> {
    let format_error = || Error::ValueFormat {
        text: raw_text.to_string(),
        tag: target,
    };

    let value = match target {
        TypeTag::Boolean => TypedValue::Boolean(parse_bool(raw_text).ok_or_else(format_error)?),
        TypeTag::ByteSequence => {
            TypedValue::ByteSequence(BASE64.decode(raw_text).map_err(|_| format_error())?)
        }
        TypeTag::Double => TypedValue::Double(raw_text.parse().map_err(|_| format_error())?),
        TypeTag::Float => TypedValue::Float(raw_text.parse().map_err(|_| format_error())?),
        TypeTag::Int32 => TypedValue::Int32(raw_text.parse().map_err(|_| format_error())?),
        TypeTag::Int64 => TypedValue::Int64(raw_text.parse().map_err(|_| format_error())?),
        TypeTag::Text => TypedValue::Text(raw_text.to_string()),
    };
    Ok(value)
}
