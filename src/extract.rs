//! Tagged-union leaf extraction
//!
//! A union-typed field decodes to a leaf that says "this value is of type
//! *tag*, with payload *value*". Two shapes are accepted:
//!
//! - `Value::Union(index, payload)`, as produced by the container reader,
//!   where the tag is derived from the payload variant
//! - a single-entry `Value::Map` of `{tag: payload}`, the JSON-style encoding
//!
//! Callers pick the extractor matching the field's declared type. There is no
//! negotiation beyond comparing tag strings.
//!
//! ```
//! use apache_avro::types::Value;
//! use avro_bandwidth::extract::{extract_long, extract_string};
//!
//! let leaf = Value::Union(1, Box::new(Value::Long(42)));
//! assert_eq!(extract_long(Some(&leaf)).unwrap(), 42);
//! assert!(extract_string(Some(&leaf)).is_err());
//! ```

use crate::error::ExtractError;
use apache_avro::types::Value;

/// Type tag of a decoded value, as used for union branch names
pub fn type_tag(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Boolean(_) => "boolean",
        Value::Int(_) => "int",
        Value::Long(_) => "long",
        Value::Float(_) => "float",
        Value::Double(_) => "double",
        Value::Bytes(_) => "bytes",
        Value::String(_) => "string",
        Value::Fixed(..) => "fixed",
        Value::Enum(..) => "enum",
        Value::Union(_, inner) => type_tag(inner),
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        Value::Record(_) => "record",
        Value::Date(_) => "int.date",
        Value::TimeMillis(_) => "int.time-millis",
        Value::TimeMicros(_) => "long.time-micros",
        Value::TimestampMillis(_) => "long.timestamp-millis",
        Value::TimestampMicros(_) => "long.timestamp-micros",
        Value::Decimal(_) => "bytes.decimal",
        Value::Duration(_) => "fixed.duration",
        Value::Uuid(_) => "string.uuid",
        _ => "logical",
    }
}

/// Return the payload of a union leaf whose tag equals `tag`
pub fn extract_tagged<'a>(value: Option<&'a Value>, tag: &str) -> Result<&'a Value, ExtractError> {
    let value = match value {
        None | Some(Value::Null) => return Err(ExtractError::NilValue),
        Some(value) => value,
    };

    match value {
        Value::Union(_, payload) => match payload.as_ref() {
            Value::Null => Err(ExtractError::NilValue),
            payload => check_tag(type_tag(payload), tag).map(|()| payload),
        },
        Value::Map(entries) => {
            let mut iter = entries.iter();
            match (iter.next(), iter.next()) {
                (None, _) => Err(ExtractError::EmptyLeaf),
                (Some((key, payload)), None) => check_tag(key, tag).map(|()| payload),
                _ => Err(ExtractError::NotLeaf),
            }
        }
        _ => Err(ExtractError::NotLeaf),
    }
}

fn check_tag(got: &str, want: &str) -> Result<(), ExtractError> {
    if got == want {
        Ok(())
    } else {
        Err(ExtractError::TagMismatch {
            got: got.to_string(),
            want: want.to_string(),
        })
    }
}

/// A Rust representation that a union leaf can be extracted into
pub trait Leaf: Sized {
    /// Tag the leaf must carry
    const TAG: &'static str;

    /// Convert the payload, or `None` if its variant doesn't match
    fn from_payload(payload: &Value) -> Option<Self>;
}

impl Leaf for String {
    const TAG: &'static str = "string";

    fn from_payload(payload: &Value) -> Option<Self> {
        match payload {
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl Leaf for i64 {
    const TAG: &'static str = "long";

    fn from_payload(payload: &Value) -> Option<Self> {
        match payload {
            Value::Long(n) => Some(*n),
            _ => None,
        }
    }
}

impl Leaf for bool {
    const TAG: &'static str = "boolean";

    fn from_payload(payload: &Value) -> Option<Self> {
        match payload {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl Leaf for f32 {
    const TAG: &'static str = "float";

    fn from_payload(payload: &Value) -> Option<Self> {
        match payload {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl Leaf for f64 {
    const TAG: &'static str = "double";

    fn from_payload(payload: &Value) -> Option<Self> {
        match payload {
            Value::Double(f) => Some(*f),
            _ => None,
        }
    }
}

impl Leaf for Vec<u8> {
    const TAG: &'static str = "bytes";

    fn from_payload(payload: &Value) -> Option<Self> {
        match payload {
            Value::Bytes(b) => Some(b.clone()),
            _ => None,
        }
    }
}

/// Extract a typed leaf
///
/// A payload whose variant disagrees with its tag is reported as a
/// `TagMismatch` naming the payload's real type.
pub fn extract<T: Leaf>(value: Option<&Value>) -> Result<T, ExtractError> {
    let payload = extract_tagged(value, T::TAG)?;
    T::from_payload(payload).ok_or_else(|| ExtractError::TagMismatch {
        got: type_tag(payload).to_string(),
        want: T::TAG.to_string(),
    })
}

/// Reads a `string` leaf
pub fn extract_string(value: Option<&Value>) -> Result<String, ExtractError> {
    extract(value)
}

/// Reads a `long` leaf
pub fn extract_long(value: Option<&Value>) -> Result<i64, ExtractError> {
    extract(value)
}

/// Reads a `boolean` leaf
pub fn extract_bool(value: Option<&Value>) -> Result<bool, ExtractError> {
    extract(value)
}

/// Reads a `float` leaf
pub fn extract_float(value: Option<&Value>) -> Result<f32, ExtractError> {
    extract(value)
}

/// Reads a `double` leaf
pub fn extract_double(value: Option<&Value>) -> Result<f64, ExtractError> {
    extract(value)
}

/// Reads a `bytes` leaf
pub fn extract_bytes(value: Option<&Value>) -> Result<Vec<u8>, ExtractError> {
    extract(value)
}
