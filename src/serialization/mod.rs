//! Typed pack/unpack encoding for stored records.
//!
//! Every cached value is stored as a two-field record:
//!
//! ```text
//! ┌────────┬──────────────────────────────────────────────┐
//! │ type   │ decimal tag: 0 OBJECT, 1 STRING, 2 NUMBER,     │
//! │        │              3 BOOLEAN                        │
//! ├────────┼──────────────────────────────────────────────┤
//! │ value  │ OBJECT  -> JSON text                          │
//! │        │ STRING  -> the string itself                  │
//! │        │ NUMBER  -> decimal integer                    │
//! │        │ BOOLEAN -> "true" / "false"                   │
//! └────────┴──────────────────────────────────────────────┘
//! ```
//!
//! Decoding is lenient about the tag: a missing, unparsable or unknown tag
//! falls back to handing the payload back as a string, with no type.
//!
//! # Example
//!
//! ```rust
//! use entity_cache::serialization::{pack, unpack, CacheValue, ValueType};
//!
//! # fn main() -> entity_cache::Result<()> {
//! let packed = pack(&CacheValue::Number(1234))?;
//! let (value, value_type) = unpack(Some(&packed.to_field_set()))?;
//!
//! assert_eq!(value, Some(CacheValue::Number(1234)));
//! assert_eq!(value_type, Some(ValueType::Number));
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Field holding the type tag.
pub const TYPE_FIELD: &str = "type";

/// Field holding the encoded payload.
pub const VALUE_FIELD: &str = "value";

/// Raw field-set as returned by the store.
pub type FieldSet = HashMap<String, String>;

/// Decoded value paired with its type.
///
/// `(None, None)` is the "no value" sentinel returned for an absent record.
pub type Unpacked = (Option<CacheValue>, Option<ValueType>);

/// Type tag of a stored record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    Object = 0,
    String = 1,
    Number = 2,
    Boolean = 3,
}

impl ValueType {
    /// Numeric tag written to the `type` field.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Map a numeric tag back to its type, if it is one of the four known tags.
    pub fn from_tag(tag: i64) -> Option<Self> {
        match tag {
            0 => Some(ValueType::Object),
            1 => Some(ValueType::String),
            2 => Some(ValueType::Number),
            3 => Some(ValueType::Boolean),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Object => "OBJECT",
            ValueType::String => "STRING",
            ValueType::Number => "NUMBER",
            ValueType::Boolean => "BOOLEAN",
        };
        f.write_str(name)
    }
}

/// A value that can be cached.
///
/// `Object` carries any structured JSON value (maps, arrays and `null`).
#[derive(Clone, Debug, PartialEq)]
pub enum CacheValue {
    Object(serde_json::Value),
    String(String),
    Number(i64),
    Boolean(bool),
}

impl CacheValue {
    /// Classify a dynamic JSON value.
    ///
    /// Precedence is fixed: object first (maps, arrays, `null`), then boolean,
    /// then number, and everything else is a string. Numbers outside the
    /// `i64` range or with a fractional part are truncated toward zero, which
    /// is what decoding a NUMBER payload would produce anyway.
    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Object(_) | Value::Array(_) | Value::Null => CacheValue::Object(value),
            Value::Bool(b) => CacheValue::Boolean(b),
            Value::Number(n) => CacheValue::Number(
                n.as_i64()
                    .unwrap_or_else(|| n.as_f64().map(|f| f.trunc() as i64).unwrap_or(0)),
            ),
            Value::String(s) => CacheValue::String(s),
        }
    }

    /// Classify any serializable value through its JSON form.
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let json = serde_json::to_value(value)
            .map_err(|e| Error::SerializationError(e.to_string()))?;
        Ok(Self::from_json(json))
    }

    /// The type this value is stored under.
    pub fn value_type(&self) -> ValueType {
        match self {
            CacheValue::Object(_) => ValueType::Object,
            CacheValue::String(_) => ValueType::String,
            CacheValue::Number(_) => ValueType::Number,
            CacheValue::Boolean(_) => ValueType::Boolean,
        }
    }

    /// JSON view of the value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CacheValue::Object(v) => v.clone(),
            CacheValue::String(s) => serde_json::Value::String(s.clone()),
            CacheValue::Number(n) => serde_json::Value::from(*n),
            CacheValue::Boolean(b) => serde_json::Value::Bool(*b),
        }
    }

    /// Deserialize the value into a caller type.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.to_json())
            .map_err(|e| Error::DeserializationError(e.to_string()))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CacheValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CacheValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CacheValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&serde_json::Value> {
        match self {
            CacheValue::Object(v) => Some(v),
            _ => None,
        }
    }
}

impl From<String> for CacheValue {
    fn from(v: String) -> Self {
        CacheValue::String(v)
    }
}

impl From<&str> for CacheValue {
    fn from(v: &str) -> Self {
        CacheValue::String(v.to_string())
    }
}

impl From<i64> for CacheValue {
    fn from(v: i64) -> Self {
        CacheValue::Number(v)
    }
}

impl From<i32> for CacheValue {
    fn from(v: i32) -> Self {
        CacheValue::Number(v.into())
    }
}

impl From<u32> for CacheValue {
    fn from(v: u32) -> Self {
        CacheValue::Number(v.into())
    }
}

impl From<bool> for CacheValue {
    fn from(v: bool) -> Self {
        CacheValue::Boolean(v)
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for CacheValue {
    fn from(v: serde_json::Map<String, serde_json::Value>) -> Self {
        CacheValue::Object(serde_json::Value::Object(v))
    }
}

impl From<serde_json::Value> for CacheValue {
    fn from(v: serde_json::Value) -> Self {
        CacheValue::from_json(v)
    }
}

/// Encoded form of a value, ready to be written as a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packed {
    pub value_type: ValueType,
    pub payload: String,
}

impl Packed {
    /// Field/value pairs in write order.
    pub fn fields(&self) -> [(&'static str, String); 2] {
        [
            (TYPE_FIELD, self.value_type.tag().to_string()),
            (VALUE_FIELD, self.payload.clone()),
        ]
    }

    pub fn to_field_set(&self) -> FieldSet {
        self.fields()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    /// Decode this packed form, exactly as a read of the written record would.
    pub fn unpack(&self) -> Result<Unpacked> {
        decode(Some(&self.value_type.tag().to_string()), Some(&self.payload))
    }
}

/// Encode a value into its stored form.
pub fn pack(value: &CacheValue) -> Result<Packed> {
    let payload = match value {
        CacheValue::Object(v) => {
            serde_json::to_string(v).map_err(|e| Error::SerializationError(e.to_string()))?
        }
        CacheValue::Boolean(b) => b.to_string(),
        CacheValue::Number(n) => n.to_string(),
        CacheValue::String(s) => s.clone(),
    };

    Ok(Packed {
        value_type: value.value_type(),
        payload,
    })
}

/// Decode a stored record.
///
/// `None` (no record at all) yields `(None, None)`. A present record is decoded
/// by its tag; see the module docs for the fallback rules.
///
/// # Errors
///
/// `Error::DeserializationError` when a NUMBER, OBJECT or BOOLEAN payload is
/// missing or malformed.
pub fn unpack(record: Option<&FieldSet>) -> Result<Unpacked> {
    match record {
        None => Ok((None, None)),
        Some(fields) => decode(
            fields.get(TYPE_FIELD).map(String::as_str),
            fields.get(VALUE_FIELD).map(String::as_str),
        ),
    }
}

fn decode(raw_type: Option<&str>, payload: Option<&str>) -> Result<Unpacked> {
    let value_type = raw_type.and_then(parse_int_prefix).and_then(ValueType::from_tag);

    match value_type {
        Some(ValueType::Number) => {
            let raw = require_payload(payload, ValueType::Number)?;
            let n = parse_int_prefix(raw).ok_or_else(|| {
                Error::DeserializationError(format!("NUMBER payload is not an integer: {:?}", raw))
            })?;
            Ok((Some(CacheValue::Number(n)), value_type))
        }
        Some(ValueType::Object) => {
            let raw = require_payload(payload, ValueType::Object)?;
            let v: serde_json::Value = serde_json::from_str(raw)
                .map_err(|e| Error::DeserializationError(e.to_string()))?;
            Ok((Some(CacheValue::Object(v)), value_type))
        }
        Some(ValueType::Boolean) => {
            let raw = require_payload(payload, ValueType::Boolean)?;
            let b = match raw {
                "true" | "1" => true,
                "false" | "0" => false,
                other => {
                    return Err(Error::DeserializationError(format!(
                        "BOOLEAN payload is not a boolean: {:?}",
                        other
                    )))
                }
            };
            Ok((Some(CacheValue::Boolean(b)), value_type))
        }
        // STRING and every unrecognised tag pass the payload through.
        Some(ValueType::String) | None => Ok((
            payload.map(|p| CacheValue::String(p.to_string())),
            value_type,
        )),
    }
}

fn require_payload(payload: Option<&str>, value_type: ValueType) -> Result<&str> {
    payload.ok_or_else(|| {
        Error::DeserializationError(format!("{} record has no value field", value_type))
    })
}

/// Parse the leading integer of `s`.
///
/// Skips leading whitespace, accepts one optional sign and then as many
/// decimal digits as follow; trailing garbage is ignored (`"12.7"` -> 12).
/// Returns `None` when no digit is present or the number overflows `i64`.
pub fn parse_int_prefix(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return None;
    }

    let digits = &rest[..digits_len];
    if negative {
        format!("-{}", digits).parse().ok()
    } else {
        digits.parse().ok()
    }
}
