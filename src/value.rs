//! Typed flag values and the conversions between them.
//!
//! Every conversion is selected by matching on [`ValueType`], so adding a value type is a
//! compile error in each place that has to handle it.

use derive_more::From;
use serde::{Deserialize, Serialize};

use crate::EvaluationError;

/// Declared or requested type of a flag value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    Boolean,
    String,
    Integer,
    Double,
    Object,
}

/// A flag value of one of the supported types.
///
/// Absence (`null`, a disabled non-boolean feature) is represented by `Option<FlagValue>` rather
/// than by a variant here.
#[derive(Debug, Clone, PartialEq, Serialize, From)]
#[serde(untagged)]
pub enum FlagValue {
    Boolean(bool),
    String(String),
    Integer(i64),
    Double(f64),
    /// Object flags hold JSON maps or lists.
    Object(serde_json::Value),
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl std::fmt::Display for FlagValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlagValue::Boolean(b) => write!(f, "{b}"),
            FlagValue::String(s) => f.write_str(s),
            FlagValue::Integer(i) => write!(f, "{i}"),
            FlagValue::Double(d) => write!(f, "{d}"),
            FlagValue::Object(v) => write!(f, "{v}"),
        }
    }
}

impl FlagValue {
    /// The zero value of `value_type`: `false`, `""`, `0`, `0.0`, or an empty object.
    pub fn zero(value_type: ValueType) -> FlagValue {
        match value_type {
            ValueType::Boolean => FlagValue::Boolean(false),
            ValueType::String => FlagValue::String(String::new()),
            ValueType::Integer => FlagValue::Integer(0),
            ValueType::Double => FlagValue::Double(0.0),
            ValueType::Object => FlagValue::Object(empty_object()),
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            FlagValue::Boolean(_) => ValueType::Boolean,
            FlagValue::String(_) => ValueType::String,
            FlagValue::Integer(_) => ValueType::Integer,
            FlagValue::Double(_) => ValueType::Double,
            FlagValue::Object(_) => ValueType::Object,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            FlagValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FlagValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FlagValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            FlagValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&serde_json::Value> {
        match self {
            FlagValue::Object(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            FlagValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<serde_json::Value> {
        match self {
            FlagValue::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Convert arbitrary JSON to the closest `FlagValue`. `null` yields `None`.
    pub(crate) fn from_json(value: serde_json::Value) -> Option<FlagValue> {
        use serde_json::Value;

        match value {
            Value::Null => None,
            Value::Bool(b) => Some(FlagValue::Boolean(b)),
            Value::String(s) => Some(FlagValue::String(s)),
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => FlagValue::Integer(i),
                None => FlagValue::Double(n.as_f64().unwrap_or_default()),
            }),
            other @ (Value::Array(_) | Value::Object(_)) => Some(FlagValue::Object(other)),
        }
    }

    /// Strictly convert a declared default value to `value_type`.
    ///
    /// Returns `None` if the value is not convertible. `null` is handled by the caller.
    pub(crate) fn from_declared(
        value: &serde_json::Value,
        value_type: ValueType,
    ) -> Option<FlagValue> {
        use serde_json::Value;

        match (value_type, value) {
            (ValueType::Boolean, Value::Bool(b)) => Some(FlagValue::Boolean(*b)),
            (ValueType::Boolean, Value::String(s)) => parse_bool(s).map(FlagValue::Boolean),

            (ValueType::String, Value::String(s)) => Some(FlagValue::String(s.clone())),
            (ValueType::String, Value::Bool(_) | Value::Number(_)) => {
                Some(FlagValue::String(value.to_string()))
            }

            (ValueType::Integer, Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(integral))
                .map(FlagValue::Integer),
            (ValueType::Integer, Value::String(s)) => {
                s.trim().parse().ok().map(FlagValue::Integer)
            }

            (ValueType::Double, Value::Number(n)) => n.as_f64().map(FlagValue::Double),
            (ValueType::Double, Value::String(s)) => s.trim().parse().ok().map(FlagValue::Double),

            (ValueType::Object, Value::Object(_) | Value::Array(_)) => {
                Some(FlagValue::Object(value.clone()))
            }
            (ValueType::Object, Value::String(s)) => serde_json::from_str::<Value>(s)
                .ok()
                .filter(|v| v.is_object() || v.is_array())
                .map(FlagValue::Object),

            _ => None,
        }
    }

    /// Extract a value of `requested` type from a raw remote value.
    ///
    /// `null` is the remote's disabled representation and yields `Ok(None)`.
    pub(crate) fn extract(
        raw: &serde_json::Value,
        requested: ValueType,
    ) -> Result<Option<FlagValue>, EvaluationError> {
        use serde_json::Value;

        let mismatch = |reason: String| EvaluationError::Extraction {
            expected: requested,
            reason,
        };

        let value = match (requested, raw) {
            (_, Value::Null) => return Ok(None),

            (ValueType::Boolean, Value::Bool(b)) => FlagValue::Boolean(*b),

            (ValueType::String, Value::String(s)) => FlagValue::String(s.clone()),
            (ValueType::String, Value::Bool(_) | Value::Number(_)) => {
                FlagValue::String(raw.to_string())
            }

            (ValueType::Integer, Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(integral))
                .map(FlagValue::Integer)
                .ok_or_else(|| mismatch(format!("{n} is not an integer")))?,
            (ValueType::Integer, Value::String(s)) => s
                .trim()
                .parse()
                .map(FlagValue::Integer)
                .map_err(|err| mismatch(format!("{err}")))?,

            (ValueType::Double, Value::Number(n)) => n
                .as_f64()
                .map(FlagValue::Double)
                .ok_or_else(|| mismatch(format!("{n} is not representable as f64")))?,
            (ValueType::Double, Value::String(s)) => s
                .trim()
                .parse()
                .map(FlagValue::Double)
                .map_err(|err| mismatch(format!("{err}")))?,

            (ValueType::Object, Value::Object(_) | Value::Array(_)) => {
                FlagValue::Object(raw.clone())
            }
            // Object features travel over the wire as JSON strings.
            (ValueType::Object, Value::String(s)) => serde_json::from_str::<Value>(s)
                .map(FlagValue::Object)
                .map_err(|err| mismatch(format!("invalid JSON payload: {err}")))?,

            (_, other) => return Err(mismatch(format!("unexpected remote value {other}"))),
        };

        Ok(Some(value))
    }

    /// Convert to `requested` type, substituting the zero value when conversion is not
    /// possible. Never fails.
    pub(crate) fn coerce(&self, requested: ValueType) -> FlagValue {
        if self.value_type() == requested {
            return self.clone();
        }

        let coerced = match (requested, self) {
            (ValueType::Boolean, FlagValue::String(s)) => parse_bool(s).map(FlagValue::Boolean),
            (ValueType::Boolean, _) => None,

            (ValueType::String, FlagValue::Object(v)) => Some(FlagValue::String(v.to_string())),
            (ValueType::String, other) => Some(FlagValue::String(other.to_string())),

            (ValueType::Integer, FlagValue::Double(d)) => integral(*d).map(FlagValue::Integer),
            (ValueType::Integer, FlagValue::String(s)) => {
                s.trim().parse().ok().map(FlagValue::Integer)
            }
            (ValueType::Integer, _) => None,

            (ValueType::Double, FlagValue::Integer(i)) => Some(FlagValue::Double(*i as f64)),
            (ValueType::Double, FlagValue::String(s)) => {
                s.trim().parse().ok().map(FlagValue::Double)
            }
            (ValueType::Double, _) => None,

            (ValueType::Object, FlagValue::String(s)) => Some(FlagValue::Object(
                serde_json::from_str(s).unwrap_or_else(|err| {
                    log::warn!(target: "izanami",
                               value:display = s;
                               "unable to parse object value, using empty object: {err}");
                    empty_object()
                }),
            )),
            (ValueType::Object, other) => Some(FlagValue::Object(
                serde_json::to_value(other).unwrap_or_else(|err| {
                    log::warn!(target: "izanami",
                               "unable to serialize object value, using empty object: {err}");
                    empty_object()
                }),
            )),
        };

        coerced.unwrap_or_else(|| FlagValue::zero(requested))
    }
}

/// Rust types that flag values can be read as.
pub trait FlagType: Sized {
    const VALUE_TYPE: ValueType;

    fn from_flag_value(value: FlagValue) -> Option<Self>;
}

impl FlagType for bool {
    const VALUE_TYPE: ValueType = ValueType::Boolean;

    fn from_flag_value(value: FlagValue) -> Option<Self> {
        value.as_boolean()
    }
}

impl FlagType for String {
    const VALUE_TYPE: ValueType = ValueType::String;

    fn from_flag_value(value: FlagValue) -> Option<Self> {
        value.into_string()
    }
}

impl FlagType for i64 {
    const VALUE_TYPE: ValueType = ValueType::Integer;

    fn from_flag_value(value: FlagValue) -> Option<Self> {
        value.as_integer()
    }
}

impl FlagType for f64 {
    const VALUE_TYPE: ValueType = ValueType::Double;

    fn from_flag_value(value: FlagValue) -> Option<Self> {
        value.as_double()
    }
}

impl FlagType for serde_json::Value {
    const VALUE_TYPE: ValueType = ValueType::Object;

    fn from_flag_value(value: FlagValue) -> Option<Self> {
        value.into_object()
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        t if t.eq_ignore_ascii_case("true") => Some(true),
        t if t.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

fn integral(d: f64) -> Option<i64> {
    (d.fract() == 0.0 && d >= i64::MIN as f64 && d < i64::MAX as f64).then_some(d as i64)
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}
