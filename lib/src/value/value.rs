use std::fmt;
use std::sync::Arc;
use std::collections::BTreeMap;

use either::Either;
use serde::{Serialize, Deserialize};

pub type Dict<K = Arc<str>, V = Value> = BTreeMap<K, V>;

/// Represents any valid value: file contents or configuration data.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Num(Num),
    String(Arc<str>),
    Array(Arc<Vec<Value>>),
    Dict(Arc<Dict>),
    #[serde(skip_deserializing)]
    Bytes(Arc<[u8]>),
}

/// A signed integer or a float.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Num {
    Int(i64),
    Float(f64),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(&**s),
            _ => None
        }
    }

    pub fn into_str(self) -> Result<Arc<str>, Value> {
        match self {
            Value::String(s) => Ok(s),
            _ => Err(self),
        }
    }

    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v.as_slice()),
            _ => None
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Value::Dict(v) => Some(&**v),
            _ => None
        }
    }

    pub fn into_dict(self) -> Result<Arc<Dict>, Value> {
        match self {
            Value::Dict(v) => Ok(v),
            _ => Err(self)
        }
    }

    /// The raw bytes of a string or byte value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(s) => Some(s.as_bytes()),
            Value::Bytes(b) => Some(b),
            _ => None
        }
    }

    /// Looks up a `.`-separated key path through nested dictionaries.
    ///
    /// ```rust
    /// use spindle::value::{Dict, Value};
    ///
    /// let inner = Dict::from([("name".into(), Value::from("spindle"))]);
    /// let outer = Value::from(Dict::from([("site".into(), Value::from(inner))]));
    /// assert_eq!(outer.lookup("site.name"), Some(&Value::from("spindle")));
    /// assert_eq!(outer.lookup("site.missing"), None);
    /// ```
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(self, |value, key| value.as_dict()?.get(key))
    }

    /// Returns `true` for values that render as plain text.
    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Null | Value::Bool(_) | Value::Num(_) | Value::String(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Num(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Dict(_) => "dict",
            Value::Bytes(_) => "bytes",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => b.fmt(f),
            Value::Num(Num::Int(n)) => n.fmt(f),
            Value::Num(Num::Float(n)) => n.fmt(f),
            Value::String(s) => s.fmt(f),
            Value::Bytes(b) => String::from_utf8_lossy(b).fmt(f),
            Value::Array(_) | Value::Dict(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

macro_rules! impl_from_primitive {
    ($($T:ty),+ => $E:ident::$kind:ident) => {
        $(
            impl From<$T> for $E {
                fn from(value: $T) -> Self {
                    $E::$kind(value.into())
                }
            }
        )+
    };
}

impl_from_primitive!(bool => Value::Bool);
impl_from_primitive!(&str => Value::String);
impl_from_primitive!(std::borrow::Cow<'_, str> => Value::String);
impl_from_primitive!(String => Value::String);
impl_from_primitive!(Arc<str> => Value::String);
impl_from_primitive!(Vec<u8> => Value::Bytes);
impl_from_primitive!(Arc<[u8]> => Value::Bytes);
impl_from_primitive!(Arc<Vec<Value>> => Value::Array);
impl_from_primitive!(Arc<Dict> => Value::Dict);
impl_from_primitive!(i8, i16, i32, i64 => Value::Num);
impl_from_primitive!(f64 => Value::Num);

impl From<i8> for Num { fn from(v: i8) -> Self { Num::Int(v.into()) } }
impl From<i16> for Num { fn from(v: i16) -> Self { Num::Int(v.into()) } }
impl From<i32> for Num { fn from(v: i32) -> Self { Num::Int(v.into()) } }
impl From<i64> for Num { fn from(v: i64) -> Self { Num::Int(v) } }
impl From<f64> for Num { fn from(v: f64) -> Self { Num::Float(v) } }

impl From<()> for Value  {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<A, B> From<Either<A, B>> for Value where Value: From<A>, Value: From<B> {
    fn from(value: Either<A, B>) -> Self {
        either::for_both!(value, v => v.into())
    }
}

impl<T> From<Option<T>> for Value where Value: From<T> {
    fn from(value: Option<T>) -> Self {
        value.map(Value::from).unwrap_or(Value::Null)
    }
}

impl From<Dict> for Value {
    fn from(value: Dict) -> Self {
        Value::Dict(Arc::new(value))
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        let vec = iter.into_iter().collect::<Vec<Value>>();
        Value::Array(Arc::new(vec))
    }
}

macro_rules! impl_try_from_value {
    ($($T:ty),+ => | $v:ident | $e:expr) => {
        $(
            impl TryFrom<$crate::value::Value> for $T {
                type Error = Value;

                fn try_from($v: $crate::value::Value) -> Result<Self, Self::Error> {
                    (|| $e)()
                }
            }
        )+
    };
}

impl_try_from_value!(Arc<str> => |v| v.into_str());
impl_try_from_value!(String => |v| v.into_str().map(|s| s.to_string()));
impl_try_from_value!(Arc<Dict> => |v| v.into_dict());
impl_try_from_value!(Vec<u8> => |v| match v {
    Value::Bytes(b) => Ok(b.to_vec()),
    Value::String(s) => Ok(s.as_bytes().to_vec()),
    v => Err(v),
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_config_shaped_data() {
        let value: Value = serde_json::from_str(r#"{"a": 1, "b": [true, "x"], "c": 1.5}"#).unwrap();
        assert_eq!(value.lookup("a"), Some(&Value::from(1i64)));
        assert_eq!(value.lookup("c").unwrap().to_string(), "1.5");
        assert_eq!(value.lookup("b").unwrap().as_slice().unwrap().len(), 2);
        assert_eq!(value.lookup("b").unwrap().to_string(), r#"[true,"x"]"#);
    }

    #[test]
    fn scalar_values_display_as_text() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::from("text").to_string(), "text");
        assert_eq!(Value::from(false).to_string(), "false");
        assert!(!Value::from(Dict::new()).is_scalar());
    }
}
