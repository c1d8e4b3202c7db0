use crate::{Error, Result, parse_date, parse_time, parse_timestamp};
use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use serde::{Deserialize, Serialize};
use std::{any, fmt};
use time::{Date, PrimitiveDateTime, Time};
use uuid::Uuid;

/// Plain decoded value: what a column holds once unwrapped from the driver representation.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    UnsignedInteger(u64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Blob(Vec<u8>),
    Date(Date),
    Time(Time),
    Timestamp(PrimitiveDateTime),
    Uuid(Uuid),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// A value the database is expected to generate instead: NULL, empty text or `false`.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null | Value::Boolean(false) => true,
            Value::Text(v) => v.is_empty(),
            _ => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::UnsignedInteger(v) => i64::try_from(*v).ok(),
            Value::Decimal(v) if v.fract().is_zero() => v.to_i64(),
            Value::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Boolean(..) => "boolean",
            Value::Integer(..) => "integer",
            Value::UnsignedInteger(..) => "unsigned integer",
            Value::Float(..) => "float",
            Value::Decimal(..) => "decimal",
            Value::Text(..) => "text",
            Value::Blob(..) => "blob",
            Value::Date(..) => "date",
            Value::Time(..) => "time",
            Value::Timestamp(..) => "timestamp",
            Value::Uuid(..) => "uuid",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::UnsignedInteger(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
            Value::Blob(v) => write!(f, "<{} bytes>", v.len()),
            Value::Date(v) => write!(f, "{v}"),
            Value::Time(v) => write!(f, "{v}"),
            Value::Timestamp(v) => write!(f, "{v}"),
            Value::Uuid(v) => write!(f, "{v}"),
        }
    }
}

/// Conversion between native Rust types and [`Value`].
///
/// `try_from_value` accepts the canonical variant and the lossless alternatives
/// (other integer widths after a range check, numeric text), anything else is an error
/// naming both sides.
pub trait AsValue {
    fn as_value(self) -> Value;
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
}

impl<T: AsValue> From<T> for Value {
    fn from(value: T) -> Self {
        value.as_value()
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.into())
    }
}

fn mismatch<T>(value: &Value) -> Error {
    Error::msg(format!(
        "Cannot convert {} `{}` into {}",
        value.type_name(),
        value,
        any::type_name::<T>()
    ))
}

macro_rules! impl_as_value_integer {
    ($($source:ty),+ $(,)?) => {
        $(
            impl AsValue for $source {
                fn as_value(self) -> Value {
                    Value::Integer(self as i64)
                }
                fn try_from_value(value: Value) -> Result<Self> {
                    let wide: Option<i128> = match &value {
                        Value::Integer(v) => Some(*v as i128),
                        Value::UnsignedInteger(v) => Some(*v as i128),
                        Value::Boolean(v) => Some(*v as i128),
                        Value::Decimal(v) if v.fract().is_zero() => v.to_i128(),
                        Value::Text(v) => v.trim().parse::<i128>().ok(),
                        _ => None,
                    };
                    wide.and_then(|v| <$source>::try_from(v).ok())
                        .ok_or_else(|| mismatch::<$source>(&value))
                }
            }
        )+
    };
}
impl_as_value_integer!(i8, i16, i32, i64, u8, u16, u32);

impl AsValue for u64 {
    fn as_value(self) -> Value {
        Value::UnsignedInteger(self)
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match &value {
            Value::UnsignedInteger(v) => Some(*v),
            Value::Integer(v) => u64::try_from(*v).ok(),
            Value::Decimal(v) if v.fract().is_zero() => v.to_u64(),
            Value::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| mismatch::<u64>(&value))
    }
}

impl AsValue for bool {
    fn as_value(self) -> Value {
        Value::Boolean(self)
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Boolean(v) => Ok(*v),
            Value::Integer(v) => Ok(*v != 0),
            Value::UnsignedInteger(v) => Ok(*v != 0),
            Value::Text(v) => match v.as_str() {
                "1" | "t" | "true" | "TRUE" => Ok(true),
                "0" | "f" | "false" | "FALSE" => Ok(false),
                _ => Err(mismatch::<bool>(&value)),
            },
            _ => Err(mismatch::<bool>(&value)),
        }
    }
}

impl AsValue for f64 {
    fn as_value(self) -> Value {
        Value::Float(self)
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Float(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            Value::UnsignedInteger(v) => Some(*v as f64),
            Value::Decimal(v) => v.to_f64(),
            Value::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| mismatch::<f64>(&value))
    }
}

impl AsValue for f32 {
    fn as_value(self) -> Value {
        Value::Float(self as f64)
    }
    fn try_from_value(value: Value) -> Result<Self> {
        f64::try_from_value(value).map(|v| v as f32)
    }
}

impl AsValue for Decimal {
    fn as_value(self) -> Value {
        Value::Decimal(self)
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Decimal(v) => Some(*v),
            Value::Integer(v) => Some(Decimal::from(*v)),
            Value::UnsignedInteger(v) => Some(Decimal::from(*v)),
            Value::Float(v) => Decimal::from_f64(*v),
            Value::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| mismatch::<Decimal>(&value))
    }
}

impl AsValue for String {
    fn as_value(self) -> Value {
        Value::Text(self)
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(v) => Ok(v),
            Value::Blob(v) => String::from_utf8(v).map_err(Error::new),
            Value::Null => Err(mismatch::<String>(&Value::Null)),
            v => Ok(v.to_string()),
        }
    }
}

impl AsValue for Vec<u8> {
    fn as_value(self) -> Value {
        Value::Blob(self)
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(v) => Ok(v),
            Value::Text(v) => Ok(v.into_bytes()),
            v => Err(mismatch::<Vec<u8>>(&v)),
        }
    }
}

macro_rules! impl_as_value_temporal {
    ($source:ty, $destination:path, $parse:path) => {
        impl AsValue for $source {
            fn as_value(self) -> Value {
                $destination(self)
            }
            fn try_from_value(value: Value) -> Result<Self> {
                match &value {
                    $destination(v) => Ok(*v),
                    Value::Text(v) => $parse(v.trim()),
                    _ => Err(mismatch::<$source>(&value)),
                }
            }
        }
    };
}
impl_as_value_temporal!(Date, Value::Date, parse_date);
impl_as_value_temporal!(Time, Value::Time, parse_time);
impl_as_value_temporal!(PrimitiveDateTime, Value::Timestamp, parse_timestamp);

impl AsValue for Uuid {
    fn as_value(self) -> Value {
        Value::Uuid(self)
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Uuid(v) => Ok(*v),
            Value::Text(v) => Uuid::parse_str(v).map_err(Error::new),
            Value::Blob(v) => Uuid::from_slice(v).map_err(Error::new),
            _ => Err(mismatch::<Uuid>(&value)),
        }
    }
}

impl<T: AsValue> AsValue for Option<T> {
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => Value::Null,
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::try_from_value(value).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn integers() {
        assert_eq!(42i32.as_value(), Value::Integer(42));
        assert_eq!(i8::try_from_value(Value::Integer(127)).unwrap(), 127);
        assert!(i8::try_from_value(Value::Integer(128)).is_err());
        assert_eq!(u16::try_from_value(Value::Text(" 65535 ".into())).unwrap(), 65535);
        assert_eq!(u64::try_from_value(Value::Integer(7)).unwrap(), 7);
        assert!(u64::try_from_value(Value::Integer(-7)).is_err());
        assert!(i64::try_from_value(Value::Float(1.5)).is_err());
    }

    #[test]
    fn booleans() {
        assert!(bool::try_from_value(Value::Integer(1)).unwrap());
        assert!(!bool::try_from_value(Value::Text("f".into())).unwrap());
        assert!(bool::try_from_value(Value::Text("maybe".into())).is_err());
    }

    #[test]
    fn temporal_from_text() {
        assert_eq!(
            Date::try_from_value(Value::Text("2024-02-29".into())).unwrap(),
            date!(2024 - 02 - 29)
        );
        assert_eq!(
            PrimitiveDateTime::try_from_value(Value::Text("2024-02-29 10:11:12".into())).unwrap(),
            datetime!(2024-02-29 10:11:12)
        );
    }

    #[test]
    fn optional() {
        assert_eq!(Option::<i64>::try_from_value(Value::Null).unwrap(), None);
        assert_eq!(
            Option::<String>::try_from_value(Value::Text("a".into())).unwrap(),
            Some("a".to_string())
        );
        assert_eq!(None::<i32>.as_value(), Value::Null);
    }

    #[test]
    fn blank() {
        assert!(Value::Null.is_blank());
        assert!(Value::Text(String::new()).is_blank());
        assert!(Value::Boolean(false).is_blank());
        assert!(!Value::Integer(0).is_blank());
    }
}
