use mysql_async::Value as MySqlValue;
use tabula_core::{Error, RawValue, Result, Value};
use time::{Date, Month, PrimitiveDateTime, Time};

pub(crate) struct ValueWrap(pub(crate) Value);

impl From<Value> for ValueWrap {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl TryFrom<ValueWrap> for MySqlValue {
    type Error = Error;

    fn try_from(value: ValueWrap) -> Result<Self> {
        Ok(match value.0 {
            Value::Null => MySqlValue::NULL,
            Value::Boolean(v) => MySqlValue::from(v),
            Value::Integer(v) => MySqlValue::from(v),
            Value::UnsignedInteger(v) => MySqlValue::from(v),
            Value::Float(v) => MySqlValue::from(v),
            Value::Decimal(v) => MySqlValue::from(v),
            Value::Text(v) => MySqlValue::from(v),
            Value::Blob(v) => MySqlValue::from(v),
            Value::Date(v) => MySqlValue::from(v),
            Value::Time(v) => MySqlValue::from(v),
            Value::Timestamp(v) => {
                let year = u16::try_from(v.year())
                    .map_err(|_| Error::msg(format!("Date {} is out of range for MySQL", v)))?;
                MySqlValue::Date(
                    year,
                    v.month().into(),
                    v.day(),
                    v.hour(),
                    v.minute(),
                    v.second(),
                    v.microsecond(),
                )
            }
            Value::Uuid(v) => MySqlValue::from(v.to_string()),
        })
    }
}

/// Cell received from the server: text protocol bytes stay raw, binary protocol values are typed.
pub(crate) fn raw_value(value: MySqlValue) -> Result<RawValue> {
    Ok(match value {
        MySqlValue::NULL => RawValue::Null,
        MySqlValue::Bytes(v) => RawValue::Bytes(v),
        MySqlValue::Int(v) => RawValue::Typed(Value::Integer(v)),
        MySqlValue::UInt(v) => RawValue::Typed(Value::UnsignedInteger(v)),
        MySqlValue::Float(v) => RawValue::Typed(Value::Float(v.into())),
        MySqlValue::Double(v) => RawValue::Typed(Value::Float(v)),
        MySqlValue::Date(year, month, day, hour, minute, second, micro) => {
            let invalid = || Error::msg(format!("Invalid MySQL date {:?}", value));
            let date = Month::try_from(month)
                .ok()
                .and_then(|month| Date::from_calendar_date(year.into(), month, day).ok())
                .ok_or_else(invalid)?;
            let time = Time::from_hms_micro(hour, minute, second, micro).map_err(|_| invalid())?;
            RawValue::Typed(Value::Timestamp(PrimitiveDateTime::new(date, time)))
        }
        MySqlValue::Time(negative, days, hours, minutes, seconds, micro) => {
            if negative || days > 0 {
                return Err(Error::msg(format!(
                    "MySQL time {:?} is outside the range of a time of day",
                    value
                )));
            }
            RawValue::Typed(Value::Time(
                Time::from_hms_micro(hours, minutes, seconds, micro)
                    .map_err(|_| Error::msg(format!("Invalid MySQL time {:?}", value)))?,
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn outgoing() {
        let value: MySqlValue = ValueWrap(Value::Timestamp(datetime!(2024-05-06 07:08:09)))
            .try_into()
            .unwrap();
        assert_eq!(value, MySqlValue::Date(2024, 5, 6, 7, 8, 9, 0));
        let value: MySqlValue = ValueWrap(Value::Null).try_into().unwrap();
        assert_eq!(value, MySqlValue::NULL);
    }

    #[test]
    fn incoming() {
        assert_eq!(
            raw_value(MySqlValue::Date(2024, 5, 6, 7, 8, 9, 0)).unwrap(),
            RawValue::Typed(Value::Timestamp(datetime!(2024-05-06 07:08:09)))
        );
        assert_eq!(
            raw_value(MySqlValue::Bytes(b"12".to_vec())).unwrap(),
            RawValue::Bytes(b"12".to_vec())
        );
        assert!(raw_value(MySqlValue::Time(true, 0, 1, 0, 0, 0)).is_err());
        assert!(raw_value(MySqlValue::Date(2024, 13, 1, 0, 0, 0, 0)).is_err());
    }
}
