use bytes::BytesMut;
use postgres_types::{FromSql, IsNull, ToSql, Type, to_sql_checked};
use rust_decimal::Decimal;
use std::error::Error;
use tabula_core::{AsValue, ColumnKind, RawColumn, RawValue, Value};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};
use tokio_postgres::Row;
use uuid::Uuid;

type BoxError = Box<dyn Error + Sync + Send>;

/// Parameter converted to the type the server expects for its placeholder.
#[derive(Debug)]
pub(crate) struct ValueHolder(pub(crate) Value);

impl From<Value> for ValueHolder {
    fn from(value: Value) -> Self {
        ValueHolder(value)
    }
}

impl ToSql for ValueHolder {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        if self.0.is_null() {
            return Ok(IsNull::Yes);
        }
        macro_rules! convert {
            ($target:ty) => {
                <$target as AsValue>::try_from_value(self.0.clone())?.to_sql(ty, out)
            };
        }
        match *ty {
            Type::BOOL => convert!(bool),
            Type::INT2 => convert!(i16),
            Type::INT4 => convert!(i32),
            Type::INT8 => convert!(i64),
            Type::OID => convert!(u32),
            Type::FLOAT4 => convert!(f32),
            Type::FLOAT8 => convert!(f64),
            Type::NUMERIC => convert!(Decimal),
            Type::BYTEA => convert!(Vec<u8>),
            Type::DATE => convert!(Date),
            Type::TIME => convert!(Time),
            Type::TIMESTAMP => convert!(PrimitiveDateTime),
            Type::TIMESTAMPTZ => {
                PrimitiveDateTime::try_from_value(self.0.clone())?
                    .assume_utc()
                    .to_sql(ty, out)
            }
            Type::UUID => convert!(Uuid),
            Type::JSONB => {
                out.extend_from_slice(&[1]);
                out.extend_from_slice(self.text().as_bytes());
                Ok(IsNull::No)
            }
            _ => {
                out.extend_from_slice(self.text().as_bytes());
                Ok(IsNull::No)
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

impl ValueHolder {
    fn text(&self) -> String {
        match &self.0 {
            Value::Text(v) => v.clone(),
            v => v.to_string(),
        }
    }
}

/// Bytes of a column whose type has no dedicated decoding.
struct Opaque(Vec<u8>);

impl<'a> FromSql<'a> for Opaque {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        let raw = match *ty {
            Type::JSONB => raw.get(1..).unwrap_or_default(),
            _ => raw,
        };
        Ok(Opaque(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

pub(crate) fn column_kind(ty: &Type) -> ColumnKind {
    match *ty {
        Type::BOOL => ColumnKind::Boolean,
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => ColumnKind::Integer,
        Type::FLOAT4 | Type::FLOAT8 => ColumnKind::Float,
        Type::NUMERIC => ColumnKind::Decimal,
        Type::BYTEA => ColumnKind::Binary,
        Type::DATE => ColumnKind::Date,
        Type::TIME => ColumnKind::Time,
        Type::TIMESTAMP | Type::TIMESTAMPTZ => ColumnKind::Timestamp,
        Type::JSON | Type::JSONB => ColumnKind::Json,
        Type::UUID => ColumnKind::Uuid,
        _ => ColumnKind::Text,
    }
}

pub(crate) fn raw_column(column: &tokio_postgres::Column) -> RawColumn {
    RawColumn::new(column.name(), column_kind(column.type_()), true)
}

/// Read the cell `index` of `row` with the decoding matching its type.
pub(crate) fn raw_value(row: &Row, index: usize) -> Result<RawValue, tokio_postgres::Error> {
    macro_rules! read {
        ($source:ty, $wrap:expr) => {
            row.try_get::<_, Option<$source>>(index)?
                .map(|v| RawValue::Typed($wrap(v)))
                .unwrap_or(RawValue::Null)
        };
    }
    let ty = row.columns()[index].type_();
    Ok(match *ty {
        Type::BOOL => read!(bool, Value::Boolean),
        Type::INT2 => read!(i16, |v: i16| Value::Integer(v.into())),
        Type::INT4 => read!(i32, |v: i32| Value::Integer(v.into())),
        Type::INT8 => read!(i64, Value::Integer),
        Type::OID => read!(u32, |v: u32| Value::Integer(v.into())),
        Type::FLOAT4 => read!(f32, |v: f32| Value::Float(v.into())),
        Type::FLOAT8 => read!(f64, Value::Float),
        Type::NUMERIC => read!(Decimal, Value::Decimal),
        Type::BYTEA => read!(Vec<u8>, Value::Blob),
        Type::DATE => read!(Date, Value::Date),
        Type::TIME => read!(Time, Value::Time),
        Type::TIMESTAMP => read!(PrimitiveDateTime, Value::Timestamp),
        Type::TIMESTAMPTZ => read!(OffsetDateTime, |v: OffsetDateTime| {
            let v = v.to_offset(time::UtcOffset::UTC);
            Value::Timestamp(PrimitiveDateTime::new(v.date(), v.time()))
        }),
        Type::UUID => read!(Uuid, Value::Uuid),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            read!(String, Value::Text)
        }
        _ => row
            .try_get::<_, Option<Opaque>>(index)?
            .map(|v| RawValue::Bytes(v.0))
            .unwrap_or(RawValue::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: Value, ty: &Type) -> Result<(IsNull, BytesMut), BoxError> {
        let mut out = BytesMut::new();
        let null = ValueHolder(value).to_sql(ty, &mut out)?;
        Ok((null, out))
    }

    #[test]
    fn parameters_follow_the_server_type() {
        let (_, out) = encode(Value::Integer(7), &Type::INT4).unwrap();
        assert_eq!(&out[..], &7i32.to_be_bytes());
        let (_, out) = encode(Value::Text("12".into()), &Type::INT8).unwrap();
        assert_eq!(&out[..], &12i64.to_be_bytes());
        let (_, out) = encode(Value::Integer(5), &Type::TEXT).unwrap();
        assert_eq!(&out[..], b"5");
        let (null, _) = encode(Value::Null, &Type::INT4).unwrap();
        assert!(matches!(null, IsNull::Yes));
        assert!(encode(Value::Integer(i64::MAX), &Type::INT2).is_err());
    }

    #[test]
    fn kinds() {
        assert_eq!(column_kind(&Type::INT8), ColumnKind::Integer);
        assert_eq!(column_kind(&Type::TIMESTAMPTZ), ColumnKind::Timestamp);
        assert_eq!(column_kind(&Type::XML), ColumnKind::Text);
    }
}
