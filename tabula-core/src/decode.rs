use crate::{DbError, Error, Result, Value};
use anyhow::Context;
use atoi::FromRadix10SignedChecked;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str;
use time::{Date, PrimitiveDateTime, Time, macros::format_description};
use uuid::Uuid;

/// Portable column type tag, the key of the decoding table.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    Boolean,
    Integer,
    UnsignedInteger,
    Float,
    Decimal,
    #[default]
    Text,
    Binary,
    Date,
    Time,
    Timestamp,
    Json,
    Uuid,
}

impl ColumnKind {
    /// Map a catalog type name of either dialect (`int unsigned`, `character varying(20)`, `int8`, `timestamptz`, ...).
    ///
    /// Types without a portable counterpart (`interval`, `inet`, arrays, user enums) are read as text.
    pub fn from_type_name(name: &str) -> Self {
        let lower = name.trim().to_ascii_lowercase();
        let unsigned = lower.contains("unsigned");
        let base = lower
            .split(['(', ' '])
            .next()
            .unwrap_or_default();
        let base = if lower.starts_with("double precision") {
            "double"
        } else if lower.starts_with("character varying") {
            "varchar"
        } else {
            base
        };
        match base {
            "bool" | "boolean" => ColumnKind::Boolean,
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "int2"
            | "int4" | "int8" | "serial" | "bigserial" | "smallserial" | "year" | "oid" => {
                if unsigned {
                    ColumnKind::UnsignedInteger
                } else {
                    ColumnKind::Integer
                }
            }
            "float" | "float4" | "float8" | "double" | "real" => ColumnKind::Float,
            "decimal" | "numeric" | "dec" | "money" => ColumnKind::Decimal,
            "char" | "varchar" | "character" | "bpchar" | "text" | "tinytext" | "mediumtext"
            | "longtext" | "name" | "citext" | "enum" | "set" => ColumnKind::Text,
            "binary" | "varbinary" | "blob" | "tinyblob" | "mediumblob" | "longblob" | "bytea"
            | "bit" => ColumnKind::Binary,
            "date" => ColumnKind::Date,
            "time" | "timetz" => ColumnKind::Time,
            "datetime" | "timestamp" | "timestamptz" => ColumnKind::Timestamp,
            "json" | "jsonb" => ColumnKind::Json,
            "uuid" => ColumnKind::Uuid,
            _ => {
                log::debug!("Column type `{}` is read as text", name);
                ColumnKind::Text
            }
        }
    }
}

/// Column description reported by the driver alongside the result rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    pub name: String,
    pub kind: ColumnKind,
    pub nullable: bool,
}

impl RawColumn {
    pub fn new(name: impl Into<String>, kind: ColumnKind, nullable: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable,
        }
    }
}

/// One cell as received from the driver: text protocol bytes or an already typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bytes(Vec<u8>),
    Typed(Value),
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => RawValue::Null,
            v => RawValue::Typed(v),
        }
    }
}

/// Result set before decoding.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct RawRows {
    pub columns: Vec<RawColumn>,
    pub rows: Vec<Vec<RawValue>>,
}

/// Outcome of a statement that returns no rows.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Executed {
    pub rows_affected: u64,
    pub last_insert_id: Option<u64>,
}

/// Decode target for one column: strict when the column cannot hold NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanTarget {
    Strict { column: String, kind: ColumnKind },
    Nullable { column: String, kind: ColumnKind },
}

impl ScanTarget {
    pub fn reference(column: &RawColumn) -> Self {
        let (column_name, kind) = (column.name.clone(), column.kind);
        if column.nullable {
            ScanTarget::Nullable {
                column: column_name,
                kind,
            }
        } else {
            ScanTarget::Strict {
                column: column_name,
                kind,
            }
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            ScanTarget::Strict { kind, .. } | ScanTarget::Nullable { kind, .. } => *kind,
        }
    }

    pub fn column(&self) -> &str {
        match self {
            ScanTarget::Strict { column, .. } | ScanTarget::Nullable { column, .. } => column,
        }
    }

    /// Unwrap the raw cell into a plain [`Value`] of the target kind.
    pub fn dereference(&self, raw: RawValue) -> Result<Value> {
        let kind = self.kind();
        let result = match raw {
            RawValue::Null => match self {
                ScanTarget::Nullable { .. } => Ok(Value::Null),
                ScanTarget::Strict { column, .. } => Err(DbError::statement(
                    "scan",
                    format!("Unexpected NULL in non nullable column `{}`", column),
                )
                .into()),
            },
            RawValue::Bytes(bytes) => decode_bytes(kind, bytes),
            RawValue::Typed(value) => coerce(kind, value),
        };
        result.with_context(|| format!("While decoding column `{}`", self.column()))
    }
}

fn decode_bytes(kind: ColumnKind, bytes: Vec<u8>) -> Result<Value> {
    let text = || {
        str::from_utf8(&bytes)
            .map(str::trim)
            .map_err(|e| Error::new(e).context("Column bytes are not valid UTF-8"))
    };
    Ok(match kind {
        ColumnKind::Boolean => match text()? {
            "1" | "t" | "true" | "TRUE" | "y" => Value::Boolean(true),
            "0" | "f" | "false" | "FALSE" | "n" => Value::Boolean(false),
            v => return Err(Error::msg(format!("Cannot decode `{}` as boolean", v))),
        },
        ColumnKind::Integer => Value::Integer(parse_integer(text()?.as_bytes())?),
        ColumnKind::UnsignedInteger => {
            let v = text()?;
            Value::UnsignedInteger(
                v.parse()
                    .with_context(|| format!("Cannot decode `{}` as unsigned integer", v))?,
            )
        }
        ColumnKind::Float => {
            let v = text()?;
            Value::Float(
                fast_float::parse(v).with_context(|| format!("Cannot decode `{}` as float", v))?,
            )
        }
        ColumnKind::Decimal => {
            let v = text()?;
            Value::Decimal(
                Decimal::from_str_exact(v)
                    .or_else(|_| Decimal::from_scientific(v))
                    .with_context(|| format!("Cannot decode `{}` as decimal", v))?,
            )
        }
        ColumnKind::Date => Value::Date(parse_date(text()?)?),
        ColumnKind::Time => Value::Time(parse_time(text()?)?),
        ColumnKind::Timestamp => Value::Timestamp(parse_timestamp(text()?)?),
        ColumnKind::Uuid => Value::Uuid(if bytes.len() == 16 {
            Uuid::from_slice(&bytes)?
        } else {
            Uuid::parse_str(text()?)?
        }),
        ColumnKind::Text | ColumnKind::Json => Value::Text(
            String::from_utf8(bytes).context("Column bytes are not valid UTF-8")?,
        ),
        ColumnKind::Binary => Value::Blob(bytes),
    })
}

fn coerce(kind: ColumnKind, value: Value) -> Result<Value> {
    Ok(match (kind, value) {
        (ColumnKind::Boolean, Value::Integer(v)) => Value::Boolean(v != 0),
        (ColumnKind::Boolean, Value::UnsignedInteger(v)) => Value::Boolean(v != 0),
        (ColumnKind::Integer, Value::UnsignedInteger(v)) => Value::Integer(
            i64::try_from(v).with_context(|| format!("Value {} is out of range for i64", v))?,
        ),
        (ColumnKind::UnsignedInteger, Value::Integer(v)) => Value::UnsignedInteger(
            u64::try_from(v).with_context(|| format!("Value {} is out of range for u64", v))?,
        ),
        (ColumnKind::Date, Value::Timestamp(v)) => Value::Date(v.date()),
        (ColumnKind::Text | ColumnKind::Json, Value::Blob(v)) => {
            Value::Text(String::from_utf8(v).context("Column bytes are not valid UTF-8")?)
        }
        (kind, Value::Text(v)) if !matches!(kind, ColumnKind::Text | ColumnKind::Json) => {
            decode_bytes(kind, v.into_bytes())?
        }
        (_, v) => v,
    })
}

fn parse_integer(bytes: &[u8]) -> Result<i64> {
    match i64::from_radix_10_signed_checked(bytes) {
        (Some(v), used) if used == bytes.len() && used > 0 => Ok(v),
        _ => Err(Error::msg(format!(
            "Cannot decode `{}` as integer",
            String::from_utf8_lossy(bytes)
        ))),
    }
}

pub fn parse_date(value: &str) -> Result<Date> {
    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .with_context(|| format!("Cannot parse '{}' as time::Date", value))
}

pub fn parse_time(value: &str) -> Result<Time> {
    Time::parse(
        value,
        format_description!("[hour]:[minute]:[second].[subsecond]"),
    )
    .or(Time::parse(
        value,
        format_description!("[hour]:[minute]:[second]"),
    ))
    .or(Time::parse(value, format_description!("[hour]:[minute]")))
    .with_context(|| format!("Cannot parse '{}' as time::Time", value))
}

pub fn parse_timestamp(value: &str) -> Result<PrimitiveDateTime> {
    PrimitiveDateTime::parse(
        value,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
    )
    .or(PrimitiveDateTime::parse(
        value,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ))
    .or(PrimitiveDateTime::parse(
        value,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    ))
    .or(PrimitiveDateTime::parse(
        value,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ))
    .with_context(|| format!("Cannot parse '{}' as time::PrimitiveDateTime", value))
}
