use crate::raw_value;
use mysql_async::{
    Column, Row,
    consts::{ColumnFlags, ColumnType},
};
use tabula_core::{ColumnKind, RawColumn, RawRows, Result};

/// Charset number MySQL reports for binary strings.
const BINARY_CHARSET: u16 = 63;

pub(crate) fn raw_column(column: &Column) -> RawColumn {
    let flags = column.flags();
    let kind = match column.column_type() {
        ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_LONGLONG
        | ColumnType::MYSQL_TYPE_YEAR => {
            if flags.contains(ColumnFlags::UNSIGNED_FLAG) {
                ColumnKind::UnsignedInteger
            } else {
                ColumnKind::Integer
            }
        }
        ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => ColumnKind::Float,
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => ColumnKind::Decimal,
        ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE => ColumnKind::Date,
        ColumnType::MYSQL_TYPE_TIME | ColumnType::MYSQL_TYPE_TIME2 => ColumnKind::Time,
        ColumnType::MYSQL_TYPE_DATETIME
        | ColumnType::MYSQL_TYPE_DATETIME2
        | ColumnType::MYSQL_TYPE_TIMESTAMP
        | ColumnType::MYSQL_TYPE_TIMESTAMP2 => ColumnKind::Timestamp,
        ColumnType::MYSQL_TYPE_JSON => ColumnKind::Json,
        ColumnType::MYSQL_TYPE_BIT => ColumnKind::Binary,
        ColumnType::MYSQL_TYPE_TINY_BLOB
        | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
        | ColumnType::MYSQL_TYPE_LONG_BLOB
        | ColumnType::MYSQL_TYPE_BLOB
        | ColumnType::MYSQL_TYPE_STRING
        | ColumnType::MYSQL_TYPE_VAR_STRING
        | ColumnType::MYSQL_TYPE_VARCHAR
            if column.character_set() == BINARY_CHARSET =>
        {
            ColumnKind::Binary
        }
        _ => ColumnKind::Text,
    };
    RawColumn::new(
        column.name_str().into_owned(),
        kind,
        !flags.contains(ColumnFlags::NOT_NULL_FLAG),
    )
}

/// Collect a whole result in its raw form.
pub(crate) fn raw_rows(columns: &[Column], rows: Vec<Row>) -> Result<RawRows> {
    Ok(RawRows {
        columns: columns.iter().map(raw_column).collect(),
        rows: rows
            .into_iter()
            .map(|row| row.unwrap().into_iter().map(raw_value).collect())
            .collect::<Result<_>>()?,
    })
}
