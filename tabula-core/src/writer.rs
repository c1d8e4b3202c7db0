use crate::{DbError, IsolationLevel, Result, TransactionConfig, Value};
use std::fmt::Write;
use time::{Date, Time};

macro_rules! write_integer {
    ($out:ident, $value:expr) => {{
        let mut buffer = itoa::Buffer::new();
        $out.push_str(buffer.format($value));
    }};
}
macro_rules! write_float {
    ($this:ident, $out:ident, $value:expr) => {{
        if $value.is_finite() {
            let mut buffer = ryu::Buffer::new();
            $out.push_str(buffer.format($value));
        } else {
            $this.write_value_string($out, &$value.to_string());
        }
    }};
}

/// How the dialect hands back the identity generated by an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityStrategy {
    /// The driver reports the last insert id of the statement.
    LastInsertId,
    /// The insert carries a `RETURNING` clause scanned like a query.
    Returning,
}

/// Dialect primitives: identifier and value quoting, placeholders, limits, transaction statements.
///
/// Defaults follow ANSI SQL, drivers override what differs.
pub trait SqlWriter: Send + Sync {
    fn as_dyn(&self) -> &dyn SqlWriter;

    fn quote_symbol(&self) -> char {
        '"'
    }

    fn write_escaped(&self, out: &mut String, value: &str, search: char, replace: &str) {
        let mut position = 0;
        for (i, c) in value.char_indices() {
            if c == search {
                out.push_str(&value[position..i]);
                out.push_str(replace);
                position = i + c.len_utf8();
            }
        }
        out.push_str(&value[position..]);
    }

    fn write_identifier_quoted(&self, out: &mut String, value: &str) {
        let symbol = self.quote_symbol();
        out.push(symbol);
        self.write_escaped(out, value, symbol, &format!("{symbol}{symbol}"));
        out.push(symbol);
    }

    /// Placeholder for the `index`-th (1-based) bound parameter.
    fn write_placeholder(&self, out: &mut String, _index: usize) {
        out.push('?');
    }

    fn identity_strategy(&self) -> IdentityStrategy {
        IdentityStrategy::LastInsertId
    }

    fn write_returning(&self, out: &mut String, column: &str) {
        out.push_str(" RETURNING ");
        self.write_identifier_quoted(out, column);
    }

    /// Tail of an insert that sets no column.
    fn write_default_values(&self, out: &mut String) {
        out.push_str(" DEFAULT VALUES");
    }

    /// Count standing in for "all rows" when only an offset is requested.
    fn limit_sentinel(&self) -> u64 {
        i64::MAX as u64
    }

    fn write_limit(&self, out: &mut String, count: Option<u64>, offset: Option<u64>) {
        let offset = offset.filter(|v| *v > 0);
        let count = match (count, offset) {
            (Some(count), _) => count,
            (None, Some(..)) => self.limit_sentinel(),
            (None, None) => return,
        };
        out.push_str(" LIMIT ");
        write_integer!(out, count);
        if let Some(offset) = offset {
            out.push_str(" OFFSET ");
            write_integer!(out, offset);
        }
    }

    /// Words left bare when quoting identifier expressions.
    fn unquoteable_tokens(&self) -> &[&'static str] {
        &[
            "NULL",
            "TRUE",
            "FALSE",
            "DEFAULT",
            "CURRENT_DATE",
            "CURRENT_TIME",
            "CURRENT_TIMESTAMP",
            "AND",
            "OR",
            "NOT",
            "DISTINCT",
        ]
    }

    /// Operators that split an identifier expression, matched between whitespace.
    fn operator_splitters(&self) -> &[&'static str] {
        &[
            "||", "+", "-", "*", "/", "%", "=", "<>", "!=", "<=", ">=", "<", ">", "AND", "OR",
            "LIKE",
        ]
    }

    /// Functions whose argument is quoted as an identifier expression.
    fn bare_functions(&self) -> &[&'static str] {
        &[
            "ABS", "AVG", "COALESCE", "COUNT", "LENGTH", "LOWER", "MAX", "MIN", "ROUND", "SUM",
            "TRIM", "UPPER",
        ]
    }

    fn write_value(&self, out: &mut String, value: &Value) {
        match value {
            Value::Null => self.write_value_none(out),
            Value::Boolean(v) => self.write_value_bool(out, *v),
            Value::Integer(v) => write_integer!(out, *v),
            Value::UnsignedInteger(v) => write_integer!(out, *v),
            Value::Float(v) => write_float!(self, out, *v),
            Value::Decimal(v) => drop(write!(out, "{}", v)),
            Value::Text(v) => self.write_value_string(out, v),
            Value::Blob(v) => self.write_value_blob(out, v),
            Value::Date(v) => {
                out.push('\'');
                self.write_value_date(out, v);
                out.push('\'');
            }
            Value::Time(v) => {
                out.push('\'');
                self.write_value_time(out, v);
                out.push('\'');
            }
            Value::Timestamp(v) => {
                out.push('\'');
                self.write_value_date(out, &v.date());
                out.push(' ');
                self.write_value_time(out, &v.time());
                out.push('\'');
            }
            Value::Uuid(v) => drop(write!(out, "'{}'", v)),
        }
    }

    fn write_value_none(&self, out: &mut String) {
        out.push_str("NULL")
    }

    fn write_value_bool(&self, out: &mut String, value: bool) {
        out.push_str(["FALSE", "TRUE"][value as usize])
    }

    fn write_value_string(&self, out: &mut String, value: &str) {
        out.push('\'');
        self.write_escaped(out, value, '\'', "''");
        out.push('\'');
    }

    fn write_value_blob(&self, out: &mut String, value: &[u8]) {
        out.push_str("X'");
        out.push_str(&hex::encode_upper(value));
        out.push('\'');
    }

    fn write_value_date(&self, out: &mut String, value: &Date) {
        let _ = write!(
            out,
            "{:04}-{:02}-{:02}",
            value.year(),
            value.month() as u8,
            value.day()
        );
    }

    fn write_value_time(&self, out: &mut String, value: &Time) {
        let _ = write!(
            out,
            "{:02}:{:02}:{:02}",
            value.hour(),
            value.minute(),
            value.second(),
        );
        let mut subsecond = value.nanosecond();
        if subsecond > 0 {
            let mut width = 9;
            while subsecond % 10 == 0 {
                subsecond /= 10;
                width -= 1;
            }
            let _ = write!(out, ".{:0width$}", subsecond);
        }
    }

    fn write_transaction_begin(&self, out: &mut String, config: &TransactionConfig) {
        out.push_str("BEGIN");
        if let Some(isolation) = config.isolation {
            self.write_isolation_level(out, isolation);
        }
        if config.read_only {
            out.push_str(" READ ONLY");
        }
    }

    fn write_isolation_level(&self, out: &mut String, isolation: IsolationLevel) {
        out.push_str(" ISOLATION LEVEL ");
        out.push_str(isolation.as_sql());
    }

    fn write_transaction_commit(&self, out: &mut String) {
        out.push_str("COMMIT");
    }

    fn write_transaction_rollback(&self, out: &mut String) {
        out.push_str("ROLLBACK");
    }

    /// Query drawing the next value of the sequence `name`.
    fn write_next_sequence_id(&self, _out: &mut String, name: &str) -> Result<()> {
        Err(DbError::Configuration(format!(
            "This dialect has no sequences, cannot draw from `{}`",
            name
        ))
        .into())
    }
}

/// ANSI flavoured writer, used when no driver specific behavior is needed.
#[derive(Default, Debug, Clone, Copy)]
pub struct GenericSqlWriter {}

impl SqlWriter for GenericSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }
}
