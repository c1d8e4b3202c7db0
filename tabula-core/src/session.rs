use crate::{
    Adapter, CallContext, DbError, Dialect, Driver, Executed, IdentityStrategy, Literal, RawRows,
    Result, Row, Rowset, ScanTarget, Select, SqlWriter, Value, log_error, separated_by,
};
use anyhow::Context;
use std::{fmt, future::Future};

/// WHERE input of update, delete and table fetches.
#[derive(Default, Debug, Clone)]
pub enum Condition {
    /// Every row.
    #[default]
    None,
    Raw(String),
    /// AND joined.
    All(Vec<String>),
    /// Condition texts with `?` markers, each quoted with its value and AND joined.
    Bound(Vec<(String, Literal)>),
}

impl Condition {
    pub fn is_none(&self) -> bool {
        match self {
            Condition::None => true,
            Condition::Raw(v) => v.trim().is_empty(),
            Condition::All(v) => v.iter().all(|v| v.trim().is_empty()),
            Condition::Bound(v) => v.is_empty(),
        }
    }

    /// The terms with their values quoted in, not parenthesized.
    pub fn terms(&self, dialect: &Dialect) -> Vec<String> {
        match self {
            Condition::None => Vec::new(),
            Condition::Raw(v) if v.trim().is_empty() => Vec::new(),
            Condition::Raw(v) => vec![v.trim().to_string()],
            Condition::All(v) => v
                .iter()
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect(),
            Condition::Bound(v) => v
                .iter()
                .map(|(text, value)| dialect.quote_into(text.trim(), value, None))
                .collect(),
        }
    }

    /// Parenthesized terms joined with AND, empty when there is no condition.
    pub fn render(&self, dialect: &Dialect) -> String {
        self.terms(dialect)
            .iter()
            .map(|v| format!("({})", v))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    pub(crate) fn write_where(&self, out: &mut String, dialect: &Dialect) {
        let rendered = self.render(dialect);
        if !rendered.is_empty() {
            out.push_str(" WHERE ");
            out.push_str(&rendered);
        }
    }
}

impl From<&str> for Condition {
    fn from(value: &str) -> Self {
        Condition::Raw(value.into())
    }
}
impl From<String> for Condition {
    fn from(value: String) -> Self {
        Condition::Raw(value)
    }
}
impl From<Vec<String>> for Condition {
    fn from(value: Vec<String>) -> Self {
        Condition::All(value)
    }
}
impl From<Vec<(String, Literal)>> for Condition {
    fn from(value: Vec<(String, Literal)>) -> Self {
        Condition::Bound(value)
    }
}

/// Identity generated (or supplied) by an insert.
#[derive(Default, Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Integer(i64),
    Text(String),
    #[default]
    None,
}

impl Identity {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Identity::None,
            Value::Integer(v) => Identity::Integer(*v),
            Value::UnsignedInteger(v) => match i64::try_from(*v) {
                Ok(v) => Identity::Integer(v),
                Err(..) => Identity::Text(v.to_string()),
            },
            Value::Text(v) => Identity::Text(v.clone()),
            v => Identity::Text(v.to_string()),
        }
    }

    pub fn is_none(&self) -> bool {
        *self == Identity::None
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Identity::Integer(v) => Some(*v),
            Identity::Text(v) => v.parse().ok(),
            Identity::None => None,
        }
    }

    /// The identity as an integer, an error for other shapes.
    pub fn require_integer(&self) -> Result<i64> {
        self.as_i64().ok_or_else(|| {
            DbError::Schema(format!("The identity `{}` is not an integer", self)).into()
        })
    }

    pub fn as_value(&self) -> Value {
        match self {
            Identity::Integer(v) => Value::Integer(*v),
            Identity::Text(v) => Value::Text(v.clone()),
            Identity::None => Value::Null,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Integer(v) => write!(f, "{}", v),
            Identity::Text(v) => f.write_str(v),
            Identity::None => f.write_str("NULL"),
        }
    }
}

/// Write a value for an insert or update: expressions verbatim, everything else as a bound placeholder.
fn write_assigned(
    writer: &dyn SqlWriter,
    dialect: &Dialect,
    out: &mut String,
    value: &Literal,
    binds: &mut Vec<Value>,
) {
    match value {
        Literal::Expression(..) | Literal::Select(..) => out.push_str(&dialect.quote(value)),
        Literal::Scalar(v) => {
            binds.push(v.clone());
            writer.write_placeholder(out, binds.len());
        }
        Literal::Text(v) => {
            binds.push(Value::Text(v.clone()));
            writer.write_placeholder(out, binds.len());
        }
    }
}

/// CRUD surface shared by [`Adapter`] and [`crate::Transaction`].
///
/// Implementors provide the two raw entry points, everything else is built on them.
pub trait Session: Send + Sync {
    type Driver: Driver;

    fn adapter(&self) -> &Adapter<Self::Driver>;

    /// Run a statement that produces no rows.
    fn execute_raw(
        &self,
        ctx: &CallContext,
        operation: &str,
        sql: &str,
        binds: &[Value],
    ) -> impl Future<Output = Result<Executed>> + Send;

    /// Run a statement producing rows.
    fn fetch_raw(
        &self,
        ctx: &CallContext,
        operation: &str,
        sql: &str,
        binds: &[Value],
    ) -> impl Future<Output = Result<RawRows>> + Send;

    fn dialect(&self) -> &Dialect {
        self.adapter().dialect()
    }

    fn select(&self) -> Select {
        Select::new(self.dialect().clone())
    }

    /// Insert one row, returning the identity of `identity_column` when given.
    fn insert(
        &self,
        ctx: &CallContext,
        table: &str,
        values: Vec<(String, Literal)>,
        identity_column: Option<&str>,
    ) -> impl Future<Output = Result<Identity>> + Send {
        async move {
            let dialect = self.dialect();
            let writer = dialect.writer();
            let mut sql = String::with_capacity(128);
            let mut binds = Vec::with_capacity(values.len());
            sql.push_str("INSERT INTO ");
            sql.push_str(&dialect.quote_identifier(table));
            if values.is_empty() {
                writer.write_default_values(&mut sql);
            } else {
                sql.push_str(" (");
                separated_by(
                    &mut sql,
                    &values,
                    |out, (column, _)| out.push_str(&dialect.quote_identifier(column)),
                    ", ",
                );
                sql.push_str(") VALUES (");
                separated_by(
                    &mut sql,
                    &values,
                    |out, (_, value)| write_assigned(writer, dialect, out, value, &mut binds),
                    ", ",
                );
                sql.push(')');
            }
            let supplied = identity_column.and_then(|column| {
                values.iter().find_map(|(name, value)| match value {
                    Literal::Scalar(v) if name == column && !v.is_null() => {
                        Some(Identity::from_value(v))
                    }
                    Literal::Text(v) if name == column => Some(Identity::Text(v.clone())),
                    _ => None,
                })
            });
            let identity = match (supplied, identity_column, writer.identity_strategy()) {
                (Some(identity), ..) => {
                    self.execute_raw(ctx, "insert", &sql, &binds).await?;
                    identity
                }
                (None, Some(column), IdentityStrategy::Returning) => {
                    writer.write_returning(&mut sql, column);
                    let mut raw = self.fetch_raw(ctx, "insert", &sql, &binds).await?;
                    match (raw.columns.first(), raw.rows.first_mut()) {
                        (Some(column), Some(row)) if !row.is_empty() => {
                            let value = ScanTarget::reference(column)
                                .dereference(row.swap_remove(0))
                                .context("While reading the returned identity")?;
                            Identity::from_value(&value)
                        }
                        _ => Identity::None,
                    }
                }
                _ => {
                    let executed = self.execute_raw(ctx, "insert", &sql, &binds).await?;
                    match executed.last_insert_id {
                        Some(id) if id > 0 => Identity::from_value(&Value::UnsignedInteger(id)),
                        _ => Identity::None,
                    }
                }
            };
            if !identity.is_none() {
                self.adapter().set_last_insert_id(identity.clone());
            }
            Ok(identity)
        }
    }

    /// Update the rows matching `condition`, returning how many were affected.
    fn update(
        &self,
        ctx: &CallContext,
        table: &str,
        values: Vec<(String, Literal)>,
        condition: &Condition,
    ) -> impl Future<Output = Result<u64>> + Send {
        async move {
            if values.is_empty() {
                return Ok(0);
            }
            let dialect = self.dialect();
            let writer = dialect.writer();
            let mut sql = String::with_capacity(128);
            let mut binds = Vec::with_capacity(values.len());
            sql.push_str("UPDATE ");
            sql.push_str(&dialect.quote_identifier(table));
            sql.push_str(" SET ");
            separated_by(
                &mut sql,
                &values,
                |out, (column, value)| {
                    out.push_str(&dialect.quote_identifier(column));
                    out.push_str(" = ");
                    write_assigned(writer, dialect, out, value, &mut binds);
                },
                ", ",
            );
            condition.write_where(&mut sql, dialect);
            Ok(self
                .execute_raw(ctx, "update", &sql, &binds)
                .await?
                .rows_affected)
        }
    }

    /// Delete the rows matching `condition`, returning how many were affected.
    fn delete(
        &self,
        ctx: &CallContext,
        table: &str,
        condition: &Condition,
    ) -> impl Future<Output = Result<u64>> + Send {
        async move {
            let dialect = self.dialect();
            let mut sql = String::with_capacity(64);
            sql.push_str("DELETE FROM ");
            sql.push_str(&dialect.quote_identifier(table));
            condition.write_where(&mut sql, dialect);
            Ok(self.execute_raw(ctx, "delete", &sql, &[]).await?.rows_affected)
        }
    }

    /// Run `select` after draining its queued build errors.
    fn query(&self, ctx: &CallContext, select: Select) -> impl Future<Output = Result<Rowset>> + Send {
        async move {
            let mut select = select;
            if let Some(error) = select.err() {
                while let Some(other) = select.err() {
                    log::error!("{:#}", other);
                }
                return Err(log_error!(error.context("While building the query")));
            }
            let sql = select.assemble();
            let binds = select.binds();
            let raw = self.fetch_raw(ctx, "query", &sql, &binds).await?;
            let mut hint = ctx.hint();
            hint.read_only |= select.has_joins();
            Rowset::decode(raw, hint)
        }
    }

    /// First row of `select`, limited to one.
    fn query_row(
        &self,
        ctx: &CallContext,
        select: Select,
    ) -> impl Future<Output = Result<Option<Row>>> + Send {
        async move {
            let (_, offset) = select.current_limit();
            let select = select.limit(Some(1), offset);
            Ok(self.query(ctx, select).await?.next())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GenericSqlWriter;
    use std::sync::Arc;

    #[test]
    fn conditions() {
        let dialect = Dialect::new(Arc::new(GenericSqlWriter {}), true).unwrap();
        assert_eq!(Condition::None.render(&dialect), "");
        assert_eq!(Condition::from("id = 1").render(&dialect), "(id = 1)");
        assert_eq!(
            Condition::from(vec!["a = 1".to_string(), " ".into(), "b = 2".into()]).render(&dialect),
            "(a = 1) AND (b = 2)"
        );
        assert_eq!(
            Condition::Bound(vec![
                ("name = ?".into(), "O'Hara".into()),
                ("age > ?".into(), 30.into()),
            ])
            .render(&dialect),
            "(name = 'O''Hara') AND (age > 30)"
        );
    }

    #[test]
    fn identities() {
        assert_eq!(Identity::from_value(&Value::Integer(4)).require_integer().unwrap(), 4);
        assert_eq!(Identity::from_value(&Value::Text("12".into())).as_i64(), Some(12));
        assert!(Identity::Text("abc".into()).require_integer().is_err());
        assert!(Identity::from_value(&Value::Null).is_none());
    }
}
