use crate::{ValueHolder, raw_column, raw_value};
use deadpool_postgres::{ClientWrapper, Object};
use postgres_types::ToSql;
use tabula_core::{Executed, Executor, RawRows, RawValue, Result, Value};
use tokio_postgres::Statement;

pub struct PostgresConnection {
    pub(crate) client: Object,
}

pub(crate) async fn prepare(client: &ClientWrapper, sql: &str) -> Result<Statement> {
    Ok(client.prepare_cached(sql).await?)
}

pub(crate) async fn execute(
    client: &ClientWrapper,
    statement: &Statement,
    values: &[Value],
) -> Result<Executed> {
    let holders: Vec<ValueHolder> = values.iter().cloned().map(ValueHolder).collect();
    let params: Vec<&(dyn ToSql + Sync)> = holders.iter().map(|v| v as _).collect();
    let rows_affected = client.execute(statement, &params).await?;
    Ok(Executed {
        rows_affected,
        last_insert_id: None,
    })
}

pub(crate) async fn query(
    client: &ClientWrapper,
    statement: &Statement,
    values: &[Value],
) -> Result<RawRows> {
    let holders: Vec<ValueHolder> = values.iter().cloned().map(ValueHolder).collect();
    let params: Vec<&(dyn ToSql + Sync)> = holders.iter().map(|v| v as _).collect();
    let rows = client.query(statement, &params).await?;
    let columns = statement.columns().iter().map(raw_column).collect();
    let rows = rows
        .iter()
        .map(|row| {
            (0..row.len())
                .map(|i| raw_value(row, i))
                .collect::<std::result::Result<Vec<RawValue>, _>>()
        })
        .collect::<std::result::Result<_, _>>()?;
    Ok(RawRows { columns, rows })
}

impl Executor for PostgresConnection {
    type Statement = Statement;

    async fn prepare(&mut self, sql: &str) -> Result<Statement> {
        prepare(&self.client, sql).await
    }

    async fn execute(&mut self, statement: &mut Statement, values: &[Value]) -> Result<Executed> {
        execute(&self.client, statement, values).await
    }

    async fn query(&mut self, statement: &mut Statement, values: &[Value]) -> Result<RawRows> {
        query(&self.client, statement, values).await
    }
}
