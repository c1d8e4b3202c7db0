use crate::{ValueWrap, raw_rows};
use mysql_async::{Params, Statement, prelude::Queryable};
use tabula_core::{Executed, Executor, RawRows, Result, Value};

/// Anything mysql_async can run statements on: a pooled connection or a transaction.
pub struct MySqlQueryable<T: Queryable> {
    pub(crate) executor: T,
}

fn params(values: &[Value]) -> Result<Params> {
    if values.is_empty() {
        return Ok(Params::Empty);
    }
    Ok(Params::Positional(
        values
            .iter()
            .map(|v| ValueWrap(v.clone()).try_into())
            .collect::<Result<_>>()?,
    ))
}

impl<T: Queryable + Send> Executor for MySqlQueryable<T> {
    type Statement = Statement;

    async fn prepare(&mut self, sql: &str) -> Result<Statement> {
        Ok(self.executor.prep(sql).await?)
    }

    async fn execute(&mut self, statement: &mut Statement, values: &[Value]) -> Result<Executed> {
        let params = params(values)?;
        let result = self.executor.exec_iter(&*statement, params).await?;
        let executed = Executed {
            rows_affected: result.affected_rows(),
            last_insert_id: result.last_insert_id(),
        };
        result.drop_result().await?;
        Ok(executed)
    }

    async fn query(&mut self, statement: &mut Statement, values: &[Value]) -> Result<RawRows> {
        let params = params(values)?;
        let mut result = self.executor.exec_iter(&*statement, params).await?;
        let columns = result.columns().unwrap_or_default();
        let rows = result.collect::<mysql_async::Row>().await?;
        result.drop_result().await?;
        raw_rows(&columns, rows)
    }
}
