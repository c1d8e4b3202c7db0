use crate::{PostgresSqlWriter, execute, prepare, query};
use deadpool_postgres::Object;
use tabula_core::{
    DbError, Executed, Executor, RawRows, Result, SqlWriter, TransactionConfig,
    TransactionHandle, Value,
};
use tokio_postgres::Statement;

/// Pooled connection with an open transaction. Dropping it unfinished rolls back in the background.
pub struct PostgresTransaction {
    client: Option<Object>,
}

impl PostgresTransaction {
    pub(crate) async fn begin(client: Object, config: &TransactionConfig) -> Result<Self> {
        let mut sql = String::new();
        PostgresSqlWriter::default().write_transaction_begin(&mut sql, config);
        client.batch_execute(&sql).await?;
        Ok(Self {
            client: Some(client),
        })
    }

    fn client(&self) -> Result<&Object> {
        self.client
            .as_ref()
            .ok_or_else(|| DbError::Connection("The transaction is already finished".into()).into())
    }

    async fn finish(mut self, commit: bool) -> Result<()> {
        let mut sql = String::new();
        let writer = PostgresSqlWriter::default();
        if commit {
            writer.write_transaction_commit(&mut sql);
        } else {
            writer.write_transaction_rollback(&mut sql);
        }
        let client = self.client.take();
        match client {
            Some(client) => client.batch_execute(&sql).await.map_err(|e| {
                log::error!("{:#}", e);
                e.into()
            }),
            None => Ok(()),
        }
    }
}

impl Executor for PostgresTransaction {
    type Statement = Statement;

    async fn prepare(&mut self, sql: &str) -> Result<Statement> {
        prepare(self.client()?, sql).await
    }

    async fn execute(&mut self, statement: &mut Statement, values: &[Value]) -> Result<Executed> {
        execute(self.client()?, statement, values).await
    }

    async fn query(&mut self, statement: &mut Statement, values: &[Value]) -> Result<RawRows> {
        query(self.client()?, statement, values).await
    }
}

impl TransactionHandle for PostgresTransaction {
    async fn commit(self) -> Result<()> {
        self.finish(true).await
    }

    async fn rollback(self) -> Result<()> {
        self.finish(false).await
    }
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(e) = client.batch_execute("ROLLBACK").await {
                            log::error!("Could not roll back a dropped transaction: {:#}", e);
                        }
                    });
                }
                Err(..) => {
                    log::error!("Dropped an open transaction outside of a runtime");
                    drop(Object::take(client));
                }
            }
        }
    }
}
