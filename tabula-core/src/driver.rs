use crate::{AdapterConfig, Executed, RawRows, Result, SqlWriter, TransactionConfig, Value};
use std::future::Future;

/// A database dialect: how to write SQL for it, how to reach it, how to read its catalog.
pub trait Driver: Send + Sync + 'static {
    type SqlWriter: SqlWriter + 'static;
    type Pool: Pool;

    /// Url scheme and name used in log and error messages.
    const NAME: &'static str;

    fn sql_writer(&self) -> Self::SqlWriter;

    /// Connection string, also part of the metadata cache key.
    fn dsn(&self, config: &AdapterConfig) -> String;

    /// Build the pool described by `config`.
    fn connect(&self, config: &AdapterConfig) -> impl Future<Output = Result<Self::Pool>> + Send;

    /// Catalog query describing the columns of `table`, with its bound parameters.
    ///
    /// The result columns must be labeled `schema_name`, `table_name`, `column_name`, `position`,
    /// `data_type`, `column_default`, `nullable`, `length`, `scale`, `precision`, `unsigned`,
    /// `primary`, `primary_position` and `identity`.
    fn describe_query(&self, table: &str, schema: Option<&str>) -> (String, Vec<Value>);
}

/// Shared set of connections.
pub trait Pool: Send + Sync + 'static {
    type Connection: Executor;
    type Transaction: Executor + TransactionHandle;

    fn acquire(&self) -> impl Future<Output = Result<Self::Connection>> + Send;

    /// Take a connection out of the pool and start a transaction on it.
    fn begin(
        &self,
        config: &TransactionConfig,
    ) -> impl Future<Output = Result<Self::Transaction>> + Send;

    fn ping(&self) -> impl Future<Output = Result<()>> + Send;

    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Something statements can run on: a pooled connection or a transaction.
pub trait Executor: Send {
    type Statement: Send;

    fn prepare(&mut self, sql: &str) -> impl Future<Output = Result<Self::Statement>> + Send;

    fn execute(
        &mut self,
        statement: &mut Self::Statement,
        params: &[Value],
    ) -> impl Future<Output = Result<Executed>> + Send;

    fn query(
        &mut self,
        statement: &mut Self::Statement,
        params: &[Value],
    ) -> impl Future<Output = Result<RawRows>> + Send;
}

pub trait TransactionHandle: Send {
    fn commit(self) -> impl Future<Output = Result<()>> + Send;
    fn rollback(self) -> impl Future<Output = Result<()>> + Send;
}
