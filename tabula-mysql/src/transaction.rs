use crate::MySqlQueryable;
use mysql_async::{IsolationLevel as MySqlIsolation, Statement, TxOpts};
use tabula_core::{
    Executed, Executor, IsolationLevel, RawRows, Result, TransactionConfig, TransactionHandle,
    Value,
};

pub struct MySqlTransaction {
    pub(crate) transaction: MySqlQueryable<mysql_async::Transaction<'static>>,
}

pub(crate) fn transaction_options(config: &TransactionConfig) -> TxOpts {
    let mut options = TxOpts::new();
    options
        .with_isolation_level(config.isolation.map(|v| match v {
            IsolationLevel::ReadUncommitted => MySqlIsolation::ReadUncommitted,
            IsolationLevel::ReadCommitted => MySqlIsolation::ReadCommitted,
            IsolationLevel::RepeatableRead => MySqlIsolation::RepeatableRead,
            IsolationLevel::Serializable => MySqlIsolation::Serializable,
        }))
        .with_readonly(config.read_only.then_some(true));
    options
}

impl Executor for MySqlTransaction {
    type Statement = Statement;

    async fn prepare(&mut self, sql: &str) -> Result<Statement> {
        self.transaction.prepare(sql).await
    }

    async fn execute(&mut self, statement: &mut Statement, values: &[Value]) -> Result<Executed> {
        self.transaction.execute(statement, values).await
    }

    async fn query(&mut self, statement: &mut Statement, values: &[Value]) -> Result<RawRows> {
        self.transaction.query(statement, values).await
    }
}

impl TransactionHandle for MySqlTransaction {
    async fn commit(self) -> Result<()> {
        self.transaction
            .executor
            .commit()
            .await
            .map_err(|e| {
                log::error!("{:#}", e);
                e.into()
            })
    }

    async fn rollback(self) -> Result<()> {
        self.transaction
            .executor
            .rollback()
            .await
            .map_err(|e| {
                log::error!("{:#}", e);
                e.into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_the_config() {
        let options = transaction_options(&TransactionConfig {
            isolation: Some(IsolationLevel::ReadCommitted),
            read_only: true,
        });
        assert!(matches!(
            options.isolation_level(),
            Some(MySqlIsolation::ReadCommitted)
        ));
        assert_eq!(options.readonly(), Some(true));
        let options = transaction_options(&TransactionConfig::default());
        assert!(options.isolation_level().is_none());
        assert_eq!(options.readonly(), None);
    }
}
