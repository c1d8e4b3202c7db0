use crate::{
    Adapter, CallContext, DbError, Driver, Executed, Pool, RawRows, Result, Session,
    TransactionHandle, Value, execute_on, log_error, query_on,
};
use anyhow::Context;
use tokio::sync::Mutex;

type Handle<D> = <<D as Driver>::Pool as Pool>::Transaction;

/// Unit of work bound to one connection, finished by [`Transaction::commit`] or [`Transaction::rollback`].
///
/// Dropping it unfinished rolls the driver transaction back.
pub struct Transaction<'a, D: Driver> {
    adapter: &'a Adapter<D>,
    handle: Mutex<Option<Handle<D>>>,
}

impl<'a, D: Driver> Transaction<'a, D> {
    pub(crate) async fn begin(adapter: &'a Adapter<D>, ctx: &CallContext) -> Result<Self> {
        let config = adapter.config();
        let handle = ctx
            .run(config.query_timeout, "begin", async {
                adapter
                    .pool()
                    .begin(&config.transaction)
                    .await
                    .context(DbError::Connection(format!(
                        "Could not begin a transaction on the {} database `{}`",
                        D::NAME,
                        config.dbname
                    )))
            })
            .await
            .map_err(|e| log_error!(e))?;
        log::debug!("Transaction started on `{}`", config.dbname);
        Ok(Self {
            adapter,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub async fn commit(mut self) -> Result<()> {
        let Some(handle) = self.handle.get_mut().take() else {
            return Ok(());
        };
        handle
            .commit()
            .await
            .context(DbError::statement("commit", "COMMIT"))
            .map_err(|e| log_error!(e))?;
        log::debug!("Transaction committed");
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<()> {
        let Some(handle) = self.handle.get_mut().take() else {
            return Ok(());
        };
        handle
            .rollback()
            .await
            .context(DbError::statement("rollback", "ROLLBACK"))
            .map_err(|e| log_error!(e))?;
        log::debug!("Transaction rolled back");
        Ok(())
    }
}

impl<'a, D: Driver> Session for Transaction<'a, D> {
    type Driver = D;

    fn adapter(&self) -> &Adapter<D> {
        self.adapter
    }

    async fn execute_raw(
        &self,
        ctx: &CallContext,
        operation: &str,
        sql: &str,
        binds: &[Value],
    ) -> Result<Executed> {
        let mut handle = self.handle.lock().await;
        let handle = handle
            .as_mut()
            .ok_or_else(|| DbError::Connection("The transaction is already finished".into()))?;
        execute_on(handle, ctx, self.adapter.config(), operation, sql, binds).await
    }

    async fn fetch_raw(
        &self,
        ctx: &CallContext,
        operation: &str,
        sql: &str,
        binds: &[Value],
    ) -> Result<RawRows> {
        let mut handle = self.handle.lock().await;
        let handle = handle
            .as_mut()
            .ok_or_else(|| DbError::Connection("The transaction is already finished".into()))?;
        query_on(handle, ctx, self.adapter.config(), operation, sql, binds).await
    }
}

impl<'a, D: Driver> Drop for Transaction<'a, D> {
    fn drop(&mut self) {
        if self.handle.get_mut().is_some() {
            log::warn!(
                "Transaction on `{}` dropped without commit or rollback, it will be rolled back",
                self.adapter.config().dbname
            );
        }
    }
}
