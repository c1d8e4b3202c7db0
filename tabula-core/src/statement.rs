use crate::{
    AdapterConfig, CallContext, DbError, Executed, Executor, RawRows, Result, Value, log_error,
    truncate_long,
};
use anyhow::Context;

/// Prepare `sql` and execute it with `params` on `executor`, each step under its own deadline.
pub async fn execute_on<E: Executor>(
    executor: &mut E,
    ctx: &CallContext,
    config: &AdapterConfig,
    operation: &str,
    sql: &str,
    params: &[Value],
) -> Result<Executed> {
    log::debug!("{}: {} {:?}", operation, truncate_long(sql), params);
    let mut statement = prepare(executor, ctx, config, sql).await?;
    ctx.run(config.query_timeout, operation, async {
        executor
            .execute(&mut statement, params)
            .await
            .context(DbError::statement(operation, truncate_long(sql)))
    })
    .await
    .map_err(|e| log_error!(e))
}

/// Same as [`execute_on`], for statements producing rows.
pub async fn query_on<E: Executor>(
    executor: &mut E,
    ctx: &CallContext,
    config: &AdapterConfig,
    operation: &str,
    sql: &str,
    params: &[Value],
) -> Result<RawRows> {
    log::debug!("{}: {} {:?}", operation, truncate_long(sql), params);
    let mut statement = prepare(executor, ctx, config, sql).await?;
    ctx.run(config.query_timeout, operation, async {
        executor
            .query(&mut statement, params)
            .await
            .context(DbError::statement(operation, truncate_long(sql)))
    })
    .await
    .map_err(|e| log_error!(e))
}

async fn prepare<E: Executor>(
    executor: &mut E,
    ctx: &CallContext,
    config: &AdapterConfig,
    sql: &str,
) -> Result<E::Statement> {
    ctx.run(config.prepare_timeout, "prepare", async {
        executor
            .prepare(sql)
            .await
            .context(DbError::statement("prepare", truncate_long(sql)))
    })
    .await
    .map_err(|e| log_error!(e))
}
