use crate::{
    AdapterConfig, CallContext, DbError, DecodeHint, Dialect, Driver, Executed, Identity, Literal,
    Pool, RawRows, Result, Rowset, ScanTarget, Select, Session, SqlWriter, TableMetadata,
    Transaction, Value, execute_on, log_error, query_on,
};
use anyhow::Context;
use parking_lot::Mutex;
use std::{fmt, sync::Arc};

/// Entry point to one database: owns the pool, the dialect and the configuration.
pub struct Adapter<D: Driver> {
    driver: D,
    config: AdapterConfig,
    pool: D::Pool,
    dialect: Dialect,
    dsn: String,
    last_insert_id: Mutex<Identity>,
}

impl<D: Driver> Adapter<D> {
    /// Validate `config`, build the pool and check it answers.
    pub async fn connect(driver: D, config: AdapterConfig) -> Result<Self> {
        config.validate().map_err(|e| log_error!(e))?;
        let pool = driver
            .connect(&config)
            .await
            .context(DbError::Connection(format!(
                "Could not create the {} pool for `{}`",
                D::NAME,
                config.dbname
            )))
            .map_err(|e| log_error!(e))?;
        let adapter = Self::with_pool(driver, config, pool)?;
        adapter.ping(&CallContext::new()).await?;
        log::debug!("Connected to {} database `{}`", D::NAME, adapter.config.dbname);
        Ok(adapter)
    }

    /// Wrap an existing pool.
    pub fn with_pool(driver: D, config: AdapterConfig, pool: D::Pool) -> Result<Self> {
        let writer: Arc<dyn SqlWriter> = Arc::new(driver.sql_writer());
        let dialect = Dialect::new(writer, config.auto_quote_identifiers)?;
        let dsn = driver.dsn(&config);
        Ok(Self {
            driver,
            config,
            pool,
            dialect,
            dsn,
            last_insert_id: Mutex::new(Identity::None),
        })
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn pool(&self) -> &D::Pool {
        &self.pool
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    /// Identity produced by the latest insert through this adapter or one of its transactions.
    pub fn last_insert_id(&self) -> Identity {
        self.last_insert_id.lock().clone()
    }

    pub(crate) fn set_last_insert_id(&self, identity: Identity) {
        *self.last_insert_id.lock() = identity;
    }

    pub async fn ping(&self, ctx: &CallContext) -> Result<()> {
        ctx.run(self.config.query_timeout, "ping", async {
            self.pool.ping().await.context(DbError::Connection(format!(
                "The {} database `{}` did not answer",
                D::NAME,
                self.config.dbname
            )))
        })
        .await
        .map_err(|e| log_error!(e))
    }

    pub async fn close(&self) -> Result<()> {
        self.pool
            .close()
            .await
            .with_context(|| format!("While closing the {} pool", D::NAME))
            .map_err(|e| log_error!(e))
    }

    pub async fn begin_transaction(&self, ctx: &CallContext) -> Result<Transaction<'_, D>> {
        Transaction::begin(self, ctx).await
    }

    /// Read the column descriptions of `table` from the catalog.
    pub async fn describe_table(
        &self,
        ctx: &CallContext,
        table: &str,
        schema: Option<&str>,
    ) -> Result<TableMetadata> {
        let (sql, binds) = self.driver.describe_query(table, schema);
        let raw = self.fetch_raw(ctx, "describe", &sql, &binds).await?;
        let rows = Rowset::decode(raw, DecodeHint::default())?;
        TableMetadata::from_rows(rows)
            .with_context(|| format!("While describing the table `{}`", table))
            .map_err(|e| log_error!(e))
    }

    /// Draw the next value of the sequence `name`.
    pub async fn next_sequence_id(&self, ctx: &CallContext, name: &str) -> Result<Identity> {
        let mut sql = String::new();
        self.dialect
            .writer()
            .write_next_sequence_id(&mut sql, name)
            .map_err(|e| log_error!(e))?;
        let raw = self.fetch_raw(ctx, "sequence", &sql, &[]).await?;
        let value = match (raw.columns.first(), raw.rows.into_iter().next()) {
            (Some(column), Some(row)) => match row.into_iter().next() {
                Some(cell) => ScanTarget::reference(column).dereference(cell)?,
                None => Value::Null,
            },
            _ => Value::Null,
        };
        Ok(Identity::from_value(&value))
    }

    pub fn select(&self) -> Select {
        Select::new(self.dialect.clone())
    }

    pub fn quote(&self, value: &Literal) -> String {
        self.dialect.quote(value)
    }

    pub fn quote_into(&self, text: &str, value: &Literal, count: Option<usize>) -> String {
        self.dialect.quote_into(text, value, count)
    }

    pub fn quote_identifier(&self, identifier: &str) -> String {
        self.dialect.quote_identifier(identifier)
    }

    pub fn quote_identifier_as(&self, identifier: &str, alias: Option<&str>) -> String {
        self.dialect.quote_identifier_as(identifier, alias)
    }

    pub fn quote_table_as(&self, table: &str, alias: Option<&str>, schema: Option<&str>) -> String {
        self.dialect.quote_table_as(table, alias, schema)
    }

    pub fn quote_column_as(&self, column: &str, alias: Option<&str>) -> String {
        self.dialect.quote_column_as(column, alias)
    }

    pub fn limit(&self, sql: &mut String, count: Option<u64>, offset: Option<u64>) {
        self.dialect.limit(sql, count, offset)
    }

    async fn acquire(&self, ctx: &CallContext) -> Result<<D::Pool as Pool>::Connection> {
        ctx.run(self.config.query_timeout, "acquire", async {
            self.pool.acquire().await.context(DbError::Connection(format!(
                "Could not acquire a connection from the {} pool",
                D::NAME
            )))
        })
        .await
        .map_err(|e| log_error!(e))
    }
}

impl<D: Driver> Session for Adapter<D> {
    type Driver = D;

    fn adapter(&self) -> &Adapter<D> {
        self
    }

    async fn execute_raw(
        &self,
        ctx: &CallContext,
        operation: &str,
        sql: &str,
        binds: &[Value],
    ) -> Result<Executed> {
        let mut connection = self.acquire(ctx).await?;
        execute_on(&mut connection, ctx, &self.config, operation, sql, binds).await
    }

    async fn fetch_raw(
        &self,
        ctx: &CallContext,
        operation: &str,
        sql: &str,
        binds: &[Value],
    ) -> Result<RawRows> {
        let mut connection = self.acquire(ctx).await?;
        query_on(&mut connection, ctx, &self.config, operation, sql, binds).await
    }
}

impl<D: Driver> fmt::Debug for Adapter<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("driver", &D::NAME)
            .field("dbname", &self.config.dbname)
            .field("dialect", &self.dialect)
            .finish()
    }
}
