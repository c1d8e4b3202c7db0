use crate::{PostgresConnection, PostgresSqlWriter, PostgresTransaction};
use deadpool_postgres::{Config, ManagerConfig, PoolConfig, RecyclingMethod, Runtime, Timeouts};
use tabula_core::{
    AdapterConfig, Context, DbError, Driver, Error, Pool, Protocol, Result, TransactionConfig,
    Value,
};
use tokio_postgres::NoTls;

const DEFAULT_PORT: u16 = 5432;

/// Catalog query of `Driver::describe_query`, bound with the table and the optional schema.
const DESCRIBE: &str = "\
SELECT n.nspname AS schema_name, c.relname AS table_name, a.attname AS column_name, \
a.attnum::int4 AS position, format_type(a.atttypid, a.atttypmod) AS data_type, \
pg_get_expr(d.adbin, d.adrelid) AS column_default, NOT a.attnotnull AS nullable, \
CASE WHEN t.typname IN ('varchar', 'bpchar') AND a.atttypmod > 4 THEN a.atttypmod - 4 END AS length, \
CASE WHEN t.typname = 'numeric' AND a.atttypmod > 4 THEN (a.atttypmod - 4) & 65535 END AS scale, \
CASE WHEN t.typname = 'numeric' AND a.atttypmod > 4 THEN ((a.atttypmod - 4) >> 16) & 65535 END AS precision, \
false AS unsigned, co.oid IS NOT NULL AS primary, \
array_position(co.conkey, a.attnum) AS primary_position, \
(a.attidentity IN ('a', 'd') OR COALESCE(pg_get_expr(d.adbin, d.adrelid), '') LIKE 'nextval(%') AS identity \
FROM pg_catalog.pg_attribute a \
JOIN pg_catalog.pg_class c ON c.oid = a.attrelid \
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
JOIN pg_catalog.pg_type t ON t.oid = a.atttypid \
LEFT JOIN pg_catalog.pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
LEFT JOIN pg_catalog.pg_constraint co ON co.conrelid = c.oid AND co.contype = 'p' AND a.attnum = ANY(co.conkey) \
WHERE a.attnum > 0 AND NOT a.attisdropped AND c.relname = $1 AND n.nspname = COALESCE($2::text, current_schema()) \
ORDER BY a.attnum";

#[derive(Clone, Copy, Default, Debug)]
pub struct PostgresDriver;

impl PostgresDriver {
    pub const fn new() -> Self {
        Self
    }
}

pub struct PostgresPool {
    pub(crate) pool: deadpool_postgres::Pool,
}

impl PostgresPool {
    fn new(config: &AdapterConfig) -> Result<Self> {
        let mut pool_config = PoolConfig::new(config.pool.max_open);
        pool_config.timeouts = Timeouts {
            create: Some(config.prepare_timeout).filter(|v| !v.is_zero()),
            ..Timeouts::default()
        };
        let mut options = Vec::new();
        if !config.charset.is_empty() {
            options.push(format!("-c client_encoding={}", config.charset));
        }
        if !config.timezone.is_empty() {
            options.push(format!("-c TimeZone={}", config.timezone));
        }
        let pg_config = Config {
            user: Some(config.username.clone()).filter(|v| !v.is_empty()),
            password: Some(config.password.clone()).filter(|v| !v.is_empty()),
            dbname: Some(config.dbname.clone()),
            host: Some(config.host.clone()),
            port: match config.protocol {
                Protocol::Tcp => Some(match config.port {
                    0 => DEFAULT_PORT,
                    v => v,
                }),
                Protocol::Unix => None,
            },
            options: Some(options.join(" ")).filter(|v| !v.is_empty()),
            manager: Some(ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            }),
            pool: Some(pool_config),
            ..Config::default()
        };
        let pool = pg_config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| Error::new(DbError::Configuration(e.to_string())))?;
        Ok(Self { pool })
    }
}

impl Pool for PostgresPool {
    type Connection = PostgresConnection;
    type Transaction = PostgresTransaction;

    async fn acquire(&self) -> Result<PostgresConnection> {
        Ok(PostgresConnection {
            client: self.pool.get().await?,
        })
    }

    async fn begin(&self, config: &TransactionConfig) -> Result<PostgresTransaction> {
        PostgresTransaction::begin(self.pool.get().await?, config).await
    }

    async fn ping(&self) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .simple_query("SELECT 1")
            .await
            .context("Ping failed")?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close();
        Ok(())
    }
}

impl Driver for PostgresDriver {
    type SqlWriter = PostgresSqlWriter;
    type Pool = PostgresPool;

    const NAME: &'static str = "postgres";

    fn sql_writer(&self) -> PostgresSqlWriter {
        PostgresSqlWriter::default()
    }

    fn dsn(&self, config: &AdapterConfig) -> String {
        match config.protocol {
            Protocol::Tcp => format!(
                "{}://{}@{}:{}/{}",
                Self::NAME,
                config.username,
                config.host,
                match config.port {
                    0 => DEFAULT_PORT,
                    v => v,
                },
                config.dbname
            ),
            Protocol::Unix => format!(
                "{}://{}@/{}?host={}",
                Self::NAME,
                config.username,
                config.dbname,
                config.host
            ),
        }
    }

    async fn connect(&self, config: &AdapterConfig) -> Result<PostgresPool> {
        PostgresPool::new(config)
    }

    fn describe_query(&self, table: &str, schema: Option<&str>) -> (String, Vec<Value>) {
        (
            DESCRIBE.to_string(),
            vec![table.into(), schema.map(Value::from).unwrap_or_default()],
        )
    }
}
