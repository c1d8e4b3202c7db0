use parking_lot::Mutex;
use std::{marker::PhantomData, sync::Arc, time::Duration};
use tabula_core::{
    AdapterConfig, ColumnKind, Driver, Error, Executed, Executor, GenericSqlWriter, Pool,
    RawColumn, RawRows, RawValue, Result, SqlWriter, TransactionConfig, TransactionHandle, Value,
};

/// Statement received by a [`MockPool`].
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Clone)]
pub enum Response {
    Executed(Executed),
    Rows(RawRows),
    Error(String),
}

impl Response {
    pub fn affected(rows: u64) -> Self {
        Response::Executed(Executed {
            rows_affected: rows,
            last_insert_id: None,
        })
    }
}

#[derive(Debug)]
struct Scripted {
    pattern: String,
    response: Response,
    once: bool,
}

#[derive(Default, Debug)]
struct State {
    calls: Vec<Call>,
    script: Vec<Scripted>,
    next_id: Option<u64>,
    latency: Option<Duration>,
    unreachable: bool,
    closed: bool,
}

/// In memory pool answering statements from a script.
///
/// A statement gets the response of the first scripted pattern it contains. Unmatched queries
/// return no rows, unmatched statements affect no row (inserts get the next generated id when
/// [`MockPool::generate_ids`] was called).
#[derive(Default, Debug, Clone)]
pub struct MockPool {
    state: Arc<Mutex<State>>,
}

impl MockPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every statement containing `pattern`.
    pub fn on(&self, pattern: &str, response: Response) -> &Self {
        self.push(pattern, response, false)
    }

    /// Answer the next statement containing `pattern`, then forget the entry.
    pub fn once(&self, pattern: &str, response: Response) -> &Self {
        self.push(pattern, response, true)
    }

    fn push(&self, pattern: &str, response: Response, once: bool) -> &Self {
        self.state.lock().script.push(Scripted {
            pattern: pattern.into(),
            response,
            once,
        });
        self
    }

    /// Script the catalog answer describing `table`.
    pub fn describe(&self, table: &str, columns: &[MockColumn]) -> &Self {
        self.on(
            &describe_pattern(table),
            Response::Rows(describe_rows(None, table, columns)),
        )
    }

    /// Unmatched inserts report generated ids starting from `first`.
    pub fn generate_ids(&self, first: u64) -> &Self {
        self.state.lock().next_id = Some(first);
        self
    }

    /// Delay every answer.
    pub fn latency(&self, latency: Duration) -> &Self {
        self.state.lock().latency = Some(latency);
        self
    }

    /// Make pings fail.
    pub fn unreachable(&self, flag: bool) -> &Self {
        self.state.lock().unreachable = flag;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.state.lock().calls.iter().map(|v| v.sql.clone()).collect()
    }

    /// Statements received, catalog queries excluded.
    pub fn data_statements(&self) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|v| !v.contains(CATALOG))
            .collect()
    }

    pub fn count(&self, pattern: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|v| v.sql.contains(pattern))
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn record(&self, sql: &str, params: &[Value]) {
        self.state.lock().calls.push(Call {
            sql: sql.into(),
            params: params.to_vec(),
        });
    }

    fn take(&self, sql: &str, rows: bool) -> Option<Response> {
        let mut state = self.state.lock();
        let position = state.script.iter().position(|v| {
            sql.contains(&v.pattern)
                && match v.response {
                    Response::Executed(..) => !rows,
                    Response::Rows(..) => rows,
                    Response::Error(..) => true,
                }
        })?;
        if state.script[position].once {
            Some(state.script.remove(position).response)
        } else {
            Some(state.script[position].response.clone())
        }
    }

    async fn wait(&self) {
        let latency = self.state.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<Executed> {
        self.record(sql, params);
        self.wait().await;
        match self.take(sql, false) {
            Some(Response::Executed(v)) => Ok(v),
            Some(Response::Error(message)) => Err(Error::msg(message)),
            _ => {
                let mut state = self.state.lock();
                match (sql.starts_with("INSERT"), state.next_id.as_mut()) {
                    (true, Some(id)) => {
                        *id += 1;
                        Ok(Executed {
                            rows_affected: 1,
                            last_insert_id: Some(*id - 1),
                        })
                    }
                    _ => Ok(Executed::default()),
                }
            }
        }
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<RawRows> {
        self.record(sql, params);
        self.wait().await;
        match self.take(sql, true) {
            Some(Response::Rows(v)) => Ok(v),
            Some(Response::Error(message)) => Err(Error::msg(message)),
            _ => Ok(RawRows::default()),
        }
    }
}

pub struct MockConnection {
    pool: MockPool,
}

impl Executor for MockConnection {
    type Statement = String;

    async fn prepare(&mut self, sql: &str) -> Result<String> {
        Ok(sql.to_string())
    }

    async fn execute(&mut self, statement: &mut String, params: &[Value]) -> Result<Executed> {
        self.pool.execute(statement, params).await
    }

    async fn query(&mut self, statement: &mut String, params: &[Value]) -> Result<RawRows> {
        self.pool.query(statement, params).await
    }
}

pub struct MockTransaction {
    connection: MockConnection,
}

impl Executor for MockTransaction {
    type Statement = String;

    async fn prepare(&mut self, sql: &str) -> Result<String> {
        self.connection.prepare(sql).await
    }

    async fn execute(&mut self, statement: &mut String, params: &[Value]) -> Result<Executed> {
        self.connection.execute(statement, params).await
    }

    async fn query(&mut self, statement: &mut String, params: &[Value]) -> Result<RawRows> {
        self.connection.query(statement, params).await
    }
}

impl TransactionHandle for MockTransaction {
    async fn commit(self) -> Result<()> {
        self.connection.pool.execute("COMMIT", &[]).await.map(drop)
    }

    async fn rollback(self) -> Result<()> {
        self.connection.pool.execute("ROLLBACK", &[]).await.map(drop)
    }
}

impl Pool for MockPool {
    type Connection = MockConnection;
    type Transaction = MockTransaction;

    async fn acquire(&self) -> Result<MockConnection> {
        Ok(MockConnection { pool: self.clone() })
    }

    async fn begin(&self, config: &TransactionConfig) -> Result<MockTransaction> {
        let mut sql = String::new();
        GenericSqlWriter {}.write_transaction_begin(&mut sql, config);
        self.execute(&sql, &[]).await?;
        Ok(MockTransaction {
            connection: MockConnection { pool: self.clone() },
        })
    }

    async fn ping(&self) -> Result<()> {
        if self.state.lock().unreachable {
            return Err(Error::msg("Connection refused"));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state.lock().closed = true;
        Ok(())
    }
}

const CATALOG: &str = "mock_catalog";

fn describe_pattern(table: &str) -> String {
    format!("FROM {} WHERE table_name = '{}'", CATALOG, table)
}

/// Driver over a [`MockPool`], writing SQL with `W`.
pub struct MockDriver<W = GenericSqlWriter> {
    pool: MockPool,
    writer: PhantomData<fn() -> W>,
}

impl<W> MockDriver<W> {
    pub fn new(pool: MockPool) -> Self {
        Self {
            pool,
            writer: PhantomData,
        }
    }

    pub fn pool(&self) -> &MockPool {
        &self.pool
    }
}

impl<W: SqlWriter + Default + 'static> Driver for MockDriver<W> {
    type SqlWriter = W;
    type Pool = MockPool;

    const NAME: &'static str = "mock";

    fn sql_writer(&self) -> W {
        W::default()
    }

    fn dsn(&self, config: &AdapterConfig) -> String {
        format!("mock://{}/{}", config.host, config.dbname)
    }

    async fn connect(&self, _config: &AdapterConfig) -> Result<MockPool> {
        Ok(self.pool.clone())
    }

    fn describe_query(&self, table: &str, schema: Option<&str>) -> (String, Vec<Value>) {
        (
            format!("SELECT * {}", describe_pattern(table)),
            vec![table.into(), schema.map(Value::from).unwrap_or_default()],
        )
    }
}

/// Column of a scripted catalog answer.
#[derive(Debug, Clone)]
pub struct MockColumn {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub primary_position: Option<u32>,
    pub identity: bool,
}

impl MockColumn {
    pub fn primary(mut self, position: u32) -> Self {
        self.primary_position = Some(position);
        self.nullable = false;
        self
    }

    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_value(mut self, value: &str) -> Self {
        self.default = Some(value.into());
        self
    }
}

pub fn column(name: &str, data_type: &str) -> MockColumn {
    MockColumn {
        name: name.into(),
        data_type: data_type.into(),
        nullable: true,
        default: None,
        primary_position: None,
        identity: false,
    }
}

/// Catalog rows in the layout expected by the describe decoding.
pub fn describe_rows(schema: Option<&str>, table: &str, columns: &[MockColumn]) -> RawRows {
    let labels = [
        ("schema_name", ColumnKind::Text),
        ("table_name", ColumnKind::Text),
        ("column_name", ColumnKind::Text),
        ("position", ColumnKind::Integer),
        ("data_type", ColumnKind::Text),
        ("column_default", ColumnKind::Text),
        ("nullable", ColumnKind::Boolean),
        ("length", ColumnKind::UnsignedInteger),
        ("scale", ColumnKind::UnsignedInteger),
        ("precision", ColumnKind::UnsignedInteger),
        ("unsigned", ColumnKind::Boolean),
        ("primary", ColumnKind::Boolean),
        ("primary_position", ColumnKind::Integer),
        ("identity", ColumnKind::Boolean),
    ];
    RawRows {
        columns: labels
            .iter()
            .map(|(name, kind)| RawColumn::new(*name, *kind, true))
            .collect(),
        rows: columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                [
                    schema.map(Value::from).unwrap_or_default(),
                    table.into(),
                    c.name.as_str().into(),
                    Value::Integer(i as i64 + 1),
                    c.data_type.as_str().into(),
                    c.default.clone().map(Value::Text).unwrap_or_default(),
                    Value::Boolean(c.nullable),
                    Value::Null,
                    Value::Null,
                    Value::Null,
                    Value::Boolean(false),
                    Value::Boolean(c.primary_position.is_some()),
                    c.primary_position
                        .map(|v| Value::Integer(v.into()))
                        .unwrap_or_default(),
                    Value::Boolean(c.identity),
                ]
                .into_iter()
                .map(RawValue::from)
                .collect()
            })
            .collect(),
    }
}

/// Result set with the given labels, column kinds taken from the first row.
pub fn rows(labels: &[&str], values: Vec<Vec<Value>>) -> RawRows {
    let kind = |i: usize| match values.first().and_then(|v| v.get(i)) {
        Some(Value::Boolean(..)) => ColumnKind::Boolean,
        Some(Value::Integer(..)) => ColumnKind::Integer,
        Some(Value::UnsignedInteger(..)) => ColumnKind::UnsignedInteger,
        Some(Value::Float(..)) => ColumnKind::Float,
        Some(Value::Decimal(..)) => ColumnKind::Decimal,
        Some(Value::Blob(..)) => ColumnKind::Binary,
        Some(Value::Date(..)) => ColumnKind::Date,
        Some(Value::Time(..)) => ColumnKind::Time,
        Some(Value::Timestamp(..)) => ColumnKind::Timestamp,
        Some(Value::Uuid(..)) => ColumnKind::Uuid,
        _ => ColumnKind::Text,
    };
    RawRows {
        columns: labels
            .iter()
            .enumerate()
            .map(|(i, name)| RawColumn::new(*name, kind(i), true))
            .collect(),
        rows: values
            .into_iter()
            .map(|row| row.into_iter().map(RawValue::from).collect())
            .collect(),
    }
}
