#[cfg(test)]
mod tests {
    use std::time::Duration;
    use tabula::{
        Adapter, AdapterConfig, CallContext, CancellationToken, Condition, DbError, IsolationLevel,
        Registry, Session, TableDefinition, TransactionConfig, Value, error_kind,
    };
    use tabula_tests::{MockDriver, MockPool, Response, column, init_logs};

    fn adapter(pool: &MockPool, config: AdapterConfig) -> Adapter<MockDriver> {
        Adapter::with_pool(MockDriver::new(pool.clone()), config, pool.clone()).unwrap()
    }

    #[tokio::test]
    async fn transaction_commit() {
        init_logs();
        let pool = MockPool::new();
        pool.describe(
            "accounts",
            &[column("id", "integer").primary(1), column("balance", "integer")],
        );
        let config = AdapterConfig {
            transaction: TransactionConfig {
                isolation: Some(IsolationLevel::Serializable),
                read_only: false,
            },
            ..Default::default()
        };
        let registry = Registry::builder()
            .adapter("main", adapter(&pool, config))
            .default_adapter("main")
            .table(TableDefinition::new("accounts"))
            .build()
            .unwrap();
        let accounts = registry.table("accounts").unwrap();
        let adapter = registry.default_adapter().unwrap();
        let ctx = CallContext::new();

        accounts.resolve(&ctx).await.unwrap();
        let transaction = adapter.begin_transaction(&ctx).await.unwrap();
        for (id, delta) in [(1, "balance - 10"), (2, "balance + 10")] {
            accounts
                .update_in(
                    &transaction,
                    &ctx,
                    vec![("balance".into(), tabula::Expr::new(delta).into())],
                    Condition::Bound(vec![("id = ?".into(), id.into())]),
                )
                .await
                .unwrap();
        }
        transaction.commit().await.unwrap();
        assert_eq!(
            pool.data_statements(),
            [
                "BEGIN ISOLATION LEVEL SERIALIZABLE",
                r#"UPDATE "accounts" SET "balance" = balance - 10 WHERE (id = 1)"#,
                r#"UPDATE "accounts" SET "balance" = balance + 10 WHERE (id = 2)"#,
                "COMMIT",
            ]
        );
    }

    #[tokio::test]
    async fn transaction_rollback() {
        init_logs();
        let pool = MockPool::new();
        let adapter = adapter(&pool, AdapterConfig::default());
        let ctx = CallContext::new();

        let transaction = adapter.begin_transaction(&ctx).await.unwrap();
        transaction
            .execute_raw(&ctx, "insert", "INSERT INTO t (a) VALUES (?)", &[Value::Integer(1)])
            .await
            .unwrap();
        transaction.rollback().await.unwrap();
        assert_eq!(
            pool.statements(),
            ["BEGIN", "INSERT INTO t (a) VALUES (?)", "ROLLBACK"]
        );
    }

    #[tokio::test]
    async fn statement_errors_name_the_operation() {
        init_logs();
        let pool = MockPool::new();
        pool.on("broken", Response::Error("syntax error".into()));
        let adapter = adapter(&pool, AdapterConfig::default());
        let ctx = CallContext::new();

        let error = adapter
            .execute_raw(&ctx, "ddl", "CREATE broken", &[])
            .await
            .unwrap_err();
        assert!(matches!(
            error_kind(&error),
            Some(DbError::Statement { operation, .. }) if operation == "ddl"
        ));
        assert!(format!("{:#}", error).contains("syntax error"));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline() {
        init_logs();
        let pool = MockPool::new();
        pool.latency(Duration::from_secs(2));
        let adapter = adapter(&pool, AdapterConfig::default());

        let ctx = CallContext::new().with_timeout(Duration::from_millis(100));
        let error = adapter
            .fetch_raw(&ctx, "query", "SELECT 1", &[])
            .await
            .unwrap_err();
        assert!(matches!(error_kind(&error), Some(DbError::DeadlineExceeded(..))));

        let config = AdapterConfig {
            query_timeout: Duration::from_millis(500),
            ..Default::default()
        };
        let adapter = self::adapter(&pool, config);
        let error = adapter
            .fetch_raw(&CallContext::new(), "query", "SELECT 1", &[])
            .await
            .unwrap_err();
        assert!(matches!(error_kind(&error), Some(DbError::DeadlineExceeded(..))));

        let ctx = CallContext::new().with_timeout(Duration::from_secs(10));
        assert!(adapter.ping(&ctx).await.is_ok());
    }

    #[tokio::test]
    async fn cancellation() {
        init_logs();
        let pool = MockPool::new();
        let adapter = adapter(&pool, AdapterConfig::default());
        let token = CancellationToken::new();
        let ctx = CallContext::new().with_cancellation(token.clone());
        token.cancel();
        let error = adapter
            .execute_raw(&ctx, "delete", "DELETE FROM t", &[])
            .await
            .unwrap_err();
        assert!(matches!(error_kind(&error), Some(DbError::Cancelled(..))));
        assert!(pool.statements().is_empty());
    }

    #[tokio::test]
    async fn ping_and_close() {
        init_logs();
        let pool = MockPool::new();
        let adapter = adapter(&pool, AdapterConfig::default());
        let ctx = CallContext::new();

        adapter.ping(&ctx).await.unwrap();
        pool.unreachable(true);
        let error = adapter.ping(&ctx).await.unwrap_err();
        assert!(matches!(error_kind(&error), Some(DbError::Connection(..))));
        adapter.close().await.unwrap();
        assert!(pool.is_closed());
    }
}
