
#[cfg(test)]
mod tests {
    use crate::init::init;
    use indoc::indoc;
    use std::sync::Arc;
    use tabula_core::{Adapter, AdapterConfig, CallContext, Identity, Registry, TableDefinition, Value};
    use tabula_mysql::{MySqlDriver, MySqlSqlWriter};
    use tabula_tests::{BlogSchema, MockDriver, MockPool, column, execute_tests, init_logs};

    #[tokio::test]
    async fn insert_generated_id() {
        init_logs();
        let pool = MockPool::new();
        pool.describe(
            "users",
            &[
                column("id", "int unsigned").primary(1).identity(),
                column("name", "varchar(20)"),
            ],
        )
        .generate_ids(7);
        let config = AdapterConfig {
            dbname: "shop".into(),
            ..Default::default()
        };
        let adapter =
            Adapter::with_pool(MockDriver::<MySqlSqlWriter>::new(pool.clone()), config, pool.clone())
                .unwrap();
        let registry = Registry::builder()
            .adapter("main", adapter)
            .default_adapter("main")
            .table(TableDefinition::new("users"))
            .build()
            .unwrap();
        let ctx = CallContext::new();
        let users = registry.table("users").unwrap();
        let id = users
            .insert(&ctx, vec![("name".into(), "a".into())])
            .await
            .unwrap();
        assert_eq!(id, Identity::Integer(7));
        let calls = pool.calls();
        let insert = calls.last().unwrap();
        assert_eq!(insert.sql, "INSERT INTO `users` (`name`) VALUES (?)");
        assert_eq!(insert.params, [Value::Text("a".into())]);
        assert_eq!(
            registry.default_adapter().unwrap().last_insert_id(),
            Identity::Integer(7)
        );
    }

    #[tokio::test]
    async fn mysql() {
        init_logs();
        let Some((url, _container)) = init().await else {
            return;
        };
        let config = AdapterConfig::from_url(&url).expect("Invalid connection url");
        let adapter = Adapter::connect(MySqlDriver::new(), config)
            .await
            .expect("Could not open the database");
        execute_tests(
            Arc::new(adapter),
            &BlogSchema {
                drop: &[
                    "DROP TABLE IF EXISTS tabula_comments",
                    "DROP TABLE IF EXISTS tabula_posts",
                    "DROP TABLE IF EXISTS tabula_authors",
                ],
                create: &[
                    indoc! {"
                        CREATE TABLE tabula_authors (
                            id BIGINT AUTO_INCREMENT PRIMARY KEY,
                            name VARCHAR(100) NOT NULL
                        )
                    "},
                    indoc! {"
                        CREATE TABLE tabula_posts (
                            id BIGINT AUTO_INCREMENT PRIMARY KEY,
                            author_id BIGINT NOT NULL,
                            title VARCHAR(200) NOT NULL
                        )
                    "},
                    indoc! {"
                        CREATE TABLE tabula_comments (
                            id BIGINT AUTO_INCREMENT PRIMARY KEY,
                            post_id BIGINT NOT NULL,
                            body TEXT NOT NULL
                        )
                    "},
                ],
            },
        )
        .await;
    }
}
