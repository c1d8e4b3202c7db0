#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use tabula::{
        Adapter, AdapterConfig, CallContext, Condition, Criteria, DbError, Identity, Key,
        MemoryCache, Registry, Session, TableDefinition, Value, error_kind,
    };
    use tabula_tests::{MockDriver, MockPool, Response, column, init_logs, rows};

    fn registry(pool: &MockPool, tables: Vec<TableDefinition>) -> Registry<MockDriver> {
        registry_with(pool, tables, AdapterConfig::default(), None)
    }

    fn registry_with(
        pool: &MockPool,
        tables: Vec<TableDefinition>,
        config: AdapterConfig,
        cache: Option<Arc<MemoryCache>>,
    ) -> Registry<MockDriver> {
        let adapter = Adapter::with_pool(MockDriver::new(pool.clone()), config, pool.clone())
            .expect("Could not create the adapter");
        let mut builder = Registry::builder().adapter("main", adapter).default_adapter("main");
        for table in tables {
            builder = builder.table(table);
        }
        if let Some(cache) = cache {
            builder = builder.metadata_cache(cache);
        }
        builder.build().expect("Could not build the registry")
    }

    fn users(pool: &MockPool) -> &MockPool {
        pool.describe(
            "users",
            &[
                column("id", "integer").primary(1).identity(),
                column("name", "varchar(50)").not_null(),
            ],
        )
    }

    #[tokio::test]
    async fn find_by_composite_key() {
        init_logs();
        let pool = MockPool::new();
        pool.describe(
            "pairs",
            &[
                column("a", "integer").primary(1),
                column("b", "varchar(10)").primary(2),
                column("label", "text"),
            ],
        );
        let registry = registry(&pool, vec![TableDefinition::new("pairs")]);
        let pairs = registry.table("pairs").unwrap();
        let ctx = CallContext::new();

        pairs
            .find(
                &ctx,
                &[
                    Key::many([1, 2, 3]),
                    Key::Many(vec!["x".into(), "y".into(), "z".into()]),
                ],
            )
            .await
            .unwrap();
        assert_eq!(
            pool.data_statements(),
            [concat!(
                r#"SELECT "pairs".* FROM "pairs" WHERE (("pairs"."a" = 1 AND "pairs"."b" = 'x') OR "#,
                r#"("pairs"."a" = 2 AND "pairs"."b" = 'y') OR ("pairs"."a" = 3 AND "pairs"."b" = 'z'))"#
            )]
        );

        pool.clear_calls();
        let error = pairs.find(&ctx, &[Key::from(1)]).await.unwrap_err();
        assert!(matches!(error_kind(&error), Some(DbError::Build(..))));
        let error = pairs
            .find(&ctx, &[Key::many([1, 2]), Key::from("x")])
            .await
            .unwrap_err();
        assert!(matches!(error_kind(&error), Some(DbError::Build(..))));
        let empty = pairs
            .find(&ctx, &[Key::Many(vec![]), Key::Many(vec![])])
            .await
            .unwrap();
        assert_eq!(empty.len(), 0);
        assert!(pool.data_statements().is_empty());
    }

    #[tokio::test]
    async fn writes_require_a_primary_key() {
        init_logs();
        let pool = MockPool::new();
        pool.describe("logs", &[column("line", "text")]);
        let registry = registry(&pool, vec![TableDefinition::new("logs")]);
        let logs = registry.table("logs").unwrap();
        let ctx = CallContext::new();

        assert!(logs.fetch_all(&ctx, Criteria::new()).await.is_ok());
        let error = logs
            .insert(&ctx, vec![("line".into(), "hello".into())])
            .await
            .unwrap_err();
        assert!(matches!(error_kind(&error), Some(DbError::Schema(..))));
        let error = logs.delete(&ctx, Condition::None).await.unwrap_err();
        assert!(matches!(error_kind(&error), Some(DbError::Schema(..))));
        assert_eq!(pool.count("INSERT"), 0);
        assert_eq!(pool.count("DELETE"), 0);

        let pool = MockPool::new();
        pool.describe("logs", &[column("line", "text")]);
        let registry = self::registry(
            &pool,
            vec![TableDefinition::new("logs").primary(&["missing"])],
        );
        let error = registry
            .table("logs")
            .unwrap()
            .resolve(&ctx)
            .await
            .unwrap_err();
        assert!(matches!(error_kind(&error), Some(DbError::Schema(..))));
    }

    #[tokio::test]
    async fn metadata_is_described_once() {
        init_logs();
        let pool = MockPool::new();
        users(&pool);
        let cache = Arc::new(MemoryCache::new());
        let ctx = CallContext::new();

        let first = registry_with(
            &pool,
            vec![TableDefinition::new("users")],
            AdapterConfig::default(),
            Some(cache.clone()),
        );
        let info = first.table("users").unwrap().info(&ctx).await.unwrap();
        assert!(!info.metadata_from_cache);
        assert_eq!(info.primary, ["id"]);
        assert_eq!(info.identity.as_deref(), Some("id"));
        first.table("users").unwrap().primary_key(&ctx).await.unwrap();
        assert_eq!(pool.count("mock_catalog"), 1);
        assert_eq!(cache.len(), 1);

        let second = registry_with(
            &pool,
            vec![TableDefinition::new("users")],
            AdapterConfig::default(),
            Some(cache.clone()),
        );
        let info = second.table("users").unwrap().info(&ctx).await.unwrap();
        assert!(info.metadata_from_cache);
        assert_eq!(info.columns, ["id", "name"]);
        assert_eq!(pool.count("mock_catalog"), 1);
    }

    #[tokio::test]
    async fn criteria() {
        init_logs();
        let pool = MockPool::new();
        let config = AdapterConfig {
            select: tabula::SelectConfig {
                default_limit: Some(100),
            },
            ..Default::default()
        };
        let registry = registry_with(&pool, vec![TableDefinition::new("users")], config, None);
        let users = registry.table("users").unwrap();
        let ctx = CallContext::new();

        users.fetch_all(&ctx, "active = 1").await.unwrap();
        users
            .fetch_all(&ctx, Criteria::new().order(&["name"]).limit(Some(5), Some(10)))
            .await
            .unwrap();
        users
            .fetch_all(&ctx, Criteria::new().select(users.select().where_("id > 3")))
            .await
            .unwrap();
        users.fetch_row(&ctx, Criteria::new()).await.unwrap();
        users
            .fetch_row(
                &ctx,
                Criteria::new().select(users.select().order(&["name"]).limit(Some(10), Some(4))),
            )
            .await
            .unwrap();
        assert_eq!(
            pool.data_statements(),
            [
                r#"SELECT "users".* FROM "users" WHERE (active = 1) LIMIT 100"#,
                r#"SELECT "users".* FROM "users" ORDER BY "name" ASC LIMIT 5 OFFSET 10"#,
                r#"SELECT "users".* FROM "users" WHERE (id > 3) LIMIT 100"#,
                r#"SELECT "users".* FROM "users" LIMIT 1"#,
                r#"SELECT "users".* FROM "users" ORDER BY "name" ASC LIMIT 1 OFFSET 4"#,
            ]
        );
    }

    #[tokio::test]
    async fn row_lifecycle() {
        init_logs();
        let pool = MockPool::new();
        users(&pool).generate_ids(41);
        let registry = registry(&pool, vec![TableDefinition::new("users")]);
        let users = registry.table("users").unwrap();
        let ctx = CallContext::new();

        let unsaved = users.create_row(vec![("name".into(), "Ada".into())]);
        let error = users.delete_row(&ctx, &unsaved).await.unwrap_err();
        assert!(matches!(error_kind(&error), Some(DbError::Schema(..))));

        let mut row = unsaved;
        users.save(&ctx, &mut row).await.unwrap();
        assert!(row.is_stored());
        assert_eq!(row.get::<i64>("id").unwrap(), 41);
        users.save(&ctx, &mut row).await.unwrap();
        assert_eq!(pool.count("UPDATE"), 0);

        row.set("name", "Grace").unwrap();
        users.save(&ctx, &mut row).await.unwrap();
        assert!(!row.is_modified());
        users.delete_row(&ctx, &row).await.unwrap();

        let calls = pool
            .calls()
            .into_iter()
            .filter(|v| !v.sql.contains("mock_catalog"))
            .collect::<Vec<_>>();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].sql, r#"INSERT INTO "users" ("name") VALUES (?)"#);
        assert_eq!(calls[0].params, [Value::Text("Ada".into())]);
        assert_eq!(calls[1].sql, r#"UPDATE "users" SET "name" = ? WHERE ("id" = 41)"#);
        assert_eq!(calls[1].params, [Value::Text("Grace".into())]);
        assert_eq!(calls[2].sql, r#"DELETE FROM "users" WHERE ("id" = 41)"#);
        assert_eq!(registry.default_adapter().unwrap().last_insert_id(), Identity::Integer(41));
    }

    #[tokio::test]
    async fn joined_rows_are_read_only() {
        init_logs();
        let pool = MockPool::new();
        users(&pool).on(
            "JOIN",
            Response::Rows(rows(
                &["id", "name", "title"],
                vec![vec![Value::Integer(1), "Ada".into(), "Notes".into()]],
            )),
        );
        let registry = registry(&pool, vec![TableDefinition::new("users")]);
        let users = registry.table("users").unwrap();
        let adapter = registry.default_adapter().unwrap();
        let ctx = CallContext::new();

        let select = users
            .select()
            .join_inner("posts", "posts.author_id = users.id", &["title"]);
        let mut row = adapter
            .query_row(&ctx, select)
            .await
            .unwrap()
            .expect("One row was scripted");
        assert!(row.is_read_only());
        assert!(row.set("name", "Grace").is_err());
        let error = users.save(&ctx, &mut row).await.unwrap_err();
        assert!(matches!(error_kind(&error), Some(DbError::Schema(..))));
        assert_eq!(pool.count("UPDATE"), 0);
    }

    #[tokio::test]
    async fn blank_identity_is_generated() {
        init_logs();
        let pool = MockPool::new();
        users(&pool).generate_ids(3);
        let registry = registry(&pool, vec![TableDefinition::new("users")]);
        let users = registry.table("users").unwrap();
        let ctx = CallContext::new();

        let id = users
            .insert(
                &ctx,
                vec![("id".into(), Value::Null.into()), ("name".into(), "Ada".into())],
            )
            .await
            .unwrap();
        assert_eq!(id, Identity::Integer(3));
        let id = users
            .insert(
                &ctx,
                vec![("id".into(), 9.into()), ("name".into(), "Grace".into())],
            )
            .await
            .unwrap();
        assert_eq!(id, Identity::Integer(9));
        assert_eq!(
            pool.data_statements(),
            [
                r#"INSERT INTO "users" ("name") VALUES (?)"#,
                r#"INSERT INTO "users" ("id", "name") VALUES (?, ?)"#,
            ]
        );
    }
}
