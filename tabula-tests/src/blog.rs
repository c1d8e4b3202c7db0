use std::sync::{Arc, LazyLock};
use tabula_core::{
    Adapter, CallContext, Condition, Criteria, DbError, Driver, Identity, Key, Literal,
    ReferentialAction, Registry, Session, TableDefinition, TableReference, error_kind,
};
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Drop and create statements of `tabula_authors(id, name)`, `tabula_posts(id, author_id, title)`
/// and `tabula_comments(id, post_id, body)`, every `id` generated by the database.
pub struct BlogSchema<'a> {
    pub drop: &'a [&'a str],
    pub create: &'a [&'a str],
}

fn registry<D: Driver>(adapter: Arc<Adapter<D>>) -> Registry<D> {
    Registry::builder()
        .adapter("main", adapter)
        .default_adapter("main")
        .table(TableDefinition::new("tabula_authors").dependent("tabula_posts"))
        .table(
            TableDefinition::new("tabula_posts")
                .reference(
                    "author",
                    TableReference::new(&["author_id"], "tabula_authors")
                        .on_delete(ReferentialAction::CascadeRecurse),
                )
                .dependent("tabula_comments"),
        )
        .table(
            TableDefinition::new("tabula_comments").reference(
                "post",
                TableReference::new(&["post_id"], "tabula_posts")
                    .on_delete(ReferentialAction::Cascade)
                    .on_update(ReferentialAction::Cascade),
            ),
        )
        .build()
        .expect("Could not build the registry")
}

fn values(items: &[(&str, Literal)]) -> Vec<(String, Literal)> {
    items
        .iter()
        .map(|(c, v)| (c.to_string(), v.clone()))
        .collect()
}

pub async fn blog<D: Driver>(adapter: Arc<Adapter<D>>, schema: &BlogSchema<'_>) {
    let _lock = MUTEX.lock().await;
    let ctx = CallContext::new();

    // Setup
    for sql in schema.drop.iter().chain(schema.create) {
        adapter
            .execute_raw(&ctx, "ddl", sql, &[])
            .await
            .expect("Failed to prepare the blog tables");
    }
    let registry = registry(adapter.clone());
    let authors = registry.table("tabula_authors").unwrap();
    let posts = registry.table("tabula_posts").unwrap();
    let comments = registry.table("tabula_comments").unwrap();

    // Inserts
    let author = authors
        .insert(&ctx, values(&[("name", "Ursula".into())]))
        .await
        .expect("Failed to insert the author")
        .require_integer()
        .unwrap();
    assert_eq!(adapter.last_insert_id(), Identity::Integer(author));
    let mut post_ids = Vec::new();
    for title in ["Earthsea", "The Dispossessed"] {
        let id = posts
            .insert(
                &ctx,
                values(&[("author_id", author.into()), ("title", title.into())]),
            )
            .await
            .expect("Failed to insert a post")
            .require_integer()
            .unwrap();
        post_ids.push(id);
    }
    for (post, body) in [(0, "first"), (0, "second"), (1, "third")] {
        comments
            .insert(
                &ctx,
                values(&[("post_id", post_ids[post].into()), ("body", body.into())]),
            )
            .await
            .expect("Failed to insert a comment");
    }

    // Reads
    let found = posts
        .find(&ctx, &[Key::many(post_ids.clone())])
        .await
        .expect("Failed to find the posts")
        .collect::<Vec<_>>();
    assert_eq!(found.len(), 2);
    let bodies = comments
        .fetch_all(&ctx, Criteria::new().order(&["id"]))
        .await
        .expect("Failed to fetch the comments")
        .map(|row| row.get::<String>("body").unwrap())
        .collect::<Vec<_>>();
    assert_eq!(bodies, ["first", "second", "third"]);
    let select = adapter
        .select()
        .from("tabula_posts", &["title"])
        .join_inner("tabula_comments", "tabula_comments.post_id = tabula_posts.id", &["body"])
        .where_value("tabula_posts.id = ?", post_ids[1])
        .order(&["body"]);
    let joined = adapter
        .query(&ctx, select)
        .await
        .expect("Failed to run the join")
        .collect::<Vec<_>>();
    assert_eq!(joined.len(), 1);
    assert!(joined[0].is_read_only());

    // Key update cascades to the comments
    let moved = post_ids[0] + 1000;
    let condition = Condition::Bound(vec![("id = ?".into(), post_ids[0].into())]);
    let affected = posts
        .update(&ctx, values(&[("id", moved.into())]), condition)
        .await
        .expect("Failed to update the post key");
    assert_eq!(affected, 1);
    let moved_comments = comments
        .fetch_all(
            &ctx,
            Condition::Bound(vec![("post_id = ?".into(), moved.into())]),
        )
        .await
        .expect("Failed to fetch the moved comments");
    assert_eq!(moved_comments.len(), 2);

    // Row lifecycle
    let mut row = comments.create_row(vec![
        ("post_id".into(), post_ids[1].into()),
        ("body".into(), "fourth".into()),
    ]);
    comments.save(&ctx, &mut row).await.expect("Failed to save the row");
    assert!(row.is_stored());
    assert!(!row.value("id").unwrap().is_null());
    row.set("body", "fourth, edited").unwrap();
    comments.save(&ctx, &mut row).await.expect("Failed to update the row");
    let stored = comments
        .fetch_row(
            &ctx,
            Condition::Bound(vec![("id = ?".into(), row.value("id").unwrap().clone().into())]),
        )
        .await
        .expect("Failed to read the row back")
        .expect("The row is missing");
    assert_eq!(stored.get::<String>("body").unwrap(), "fourth, edited");
    assert_eq!(comments.delete_row(&ctx, &stored).await.unwrap(), 1);

    // Rolled back transaction
    let transaction = adapter.begin_transaction(&ctx).await.unwrap();
    authors
        .insert_in(&transaction, &ctx, values(&[("name", "Octavia".into())]))
        .await
        .expect("Failed to insert inside the transaction");
    transaction.rollback().await.expect("Failed to roll back");
    let count = authors
        .fetch_all(&ctx, Condition::from("name = 'Octavia'"))
        .await
        .unwrap()
        .len();
    assert_eq!(count, 0);

    // Recursive delete through posts into comments
    let deleted = authors
        .delete(&ctx, Condition::Bound(vec![("id = ?".into(), author.into())]))
        .await
        .expect("Failed to delete the author");
    assert_eq!(deleted, 1);
    assert_eq!(posts.fetch_all(&ctx, Criteria::new()).await.unwrap().len(), 0);
    assert_eq!(comments.fetch_all(&ctx, Criteria::new()).await.unwrap().len(), 0);

    // Missing table
    let missing = Registry::builder()
        .adapter("main", adapter.clone())
        .default_adapter("main")
        .table(TableDefinition::new("tabula_missing"))
        .build()
        .unwrap();
    let error = missing
        .table("tabula_missing")
        .unwrap()
        .primary_key(&ctx)
        .await
        .expect_err("A missing table has no primary key");
    assert!(matches!(error_kind(&error), Some(DbError::Schema(..))));
}
