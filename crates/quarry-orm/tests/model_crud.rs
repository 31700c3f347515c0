//! Model CRUD and lifecycle hooks against in-memory SQLite.

use std::sync::{Arc, Mutex};

use quarry_orm::{Connection, Fetch, HookEvent, Model, OrmError, Record, SqlValue};
use sqlx::sqlite::SqlitePoolOptions;

async fn setup() -> Model {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");
    let conn = Connection::from_pool(pool);
    conn.execute(
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT,
            role TEXT,
            active BOOLEAN NOT NULL DEFAULT 1
        )",
        &[],
    )
    .await
    .unwrap();
    Model::new("users", conn)
}

fn recorder(model: &mut Model, log: &Arc<Mutex<Vec<String>>>, events: &[HookEvent]) {
    for &event in events {
        let log = Arc::clone(log);
        model.add_hook(event, move |record| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                let name = record.get_str("name").unwrap_or("?").to_string();
                log.lock().unwrap().push(format!("{event}:{name}"));
                Ok(())
            })
        });
    }
}

#[tokio::test]
async fn create_then_find_by_insert_id() {
    let users = setup().await;
    let created = users.create(Record::new().with("name", "x")).await.unwrap();
    let id = created.get_i64("id").unwrap();

    let found = users.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(found.get_str("name"), Some("x"));
    assert_eq!(found.get_i64("active"), Some(1));
}

#[tokio::test]
async fn create_keeps_caller_supplied_primary_key() {
    let users = setup().await;
    let conn = users.connection().clone();
    conn.execute("CREATE TABLE tags (code TEXT PRIMARY KEY, label TEXT)", &[])
        .await
        .unwrap();
    let tags = Model::new("tags", conn).with_primary_key("code");

    let created = tags
        .create(Record::new().with("code", "abc").with("label", "first"))
        .await
        .unwrap();
    assert_eq!(created.get("code"), Some(&SqlValue::Text("abc".into())));

    let found = tags.find_by_id("abc").await.unwrap().unwrap();
    assert_eq!(found.get_str("label"), Some("first"));

    let explicit = users
        .create(Record::new().with("id", 42).with("name", "y"))
        .await
        .unwrap();
    assert_eq!(explicit.get_i64("id"), Some(42));

    let null_key = users
        .create(Record::new().with("id", SqlValue::Null).with("name", "z"))
        .await
        .unwrap();
    assert_eq!(null_key.get_i64("id"), Some(43));
}

#[tokio::test]
async fn find_all_and_query() {
    let users = setup().await;
    for name in ["ann", "bob", "cid"] {
        users.create(Record::new().with("name", name)).await.unwrap();
    }
    assert_eq!(users.find_all().await.unwrap().len(), 3);

    let rows = users
        .query()
        .where_in("name", ["ann", "cid"])
        .order_by_desc("name")
        .get(users.connection())
        .await
        .unwrap();
    let names: Vec<_> = rows.iter().filter_map(|r| r.get_str("name")).collect();
    assert_eq!(names, vec!["cid", "ann"]);
}

#[tokio::test]
async fn before_create_mutates_the_inserted_row() {
    let mut users = setup().await;
    users.add_hook(HookEvent::BeforeCreate, |record| {
        Box::pin(async move {
            if !record.contains("role") {
                record.set("role", "member");
            }
            Ok(())
        })
    });

    let created = users.create(Record::new().with("name", "ann")).await.unwrap();
    assert_eq!(created.get_str("role"), Some("member"));

    let stored = users.find_by_id(created.get_i64("id").unwrap()).await.unwrap().unwrap();
    assert_eq!(stored.get_str("role"), Some("member"));
}

#[tokio::test]
async fn hooks_fire_in_order_around_each_mutation() {
    let mut users = setup().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    recorder(
        &mut users,
        &log,
        &[
            HookEvent::BeforeCreate,
            HookEvent::AfterCreate,
            HookEvent::BeforeUpdate,
            HookEvent::AfterUpdate,
            HookEvent::BeforeDelete,
            HookEvent::AfterDelete,
        ],
    );

    let created = users.create(Record::new().with("name", "ann")).await.unwrap();
    let id = created.get_i64("id").unwrap();
    assert!(users.update(id, Record::new().with("name", "anna")).await.unwrap());
    assert!(users.delete(id).await.unwrap());

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "before_create:ann",
            "after_create:ann",
            "before_update:anna",
            "after_update:anna",
            "before_delete:anna",
            "after_delete:anna",
        ]
    );
}

#[tokio::test]
async fn update_merges_partial_over_existing_row() {
    let mut users = setup().await;
    let seen = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&seen);
    users.add_hook(HookEvent::BeforeUpdate, move |record| {
        let slot = Arc::clone(&slot);
        Box::pin(async move {
            *slot.lock().unwrap() = Some(record.clone());
            Ok(())
        })
    });

    let created = users
        .create(Record::new().with("name", "ann").with("email", "a@example.com"))
        .await
        .unwrap();
    let id = created.get_i64("id").unwrap();
    assert!(users.update(id, Record::new().with("email", "ann@example.com")).await.unwrap());

    let merged = seen.lock().unwrap().clone().unwrap();
    assert_eq!(merged.get_str("name"), Some("ann"));
    assert_eq!(merged.get_str("email"), Some("ann@example.com"));

    let stored = users.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.get_str("name"), Some("ann"));
    assert_eq!(stored.get_str("email"), Some("ann@example.com"));
}

#[tokio::test]
async fn missing_rows_skip_hooks() {
    let mut users = setup().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    recorder(
        &mut users,
        &log,
        &[HookEvent::BeforeUpdate, HookEvent::BeforeDelete],
    );

    assert!(!users.update(99, Record::new().with("name", "ghost")).await.unwrap());
    assert!(!users.delete(99).await.unwrap());
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failing_before_hook_aborts_the_mutation() {
    let mut users = setup().await;
    users.add_hook(HookEvent::BeforeDelete, |record| {
        Box::pin(async move {
            if record.get_str("role") == Some("admin") {
                return Err(OrmError::Hook("admins cannot be deleted".into()));
            }
            Ok(())
        })
    });

    let admin = users
        .create(Record::new().with("name", "root").with("role", "admin"))
        .await
        .unwrap();
    let id = admin.get_i64("id").unwrap();

    let err = users.delete(id).await.unwrap_err();
    assert!(matches!(err, OrmError::Hook(_)));
    assert!(users.find_by_id(id).await.unwrap().is_some());
}

#[tokio::test]
async fn failing_after_hook_keeps_the_write() {
    let mut users = setup().await;
    users.add_hook(HookEvent::AfterCreate, |_| {
        Box::pin(async { Err(OrmError::Hook("mailer down".into())) })
    });

    let err = users.create(Record::new().with("name", "ann")).await.unwrap_err();
    assert!(matches!(err, OrmError::Hook(_)));
    assert_eq!(users.find_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn driver_errors_propagate_unchanged() {
    let users = setup().await;
    // `name` is NOT NULL.
    let err = users
        .create(Record::new().with("email", "nobody@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Database(_)));

    let err = users
        .create(Record::new().with("name", "x").with("no_such_column", SqlValue::Int(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Database(_)));
}
