use dynamodb_record::{
    sdk::types::AttributeValue, Client, Error, HardDeletes, IntoValue, Model, Mutator, Query,
    Record, SoftDeletes,
};
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
struct Order {
    id: Option<String>,
    status: String,
    total: i64,
    note: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

impl Model for Order {
    type Deletion = HardDeletes;
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Post {
    id: Option<String>,
    title: String,
    deleted_at: Option<String>,
}

impl Model for Post {
    type Deletion = SoftDeletes;
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Customer {
    id: Option<String>,
    email: String,
    country: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Ticket {
    // 数値のkeyは生成されるuuidと合わない
    id: Option<u64>,
    subject: String,
}

impl Model for Ticket {
    type Deletion = HardDeletes;
}

fn lowercase(value: AttributeValue) -> AttributeValue {
    match value {
        AttributeValue::S(s) => AttributeValue::S(s.to_lowercase()),
        other => other,
    }
}

fn uppercase(value: AttributeValue) -> AttributeValue {
    match value {
        AttributeValue::S(s) => AttributeValue::S(s.to_uppercase()),
        other => other,
    }
}

impl Model for Customer {
    type Deletion = HardDeletes;

    const TABLE: Option<&'static str> = Some("crm_customers");
    const TIMESTAMPS: bool = false;
    const SET_MUTATORS: &'static [Mutator] = &[Mutator::new("email", lowercase)];
    const GET_MUTATORS: &'static [Mutator] = &[Mutator::new("country", uppercase)];
}

fn client() -> Client {
    Client::mock_with_tables([
        ("orders", "id"),
        ("posts", "id"),
        ("crm_customers", "id"),
        ("tickets", "id"),
    ])
}

fn order(status: &str, total: i64) -> Order {
    Order {
        status: status.to_owned(),
        total,
        ..Default::default()
    }
}

fn post(title: &str) -> Post {
    Post {
        title: title.to_owned(),
        ..Default::default()
    }
}

async fn raw_item(client: &Client, table: &str, key: &AttributeValue) -> Option<dynamodb_record::Item> {
    client
        .get_item_raw(table, "id", key, None)
        .await
        .unwrap()
        .item
}

#[test]
fn test_should_bind_tables_by_type_name() {
    assert_eq!(Order::table(), "orders");
    assert_eq!(Post::table(), "posts");
    assert_eq!(Customer::table(), "crm_customers");
    assert_eq!(Order::name(), "Order");
}

#[tokio::test]
async fn test_should_assign_key_and_created_at_on_insert() {
    let client = client();
    let mut first = Record::new(&client, order("open", 10));
    assert!(!first.exists());
    assert!(first.key().is_none());

    first.save().await.unwrap();
    let second = Record::create(&client, order("open", 20)).await.unwrap();

    assert!(first.exists());
    assert!(first.id.is_some());
    assert!(first.created_at.is_some());
    assert!(first.updated_at.is_none());
    assert_ne!(first.key(), second.key());

    let stored = raw_item(&client, "orders", first.key().unwrap()).await.unwrap();
    assert_eq!(stored["status"], "open".into_value());
    assert!(!stored.contains_key("note"), "None is stored as a missing attribute");
}

#[tokio::test]
async fn test_should_update_without_touching_key_or_created_at() {
    let client = client();
    let mut record = Record::create(
        &client,
        Order {
            note: Some("leave at door".to_owned()),
            ..order("open", 10)
        },
    )
    .await
    .unwrap();
    let key = record.key().cloned().unwrap();
    let created_at = record.created_at.clone();

    record.status = "paid".to_owned();
    record.note = None;
    assert!(record.is_dirty().unwrap());
    record.save().await.unwrap();
    assert!(!record.is_dirty().unwrap());

    assert_eq!(record.key(), Some(&key));
    assert!(record.updated_at.is_some());

    let stored = Order::query(&client).find(&key).await.unwrap().unwrap();
    assert_eq!(stored.status, "paid");
    assert_eq!(stored.created_at, created_at);
    assert!(stored.updated_at.is_some());
    assert!(stored.note.is_none());
    assert!(!stored.original().contains_key("note"));
}

#[tokio::test]
async fn test_should_scan_with_equality_filter() {
    let client = client();
    for (status, total) in [("paid", 10), ("open", 20), ("paid", 30)] {
        Record::create(&client, order(status, total)).await.unwrap();
    }

    let paid = Order::query(&client)
        .where_op("status", "=", "paid")
        .unwrap()
        .get()
        .await
        .unwrap();
    assert_eq!(paid.len(), 2);
    assert!(paid.iter().all(|order| order.status == "paid"));

    let large = Order::query(&client)
        .where_eq("status", "paid")
        .where_op("total", ">", 15)
        .unwrap()
        .get()
        .await
        .unwrap();
    assert_eq!(large.len(), 1);
    assert_eq!(large[0].total, 30);

    assert_eq!(Query::<Order>::all(&client).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_should_return_first_and_last_in_scan_order() {
    let client = client();
    assert!(Order::query(&client).first().await.unwrap().is_none());
    assert!(matches!(
        Order::query(&client).first_or_fail().await,
        Err(Error::ModelNotFound { model: "Order", key: None })
    ));

    for total in [1, 2, 3] {
        Record::create(&client, order("open", total)).await.unwrap();
    }
    let query = Order::query(&client).where_between("total", 1, 3);
    assert_eq!(query.first().await.unwrap().unwrap().total, 1);
    assert_eq!(query.last().await.unwrap().unwrap().total, 3);
}

#[tokio::test]
async fn test_should_find_by_key() {
    let client = client();
    let created = Record::create(&client, order("open", 5)).await.unwrap();
    let id = created.id.clone().unwrap();

    let found = Order::query(&client).find(id.as_str()).await.unwrap().unwrap();
    assert_eq!(found.total, 5);
    assert!(found.exists());

    assert!(Order::query(&client).find("missing").await.unwrap().is_none());
    let err = Order::query(&client).find_or_fail("missing").await.unwrap_err();
    assert!(matches!(
        &err,
        Error::ModelNotFound { model: "Order", key: Some(key) } if key == "missing"
    ));
    assert_eq!(err.to_string(), "No query results for model [Order] missing");
}

#[tokio::test]
async fn test_should_project_selected_columns() {
    let client = client();
    let created = Record::create(&client, order("open", 5)).await.unwrap();

    let found = Order::query(&client)
        .select(["id", "status"])
        .find(created.key().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.original().len(), 2);
    assert!(found.created_at.is_none());
}

#[tokio::test]
async fn test_should_first_or_create() {
    let client = client();
    let created = Order::query(&client)
        .first_or_create(json!({ "status": "draft" }), json!({ "status": "ignored", "total": 7 }))
        .await
        .unwrap();
    assert_eq!(created.status, "draft");
    assert_eq!(created.total, 7);
    assert!(created.exists());

    let again = Order::query(&client)
        .first_or_create(json!({ "status": "draft" }), json!({ "total": 99 }))
        .await
        .unwrap();
    assert_eq!(again.key(), created.key());
    assert_eq!(again.total, 7);
    assert_eq!(Query::<Order>::all(&client).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_should_hard_delete_records() {
    let client = client();
    let mut record = Record::create(&client, order("open", 1)).await.unwrap();
    let key = record.key().cloned().unwrap();
    record.delete().await.unwrap();
    assert!(!record.exists());
    assert!(Order::query(&client).find(&key).await.unwrap().is_none());

    let mut unsaved = Record::new(&client, order("open", 1));
    assert!(matches!(
        unsaved.delete().await,
        Err(Error::NotPersisted { model: "Order" })
    ));
}

#[tokio::test]
async fn test_should_delete_every_match_of_a_query() {
    let client = client();
    for status in ["open", "open", "paid"] {
        Record::create(&client, order(status, 1)).await.unwrap();
    }
    let deleted = Order::query(&client)
        .where_eq("status", "open")
        .delete()
        .await
        .unwrap();
    assert_eq!(deleted, 2);

    let remaining = Query::<Order>::all(&client).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].status, "paid");
}

#[tokio::test]
async fn test_should_hide_soft_deleted_records() {
    let client = client();
    let mut trashed = Record::create(&client, post("old")).await.unwrap();
    Record::create(&client, post("new")).await.unwrap();

    trashed.delete().await.unwrap();
    assert!(trashed.trashed());
    assert!(trashed.deleted_at.is_some());
    assert!(trashed.exists());

    let visible = Post::query(&client).get().await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].title, "new");

    assert_eq!(Post::query(&client).with_trashed().get().await.unwrap().len(), 2);

    let only = Post::query(&client).only_trashed().get().await.unwrap();
    assert_eq!(only.len(), 1);
    assert_eq!(only[0].title, "old");
    assert!(only[0].trashed());
}

#[tokio::test]
async fn test_should_restore_soft_deleted_records() {
    let client = client();
    let mut record = Record::create(&client, post("draft")).await.unwrap();
    record.delete().await.unwrap();
    record.restore().await.unwrap();
    assert!(!record.trashed());
    assert!(record.deleted_at.is_none());
    assert_eq!(Post::query(&client).get().await.unwrap().len(), 1);

    for title in ["a", "b"] {
        let mut record = Record::create(&client, post(title)).await.unwrap();
        record.delete().await.unwrap();
    }
    assert_eq!(Post::query(&client).get().await.unwrap().len(), 1);
    let restored = Post::query(&client).restore().await.unwrap();
    assert_eq!(restored, 2);
    assert_eq!(Post::query(&client).get().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_should_force_delete_soft_deleted_records() {
    let client = client();
    let mut record = Record::create(&client, post("gone")).await.unwrap();
    record.delete().await.unwrap();
    record.force_delete().await.unwrap();
    assert!(Post::query(&client).only_trashed().get().await.unwrap().is_empty());
    assert!(Post::query(&client).with_trashed().get().await.unwrap().is_empty());

    Record::create(&client, post("kept")).await.unwrap();
    let mut trashed = Record::create(&client, post("purged")).await.unwrap();
    trashed.delete().await.unwrap();

    let purged = Post::query(&client)
        .with_trashed()
        .where_eq("title", "purged")
        .force_delete()
        .await
        .unwrap();
    assert_eq!(purged, 1);
    let left = Post::query(&client).with_trashed().get().await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].title, "kept");
}

#[tokio::test]
async fn test_should_soft_delete_every_match_of_a_query() {
    let client = client();
    for title in ["x", "y"] {
        Record::create(&client, post(title)).await.unwrap();
    }
    assert_eq!(Post::query(&client).delete().await.unwrap(), 2);
    assert!(Post::query(&client).get().await.unwrap().is_empty());
    assert_eq!(Post::query(&client).only_trashed().get().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_should_apply_mutators() {
    let client = client();
    let customer = Record::create(
        &client,
        Customer {
            email: "Someone@Example.COM".to_owned(),
            country: "jp".to_owned(),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(customer.email, "someone@example.com");

    let stored = raw_item(&client, "crm_customers", customer.key().unwrap()).await.unwrap();
    assert_eq!(stored["country"], "jp".into_value());
    assert!(!stored.contains_key("created_at"));

    let found = Customer::query(&client)
        .where_begins_with("email", "someone@")
        .first_or_fail()
        .await
        .unwrap();
    assert_eq!(found.country, "JP");
}

#[tokio::test]
async fn test_should_keep_unselected_attributes_when_saving_projection() {
    let client = client();
    let created = Record::create(
        &client,
        Order {
            note: Some("keep".to_owned()),
            ..order("open", 42)
        },
    )
    .await
    .unwrap();

    let mut partial = Order::query(&client)
        .select(["status"])
        .find(created.key().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(partial.key(), created.key());
    assert_eq!(partial.total, 0);
    partial.status = "paid".to_owned();
    partial.save().await.unwrap();

    let stored = Order::query(&client)
        .find(created.key().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, "paid");
    assert_eq!(stored.total, 42);
    assert_eq!(stored.note.as_deref(), Some("keep"));
    assert_eq!(stored.created_at, created.created_at);
    assert!(stored.updated_at.is_some());
}

#[tokio::test]
async fn test_should_not_restore_by_saving_stale_copy() {
    let client = client();
    let created = Record::create(&client, post("draft")).await.unwrap();
    let mut first = Post::query(&client).find(created.key().unwrap()).await.unwrap().unwrap();
    let mut stale = Post::query(&client).find(created.key().unwrap()).await.unwrap().unwrap();

    first.delete().await.unwrap();
    stale.title = "edited".to_owned();
    stale.save().await.unwrap();

    assert!(Post::query(&client).get().await.unwrap().is_empty());
    let trashed = Post::query(&client).only_trashed().get().await.unwrap();
    assert_eq!(trashed.len(), 1);
    assert_eq!(trashed[0].title, "edited");
}

#[tokio::test]
async fn test_should_skip_update_when_nothing_changed() {
    let client = client();
    let mut record = Record::create(&client, order("open", 1)).await.unwrap();
    assert!(!record.is_dirty().unwrap());
    record.save().await.unwrap();
    assert!(record.updated_at.is_none());

    let stored = raw_item(&client, "orders", record.key().unwrap()).await.unwrap();
    assert!(!stored.contains_key("updated_at"));
}

#[tokio::test]
async fn test_should_bulk_delete_with_projection_missing_key() {
    let client = client();
    for status in ["open", "open"] {
        Record::create(&client, order(status, 1)).await.unwrap();
    }
    let deleted = Order::query(&client).select(["status"]).delete().await.unwrap();
    assert_eq!(deleted, 2);
    assert!(Query::<Order>::all(&client).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_should_report_partial_failures_of_bulk_operations() {
    let client = client();
    Record::create(&client, post("a")).await.unwrap();
    Record::create(&client, post("b")).await.unwrap();
    // id(2+36) + title(5) + created_at(10+19) で上限の10バイト手前。deleted_atを付けると超える
    let big = Record::create(&client, post(&"x".repeat(400 * 1024 - 72 - 10)))
        .await
        .unwrap();
    let big_key = big.id.clone().unwrap();

    let Err(Error::Bulk(bulk)) = Post::query(&client).delete().await else {
        panic!("expected a bulk error");
    };
    assert_eq!(bulk.succeeded, 2);
    assert_eq!(bulk.failures.len(), 1);
    assert_eq!(bulk.failures[0].0, big_key);
    assert!(matches!(bulk.failures[0].1, Error::Client(_)));

    let visible = Post::query(&client).get().await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id.as_deref(), Some(big_key.as_str()));
    assert_eq!(Post::query(&client).only_trashed().get().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_should_stay_persisted_when_refresh_fails_after_insert() {
    let client = client();
    let mut record = Record::new(
        &client,
        Ticket {
            subject: "broken".to_owned(),
            ..Default::default()
        },
    );
    assert!(matches!(record.save().await, Err(Error::Serde(_))));
    assert!(record.exists());
    assert!(record.key().is_some());

    assert!(record.save().await.is_err());
    let items: Vec<dynamodb_record::Item> = client
        .scan_raw("tickets", Default::default(), None)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn test_should_reject_empty_in_list_before_scanning() {
    let client = client();
    Record::create(&client, order("open", 1)).await.unwrap();
    let err = Order::query(&client)
        .where_in("status", Vec::<&str>::new())
        .get()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Client(_)));
    assert!(err.to_string().contains("IN ComparisonOperator"));
}
