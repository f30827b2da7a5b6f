mod common;

use pgtable::{ColumnSchema, Command, Operation, OrmError, OrmResult, Record, Value, record};
use std::error::Error as _;
use tokio_postgres::error::SqlState;

#[tokio::test]
async fn insert_find_update_count() -> OrmResult<()> {
    let Some(mut client) = common::connect("insert_find_update_count")? else {
        return Ok(());
    };
    let name = common::unique_table("crud");
    common::create_users(&mut client, &name).await?;
    let users = client.table(&name);

    let one = users.insert(record! { "account" => "a" }, "account")?.await?;
    assert_eq!(one.and_then(|r| r.get("account").cloned()), Some(Value::from("a")));

    let many = users
        .insert(vec![record! { "account" => "b" }, record! { "account" => "c" }], "")?
        .await?;
    assert_eq!(many.len(), 2);

    let rows = users
        .find(record! { "account" => vec!["a", "b"] }, "account age")?
        .add_order_by("account")
        .await?;
    let accounts: Vec<_> = rows.iter().filter_map(|r| r.get("account").cloned()).collect();
    assert_eq!(accounts, vec![Value::from("a"), Value::from("b")]);
    assert_eq!(rows[0].get("age"), Some(&Value::Null));

    let updated = users.update(Record::new(), record! { "age" => 10 })?.await?;
    assert_eq!(updated, 3);
    assert!(users.find(record! { "age" => 30 }, "")?.await?.is_empty());

    assert_eq!(users.count(Record::new())?.await?, 3);
    assert_eq!(users.count(record! { "account" => "a" })?.await?, 1);

    let last = users
        .find_one(Record::new(), "account")?
        .add_order_by("-account")
        .await?;
    assert_eq!(last.and_then(|r| r.get("account").cloned()), Some(Value::from("c")));
    assert_eq!(users.find_one(record! { "account" => "zz" }, "")?.await?, None);

    let raw = users.count(Record::new())?.raw().await?;
    assert_eq!(raw.command, Command::Select);
    assert_eq!(raw.rows.len(), 1);

    users.create_index(["-age", "account"])?.await?;

    common::drop_table(&client, &name).await
}

#[tokio::test]
async fn constraint_violations_are_classified() -> OrmResult<()> {
    let Some(mut client) = common::connect("constraint_violations_are_classified")? else {
        return Ok(());
    };
    let name = common::unique_table("violations");
    common::create_users(&mut client, &name).await?;
    let users = client.table(&name);

    users.insert(record! { "account" => "a" }, "")?.await?;
    let dup = users.insert(record! { "account" => "a" }, "")?.await.unwrap_err();
    assert!(dup.is_unique_violation());
    assert_eq!(dup.code(), Some(&SqlState::UNIQUE_VIOLATION));
    let db_err = dup.db_error().expect("driver error kept");
    assert_eq!(db_err.table(), Some(name.as_str()));
    assert!(db_err.constraint().is_some_and(|c| c.contains("account")));
    assert!(dup.source().is_some());

    let negative = users
        .insert(record! { "account" => "n", "age" => -1 }, "")?
        .await
        .unwrap_err();
    assert!(negative.is_check_violation());
    assert_eq!(negative.code(), Some(&SqlState::CHECK_VIOLATION));
    assert!(negative.db_error().and_then(|e| e.constraint()).is_some());

    // A syntax error is forwarded as a plain driver error.
    let broken = client.query("SELEC 1", &[]).await.unwrap_err();
    assert!(matches!(broken, OrmError::Query(_)));
    assert_eq!(broken.code(), Some(&SqlState::SYNTAX_ERROR));

    common::drop_table(&client, &name).await
}

#[tokio::test]
async fn insert_hook_fills_columns() -> OrmResult<()> {
    let Some(mut client) = common::connect("insert_hook_fills_columns")? else {
        return Ok(());
    };
    let name = common::unique_table("hooks");
    common::create_users(&mut client, &name).await?;
    client.register_hook(Operation::Insert, |options, _| {
        for row in &mut options.inserts {
            if !row.contains_key("age") {
                row.insert("age", 18);
            }
        }
    });
    let users = client.table(&name);

    users
        .insert(vec![record! { "account" => "a" }, record! { "account" => "b" }], "")?
        .await?;
    assert_eq!(users.count(record! { "age" => 18 })?.await?, 2);

    common::drop_table(&client, &name).await
}

#[tokio::test]
async fn awaiting_twice_executes_once() -> OrmResult<()> {
    let Some(mut client) = common::connect("awaiting_twice_executes_once")? else {
        return Ok(());
    };
    let name = common::unique_table("memo");
    common::create_users(&mut client, &name).await?;
    let users = client.table(&name);

    let insert = users.insert(record! { "account" => "once" }, "")?;
    (&insert).await?;
    (&insert).await?;
    assert_eq!(users.count(Record::new())?.await?, 1);

    common::drop_table(&client, &name).await
}

#[tokio::test]
async fn numeric_columns_bind_decode_and_count() -> OrmResult<()> {
    let Some(mut client) = common::connect("numeric_columns_bind_decode_and_count")? else {
        return Ok(());
    };
    let name = common::unique_table("numeric");
    client.register_table(
        &name,
        ColumnSchema::new()
            .column("account", "text")
            .column("price", "numeric(10,2)"),
        std::iter::empty::<String>(),
    )?;
    let items = client.table(&name);
    items.create(None)?.await?;

    items.insert(record! { "account" => "int", "price" => 10 }, "")?.await?;
    items.insert(record! { "account" => "text", "price" => "10.5" }, "")?.await?;
    items.insert(record! { "account" => "float", "price" => 2.25 }, "")?.await?;

    let rows = items.find(Record::new(), "account price")?.add_order_by("account").await?;
    let prices: Vec<_> = rows.iter().filter_map(|r| r.get("price").cloned()).collect();
    assert_eq!(
        prices,
        vec![Value::from("2.25"), Value::from("10.00"), Value::from("10.50")]
    );

    let updated = items
        .update(record! { "price" => "10.50" }, record! { "price" => 11 })?
        .await?;
    assert_eq!(updated, 1);

    // avg is numeric; the count shape truncates it
    let avg = items.count(Record::new())?.count_expr("avg(price)").await?;
    assert_eq!(avg, 7);

    common::drop_table(&client, &name).await
}
