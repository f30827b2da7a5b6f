mod common;

use pgtable::{OrmError, OrmResult, Record, Value, record};

async fn ages(client: &pgtable::Client, table: &str) -> OrmResult<Vec<Value>> {
    let rows = client
        .table(table)
        .find(Record::new(), "age")?
        .add_order_by("account")
        .await?;
    Ok(rows.iter().filter_map(|r| r.get("age").cloned()).collect())
}

#[tokio::test]
async fn failed_block_rolls_back() -> OrmResult<()> {
    let Some(mut client) = common::connect("failed_block_rolls_back")? else {
        return Ok(());
    };
    let name = common::unique_table("tx_rollback");
    common::create_users(&mut client, &name).await?;
    client
        .table(&name)
        .insert(
            vec![
                record! { "account" => "a", "age" => 1 },
                record! { "account" => "b", "age" => 2 },
            ],
            "",
        )?
        .await?;

    let result: OrmResult<()> = pgtable::transaction!(client, tx, {
        let users = tx.table(&name);
        users.update(record! { "account" => "a" }, record! { "age" => 10 })?.await?;
        users.update(record! { "account" => "b" }, record! { "age" => 20 })?.await?;
        Err(OrmError::Other("boom".to_string()))
    });
    assert!(result.is_err());

    assert_eq!(ages(&client, &name).await?, vec![Value::Int(1), Value::Int(2)]);
    common::drop_table(&client, &name).await
}

#[tokio::test]
async fn committed_block_is_visible() -> OrmResult<()> {
    let Some(mut client) = common::connect("committed_block_is_visible")? else {
        return Ok(());
    };
    let name = common::unique_table("tx_commit");
    common::create_users(&mut client, &name).await?;

    let inserted = pgtable::transaction!(client, tx, {
        let users = tx.table(&name);
        users.insert(record! { "account" => "a", "age" => 5 }, "")?.await?;
        users.count(Record::new())?.await
    })?;
    assert_eq!(inserted, 1);

    assert_eq!(ages(&client, &name).await?, vec![Value::Int(5)]);
    common::drop_table(&client, &name).await
}

#[tokio::test]
async fn manual_rollback_and_release() -> OrmResult<()> {
    let Some(mut client) = common::connect("manual_rollback_and_release")? else {
        return Ok(());
    };
    let name = common::unique_table("tx_manual");
    common::create_users(&mut client, &name).await?;

    let mut tx = client.transaction().await?;
    tx.begin().await?;
    assert!(tx.is_active());
    tx.table(&name).insert(record! { "account" => "x" }, "")?.await?;
    tx.rollback().await?;
    assert!(!tx.is_active());
    tx.release();

    assert!(ages(&client, &name).await?.is_empty());
    common::drop_table(&client, &name).await
}
