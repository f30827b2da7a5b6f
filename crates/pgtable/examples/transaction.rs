//! Transaction example for pgtable
//!
//! Run with: cargo run --example transaction -p pgtable
//!
//! Moves balance between two accounts inside one transaction; a failed
//! transfer rolls back.

use pgtable::{Client, ClientConfig, ColumnSchema, OrmError, OrmResult, Record, Transaction, Value, record};

async fn balance_of(tx: &Transaction, name: &str) -> OrmResult<i64> {
    tx.table("example_accounts")
        .find_one(record! { "name" => name }, "balance")?
        .await?
        .and_then(|row| row.get("balance").and_then(Value::as_i64))
        .ok_or_else(|| OrmError::validation(format!("unknown account {name}")))
}

async fn set_balance(tx: &Transaction, name: &str, balance: i64) -> OrmResult<()> {
    tx.table("example_accounts")
        .update(record! { "name" => name }, record! { "balance" => balance })?
        .await?;
    Ok(())
}

async fn transfer(tx: &Transaction, from: &str, to: &str, amount: i64) -> OrmResult<()> {
    let source = balance_of(tx, from).await?;
    if source < amount {
        return Err(OrmError::validation(format!(
            "Insufficient balance: {source} < {amount}"
        )));
    }
    let target = balance_of(tx, to).await?;

    set_balance(tx, from, source - amount).await?;
    set_balance(tx, to, target + amount).await
}

async fn print_balances(client: &Client) -> OrmResult<()> {
    let rows = client
        .table("example_accounts")
        .find(Record::new(), "name balance")?
        .add_order_by("name")
        .await?;
    for row in rows {
        println!("  {}", serde_json::to_string(&row).unwrap_or_default());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> OrmResult<()> {
    dotenvy::dotenv().ok();

    let mut client = Client::new(ClientConfig::from_env()?)?;
    client.register_table(
        "example_accounts",
        ColumnSchema::new()
            .column("name", "text PRIMARY KEY")
            .column("balance", "bigint NOT NULL DEFAULT 0"),
        Vec::<String>::new(),
    )?;

    client.query("DROP TABLE IF EXISTS example_accounts", &[]).await?;
    let accounts = client.table("example_accounts");
    accounts.create(None)?.await?;
    accounts
        .insert(
            vec![
                record! { "name" => "alice", "balance" => 1000 },
                record! { "name" => "bob", "balance" => 500 },
            ],
            "",
        )?
        .await?;

    println!("Initial balances:");
    print_balances(&client).await?;

    println!("\n=== Successful Transaction ===");
    pgtable::transaction!(client, tx, { transfer(&tx, "alice", "bob", 200).await })?;
    print_balances(&client).await?;

    println!("\n=== Failed Transaction (rolled back) ===");
    let result = pgtable::transaction!(client, tx, { transfer(&tx, "bob", "alice", 10_000).await });
    println!("transfer failed: {}", result.is_err());
    print_balances(&client).await?;

    Ok(())
}
