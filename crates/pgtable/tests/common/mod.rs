#![allow(dead_code)]

use pgtable::{Client, ClientConfig, ColumnSchema, OrmResult};
use std::time::{SystemTime, UNIX_EPOCH};

/// Connect using `DATABASE_URL`, or `None` (with a note) when it is unset.
pub fn connect(test: &str) -> OrmResult<Option<Client>> {
    match std::env::var("DATABASE_URL") {
        Ok(url) => Client::connect(&url).map(Some),
        Err(_) => {
            eprintln!("DATABASE_URL is not set; skipping {test}");
            Ok(None)
        }
    }
}

/// Parsed `DATABASE_URL`, or `None` (with a note) when it is unset.
pub fn config(test: &str) -> OrmResult<Option<ClientConfig>> {
    match std::env::var("DATABASE_URL") {
        Ok(url) => ClientConfig::from_url(&url).map(Some),
        Err(_) => {
            eprintln!("DATABASE_URL is not set; skipping {test}");
            Ok(None)
        }
    }
}

/// A table name no other test run will use.
pub fn unique_table(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before UNIX_EPOCH")
        .as_nanos();
    format!("pgtable_{prefix}_{}_{nanos}", std::process::id())
}

/// Register `{account, age}` under `table` and create it.
pub async fn create_users(client: &mut Client, table: &str) -> OrmResult<()> {
    client.register_table(
        table,
        ColumnSchema::new()
            .column("account", "varchar(80) unique")
            .column("age", "smallint"),
        ["CHECK (age >= 0)"],
    )?;
    client.table(table).create(None)?.await?;
    Ok(())
}

pub async fn drop_table(client: &Client, table: &str) -> OrmResult<()> {
    client.query(&format!("DROP TABLE IF EXISTS {table}"), &[]).await?;
    Ok(())
}
