//! Operation hooks for pgtable
//!
//! Run with: cargo run --example hooks -p pgtable
//!
//! Stamps `createdAt` on every inserted row and `updatedAt` on every update.

use chrono::{SecondsFormat, Utc};
use pgtable::{Client, ClientConfig, ColumnSchema, Operation, OrmResult, record};

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[tokio::main]
async fn main() -> OrmResult<()> {
    dotenvy::dotenv().ok();

    let mut client = Client::new(ClientConfig::from_env()?)?;
    client.register_table(
        "example_posts",
        ColumnSchema::new()
            .column("title", "text NOT NULL")
            .column("createdAt", "varchar(24) NOT NULL")
            .column("updatedAt", "varchar(24)"),
        Vec::<String>::new(),
    )?;
    client
        .register_hook(Operation::Insert, |options, _table| {
            let stamp = now();
            for row in &mut options.inserts {
                row.insert("createdAt", stamp.clone());
            }
        })
        .register_hook(Operation::Update, |options, _table| {
            options.updates.insert("updatedAt", now());
        });

    client.query("DROP TABLE IF EXISTS example_posts", &[]).await?;
    let posts = client.table("example_posts");
    posts.create(None)?.await?;

    let post = posts
        .insert(record! { "title" => "hello" }, "title createdAt")?
        .await?;
    println!("inserted: {post:?}");

    posts
        .update(record! { "title" => "hello" }, record! { "title" => "hello, world" })?
        .await?;
    let post = posts.find_one(record! {}, "title createdAt updatedAt")?.await?;
    println!("updated: {post:?}");

    Ok(())
}
