use super::*;
use crate::executor::{Command, QueryOutput};
use crate::record;
use crate::schema::{ColumnSchema, SchemaRegistry};
use std::sync::Mutex;

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    reply: QueryOutput,
}

impl Executor for Recorder {
    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<QueryOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        Ok(self.reply.clone())
    }
}

impl Recorder {
    fn replying(rows: Vec<Record>, row_count: u64, command: Command) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            reply: QueryOutput {
                rows,
                row_count,
                command,
            },
        }
    }

    fn last_sql(&self) -> String {
        self.calls.lock().unwrap().last().map(|c| c.0.clone()).unwrap_or_default()
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

fn registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry
        .register(
            "users",
            ColumnSchema::new()
                .column("id", "serial primary key")
                .column("account", "varchar(80) unique")
                .column("age", "smallint"),
            ["CHECK (age >= 0)"],
        )
        .unwrap();
    registry
}

fn users<'a>(exec: &'a Recorder, hooks: HookRegistry) -> Table<'a, Recorder> {
    Table::new(exec, "users", registry().lookup("users"), Arc::new(hooks))
}

#[tokio::test]
async fn find_splits_fields_and_returns_rows() {
    let exec = Recorder::replying(
        vec![record! { "account" => "a" }, record! { "account" => "b" }],
        2,
        Command::Select,
    );
    let rows = users(&exec, HookRegistry::new())
        .find(record! { "account" => vec!["a", "b"] }, "account  age")
        .unwrap()
        .add_order_by("account")
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("account").and_then(Value::as_str), Some("a"));
    assert_eq!(
        exec.last_sql(),
        r#"SELECT "account","age" FROM users WHERE "account" IN ($1,$2) ORDER BY "account""#
    );
}

#[tokio::test]
async fn find_one_limits_and_returns_none_when_empty() {
    let exec = Recorder::default();
    let row = users(&exec, HookRegistry::new())
        .find_one(record! { "account" => "zz" }, "")
        .unwrap()
        .await
        .unwrap();
    assert_eq!(row, None);
    assert_eq!(
        exec.last_sql(),
        r#"SELECT * FROM users WHERE "account" = $1 LIMIT 1"#
    );
}

#[tokio::test]
async fn insert_keeps_input_cardinality() {
    let exec = Recorder::replying(vec![record! { "id" => 1 }], 1, Command::Insert);
    let table = users(&exec, HookRegistry::new());
    let one: Option<Record> = table
        .insert(record! { "account" => "a" }, "id")
        .unwrap()
        .await
        .unwrap();
    assert_eq!(one, Some(record! { "id" => 1 }));
    assert_eq!(
        exec.last_sql(),
        r#"INSERT INTO users ("account") VALUES ($1) RETURNING "id""#
    );

    let exec = Recorder::replying(Vec::new(), 2, Command::Insert);
    let table = users(&exec, HookRegistry::new());
    let many: Vec<Record> = table
        .insert(vec![record! { "account" => "a" }, record! { "account" => "b" }], "")
        .unwrap()
        .await
        .unwrap();
    assert_eq!(many.len(), 2);
}

#[tokio::test]
async fn insert_hook_stamps_rows() {
    let exec = Recorder::default();
    let hooks = HookRegistry::new().with(Operation::Insert, |opts, _| {
        for row in &mut opts.inserts {
            row.insert("age", 0);
        }
    });
    users(&exec, hooks)
        .insert([record! { "account" => "a" }, record! { "account" => "b" }], "")
        .unwrap()
        .await
        .unwrap();
    let calls = exec.calls.lock().unwrap().clone();
    assert_eq!(
        calls[0].0,
        r#"INSERT INTO users ("account","age") VALUES ($1,$2),($3,$4)"#
    );
    assert_eq!(calls[0].1[1], Value::Int(0));
}

#[tokio::test]
async fn update_returns_affected_count() {
    let exec = Recorder::replying(Vec::new(), 3, Command::Update);
    let affected = users(&exec, HookRegistry::new())
        .update(Record::new(), record! { "age" => 10 })
        .unwrap()
        .await
        .unwrap();
    assert_eq!(affected, 3);
    assert_eq!(exec.last_sql(), r#"UPDATE users SET "age" = $1"#);
}

#[tokio::test]
async fn find_by_id_and_update_uses_id_column() {
    let exec = Recorder::replying(Vec::new(), 1, Command::Update);
    let table = users(&exec, HookRegistry::new());
    table
        .find_by_id_and_update(7, record! { "age" => 30 })
        .unwrap()
        .await
        .unwrap();
    assert_eq!(exec.last_sql(), r#"UPDATE users SET "age" = $1 WHERE "id" = $2"#);

    table
        .with_id_column("account")
        .find_by_id_and_update("a", record! { "age" => 31 })
        .unwrap()
        .await
        .unwrap();
    assert_eq!(exec.last_sql(), r#"UPDATE users SET "age" = $1 WHERE "account" = $2"#);
}

#[tokio::test]
async fn count_coerces_and_runs_count_hooks() {
    let exec = Recorder::replying(vec![record! { "count" => "3" }], 1, Command::Select);
    let hooks = HookRegistry::new().with(Operation::Count, |opts, _| {
        opts.raw_conditions.push("age > 1".to_string());
    });
    let total = users(&exec, hooks).count(Record::new()).unwrap().await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(exec.last_sql(), "SELECT count(*) FROM users WHERE (age > 1)");
}

#[tokio::test]
async fn raw_mode_still_runs_hooks() {
    let exec = Recorder::replying(vec![record! { "count" => "x" }], 1, Command::Select);
    let hooks = HookRegistry::new().with(Operation::Count, |opts, _| {
        opts.conditions.insert("age", 5);
    });
    let out = users(&exec, hooks)
        .count(Record::new())
        .unwrap()
        .raw()
        .await
        .unwrap();
    assert_eq!(out.rows[0].get("count"), Some(&Value::from("x")));
    assert_eq!(exec.last_sql(), r#"SELECT count(*) FROM users WHERE "age" = $1"#);
}

#[tokio::test]
async fn create_uses_registered_constraints() {
    let exec = Recorder::default();
    let table = users(&exec, HookRegistry::new());
    table.create(None).unwrap().await.unwrap();
    assert_eq!(
        exec.last_sql(),
        r#"CREATE TABLE users ("id" serial primary key,"account" varchar(80) unique,"age" smallint,CHECK (age >= 0))"#
    );

    let other = TableSchema::new(ColumnSchema::new().column("k", "text"));
    table.create(Some(other)).unwrap().await.unwrap();
    assert_eq!(exec.last_sql(), r#"CREATE TABLE users ("k" text)"#);
}

#[tokio::test]
async fn create_index_and_empty_index() {
    let exec = Recorder::default();
    let table = users(&exec, HookRegistry::new());
    table.create_index(["account", "-age"]).unwrap().await.unwrap();
    assert_eq!(
        exec.last_sql(),
        r#"CREATE INDEX "users_account_age_idx" ON users ("account","age" DESC)"#
    );

    table.create_index(Vec::<String>::new()).unwrap().await.unwrap();
    assert_eq!(exec.call_count(), 1);
}

#[test]
fn missing_schema_fails_at_construction() {
    let exec = Recorder::default();
    let table = Table::new(&exec, "ghosts", None, Arc::new(HookRegistry::new()));
    assert!(table.find(Record::new(), "").unwrap_err().is_validation());
    assert!(table.count(Record::new()).is_err());
    assert!(table.create(None).is_err());
    assert_eq!(exec.call_count(), 0);
}
