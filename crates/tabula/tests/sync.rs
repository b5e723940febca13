//! End-to-end tests against a scripted connection.
//!
//! The fake connection answers the engine's metadata queries from canned
//! result sets and records every executed statement, so the whole
//! introspect → diff → generate → execute pipeline runs without a real
//! database.

use std::collections::HashMap;
use std::sync::Mutex;
use tabula::{
    Backend, ColumnDef, ColumnType, Connection, EntityMap, Error, IndexDef, PrimaryKey, Row,
    SchemaSet, Synchronizer, UniqueKeyDef, Value,
};

type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

#[derive(Default)]
struct ScriptedConn {
    results: HashMap<String, Vec<Row>>,
    executed: Mutex<Vec<String>>,
}

impl ScriptedConn {
    fn new() -> Self {
        Self::default()
    }

    fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    fn set_tables(&mut self, names: &[&str]) {
        let rows = names
            .iter()
            .map(|n| Row::new(vec!["tbl_name".into()], vec![Value::Text(n.to_string())]))
            .collect();
        self.results.insert(
            "SELECT tbl_name FROM sqlite_master WHERE type = 'table'".into(),
            rows,
        );
    }

    /// Script `PRAGMA table_info`: (name, declared type, notnull, pk ordinal).
    fn set_columns(&mut self, table: &str, cols: &[(&str, &str, bool, i64)]) {
        let rows = cols
            .iter()
            .map(|(name, ty, notnull, pk)| {
                Row::new(
                    vec!["name".into(), "type".into(), "notnull".into(), "pk".into()],
                    vec![
                        Value::Text(name.to_string()),
                        Value::Text(ty.to_string()),
                        Value::Integer(*notnull as i64),
                        Value::Integer(*pk),
                    ],
                )
            })
            .collect();
        self.results
            .insert(format!("PRAGMA table_info(\"{table}\")"), rows);
    }

    /// Script `PRAGMA index_list`: (index name, unique).
    fn set_indexes(&mut self, table: &str, entries: &[(&str, bool)]) {
        let rows = entries
            .iter()
            .map(|(name, unique)| {
                Row::new(
                    vec!["name".into(), "unique".into()],
                    vec![
                        Value::Text(name.to_string()),
                        Value::Integer(*unique as i64),
                    ],
                )
            })
            .collect();
        self.results
            .insert(format!("PRAGMA index_list(\"{table}\")"), rows);
    }

    /// Script `PRAGMA index_info`: member columns in ordinal order.
    fn set_index_members(&mut self, index: &str, members: &[&str]) {
        let rows = members
            .iter()
            .map(|m| Row::new(vec!["name".into()], vec![Value::Text(m.to_string())]))
            .collect();
        self.results
            .insert(format!("PRAGMA index_info(\"{index}\")"), rows);
    }

    /// Script `PRAGMA foreign_key_list`: (id, referenced table, from, to).
    fn set_foreign_keys(&mut self, table: &str, rows: &[(i64, &str, &str, &str)]) {
        let rows = rows
            .iter()
            .map(|(id, dst, from, to)| {
                Row::new(
                    vec!["id".into(), "table".into(), "from".into(), "to".into()],
                    vec![
                        Value::Integer(*id),
                        Value::Text(dst.to_string()),
                        Value::Text(from.to_string()),
                        Value::Text(to.to_string()),
                    ],
                )
            })
            .collect();
        self.results
            .insert(format!("PRAGMA foreign_key_list(\"{table}\")"), rows);
    }
}

impl Connection for ScriptedConn {
    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, tabula::Result<u64>> {
        Box::pin(async move {
            self.executed.lock().unwrap().push(sql.to_string());
            Ok(0)
        })
    }

    fn query<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, tabula::Result<Vec<Row>>> {
        Box::pin(async move { Ok(self.results.get(sql).cloned().unwrap_or_default()) })
    }
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// A live `user` / `post` pair where `post` carries a foreign key to the
/// unique key on `user.id`.
fn scripted_blog() -> ScriptedConn {
    let mut conn = ScriptedConn::new();
    conn.set_tables(&["user", "post"]);
    conn.set_columns(
        "user",
        &[("id", "INTEGER", true, 1), ("email", "TEXT", true, 0)],
    );
    conn.set_indexes(
        "user",
        &[("sqlite_autoindex_user_1", true), ("ix_user_email", false)],
    );
    conn.set_index_members("sqlite_autoindex_user_1", &["id"]);
    conn.set_index_members("ix_user_email", &["email"]);
    conn.set_columns(
        "post",
        &[("id", "INTEGER", true, 1), ("author_id", "INTEGER", true, 0)],
    );
    conn.set_foreign_keys("post", &[(0, "user", "author_id", "id")]);
    conn
}

/// The target description matching [`scripted_blog`] exactly.
fn blog_target() -> SchemaSet {
    let user = EntityMap {
        columns: vec![
            ColumnDef::new("id", ColumnType::BigInt, false),
            ColumnDef::new("email", ColumnType::Text, false),
        ],
        primary_key: Some(PrimaryKey {
            name: "PK_user".to_string(),
            columns: strings(&["id"]),
        }),
        indexes: vec![IndexDef::new("ix_user_email", strings(&["email"]))],
        unique_keys: vec![UniqueKeyDef::new("uq_user_id", strings(&["id"]))],
        ..EntityMap::new("user")
    };
    let post = EntityMap {
        columns: vec![
            ColumnDef::new("id", ColumnType::BigInt, false),
            ColumnDef::new("author_id", ColumnType::BigInt, false),
        ],
        primary_key: Some(PrimaryKey {
            name: "PK_post".to_string(),
            columns: strings(&["id"]),
        }),
        foreign_keys: vec![tabula::ForeignKeyDef {
            name: "fk_post_author".to_string(),
            columns: strings(&["author_id"]),
            referenced_table: "user".to_string(),
            referenced_key: UniqueKeyDef::new("uq_user_id", strings(&["id"])),
        }],
        ..EntityMap::new("post")
    };
    [user, post].into_iter().collect()
}

#[tokio::test]
async fn test_introspect_resolves_foreign_keys_in_second_pass() {
    let conn = scripted_blog();
    let live = tabula::introspect(&conn, &Backend::sqlite()).await.unwrap();

    let user = live.get_table("user").unwrap();
    assert_eq!(user.columns.len(), 2);
    assert_eq!(user.columns[0].ty, ColumnType::BigInt);
    assert!(!user.columns[0].nullable);
    assert_eq!(user.primary_key.as_ref().unwrap().name, "PK_user");
    assert_eq!(user.unique_keys.len(), 1);
    assert_eq!(user.indexes.len(), 1);

    let post = live.get_table("post").unwrap();
    assert_eq!(post.foreign_keys.len(), 1);
    let fk = &post.foreign_keys[0];
    assert_eq!(fk.name, "FK_post_0");
    assert_eq!(fk.columns, strings(&["author_id"]));
    assert_eq!(fk.referenced_table, "user");
    // The reference is the canonical unique key owned by `user`, not a
    // synthesized duplicate.
    assert_eq!(fk.referenced_key, user.unique_keys[0]);
}

#[tokio::test]
async fn test_foreign_key_columns_match_case_insensitively() {
    // Column definitions report `Id`; the foreign key listing reports
    // `ID`. Only foreign key resolution folds case; column diffing and
    // index member resolution stay exact.
    let mut conn = ScriptedConn::new();
    conn.set_tables(&["account", "entry"]);
    conn.set_columns("account", &[("Id", "INTEGER", true, 1)]);
    conn.set_indexes("account", &[("sqlite_autoindex_account_1", true)]);
    conn.set_index_members("sqlite_autoindex_account_1", &["Id"]);
    conn.set_columns("entry", &[("account_id", "INTEGER", true, 0)]);
    conn.set_foreign_keys("entry", &[(0, "account", "ACCOUNT_ID", "ID")]);

    let live = tabula::introspect(&conn, &Backend::sqlite()).await.unwrap();
    let fk = &live.get_table("entry").unwrap().foreign_keys[0];
    // Resolution yields the canonical casing from the column definitions.
    assert_eq!(fk.columns, strings(&["account_id"]));
    assert_eq!(fk.referenced_key.columns, strings(&["Id"]));
}

#[tokio::test]
async fn test_missing_referenced_table_aborts_before_any_ddl() {
    let mut conn = ScriptedConn::new();
    conn.set_tables(&["post"]);
    conn.set_columns("post", &[("author_id", "INTEGER", true, 0)]);
    conn.set_foreign_keys("post", &[(0, "ghost", "author_id", "id")]);

    let sync = Synchronizer::new(Backend::sqlite());
    let err = sync.sync(&SchemaSet::new(), &conn).await.unwrap_err();
    assert!(matches!(err, Error::MissingTable { ref referenced, .. } if referenced == "ghost"));
    assert!(conn.executed().is_empty());
}

#[tokio::test]
async fn test_duplicate_unique_indexes_are_deduplicated() {
    let mut conn = ScriptedConn::new();
    conn.set_tables(&["user"]);
    conn.set_columns("user", &[("email", "TEXT", true, 0)]);
    conn.set_indexes("user", &[("uq_a", true), ("uq_b", true)]);
    conn.set_index_members("uq_a", &["email"]);
    conn.set_index_members("uq_b", &["email"]);

    let live = tabula::introspect(&conn, &Backend::sqlite()).await.unwrap();
    let user = live.get_table("user").unwrap();
    assert_eq!(user.unique_keys.len(), 1);
    assert_eq!(user.unique_keys[0].name, "uq_a");
}

#[tokio::test]
async fn test_matching_schemas_plan_nothing() {
    // The second run of a successful pass: live already matches the
    // target, so no statements and no guards.
    let conn = scripted_blog();
    let sync = Synchronizer::new(Backend::sqlite());

    let plan = sync.plan(&blog_target(), &conn).await.unwrap();
    assert_eq!(plan, Vec::<String>::new());

    let executed = sync.sync(&blog_target(), &conn).await.unwrap();
    assert!(executed.is_empty());
    assert!(conn.executed().is_empty());
}

#[tokio::test]
async fn test_new_dependent_table_is_created_after_its_reference() {
    // Live has only `user`; the target adds `post` with a foreign key to
    // user's unique key.
    let mut conn = ScriptedConn::new();
    conn.set_tables(&["user"]);
    conn.set_columns(
        "user",
        &[("id", "INTEGER", true, 1), ("email", "TEXT", true, 0)],
    );
    conn.set_indexes(
        "user",
        &[("sqlite_autoindex_user_1", true), ("ix_user_email", false)],
    );
    conn.set_index_members("sqlite_autoindex_user_1", &["id"]);
    conn.set_index_members("ix_user_email", &["email"]);

    let sync = Synchronizer::new(Backend::sqlite());
    let executed = sync.sync(&blog_target(), &conn).await.unwrap();

    assert_eq!(executed.first().unwrap(), "PRAGMA foreign_keys=OFF");
    assert_eq!(executed.last().unwrap(), "PRAGMA foreign_keys=ON");

    let create = executed
        .iter()
        .find(|s| s.starts_with("CREATE TABLE \"post\""))
        .unwrap();
    // SQLite takes constraints at creation time, so the foreign key rides
    // inline on the create statement.
    assert!(create.contains("FOREIGN KEY (\"author_id\") REFERENCES \"user\" (\"id\")"));
    // `user` is untouched: no statement mentions rebuilding it.
    assert!(!executed.iter().any(|s| s.contains("user__sync")));
    assert_eq!(conn.executed(), executed);
}

#[tokio::test]
async fn test_incompatible_retype_rebuilds_through_copy_rename() {
    // A nullable text column becomes a not-null integer; SQLite cannot
    // alter columns, so the table goes through the rebuild path.
    let mut conn = ScriptedConn::new();
    conn.set_tables(&["measure"]);
    conn.set_columns(
        "measure",
        &[("id", "INTEGER", true, 1), ("reading", "TEXT", false, 0)],
    );

    let target: SchemaSet = [EntityMap {
        columns: vec![
            ColumnDef::new("id", ColumnType::BigInt, false),
            ColumnDef::new("reading", ColumnType::BigInt, false),
        ],
        primary_key: Some(PrimaryKey {
            name: "PK_measure".to_string(),
            columns: strings(&["id"]),
        }),
        ..EntityMap::new("measure")
    }]
    .into_iter()
    .collect();

    let sync = Synchronizer::new(Backend::sqlite());
    let executed = sync.sync(&target, &conn).await.unwrap();

    let shapes: Vec<&str> = executed
        .iter()
        .map(|s| s.split_whitespace().next().unwrap())
        .collect();
    assert_eq!(
        shapes,
        vec!["PRAGMA", "CREATE", "INSERT", "DROP", "ALTER", "PRAGMA", "PRAGMA"]
    );
    assert!(executed[1].starts_with("CREATE TABLE \"measure__sync\""));
    assert_eq!(
        executed[2],
        "INSERT INTO \"measure__sync\" (\"id\", \"reading\") SELECT \"id\", \"reading\" FROM \"measure\""
    );
    assert_eq!(executed[3], "DROP TABLE \"measure\"");
    assert_eq!(
        executed[4],
        "ALTER TABLE \"measure__sync\" RENAME TO \"measure\""
    );
}

#[tokio::test]
async fn test_dropped_table_is_dropped() {
    let conn = scripted_blog();
    let mut target = blog_target();
    target.tables.shift_remove("post");

    let sync = Synchronizer::new(Backend::sqlite());
    let executed = sync.sync(&target, &conn).await.unwrap();

    assert!(executed.contains(&"DROP TABLE \"post\"".to_string()));
    assert!(!executed.iter().any(|s| s.contains("\"user\"") && s.starts_with("DROP")));
}
