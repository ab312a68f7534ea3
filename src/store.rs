//! The process-wide database handle and low-level statement helpers.
//!
//! `rusqlite::Connection` is not `Sync`, so the single connection lives
//! behind an async mutex and every operation takes the lock for its full
//! duration. The free functions take `&Connection` so they compose inside
//! transactions as well as through [`Database`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use futures::lock::Mutex;
use rusqlite::{Connection, Row, ToSql};

use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::value::{Params, Value};

/// SQLite connection configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SqliteConfig {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
}

impl SqliteConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }
}

/// The single shared database handle.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (creating if absent) a file-backed database with foreign keys on.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        tracing::info!("opening sqlite database at {}", config.db_path.display());
        let conn = Connection::open(&config.db_path)?;
        Self::from_connection(conn)
    }

    /// In-memory database, mainly for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Bring the database up to the declared schema.
    ///
    /// With `force`, every declared table is dropped first — all existing
    /// rows are lost.
    pub async fn sync(&self, schema: &Schema, force: bool) -> Result<()> {
        let conn = self.conn.lock().await;
        sync_schema(&conn, schema, force)
    }

    pub async fn insert(&self, table: &str, params: &Params) -> Result<i64> {
        let conn = self.conn.lock().await;
        insert_row(&conn, table, params)
    }

    pub async fn execute(&self, sql: &str, params: &Params) -> Result<usize> {
        let conn = self.conn.lock().await;
        execute_named(&conn, sql, params)
    }

    pub async fn query_rows(
        &self,
        sql: &str,
        params: &Params,
    ) -> Result<Vec<HashMap<String, Value>>> {
        let conn = self.conn.lock().await;
        query_rows(&conn, sql, params)
    }

    /// Total number of rows in a table.
    pub async fn count(&self, table: &str) -> Result<i64> {
        let conn = self.conn.lock().await;
        let sql = format!("SELECT COUNT(*) FROM {table}");
        let count = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count)
    }

    /// Run a closure against the connection.
    pub async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().await;
        f(&conn)
    }

    /// Run a closure inside a transaction, committing on success.
    ///
    /// If the closure errors the transaction rolls back on drop, so a nested
    /// create leaves no partial rows behind.
    pub async fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

/// Drop (when forced) and recreate every table in the schema.
///
/// Tables are created in declaration order and dropped in reverse.
/// Foreign-key enforcement is suspended for the drop phase: tables outside
/// this schema may still reference the ones being dropped.
pub fn sync_schema(conn: &Connection, schema: &Schema, force: bool) -> Result<()> {
    if force {
        conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
        let dropped = drop_tables(conn, schema);
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        dropped?;
    }
    for table in &schema.tables {
        conn.execute_batch(&table.create_script())
            .map_err(|e| Error::Sync {
                table: table.name.clone(),
                message: e.to_string(),
            })?;
    }
    Ok(())
}

fn drop_tables(conn: &Connection, schema: &Schema) -> Result<()> {
    for table in schema.tables.iter().rev() {
        conn.execute_batch(&table.drop_sql())
            .map_err(|e| Error::Sync {
                table: table.name.clone(),
                message: e.to_string(),
            })?;
    }
    Ok(())
}

/// Execute a statement with named parameters.
pub fn execute_named(conn: &Connection, sql: &str, params: &Params) -> Result<usize> {
    let keyed = params.keyed();
    let bindings: Vec<(&str, &dyn ToSql)> = keyed.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    let changed = conn.execute(sql, &bindings[..])?;
    Ok(changed)
}

/// Insert one row and return its rowid.
pub fn insert_row(conn: &Connection, table: &str, params: &Params) -> Result<i64> {
    let columns: Vec<&str> = params.names().collect();
    let placeholders: Vec<String> = columns.iter().map(|c| format!(":{c}")).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    );
    execute_named(conn, &sql, params)?;
    Ok(conn.last_insert_rowid())
}

/// Query and map every row through `f`.
pub fn query_map_named<T, F>(conn: &Connection, sql: &str, params: &Params, f: F) -> Result<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let keyed = params.keyed();
    let bindings: Vec<(&str, &dyn ToSql)> = keyed.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    let rows = stmt.query_map(&bindings[..], f)?;
    let collected = rows.collect::<rusqlite::Result<Vec<T>>>()?;
    Ok(collected)
}

/// Like [`query_map_named`] but for at most one row.
pub fn query_one_named<T, F>(
    conn: &Connection,
    sql: &str,
    params: &Params,
    f: F,
) -> Result<Option<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    Ok(query_map_named(conn, sql, params, f)?.into_iter().next())
}

/// Query rows into name/value maps, reading column names off the statement.
pub fn query_rows(
    conn: &Connection,
    sql: &str,
    params: &Params,
) -> Result<Vec<HashMap<String, Value>>> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let keyed = params.keyed();
    let bindings: Vec<(&str, &dyn ToSql)> = keyed.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    let rows = stmt.query_map(&bindings[..], |row| {
        let mut map = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            map.insert(name.clone(), row.get::<_, Value>(i)?);
        }
        Ok(map)
    })?;
    let collected = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDefinition, DataType, TableDefinition};

    fn users_schema() -> Schema {
        Schema::new().add_table(
            TableDefinition::new("users")
                .column(ColumnDefinition::id())
                .column(ColumnDefinition::new("name", DataType::Text).not_null()),
        )
    }

    #[test]
    fn foreign_keys_are_enabled() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        let enabled: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn insert_and_query_round_trip() {
        let conn = Connection::open_in_memory().unwrap();
        sync_schema(&conn, &users_schema(), false).unwrap();

        let id = insert_row(&conn, "users", &Params::new().with_value("name", "ali")).unwrap();
        assert_eq!(id, 1);

        let rows = query_rows(
            &conn,
            "SELECT id, name FROM users WHERE id = :id",
            &Params::new().with_value("id", id),
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"].as_text(), Some("ali"));
        assert_eq!(rows[0]["id"].as_integer(), Some(1));
    }

    #[test]
    fn force_sync_drops_existing_rows() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = users_schema();
        sync_schema(&conn, &schema, true).unwrap();
        insert_row(&conn, "users", &Params::new().with_value("name", "ali")).unwrap();

        sync_schema(&conn, &schema, true).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn plain_sync_preserves_rows() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = users_schema();
        sync_schema(&conn, &schema, true).unwrap();
        insert_row(&conn, "users", &Params::new().with_value("name", "ali")).unwrap();

        sync_schema(&conn, &schema, false).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn database_execute_and_query_rows() {
        let db = Database::open_in_memory().unwrap();
        db.sync(&users_schema(), true).await.unwrap();

        db.execute(
            "INSERT INTO users (name) VALUES (:name)",
            &Params::new().with_value("name", "farhad"),
        )
        .await
        .unwrap();

        let rows = db
            .query_rows("SELECT name FROM users ORDER BY id", &Params::new())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"].as_text(), Some("farhad"));
    }

    #[tokio::test]
    async fn database_insert_and_count() {
        let db = Database::open_in_memory().unwrap();
        db.sync(&users_schema(), true).await.unwrap();

        db.insert("users", &Params::new().with_value("name", "zahra"))
            .await
            .unwrap();
        assert_eq!(db.count("users").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_transaction_rolls_back() {
        let db = Database::open_in_memory().unwrap();
        db.sync(&users_schema(), true).await.unwrap();

        let result: Result<()> = db
            .with_transaction(|conn| {
                insert_row(conn, "users", &Params::new().with_value("name", "ali"))?;
                Err(Error::NotFound("users".to_string()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(db.count("users").await.unwrap(), 0);
    }
}
