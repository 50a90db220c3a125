//! Read-only access to the `sales` table.

use crate::error::QueryError;
use crate::types::SalesRecord;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags};
use serde_json::{Map, Number, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

pub type Result<T> = std::result::Result<T, QueryError>;

/// Shared handle to the sales database. Clones share one connection, so queries are
/// serialized; they run on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct SalesStore {
    conn: Arc<Mutex<Connection>>,
}

impl SalesStore {
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags).map_err(|source| QueryError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Distinct years present in the table, ascending.
    pub async fn list_years(&self) -> Result<Vec<i32>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT DISTINCT year FROM sales ORDER BY year")?;
            let years = stmt
                .query_map([], |row| row.get::<_, i32>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(years)
        })
        .await
    }

    /// Every row stored for `year`, all columns included. No match is an empty list.
    pub async fn list_sales(&self, year: i32) -> Result<Vec<SalesRecord>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT * FROM sales WHERE year = ?1")?;
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let rows = stmt
                .query_map(params![year], |row| {
                    let mut object = Map::with_capacity(columns.len());
                    for (idx, name) in columns.iter().enumerate() {
                        object.insert(name.clone(), column_to_json(row.get_ref(idx)?));
                    }
                    Ok(object)
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            debug!(year, rows = rows.len(), "loaded sales rows");
            rows.into_iter()
                .map(|object| Ok(serde_json::from_value(Value::Object(object))?))
                .collect::<Result<Vec<SalesRecord>>>()
        })
        .await
    }

    pub async fn table_names(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(names)
        })
        .await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| QueryError::Worker("sales connection mutex poisoned".into()))?;
            f(&conn)
        })
        .await
        .map_err(|e| QueryError::Worker(e.to_string()))?
    }
}

fn column_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(_) => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seeded(rows: &[(&str, i32, f64)]) -> SalesStore {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE sales (id INTEGER PRIMARY KEY, country_code TEXT, year INTEGER, sales NUMERIC);",
        )
        .unwrap();
        for (code, year, sales) in rows {
            conn.execute(
                "INSERT INTO sales (country_code, year, sales) VALUES (?1, ?2, ?3)",
                params![code, year, sales],
            )
            .unwrap();
        }
        SalesStore::from_connection(conn)
    }

    #[tokio::test]
    async fn years_are_distinct_and_ascending() {
        let store = seeded(&[
            ("USA", 2024, 1.0),
            ("FRA", 2022, 2.0),
            ("DEU", 2024, 3.0),
            ("USA", 2023, 4.0),
        ]);
        assert_eq!(store.list_years().await.unwrap(), vec![2022, 2023, 2024]);
    }

    #[tokio::test]
    async fn sales_for_year_pass_through_every_column() {
        let store = seeded(&[("USA", 2023, 1_200_000.0), ("usa", 2024, 50.0)]);

        let rows = store.list_sales(2023).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].country_code.as_deref(), Some("USA"));
        assert_eq!(rows[0].year, 2023);
        assert_eq!(rows[0].sales_value(), 1_200_000.0);
        assert_eq!(rows[0].extra.get("id"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn unknown_year_is_empty_not_an_error() {
        let store = seeded(&[("USA", 2023, 1.0)]);
        assert!(store.list_sales(1999).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_table_is_a_query_error() {
        let store = SalesStore::from_connection(Connection::open_in_memory().unwrap());
        assert!(matches!(store.list_years().await, Err(QueryError::Sqlite(_))));
    }

    #[tokio::test]
    async fn open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = SalesStore::open_path(dir.path().join("absent.db")).unwrap_err();
        assert!(matches!(err, QueryError::Open { .. }));
    }

    #[tokio::test]
    async fn lists_tables() {
        let store = seeded(&[]);
        assert_eq!(store.table_names().await.unwrap(), vec!["sales"]);
    }
}
