use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::StoreError;
use crate::parser::SqlValue;

/// Data-access seam used by the schema manager and the batch loader.
///
/// Every method takes `&self` so scoped guards can hold the store while
/// statements are still being executed.
pub trait Store {
    /// Execute one statement, returning the number of affected rows
    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<usize, StoreError>;

    /// Column names of `table`; `Err` when the table does not exist
    fn table_columns(&self, table: &str) -> Result<Vec<String>, StoreError>;

    /// Current lock-wait allowance
    fn time_limit(&self) -> Result<Duration, StoreError>;

    fn set_time_limit(&self, limit: Duration) -> Result<(), StoreError>;
}

impl<S: Store + ?Sized> Store for &S {
    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<usize, StoreError> {
        (**self).execute(sql, params)
    }

    fn table_columns(&self, table: &str) -> Result<Vec<String>, StoreError> {
        (**self).table_columns(table)
    }

    fn time_limit(&self) -> Result<Duration, StoreError> {
        (**self).time_limit()
    }

    fn set_time_limit(&self, limit: Duration) -> Result<(), StoreError> {
        (**self).set_time_limit(limit)
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;

        // Optimize for bulk insert
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;",
        )?;

        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn count_rows(&self, table: &str) -> Result<u64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl Store for SqliteStore {
    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<usize, StoreError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        Ok(stmt.execute(params_from_iter(params.iter()))?)
    }

    fn table_columns(&self, table: &str) -> Result<Vec<String>, StoreError> {
        let sql = format!("SELECT * FROM {} LIMIT 0", quote_ident(table));
        let stmt = self.conn.prepare(&sql)?;
        let columns = stmt.column_names().into_iter().map(String::from).collect();
        debug!(table, ?columns, "Table exists");
        Ok(columns)
    }

    fn time_limit(&self) -> Result<Duration, StoreError> {
        let ms: i64 = self
            .conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))?;
        Ok(Duration::from_millis(ms.max(0) as u64))
    }

    fn set_time_limit(&self, limit: Duration) -> Result<(), StoreError> {
        self.conn.busy_timeout(limit)?;
        Ok(())
    }
}

/// Quote an identifier for use in generated SQL
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_columns_probe() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.table_columns("missing").is_err());

        store
            .execute("CREATE TABLE t (a INTEGER, \"end\" TEXT)", &[])
            .unwrap();
        assert_eq!(store.table_columns("t").unwrap(), vec!["a", "end"]);
    }

    #[test]
    fn test_execute_binds_values() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.execute("CREATE TABLE t (a INTEGER, b TEXT, c REAL)", &[]).unwrap();

        let inserted = store
            .execute(
                "INSERT INTO t (a, b, c) VALUES (?, ?, ?), (?, ?, ?)",
                &[
                    SqlValue::Integer(1),
                    SqlValue::Text("it's".to_string()),
                    SqlValue::Real(1.5),
                    SqlValue::Integer(2),
                    SqlValue::Null,
                    SqlValue::Real(-0.25),
                ],
            )
            .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(store.count_rows("t").unwrap(), 2);

        let b: String = store
            .connection()
            .query_row("SELECT b FROM t WHERE a = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(b, "it's");
    }

    #[test]
    fn test_time_limit_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_time_limit(Duration::from_secs(42)).unwrap();
        assert_eq!(store.time_limit().unwrap(), Duration::from_secs(42));
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("geoip_block"), "\"geoip_block\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
