use std::{path::Path, sync::Mutex};

use fractic_server_error::ServerError;
use rusqlite::{Connection, TransactionBehavior};

use crate::errors::DatabaseError;

const SCHEMA_SQL: &str = include_str!("schema.sql");

pub(crate) trait SqliteDatasource: Send + Sync {
    /// Runs `f` against the shared connection.
    fn read<T, F>(&self, action: &str, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>;

    /// Runs `f` inside an immediate SQL transaction, committed only when `f`
    /// succeeds.
    fn write<T, F>(&self, action: &str, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> rusqlite::Result<T>;

    /// Like `write`, for read-modify-write steps that can also reject the
    /// change with a domain error. The transaction is rolled back on either
    /// kind of failure.
    fn try_write<T, F>(&self, action: &str, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> rusqlite::Result<Result<T, ServerError>>;
}

pub(crate) struct SqliteDatasourceImpl {
    conn: Mutex<Connection>,
}

impl SqliteDatasourceImpl {
    /// Opens (creating if needed) the database file and applies the schema.
    pub(crate) fn open(path: &Path) -> Result<Self, ServerError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::with_debug(&format!("create directory {}", parent.display()), &e)
            })?;
        }
        let conn = Connection::open(path).map_err(|e| {
            DatabaseError::with_debug(&format!("open database at {}", path.display()), &e)
        })?;
        Self::init(conn)
    }

    pub(crate) fn open_in_memory() -> Result<Self, ServerError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DatabaseError::with_debug("open in-memory database", &e))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, ServerError> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| DatabaseError::with_debug("apply schema", &e))?;
        tracing::debug!("database schema applied");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl SqliteDatasource for SqliteDatasourceImpl {
    fn read<T, F>(&self, action: &str, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DatabaseError::with_debug(action, &e.to_string()))?;
        f(&conn).map_err(|e| DatabaseError::with_debug(action, &e))
    }

    fn write<T, F>(&self, action: &str, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> rusqlite::Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| DatabaseError::with_debug(action, &e.to_string()))?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| DatabaseError::with_debug(action, &e))?;
        let value = f(&tx).map_err(|e| DatabaseError::with_debug(action, &e))?;
        tx.commit()
            .map_err(|e| DatabaseError::with_debug(action, &e))?;
        Ok(value)
    }

    fn try_write<T, F>(&self, action: &str, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> rusqlite::Result<Result<T, ServerError>>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| DatabaseError::with_debug(action, &e.to_string()))?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| DatabaseError::with_debug(action, &e))?;
        // Dropping `tx` on either error rolls it back.
        let value = f(&tx).map_err(|e| DatabaseError::with_debug(action, &e))??;
        tx.commit()
            .map_err(|e| DatabaseError::with_debug(action, &e))?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pos.db");
        SqliteDatasourceImpl::open(&path).unwrap();
        let ds = SqliteDatasourceImpl::open(&path).unwrap();
        let tables: i64 = ds
            .read("count tables", |c| {
                c.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
                    [],
                    |row| row.get(0),
                )
            })
            .unwrap();
        assert_eq!(tables, 10);
    }

    #[test]
    fn failed_write_rolls_back() {
        let ds = SqliteDatasourceImpl::open_in_memory().unwrap();
        let result: Result<(), _> = ds.write("insert then fail", |tx| {
            tx.execute("INSERT INTO location (name, slug) VALUES ('A', 'a')", [])?;
            tx.execute("INSERT INTO location (name, slug) VALUES ('A', 'a')", [])?;
            Ok(())
        });
        assert!(result.is_err());
        let count: i64 = ds
            .read("count", |c| {
                c.query_row("SELECT COUNT(*) FROM location", [], |row| row.get(0))
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn rejected_write_rolls_back() {
        let ds = SqliteDatasourceImpl::open_in_memory().unwrap();
        let result: Result<(), _> = ds.try_write("insert then reject", |tx| {
            tx.execute("INSERT INTO location (name, slug) VALUES ('A', 'a')", [])?;
            Ok(Err(crate::errors::InvalidInput::new("slug", "is taken")))
        });
        assert!(result.is_err());
        let count: i64 = ds
            .read("count", |c| {
                c.query_row("SELECT COUNT(*) FROM location", [], |row| row.get(0))
            })
            .unwrap();
        assert_eq!(count, 0);
    }
}
