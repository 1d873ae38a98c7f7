//! Small round-robin pool of SQLite connections, opened once and drained on
//! close.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, RwLock};
use rusqlite::{Connection, OpenFlags};

use crate::errors::{CollaboratorError, GroundcheckResult};
use crate::store::schema;

pub const DEFAULT_POOL_SIZE: usize = 4;
const MAX_POOL_SIZE: usize = 16;
const BUSY_TIMEOUT_MS: u32 = 5_000;

pub struct ConnectionPool {
    path: PathBuf,
    connections: RwLock<Vec<Mutex<Connection>>>,
    next: AtomicUsize,
}

impl ConnectionPool {
    /// Open `size` connections to the database at `path`, creating the file
    /// and its schema when missing. Pooled connections are query-only.
    pub fn open(path: &Path, size: usize) -> GroundcheckResult<Self> {
        let size = size.clamp(1, MAX_POOL_SIZE);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        {
            let conn = Connection::open(path)?;
            apply_pragmas(&conn)?;
            schema::initialize(&conn)?;
        }

        let mut connections = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            apply_pragmas(&conn)?;
            conn.execute_batch("PRAGMA query_only = ON;")?;
            connections.push(Mutex::new(conn));
        }

        Ok(Self {
            path: path.to_path_buf(),
            connections: RwLock::new(connections),
            next: AtomicUsize::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` on the next connection in round-robin order.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, CollaboratorError>
    where
        F: FnOnce(&Connection) -> Result<T, CollaboratorError>,
    {
        let connections = self.connections.read();
        if connections.is_empty() {
            return Err(CollaboratorError::Unavailable(format!(
                "connection pool for {} is closed",
                self.path.display()
            )));
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % connections.len();
        let guard = connections[idx].lock();
        f(&guard)
    }

    pub fn size(&self) -> usize {
        self.connections.read().len()
    }

    /// Drop every pooled connection. Later calls fail as unavailable.
    pub fn close(&self) {
        self.connections.write().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.connections.read().is_empty()
    }
}

fn apply_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(std::time::Duration::from_millis(u64::from(BUSY_TIMEOUT_MS)))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_schema_and_closes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("graph.db");
        let pool = ConnectionPool::open(&path, 2).unwrap();
        assert_eq!(pool.size(), 2);

        let tables: i64 = pool
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'symbols'",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(tables, 1);

        pool.close();
        assert!(pool.is_closed());
        let err = pool.with_conn(|_| Ok(())).unwrap_err();
        assert!(matches!(err, CollaboratorError::Unavailable(_)));
    }

    #[test]
    fn pooled_connections_are_query_only() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::open(&dir.path().join("g.db"), 1).unwrap();
        let result = pool.with_conn(|conn| {
            Ok(conn.execute("INSERT INTO repositories(name) VALUES ('x')", [])?)
        });
        assert!(result.is_err());
    }
}
