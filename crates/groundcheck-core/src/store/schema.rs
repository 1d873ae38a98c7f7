//! SQLite schema DDL for the knowledge graph and the code example index.
//!
//! Both stores share one schema so a single database file can hold the graph
//! and the examples. Population is done by external indexers.

use rusqlite::{params, Connection};
use tracing::{debug, warn};

use crate::errors::GroundcheckResult;

/// Version stamped into `repo_meta` by [`initialize`].
pub const SCHEMA_VERSION: i32 = 1;

/// Core DDL statements: 5 CREATE TABLE + 6 CREATE INDEX.
///
/// Executed with `CREATE … IF NOT EXISTS` so they are safe to replay on an
/// already-initialised database.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    // ── tables (5) ──────────────────────────────────────────────────────
    "CREATE TABLE IF NOT EXISTS repo_meta (
        key TEXT PRIMARY KEY,
        value TEXT
    );",
    "CREATE TABLE IF NOT EXISTS repositories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        source_url TEXT,
        indexed_at TEXT DEFAULT CURRENT_TIMESTAMP
    );",
    "CREATE TABLE IF NOT EXISTS symbols (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        repo_id INTEGER NOT NULL REFERENCES repositories(id),
        kind TEXT NOT NULL,
        name TEXT NOT NULL,
        qualified_name TEXT NOT NULL,
        return_type TEXT,
        UNIQUE(repo_id, kind, qualified_name)
    );",
    "CREATE TABLE IF NOT EXISTS parameters (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol_id INTEGER NOT NULL REFERENCES symbols(id),
        name TEXT NOT NULL,
        type TEXT,
        position INTEGER NOT NULL,
        default_value TEXT,
        kind TEXT NOT NULL DEFAULT 'positional',
        UNIQUE(symbol_id, position)
    );",
    "CREATE TABLE IF NOT EXISTS code_examples (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        repo_name TEXT,
        source_url TEXT,
        content TEXT NOT NULL,
        summary TEXT
    );",
    // ── indexes (6) ─────────────────────────────────────────────────────
    "CREATE INDEX IF NOT EXISTS idx_symbols_kind_qualified ON symbols(kind, qualified_name);",
    "CREATE INDEX IF NOT EXISTS idx_symbols_kind_name ON symbols(kind, name);",
    "CREATE INDEX IF NOT EXISTS idx_symbols_repo ON symbols(repo_id);",
    "CREATE INDEX IF NOT EXISTS idx_parameters_symbol ON parameters(symbol_id, position);",
    "CREATE INDEX IF NOT EXISTS idx_code_examples_repo ON code_examples(repo_name);",
    "CREATE INDEX IF NOT EXISTS idx_repositories_name ON repositories(name);",
];

/// FTS5 index over code examples, kept in sync by triggers.
///
/// Best-effort: some SQLite builds lack FTS5, and the example index then
/// falls back to a bounded table scan.
pub const FTS_STATEMENTS: &[&str] = &[
    "CREATE VIRTUAL TABLE IF NOT EXISTS example_fts
     USING fts5(example_id UNINDEXED, content, summary);",
    "CREATE TRIGGER IF NOT EXISTS code_examples_fts_insert AFTER INSERT ON code_examples BEGIN
        INSERT INTO example_fts(example_id, content, summary)
        VALUES (new.id, new.content, COALESCE(new.summary, ''));
     END;",
    "CREATE TRIGGER IF NOT EXISTS code_examples_fts_delete AFTER DELETE ON code_examples BEGIN
        DELETE FROM example_fts WHERE example_id = old.id;
     END;",
];

/// Create tables and the optional FTS index, then stamp [`SCHEMA_VERSION`].
/// Safe to run against an already-initialised or externally populated file.
pub fn initialize(conn: &Connection) -> GroundcheckResult<()> {
    for stmt in SCHEMA_STATEMENTS {
        conn.execute_batch(stmt)?;
    }
    let mut fts = true;
    for stmt in FTS_STATEMENTS {
        if let Err(e) = conn.execute_batch(stmt) {
            warn!("FTS5 unavailable, example search will scan: {e}");
            fts = false;
            break;
        }
    }
    if fts {
        backfill_fts(conn)?;
    }
    conn.execute(
        "INSERT INTO repo_meta(key, value) VALUES('schema_version', ?1) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
        params![SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

pub fn fts_available(conn: &Connection) -> bool {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'example_fts'",
        [],
        |_| Ok(()),
    )
    .is_ok()
}

/// Returns 0 when the database was never initialised.
pub fn schema_version(conn: &Connection) -> i32 {
    conn.query_row(
        "SELECT value FROM repo_meta WHERE key = 'schema_version';",
        [],
        |row| row.get::<_, String>(0),
    )
    .ok()
    .and_then(|v| v.parse().ok())
    .unwrap_or(0)
}

/// Index examples that were written before the FTS triggers existed, e.g. by
/// an indexer running against a build without FTS5.
fn backfill_fts(conn: &Connection) -> GroundcheckResult<()> {
    let added = conn.execute(
        "INSERT INTO example_fts(example_id, content, summary)
         SELECT id, content, COALESCE(summary, '') FROM code_examples
         WHERE id NOT IN (SELECT example_id FROM example_fts);",
        [],
    )?;
    if added > 0 {
        debug!(added, "example index backfilled");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_statement_counts() {
        assert_eq!(SCHEMA_STATEMENTS.len(), 11);
        assert_eq!(FTS_STATEMENTS.len(), 3);
    }

    #[test]
    fn initialize_fresh_database() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        assert_eq!(schema_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn initialize_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn.execute("INSERT INTO code_examples(content) VALUES ('acme.build()')", [])
            .unwrap();
        initialize(&conn).unwrap();
        assert_eq!(schema_version(&conn), SCHEMA_VERSION);
        let examples: i64 = conn
            .query_row("SELECT COUNT(*) FROM code_examples", [], |r| r.get(0))
            .unwrap();
        assert_eq!(examples, 1);
        if fts_available(&conn) {
            let indexed: i64 = conn
                .query_row("SELECT COUNT(*) FROM example_fts", [], |r| r.get(0))
                .unwrap();
            assert_eq!(indexed, 1);
        }
    }

    #[test]
    fn examples_written_before_the_index_are_backfilled() {
        let conn = Connection::open_in_memory().unwrap();
        for stmt in SCHEMA_STATEMENTS {
            conn.execute_batch(stmt).unwrap();
        }
        conn.execute_batch(
            "INSERT INTO code_examples(content, summary) VALUES
                ('w.render(1)', 'Render'),
                ('acme.build()', NULL);",
        )
        .unwrap();

        initialize(&conn).unwrap();
        if !fts_available(&conn) {
            return;
        }
        let indexed: i64 = conn
            .query_row("SELECT COUNT(*) FROM example_fts", [], |r| r.get(0))
            .unwrap();
        assert_eq!(indexed, 2);
    }

    #[test]
    fn uninitialised_database_reports_version_zero() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn), 0);
    }

    #[test]
    fn fts_tracks_inserted_examples() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        if !fts_available(&conn) {
            return;
        }
        conn.execute(
            "INSERT INTO code_examples(content) VALUES ('w.render(1)')",
            [],
        )
        .unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM example_fts", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }
}
