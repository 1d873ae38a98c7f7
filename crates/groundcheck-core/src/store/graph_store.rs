//! Knowledge graph lookups over the SQLite `symbols` / `parameters` tables.

use std::path::Path;
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::errors::{CollaboratorError, GroundcheckResult};
use crate::store::pool::{ConnectionPool, DEFAULT_POOL_SIZE};
use crate::validation::{GraphStore, ParamKind, ParamSpec, Signature, SymbolKind, SymbolLookup};

const SYMBOL_LOCATIONS_SQL: &str = "\
    SELECT DISTINCT r.name FROM symbols s \
    JOIN repositories r ON r.id = s.repo_id \
    WHERE s.kind = ?1 AND s.qualified_name = ?2 \
    ORDER BY r.name;";

// A package is known when any of its submodules is indexed.
const MODULE_LOCATIONS_SQL: &str = "\
    SELECT DISTINCT r.name FROM symbols s \
    JOIN repositories r ON r.id = s.repo_id \
    WHERE s.kind = 'module' \
      AND (s.qualified_name = ?1 OR s.qualified_name LIKE ?2 ESCAPE '\\') \
    ORDER BY r.name;";

const SIGNATURE_SYMBOL_SQL: &str = "\
    SELECT id, return_type FROM symbols \
    WHERE kind = ?1 AND qualified_name = ?2 \
    ORDER BY id LIMIT 1;";

const PARAMETERS_SQL: &str = "\
    SELECT name, type, default_value, kind FROM parameters \
    WHERE symbol_id = ?1 ORDER BY position;";

pub struct SqliteGraphStore {
    pool: Arc<ConnectionPool>,
}

impl SqliteGraphStore {
    pub fn open(path: &Path) -> GroundcheckResult<Self> {
        let pool = ConnectionPool::open(path, DEFAULT_POOL_SIZE)?;
        debug!(path = %path.display(), "graph store opened");
        Ok(Self::from_pool(Arc::new(pool)))
    }

    pub fn from_pool(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }
}

impl GraphStore for SqliteGraphStore {
    fn find_symbol(
        &self,
        kind: SymbolKind,
        qualifiers: &[&str],
    ) -> Result<SymbolLookup, CollaboratorError> {
        let qualified = qualifiers.join(".");
        let locations = self.pool.with_conn(|conn| {
            if kind == SymbolKind::Module {
                let prefix = format!("{}.%", escape_like(&qualified));
                query_names(conn, MODULE_LOCATIONS_SQL, params![qualified, prefix])
            } else {
                query_names(conn, SYMBOL_LOCATIONS_SQL, params![kind.as_str(), qualified])
            }
        })?;
        Ok(if locations.is_empty() {
            SymbolLookup::missing()
        } else {
            SymbolLookup::found(locations)
        })
    }

    fn find_method_signature(
        &self,
        class_name: &str,
        method_name: &str,
    ) -> Result<Option<Signature>, CollaboratorError> {
        let qualified = format!("{class_name}.{method_name}");
        self.pool
            .with_conn(|conn| load_signature(conn, SymbolKind::Method, &qualified))
    }

    fn find_function_signature(
        &self,
        module: &str,
        function_name: &str,
    ) -> Result<Option<Signature>, CollaboratorError> {
        let qualified = format!("{module}.{function_name}");
        self.pool
            .with_conn(|conn| load_signature(conn, SymbolKind::Function, &qualified))
    }

    fn close(&self) {
        self.pool.close();
    }
}

fn query_names(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<String>, CollaboratorError> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, |row| row.get::<_, String>(0))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn load_signature(
    conn: &Connection,
    kind: SymbolKind,
    qualified: &str,
) -> Result<Option<Signature>, CollaboratorError> {
    let symbol = conn
        .prepare_cached(SIGNATURE_SYMBOL_SQL)?
        .query_row(params![kind.as_str(), qualified], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?))
        })
        .optional()?;
    let Some((symbol_id, return_type)) = symbol else {
        return Ok(None);
    };

    let mut stmt = conn.prepare_cached(PARAMETERS_SQL)?;
    let rows = stmt.query_map(params![symbol_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut params_out = Vec::new();
    for row in rows {
        let (name, type_name, default_value, kind_text) = row?;
        let kind = ParamKind::parse(&kind_text).ok_or_else(|| {
            CollaboratorError::Malformed(format!(
                "parameter '{name}' of {qualified} has unknown kind '{kind_text}'"
            ))
        })?;
        params_out.push(ParamSpec {
            name,
            type_name: type_name.filter(|t| !t.trim().is_empty()),
            has_default: default_value.is_some(),
            kind,
        });
    }

    Ok(Some(Signature {
        params: params_out,
        return_type,
    }))
}

fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (tempfile::TempDir, SqliteGraphStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.db");
        let store = SqliteGraphStore::open(&path).unwrap();

        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "INSERT INTO repositories(id, name) VALUES (1, 'acme'), (2, 'acme-fork');
             INSERT INTO symbols(id, repo_id, kind, name, qualified_name, return_type) VALUES
                (1, 1, 'module', 'acme.widgets', 'acme.widgets', NULL),
                (2, 1, 'class', 'Widget', 'acme.widgets.Widget', NULL),
                (3, 1, 'method', 'render', 'acme.widgets.Widget.render', 'str'),
                (4, 2, 'class', 'Widget', 'acme.widgets.Widget', NULL),
                (5, 1, 'function', 'build', 'acme.widgets.build', NULL),
                (6, 1, 'method', 'broken', 'acme.widgets.Widget.broken', NULL);
             INSERT INTO parameters(symbol_id, name, type, position, default_value, kind) VALUES
                (3, 'self', NULL, 0, NULL, 'positional'),
                (3, 'width', 'int', 1, NULL, 'positional'),
                (3, 'theme', 'str', 2, '\"dark\"', 'keyword_only'),
                (5, 'args', NULL, 0, NULL, 'var_positional'),
                (6, 'x', NULL, 0, NULL, 'sideways');",
        )
        .unwrap();
        (dir, store)
    }

    #[test]
    fn finds_symbols_with_their_repositories() {
        let (_dir, store) = seeded();
        let class = store
            .find_symbol(SymbolKind::Class, &["acme.widgets.Widget"])
            .unwrap();
        assert_eq!(class, SymbolLookup::found(["acme", "acme-fork"]));

        let method = store
            .find_symbol(SymbolKind::Method, &["acme.widgets.Widget", "render"])
            .unwrap();
        assert!(method.exists);

        let missing = store
            .find_symbol(SymbolKind::Method, &["acme.widgets.Widget", "explode"])
            .unwrap();
        assert_eq!(missing, SymbolLookup::missing());
    }

    #[test]
    fn packages_resolve_through_submodules() {
        let (_dir, store) = seeded();
        assert!(store.find_symbol(SymbolKind::Module, &["acme"]).unwrap().exists);
        assert!(!store.find_symbol(SymbolKind::Module, &["acm"]).unwrap().exists);
        assert!(!store.find_symbol(SymbolKind::Module, &["acme_"]).unwrap().exists);
    }

    #[test]
    fn loads_ordered_signatures() {
        let (_dir, store) = seeded();
        let sig = store
            .find_method_signature("acme.widgets.Widget", "render")
            .unwrap()
            .unwrap();
        let names: Vec<_> = sig.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["self", "width", "theme"]);
        assert_eq!(sig.params[1].type_name.as_deref(), Some("int"));
        assert!(sig.params[2].has_default);
        assert_eq!(sig.params[2].kind, ParamKind::KeywordOnly);
        assert_eq!(sig.return_type.as_deref(), Some("str"));

        let func = store
            .find_function_signature("acme.widgets", "build")
            .unwrap()
            .unwrap();
        assert!(func.params[0].is_variadic());

        assert!(store
            .find_method_signature("acme.widgets.Widget", "nope")
            .unwrap()
            .is_none());
    }

    #[test]
    fn unknown_parameter_kind_is_malformed() {
        let (_dir, store) = seeded();
        let err = store
            .find_method_signature("acme.widgets.Widget", "broken")
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Malformed(_)));
    }

    #[test]
    fn closed_store_is_unavailable() {
        let (_dir, store) = seeded();
        store.close();
        let err = store.find_symbol(SymbolKind::Module, &["acme"]).unwrap_err();
        assert!(matches!(err, CollaboratorError::Unavailable(_)));
    }
}
