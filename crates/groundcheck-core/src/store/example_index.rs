//! Code example search over the SQLite `code_examples` table.
//!
//! Candidates come from the FTS5 index when the build has it, otherwise from a
//! bounded scan. Each candidate is scored by identifier overlap with the query.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use rusqlite::{params, Connection};
use tracing::debug;

use crate::errors::{CollaboratorError, GroundcheckResult};
use crate::store::pool::{ConnectionPool, DEFAULT_POOL_SIZE};
use crate::store::schema::fts_available;
use crate::validation::{SearchHit, VectorSearch};

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]+").unwrap());

/// Words the query builder adds around the identifier; they carry no signal.
const FILLER_TOKENS: &[&str] = &[
    "attribute", "call", "example", "function", "import", "method", "usage",
];

const CANDIDATE_FACTOR: usize = 8;
const MIN_CANDIDATES: usize = 32;
const MAX_SCAN_ROWS: usize = 2_000;

fn tokens(value: &str) -> HashSet<String> {
    TOKEN_RE
        .find_iter(value)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

fn query_tokens(query: &str) -> HashSet<String> {
    let all = tokens(query);
    let signal: HashSet<String> = all
        .iter()
        .filter(|t| !FILLER_TOKENS.contains(&t.as_str()))
        .cloned()
        .collect();
    if signal.is_empty() {
        all
    } else {
        signal
    }
}

/// Fraction of query identifiers that also occur in the example, in [0, 1].
pub fn overlap_similarity(query: &HashSet<String>, content: &str) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    let target = tokens(content);
    let overlap = query.intersection(&target).count();
    overlap as f64 / query.len() as f64
}

pub struct SqliteExampleIndex {
    pool: Arc<ConnectionPool>,
}

impl SqliteExampleIndex {
    pub fn open(path: &Path) -> GroundcheckResult<Self> {
        let pool = ConnectionPool::open(path, DEFAULT_POOL_SIZE)?;
        debug!(path = %path.display(), "example index opened");
        Ok(Self::from_pool(Arc::new(pool)))
    }

    pub fn from_pool(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }
}

impl VectorSearch for SqliteExampleIndex {
    fn search(
        &self,
        query: &str,
        top_k: usize,
        min_similarity: f64,
    ) -> Result<Vec<SearchHit>, CollaboratorError> {
        let wanted = query_tokens(query);
        if wanted.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let limit = (top_k * CANDIDATE_FACTOR).max(MIN_CANDIDATES);
        let candidates = self.pool.with_conn(|conn| {
            if fts_available(conn) {
                fts_candidates(conn, &wanted, limit)
            } else {
                scan_candidates(conn)
            }
        })?;

        let mut hits: Vec<SearchHit> = candidates
            .into_iter()
            .map(|(content, summary)| {
                let text = match &summary {
                    Some(s) => format!("{content}\n{s}"),
                    None => content.clone(),
                };
                SearchHit {
                    similarity: overlap_similarity(&wanted, &text),
                    content,
                }
            })
            .filter(|hit| hit.similarity > 0.0 && hit.similarity >= min_similarity)
            .collect();
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(top_k);
        Ok(hits)
    }

    fn close(&self) {
        self.pool.close();
    }
}

fn fts_candidates(
    conn: &Connection,
    wanted: &HashSet<String>,
    limit: usize,
) -> Result<Vec<(String, Option<String>)>, CollaboratorError> {
    let mut terms: Vec<&str> = wanted.iter().map(String::as_str).collect();
    terms.sort_unstable();
    let expression = terms
        .iter()
        .map(|t| format!("\"{t}\""))
        .collect::<Vec<_>>()
        .join(" OR ");

    let mut stmt = conn.prepare_cached(
        "SELECT e.content, e.summary FROM code_examples e \
         JOIN (SELECT example_id, rank FROM example_fts \
               WHERE example_fts MATCH ?1 ORDER BY rank LIMIT ?2) m \
           ON e.id = m.example_id \
         ORDER BY m.rank;",
    )?;
    let rows = stmt.query_map(params![expression, limit as i64], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn scan_candidates(conn: &Connection) -> Result<Vec<(String, Option<String>)>, CollaboratorError> {
    let mut stmt =
        conn.prepare_cached("SELECT content, summary FROM code_examples ORDER BY id LIMIT ?1;")?;
    let rows = stmt.query_map(params![MAX_SCAN_ROWS as i64], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
