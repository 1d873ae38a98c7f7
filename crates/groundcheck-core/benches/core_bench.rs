//! Criterion benchmarks for groundcheck-core.
//!
//! ## Benchmark groups
//!
//! 1. **schema**: DDL init on fresh and already-initialised databases.
//! 2. **analysis**: parsing and element extraction at various script sizes.
//! 3. **parameters**: call-site matching against declared signatures.
//! 4. **check**: end-to-end checks against in-memory collaborators, cold and
//!    warm cache.
//! 5. **example_search**: SQLite example index lookups.
//!
//! ## Running
//!
//! ```sh
//! cargo bench --manifest-path crates/groundcheck-core/Cargo.toml
//! # Run only the end-to-end group:
//! cargo bench --manifest-path crates/groundcheck-core/Cargo.toml -- check
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rusqlite::Connection;

use _groundcheck_core::analyzer::analyze;
use _groundcheck_core::config::CheckerConfig;
use _groundcheck_core::engine::HallucinationChecker;
use _groundcheck_core::errors::CollaboratorError;
use _groundcheck_core::models::{ArgKind, KeywordArg};
use _groundcheck_core::store::schema::initialize;
use _groundcheck_core::store::SqliteExampleIndex;
use _groundcheck_core::validation::{
    validate_parameters, GraphStore, ParamSpec, SearchHit, Signature, SymbolKind, SymbolLookup,
    VectorSearch,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct MapGraph {
    symbols: HashMap<(SymbolKind, String), Vec<String>>,
    signatures: HashMap<String, Signature>,
}

impl MapGraph {
    fn acme() -> Self {
        let mut symbols = HashMap::new();
        for (kind, name) in [
            (SymbolKind::Module, "acme"),
            (SymbolKind::Class, "acme.Widget"),
            (SymbolKind::Method, "acme.Widget.render"),
            (SymbolKind::Method, "acme.Widget.__init__"),
            (SymbolKind::Function, "acme.build"),
        ] {
            symbols.insert((kind, name.to_string()), vec!["acme".to_string()]);
        }
        let mut signatures = HashMap::new();
        signatures.insert(
            "acme.Widget.render".to_string(),
            Signature {
                params: vec![
                    ParamSpec::required("self", None),
                    ParamSpec::required("width", Some("int")),
                    ParamSpec::optional("theme", Some("str")),
                ],
                return_type: None,
            },
        );
        Self {
            symbols,
            signatures,
        }
    }
}

impl GraphStore for MapGraph {
    fn find_symbol(
        &self,
        kind: SymbolKind,
        qualifiers: &[&str],
    ) -> Result<SymbolLookup, CollaboratorError> {
        Ok(match self.symbols.get(&(kind, qualifiers.join("."))) {
            Some(repos) => SymbolLookup::found(repos.iter().cloned()),
            None => SymbolLookup::missing(),
        })
    }

    fn find_method_signature(
        &self,
        class_name: &str,
        method_name: &str,
    ) -> Result<Option<Signature>, CollaboratorError> {
        Ok(self
            .signatures
            .get(&format!("{class_name}.{method_name}"))
            .cloned())
    }
}

struct EchoSearch;

impl VectorSearch for EchoSearch {
    fn search(
        &self,
        query: &str,
        top_k: usize,
        _min_similarity: f64,
    ) -> Result<Vec<SearchHit>, CollaboratorError> {
        Ok((0..top_k.min(3))
            .map(|i| SearchHit {
                content: format!("# {query}"),
                similarity: 0.9 - i as f64 * 0.1,
            })
            .collect())
    }
}

/// A script of roughly `n` usage lines mixing grounded and unknown symbols.
fn synthetic_script(n: usize) -> String {
    let mut script = String::from("import acme\nimport ghost_lib\nfrom acme import Widget\n\n");
    for i in 0..n {
        match i % 4 {
            0 => script.push_str(&format!("w{i} = Widget()\n")),
            1 => script.push_str(&format!("w{}.render({i}, theme='dark')\n", i - 1)),
            2 => script.push_str(&format!("acme.build({i})\n")),
            _ => script.push_str(&format!("ghost_lib.do_magic_{i}()\n")),
        }
    }
    script
}

fn checker() -> HallucinationChecker {
    HallucinationChecker::new(
        Arc::new(MapGraph::acme()),
        Some(Arc::new(EchoSearch)),
        CheckerConfig::default(),
    )
}

// ---------------------------------------------------------------------------
// Benchmark: Schema initialization
// ---------------------------------------------------------------------------

fn bench_schema(c: &mut Criterion) {
    let mut group = c.benchmark_group("schema");

    group.bench_function("initialize_fresh", |b| {
        b.iter(|| {
            let conn = Connection::open_in_memory().unwrap();
            initialize(&conn).unwrap();
            black_box(&conn);
        });
    });

    group.bench_function("initialize_existing", |b| {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        b.iter(|| {
            initialize(black_box(&conn)).unwrap();
        });
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: Script analysis
// ---------------------------------------------------------------------------

fn bench_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("analysis");
    for size in [10usize, 100, 1_000] {
        let script = synthetic_script(size);
        group.bench_with_input(BenchmarkId::new("analyze", size), &script, |b, script| {
            b.iter(|| analyze(black_box(script), "bench.py").unwrap());
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: Parameter validation
// ---------------------------------------------------------------------------

fn bench_parameters(c: &mut Criterion) {
    let expected = vec![
        ParamSpec::required("self", None),
        ParamSpec::required("width", Some("int")),
        ParamSpec::required("height", Some("Optional[int]")),
        ParamSpec::optional("theme", Some("Union[str, None]")),
    ];
    let positional = vec![ArgKind::Int, ArgKind::NoneValue];
    let keywords = vec![KeywordArg {
        name: "theme".to_string(),
        kind: ArgKind::Str,
    }];

    c.bench_function("validate_parameters", |b| {
        b.iter(|| {
            validate_parameters(
                black_box(&expected),
                black_box(&positional),
                black_box(&keywords),
            )
        });
    });
}

// ---------------------------------------------------------------------------
// Benchmark: End-to-end checks
// ---------------------------------------------------------------------------

fn bench_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("check");
    for size in [10usize, 100] {
        let script = synthetic_script(size);

        group.bench_with_input(BenchmarkId::new("cold_cache", size), &script, |b, script| {
            let checker = checker();
            b.iter(|| {
                checker.cache().clear();
                black_box(checker.check_hallucinations(script, "bench.py", true, false));
            });
        });

        group.bench_with_input(BenchmarkId::new("warm_cache", size), &script, |b, script| {
            let checker = checker();
            checker.check_hallucinations(script, "bench.py", true, false);
            b.iter(|| black_box(checker.check_hallucinations(script, "bench.py", true, false)));
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: SQLite example search
// ---------------------------------------------------------------------------

fn bench_example_search(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("examples.db");
    let index = SqliteExampleIndex::open(&path).unwrap();
    {
        let conn = Connection::open(&path).unwrap();
        for i in 0..2_000 {
            conn.execute(
                "INSERT INTO code_examples(repo_name, content, summary) VALUES ('bench', ?1, ?2);",
                rusqlite::params![
                    format!("w = Widget({i})\nw.render_{}(width={i})", i % 50),
                    format!("render variant {}", i % 50),
                ],
            )
            .unwrap();
        }
    }

    c.bench_function("example_search_top5", |b| {
        b.iter(|| {
            index
                .search(black_box("render_7 method call example"), 5, 0.3)
                .unwrap()
        });
    });
}

// ---------------------------------------------------------------------------
// Register all benchmark groups
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_schema,
    bench_analysis,
    bench_parameters,
    bench_check,
    bench_example_search,
);
criterion_main!(benches);
