//! Lookup caching across checks, including negative answers and concurrent
//! callers sharing one checker.

mod common;

use std::sync::Arc;
use std::time::Duration;

use _groundcheck_core::config::CheckerConfig;
use _groundcheck_core::validation::SymbolKind;

use common::{checker, FakeGraph, GROUNDED_SCRIPT, HALLUCINATED_SCRIPT};

#[test]
fn repeated_check_issues_no_new_remote_calls() {
    let graph = Arc::new(FakeGraph::acme());
    let checker = checker(graph.clone(), None, CheckerConfig::default());

    let first = checker.check_hallucinations(GROUNDED_SCRIPT, "a.py", true, false);
    let calls_after_first = graph.remote_calls();
    // module, class, __init__ signature, method, render signature
    assert_eq!(calls_after_first, 5);

    let second = checker.check_hallucinations(GROUNDED_SCRIPT, "a.py", true, false);
    assert_eq!(graph.remote_calls(), calls_after_first);

    let (first, second) = (first.report().unwrap(), second.report().unwrap());
    assert_eq!(first.overall_confidence(), second.overall_confidence());
    assert_eq!(first.hallucinations, second.hallucinations);
    assert_eq!(checker.cache().len(), 5);
}

#[test]
fn negative_answers_are_cached() {
    let graph = Arc::new(FakeGraph::new());
    let checker = checker(graph.clone(), None, CheckerConfig::default());

    let script = "import ghost_lib\nimport ghost_lib\n";
    let report = checker
        .check_hallucinations(script, "twice.py", true, false)
        .report()
        .cloned()
        .unwrap();
    assert_eq!(report.overall_assessment.hallucination_count, 2);
    assert_eq!(graph.remote_calls(), 1);

    checker.check_hallucinations(script, "twice.py", true, false);
    assert_eq!(graph.remote_calls(), 1);
    assert_eq!(checker.cache().stats().hits, 3);
}

#[test]
fn slow_duplicate_lookups_in_one_request_reach_the_graph_once() {
    let graph = Arc::new(FakeGraph::new().with_latency(Duration::from_millis(50)));
    assert!(CheckerConfig::default().max_concurrency > 1);
    let checker = checker(graph.clone(), None, CheckerConfig::default());

    let report = checker
        .check_hallucinations("import ghost_lib\nimport ghost_lib\n", "slow.py", true, false)
        .report()
        .cloned()
        .unwrap();
    assert_eq!(report.hallucinations.critical.len(), 2);
    assert_eq!(graph.remote_calls(), 1);
}

#[test]
fn clearing_the_cache_forces_fresh_lookups() {
    let graph = Arc::new(FakeGraph::new());
    let checker = checker(graph.clone(), None, CheckerConfig::default());

    checker.check_hallucinations(HALLUCINATED_SCRIPT, "g.py", true, false);
    let calls = graph.remote_calls();
    checker.cache().clear();
    checker.check_hallucinations(HALLUCINATED_SCRIPT, "g.py", true, false);
    assert_eq!(graph.remote_calls(), calls * 2);
}

#[test]
fn finding_more_symbols_never_lowers_confidence() {
    let sparse = checker(Arc::new(FakeGraph::new()), None, CheckerConfig::default());
    let richer = checker(
        Arc::new(FakeGraph::new().with_symbol(SymbolKind::Module, "ghost_lib")),
        None,
        CheckerConfig::default(),
    );

    let low = sparse
        .check_hallucinations(HALLUCINATED_SCRIPT, "g.py", true, false)
        .report()
        .map(|r| r.overall_confidence())
        .unwrap();
    let high = richer
        .check_hallucinations(HALLUCINATED_SCRIPT, "g.py", true, false)
        .report()
        .map(|r| r.overall_confidence())
        .unwrap();
    assert!(high > low);
}

#[test]
fn concurrent_checks_share_one_checker() {
    let graph = Arc::new(FakeGraph::acme());
    let checker = Arc::new(checker(graph.clone(), None, CheckerConfig::default()));
    checker.check_hallucinations(GROUNDED_SCRIPT, "warm.py", true, false);
    let warm_calls = graph.remote_calls();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let checker = Arc::clone(&checker);
            std::thread::spawn(move || {
                checker
                    .check_hallucinations(GROUNDED_SCRIPT, &format!("t{i}.py"), true, false)
                    .report()
                    .map(|r| r.overall_confidence())
            })
        })
        .collect();

    let scores: Vec<f64> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();
    assert!(scores.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(graph.remote_calls(), warm_calls);
}
