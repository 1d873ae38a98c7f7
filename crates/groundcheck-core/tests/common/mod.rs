//! In-process collaborator doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use _groundcheck_core::config::CheckerConfig;
use _groundcheck_core::engine::HallucinationChecker;
use _groundcheck_core::errors::CollaboratorError;
use _groundcheck_core::validation::{
    GraphStore, ParamSpec, SearchHit, Signature, SymbolKind, SymbolLookup, VectorSearch,
};

pub const GROUNDED_SCRIPT: &str = "\
from acme.widgets import Widget

w = Widget(3)
w.render(10, theme=\"dark\")
";

pub const HALLUCINATED_SCRIPT: &str = "\
import ghost_lib

ghost_lib.do_magic()
";

/// Knowledge graph held in memory. Counts every call that reaches it.
#[derive(Default)]
pub struct FakeGraph {
    symbols: HashMap<(SymbolKind, String), Vec<String>>,
    signatures: HashMap<String, Signature>,
    unavailable: bool,
    latency: Option<Duration>,
    pub symbol_calls: AtomicUsize,
    pub signature_calls: AtomicUsize,
    pub closed: AtomicUsize,
}

impl FakeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph knowing `acme.widgets.Widget` with `__init__(self, size: int)`
    /// and `render(self, width: int, theme: str = ...)`.
    pub fn acme() -> Self {
        Self::new()
            .with_symbol(SymbolKind::Module, "acme.widgets")
            .with_symbol(SymbolKind::Class, "acme.widgets.Widget")
            .with_symbol(SymbolKind::Method, "acme.widgets.Widget.__init__")
            .with_symbol(SymbolKind::Method, "acme.widgets.Widget.render")
            .with_signature(
                "acme.widgets.Widget.__init__",
                vec![
                    ParamSpec::required("self", None),
                    ParamSpec::required("size", Some("int")),
                ],
            )
            .with_signature(
                "acme.widgets.Widget.render",
                vec![
                    ParamSpec::required("self", None),
                    ParamSpec::required("width", Some("int")),
                    ParamSpec::optional("theme", Some("str")),
                ],
            )
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Every symbol lookup sleeps for `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_symbol(mut self, kind: SymbolKind, qualified: &str) -> Self {
        self.symbols
            .insert((kind, qualified.to_string()), vec!["acme".to_string()]);
        self
    }

    pub fn with_signature(mut self, qualified: &str, params: Vec<ParamSpec>) -> Self {
        self.signatures.insert(
            qualified.to_string(),
            Signature {
                params,
                return_type: None,
            },
        );
        self
    }

    pub fn remote_calls(&self) -> usize {
        self.symbol_calls.load(Ordering::SeqCst) + self.signature_calls.load(Ordering::SeqCst)
    }
}

impl GraphStore for FakeGraph {
    fn find_symbol(
        &self,
        kind: SymbolKind,
        qualifiers: &[&str],
    ) -> Result<SymbolLookup, CollaboratorError> {
        self.symbol_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        if self.unavailable {
            return Err(CollaboratorError::Unavailable("connection refused".into()));
        }
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
        self.signature_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(CollaboratorError::Unavailable("connection refused".into()));
        }
        Ok(self
            .signatures
            .get(&format!("{class_name}.{method_name}"))
            .cloned())
    }

    fn find_function_signature(
        &self,
        module: &str,
        function_name: &str,
    ) -> Result<Option<Signature>, CollaboratorError> {
        self.find_method_signature(module, function_name)
    }

    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Example index answering every query with the same similarities.
pub struct FakeSearch {
    similarities: Vec<f64>,
    unavailable: bool,
    pub calls: AtomicUsize,
}

impl FakeSearch {
    pub fn with_similarities(similarities: Vec<f64>) -> Self {
        Self {
            similarities,
            unavailable: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            similarities: Vec::new(),
            unavailable: true,
            calls: AtomicUsize::new(0),
        }
    }
}

impl VectorSearch for FakeSearch {
    fn search(
        &self,
        query: &str,
        top_k: usize,
        _min_similarity: f64,
    ) -> Result<Vec<SearchHit>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(CollaboratorError::Unavailable("index offline".into()));
        }
        Ok(self
            .similarities
            .iter()
            .take(top_k)
            .map(|similarity| SearchHit {
                content: format!("# example for {query}"),
                similarity: *similarity,
            })
            .collect())
    }
}

pub fn checker(
    graph: Arc<FakeGraph>,
    search: Option<Arc<FakeSearch>>,
    config: CheckerConfig,
) -> HallucinationChecker {
    HallucinationChecker::new(
        graph,
        search.map(|s| s as Arc<dyn VectorSearch>),
        config,
    )
}
