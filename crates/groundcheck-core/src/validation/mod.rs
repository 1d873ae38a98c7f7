//! Validation of analyzed scripts against the knowledge graph and the
//! example index.

pub mod cache;
pub mod collaborators;
pub mod graph;
pub mod params;
pub mod resolver;
pub mod semantic;

pub use cache::{CacheKey, CacheStats, CachedLookup, ValidationCache};
pub use collaborators::{
    CancellationToken, GraphStore, ParamKind, ParamSpec, SearchHit, Signature, SymbolKind,
    SymbolLookup, VectorSearch,
};
pub use graph::{GraphOutcome, GraphValidator};
pub use params::validate_parameters;
pub use semantic::{SemanticElementResult, SemanticOutcome, SemanticValidator};
