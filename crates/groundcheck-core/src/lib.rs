//! Groundcheck core library: detection of hallucinated API usage in Python
//! scripts.
//!
//! A script is parsed into structural elements, each usage is validated
//! against a knowledge graph of indexed repositories and grounded against an
//! index of code examples, and the two signals are fused into a confidence
//! report. The `python` feature builds the `_groundcheck_core` extension
//! module on top of the same API.

pub mod analyzer;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fusion;
pub mod models;
pub mod report;
pub mod store;
pub mod validation;

#[cfg(feature = "python")]
mod python;

pub use analyzer::analyze;
pub use config::CheckerConfig;
pub use engine::{HallucinationChecker, RequestFailure, RequestPhase};
pub use errors::{CollaboratorError, GroundcheckError, GroundcheckResult};
pub use report::{CheckResponse, ReportOptions, ValidationReport};
pub use store::{SqliteExampleIndex, SqliteGraphStore};
pub use validation::{CancellationToken, GraphStore, VectorSearch};
