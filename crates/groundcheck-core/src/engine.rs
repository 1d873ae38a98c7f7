//! Request orchestration: analyze, validate on both branches concurrently,
//! fuse, report.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::analyzer::analyze;
use crate::config::CheckerConfig;
use crate::errors::GroundcheckError;
use crate::fusion::ConfidenceFusion;
use crate::report::{CheckResponse, ReportBuilder, ReportOptions, ValidationReport};
use crate::validation::{
    CancellationToken, GraphStore, GraphValidator, SemanticOutcome, SemanticValidator,
    ValidationCache, VectorSearch,
};

/// Phase of a request, reported in failure envelopes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestPhase {
    Analyze,
    GraphValidate,
    SemanticValidate,
    Degraded,
    Fuse,
}

impl RequestPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestPhase::Analyze => "analyze",
            RequestPhase::GraphValidate => "graph_validate",
            RequestPhase::SemanticValidate => "semantic_validate",
            RequestPhase::Degraded => "degraded",
            RequestPhase::Fuse => "fuse",
        }
    }
}

/// A fatal request failure and the phase it happened in.
#[derive(Debug)]
pub struct RequestFailure {
    pub phase: RequestPhase,
    pub error: GroundcheckError,
}

impl RequestFailure {
    fn new(phase: RequestPhase, error: GroundcheckError) -> Self {
        Self { phase, error }
    }
}

/// Long-lived checker. Owns the collaborator handles, the shared lookup
/// cache and the worker pools; safe to share across threads.
pub struct HallucinationChecker {
    graph_store: Arc<dyn GraphStore>,
    vector_search: Option<Arc<dyn VectorSearch>>,
    cache: Arc<ValidationCache>,
    graph: GraphValidator,
    semantic: SemanticValidator,
    fusion: ConfidenceFusion,
    closed: AtomicBool,
}

impl HallucinationChecker {
    pub fn new(
        graph_store: Arc<dyn GraphStore>,
        vector_search: Option<Arc<dyn VectorSearch>>,
        config: CheckerConfig,
    ) -> Self {
        let cache = Arc::new(ValidationCache::new());
        let graph = GraphValidator::new(graph_store.clone(), cache.clone(), config.clone());
        let semantic = SemanticValidator::new(vector_search.clone(), config.clone());
        info!(
            max_concurrency = config.max_concurrency,
            semantic = vector_search.is_some() && config.semantic_enabled,
            "hallucination checker ready"
        );
        Self {
            graph_store,
            vector_search,
            cache,
            graph,
            semantic,
            fusion: ConfidenceFusion::new(config),
            closed: AtomicBool::new(false),
        }
    }

    pub fn cache(&self) -> &ValidationCache {
        &self.cache
    }

    /// Check a script. Never fails: every failure becomes a
    /// `{success: false}` envelope.
    pub fn check_hallucinations(
        &self,
        script: &str,
        script_path: &str,
        include_suggestions: bool,
        detailed: bool,
    ) -> CheckResponse {
        self.check_hallucinations_with_cancel(
            script,
            script_path,
            ReportOptions {
                include_suggestions,
                detailed,
            },
            &CancellationToken::new(),
        )
    }

    pub fn check_hallucinations_with_cancel(
        &self,
        script: &str,
        script_path: &str,
        options: ReportOptions,
        cancel: &CancellationToken,
    ) -> CheckResponse {
        match self.run(script, script_path, options, cancel) {
            Ok(report) => CheckResponse::success(report),
            Err(failure) => {
                warn!(
                    script_path,
                    phase = failure.phase.as_str(),
                    "check failed: {}",
                    failure.error
                );
                CheckResponse::failure(script_path, &failure.error, failure.phase.as_str())
            }
        }
    }

    /// Read the script at `path` and check it.
    pub fn check_file(&self, path: &Path, options: ReportOptions) -> CheckResponse {
        let script_path = path.to_string_lossy();
        match std::fs::read_to_string(path) {
            Ok(script) => {
                let cancel = CancellationToken::new();
                self.check_hallucinations_with_cancel(&script, &script_path, options, &cancel)
            }
            Err(e) => {
                let error = GroundcheckError::Io(e);
                warn!("Could not read {script_path}: {error}");
                CheckResponse::failure(&script_path, &error, RequestPhase::Analyze.as_str())
            }
        }
    }

    /// The request state machine. Returns the report or the first fatal
    /// failure with its phase.
    pub fn run(
        &self,
        script: &str,
        script_path: &str,
        options: ReportOptions,
        cancel: &CancellationToken,
    ) -> Result<ValidationReport, RequestFailure> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RequestFailure::new(
                RequestPhase::Analyze,
                GroundcheckError::CollaboratorUnavailable("checker is closed".to_string()),
            ));
        }

        let analysis = analyze(script, script_path)
            .map_err(|e| RequestFailure::new(RequestPhase::Analyze, e))?;
        debug!(script_path, elements = analysis.elements().len(), "phase analyze done");
        cancel
            .check()
            .map_err(|e| RequestFailure::new(RequestPhase::Analyze, e))?;

        let (graph, semantic) = rayon::join(
            || self.graph.validate_script(&analysis, cancel),
            || self.semantic.validate_script(&analysis, cancel),
        );

        let graph = graph.map_err(|e| RequestFailure::new(RequestPhase::GraphValidate, e))?;
        let semantic = match semantic {
            Ok(outcome) => outcome,
            Err(GroundcheckError::Cancelled) => {
                return Err(RequestFailure::new(
                    RequestPhase::SemanticValidate,
                    GroundcheckError::Cancelled,
                ))
            }
            Err(other) => SemanticOutcome::degraded(other.to_string()),
        };
        if !semantic.available {
            info!(
                script_path,
                phase = RequestPhase::Degraded.as_str(),
                reason = semantic.error.as_deref().unwrap_or(""),
                "semantic branch unavailable"
            );
        }
        // A token fired after both branches finished still discards the work.
        cancel
            .check()
            .map_err(|e| RequestFailure::new(RequestPhase::Fuse, e))?;

        let fused = self.fusion.fuse(&graph, &semantic);
        debug!(
            script_path,
            overall = fused.overall_confidence,
            hallucinations = fused.hallucinations.len(),
            "phase fuse done"
        );

        let report =
            ReportBuilder::new(&self.fusion).build(&analysis, &graph, &semantic, fused, options);
        info!(
            script_path,
            confidence = report.overall_confidence(),
            hallucinations = report.overall_assessment.hallucination_count,
            "check complete"
        );
        Ok(report)
    }

    /// Close the collaborators and drop every cached lookup. Later checks
    /// return a failure envelope.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cache.clear();
        self.graph_store.close();
        if let Some(search) = &self.vector_search {
            search.close();
        }
        info!("hallucination checker closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_phases_are_the_fallible_states() {
        let phases = [
            RequestPhase::Analyze,
            RequestPhase::GraphValidate,
            RequestPhase::SemanticValidate,
            RequestPhase::Degraded,
            RequestPhase::Fuse,
        ];
        let names: Vec<_> = phases.iter().map(|p| p.as_str()).collect();
        assert_eq!(
            names,
            ["analyze", "graph_validate", "semantic_validate", "degraded", "fuse"]
        );
    }
}
