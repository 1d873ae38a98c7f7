//! Similarity grounding of script usages against indexed code examples.

use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{CheckerConfig, NEUTRAL_CONFIDENCE};
use crate::errors::{CollaboratorError, GroundcheckError, GroundcheckResult};
use crate::models::{AnalysisResult, ElementRef, StructuralElement, ValidationResult, ValidationStatus};
use crate::validation::collaborators::{CancellationToken, SearchHit, VectorSearch};

const EXAMPLE_PREVIEW_CHARS: usize = 200;

/// Semantic grounding of one element.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SemanticElementResult {
    pub element: ElementRef,
    pub query: String,
    pub result: ValidationResult,
    pub example_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_similarity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_similarity: Option<f64>,
    pub grounded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_example: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SemanticOutcome {
    pub available: bool,
    pub results: Vec<SemanticElementResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SemanticOutcome {
    /// Outcome of a branch whose collaborator could not be used.
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            results: Vec::new(),
            error: Some(reason.into()),
        }
    }

    pub fn confidences(&self) -> impl Iterator<Item = f64> + '_ {
        self.results.iter().map(|r| r.result.confidence)
    }
}

pub struct SemanticValidator {
    search: Option<Arc<dyn VectorSearch>>,
    config: CheckerConfig,
    pool: Option<rayon::ThreadPool>,
}

/// Query text for an element, or `None` for elements that are not usages.
pub fn build_query(element: &StructuralElement) -> Option<String> {
    match element {
        StructuralElement::Import(import) => Some(format!("{} import usage example", import.module)),
        StructuralElement::FunctionCall(call) => Some(format!("{} function call example", call.name)),
        StructuralElement::MethodCall(call) => {
            Some(format!("{} method call example", call.method_name))
        }
        StructuralElement::AttributeAccess(access) => {
            Some(format!("{} attribute usage example", access.attr_name))
        }
        StructuralElement::ClassDef(_)
        | StructuralElement::FunctionDef(_)
        | StructuralElement::VariableAssign(_) => None,
    }
}

impl SemanticValidator {
    /// `search` is `None` when no example index is configured; the branch
    /// then always reports itself unavailable.
    pub fn new(search: Option<Arc<dyn VectorSearch>>, config: CheckerConfig) -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_concurrency.max(1))
            .thread_name(|i| format!("groundcheck-semantic-{i}"))
            .build();
        let pool = match pool {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!("Semantic validator falling back to sequential search: {e}");
                None
            }
        };
        Self {
            search,
            config,
            pool,
        }
    }

    /// Ground every usage element of `analysis`.
    ///
    /// An unreachable collaborator never fails the call: the outcome is
    /// returned with `available == false`. Only cancellation is an error.
    pub fn validate_script(
        &self,
        analysis: &AnalysisResult,
        cancel: &CancellationToken,
    ) -> GroundcheckResult<SemanticOutcome> {
        let Some(search) = self.search.as_deref() else {
            return Ok(SemanticOutcome::degraded("no example index configured"));
        };
        if !self.config.semantic_enabled {
            return Ok(SemanticOutcome::degraded("semantic validation disabled"));
        }

        let jobs: Vec<(ElementRef, String)> = analysis
            .elements()
            .iter()
            .enumerate()
            .filter_map(|(index, element)| {
                let query = build_query(element)?;
                Some((analysis.element_ref(index)?, query))
            })
            .collect();
        debug!(queries = jobs.len(), "semantic validation planned");

        let run = |(element, query): &(ElementRef, String)| {
            self.validate_element(search, element.clone(), query, cancel)
        };
        let results = match &self.pool {
            Some(pool) => pool.install(|| {
                jobs.par_iter()
                    .map(run)
                    .collect::<GroundcheckResult<Vec<_>>>()
            }),
            None => jobs.iter().map(run).collect::<GroundcheckResult<Vec<_>>>(),
        };

        match results {
            Ok(results) => Ok(SemanticOutcome {
                available: true,
                results,
                error: None,
            }),
            Err(GroundcheckError::CollaboratorDegraded(reason)) => {
                warn!("Semantic validation degraded: {reason}");
                Ok(SemanticOutcome::degraded(reason))
            }
            Err(other) => Err(other),
        }
    }

    fn validate_element(
        &self,
        search: &dyn VectorSearch,
        element: ElementRef,
        query: &str,
        cancel: &CancellationToken,
    ) -> GroundcheckResult<SemanticElementResult> {
        cancel.check()?;
        match search.search(
            query,
            self.config.semantic_top_k,
            self.config.semantic_min_similarity,
        ) {
            Ok(hits) => Ok(self.classify(element, query, hits)),
            Err(CollaboratorError::Malformed(message)) => {
                warn!("Malformed search answer for '{query}': {message}");
                Ok(malformed(element, query, message))
            }
            Err(CollaboratorError::Unavailable(message)) => {
                Err(GroundcheckError::CollaboratorDegraded(message))
            }
        }
    }

    /// Turn the examples retrieved for one element into its grounding result.
    pub fn classify(
        &self,
        element: ElementRef,
        query: &str,
        hits: Vec<SearchHit>,
    ) -> SemanticElementResult {
        if let Some(bad) = hits
            .iter()
            .find(|hit| !hit.similarity.is_finite() || !(0.0..=1.0).contains(&hit.similarity))
        {
            return malformed(
                element,
                query,
                format!("similarity {} outside [0, 1]", bad.similarity),
            );
        }

        if hits.is_empty() {
            return SemanticElementResult {
                element,
                query: query.to_string(),
                result: ValidationResult::new(
                    ValidationStatus::Uncertain,
                    NEUTRAL_CONFIDENCE,
                    "No similar code examples found",
                ),
                example_count: 0,
                best_similarity: None,
                mean_similarity: None,
                grounded: false,
                top_example: None,
            };
        }

        let best = hits
            .iter()
            .max_by(|a, b| a.similarity.total_cmp(&b.similarity))
            .map(|hit| (hit.similarity, hit.content.as_str()));
        let mean = hits.iter().map(|hit| hit.similarity).sum::<f64>() / hits.len() as f64;
        let (best_similarity, top_content) = best.unwrap_or((mean, ""));
        let grounded = best_similarity >= self.config.grounded_similarity;

        let result = if grounded {
            ValidationResult::new(
                ValidationStatus::Valid,
                best_similarity,
                format!("Grounded by {} similar code example(s)", hits.len()),
            )
        } else {
            ValidationResult::new(
                ValidationStatus::Uncertain,
                mean,
                format!(
                    "{} example(s) found, none similar enough (best {best_similarity:.2})",
                    hits.len()
                ),
            )
            .with_suggestion(format!(
                "No close usage example for '{}'; check the documentation",
                element.name
            ))
        };

        SemanticElementResult {
            element,
            query: query.to_string(),
            result: result
                .with_detail("example_count", hits.len())
                .with_detail("best_similarity", best_similarity)
                .with_detail("mean_similarity", mean),
            example_count: hits.len(),
            best_similarity: Some(best_similarity),
            mean_similarity: Some(mean),
            grounded,
            top_example: Some(preview(top_content)),
        }
    }
}

fn malformed(element: ElementRef, query: &str, message: String) -> SemanticElementResult {
    SemanticElementResult {
        element,
        query: query.to_string(),
        result: ValidationResult::new(
            ValidationStatus::Uncertain,
            NEUTRAL_CONFIDENCE,
            "Malformed example search response",
        )
        .with_detail("error", message),
        example_count: 0,
        best_similarity: None,
        mean_similarity: None,
        grounded: false,
        top_example: None,
    }
}

fn preview(content: &str) -> String {
    match content.char_indices().nth(EXAMPLE_PREVIEW_CHARS) {
        Some((end, _)) => format!("{}...", &content[..end]),
        None => content.to_string(),
    }
}
