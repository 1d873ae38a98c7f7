//! Assembly of the serializable validation report and response envelopes.

use indexmap::IndexSet;
use serde::Serialize;

use crate::fusion::{Assessment, ConfidenceFusion, FusionOutcome, RiskLevel};
use crate::models::{
    AnalysisResult, ClassDefElement, ElementCounts, FunctionDefElement, Hallucination,
    ImportElement, Severity, StructuralElement, ValidationStatus, VariableAssignElement,
};
use crate::validation::{GraphOutcome, SemanticOutcome};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OverallAssessment {
    pub confidence_score: f64,
    pub assessment: Assessment,
    pub risk_level: RiskLevel,
    pub hallucination_count: usize,
    pub critical_issues: usize,
    pub moderate_issues: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct HallucinationBuckets {
    pub critical: Vec<Hallucination>,
    pub moderate: Vec<Hallucination>,
    pub all: Vec<Hallucination>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportMetadata {
    pub total_lines: usize,
    pub node_count: usize,
    pub content_hash: String,
    pub element_counts: ElementCounts,
    pub graph_validations: usize,
    pub skipped_elements: usize,
    pub semantic_validations: usize,
    pub semantic_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_error: Option<String>,
}

/// Definitions and imports of the script, for detailed reports.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ScriptStructure {
    pub imports: Vec<ImportElement>,
    pub classes: Vec<ClassDefElement>,
    pub functions: Vec<FunctionDefElement>,
    pub variables: Vec<VariableAssignElement>,
    pub usages: Vec<StructuralElement>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetailedValidation {
    pub graph_results: GraphOutcome,
    pub semantic_results: SemanticOutcome,
    pub script_structure: ScriptStructure,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValidationReport {
    pub script_path: String,
    pub overall_assessment: OverallAssessment,
    pub hallucinations: HallucinationBuckets,
    pub suggestions: Vec<String>,
    pub analysis_metadata: ReportMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_validation: Option<DetailedValidation>,
}

impl ValidationReport {
    pub fn overall_confidence(&self) -> f64 {
        self.overall_assessment.confidence_score
    }
}

/// Response of one check: the report, or why the request failed.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CheckResponse {
    Success {
        success: bool,
        #[serde(flatten)]
        report: Box<ValidationReport>,
    },
    Failure {
        success: bool,
        script_path: String,
        error: String,
        error_kind: String,
        phase: String,
    },
}

impl CheckResponse {
    pub fn success(report: ValidationReport) -> Self {
        CheckResponse::Success {
            success: true,
            report: Box::new(report),
        }
    }

    pub fn failure(script_path: &str, error: &crate::errors::GroundcheckError, phase: &str) -> Self {
        CheckResponse::Failure {
            success: false,
            script_path: script_path.to_string(),
            error: error.to_string(),
            error_kind: error.kind().to_string(),
            phase: phase.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CheckResponse::Success { .. })
    }

    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            CheckResponse::Success { report, .. } => Some(&**report),
            CheckResponse::Failure { .. } => None,
        }
    }

    pub fn to_json(&self) -> crate::errors::GroundcheckResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Options controlling what a report carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportOptions {
    pub include_suggestions: bool,
    pub detailed: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            include_suggestions: true,
            detailed: false,
        }
    }
}

pub struct ReportBuilder<'a> {
    fusion: &'a ConfidenceFusion,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(fusion: &'a ConfidenceFusion) -> Self {
        Self { fusion }
    }

    pub fn build(
        &self,
        analysis: &AnalysisResult,
        graph: &GraphOutcome,
        semantic: &SemanticOutcome,
        fused: FusionOutcome,
        options: ReportOptions,
    ) -> ValidationReport {
        let (assessment, risk_level) = self.fusion.classify(fused.overall_confidence);

        let mut all = fused.hallucinations;
        if !options.include_suggestions {
            for hallucination in &mut all {
                hallucination.suggestion = None;
            }
        }
        let critical: Vec<Hallucination> = all
            .iter()
            .filter(|h| h.severity == Severity::High)
            .cloned()
            .collect();
        let moderate: Vec<Hallucination> = all
            .iter()
            .filter(|h| h.severity == Severity::Medium)
            .cloned()
            .collect();

        let suggestions = if options.include_suggestions {
            collect_suggestions(graph, &all)
        } else {
            Vec::new()
        };

        let metadata = &analysis.metadata;
        let analysis_metadata = ReportMetadata {
            total_lines: metadata.total_lines,
            node_count: metadata.node_count,
            content_hash: metadata.content_hash.clone(),
            element_counts: analysis.counts(),
            graph_validations: graph.validations.len(),
            skipped_elements: graph.skipped,
            semantic_validations: semantic.results.len(),
            semantic_available: semantic.available,
            graph_confidence: fused.graph_mean,
            semantic_confidence: fused.semantic_mean,
            semantic_error: semantic.error.clone(),
            analysis_error: metadata.error.clone(),
        };

        let detailed_validation = options.detailed.then(|| DetailedValidation {
            graph_results: graph.clone(),
            semantic_results: semantic.clone(),
            script_structure: script_structure(analysis),
        });

        ValidationReport {
            script_path: metadata.script_path.clone(),
            overall_assessment: OverallAssessment {
                confidence_score: fused.overall_confidence,
                assessment,
                risk_level,
                hallucination_count: all.len(),
                critical_issues: critical.len(),
                moderate_issues: moderate.len(),
            },
            hallucinations: HallucinationBuckets {
                critical,
                moderate,
                all,
            },
            suggestions,
            analysis_metadata,
            detailed_validation,
        }
    }
}

/// Suggestions from failed graph validations and from hallucinations, first
/// occurrence wins.
fn collect_suggestions(graph: &GraphOutcome, hallucinations: &[Hallucination]) -> Vec<String> {
    let mut seen: IndexSet<String> = IndexSet::new();
    for validation in &graph.validations {
        if validation.result.status != ValidationStatus::Valid {
            seen.extend(validation.result.suggestions.iter().cloned());
        }
    }
    seen.extend(hallucinations.iter().filter_map(|h| h.suggestion.clone()));
    seen.into_iter().collect()
}

fn script_structure(analysis: &AnalysisResult) -> ScriptStructure {
    ScriptStructure {
        imports: analysis.imports().cloned().collect(),
        classes: analysis.classes().cloned().collect(),
        functions: analysis.function_defs().cloned().collect(),
        variables: analysis.variable_assigns().cloned().collect(),
        usages: analysis
            .elements()
            .iter()
            .filter(|e| e.is_usage() && !matches!(e, StructuralElement::Import(_)))
            .cloned()
            .collect(),
    }
}
