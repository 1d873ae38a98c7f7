//! Fusion of graph and semantic validation into one confidence score and a
//! list of hallucinations.

use serde::Serialize;

use crate::config::{CheckerConfig, NEUTRAL_CONFIDENCE};
use crate::models::{Hallucination, HallucinationSource};
use crate::validation::{GraphOutcome, SemanticOutcome};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Assessment {
    VeryHighConfidence,
    HighConfidence,
    MediumConfidence,
    LowConfidence,
}

impl Assessment {
    pub fn as_str(self) -> &'static str {
        match self {
            Assessment::VeryHighConfidence => "very_high_confidence",
            Assessment::HighConfidence => "high_confidence",
            Assessment::MediumConfidence => "medium_confidence",
            Assessment::LowConfidence => "low_confidence",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FusionOutcome {
    pub overall_confidence: f64,
    /// `None` when the graph branch produced no validations.
    pub graph_mean: Option<f64>,
    /// `None` when the semantic branch was unavailable or empty.
    pub semantic_mean: Option<f64>,
    pub hallucinations: Vec<Hallucination>,
}

pub struct ConfidenceFusion {
    config: CheckerConfig,
}

pub fn mean<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

impl ConfidenceFusion {
    pub fn new(config: CheckerConfig) -> Self {
        Self { config }
    }

    pub fn fuse(&self, graph: &GraphOutcome, semantic: &SemanticOutcome) -> FusionOutcome {
        let graph_mean = mean(graph.confidences());
        let semantic_mean = if semantic.available {
            mean(semantic.confidences())
        } else {
            None
        };

        let weighted = self.config.graph_weight * graph_mean.unwrap_or(NEUTRAL_CONFIDENCE)
            + self.config.semantic_weight * semantic_mean.unwrap_or(NEUTRAL_CONFIDENCE);
        let total_weight = self.config.graph_weight + self.config.semantic_weight;
        let overall = if total_weight > 0.0 {
            weighted / total_weight
        } else {
            NEUTRAL_CONFIDENCE
        };

        FusionOutcome {
            overall_confidence: overall.clamp(0.0, 1.0),
            graph_mean,
            semantic_mean,
            hallucinations: self.hallucinations(graph, semantic),
        }
    }

    /// Low-confidence graph validations and weakly grounded semantic results,
    /// ordered by the element they refer to.
    fn hallucinations(&self, graph: &GraphOutcome, semantic: &SemanticOutcome) -> Vec<Hallucination> {
        let structural = graph
            .validations
            .iter()
            .filter(|v| v.result.confidence < self.config.hallucination_threshold)
            .map(|v| Hallucination {
                source: HallucinationSource::Structural,
                category: v.kind.as_str().to_string(),
                element: v.element.clone(),
                confidence: v.result.confidence,
                severity: self.config.severity_for(v.result.confidence),
                description: v.result.message.clone(),
                suggestion: v.result.suggestions.first().cloned(),
            });

        let weak = semantic
            .results
            .iter()
            .filter(|r| semantic.available && r.example_count > 0 && !r.grounded)
            .map(|r| {
                let similarity = r.mean_similarity.unwrap_or(r.result.confidence);
                Hallucination {
                    source: HallucinationSource::Semantic,
                    category: r.element.kind.as_str().to_string(),
                    element: r.element.clone(),
                    confidence: similarity,
                    severity: self.config.severity_for(similarity),
                    description: r.result.message.clone(),
                    suggestion: r.result.suggestions.first().cloned(),
                }
            });

        let mut all: Vec<Hallucination> = structural.chain(weak).collect();
        // Stable: structural findings stay ahead of semantic ones per element.
        all.sort_by_key(|h| h.element.index);
        all
    }

    pub fn classify(&self, overall: f64) -> (Assessment, RiskLevel) {
        if overall >= self.config.very_high_confidence {
            (Assessment::VeryHighConfidence, RiskLevel::Low)
        } else if overall >= self.config.high_confidence {
            (Assessment::HighConfidence, RiskLevel::Low)
        } else if overall >= self.config.hallucination_threshold {
            (Assessment::MediumConfidence, RiskLevel::Medium)
        } else {
            (Assessment::LowConfidence, RiskLevel::High)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ElementKind, ElementRef, ElementValidation, Severity, ValidationKind, ValidationResult,
        ValidationStatus,
    };
    use crate::validation::SemanticElementResult;

    fn element(index: usize) -> ElementRef {
        ElementRef {
            index,
            kind: ElementKind::MethodCall,
            name: format!("e{index}"),
            line: index + 1,
        }
    }

    fn graph(confidences: &[f64]) -> GraphOutcome {
        GraphOutcome {
            validations: confidences
                .iter()
                .enumerate()
                .map(|(i, c)| ElementValidation {
                    element: element(i),
                    kind: ValidationKind::MethodCall,
                    target: format!("acme.T{i}"),
                    result: ValidationResult::new(ValidationStatus::NotFound, *c, "not found"),
                    repositories: Vec::new(),
                })
                .collect(),
            skipped: 0,
        }
    }

    fn semantic(means: &[(usize, f64, bool)]) -> SemanticOutcome {
        SemanticOutcome {
            available: true,
            results: means
                .iter()
                .map(|(i, m, grounded)| SemanticElementResult {
                    element: element(*i),
                    query: "q".into(),
                    result: ValidationResult::new(ValidationStatus::Uncertain, *m, "weak"),
                    example_count: 2,
                    best_similarity: Some(*m),
                    mean_similarity: Some(*m),
                    grounded: *grounded,
                    top_example: None,
                })
                .collect(),
            error: None,
        }
    }

    fn fusion() -> ConfidenceFusion {
        ConfidenceFusion::new(CheckerConfig::default())
    }

    #[test]
    fn empty_sides_are_neutral() {
        let out = fusion().fuse(&GraphOutcome::default(), &SemanticOutcome::degraded("off"));
        assert_eq!(out.overall_confidence, 0.5);
        assert!(out.hallucinations.is_empty());
        assert_eq!(out.graph_mean, None);
        assert_eq!(out.semantic_mean, None);
    }

    #[test]
    fn degraded_semantic_contributes_neutral() {
        let g = graph(&[0.8, 0.7, 0.2]);
        let out = fusion().fuse(&g, &SemanticOutcome::degraded("down"));
        let graph_mean = (0.8 + 0.7 + 0.2) / 3.0;
        assert!((out.overall_confidence - (0.6 * graph_mean + 0.2)).abs() < 1e-9);
    }

    #[test]
    fn raising_a_graph_confidence_never_lowers_overall() {
        let s = semantic(&[(0, 0.6, false)]);
        let low = fusion().fuse(&graph(&[0.2, 0.7]), &s);
        let high = fusion().fuse(&graph(&[0.6, 0.7]), &s);
        assert!(high.overall_confidence >= low.overall_confidence);
    }

    #[test]
    fn hallucinations_are_severity_bucketed_and_ordered() {
        let g = graph(&[0.2, 0.9, 0.4]);
        let s = semantic(&[(0, 0.2, false), (1, 0.8, true), (1, 0.6, false)]);
        let out = fusion().fuse(&g, &s);

        let summary: Vec<_> = out
            .hallucinations
            .iter()
            .map(|h| (h.element.index, h.source, h.severity))
            .collect();
        assert_eq!(
            summary,
            vec![
                (0, HallucinationSource::Structural, Severity::High),
                (0, HallucinationSource::Semantic, Severity::High),
                (1, HallucinationSource::Semantic, Severity::Medium),
                (2, HallucinationSource::Structural, Severity::Medium),
            ]
        );
    }

    #[test]
    fn risk_classification() {
        let f = fusion();
        assert_eq!(f.classify(0.95), (Assessment::VeryHighConfidence, RiskLevel::Low));
        assert_eq!(f.classify(0.75), (Assessment::HighConfidence, RiskLevel::Low));
        assert_eq!(f.classify(0.5), (Assessment::MediumConfidence, RiskLevel::Medium));
        assert_eq!(f.classify(0.32), (Assessment::LowConfidence, RiskLevel::High));
    }
}
