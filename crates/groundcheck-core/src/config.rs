//! Tunable weights, baselines and thresholds for validation and fusion.
//!
//! Every constant is empirical. Defaults are the values the scoring model was
//! calibrated with; each one can be overridden through a `GROUNDCHECK_*`
//! environment variable.

// Fusion
pub const DEFAULT_GRAPH_WEIGHT: f64 = 0.6;
pub const DEFAULT_SEMANTIC_WEIGHT: f64 = 0.4;
pub const NEUTRAL_CONFIDENCE: f64 = 0.5;

// Graph existence baselines
pub const DEFAULT_CLASS_FOUND_CONFIDENCE: f64 = 0.8;
pub const DEFAULT_MEMBER_FOUND_CONFIDENCE: f64 = 0.7;
pub const DEFAULT_NOT_FOUND_CONFIDENCE: f64 = 0.2;
pub const DEFAULT_ATTRIBUTE_NOT_FOUND_CONFIDENCE: f64 = 0.3;

// Thresholds
pub const DEFAULT_HALLUCINATION_THRESHOLD: f64 = 0.5;
pub const DEFAULT_HIGH_SEVERITY_THRESHOLD: f64 = 0.3;
pub const DEFAULT_GROUNDED_SIMILARITY: f64 = 0.7;
pub const DEFAULT_HIGH_CONFIDENCE: f64 = 0.7;
pub const DEFAULT_VERY_HIGH_CONFIDENCE: f64 = 0.9;

// Semantic search
pub const DEFAULT_SEMANTIC_TOP_K: usize = 5;
pub const MAX_SEMANTIC_TOP_K: usize = 50;
pub const DEFAULT_SEMANTIC_MIN_SIMILARITY: f64 = 0.0;

// Concurrency
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;
pub const MAX_CONCURRENCY: usize = 64;

/// Weights, baselines and thresholds shared by the validators, the fusion
/// step and the report.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckerConfig {
    pub graph_weight: f64,
    pub semantic_weight: f64,
    /// Found modules and classes.
    pub class_found_confidence: f64,
    /// Found methods, functions and attributes.
    pub member_found_confidence: f64,
    pub not_found_confidence: f64,
    pub attribute_not_found_confidence: f64,
    /// Validations below this become hallucination candidates.
    pub hallucination_threshold: f64,
    /// Candidates below this are `high` severity.
    pub high_severity_threshold: f64,
    pub grounded_similarity: f64,
    pub high_confidence: f64,
    pub very_high_confidence: f64,
    pub semantic_top_k: usize,
    pub semantic_min_similarity: f64,
    pub semantic_enabled: bool,
    pub max_concurrency: usize,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            graph_weight: DEFAULT_GRAPH_WEIGHT,
            semantic_weight: DEFAULT_SEMANTIC_WEIGHT,
            class_found_confidence: DEFAULT_CLASS_FOUND_CONFIDENCE,
            member_found_confidence: DEFAULT_MEMBER_FOUND_CONFIDENCE,
            not_found_confidence: DEFAULT_NOT_FOUND_CONFIDENCE,
            attribute_not_found_confidence: DEFAULT_ATTRIBUTE_NOT_FOUND_CONFIDENCE,
            hallucination_threshold: DEFAULT_HALLUCINATION_THRESHOLD,
            high_severity_threshold: DEFAULT_HIGH_SEVERITY_THRESHOLD,
            grounded_similarity: DEFAULT_GROUNDED_SIMILARITY,
            high_confidence: DEFAULT_HIGH_CONFIDENCE,
            very_high_confidence: DEFAULT_VERY_HIGH_CONFIDENCE,
            semantic_top_k: DEFAULT_SEMANTIC_TOP_K,
            semantic_min_similarity: DEFAULT_SEMANTIC_MIN_SIMILARITY,
            semantic_enabled: true,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl CheckerConfig {
    /// Defaults overridden by any `GROUNDCHECK_*` variables present in the
    /// process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`CheckerConfig::from_env`] but reading from an arbitrary
    /// key lookup, so overrides can be supplied without touching the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let unit = |key: &str, fallback: f64| -> f64 {
            lookup(key)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .map(clamp_unit)
                .unwrap_or(fallback)
        };

        config.graph_weight = unit("GROUNDCHECK_GRAPH_WEIGHT", config.graph_weight);
        config.semantic_weight = unit("GROUNDCHECK_SEMANTIC_WEIGHT", config.semantic_weight);
        config.class_found_confidence =
            unit("GROUNDCHECK_CLASS_FOUND_CONFIDENCE", config.class_found_confidence);
        config.member_found_confidence =
            unit("GROUNDCHECK_MEMBER_FOUND_CONFIDENCE", config.member_found_confidence);
        config.not_found_confidence =
            unit("GROUNDCHECK_NOT_FOUND_CONFIDENCE", config.not_found_confidence).min(0.3);
        config.attribute_not_found_confidence = unit(
            "GROUNDCHECK_ATTRIBUTE_NOT_FOUND_CONFIDENCE",
            config.attribute_not_found_confidence,
        );
        config.hallucination_threshold =
            unit("GROUNDCHECK_HALLUCINATION_THRESHOLD", config.hallucination_threshold);
        config.high_severity_threshold =
            unit("GROUNDCHECK_HIGH_SEVERITY_THRESHOLD", config.high_severity_threshold);
        config.grounded_similarity =
            unit("GROUNDCHECK_GROUNDED_SIMILARITY", config.grounded_similarity);
        config.high_confidence = unit("GROUNDCHECK_HIGH_CONFIDENCE", config.high_confidence);
        config.very_high_confidence =
            unit("GROUNDCHECK_VERY_HIGH_CONFIDENCE", config.very_high_confidence);
        config.semantic_min_similarity =
            unit("GROUNDCHECK_SEMANTIC_MIN_SIMILARITY", config.semantic_min_similarity);

        if let Some(top_k) = lookup("GROUNDCHECK_SEMANTIC_TOP_K")
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            config.semantic_top_k = top_k.clamp(1, MAX_SEMANTIC_TOP_K);
        }
        if let Some(workers) = lookup("GROUNDCHECK_MAX_CONCURRENCY")
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            config.max_concurrency = workers.clamp(1, MAX_CONCURRENCY);
        }
        if let Some(flag) = lookup("GROUNDCHECK_SEMANTIC") {
            let v = flag.trim().to_lowercase();
            config.semantic_enabled = !matches!(v.as_str(), "0" | "false" | "no" | "off");
        }

        config
    }

    /// Severity of a hallucination candidate: `high` below the high-severity
    /// threshold, `medium` otherwise. Structural and semantic candidates share
    /// this rule.
    pub fn severity_for(&self, confidence: f64) -> crate::models::Severity {
        use crate::models::Severity;
        if confidence < self.high_severity_threshold {
            Severity::High
        } else {
            Severity::Medium
        }
    }
}

pub fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}
