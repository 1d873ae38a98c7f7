//! Structural analysis of Python scripts.
//!
//! [`analyze`] parses a script with tree-sitter and walks the syntax tree once,
//! recording imports, definitions, calls, attribute accesses and assignments
//! in discovery order.

mod node;
mod parser;
mod scope;
mod visitor;

use tracing::{debug, warn};

use crate::errors::{GroundcheckError, GroundcheckResult};
use crate::models::{content_hash, AnalysisMetadata, AnalysisResult};

use self::parser::{parse_source, ParseFailure};
use self::visitor::Visitor;

/// Parse `script` into its structural model.
///
/// Returns [`GroundcheckError::Parse`] only when the text is not valid
/// Python. Internal faults are absorbed: the result is then empty and
/// `metadata.error` describes the fault.
pub fn analyze(script: &str, script_path: &str) -> GroundcheckResult<AnalysisResult> {
    let mut metadata = AnalysisMetadata {
        script_path: script_path.to_string(),
        total_lines: script.lines().count(),
        node_count: 0,
        content_hash: content_hash(script),
        error: None,
    };

    let tree = match parse_source(script) {
        Ok(tree) => tree,
        Err(ParseFailure::Syntax {
            line,
            column,
            message,
        }) => {
            return Err(GroundcheckError::Parse {
                line,
                column,
                message,
            })
        }
        Err(ParseFailure::Internal(message)) => {
            warn!("Analysis of {script_path} absorbed parser fault: {message}");
            return Ok(AnalysisResult::failed(metadata, message));
        }
    };

    match Visitor::new(script).run(tree.root_node()) {
        Ok((elements, node_count)) => {
            metadata.node_count = node_count;
            debug!(
                script_path,
                elements = elements.len(),
                node_count,
                "analyzed script"
            );
            Ok(AnalysisResult::new(metadata, elements))
        }
        Err(fault) => {
            warn!("Analysis of {script_path} absorbed visitor fault: {}", fault.0);
            Ok(AnalysisResult::failed(metadata, fault.0))
        }
    }
}
