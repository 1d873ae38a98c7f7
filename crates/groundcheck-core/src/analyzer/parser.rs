//! Python parsing via native tree-sitter.

use tree_sitter::{Node, Parser, Tree};

use crate::analyzer::node::line_of;

/// Why a script could not be turned into a syntax tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParseFailure {
    /// The text is not valid Python.
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
    /// The parser itself failed; not the script's fault.
    Internal(String),
}

pub(crate) fn python_parser() -> Result<Parser, String> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| format!("Failed to set language: {e}"))?;
    Ok(parser)
}

/// Parse a script, rejecting any tree that contains error or missing nodes.
pub(crate) fn parse_source(source: &str) -> Result<Tree, ParseFailure> {
    let mut parser = python_parser().map_err(ParseFailure::Internal)?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| ParseFailure::Internal("parser produced no tree".to_string()))?;

    let root = tree.root_node();
    if root.has_error() {
        let (line, column, message) = first_error(root)
            .unwrap_or_else(|| (1, 1, "invalid syntax".to_string()));
        return Err(ParseFailure::Syntax {
            line,
            column,
            message,
        });
    }
    Ok(tree)
}

/// Locate the first error or missing node in document order.
fn first_error(node: Node<'_>) -> Option<(usize, usize, String)> {
    if node.is_missing() {
        return Some((
            line_of(node),
            node.start_position().column + 1,
            format!("missing '{}'", node.kind()),
        ));
    }
    if node.is_error() {
        return Some((
            line_of(node),
            node.start_position().column + 1,
            "invalid syntax".to_string(),
        ));
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() {
            if let Some(found) = first_error(child) {
                return Some(found);
            }
        }
    }
    None
}
