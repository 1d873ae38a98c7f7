//! Closed enumeration of the tree-sitter Python node kinds the analyzer cares
//! about. Dispatch matches on this enum rather than on kind strings.

use tree_sitter::Node;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NodeKind {
    // Statements
    ImportStatement,
    ImportFromStatement,
    FutureImportStatement,
    ClassDefinition,
    FunctionDefinition,
    DecoratedDefinition,
    Assignment,

    // Expressions
    Call,
    Attribute,
    Identifier,
    Subscript,
    Parenthesized,
    Await,

    // Import parts
    DottedName,
    AliasedImport,
    RelativeImport,
    WildcardImport,

    // Call arguments
    ArgumentList,
    KeywordArgument,
    ListSplat,
    DictionarySplat,
    GeneratorExpression,

    // Parameters
    TypedParameter,
    DefaultParameter,
    TypedDefaultParameter,
    ListSplatPattern,
    DictionarySplatPattern,

    // Literals
    String,
    ConcatenatedString,
    Integer,
    Float,
    True,
    False,
    None,
    List,
    ListComprehension,
    Dictionary,
    DictionaryComprehension,
    Tuple,
    Set,
    SetComprehension,
    UnaryOperator,

    Comment,
    Other,
}

impl NodeKind {
    pub(crate) fn from_kind(kind: &str) -> Self {
        match kind {
            "import_statement" => NodeKind::ImportStatement,
            "import_from_statement" => NodeKind::ImportFromStatement,
            "future_import_statement" => NodeKind::FutureImportStatement,
            "class_definition" => NodeKind::ClassDefinition,
            "function_definition" => NodeKind::FunctionDefinition,
            "decorated_definition" => NodeKind::DecoratedDefinition,
            "assignment" => NodeKind::Assignment,
            "call" => NodeKind::Call,
            "attribute" => NodeKind::Attribute,
            "identifier" => NodeKind::Identifier,
            "subscript" => NodeKind::Subscript,
            "parenthesized_expression" => NodeKind::Parenthesized,
            "await" => NodeKind::Await,
            "dotted_name" => NodeKind::DottedName,
            "aliased_import" => NodeKind::AliasedImport,
            "relative_import" => NodeKind::RelativeImport,
            "wildcard_import" => NodeKind::WildcardImport,
            "argument_list" => NodeKind::ArgumentList,
            "keyword_argument" => NodeKind::KeywordArgument,
            "list_splat" => NodeKind::ListSplat,
            "dictionary_splat" => NodeKind::DictionarySplat,
            "generator_expression" => NodeKind::GeneratorExpression,
            "typed_parameter" => NodeKind::TypedParameter,
            "default_parameter" => NodeKind::DefaultParameter,
            "typed_default_parameter" => NodeKind::TypedDefaultParameter,
            "list_splat_pattern" => NodeKind::ListSplatPattern,
            "dictionary_splat_pattern" => NodeKind::DictionarySplatPattern,
            "string" => NodeKind::String,
            "concatenated_string" => NodeKind::ConcatenatedString,
            "integer" => NodeKind::Integer,
            "float" => NodeKind::Float,
            "true" => NodeKind::True,
            "false" => NodeKind::False,
            "none" => NodeKind::None,
            "list" => NodeKind::List,
            "list_comprehension" => NodeKind::ListComprehension,
            "dictionary" => NodeKind::Dictionary,
            "dictionary_comprehension" => NodeKind::DictionaryComprehension,
            "tuple" => NodeKind::Tuple,
            "set" => NodeKind::Set,
            "set_comprehension" => NodeKind::SetComprehension,
            "unary_operator" => NodeKind::UnaryOperator,
            "comment" => NodeKind::Comment,
            _ => NodeKind::Other,
        }
    }

    pub(crate) fn of(node: Node<'_>) -> Self {
        Self::from_kind(node.kind())
    }
}

/// 1-based line of a node.
pub(crate) fn line_of(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_kinds_map_to_other() {
        assert_eq!(NodeKind::from_kind("while_statement"), NodeKind::Other);
        assert_eq!(NodeKind::from_kind("lambda"), NodeKind::Other);
    }

    #[test]
    fn statement_kinds_are_recognised() {
        assert_eq!(NodeKind::from_kind("call"), NodeKind::Call);
        assert_eq!(
            NodeKind::from_kind("import_from_statement"),
            NodeKind::ImportFromStatement
        );
        assert_eq!(NodeKind::from_kind("none"), NodeKind::None);
    }
}
