//! Single-pass syntax tree visitor producing structural elements.

use tree_sitter::Node;

use crate::analyzer::node::{line_of, NodeKind};
use crate::analyzer::scope::{Frame, Scope};
use crate::models::{
    ArgKind, AttributeAccessElement, CallArguments, ClassDefElement, FunctionCallElement,
    FunctionDefElement, ImportElement, KeywordArg, MethodCallElement, StructuralElement,
    VariableAssignElement,
};

/// Internal fault raised while walking a tree that parsed cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VisitFault(pub String);

type VisitResult<T = ()> = Result<T, VisitFault>;

/// How the parent uses a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Role {
    Plain,
    /// The `function` child of a call.
    Callee,
}

pub(crate) struct Visitor<'src> {
    source: &'src str,
    elements: Vec<StructuralElement>,
    node_count: usize,
}

impl<'src> Visitor<'src> {
    pub(crate) fn new(source: &'src str) -> Self {
        Self {
            source,
            elements: Vec::new(),
            node_count: 0,
        }
    }

    pub(crate) fn run(mut self, root: Node<'_>) -> VisitResult<(Vec<StructuralElement>, usize)> {
        self.visit(root, Scope::root(), Role::Plain)?;
        Ok((self.elements, self.node_count))
    }

    fn text(&self, node: Node<'_>) -> VisitResult<&'src str> {
        self.source.get(node.byte_range()).ok_or_else(|| {
            VisitFault(format!(
                "{} node at line {} has no readable text",
                node.kind(),
                line_of(node)
            ))
        })
    }

    fn field_text(&self, node: Node<'_>, field: &str) -> VisitResult<&'src str> {
        let child = node.child_by_field_name(field).ok_or_else(|| {
            VisitFault(format!(
                "{} node at line {} lacks field '{field}'",
                node.kind(),
                line_of(node)
            ))
        })?;
        self.text(child)
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    fn visit(&mut self, node: Node<'_>, scope: Scope<'_>, role: Role) -> VisitResult {
        if node.is_named() {
            self.node_count += 1;
        }
        match NodeKind::of(node) {
            NodeKind::ImportStatement => self.visit_import(node)?,
            NodeKind::ImportFromStatement | NodeKind::FutureImportStatement => {
                self.visit_import_from(node)?
            }
            NodeKind::ClassDefinition => return self.visit_class(node, scope),
            NodeKind::FunctionDefinition => return self.visit_function(node, scope),
            NodeKind::Call => {
                self.visit_call(node)?;
                return self.visit_call_children(node, scope);
            }
            NodeKind::Attribute => {
                if role == Role::Plain {
                    self.visit_attribute(node)?;
                }
            }
            NodeKind::Assignment => self.visit_assignment(node)?,
            _ => {}
        }
        self.visit_children(node, scope)
    }

    fn visit_children(&mut self, node: Node<'_>, scope: Scope<'_>) -> VisitResult {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child, scope, Role::Plain)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Imports
    // -----------------------------------------------------------------------

    fn visit_import(&mut self, node: Node<'_>) -> VisitResult {
        let line = line_of(node);
        let mut cursor = node.walk();
        for child in node.children_by_field_name("name", &mut cursor) {
            let (module, alias) = self.import_target(child)?;
            self.elements.push(StructuralElement::Import(ImportElement {
                module,
                name: None,
                alias,
                line,
            }));
        }
        Ok(())
    }

    fn visit_import_from(&mut self, node: Node<'_>) -> VisitResult {
        let line = line_of(node);
        let module = match node.child_by_field_name("module_name") {
            Some(module_node) => self.text(module_node)?.to_string(),
            // `from __future__ import x` has no module_name field.
            None => "__future__".to_string(),
        };

        let mut cursor = node.walk();
        let names: Vec<Node<'_>> = node.children_by_field_name("name", &mut cursor).collect();
        for child in names {
            let (name, alias) = self.import_target(child)?;
            self.elements.push(StructuralElement::Import(ImportElement {
                module: module.clone(),
                name: Some(name),
                alias,
                line,
            }));
        }

        let mut cursor = node.walk();
        let wildcard = node
            .children(&mut cursor)
            .any(|child| NodeKind::of(child) == NodeKind::WildcardImport);
        if wildcard {
            self.elements.push(StructuralElement::Import(ImportElement {
                module,
                name: Some("*".to_string()),
                alias: None,
                line,
            }));
        }
        Ok(())
    }

    /// `(name, alias)` for a `dotted_name` or `aliased_import` node.
    fn import_target(&self, node: Node<'_>) -> VisitResult<(String, Option<String>)> {
        match NodeKind::of(node) {
            NodeKind::AliasedImport => {
                let name = self.field_text(node, "name")?.to_string();
                let alias = self.field_text(node, "alias")?.to_string();
                Ok((name, Some(alias)))
            }
            _ => Ok((self.text(node)?.to_string(), None)),
        }
    }

    // -----------------------------------------------------------------------
    // Definitions
    // -----------------------------------------------------------------------

    fn visit_class(&mut self, node: Node<'_>, scope: Scope<'_>) -> VisitResult {
        let name = self.field_text(node, "name")?;

        let mut bases = Vec::new();
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            for base in superclasses.named_children(&mut cursor) {
                if let Some(dotted) = self.dotted_name(base)? {
                    bases.push(dotted);
                }
            }
        }

        let body = node.child_by_field_name("body");
        let mut method_names = Vec::new();
        if let Some(body) = body {
            let mut cursor = body.walk();
            for statement in body.named_children(&mut cursor) {
                let definition = match NodeKind::of(statement) {
                    NodeKind::DecoratedDefinition => statement.child_by_field_name("definition"),
                    _ => Some(statement),
                };
                if let Some(def) = definition {
                    if NodeKind::of(def) == NodeKind::FunctionDefinition {
                        method_names.push(self.field_text(def, "name")?.to_string());
                    }
                }
            }
        }

        self.elements.push(StructuralElement::ClassDef(ClassDefElement {
            name: name.to_string(),
            bases,
            method_names,
            line: line_of(node),
        }));

        let class_scope = scope.enter(Frame::Class(name));
        let body_id = body.map(|b| b.id());
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if Some(child.id()) == body_id {
                self.visit(child, class_scope, Role::Plain)?;
            } else {
                self.visit(child, scope, Role::Plain)?;
            }
        }
        Ok(())
    }

    fn visit_function(&mut self, node: Node<'_>, scope: Scope<'_>) -> VisitResult {
        let name = self.field_text(node, "name")?;

        let mut args = Vec::new();
        if let Some(parameters) = node.child_by_field_name("parameters") {
            let mut cursor = parameters.walk();
            for parameter in parameters.named_children(&mut cursor) {
                if let Some(arg) = self.parameter_name(parameter)? {
                    args.push(arg);
                }
            }
        }

        let mut cursor = node.walk();
        let is_async = node.children(&mut cursor).any(|child| child.kind() == "async");

        let class_name = scope
            .enclosing_class()
            .map(|_| scope.path().join("."));

        self.elements.push(StructuralElement::FunctionDef(FunctionDefElement {
            name: name.to_string(),
            args,
            class_name,
            is_async,
            line: line_of(node),
        }));

        let function_scope = scope.enter(Frame::Function(name));
        let body_id = node.child_by_field_name("body").map(|b| b.id());
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if Some(child.id()) == body_id {
                self.visit(child, function_scope, Role::Plain)?;
            } else {
                self.visit(child, scope, Role::Plain)?;
            }
        }
        Ok(())
    }

    fn parameter_name(&self, node: Node<'_>) -> VisitResult<Option<String>> {
        let name = match NodeKind::of(node) {
            NodeKind::Identifier | NodeKind::ListSplatPattern | NodeKind::DictionarySplatPattern => {
                Some(self.text(node)?)
            }
            NodeKind::TypedParameter => {
                let mut cursor = node.walk();
                let inner = node.named_children(&mut cursor).find(|child| {
                    matches!(
                        NodeKind::of(*child),
                        NodeKind::Identifier
                            | NodeKind::ListSplatPattern
                            | NodeKind::DictionarySplatPattern
                    )
                });
                match inner {
                    Some(inner) => Some(self.text(inner)?),
                    None => None,
                }
            }
            NodeKind::DefaultParameter | NodeKind::TypedDefaultParameter => {
                Some(self.field_text(node, "name")?)
            }
            _ => None,
        };
        Ok(name.map(str::to_string))
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn visit_call(&mut self, node: Node<'_>) -> VisitResult {
        let line = line_of(node);
        let function = node.child_by_field_name("function").ok_or_else(|| {
            VisitFault(format!("call at line {line} has no callee"))
        })?;
        let (arguments, arg_count, kwarg_count) =
            self.call_arguments(node.child_by_field_name("arguments"))?;

        let element = match NodeKind::of(function) {
            NodeKind::Attribute => {
                let object = function.child_by_field_name("object").ok_or_else(|| {
                    VisitFault(format!("attribute callee at line {line} has no object"))
                })?;
                StructuralElement::MethodCall(MethodCallElement {
                    object_expr: self.render(object)?,
                    method_name: self.field_text(function, "attribute")?.to_string(),
                    arg_count,
                    kwarg_count,
                    arguments,
                    line,
                })
            }
            _ => StructuralElement::FunctionCall(FunctionCallElement {
                name: self.render(function)?,
                arg_count,
                kwarg_count,
                arguments,
                line,
            }),
        };
        self.elements.push(element);
        Ok(())
    }

    fn visit_call_children(&mut self, node: Node<'_>, scope: Scope<'_>) -> VisitResult {
        let callee_id = node.child_by_field_name("function").map(|f| f.id());
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            let role = if Some(child.id()) == callee_id {
                Role::Callee
            } else {
                Role::Plain
            };
            self.visit(child, scope, role)?;
        }
        Ok(())
    }

    /// Argument shape plus `(positional, keyword)` counts including unpacking.
    fn call_arguments(
        &self,
        arguments: Option<Node<'_>>,
    ) -> VisitResult<(CallArguments, usize, usize)> {
        let mut shape = CallArguments::default();
        let mut splat_positional = 0;
        let mut splat_keyword = 0;

        let Some(arguments) = arguments else {
            return Ok((shape, 0, 0));
        };
        if NodeKind::of(arguments) == NodeKind::GeneratorExpression {
            shape.positional.push(ArgKind::Unknown);
            return Ok((shape, 1, 0));
        }

        let mut cursor = arguments.walk();
        for argument in arguments.named_children(&mut cursor) {
            match NodeKind::of(argument) {
                NodeKind::Comment => {}
                NodeKind::KeywordArgument => {
                    let name = self.field_text(argument, "name")?.to_string();
                    let kind = argument
                        .child_by_field_name("value")
                        .map(|value| self.literal_kind(value))
                        .unwrap_or(ArgKind::Unknown);
                    shape.keywords.push(KeywordArg { name, kind });
                }
                NodeKind::ListSplat => {
                    shape.has_unpacking = true;
                    splat_positional += 1;
                }
                NodeKind::DictionarySplat => {
                    shape.has_unpacking = true;
                    splat_keyword += 1;
                }
                _ => shape.positional.push(self.literal_kind(argument)),
            }
        }

        let arg_count = shape.positional.len() + splat_positional;
        let kwarg_count = shape.keywords.len() + splat_keyword;
        Ok((shape, arg_count, kwarg_count))
    }

    fn visit_attribute(&mut self, node: Node<'_>) -> VisitResult {
        let object = node.child_by_field_name("object").ok_or_else(|| {
            VisitFault(format!("attribute at line {} has no object", line_of(node)))
        })?;
        self.elements
            .push(StructuralElement::AttributeAccess(AttributeAccessElement {
                object_expr: self.render(object)?,
                attr_name: self.field_text(node, "attribute")?.to_string(),
                line: line_of(node),
            }));
        Ok(())
    }

    fn visit_assignment(&mut self, node: Node<'_>) -> VisitResult {
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return Ok(());
        };
        if NodeKind::of(left) != NodeKind::Identifier {
            return Ok(());
        }
        self.elements
            .push(StructuralElement::VariableAssign(VariableAssignElement {
                name: self.text(left)?.to_string(),
                assigned_from: self.assigned_callee(right)?,
                line: line_of(node),
            }));
        Ok(())
    }

    /// Callee of the call on the right-hand side, looking through chained
    /// assignments and `await`.
    fn assigned_callee(&self, right: Node<'_>) -> VisitResult<Option<String>> {
        match NodeKind::of(right) {
            NodeKind::Call => match right.child_by_field_name("function") {
                Some(function) => Ok(Some(self.render(function)?)),
                None => Ok(None),
            },
            NodeKind::Assignment => match right.child_by_field_name("right") {
                Some(inner) => self.assigned_callee(inner),
                None => Ok(None),
            },
            NodeKind::Await | NodeKind::Parenthesized => match right.named_child(0) {
                Some(inner) => self.assigned_callee(inner),
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Expression helpers
    // -----------------------------------------------------------------------

    /// Dotted name of a base-class expression; `None` for anything that is
    /// not a plain name or attribute chain.
    fn dotted_name(&self, node: Node<'_>) -> VisitResult<Option<String>> {
        match NodeKind::of(node) {
            NodeKind::Identifier => Ok(Some(self.text(node)?.to_string())),
            NodeKind::Attribute => {
                let Some(object) = node.child_by_field_name("object") else {
                    return Ok(None);
                };
                match self.dotted_name(object)? {
                    Some(prefix) => Ok(Some(format!(
                        "{prefix}.{}",
                        self.field_text(node, "attribute")?
                    ))),
                    None => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    /// Structural rendering of an expression. Names and attribute chains are
    /// kept; literals collapse to their type tag so values never leak.
    fn render(&self, node: Node<'_>) -> VisitResult<String> {
        match NodeKind::of(node) {
            NodeKind::Identifier | NodeKind::DottedName => Ok(self.text(node)?.to_string()),
            NodeKind::Attribute => {
                let object = match node.child_by_field_name("object") {
                    Some(object) => self.render(object)?,
                    None => "<expr>".to_string(),
                };
                Ok(format!("{object}.{}", self.field_text(node, "attribute")?))
            }
            NodeKind::Call => match node.child_by_field_name("function") {
                Some(function) => Ok(format!("{}()", self.render(function)?)),
                None => Ok("<call>()".to_string()),
            },
            NodeKind::Subscript => match node.child_by_field_name("value") {
                Some(value) => Ok(format!("{}[]", self.render(value)?)),
                None => Ok("<subscript>".to_string()),
            },
            NodeKind::Parenthesized | NodeKind::Await => match node.named_child(0) {
                Some(inner) => self.render(inner),
                None => Ok("<expr>".to_string()),
            },
            _ => match self.literal_kind(node) {
                ArgKind::Unknown => Ok(format!("<{}>", node.kind())),
                kind => Ok(format!("<{}>", kind.as_str())),
            },
        }
    }

    /// Type tag of a literal expression, `Unknown` for anything else.
    fn literal_kind(&self, node: Node<'_>) -> ArgKind {
        match NodeKind::of(node) {
            NodeKind::String => {
                let prefix = node
                    .child(0)
                    .and_then(|start| self.source.get(start.byte_range()))
                    .unwrap_or("");
                if prefix.contains(['b', 'B']) {
                    ArgKind::Bytes
                } else {
                    ArgKind::Str
                }
            }
            NodeKind::ConcatenatedString => ArgKind::Str,
            NodeKind::Integer | NodeKind::Float => {
                let text = self.source.get(node.byte_range()).unwrap_or("");
                if text.ends_with(['j', 'J']) {
                    ArgKind::Complex
                } else if NodeKind::of(node) == NodeKind::Integer {
                    ArgKind::Int
                } else {
                    ArgKind::Float
                }
            }
            NodeKind::True | NodeKind::False => ArgKind::Bool,
            NodeKind::None => ArgKind::NoneValue,
            NodeKind::List | NodeKind::ListComprehension => ArgKind::List,
            NodeKind::Dictionary | NodeKind::DictionaryComprehension => ArgKind::Dict,
            NodeKind::Tuple => ArgKind::Tuple,
            NodeKind::Set | NodeKind::SetComprehension => ArgKind::Set,
            NodeKind::UnaryOperator => match node.child_by_field_name("argument") {
                Some(argument) => match self.literal_kind(argument) {
                    kind @ (ArgKind::Int | ArgKind::Float | ArgKind::Complex) => kind,
                    _ => ArgKind::Unknown,
                },
                None => ArgKind::Unknown,
            },
            NodeKind::Parenthesized => match node.named_child(0) {
                Some(inner) => self.literal_kind(inner),
                None => ArgKind::Tuple,
            },
            _ => ArgKind::Unknown,
        }
    }
}
