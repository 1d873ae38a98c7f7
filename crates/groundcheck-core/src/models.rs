//! Shared typed models used across analysis, validation, fusion and reporting.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of a script's text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Call argument shapes
// ---------------------------------------------------------------------------

/// Statically inferred type of a call argument. Only literal arguments get a
/// concrete kind; everything else is `Unknown`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgKind {
    #[serde(rename = "str")]
    Str,
    #[serde(rename = "bytes")]
    Bytes,
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "complex")]
    Complex,
    #[serde(rename = "bool")]
    Bool,
    #[serde(rename = "None")]
    NoneValue,
    #[serde(rename = "list")]
    List,
    #[serde(rename = "dict")]
    Dict,
    #[serde(rename = "tuple")]
    Tuple,
    #[serde(rename = "set")]
    Set,
    #[serde(rename = "unknown")]
    Unknown,
}

impl ArgKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArgKind::Str => "str",
            ArgKind::Bytes => "bytes",
            ArgKind::Int => "int",
            ArgKind::Float => "float",
            ArgKind::Complex => "complex",
            ArgKind::Bool => "bool",
            ArgKind::NoneValue => "None",
            ArgKind::List => "list",
            ArgKind::Dict => "dict",
            ArgKind::Tuple => "tuple",
            ArgKind::Set => "set",
            ArgKind::Unknown => "unknown",
        }
    }

    pub fn is_known(self) -> bool {
        self != ArgKind::Unknown
    }
}

/// A keyword argument: the keyword itself plus the inferred kind of its value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordArg {
    pub name: String,
    pub kind: ArgKind,
}

/// Shape of the arguments passed at a call site. Never holds literal values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallArguments {
    pub positional: Vec<ArgKind>,
    pub keywords: Vec<KeywordArg>,
    /// `*args` or `**kwargs` unpacking was used, so binding cannot be checked.
    pub has_unpacking: bool,
}

// ---------------------------------------------------------------------------
// Structural elements
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportElement {
    /// Dotted module path; relative imports keep their leading dots.
    pub module: String,
    /// Imported name for `from m import name`; absent for `import m`.
    pub name: Option<String>,
    pub alias: Option<String>,
    pub line: usize,
}

impl ImportElement {
    /// Name this import binds in the script namespace.
    pub fn bound_name(&self) -> &str {
        if let Some(alias) = &self.alias {
            return alias;
        }
        match &self.name {
            Some(name) => name,
            None => self.module.split('.').next().unwrap_or(&self.module),
        }
    }

    pub fn is_relative(&self) -> bool {
        self.module.starts_with('.')
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDefElement {
    pub name: String,
    pub bases: Vec<String>,
    pub method_names: Vec<String>,
    pub line: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDefElement {
    pub name: String,
    pub args: Vec<String>,
    /// Enclosing class when this definition is a method.
    pub class_name: Option<String>,
    pub is_async: bool,
    pub line: usize,
}

impl FunctionDefElement {
    pub fn is_method(&self) -> bool {
        self.class_name.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodCallElement {
    pub object_expr: String,
    pub method_name: String,
    pub arg_count: usize,
    pub kwarg_count: usize,
    pub arguments: CallArguments,
    pub line: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCallElement {
    pub name: String,
    pub arg_count: usize,
    pub kwarg_count: usize,
    pub arguments: CallArguments,
    pub line: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeAccessElement {
    pub object_expr: String,
    pub attr_name: String,
    pub line: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableAssignElement {
    pub name: String,
    /// Callee of the right-hand side when it is a call (`w = Widget()`).
    pub assigned_from: Option<String>,
    pub line: usize,
}

/// One structural fact extracted from a script.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "element", rename_all = "snake_case")]
pub enum StructuralElement {
    Import(ImportElement),
    ClassDef(ClassDefElement),
    FunctionDef(FunctionDefElement),
    MethodCall(MethodCallElement),
    FunctionCall(FunctionCallElement),
    AttributeAccess(AttributeAccessElement),
    VariableAssign(VariableAssignElement),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Import,
    ClassDef,
    FunctionDef,
    MethodCall,
    FunctionCall,
    AttributeAccess,
    VariableAssign,
}

impl ElementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Import => "import",
            ElementKind::ClassDef => "class_def",
            ElementKind::FunctionDef => "function_def",
            ElementKind::MethodCall => "method_call",
            ElementKind::FunctionCall => "function_call",
            ElementKind::AttributeAccess => "attribute_access",
            ElementKind::VariableAssign => "variable_assign",
        }
    }
}

impl StructuralElement {
    pub fn kind(&self) -> ElementKind {
        match self {
            StructuralElement::Import(_) => ElementKind::Import,
            StructuralElement::ClassDef(_) => ElementKind::ClassDef,
            StructuralElement::FunctionDef(_) => ElementKind::FunctionDef,
            StructuralElement::MethodCall(_) => ElementKind::MethodCall,
            StructuralElement::FunctionCall(_) => ElementKind::FunctionCall,
            StructuralElement::AttributeAccess(_) => ElementKind::AttributeAccess,
            StructuralElement::VariableAssign(_) => ElementKind::VariableAssign,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            StructuralElement::Import(e) => e.line,
            StructuralElement::ClassDef(e) => e.line,
            StructuralElement::FunctionDef(e) => e.line,
            StructuralElement::MethodCall(e) => e.line,
            StructuralElement::FunctionCall(e) => e.line,
            StructuralElement::AttributeAccess(e) => e.line,
            StructuralElement::VariableAssign(e) => e.line,
        }
    }

    /// Human-readable name used in messages and element references.
    pub fn display_name(&self) -> String {
        match self {
            StructuralElement::Import(e) => match &e.name {
                Some(name) => format!("{}.{}", e.module, name),
                None => e.module.clone(),
            },
            StructuralElement::ClassDef(e) => e.name.clone(),
            StructuralElement::FunctionDef(e) => match &e.class_name {
                Some(class) => format!("{class}.{}", e.name),
                None => e.name.clone(),
            },
            StructuralElement::MethodCall(e) => format!("{}.{}", e.object_expr, e.method_name),
            StructuralElement::FunctionCall(e) => e.name.clone(),
            StructuralElement::AttributeAccess(e) => format!("{}.{}", e.object_expr, e.attr_name),
            StructuralElement::VariableAssign(e) => e.name.clone(),
        }
    }

    /// Definitions and assignments describe the script itself; only usages
    /// of external names are validated.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            StructuralElement::Import(_)
                | StructuralElement::MethodCall(_)
                | StructuralElement::FunctionCall(_)
                | StructuralElement::AttributeAccess(_)
        )
    }
}

/// Stable reference to an element of an [`AnalysisResult`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRef {
    /// Position in analyzer discovery order.
    pub index: usize,
    pub kind: ElementKind,
    pub name: String,
    pub line: usize,
}

// ---------------------------------------------------------------------------
// Analysis result
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub script_path: String,
    pub total_lines: usize,
    pub node_count: usize,
    pub content_hash: String,
    /// Set when an internal fault was absorbed during analysis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementCounts {
    pub imports: usize,
    pub classes: usize,
    pub functions: usize,
    pub methods: usize,
    pub method_calls: usize,
    pub function_calls: usize,
    pub attribute_accesses: usize,
    pub variables: usize,
}

/// Structural model of one script. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub metadata: AnalysisMetadata,
    elements: Vec<StructuralElement>,
}

impl AnalysisResult {
    pub fn new(metadata: AnalysisMetadata, elements: Vec<StructuralElement>) -> Self {
        Self { metadata, elements }
    }

    /// Result with no elements, carrying the absorbed fault in its metadata.
    pub fn failed(mut metadata: AnalysisMetadata, error: String) -> Self {
        metadata.error = Some(error);
        Self {
            metadata,
            elements: Vec::new(),
        }
    }

    /// All elements in discovery order.
    pub fn elements(&self) -> &[StructuralElement] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn element_ref(&self, index: usize) -> Option<ElementRef> {
        self.elements.get(index).map(|element| ElementRef {
            index,
            kind: element.kind(),
            name: element.display_name(),
            line: element.line(),
        })
    }

    pub fn imports(&self) -> impl Iterator<Item = &ImportElement> {
        self.elements.iter().filter_map(|e| match e {
            StructuralElement::Import(i) => Some(i),
            _ => None,
        })
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDefElement> {
        self.elements.iter().filter_map(|e| match e {
            StructuralElement::ClassDef(c) => Some(c),
            _ => None,
        })
    }

    pub fn function_defs(&self) -> impl Iterator<Item = &FunctionDefElement> {
        self.elements.iter().filter_map(|e| match e {
            StructuralElement::FunctionDef(f) => Some(f),
            _ => None,
        })
    }

    pub fn method_calls(&self) -> impl Iterator<Item = &MethodCallElement> {
        self.elements.iter().filter_map(|e| match e {
            StructuralElement::MethodCall(m) => Some(m),
            _ => None,
        })
    }

    pub fn function_calls(&self) -> impl Iterator<Item = &FunctionCallElement> {
        self.elements.iter().filter_map(|e| match e {
            StructuralElement::FunctionCall(f) => Some(f),
            _ => None,
        })
    }

    pub fn attribute_accesses(&self) -> impl Iterator<Item = &AttributeAccessElement> {
        self.elements.iter().filter_map(|e| match e {
            StructuralElement::AttributeAccess(a) => Some(a),
            _ => None,
        })
    }

    pub fn variable_assigns(&self) -> impl Iterator<Item = &VariableAssignElement> {
        self.elements.iter().filter_map(|e| match e {
            StructuralElement::VariableAssign(v) => Some(v),
            _ => None,
        })
    }

    pub fn counts(&self) -> ElementCounts {
        let mut counts = ElementCounts::default();
        for element in &self.elements {
            match element {
                StructuralElement::Import(_) => counts.imports += 1,
                StructuralElement::ClassDef(_) => counts.classes += 1,
                StructuralElement::FunctionDef(f) if f.is_method() => counts.methods += 1,
                StructuralElement::FunctionDef(_) => counts.functions += 1,
                StructuralElement::MethodCall(_) => counts.method_calls += 1,
                StructuralElement::FunctionCall(_) => counts.function_calls += 1,
                StructuralElement::AttributeAccess(_) => counts.attribute_accesses += 1,
                StructuralElement::VariableAssign(_) => counts.variables += 1,
            }
        }
        counts
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Valid,
    Invalid,
    Uncertain,
    NotFound,
}

impl ValidationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationStatus::Valid => "VALID",
            ValidationStatus::Invalid => "INVALID",
            ValidationStatus::Uncertain => "UNCERTAIN",
            ValidationStatus::NotFound => "NOT_FOUND",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub confidence: f64,
    pub message: String,
    pub details: IndexMap<String, serde_json::Value>,
    pub suggestions: Vec<String>,
}

impl ValidationResult {
    pub fn new(status: ValidationStatus, confidence: f64, message: impl Into<String>) -> Self {
        Self {
            status,
            confidence: confidence.clamp(0.0, 1.0),
            message: message.into(),
            details: IndexMap::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

/// What a graph validation checked an element as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    Import,
    ClassInstantiation,
    MethodCall,
    FunctionCall,
    AttributeAccess,
}

impl ValidationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationKind::Import => "import",
            ValidationKind::ClassInstantiation => "class_instantiation",
            ValidationKind::MethodCall => "method_call",
            ValidationKind::FunctionCall => "function_call",
            ValidationKind::AttributeAccess => "attribute_access",
        }
    }
}

/// One element paired with its validation outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementValidation {
    pub element: ElementRef,
    pub kind: ValidationKind,
    /// Qualified name the element was checked against.
    pub target: String,
    pub result: ValidationResult,
    /// Repositories in which the target was found.
    pub repositories: Vec<String>,
}

// ---------------------------------------------------------------------------
// Hallucinations
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HallucinationSource {
    Structural,
    Semantic,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hallucination {
    #[serde(rename = "type")]
    pub source: HallucinationSource,
    pub category: String,
    pub element: ElementRef,
    pub confidence: f64,
    pub severity: Severity,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}
