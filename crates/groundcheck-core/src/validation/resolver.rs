//! Resolution of script names to the qualified symbols they refer to.
//!
//! Elements are walked in discovery order while an import map and a
//! variable-type map are maintained, so a name resolves against the bindings
//! in effect where it is used. Only names bound by imports of third-party
//! modules resolve; builtins, local definitions and `self` do not.

use std::collections::HashMap;

use crate::models::{AnalysisResult, CallArguments, ElementRef, StructuralElement, ValidationKind};

/// Top-level standard-library modules. Imports of these are never checked
/// against the knowledge graph.
const STDLIB_MODULES: &[&str] = &[
    "__future__", "abc", "argparse", "array", "ast", "asyncio", "base64", "bisect", "builtins",
    "calendar", "cmath", "codecs", "collections", "concurrent", "configparser", "contextlib",
    "contextvars", "copy", "csv", "ctypes", "dataclasses", "datetime", "decimal", "difflib", "dis",
    "doctest", "email", "enum", "errno", "fnmatch", "fractions", "functools", "gc", "getpass",
    "glob", "gzip", "hashlib", "heapq", "hmac", "html", "http", "importlib", "inspect", "io",
    "ipaddress", "itertools", "json", "locale", "logging", "lzma", "math", "mimetypes",
    "multiprocessing", "numbers", "operator", "os", "pathlib", "pickle", "pkgutil", "platform",
    "pprint", "queue", "random", "re", "secrets", "select", "selectors", "shlex", "shutil",
    "signal", "socket", "sqlite3", "ssl", "statistics", "string", "struct", "subprocess", "sys",
    "tarfile", "tempfile", "textwrap", "threading", "time", "timeit", "tokenize", "traceback",
    "types", "typing", "unittest", "urllib", "uuid", "warnings", "weakref", "xml", "zipfile",
    "zlib", "zoneinfo",
];

pub fn is_stdlib_module(module: &str) -> bool {
    let root = module.split('.').next().unwrap_or(module);
    STDLIB_MODULES.contains(&root)
}

/// Qualified name a graph validation checks, by validation kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetName {
    Module { module: String },
    Class { qualified: String },
    Method { class: String, method: String },
    Function { module: String, name: String },
    Attribute { owner: String, attr: String, owner_is_class: bool },
}

impl TargetName {
    pub fn qualified(&self) -> String {
        match self {
            TargetName::Module { module } => module.clone(),
            TargetName::Class { qualified } => qualified.clone(),
            TargetName::Method { class, method } => format!("{class}.{method}"),
            TargetName::Function { module, name } => format!("{module}.{name}"),
            TargetName::Attribute { owner, attr, .. } => format!("{owner}.{attr}"),
        }
    }
}

/// One element scheduled for graph validation.
#[derive(Clone, Debug)]
pub struct ValidationTarget<'a> {
    pub element: ElementRef,
    pub kind: ValidationKind,
    pub name: TargetName,
    pub arguments: Option<&'a CallArguments>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Binding {
    /// `import a.b` binds `a`; `import a.b as x` binds `x` to `a.b`.
    Module(String),
    /// `from m import n [as k]`.
    Member(String),
}

impl Binding {
    fn path(&self) -> &str {
        match self {
            Binding::Module(path) | Binding::Member(path) => path,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Resolved {
    Module(String),
    Class(String),
}

/// Resolution outcome for a whole script.
#[derive(Clone, Debug, Default)]
pub struct ResolutionPlan<'a> {
    pub targets: Vec<ValidationTarget<'a>>,
    /// Usage elements that resolved to nothing checkable.
    pub skipped: usize,
}

#[derive(Default)]
struct Resolver {
    bindings: HashMap<String, Binding>,
    variable_types: HashMap<String, String>,
}

/// Decide which elements of `analysis` are validated against the graph, and
/// against which qualified names.
pub fn plan_targets(analysis: &AnalysisResult) -> ResolutionPlan<'_> {
    let mut resolver = Resolver::default();
    let mut plan = ResolutionPlan::default();

    for (index, element) in analysis.elements().iter().enumerate() {
        let Some(element_ref) = analysis.element_ref(index) else {
            continue;
        };
        let scheduled = match element {
            StructuralElement::Import(import) => {
                let checkable = !import.is_relative() && !is_stdlib_module(&import.module);
                if checkable {
                    resolver.bind_import(import);
                }
                checkable.then(|| (ValidationKind::Import, TargetName::Module { module: import.module.clone() }, None))
            }
            StructuralElement::ClassDef(class) => {
                resolver.shadow(&class.name);
                None
            }
            StructuralElement::FunctionDef(def) => {
                if !def.is_method() {
                    resolver.shadow(&def.name);
                }
                None
            }
            StructuralElement::VariableAssign(assign) => {
                resolver.assign(&assign.name, assign.assigned_from.as_deref());
                None
            }
            StructuralElement::FunctionCall(call) => match resolver.resolve(&call.name) {
                Some(Resolved::Class(qualified)) => Some((
                    ValidationKind::ClassInstantiation,
                    TargetName::Class { qualified },
                    Some(&call.arguments),
                )),
                Some(Resolved::Module(path)) => split_last(&path).map(|(module, name)| {
                    (
                        ValidationKind::FunctionCall,
                        TargetName::Function {
                            module: module.to_string(),
                            name: name.to_string(),
                        },
                        Some(&call.arguments),
                    )
                }),
                None => None,
            },
            StructuralElement::MethodCall(call) => match resolver.resolve(&call.object_expr) {
                // `pkg.Widget()` and `Outer.Inner()` construct classes.
                Some(Resolved::Class(owner) | Resolved::Module(owner))
                    if starts_uppercase(&call.method_name) =>
                {
                    Some((
                        ValidationKind::ClassInstantiation,
                        TargetName::Class {
                            qualified: format!("{owner}.{}", call.method_name),
                        },
                        Some(&call.arguments),
                    ))
                }
                Some(Resolved::Class(class)) => Some((
                    ValidationKind::MethodCall,
                    TargetName::Method {
                        class,
                        method: call.method_name.clone(),
                    },
                    Some(&call.arguments),
                )),
                Some(Resolved::Module(module)) => Some((
                    ValidationKind::FunctionCall,
                    TargetName::Function {
                        module,
                        name: call.method_name.clone(),
                    },
                    Some(&call.arguments),
                )),
                None => None,
            },
            StructuralElement::AttributeAccess(access) => {
                resolver.resolve(&access.object_expr).map(|resolved| {
                    let (owner, owner_is_class) = match resolved {
                        Resolved::Class(class) => (class, true),
                        Resolved::Module(module) => (module, false),
                    };
                    (
                        ValidationKind::AttributeAccess,
                        TargetName::Attribute {
                            owner,
                            attr: access.attr_name.clone(),
                            owner_is_class,
                        },
                        None,
                    )
                })
            }
        };

        match scheduled {
            Some((kind, name, arguments)) => plan.targets.push(ValidationTarget {
                element: element_ref,
                kind,
                name,
                arguments,
            }),
            None if element.is_usage() => plan.skipped += 1,
            None => {}
        }
    }

    plan
}

impl Resolver {
    fn bind_import(&mut self, import: &crate::models::ImportElement) {
        let bound = import.bound_name().to_string();
        match (&import.name, &import.alias) {
            (Some(name), _) if name == "*" => {}
            (Some(name), _) => {
                self.bindings
                    .insert(bound.clone(), Binding::Member(format!("{}.{}", import.module, name)));
            }
            (None, Some(_)) => {
                self.bindings.insert(bound.clone(), Binding::Module(import.module.clone()));
            }
            (None, None) => {
                self.bindings.insert(bound.clone(), Binding::Module(bound.clone()));
            }
        }
        self.variable_types.remove(&bound);
    }

    /// A local definition hides any import of the same name.
    fn shadow(&mut self, name: &str) {
        self.bindings.remove(name);
        self.variable_types.remove(name);
    }

    fn assign(&mut self, name: &str, assigned_from: Option<&str>) {
        self.bindings.remove(name);
        match assigned_from.and_then(|callee| self.resolve(callee)) {
            Some(Resolved::Class(class)) => {
                self.variable_types.insert(name.to_string(), class);
            }
            _ => {
                self.variable_types.remove(name);
            }
        }
    }

    fn resolve(&self, expr: &str) -> Option<Resolved> {
        let mut segments = expr.split('.');
        let root = segments.next()?;
        if !is_identifier(root) {
            return None;
        }
        let rest: Vec<&str> = segments.collect();
        if rest.iter().any(|s| !is_identifier(s)) {
            return None;
        }

        if let Some(class) = self.variable_types.get(root) {
            // Attribute chains off an instance have unknown types.
            return rest.is_empty().then(|| Resolved::Class(class.clone()));
        }

        let binding = self.bindings.get(root)?;
        let mut path = binding.path().to_string();
        for segment in &rest {
            path.push('.');
            path.push_str(segment);
        }
        let last = path.rsplit('.').next().unwrap_or(&path);
        if starts_uppercase(last) {
            Some(Resolved::Class(path))
        } else {
            Some(Resolved::Module(path))
        }
    }
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn starts_uppercase(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

fn split_last(path: &str) -> Option<(&str, &str)> {
    path.rsplit_once('.')
}
