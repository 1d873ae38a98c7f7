//! Interfaces to the external knowledge sources a checker validates against.
//!
//! Both traits are synchronous and `Send + Sync`: one instance is shared by
//! every worker of a checker's pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{CollaboratorError, GroundcheckError, GroundcheckResult};

/// Kind of symbol a graph lookup asks about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Module,
    Class,
    Method,
    Function,
    Attribute,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Module => "module",
            SymbolKind::Class => "class",
            SymbolKind::Method => "method",
            SymbolKind::Function => "function",
            SymbolKind::Attribute => "attribute",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "module" => Some(SymbolKind::Module),
            "class" => Some(SymbolKind::Class),
            "method" => Some(SymbolKind::Method),
            "function" => Some(SymbolKind::Function),
            "attribute" => Some(SymbolKind::Attribute),
            _ => None,
        }
    }
}

/// Answer to an existence query. A negative answer is a normal value, not an
/// error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolLookup {
    pub exists: bool,
    /// Names of the repositories that define the symbol.
    pub locations: Vec<String>,
}

impl SymbolLookup {
    pub fn found<I, S>(locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exists: true,
            locations: locations.into_iter().map(Into::into).collect(),
        }
    }

    pub fn missing() -> Self {
        Self::default()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Positional,
    KeywordOnly,
    VarPositional,
    VarKeyword,
}

impl ParamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamKind::Positional => "positional",
            ParamKind::KeywordOnly => "keyword_only",
            ParamKind::VarPositional => "var_positional",
            ParamKind::VarKeyword => "var_keyword",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "positional" => Some(ParamKind::Positional),
            "keyword_only" => Some(ParamKind::KeywordOnly),
            "var_positional" => Some(ParamKind::VarPositional),
            "var_keyword" => Some(ParamKind::VarKeyword),
            _ => None,
        }
    }
}

/// One declared parameter of a callable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    /// Declared annotation text, e.g. `int` or `Optional[str]`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    pub has_default: bool,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub fn required(name: &str, type_name: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.map(str::to_string),
            has_default: false,
            kind: ParamKind::Positional,
        }
    }

    pub fn optional(name: &str, type_name: Option<&str>) -> Self {
        Self {
            has_default: true,
            ..Self::required(name, type_name)
        }
    }

    pub fn with_kind(mut self, kind: ParamKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_variadic(&self) -> bool {
        matches!(self.kind, ParamKind::VarPositional | ParamKind::VarKeyword)
    }
}

/// Declared signature of a method, constructor or function.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<ParamSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
}

/// Knowledge graph of indexed repositories.
pub trait GraphStore: Send + Sync {
    /// Whether a symbol of `kind` exists. `qualifiers` are the dotted parts of
    /// the qualified name, owner first (`["acme.Widget", "render"]`).
    fn find_symbol(
        &self,
        kind: SymbolKind,
        qualifiers: &[&str],
    ) -> Result<SymbolLookup, CollaboratorError>;

    fn find_method_signature(
        &self,
        class_name: &str,
        method_name: &str,
    ) -> Result<Option<Signature>, CollaboratorError>;

    fn find_function_signature(
        &self,
        _module: &str,
        _function_name: &str,
    ) -> Result<Option<Signature>, CollaboratorError> {
        Ok(None)
    }

    fn close(&self) {}
}

/// One retrieved code example.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub content: String,
    pub similarity: f64,
}

/// Similarity search over indexed code examples.
pub trait VectorSearch: Send + Sync {
    fn search(
        &self,
        query: &str,
        top_k: usize,
        min_similarity: f64,
    ) -> Result<Vec<SearchHit>, CollaboratorError>;

    fn close(&self) {}
}

/// Shared cancellation flag for one request. Cloning shares the flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the token has fired.
    pub fn check(&self) -> GroundcheckResult<()> {
        if self.is_cancelled() {
            Err(GroundcheckError::Cancelled)
        } else {
            Ok(())
        }
    }
}
