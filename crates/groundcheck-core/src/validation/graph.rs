//! Structural validation against the knowledge graph.
//!
//! Every lookup goes through the shared [`ValidationCache`] first; a miss
//! costs exactly one collaborator call, and its answer (found or not) is
//! cached. Concurrent misses of one key share that call. Malformed answers
//! are not cached.

use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::CheckerConfig;
use crate::errors::{CollaboratorError, GroundcheckError, GroundcheckResult};
use crate::models::{
    AnalysisResult, CallArguments, ElementRef, ElementValidation, ValidationKind,
    ValidationResult, ValidationStatus,
};
use crate::validation::cache::{CacheKey, ValidationCache};
use crate::validation::collaborators::{
    CancellationToken, GraphStore, Signature, SymbolKind, SymbolLookup,
};
use crate::validation::params::validate_parameters;
use crate::validation::resolver::{plan_targets, TargetName, ValidationTarget};

/// Outcome of one cache-first lookup.
enum Fetch<T> {
    Hit(T),
    Miss(T),
    Malformed(String),
}

impl<T> Fetch<T> {
    fn from_cache(&self) -> bool {
        matches!(self, Fetch::Hit(_))
    }
}

/// Graph validations of one script, in element order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GraphOutcome {
    pub validations: Vec<ElementValidation>,
    /// Usage elements that were not checkable (builtins, stdlib, locals).
    pub skipped: usize,
}

impl GraphOutcome {
    pub fn confidences(&self) -> impl Iterator<Item = f64> + '_ {
        self.validations.iter().map(|v| v.result.confidence)
    }
}

pub struct GraphValidator {
    store: Arc<dyn GraphStore>,
    cache: Arc<ValidationCache>,
    config: CheckerConfig,
    pool: Option<rayon::ThreadPool>,
}

impl GraphValidator {
    pub fn new(store: Arc<dyn GraphStore>, cache: Arc<ValidationCache>, config: CheckerConfig) -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_concurrency.max(1))
            .thread_name(|i| format!("groundcheck-graph-{i}"))
            .build();
        let pool = match pool {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!("Graph validator falling back to sequential lookups: {e}");
                None
            }
        };
        Self {
            store,
            cache,
            config,
            pool,
        }
    }

    /// Resolve and validate every checkable element of `analysis`.
    ///
    /// Fails only when the graph is unreachable or the request is cancelled.
    pub fn validate_script(
        &self,
        analysis: &AnalysisResult,
        cancel: &CancellationToken,
    ) -> GroundcheckResult<GraphOutcome> {
        let plan = plan_targets(analysis);
        debug!(
            targets = plan.targets.len(),
            skipped = plan.skipped,
            "graph validation planned"
        );

        let run = |target: &ValidationTarget<'_>| self.validate_target(target, cancel);
        let validations = match &self.pool {
            Some(pool) => pool.install(|| {
                plan.targets
                    .par_iter()
                    .map(run)
                    .collect::<GroundcheckResult<Vec<_>>>()
            }),
            None => plan.targets.iter().map(run).collect::<GroundcheckResult<Vec<_>>>(),
        }?;

        Ok(GraphOutcome {
            validations,
            skipped: plan.skipped,
        })
    }

    fn validate_target(
        &self,
        target: &ValidationTarget<'_>,
        cancel: &CancellationToken,
    ) -> GroundcheckResult<ElementValidation> {
        let element = target.element.clone();
        match &target.name {
            TargetName::Module { module } => self.validate_import(element, module, cancel),
            TargetName::Class { qualified } => {
                self.validate_class_instantiation(element, qualified, target.arguments, cancel)
            }
            TargetName::Method { class, method } => {
                self.validate_method_call(element, class, method, target.arguments, cancel)
            }
            TargetName::Function { module, name } => {
                self.validate_function_call(element, module, name, target.arguments, cancel)
            }
            TargetName::Attribute {
                owner,
                attr,
                owner_is_class,
            } => self.validate_attribute_access(element, owner, attr, *owner_is_class, cancel),
        }
    }

    pub fn validate_import(
        &self,
        element: ElementRef,
        module: &str,
        cancel: &CancellationToken,
    ) -> GroundcheckResult<ElementValidation> {
        let fetch = self.lookup_symbol(SymbolKind::Module, &[module], cancel)?;
        let from_cache = fetch.from_cache();
        let (result, repositories) = self.existence_result(
            fetch,
            "Module",
            module,
            self.config.class_found_confidence,
            (ValidationStatus::NotFound, self.config.not_found_confidence),
        );
        Ok(validation(
            element,
            ValidationKind::Import,
            module,
            result.with_detail("from_cache", from_cache),
            repositories,
        ))
    }

    pub fn validate_class_instantiation(
        &self,
        element: ElementRef,
        class_name: &str,
        arguments: Option<&CallArguments>,
        cancel: &CancellationToken,
    ) -> GroundcheckResult<ElementValidation> {
        let fetch = self.lookup_symbol(SymbolKind::Class, &[class_name], cancel)?;
        let mut from_cache = fetch.from_cache();
        let (result, repositories) = self.existence_result(
            fetch,
            "Class",
            class_name,
            self.config.class_found_confidence,
            (ValidationStatus::NotFound, self.config.not_found_confidence),
        );

        let result = if result.status == ValidationStatus::Valid {
            let signature =
                self.lookup_signature(CacheKey::method_signature(class_name, "__init__"), cancel)?;
            from_cache &= signature.from_cache();
            apply_signature(result, signature, arguments)
        } else {
            result
        };

        Ok(validation(
            element,
            ValidationKind::ClassInstantiation,
            class_name,
            result.with_detail("from_cache", from_cache),
            repositories,
        ))
    }

    pub fn validate_method_call(
        &self,
        element: ElementRef,
        class_name: &str,
        method_name: &str,
        arguments: Option<&CallArguments>,
        cancel: &CancellationToken,
    ) -> GroundcheckResult<ElementValidation> {
        let qualified = format!("{class_name}.{method_name}");
        let fetch = self.lookup_symbol(SymbolKind::Method, &[class_name, method_name], cancel)?;
        let mut from_cache = fetch.from_cache();
        let (mut result, repositories) = self.existence_result(
            fetch,
            "Method",
            &qualified,
            self.config.member_found_confidence,
            (ValidationStatus::NotFound, self.config.not_found_confidence),
        );

        if result.status == ValidationStatus::Valid {
            let signature =
                self.lookup_signature(CacheKey::method_signature(class_name, method_name), cancel)?;
            from_cache &= signature.from_cache();
            result = apply_signature(result, signature, arguments);
        } else if result.status == ValidationStatus::NotFound {
            result = result.with_suggestion(format!(
                "Check that '{method_name}' is a method of {class_name}"
            ));
        }

        Ok(validation(
            element,
            ValidationKind::MethodCall,
            &qualified,
            result.with_detail("from_cache", from_cache),
            repositories,
        ))
    }

    pub fn validate_function_call(
        &self,
        element: ElementRef,
        module: &str,
        function_name: &str,
        arguments: Option<&CallArguments>,
        cancel: &CancellationToken,
    ) -> GroundcheckResult<ElementValidation> {
        let qualified = format!("{module}.{function_name}");
        let fetch = self.lookup_symbol(SymbolKind::Function, &[module, function_name], cancel)?;
        let mut from_cache = fetch.from_cache();
        let (mut result, repositories) = self.existence_result(
            fetch,
            "Function",
            &qualified,
            self.config.member_found_confidence,
            (ValidationStatus::NotFound, self.config.not_found_confidence),
        );

        if result.status == ValidationStatus::Valid {
            let signature = self
                .lookup_signature(CacheKey::function_signature(module, function_name), cancel)?;
            from_cache &= signature.from_cache();
            result = apply_signature(result, signature, arguments);
        }

        Ok(validation(
            element,
            ValidationKind::FunctionCall,
            &qualified,
            result.with_detail("from_cache", from_cache),
            repositories,
        ))
    }

    /// Attributes may be submodules, classes or callables referenced without
    /// a call, so a miss on the attribute table falls through to those kinds
    /// before the access is reported.
    pub fn validate_attribute_access(
        &self,
        element: ElementRef,
        owner: &str,
        attr_name: &str,
        owner_is_class: bool,
        cancel: &CancellationToken,
    ) -> GroundcheckResult<ElementValidation> {
        let qualified = format!("{owner}.{attr_name}");
        let fallbacks: &[SymbolKind] = if owner_is_class {
            &[SymbolKind::Method]
        } else {
            &[SymbolKind::Module, SymbolKind::Class, SymbolKind::Function]
        };

        let mut fetch = self.lookup_symbol(SymbolKind::Attribute, &[owner, attr_name], cancel)?;
        let mut from_cache = fetch.from_cache();
        for kind in fallbacks {
            if !matches!(&fetch, Fetch::Hit(found) | Fetch::Miss(found) if !found.exists) {
                break;
            }
            fetch = match kind {
                SymbolKind::Module | SymbolKind::Class => {
                    self.lookup_symbol(*kind, &[qualified.as_str()], cancel)?
                }
                _ => self.lookup_symbol(*kind, &[owner, attr_name], cancel)?,
            };
            from_cache &= fetch.from_cache();
        }

        let (result, repositories) = self.existence_result(
            fetch,
            "Attribute",
            &qualified,
            self.config.member_found_confidence,
            (
                ValidationStatus::Uncertain,
                self.config.attribute_not_found_confidence,
            ),
        );
        Ok(validation(
            element,
            ValidationKind::AttributeAccess,
            &qualified,
            result.with_detail("from_cache", from_cache),
            repositories,
        ))
    }

    fn lookup_symbol(
        &self,
        kind: SymbolKind,
        qualifiers: &[&str],
        cancel: &CancellationToken,
    ) -> GroundcheckResult<Fetch<Arc<SymbolLookup>>> {
        let qualified = qualifiers.join(".");
        if let Some(hit) = self.cache.get_symbol(kind, &qualified) {
            debug!(kind = kind.as_str(), qualified = %qualified, "graph cache hit");
            return Ok(Fetch::Hit(hit));
        }
        debug!(kind = kind.as_str(), qualified = %qualified, "graph cache miss");

        let key = CacheKey::symbol(kind, &qualified);
        self.cache.single_flight(&key, || -> GroundcheckResult<Fetch<Arc<SymbolLookup>>> {
            if let Some(hit) = self.cache.get_symbol(kind, &qualified) {
                return Ok(Fetch::Hit(hit));
            }
            cancel.check()?;
            match self.store.find_symbol(kind, qualifiers) {
                Ok(lookup) => Ok(Fetch::Miss(self.cache.insert_symbol(kind, &qualified, lookup))),
                Err(CollaboratorError::Malformed(message)) => {
                    warn!("Malformed graph answer for {} {qualified}: {message}", kind.as_str());
                    Ok(Fetch::Malformed(message))
                }
                Err(CollaboratorError::Unavailable(message)) => {
                    warn!("Graph store unavailable while looking up {qualified}: {message}");
                    Err(GroundcheckError::CollaboratorUnavailable(message))
                }
            }
        })
    }

    fn lookup_signature(
        &self,
        key: CacheKey,
        cancel: &CancellationToken,
    ) -> GroundcheckResult<Fetch<Option<Arc<Signature>>>> {
        if let Some(hit) = self.cache.get_signature(&key) {
            debug!(?key, "signature cache hit");
            return Ok(Fetch::Hit(hit));
        }

        self.cache.single_flight(&key, || -> GroundcheckResult<Fetch<Option<Arc<Signature>>>> {
            if let Some(hit) = self.cache.get_signature(&key) {
                return Ok(Fetch::Hit(hit));
            }
            cancel.check()?;
            let answer = match &key {
                CacheKey::MethodSignature {
                    class_name,
                    method_name,
                } => self.store.find_method_signature(class_name, method_name),
                CacheKey::FunctionSignature {
                    module,
                    function_name,
                } => self.store.find_function_signature(module, function_name),
                CacheKey::Symbol { .. } => Ok(None),
            };
            match answer {
                Ok(signature) => Ok(Fetch::Miss(self.cache.insert_signature(key.clone(), signature))),
                Err(CollaboratorError::Malformed(message)) => {
                    warn!("Malformed signature answer for {key:?}: {message}");
                    Ok(Fetch::Malformed(message))
                }
                Err(CollaboratorError::Unavailable(message)) => {
                    Err(GroundcheckError::CollaboratorUnavailable(message))
                }
            }
        })
    }

    fn existence_result(
        &self,
        fetch: Fetch<Arc<SymbolLookup>>,
        label: &str,
        qualified: &str,
        found_confidence: f64,
        (missing_status, missing_confidence): (ValidationStatus, f64),
    ) -> (ValidationResult, Vec<String>) {
        match fetch {
            Fetch::Hit(lookup) | Fetch::Miss(lookup) if lookup.exists => (
                ValidationResult::new(
                    ValidationStatus::Valid,
                    found_confidence,
                    format!("{label} '{qualified}' found in knowledge graph"),
                )
                .with_detail("repositories", lookup.locations.clone()),
                lookup.locations.clone(),
            ),
            Fetch::Hit(_) | Fetch::Miss(_) => (
                ValidationResult::new(
                    missing_status,
                    missing_confidence,
                    format!("{label} '{qualified}' not found in knowledge graph"),
                )
                .with_suggestion(format!(
                    "Verify that '{qualified}' exists in the library you are using"
                )),
                Vec::new(),
            ),
            Fetch::Malformed(message) => (
                ValidationResult::new(
                    ValidationStatus::NotFound,
                    0.0,
                    format!("Malformed knowledge graph response for {label} '{qualified}'"),
                )
                .with_detail("error", message),
                Vec::new(),
            ),
        }
    }
}

/// Fold a signature check into an existence result that found its symbol.
fn apply_signature(
    result: ValidationResult,
    signature: Fetch<Option<Arc<Signature>>>,
    arguments: Option<&CallArguments>,
) -> ValidationResult {
    let Some(arguments) = arguments else {
        return result;
    };
    if arguments.has_unpacking {
        return result.with_detail("parameter_validation", "skipped: argument unpacking");
    }
    let signature = match signature {
        Fetch::Hit(Some(signature)) | Fetch::Miss(Some(signature)) => signature,
        Fetch::Hit(None) | Fetch::Miss(None) => {
            return result.with_detail("parameter_validation", "skipped: no signature");
        }
        Fetch::Malformed(message) => {
            return result.with_detail("parameter_validation", format!("skipped: {message}"));
        }
    };

    let params = validate_parameters(&signature.params, &arguments.positional, &arguments.keywords);
    let summary = json!({
        "status": params.status,
        "confidence": params.confidence,
        "message": &params.message,
        "details": &params.details,
    });
    if params.status == ValidationStatus::Valid {
        return result.with_detail("parameter_validation", summary);
    }

    let mut downgraded = ValidationResult::new(
        ValidationStatus::Uncertain,
        result.confidence.min(params.confidence),
        format!("{}; {}", result.message, params.message),
    );
    downgraded.details = result.details;
    downgraded.suggestions = result.suggestions;
    downgraded.suggestions.extend(params.suggestions);
    downgraded.with_detail("parameter_validation", summary)
}

fn validation(
    element: ElementRef,
    kind: ValidationKind,
    target: &str,
    result: ValidationResult,
    repositories: Vec<String>,
) -> ElementValidation {
    ElementValidation {
        element,
        kind,
        target: target.to_string(),
        result,
        repositories,
    }
}
