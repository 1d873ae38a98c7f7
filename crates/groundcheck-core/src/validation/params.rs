//! Matching call arguments against a declared parameter list.

use indexmap::IndexMap;
use serde_json::json;

use crate::models::{ArgKind, KeywordArg, ValidationResult, ValidationStatus};
use crate::validation::collaborators::{ParamKind, ParamSpec};

const BINDING_CONFLICT_CONFIDENCE: f64 = 0.3;
const MISSING_REQUIRED_CONFIDENCE: f64 = 0.5;
const MISMATCH_BASE_CONFIDENCE: f64 = 0.6;
const MISMATCH_PENALTY: f64 = 0.2;
const VALID_BASE_CONFIDENCE: f64 = 0.8;
const VALID_CHECKED_BONUS: f64 = 0.1;

/// Check positional and keyword argument kinds against `expected`.
///
/// A leading `self`/`cls` parameter is ignored. Arguments whose kind is not a
/// literal and parameters without a recognised annotation take no part in
/// type matching.
pub fn validate_parameters(
    expected: &[ParamSpec],
    positional: &[ArgKind],
    keywords: &[KeywordArg],
) -> ValidationResult {
    let params: Vec<&ParamSpec> = expected
        .iter()
        .enumerate()
        .filter(|(i, p)| !(*i == 0 && matches!(p.name.as_str(), "self" | "cls")))
        .map(|(_, p)| p)
        .collect();

    let slots: Vec<&ParamSpec> = params
        .iter()
        .copied()
        .filter(|p| p.kind == ParamKind::Positional)
        .collect();
    let takes_varargs = params.iter().any(|p| p.kind == ParamKind::VarPositional);
    let takes_kwargs = params.iter().any(|p| p.kind == ParamKind::VarKeyword);

    let mut bound: IndexMap<&str, (ArgKind, &ParamSpec)> = IndexMap::new();
    let mut excess = 0usize;
    for (i, kind) in positional.iter().enumerate() {
        match slots.get(i) {
            Some(param) => {
                bound.insert(param.name.as_str(), (*kind, param));
            }
            None if takes_varargs => {}
            None => excess += 1,
        }
    }

    let mut duplicates = Vec::new();
    let mut unexpected = Vec::new();
    for keyword in keywords {
        let target = params.iter().copied().find(|p| {
            p.name == keyword.name && matches!(p.kind, ParamKind::Positional | ParamKind::KeywordOnly)
        });
        match target {
            Some(param) if bound.contains_key(param.name.as_str()) => {
                duplicates.push(keyword.name.clone());
            }
            Some(param) => {
                bound.insert(param.name.as_str(), (keyword.kind, param));
            }
            None if takes_kwargs => {}
            None => unexpected.push(keyword.name.clone()),
        }
    }

    if !duplicates.is_empty() {
        return ValidationResult::new(
            ValidationStatus::Uncertain,
            BINDING_CONFLICT_CONFIDENCE,
            format!("Multiple values for argument(s): {}", duplicates.join(", ")),
        )
        .with_detail("duplicate_arguments", duplicates);
    }

    if excess > 0 || !unexpected.is_empty() {
        let mut message = Vec::new();
        if excess > 0 {
            message.push(format!(
                "{} positional argument(s) given, at most {} accepted",
                positional.len(),
                slots.len()
            ));
        }
        if !unexpected.is_empty() {
            message.push(format!("Unexpected keyword(s): {}", unexpected.join(", ")));
        }
        let mut result = ValidationResult::new(
            ValidationStatus::Uncertain,
            BINDING_CONFLICT_CONFIDENCE,
            message.join("; "),
        )
        .with_detail("excess_positional", excess)
        .with_detail("unexpected_keywords", unexpected);
        let accepted: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        if !accepted.is_empty() {
            result = result.with_suggestion(format!("Accepted parameters: {}", accepted.join(", ")));
        }
        return result;
    }

    let missing: Vec<String> = params
        .iter()
        .filter(|p| !p.is_variadic() && !p.has_default && !bound.contains_key(p.name.as_str()))
        .map(|p| p.name.clone())
        .collect();
    if !missing.is_empty() {
        return ValidationResult::new(
            ValidationStatus::Uncertain,
            MISSING_REQUIRED_CONFIDENCE,
            format!("Missing required argument(s): {}", missing.join(", ")),
        )
        .with_suggestion(format!("Provide: {}", missing.join(", ")))
        .with_detail("missing_arguments", missing);
    }

    let mut checked = 0usize;
    let mut mismatches = Vec::new();
    for (name, (kind, spec)) in &bound {
        let Some(declared) = spec.type_name.as_deref() else {
            continue;
        };
        match accepts(declared, *kind, spec.has_default) {
            Some(true) => checked += 1,
            Some(false) => {
                checked += 1;
                mismatches.push(json!({
                    "parameter": name,
                    "expected": declared,
                    "received": kind.as_str(),
                }));
            }
            None => {}
        }
    }

    if !mismatches.is_empty() {
        let fraction = mismatches.len() as f64 / checked as f64;
        return ValidationResult::new(
            ValidationStatus::Uncertain,
            MISMATCH_BASE_CONFIDENCE - MISMATCH_PENALTY * fraction,
            format!("{} of {} checked argument(s) have the wrong type", mismatches.len(), checked),
        )
        .with_detail("type_mismatches", mismatches);
    }

    let checked_fraction = if bound.is_empty() {
        0.0
    } else {
        checked as f64 / bound.len() as f64
    };
    ValidationResult::new(
        ValidationStatus::Valid,
        VALID_BASE_CONFIDENCE + VALID_CHECKED_BONUS * checked_fraction,
        "Arguments match the declared parameters",
    )
    .with_detail("checked_arguments", checked)
    .with_detail("bound_arguments", bound.len())
}

/// Whether a declared annotation admits an argument of `kind`. `None` when
/// the annotation or the argument cannot be judged.
pub(crate) fn accepts(declared: &str, kind: ArgKind, has_default: bool) -> Option<bool> {
    if !kind.is_known() {
        return None;
    }
    let declared = declared.trim().trim_matches(|c| c == '"' || c == '\'');
    if declared.is_empty() {
        return None;
    }

    if let Some(members) = union_members(declared) {
        let mut undecided = false;
        for member in members {
            match accepts(member, kind, has_default) {
                Some(true) => return Some(true),
                Some(false) => {}
                None => undecided = true,
            }
        }
        return if undecided { None } else { Some(false) };
    }

    let (base, inner) = split_generic(declared);
    let base = base
        .strip_prefix("typing.")
        .or_else(|| base.strip_prefix("builtins."))
        .or_else(|| base.strip_prefix("collections.abc."))
        .unwrap_or(base);

    if base == "Optional" {
        if kind == ArgKind::NoneValue {
            return Some(true);
        }
        return inner.and_then(|inner| accepts(inner, kind, has_default));
    }
    if kind == ArgKind::NoneValue && has_default {
        // `def f(x: int = None)` predates explicit Optional.
        return Some(true);
    }

    let admitted: &[ArgKind] = match base {
        "Any" | "object" => return Some(true),
        "str" => &[ArgKind::Str],
        "bytes" => &[ArgKind::Bytes],
        "int" => &[ArgKind::Int, ArgKind::Bool],
        "float" => &[ArgKind::Float, ArgKind::Int, ArgKind::Bool],
        "complex" => &[ArgKind::Complex, ArgKind::Float, ArgKind::Int, ArgKind::Bool],
        "bool" => &[ArgKind::Bool],
        "None" | "NoneType" => &[ArgKind::NoneValue],
        "list" | "List" => &[ArgKind::List],
        "dict" | "Dict" | "Mapping" | "MutableMapping" => &[ArgKind::Dict],
        "tuple" | "Tuple" => &[ArgKind::Tuple],
        "set" | "Set" | "frozenset" | "FrozenSet" | "AbstractSet" => &[ArgKind::Set],
        "Sequence" => &[ArgKind::List, ArgKind::Tuple, ArgKind::Str, ArgKind::Bytes],
        "Iterable" | "Collection" => &[
            ArgKind::List,
            ArgKind::Tuple,
            ArgKind::Set,
            ArgKind::Dict,
            ArgKind::Str,
            ArgKind::Bytes,
        ],
        _ => return None,
    };
    Some(admitted.contains(&kind))
}

/// Top-level members of `Union[A, B]` or `A | B`.
fn union_members(declared: &str) -> Option<Vec<&str>> {
    let (base, inner) = split_generic(declared);
    if matches!(base, "Union" | "typing.Union") {
        return inner.map(|inner| split_top_level(inner, ','));
    }
    let parts = split_top_level(declared, '|');
    (parts.len() > 1).then_some(parts)
}

/// `List[int]` -> (`List`, Some(`int`)).
fn split_generic(declared: &str) -> (&str, Option<&str>) {
    match (declared.find('['), declared.ends_with(']')) {
        (Some(open), true) => (
            declared[..open].trim(),
            Some(&declared[open + 1..declared.len() - 1]),
        ),
        _ => (declared, None),
    }
}

fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            c if c == separator && depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}
