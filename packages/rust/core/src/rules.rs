//! Rule engine: select the pack rules whose `when` clause holds.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;
use tracing::{debug, instrument};

use repath_shared::{Item, Rule};
use repath_text::Tokenizer;

use crate::context::ResolvedContext;

/// Return the rules that match, in pack order.
#[instrument(skip_all, fields(rules = rules.len(), item_id = item.map(|i| i.id.as_str())))]
pub fn match_rules<'r>(
    rules: &'r [Rule],
    context: &ResolvedContext,
    item: Option<&Item>,
    query_tokens: &[String],
    tokenizer: &Tokenizer,
) -> Vec<&'r Rule> {
    let matched: Vec<&Rule> = rules
        .iter()
        .filter(|rule| rule_matches(rule, context, item, query_tokens, tokenizer))
        .collect();
    debug!(matched = matched.len(), "rules evaluated");
    matched
}

/// Whether every condition present on `rule.when` holds.
pub fn rule_matches(
    rule: &Rule,
    context: &ResolvedContext,
    item: Option<&Item>,
    query_tokens: &[String],
    tokenizer: &Tokenizer,
) -> bool {
    let when = &rule.when;

    if !when.item_ids.is_empty() {
        let listed = item.is_some_and(|item| when.item_ids.iter().any(|id| *id == item.id));
        if !listed {
            return false;
        }
    }

    if !when.keywords.is_empty() {
        let mut source: HashSet<String> = query_tokens.iter().cloned().collect();
        if let Some(item) = item {
            source.extend(tokenizer.tokenize(&item.name));
            source.extend(tokenizer.tokenize_all(item.keywords.iter().map(String::as_str)));
        }
        let hit = when
            .keywords
            .iter()
            .any(|keyword| tokenizer.tokenize(keyword).iter().any(|t| source.contains(t)));
        if !hit {
            return false;
        }
    }

    observations_match(&when.obs, &context.obs)
}

// ---------------------------------------------------------------------------
// Observation comparison
// ---------------------------------------------------------------------------

/// An observation value after coercion.
#[derive(Debug, Clone, PartialEq)]
enum Observed<'a> {
    /// Missing key or JSON `null`.
    Absent,
    Bool(bool),
    Number(f64),
    Text(&'a str),
    Structured(&'a Value),
}

fn coerce(value: Option<&Value>) -> Observed<'_> {
    match value {
        None | Some(Value::Null) => Observed::Absent,
        Some(Value::Bool(b)) => Observed::Bool(*b),
        Some(Value::Number(n)) => n.as_f64().map_or(Observed::Absent, Observed::Number),
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" => Observed::Bool(true),
            "false" => Observed::Bool(false),
            _ => Observed::Text(s),
        },
        Some(other) => Observed::Structured(other),
    }
}

/// Strict equality after coercion, except that a number and a numeric
/// string compare by value.
fn observed_equal(expected: &Observed<'_>, actual: &Observed<'_>) -> bool {
    match (expected, actual) {
        (Observed::Number(n), Observed::Text(s)) | (Observed::Text(s), Observed::Number(n)) => {
            s.trim().parse::<f64>().is_ok_and(|parsed| parsed == *n)
        }
        _ => expected == actual,
    }
}

fn observations_match(expected: &BTreeMap<String, Value>, actual: &BTreeMap<String, Value>) -> bool {
    expected.iter().all(|(key, want)| {
        let equal = observed_equal(&coerce(Some(want)), &coerce(actual.get(key)));
        if !equal {
            debug!(key, "observation mismatch");
        }
        equal
    })
}
