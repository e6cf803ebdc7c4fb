use std::cmp::Ordering;

use sn_core::{Comparator, Condition, ConditionLeaf, Value};
use tracing::{debug, warn};

use super::value_path::{lookup_item, resolve_path};

const EVENT_DATA_TARGET: &str = "eventData";

/// Evaluates a compiled condition. Pure: reads only its inputs, and anything
/// unresolved or malformed is false.
pub fn evaluate_condition(condition: &Condition, snapshot: &Value, event_data: Option<&Value>) -> bool {
    match condition {
        Condition::All(clauses) => clauses
            .iter()
            .all(|clause| evaluate_condition(clause, snapshot, event_data)),
        Condition::Any(clauses) => clauses
            .iter()
            .any(|clause| evaluate_condition(clause, snapshot, event_data)),
        Condition::Leaf(leaf) => evaluate_leaf(leaf, snapshot, event_data),
        Condition::Invalid(reason) => {
            debug!(target: "sn::engine", reason = %reason, "invalid condition evaluates to false");
            false
        }
    }
}

fn evaluate_leaf(leaf: &ConditionLeaf, snapshot: &Value, event_data: Option<&Value>) -> bool {
    let source = if leaf.target == EVENT_DATA_TARGET {
        event_data
    } else {
        resolve_path(snapshot, &leaf.target)
    };
    let Some(source) = source else {
        return false;
    };

    let subject = match &leaf.id {
        Some(id) => {
            let collection = leaf.target.rsplit('.').next();
            match lookup_item(source, collection, &id.to_text()) {
                Some(item) => item,
                None => return false,
            }
        }
        None => source,
    };

    let actual = match &leaf.property {
        Some(property) => resolve_path(subject, property),
        None => Some(subject),
    };
    match actual {
        Some(actual) if !actual.is_null() => compare(actual, &leaf.comparator, &leaf.value),
        _ => false,
    }
}

fn compare(actual: &Value, comparator: &Comparator, expected: &Value) -> bool {
    match comparator {
        Comparator::Eq => actual == expected,
        Comparator::Ne => actual != expected,
        Comparator::Gt => order(actual, expected) == Some(Ordering::Greater),
        Comparator::Ge => matches!(
            order(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Comparator::Lt => order(actual, expected) == Some(Ordering::Less),
        Comparator::Le => matches!(
            order(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Comparator::Contains => contains(actual, expected).unwrap_or(false),
        Comparator::NotContains => contains(actual, expected).map(|found| !found).unwrap_or(false),
        Comparator::Unsupported(symbol) => {
            warn!(target: "sn::engine", operator = %symbol, "unsupported condition operator");
            false
        }
    }
}

fn order(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Number(left), Value::Number(right)) => left.partial_cmp(right),
        (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        _ => None,
    }
}

/// `None` when `actual` is not a container.
fn contains(actual: &Value, expected: &Value) -> Option<bool> {
    match actual {
        Value::Array(items) => Some(
            items
                .iter()
                .any(|item| item == expected || item.get("id") == Some(expected)),
        ),
        Value::String(text) => Some(text.contains(expected.to_text().as_str())),
        _ => None,
    }
}
