use sn_core::{Comparator, Condition, ConditionLeaf, Value};

/// Parses an authored condition clause. Never fails: anything malformed
/// becomes [`Condition::Invalid`], which evaluates to false.
pub fn parse_condition(value: &Value) -> Condition {
    let Some(entries) = value.as_map() else {
        return Condition::Invalid(format!("condition must be a map, got {}", value.type_name()));
    };

    let operator = entries
        .get("operator")
        .and_then(Value::as_str)
        .unwrap_or_default();

    if let Some(clauses) = entries.get("clauses") {
        let Some(clauses) = clauses.as_array() else {
            return Condition::Invalid("composite clauses must be a list".to_string());
        };
        let parsed = clauses.iter().map(parse_condition).collect::<Vec<_>>();
        return match operator.to_ascii_uppercase().as_str() {
            "AND" => Condition::All(parsed),
            "OR" => Condition::Any(parsed),
            other => Condition::Invalid(format!("unsupported composite operator \"{}\"", other)),
        };
    }

    let Some(target) = entries
        .get("target")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|target| !target.is_empty())
    else {
        return Condition::Invalid("leaf clause is missing a target".to_string());
    };

    let property = entries
        .get("property")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|property| !property.is_empty())
        .map(ToString::to_string);

    Condition::Leaf(ConditionLeaf {
        target: target.to_string(),
        id: entries.get("id").filter(|id| !id.is_null()).cloned(),
        property,
        comparator: Comparator::from_symbol(operator),
        value: entries.get("value").cloned().unwrap_or_default(),
    })
}

#[cfg(test)]
mod condition_tests {
    use super::*;

    fn parse(json: &str) -> Condition {
        let raw: serde_json::Value = serde_json::from_str(json).expect("json should parse");
        parse_condition(&Value::from(raw))
    }

    #[test]
    fn parses_leaf_clause() {
        let condition = parse(
            r#"{"target":"player","property":"credits","operator":">=","value":100}"#,
        );
        let Condition::Leaf(leaf) = condition else {
            panic!("leaf expected");
        };
        assert_eq!(leaf.target, "player");
        assert_eq!(leaf.property.as_deref(), Some("credits"));
        assert_eq!(leaf.comparator, Comparator::Ge);
        assert_eq!(leaf.value, Value::Number(100.0));
        assert_eq!(leaf.id, None);
    }

    #[test]
    fn parses_nested_composites() {
        let condition = parse(
            r#"{"operator":"AND","clauses":[
                {"target":"svms","id":5,"property":"status","operator":"===","value":"online"},
                {"operator":"or","clauses":[{"target":"player","property":"level","operator":">","value":2}]}
            ]}"#,
        );
        let Condition::All(clauses) = condition else {
            panic!("all expected");
        };
        assert_eq!(clauses.len(), 2);
        assert!(matches!(&clauses[0], Condition::Leaf(leaf) if leaf.id == Some(Value::Number(5.0))));
        assert!(matches!(&clauses[1], Condition::Any(inner) if inner.len() == 1));
    }

    #[test]
    fn malformed_clauses_become_invalid() {
        assert!(matches!(parse(r#""credits > 1""#), Condition::Invalid(_)));
        assert!(matches!(
            parse(r#"{"property":"credits","operator":"==","value":1}"#),
            Condition::Invalid(_)
        ));
        assert!(matches!(
            parse(r#"{"operator":"XOR","clauses":[]}"#),
            Condition::Invalid(_)
        ));
        assert!(matches!(
            parse(r#"{"operator":"AND","clauses":{}}"#),
            Condition::Invalid(_)
        ));
    }

    #[test]
    fn unknown_leaf_operator_is_kept_for_runtime_logging() {
        let condition = parse(r#"{"target":"player","property":"x","operator":"~","value":1}"#);
        assert!(matches!(
            condition,
            Condition::Leaf(ConditionLeaf { comparator: Comparator::Unsupported(ref op), .. }) if op == "~"
        ));
    }
}
