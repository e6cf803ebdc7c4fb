use std::collections::{BTreeMap, BTreeSet};

use sn_core::{ChoiceOption, CompiledStep, ExecutionTree, StepEdges, StepId, StepKind, Value};
use tracing::{debug, warn};

use crate::condition::parse_condition;

const TARGET: &str = "sn::compiler";

/// Compiles a raw script definition into an execution tree.
///
/// Compilation never fails. Malformed steps are skipped, dangling edges are
/// nulled and an unusable entry leaves the tree non-executable; each case is
/// logged.
pub fn compile_script(script_id: &str, definition: &Value) -> ExecutionTree {
    let mut tree = ExecutionTree {
        script_id: script_id.to_string(),
        ..ExecutionTree::default()
    };

    let Some(entries) = definition.as_map() else {
        warn!(
            target: TARGET,
            script_id,
            found = definition.type_name(),
            "script definition is not a map"
        );
        return tree;
    };

    tree.title = entries
        .get("title")
        .and_then(Value::as_str)
        .map(ToString::to_string);
    tree.trigger = entries
        .get("trigger")
        .and_then(Value::as_str)
        .filter(|trigger| !trigger.trim().is_empty())
        .map(ToString::to_string);

    for (index, raw) in raw_steps(script_id, entries.get("steps")).into_iter().enumerate() {
        let Some(step) = compile_step(script_id, index, raw) else {
            continue;
        };
        if tree.steps.contains_key(&step.step_id) {
            warn!(
                target: TARGET,
                script_id,
                step_id = %step.step_id,
                "duplicate step id, keeping the first definition"
            );
            continue;
        }
        tree.order.push(step.step_id.clone());
        tree.steps.insert(step.step_id.clone(), step);
    }

    tree.entry = resolve_entry(script_id, entries.get("entry"), &tree);
    resolve_edges(script_id, &mut tree.steps);

    if tree.entry.is_none() {
        warn!(target: TARGET, script_id, "script has no resolvable entry step");
    } else {
        debug!(
            target: TARGET,
            script_id,
            steps = tree.steps.len(),
            entry = %tree.entry.as_ref().map(StepId::as_str).unwrap_or_default(),
            "compiled script"
        );
    }
    tree
}

fn raw_steps<'a>(script_id: &str, steps: Option<&'a Value>) -> Vec<&'a Value> {
    match steps {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Map(items)) => items.values().collect(),
        Some(other) if !other.is_null() => {
            warn!(
                target: TARGET,
                script_id,
                found = other.type_name(),
                "steps must be a list or a map"
            );
            Vec::new()
        }
        _ => {
            warn!(target: TARGET, script_id, "script has no steps");
            Vec::new()
        }
    }
}

fn compile_step(script_id: &str, index: usize, raw: &Value) -> Option<CompiledStep> {
    let Some(fields) = raw.as_map() else {
        warn!(target: TARGET, script_id, index, "step entry is not a map, skipped");
        return None;
    };

    let Some(step_id) = fields.get("stepId").and_then(StepId::from_value) else {
        warn!(target: TARGET, script_id, index, "step has no valid stepId, skipped");
        return None;
    };

    let kind = match fields.get("type").and_then(Value::as_str) {
        Some(tag) => StepKind::from_tag(tag),
        None => StepKind::Unknown(String::new()),
    };
    if let StepKind::Unknown(tag) = &kind {
        warn!(target: TARGET, script_id, step_id = %step_id, tag = %tag, "unknown step type");
    }

    let edge = |names: &[&str]| {
        names
            .iter()
            .find_map(|name| fields.get(*name).and_then(StepId::from_value))
    };
    let edges = StepEdges {
        next: edge(&["nextStep"]),
        on_true: edge(&["nextStepOnTrue", "onTrue"]),
        on_false: edge(&["nextStepOnFalse", "onFalse"]),
        on_accept: edge(&["nextStepOnAccept"]),
        on_decline: edge(&["nextStepOnDecline"]),
        on_wait: edge(&["stepIdOnWait"]),
    };

    let choices = match fields.get("choices") {
        Some(Value::Array(items)) => items.iter().filter_map(compile_choice).collect(),
        _ => Vec::new(),
    };

    Some(CompiledStep {
        end_script: fields.get("endScript").and_then(Value::as_bool) == Some(true),
        condition: fields
            .get("condition")
            .filter(|condition| !condition.is_null())
            .map(parse_condition),
        step_id,
        kind,
        edges,
        choices,
        fields: fields.clone(),
    })
}

fn compile_choice(raw: &Value) -> Option<ChoiceOption> {
    let entries = raw.as_map()?;
    Some(ChoiceOption {
        text: entries
            .get("text")
            .map(Value::to_text)
            .unwrap_or_default(),
        next_step: entries.get("nextStep").and_then(StepId::from_value),
    })
}

fn resolve_entry(script_id: &str, explicit: Option<&Value>, tree: &ExecutionTree) -> Option<StepId> {
    match explicit.filter(|entry| !entry.is_null()) {
        Some(raw) => {
            let entry = StepId::from_value(raw);
            match entry {
                Some(entry) if tree.contains(&entry) => Some(entry),
                _ => {
                    warn!(
                        target: TARGET,
                        script_id,
                        entry = %raw.to_text(),
                        "explicit entry does not name a compiled step"
                    );
                    None
                }
            }
        }
        None => tree.order.first().cloned(),
    }
}

fn resolve_edges(script_id: &str, steps: &mut BTreeMap<StepId, CompiledStep>) {
    let known = steps.keys().cloned().collect::<BTreeSet<_>>();
    let check = |step_id: &StepId, name: &str, target: &mut Option<StepId>| {
        if let Some(id) = target.as_ref() {
            if !known.contains(id) {
                warn!(
                    target: TARGET,
                    script_id,
                    step_id = %step_id,
                    edge = name,
                    missing = %id,
                    "edge points to an unknown step, cleared"
                );
                *target = None;
            }
        }
    };

    for step in steps.values_mut() {
        let step_id = step.step_id.clone();
        if step.is_terminal() && step.edges.next.take().is_some() {
            debug!(target: TARGET, script_id, step_id = %step_id, "terminal step ignores nextStep");
        }
        check(&step_id, "next", &mut step.edges.next);
        check(&step_id, "onTrue", &mut step.edges.on_true);
        check(&step_id, "onFalse", &mut step.edges.on_false);
        check(&step_id, "onAccept", &mut step.edges.on_accept);
        check(&step_id, "onDecline", &mut step.edges.on_decline);
        check(&step_id, "onWait", &mut step.edges.on_wait);
        for choice in &mut step.choices {
            check(&step_id, "choice", &mut choice.next_step);
        }
    }
}
