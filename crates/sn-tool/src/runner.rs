use std::path::Path;

use sn_bus::BusOptions;
use sn_core::Value;

use crate::source::{read_test_case, source_from_dir};
use crate::{ExpectedEvent, Session, SnToolError, TestAction, TestCase};

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub observed_events: Vec<ExpectedEvent>,
    pub applied_actions: usize,
    pub final_state: Value,
}

fn apply_action(session: &mut Session, action: &TestAction) -> Result<(), SnToolError> {
    match action {
        TestAction::Publish { event, data } => session.publish(event, &payload(data)),
        TestAction::Notify {
            script_id,
            event,
            data,
        } => {
            session.notify_script(script_id, event, &payload(data));
        }
        TestAction::CompleteTask { task_id } => session.complete_task(task_id.clone())?,
        TestAction::SolvePuzzle { puzzle_id } => session.solve_puzzle(puzzle_id.clone())?,
    }
    Ok(())
}

/// Omitted action data is an empty payload.
fn payload(data: &Value) -> Value {
    if data.is_null() {
        Value::empty_map()
    } else {
        data.clone()
    }
}

pub fn run_case(example_dir: &Path, case: &TestCase) -> Result<RunReport, SnToolError> {
    run_case_with_options(example_dir, case, BusOptions::default())
}

pub fn run_case_with_options(
    example_dir: &Path,
    case: &TestCase,
    options: BusOptions,
) -> Result<RunReport, SnToolError> {
    let source = source_from_dir(example_dir)?;
    let mut session = Session::new(Box::new(source), case.initial_state.clone(), options);
    if case.stub_ai {
        session.enable_stub_ai();
    }

    session.activate(&case.script_id, None)?;
    session.settle()?;
    for action in &case.actions {
        apply_action(&mut session, action)?;
        session.settle()?;
    }

    Ok(RunReport {
        observed_events: session.take_events(),
        applied_actions: case.actions.len(),
        final_state: session.world_state(),
    })
}

pub fn assert_case(example_dir: &Path, case_path: &Path) -> Result<(), SnToolError> {
    let case = read_test_case(case_path)?;
    let report = run_case(example_dir, &case)?;
    verify_report(&case, &report)
}

/// Compares a run against the case's expected transcript and state.
pub fn verify_report(case: &TestCase, report: &RunReport) -> Result<(), SnToolError> {
    if report.observed_events.len() != case.expected_events.len() {
        let observed = serde_json::to_string_pretty(&report.observed_events)
            .map_err(SnToolError::EventSerialize)?;
        return Err(SnToolError::EventCountMismatch {
            expected: case.expected_events.len(),
            actual: report.observed_events.len(),
            observed,
        });
    }

    for (index, (expected, actual)) in case
        .expected_events
        .iter()
        .zip(report.observed_events.iter())
        .enumerate()
    {
        if expected != actual {
            let expected = serde_json::to_string(expected).map_err(SnToolError::EventSerialize)?;
            let actual = serde_json::to_string(actual).map_err(SnToolError::EventSerialize)?;
            return Err(SnToolError::EventMismatch {
                index,
                expected,
                actual,
            });
        }
    }

    for (path, expected) in &case.expected_state {
        let actual = sn_runtime::resolve_path(&report.final_state, path);
        if actual != Some(expected) {
            return Err(SnToolError::StateMismatch {
                path: path.clone(),
                expected: expected.to_compact_json(),
                actual: actual.map(Value::to_compact_json).unwrap_or_else(|| "<missing>".to_string()),
            });
        }
    }

    Ok(())
}
