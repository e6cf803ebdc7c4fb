use std::path::PathBuf;

use sn_core::NarrativeError;
use sn_tool::{read_test_case, run_case_with_options, verify_report, RunReport, TestCase, TESTCASE_FILE};

use crate::{map_cli_output, map_tool_error, resolve_scripts_dir, CaseArgs, CliConfig};

pub(crate) fn run_case_command(args: CaseArgs, config: &CliConfig) -> Result<i32, NarrativeError> {
    let case_dir = resolve_scripts_dir(&args.case_dir)?;
    let case_path = args
        .case
        .map(PathBuf::from)
        .unwrap_or_else(|| case_dir.join(TESTCASE_FILE));

    let case = read_test_case(&case_path).map_err(map_tool_error)?;
    let report = run_case_with_options(&case_dir, &case, config.bus_options()).map_err(map_tool_error)?;
    verify_report(&case, &report).map_err(map_tool_error)?;

    emit_case(&case, &report)?;
    Ok(0)
}

fn emit_case(case: &TestCase, report: &RunReport) -> Result<(), NarrativeError> {
    println!("RESULT:OK");
    println!("EVENT:CASE_PASSED");
    println!(
        "CASE:{}|actions={}|events={}",
        case.script_id,
        report.applied_actions,
        report.observed_events.len()
    );
    for event in &report.observed_events {
        println!(
            "TRANSCRIPT_JSON:{}",
            serde_json::to_string(event).map_err(map_cli_output)?
        );
    }
    println!("STATE_JSON:{}", report.final_state.to_compact_json());
    Ok(())
}
