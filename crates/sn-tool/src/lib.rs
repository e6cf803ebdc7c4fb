mod case;
mod runner;
mod session;
mod source;
mod world;

pub use case::{ExpectedEvent, TestAction, TestCase, TESTCASE_FILE, TESTCASE_SCHEMA_V1};
pub use runner::{assert_case, run_case, run_case_with_options, verify_report, RunReport};
pub use session::Session;
pub use source::{read_definitions_from_dir, read_scripts_from_dir, read_state_file, read_test_case, source_from_dir};
pub use world::WorldStore;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnToolError {
    #[error("Failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse testcase {path}: {source}")]
    ParseCase {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to parse world state {path}: {source}")]
    ParseState {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid testcase schema version \"{found}\", expected \"{expected}\".")]
    InvalidSchemaVersion { expected: String, found: String },
    #[error("No script .json files under {path}.")]
    SourceEmpty { path: PathBuf },
    #[error("Engine error: {0}")]
    Engine(#[from] sn_core::NarrativeError),
    #[error("Script \"{script_id}\" has no resolvable start step.")]
    NotExecutable { script_id: String },
    #[error("Guard exceeded: event queue still busy after {max_ticks} ticks.")]
    GuardExceeded { max_ticks: usize },
    #[error("Expected event count {expected}, actual {actual}. observed={observed}")]
    EventCountMismatch {
        expected: usize,
        actual: usize,
        observed: String,
    },
    #[error("Event mismatch at index {index}. expected={expected} actual={actual}")]
    EventMismatch {
        index: usize,
        expected: String,
        actual: String,
    },
    #[error("World state mismatch at \"{path}\". expected={expected} actual={actual}")]
    StateMismatch {
        path: String,
        expected: String,
        actual: String,
    },
    #[error("Failed to serialize event for diff: {0}")]
    EventSerialize(serde_json::Error),
}
