use sn_core::NarrativeError;
use sn_tool::SnToolError;
use std::fmt::Display;

pub(crate) fn map_error(code: &'static str, error: impl Display) -> NarrativeError {
    NarrativeError::new(code, error.to_string())
}

pub(crate) fn emit_error(error: NarrativeError) -> i32 {
    println!("RESULT:ERROR");
    println!("ERROR_CODE:{}", error.code);
    println!(
        "ERROR_MSG_JSON:{}",
        serde_json::to_string(&error.message).unwrap_or_else(|_| "\"Unknown error\"".to_string())
    );
    1
}

pub(crate) fn map_tui_io(error: std::io::Error) -> NarrativeError {
    map_error("TUI_IO", error)
}

pub(crate) fn map_cli_source_path(error: std::io::Error) -> NarrativeError {
    map_error("CLI_SOURCE_PATH", error)
}

pub(crate) fn map_cli_state_write(error: std::io::Error) -> NarrativeError {
    map_error("CLI_STATE_WRITE", error)
}

pub(crate) fn map_cli_state_read(error: std::io::Error) -> NarrativeError {
    map_error("CLI_STATE_READ", error)
}

pub(crate) fn map_cli_state_invalid(error: serde_json::Error) -> NarrativeError {
    map_error("CLI_STATE_INVALID", error)
}

pub(crate) fn map_cli_config_read(error: std::io::Error) -> NarrativeError {
    map_error("CLI_CONFIG_READ", error)
}

pub(crate) fn map_cli_config_invalid(error: toml::de::Error) -> NarrativeError {
    map_error("CLI_CONFIG_INVALID", error)
}

pub(crate) fn map_cli_output(error: serde_json::Error) -> NarrativeError {
    map_error("CLI_OUTPUT", error)
}

/// Engine errors keep their own code; everything else gets a CLI code.
pub(crate) fn map_tool_error(error: SnToolError) -> NarrativeError {
    let code = match &error {
        SnToolError::Engine(inner) => return inner.clone(),
        SnToolError::ReadFile { .. } => "CLI_SOURCE_READ",
        SnToolError::SourceEmpty { .. } => "CLI_SOURCE_EMPTY",
        SnToolError::ParseCase { .. } => "CLI_CASE_INVALID",
        SnToolError::InvalidSchemaVersion { .. } => "CLI_CASE_SCHEMA",
        SnToolError::ParseState { .. } => "CLI_STATE_INVALID",
        SnToolError::NotExecutable { .. } => "CLI_SCRIPT_NOT_EXECUTABLE",
        SnToolError::GuardExceeded { .. } => "CLI_DRAIN_GUARD",
        SnToolError::EventCountMismatch { .. }
        | SnToolError::EventMismatch { .. }
        | SnToolError::StateMismatch { .. }
        | SnToolError::EventSerialize(_) => "CLI_CASE_MISMATCH",
    };
    map_error(code, error)
}
