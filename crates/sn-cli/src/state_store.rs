use std::fs;
use std::path::Path;

use sn_core::{NarrativeError, Value};
use sn_tool::{read_state_file, SnToolError};

use crate::{
    map_cli_state_invalid, map_cli_state_read, map_cli_state_write, map_error, SaveFileV1,
    SAVE_SCHEMA,
};

pub(crate) fn save_progress(path: &Path, save: &SaveFileV1) -> Result<(), NarrativeError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(map_cli_state_write)?;

    let payload = serde_json::to_string(save).map_err(|error| map_error("CLI_STATE_WRITE", error))?;
    fs::write(path, payload).map_err(map_cli_state_write)
}

pub(crate) fn load_progress(path: &Path) -> Result<SaveFileV1, NarrativeError> {
    if !path.exists() {
        return Err(NarrativeError::new(
            "CLI_STATE_NOT_FOUND",
            format!("Save file does not exist: {}", path.display()),
        ));
    }

    let raw = fs::read_to_string(path).map_err(map_cli_state_read)?;

    let save: SaveFileV1 = serde_json::from_str(&raw).map_err(map_cli_state_invalid)?;

    if save.schema_version != SAVE_SCHEMA {
        return Err(NarrativeError::new(
            "CLI_STATE_SCHEMA",
            format!("Unsupported save schema: {}", save.schema_version),
        ));
    }

    Ok(save)
}

/// Initial world state for `play`.
pub(crate) fn load_world_state(path: &Path) -> Result<Value, NarrativeError> {
    if !path.exists() {
        return Err(NarrativeError::new(
            "CLI_STATE_NOT_FOUND",
            format!("World state file does not exist: {}", path.display()),
        ));
    }

    read_state_file(path).map_err(|error| match error {
        SnToolError::ParseState { .. } => map_error("CLI_STATE_INVALID", error),
        other => map_error("CLI_STATE_READ", other),
    })
}
