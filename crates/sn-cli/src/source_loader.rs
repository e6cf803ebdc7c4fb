use std::path::{Path, PathBuf};

use sn_compiler::definitions_from_json_map;
use sn_core::NarrativeError;
use sn_tool::read_scripts_from_dir;

use crate::{map_cli_source_path, map_tool_error, LoadedScripts, SCRIPTS_DIR_PREFIX};

pub(crate) fn load_scripts_by_dir(scripts_dir: &str) -> Result<LoadedScripts, NarrativeError> {
    let root = resolve_scripts_dir(scripts_dir)?;
    let files = read_scripts_from_dir(&root).map_err(map_tool_error)?;
    let definitions = definitions_from_json_map(&files)?;

    Ok(LoadedScripts {
        id: make_scripts_dir_id(&root),
        root,
        files,
        definitions,
    })
}

pub(crate) fn resolve_scripts_dir(scripts_dir: &str) -> Result<PathBuf, NarrativeError> {
    let path = PathBuf::from(scripts_dir);
    let absolute = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map_err(map_cli_source_path)?
            .join(path)
    };

    if !absolute.exists() {
        return Err(NarrativeError::new(
            "CLI_SOURCE_NOT_FOUND",
            format!("scripts-dir does not exist: {}", absolute.display()),
        ));
    }

    if !absolute.is_dir() {
        return Err(NarrativeError::new(
            "CLI_SOURCE_NOT_DIR",
            format!("scripts-dir is not a directory: {}", absolute.display()),
        ));
    }

    Ok(absolute)
}

pub(crate) fn make_scripts_dir_id(scripts_dir: &Path) -> String {
    format!("{}{}", SCRIPTS_DIR_PREFIX, scripts_dir.display())
}
