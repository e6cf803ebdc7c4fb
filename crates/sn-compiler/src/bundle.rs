use std::collections::BTreeMap;

use sn_core::{ExecutionTree, NarrativeError, Value};

use crate::compile_script;

pub fn parse_definition_json(text: &str) -> Result<Value, NarrativeError> {
    let raw: serde_json::Value = serde_json::from_str(text).map_err(|error| {
        NarrativeError::new(
            "COMPILER_JSON_INVALID",
            format!("Script definition is not valid JSON: {}", error),
        )
    })?;
    Ok(Value::from(raw))
}

/// File name without directories and the `.json` suffix.
pub fn script_id_for_path(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.strip_suffix(".json").unwrap_or(name).to_string()
}

/// Parses a set of script files keyed by relative path into definitions
/// keyed by script id: the definition's `scriptId` when present, else the
/// file name.
pub fn definitions_from_json_map(
    files: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, Value>, NarrativeError> {
    let mut definitions = BTreeMap::new();
    let mut origins: BTreeMap<String, String> = BTreeMap::new();

    for (path, text) in files {
        let definition = parse_definition_json(text).map_err(|error| {
            NarrativeError::new(error.code, format!("{}: {}", path, error.message))
        })?;
        let script_id = definition
            .get("scriptId")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ToString::to_string)
            .unwrap_or_else(|| script_id_for_path(path));

        if let Some(previous) = origins.get(&script_id) {
            return Err(NarrativeError::new(
                "COMPILER_DUPLICATE_SCRIPT",
                format!(
                    "Script \"{}\" is defined by both {} and {}.",
                    script_id, previous, path
                ),
            ));
        }
        origins.insert(script_id.clone(), path.clone());
        definitions.insert(script_id, definition);
    }

    Ok(definitions)
}

pub fn compile_scripts_from_json_map(
    files: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, ExecutionTree>, NarrativeError> {
    Ok(definitions_from_json_map(files)?
        .into_iter()
        .map(|(script_id, definition)| {
            let tree = compile_script(&script_id, &definition);
            (script_id, tree)
        })
        .collect())
}
