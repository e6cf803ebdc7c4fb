use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use sn_bus::MemorySource;
use sn_compiler::definitions_from_json_map;
use sn_core::Value;
use walkdir::WalkDir;

use crate::{SnToolError, TestCase, TESTCASE_FILE, TESTCASE_SCHEMA_V1};

/// Script files under `dir` keyed by relative path. Test cases are skipped.
pub fn read_scripts_from_dir(dir: &Path) -> Result<BTreeMap<String, String>, SnToolError> {
    let mut scripts = BTreeMap::new();

    for entry in WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json")
            || entry.file_name() == TESTCASE_FILE
        {
            continue;
        }

        let Ok(relative) = path.strip_prefix(dir) else {
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");

        let content = fs::read_to_string(path).map_err(|source| SnToolError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        scripts.insert(relative, content);
    }

    if scripts.is_empty() {
        return Err(SnToolError::SourceEmpty {
            path: dir.to_path_buf(),
        });
    }

    Ok(scripts)
}

pub fn read_definitions_from_dir(dir: &Path) -> Result<BTreeMap<String, Value>, SnToolError> {
    let scripts = read_scripts_from_dir(dir)?;
    Ok(definitions_from_json_map(&scripts)?)
}

/// Directory of script JSON files as a bus script source.
pub fn source_from_dir(dir: &Path) -> Result<MemorySource, SnToolError> {
    Ok(read_definitions_from_dir(dir)?.into_iter().collect())
}

pub fn read_test_case(case_path: &Path) -> Result<TestCase, SnToolError> {
    let raw = fs::read_to_string(case_path).map_err(|source| SnToolError::ReadFile {
        path: case_path.to_path_buf(),
        source,
    })?;
    let parsed: TestCase = serde_json::from_str(&raw).map_err(|source| SnToolError::ParseCase {
        path: case_path.to_path_buf(),
        source,
    })?;

    if parsed.schema_version != TESTCASE_SCHEMA_V1 {
        return Err(SnToolError::InvalidSchemaVersion {
            expected: TESTCASE_SCHEMA_V1.to_string(),
            found: parsed.schema_version,
        });
    }

    Ok(parsed)
}

pub fn read_state_file(path: &Path) -> Result<Value, SnToolError> {
    let raw = fs::read_to_string(path).map_err(|source| SnToolError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| SnToolError::ParseState {
        path: path.to_path_buf(),
        source,
    })
}
