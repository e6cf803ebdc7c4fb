use std::path::PathBuf;

use walkdir::WalkDir;

pub fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

pub fn demos_root() -> PathBuf {
    workspace_root().join("demos")
}

pub fn demo_dir(name: &str) -> PathBuf {
    demos_root().join(name)
}

pub fn testcase_path(name: &str) -> PathBuf {
    demo_dir(name).join(sn_tool::TESTCASE_FILE)
}

/// Demo directories that carry a test case, sorted by name.
pub fn demo_names() -> Vec<String> {
    WalkDir::new(demos_root())
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .filter(|entry| entry.path().join(sn_tool::TESTCASE_FILE).is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect()
}
