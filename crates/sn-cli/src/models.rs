use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sn_bus::BusOptions;
use sn_core::{StepId, Value};

pub(crate) const SAVE_SCHEMA: &str = "sn-cli-save.v1";
pub(crate) const DEFAULT_SAVE_FILE: &str = ".storynet/save.json";
pub(crate) const SCRIPTS_DIR_PREFIX: &str = "scripts-dir:";

#[derive(Debug, Clone)]
pub(crate) struct LoadedScripts {
    pub(crate) id: String,
    pub(crate) root: PathBuf,
    /// Raw script files keyed by path relative to `root`.
    pub(crate) files: BTreeMap<String, String>,
    /// Definitions keyed by script id.
    pub(crate) definitions: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SaveFileV1 {
    pub(crate) schema_version: String,
    pub(crate) scripts_id: String,
    pub(crate) progress: BTreeMap<String, StepId>,
    pub(crate) world_state: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TuiCommandAction {
    NotHandled,
    Continue,
    /// Events were sent; drain the queue and print what happened.
    Settle,
    Quit,
}

pub(crate) struct PlayContext<'a> {
    pub(crate) save_file: &'a str,
    pub(crate) scripts: &'a LoadedScripts,
    pub(crate) entry_script: &'a str,
    pub(crate) options: &'a BusOptions,
    pub(crate) stub_ai: bool,
}
