use sn_compiler::compile_script;
use sn_core::{NarrativeError, StepId, Value};

use crate::{load_scripts_by_dir, CheckArgs, LoadedScripts};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScriptCheck {
    pub(crate) script_id: String,
    pub(crate) steps: usize,
    /// Authored steps the compiler could not keep.
    pub(crate) dropped: usize,
    pub(crate) entry: Option<StepId>,
    pub(crate) trigger: Option<String>,
    pub(crate) executable: bool,
}

impl ScriptCheck {
    pub(crate) fn is_degraded(&self) -> bool {
        !self.executable || self.dropped > 0
    }
}

pub(crate) fn run_check(args: CheckArgs) -> Result<i32, NarrativeError> {
    let scripts = load_scripts_by_dir(&args.scripts_dir)?;
    emit_check(&scripts, &check_scripts(&scripts));
    Ok(0)
}

pub(crate) fn check_scripts(scripts: &LoadedScripts) -> Vec<ScriptCheck> {
    scripts
        .definitions
        .iter()
        .map(|(script_id, definition)| {
            let tree = compile_script(script_id, definition);
            let authored = definition
                .get("steps")
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            ScriptCheck {
                script_id: script_id.clone(),
                steps: tree.len(),
                dropped: authored.saturating_sub(tree.len()),
                entry: tree.entry.clone(),
                trigger: tree.trigger.clone(),
                executable: tree.is_executable(),
            }
        })
        .collect()
}

fn emit_check(scripts: &LoadedScripts, checks: &[ScriptCheck]) {
    println!("RESULT:OK");
    println!("EVENT:CHECKED");
    println!("SOURCE:{}|files={}", scripts.root.display(), scripts.files.len());
    for check in checks {
        println!(
            "SCRIPT:{}|steps={}|dropped={}|entry={}|trigger={}|status={}",
            check.script_id,
            check.steps,
            check.dropped,
            check.entry.as_ref().map_or("NONE", StepId::as_str),
            check.trigger.as_deref().unwrap_or("NONE"),
            if check.is_degraded() { "degraded" } else { "ok" }
        );
    }
    println!(
        "SUMMARY:scripts={}|degraded={}",
        checks.len(),
        checks.iter().filter(|check| check.is_degraded()).count()
    );
}
