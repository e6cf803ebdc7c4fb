use std::path::Path;

use sn_bus::MemorySource;
use sn_core::{NarrativeError, Value};
use sn_tool::Session;
use tracing::info;

use crate::{
    load_progress, map_tool_error, save_progress, PlayContext, SaveFileV1, SAVE_SCHEMA, TARGET,
};

pub(crate) fn new_session(context: &PlayContext<'_>, state: Value) -> Session {
    let source: MemorySource = context.scripts.definitions.clone().into_iter().collect();
    let mut session = Session::new(Box::new(source), state, context.options.clone());
    if context.stub_ai {
        session.enable_stub_ai();
    }
    session
}

pub(crate) fn start_session(context: &PlayContext<'_>, state: Value) -> Result<Session, NarrativeError> {
    let mut session = new_session(context, state);
    session
        .activate(context.entry_script, None)
        .map_err(map_tool_error)?;
    Ok(session)
}

pub(crate) fn save_session(path: &Path, session: &Session, scripts_id: &str) -> Result<(), NarrativeError> {
    let save = SaveFileV1 {
        schema_version: SAVE_SCHEMA.to_string(),
        scripts_id: scripts_id.to_string(),
        progress: session.bus().progress(),
        world_state: session.world_state(),
    };
    save_progress(path, &save)?;
    info!(target: TARGET, path = %path.display(), scripts = save.progress.len(), "progress saved");
    Ok(())
}

/// Rebuilds a session from a save made over the same scripts dir.
pub(crate) fn load_session(path: &Path, context: &PlayContext<'_>) -> Result<Session, NarrativeError> {
    let save = load_progress(path)?;
    if save.scripts_id != context.scripts.id {
        return Err(NarrativeError::new(
            "TUI_SAVE_SCRIPTS_MISMATCH",
            format!(
                "Save scripts mismatch. expected={} actual={}",
                context.scripts.id, save.scripts_id
            ),
        ));
    }

    let mut session = new_session(context, save.world_state);
    let restored = session.bus_mut().restore(&save.progress)?;
    info!(target: TARGET, path = %path.display(), restored, "progress loaded");
    Ok(session)
}
