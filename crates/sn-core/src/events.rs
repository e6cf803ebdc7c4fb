//! Event names crossing the bus boundary.

/// Published when an engine is ready on, or moves to, a step. Also the
/// internal step-entered signal engines handle after a transition.
pub const SCRIPT_STEP: &str = "scriptStep";
pub const SCRIPT_FINISHED: &str = "scriptFinished";

pub const DIALOGUE_CLOSED: &str = "dialogueClosed";
pub const PLAYER_CHOICE_MADE: &str = "playerChoiceMade";
pub const BRANCH_CHOICE: &str = "branchChoice";
pub const AI_DECISION_RESULT: &str = "aiDecisionResult";
pub const TASK_COMPLETED: &str = "task_completed";
pub const PUZZLE_SOLVED: &str = "puzzle_solved";

pub const REQUEST_AI_DIALOGUE: &str = "requestAIDialogue";
pub const REQUEST_AI_DECISION: &str = "requestAIDecision";
pub const REQUEST_WORLD_STATE_UPDATE: &str = "requestWorldStateUpdate";
pub const SYNC_DATA_TO_BACKEND: &str = "SYNC_DATA_TO_BACKEND";
pub const DATA_SYNC_COMPLETE: &str = "DATA_SYNC_COMPLETE";

/// Payload key carrying an inline world state snapshot.
pub const WORLD_STATE_KEY: &str = "worldState";
/// Payload key naming the script an event is addressed to.
pub const SCRIPT_ID_KEY: &str = "scriptId";
/// Payload key carrying a chosen next step id.
pub const NEXT_STEP_KEY: &str = "nextStep";

/// Events produced for the state owner or the backend that engines never
/// react to.
pub const FEEDBACK_EVENTS: [&str; 3] = [
    REQUEST_WORLD_STATE_UPDATE,
    SYNC_DATA_TO_BACKEND,
    DATA_SYNC_COMPLETE,
];

pub fn is_feedback_event(name: &str) -> bool {
    FEEDBACK_EVENTS.contains(&name)
}
