mod handlers;
mod notify;
mod present;

use std::sync::Arc;

use sn_core::{CompiledStep, ExecutionTree, StepId, Value};
use tracing::{debug, warn};

pub use present::present_step;

const TARGET: &str = "sn::engine";

pub const DEFAULT_MAX_ITERATIONS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Steps one `notify` call may visit before the engine is force-finished.
    pub max_iterations: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// What an engine needs from its surroundings while handling an event.
pub trait EngineHost {
    /// Latest world state. Engines never mutate it.
    fn snapshot(&mut self) -> Value;
    /// Outbound request raised by a step.
    fn emit(&mut self, event: &str, payload: Value);
}

/// Host with a fixed state that records everything emitted.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    pub state: Value,
    pub emitted: Vec<(String, Value)>,
}

impl RecordingHost {
    pub fn new(state: Value) -> Self {
        Self {
            state,
            emitted: Vec::new(),
        }
    }

    pub fn emitted_named(&self, event: &str) -> Vec<&Value> {
        self.emitted
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, payload)| payload)
            .collect()
    }
}

impl EngineHost for RecordingHost {
    fn snapshot(&mut self) -> Value {
        self.state.clone()
    }

    fn emit(&mut self, event: &str, payload: Value) {
        self.emitted.push((event.to_string(), payload));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyReport {
    pub previous: Option<StepId>,
    pub current: Option<StepId>,
    pub finished: bool,
    pub transitions: usize,
}

impl NotifyReport {
    pub fn step_changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Cursor over one script's execution tree.
#[derive(Debug, Clone)]
pub struct ScriptEngine {
    tree: Arc<ExecutionTree>,
    options: EngineOptions,
    current: Option<StepId>,
    finished: bool,
    action_done: bool,
    carried: Option<Value>,
}

impl ScriptEngine {
    pub fn new(tree: Arc<ExecutionTree>, start: Option<StepId>) -> Self {
        Self::with_options(tree, start, EngineOptions::default())
    }

    pub fn with_options(tree: Arc<ExecutionTree>, start: Option<StepId>, options: EngineOptions) -> Self {
        let start = match start {
            Some(id) if tree.contains(&id) => Some(id),
            Some(id) => {
                debug!(
                    target: TARGET,
                    script_id = %tree.script_id,
                    start = %id,
                    "start override is unknown, using entry"
                );
                None
            }
            None => None,
        };
        let current = start.or_else(|| tree.entry.clone().filter(|id| tree.contains(id)));
        let finished = current.is_none();
        if finished {
            warn!(target: TARGET, script_id = %tree.script_id, "script has no resolvable start step");
        }
        Self {
            tree,
            options,
            current,
            finished,
            action_done: false,
            carried: None,
        }
    }

    pub fn script_id(&self) -> &str {
        &self.tree.script_id
    }

    pub fn tree(&self) -> &Arc<ExecutionTree> {
        &self.tree
    }

    pub fn current_step_id(&self) -> Option<&StepId> {
        self.current.as_ref()
    }

    /// Step at the cursor. An unresolvable cursor finishes the engine.
    pub fn current_step(&mut self) -> Option<&CompiledStep> {
        if self.peek_step().is_none() {
            self.force_finish("current step is unresolvable");
            return None;
        }
        self.peek_step()
    }

    pub fn peek_step(&self) -> Option<&CompiledStep> {
        self.current.as_ref().and_then(|id| self.tree.step(id))
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Payload of the wait step that led to the current step, until used.
    pub fn carried_event(&self) -> Option<&Value> {
        self.carried.as_ref()
    }

    pub fn reset(&mut self) {
        self.current = self.tree.entry.clone().filter(|id| self.tree.contains(id));
        self.finished = self.current.is_none();
        self.action_done = false;
        self.carried = None;
        debug!(target: TARGET, script_id = %self.tree.script_id, "engine reset");
    }

    fn force_finish(&mut self, reason: &str) {
        if !self.finished {
            warn!(
                target: TARGET,
                script_id = %self.tree.script_id,
                step_id = %self.current.as_ref().map(StepId::as_str).unwrap_or_default(),
                reason,
                "script force-finished"
            );
        }
        self.finished = true;
    }
}
