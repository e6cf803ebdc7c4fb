use std::sync::Arc;

use sn_core::events::{SCRIPT_ID_KEY, SCRIPT_STEP, WORLD_STATE_KEY};
use sn_core::Value;
use tracing::{debug, info};

use super::handlers::{handler_for, StepContext, StepOutcome};
use super::{EngineHost, NotifyReport, ScriptEngine, TARGET};

impl ScriptEngine {
    /// Feeds one event to the engine and runs steps until it pauses,
    /// finishes or hits the iteration cap.
    pub fn notify(&mut self, event: &str, data: &Value, host: &mut dyn EngineHost) -> NotifyReport {
        let mut report = NotifyReport {
            previous: self.current.clone(),
            current: self.current.clone(),
            finished: self.finished,
            transitions: 0,
        };
        if self.finished {
            return report;
        }
        if let Some(addressee) = data.get(SCRIPT_ID_KEY).and_then(Value::as_str) {
            if addressee != self.tree.script_id {
                return report;
            }
        }

        let tree = Arc::clone(&self.tree);
        let mut snapshot = match data.get(WORLD_STATE_KEY) {
            Some(state) if !state.is_null() => state.clone(),
            _ => host.snapshot(),
        };
        let mut event_name = event.to_string();
        let mut payload = data.clone();
        let mut iterations = 0usize;

        loop {
            if iterations >= self.options.max_iterations {
                self.force_finish("step iteration cap reached");
                break;
            }
            iterations += 1;

            let Some(step) = self.current.as_ref().and_then(|id| tree.step(id)) else {
                self.force_finish("current step is unresolvable");
                break;
            };

            let carried = self.carried.take();
            let mut cx = StepContext {
                script_id: &tree.script_id,
                step,
                event: &event_name,
                payload: &payload,
                event_data: carried.as_ref().unwrap_or(&payload),
                snapshot: &snapshot,
                action_pending: !self.action_done,
                action_taken: false,
                carry: None,
                host: &mut *host,
            };
            let outcome = handler_for(&step.kind).handle(&mut cx);
            let StepContext {
                action_taken,
                carry,
                ..
            } = cx;
            if action_taken {
                self.action_done = true;
            }
            if !matches!(outcome, StepOutcome::Goto(_)) {
                self.carried = carried;
            }

            let interactive = step.kind.is_interactive();
            match outcome {
                StepOutcome::Goto(next) => {
                    if !tree.contains(&next) {
                        self.force_finish("transition to an unknown step");
                        break;
                    }
                    debug!(
                        target: TARGET,
                        script_id = %tree.script_id,
                        from = %step.step_id,
                        to = %next,
                        "step transition"
                    );
                    self.current = Some(next);
                    self.action_done = false;
                    self.carried = carry;
                    report.transitions += 1;
                    if interactive {
                        break;
                    }
                    event_name = SCRIPT_STEP.to_string();
                    payload = Value::object([(SCRIPT_ID_KEY, Value::from(tree.script_id.as_str()))]);
                    snapshot = host.snapshot();
                }
                StepOutcome::Completed if step.is_terminal() => {
                    self.finish(&step.step_id.to_string());
                    break;
                }
                StepOutcome::Waiting if step.is_terminal() && !interactive => {
                    self.finish(&step.step_id.to_string());
                    break;
                }
                StepOutcome::Completed => {
                    debug!(
                        target: TARGET,
                        script_id = %tree.script_id,
                        step_id = %step.step_id,
                        "step has no next step, pausing"
                    );
                    break;
                }
                StepOutcome::Waiting => break,
            }
        }

        report.current = self.current.clone();
        report.finished = self.finished;
        report
    }

    fn finish(&mut self, step_id: &str) {
        self.finished = true;
        info!(target: TARGET, script_id = %self.tree.script_id, step_id, "script finished");
    }
}
