use std::cell::RefCell;
use std::rc::Rc;

use sn_bus::{ActivationOutcome, BusOptions, DrainReport, EventBus, ScriptSource};
use sn_core::events::{
    AI_DECISION_RESULT, DIALOGUE_CLOSED, NEXT_STEP_KEY, PUZZLE_SOLVED, REQUEST_AI_DECISION,
    REQUEST_AI_DIALOGUE, REQUEST_WORLD_STATE_UPDATE, TASK_COMPLETED,
};
use sn_core::{StepId, Value};
use tracing::warn;

use crate::{ExpectedEvent, SnToolError, WorldStore};

const TARGET: &str = "sn::tool";

/// A bus wired to a [`WorldStore`] state owner and a transcript recorder.
pub struct Session {
    bus: EventBus,
    world: Rc<RefCell<WorldStore>>,
    transcript: Rc<RefCell<Vec<ExpectedEvent>>>,
}

impl Session {
    pub fn new(source: Box<dyn ScriptSource>, state: Value, options: BusOptions) -> Self {
        let mut bus = EventBus::with_options(options);
        let world = Rc::new(RefCell::new(WorldStore::new(state)));
        let transcript = Rc::new(RefCell::new(Vec::new()));

        bus.register_source(source);

        let reader = Rc::clone(&world);
        bus.register_world_state_accessor(move || reader.borrow().state().clone());

        let writer = Rc::clone(&world);
        bus.subscribe(REQUEST_WORLD_STATE_UPDATE, move |request: &Value| {
            if let Err(error) = writer.borrow_mut().apply(request) {
                warn!(target: TARGET, %error, "world state update rejected");
            }
        });

        for name in ExpectedEvent::observed_event_names() {
            let recorder = Rc::clone(&transcript);
            bus.subscribe(name, move |data: &Value| {
                if let Some(observed) = ExpectedEvent::observe(name, data) {
                    recorder.borrow_mut().push(observed);
                }
            });
        }

        Self {
            bus,
            world,
            transcript,
        }
    }

    /// Answers AI requests on the next tick: dialogues close at once and
    /// decisions take their default (or first option's) next step.
    pub fn enable_stub_ai(&mut self) {
        let handle = self.bus.handle();
        self.bus.subscribe(REQUEST_AI_DIALOGUE, move |request: &Value| {
            if let Some(script_id) = request.get("scriptId").and_then(Value::as_str) {
                handle.notify_script(script_id, DIALOGUE_CLOSED, Value::empty_map());
            }
        });

        let handle = self.bus.handle();
        self.bus.subscribe(REQUEST_AI_DECISION, move |request: &Value| {
            let Some(script_id) = request.get("scriptId").and_then(Value::as_str) else {
                return;
            };
            let chosen = request.get_present("defaultNextStep").cloned().or_else(|| {
                request
                    .get("options")
                    .and_then(Value::as_array)
                    .and_then(|options| options.first())
                    .and_then(|option| option.get_present(NEXT_STEP_KEY))
                    .cloned()
            });
            let data = match chosen {
                Some(next) => Value::object([(NEXT_STEP_KEY, next)]),
                None => Value::empty_map(),
            };
            handle.notify_script(script_id, AI_DECISION_RESULT, data);
        });
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    pub fn world_state(&self) -> Value {
        self.world.borrow().state().clone()
    }

    pub fn world(&self) -> WorldStore {
        self.world.borrow().clone()
    }

    pub fn activate(&mut self, script_id: &str, start: Option<StepId>) -> Result<(), SnToolError> {
        match self.bus.activate(script_id, None, start)? {
            ActivationOutcome::NotExecutable => Err(SnToolError::NotExecutable {
                script_id: script_id.to_string(),
            }),
            ActivationOutcome::Activated | ActivationOutcome::AlreadyActive => Ok(()),
        }
    }

    pub fn publish(&mut self, event: &str, data: &Value) {
        self.bus.publish(event, data);
    }

    pub fn notify_script(&mut self, script_id: &str, event: &str, data: &Value) -> bool {
        self.bus.notify_script(script_id, event, data)
    }

    /// Records the task in the world state, then publishes its completion.
    pub fn complete_task(&mut self, task_id: Value) -> Result<(), SnToolError> {
        self.world.borrow_mut().complete_task(task_id.clone())?;
        self.bus
            .publish(TASK_COMPLETED, &Value::object([("taskId", task_id)]));
        Ok(())
    }

    pub fn solve_puzzle(&mut self, puzzle_id: Value) -> Result<(), SnToolError> {
        self.world.borrow_mut().solve_puzzle(&puzzle_id)?;
        self.bus
            .publish(PUZZLE_SOLVED, &Value::object([("puzzleId", puzzle_id)]));
        Ok(())
    }

    /// Drains the deferred queue. A queue that never empties is an error.
    pub fn settle(&mut self) -> Result<DrainReport, SnToolError> {
        let report = self.bus.run_until_idle();
        if !report.idle {
            return Err(SnToolError::GuardExceeded {
                max_ticks: self.bus.options().max_drain_ticks,
            });
        }
        Ok(report)
    }

    /// Transcript entries recorded since the last call.
    pub fn take_events(&mut self) -> Vec<ExpectedEvent> {
        std::mem::take(&mut *self.transcript.borrow_mut())
    }
}
