use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::sync::Arc;

use sn_compiler::compile_script;
use sn_core::events::{FEEDBACK_EVENTS, SCRIPT_FINISHED, SCRIPT_ID_KEY, SCRIPT_STEP, WORLD_STATE_KEY};
use sn_core::{CompiledStep, ExecutionTree, NarrativeError, StepId, Value};
use sn_runtime::{present_step, EngineHost, EngineOptions, NotifyReport, ScriptEngine};
use tracing::{debug, info, warn};

use crate::queue::{push, BusHandle, QueuedEvent, SharedQueue};
use crate::source::ScriptSource;

const TARGET: &str = "sn::bus";

pub const DEFAULT_MAX_DRAIN_TICKS: usize = 1000;

pub type SubscriptionId = u64;

type Handler = Box<dyn FnMut(&Value)>;
type Accessor = Box<dyn Fn() -> Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusOptions {
    pub engine: EngineOptions,
    /// Ticks `run_until_idle` may spend before giving up on a busy queue.
    pub max_drain_ticks: usize,
    /// Events delivered to subscribers only, never to engines.
    pub feedback_events: Vec<String>,
}

impl Default for BusOptions {
    fn default() -> Self {
        Self {
            engine: EngineOptions::default(),
            max_drain_ticks: DEFAULT_MAX_DRAIN_TICKS,
            feedback_events: FEEDBACK_EVENTS.iter().map(|name| name.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    Activated,
    /// An engine for the script id is already live and was kept.
    AlreadyActive,
    /// The tree has no resolvable start step; nothing was registered.
    NotExecutable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainReport {
    pub ticks: usize,
    pub events: usize,
    /// False when the tick cap was hit with events still queued.
    pub idle: bool,
}

struct Subscriber {
    id: SubscriptionId,
    event: String,
    handler: Handler,
}

fn deliver(subscribers: &mut [Subscriber], event: &str, data: &Value) {
    for subscriber in subscribers.iter_mut().filter(|subscriber| subscriber.event == event) {
        (subscriber.handler)(data);
    }
}

fn snapshot_from(accessor: Option<&Accessor>) -> Value {
    accessor.map(|read| read()).unwrap_or_else(Value::empty_map)
}

/// Host handed to engines during a publish: emissions reach subscribers at
/// once and engines on a later tick.
struct BusHost<'a> {
    subscribers: &'a mut [Subscriber],
    accessor: Option<&'a Accessor>,
    queue: &'a SharedQueue,
    feedback_events: &'a [String],
}

impl EngineHost for BusHost<'_> {
    fn snapshot(&mut self) -> Value {
        snapshot_from(self.accessor)
    }

    fn emit(&mut self, event: &str, payload: Value) {
        deliver(self.subscribers, event, &payload);
        if !self.feedback_events.iter().any(|name| name == event) {
            push(
                self.queue,
                QueuedEvent::Broadcast {
                    event: event.to_string(),
                    data: payload,
                },
            );
        }
    }
}

fn queue_derived(queue: &SharedQueue, script_id: &str, report: &NotifyReport) {
    if report.finished {
        push(
            queue,
            QueuedEvent::Publish {
                event: SCRIPT_FINISHED.to_string(),
                data: Value::object([(SCRIPT_ID_KEY, Value::from(script_id))]),
            },
        );
    } else if report.transitions > 0 {
        push(
            queue,
            QueuedEvent::StepReady {
                script_id: script_id.to_string(),
            },
        );
    }
}

/// Pub/sub registry, active engine registry and deferred event queue.
pub struct EventBus {
    options: BusOptions,
    subscribers: Vec<Subscriber>,
    next_subscription: SubscriptionId,
    accessor: Option<Accessor>,
    engines: Vec<ScriptEngine>,
    trees: BTreeMap<String, Arc<ExecutionTree>>,
    sources: Vec<Box<dyn ScriptSource>>,
    /// Scripts that ran to completion; trigger activation skips them.
    completed: BTreeSet<String>,
    queue: SharedQueue,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_options(BusOptions::default())
    }

    pub fn with_options(options: BusOptions) -> Self {
        Self {
            options,
            subscribers: Vec::new(),
            next_subscription: 1,
            accessor: None,
            engines: Vec::new(),
            trees: BTreeMap::new(),
            sources: Vec::new(),
            completed: BTreeSet::new(),
            queue: SharedQueue::default(),
        }
    }

    pub fn options(&self) -> &BusOptions {
        &self.options
    }

    pub fn handle(&self) -> BusHandle {
        BusHandle::new(Rc::clone(&self.queue))
    }

    pub fn subscribe<F>(&mut self, event: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: FnMut(&Value) + 'static,
    {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.subscribers.push(Subscriber {
            id,
            event: event.into(),
            handler: Box::new(handler),
        });
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|subscriber| subscriber.id != id);
        before != self.subscribers.len()
    }

    /// Replaces any previously registered accessor.
    pub fn register_world_state_accessor<F>(&mut self, accessor: F)
    where
        F: Fn() -> Value + 'static,
    {
        self.accessor = Some(Box::new(accessor));
    }

    pub fn world_state(&self) -> Value {
        snapshot_from(self.accessor.as_ref())
    }

    pub fn register_source(&mut self, source: Box<dyn ScriptSource>) {
        self.sources.push(source);
    }

    pub fn publish(&mut self, event: &str, data: &Value) {
        debug!(target: TARGET, event, "publish");
        deliver(&mut self.subscribers, event, data);
        if !self.is_feedback(event) {
            self.broadcast(event, data);
        }
        self.activate_triggered(event);
    }

    /// Delivers an event to one engine, skipping subscribers and the
    /// broadcast. Returns false when no engine runs `script_id`.
    pub fn notify_script(&mut self, script_id: &str, event: &str, data: &Value) -> bool {
        let Some(engine) = self
            .engines
            .iter_mut()
            .find(|engine| engine.script_id() == script_id)
        else {
            debug!(target: TARGET, script_id, event, "no active engine for direct notify");
            return false;
        };
        let mut host = BusHost {
            subscribers: &mut self.subscribers,
            accessor: self.accessor.as_ref(),
            queue: &self.queue,
            feedback_events: &self.options.feedback_events,
        };
        let report = engine.notify(event, data, &mut host);
        queue_derived(&self.queue, script_id, &report);
        self.evict_finished();
        true
    }

    /// Builds an engine for `script_id` from `definition`, the cached tree or
    /// a registered source, and queues its first `scriptStep`.
    pub fn activate(
        &mut self,
        script_id: &str,
        definition: Option<&Value>,
        start: Option<StepId>,
    ) -> Result<ActivationOutcome, NarrativeError> {
        if self.is_active(script_id) {
            warn!(target: TARGET, script_id, "script already active, keeping existing engine");
            return Ok(ActivationOutcome::AlreadyActive);
        }

        let tree = self.tree_for(script_id, definition)?;
        let engine = ScriptEngine::with_options(tree, start, self.options.engine);
        if engine.is_finished() {
            warn!(target: TARGET, script_id, "script has no resolvable start step, not activated");
            return Ok(ActivationOutcome::NotExecutable);
        }

        info!(
            target: TARGET,
            script_id,
            step_id = %engine.current_step_id().map(StepId::as_str).unwrap_or_default(),
            "script activated"
        );
        self.engines.push(engine);
        self.completed.remove(script_id);
        push(
            &self.queue,
            QueuedEvent::StepReady {
                script_id: script_id.to_string(),
            },
        );
        Ok(ActivationOutcome::Activated)
    }

    /// Resets a live engine to its entry, or activates the script again from
    /// its cached tree or a source.
    pub fn restart(&mut self, script_id: &str) -> Result<ActivationOutcome, NarrativeError> {
        let Some(engine) = self
            .engines
            .iter_mut()
            .find(|engine| engine.script_id() == script_id)
        else {
            return self.activate(script_id, None, None);
        };
        engine.reset();
        info!(target: TARGET, script_id, "script restarted");
        push(
            &self.queue,
            QueuedEvent::StepReady {
                script_id: script_id.to_string(),
            },
        );
        Ok(ActivationOutcome::Activated)
    }

    pub fn is_active(&self, script_id: &str) -> bool {
        self.engine(script_id).is_some()
    }

    /// Active script ids in registration order.
    pub fn active_script_ids(&self) -> Vec<String> {
        self.engines
            .iter()
            .map(|engine| engine.script_id().to_string())
            .collect()
    }

    pub fn current_step(&self, script_id: &str) -> Option<&CompiledStep> {
        self.engine(script_id).and_then(ScriptEngine::peek_step)
    }

    /// Current step with placeholders resolved against the latest snapshot.
    pub fn present_current(&self, script_id: &str) -> Option<Value> {
        let engine = self.engine(script_id)?;
        let step = engine.peek_step()?;
        Some(present_step(step, &self.world_state(), engine.carried_event()))
    }

    /// Script id to current step id for every active engine.
    pub fn progress(&self) -> BTreeMap<String, StepId> {
        self.engines
            .iter()
            .filter_map(|engine| {
                engine
                    .current_step_id()
                    .map(|step_id| (engine.script_id().to_string(), step_id.clone()))
            })
            .collect()
    }

    /// Activates every script in `progress` at its saved step. Returns how
    /// many engines were registered.
    pub fn restore(&mut self, progress: &BTreeMap<String, StepId>) -> Result<usize, NarrativeError> {
        let mut activated = 0;
        for (script_id, step_id) in progress {
            if self.activate(script_id, None, Some(step_id.clone()))? == ActivationOutcome::Activated {
                activated += 1;
            }
        }
        Ok(activated)
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Delivers the events queued before this call. Events they cause wait
    /// for the next tick. Returns how many were delivered.
    pub fn tick(&mut self) -> usize {
        let batch: Vec<QueuedEvent> = self.queue.borrow_mut().drain(..).collect();
        let delivered = batch.len();
        for queued in batch {
            self.dispatch(queued);
        }
        delivered
    }

    pub fn run_until_idle(&mut self) -> DrainReport {
        let mut report = DrainReport::default();
        while self.pending() > 0 {
            if report.ticks >= self.options.max_drain_ticks {
                warn!(
                    target: TARGET,
                    ticks = report.ticks,
                    pending = self.pending(),
                    "drain tick cap reached with events still queued"
                );
                return report;
            }
            report.events += self.tick();
            report.ticks += 1;
        }
        report.idle = true;
        report
    }

    fn dispatch(&mut self, queued: QueuedEvent) {
        match queued {
            QueuedEvent::Publish { event, data } => self.publish(&event, &data),
            QueuedEvent::Broadcast { event, data } => self.broadcast(&event, &data),
            QueuedEvent::Notify {
                script_id,
                event,
                data,
            } => {
                self.notify_script(&script_id, &event, &data);
            }
            QueuedEvent::StepReady { script_id } => {
                if let Some(payload) = self.step_payload(&script_id) {
                    self.publish(SCRIPT_STEP, &payload);
                }
            }
        }
    }

    fn step_payload(&self, script_id: &str) -> Option<Value> {
        let engine = self.engine(script_id)?;
        let step = engine.peek_step()?;
        let snapshot = self.world_state();
        let presented = present_step(step, &snapshot, engine.carried_event());
        Some(Value::object([
            (SCRIPT_ID_KEY, Value::from(script_id)),
            ("stepId", Value::from(&step.step_id)),
            ("step", presented),
            (WORLD_STATE_KEY, snapshot),
        ]))
    }

    fn broadcast(&mut self, event: &str, data: &Value) {
        let mut host = BusHost {
            subscribers: &mut self.subscribers,
            accessor: self.accessor.as_ref(),
            queue: &self.queue,
            feedback_events: &self.options.feedback_events,
        };
        for engine in self.engines.iter_mut() {
            if engine.is_finished() {
                continue;
            }
            let report = engine.notify(event, data, &mut host);
            queue_derived(&self.queue, engine.script_id(), &report);
        }
        self.evict_finished();
    }

    fn activate_triggered(&mut self, event: &str) {
        let triggered: Vec<String> = self
            .sources
            .iter()
            .flat_map(|source| source.triggered_by(event))
            .collect();
        for script_id in triggered {
            if self.is_active(&script_id) || self.completed.contains(&script_id) {
                continue;
            }
            debug!(target: TARGET, script_id = %script_id, event, "trigger matched");
            if let Err(error) = self.activate(&script_id, None, None) {
                warn!(target: TARGET, script_id = %script_id, %error, "triggered activation failed");
            }
        }
    }

    fn evict_finished(&mut self) {
        let completed = &mut self.completed;
        self.engines.retain(|engine| {
            if engine.is_finished() {
                debug!(target: TARGET, script_id = engine.script_id(), "engine removed");
                completed.insert(engine.script_id().to_string());
                false
            } else {
                true
            }
        });
    }

    fn is_feedback(&self, event: &str) -> bool {
        self.options.feedback_events.iter().any(|name| name == event)
    }

    fn engine(&self, script_id: &str) -> Option<&ScriptEngine> {
        self.engines
            .iter()
            .find(|engine| engine.script_id() == script_id)
    }

    fn tree_for(&mut self, script_id: &str, definition: Option<&Value>) -> Result<Arc<ExecutionTree>, NarrativeError> {
        if let Some(definition) = definition {
            return Ok(self.cache_tree(script_id, definition));
        }
        if let Some(tree) = self.trees.get(script_id) {
            return Ok(Arc::clone(tree));
        }
        let from_source = self
            .sources
            .iter()
            .find_map(|source| source.definition(script_id));
        match from_source {
            Some(definition) => Ok(self.cache_tree(script_id, &definition)),
            None => Err(NarrativeError::new(
                "BUS_SCRIPT_NOT_FOUND",
                format!("Script \"{}\" has no definition, cached tree or source.", script_id),
            )),
        }
    }

    fn cache_tree(&mut self, script_id: &str, definition: &Value) -> Arc<ExecutionTree> {
        let tree = Arc::new(compile_script(script_id, definition));
        self.trees.insert(script_id.to_string(), Arc::clone(&tree));
        tree
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("options", &self.options)
            .field("subscribers", &self.subscribers.len())
            .field("engines", &self.active_script_ids())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests;
