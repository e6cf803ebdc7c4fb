use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use sn_core::Value;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum QueuedEvent {
    /// Subscribers, then engines.
    Publish { event: String, data: Value },
    /// Engines only; subscribers already saw it when it was emitted.
    Broadcast { event: String, data: Value },
    /// One named engine.
    Notify {
        script_id: String,
        event: String,
        data: Value,
    },
    /// `scriptStep` for the engine's step at drain time.
    StepReady { script_id: String },
}

pub(crate) type SharedQueue = Rc<RefCell<VecDeque<QueuedEvent>>>;

pub(crate) fn push(queue: &SharedQueue, event: QueuedEvent) {
    queue.borrow_mut().push_back(event);
}

/// Cloneable sender into a bus's deferred queue. Subscribers use it to
/// publish without re-entering the bus; everything sent is delivered on a
/// later tick.
#[derive(Clone)]
pub struct BusHandle {
    queue: SharedQueue,
}

impl BusHandle {
    pub(crate) fn new(queue: SharedQueue) -> Self {
        Self { queue }
    }

    pub fn publish(&self, event: impl Into<String>, data: Value) {
        push(
            &self.queue,
            QueuedEvent::Publish {
                event: event.into(),
                data,
            },
        );
    }

    pub fn notify_script(&self, script_id: impl Into<String>, event: impl Into<String>, data: Value) {
        push(
            &self.queue,
            QueuedEvent::Notify {
                script_id: script_id.into(),
                event: event.into(),
                data,
            },
        );
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }
}

impl std::fmt::Debug for BusHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusHandle")
            .field("pending", &self.pending())
            .finish()
    }
}
