mod bus;
mod queue;
mod source;

pub use bus::{ActivationOutcome, BusOptions, DrainReport, EventBus, SubscriptionId, DEFAULT_MAX_DRAIN_TICKS};
pub use queue::BusHandle;
pub use source::{MemorySource, ScriptSource};
