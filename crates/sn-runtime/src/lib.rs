mod engine;
pub mod helpers;

pub use engine::{
    present_step, EngineHost, EngineOptions, NotifyReport, RecordingHost, ScriptEngine,
    DEFAULT_MAX_ITERATIONS,
};
pub use helpers::condition::evaluate_condition;
pub use helpers::template::{render_template, resolve_placeholders, TemplateScope};
pub use helpers::value_path::{
    assign_path, parse_path, resolve_path, resolve_segments, PathSegment, KEYED_COLLECTIONS,
};
