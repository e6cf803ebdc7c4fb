use sn_core::{CompiledStep, Value};

use crate::helpers::template::{render_template, resolve_placeholders, TemplateScope};

const RENDERED_FIELDS: [&str; 3] = ["text", "prompt", "title"];

/// Copy of a step for display: `text`, `prompt`, `title`, `task` and choice
/// labels rendered against the snapshot. The tree is left untouched.
pub fn present_step(step: &CompiledStep, snapshot: &Value, event_data: Option<&Value>) -> Value {
    let scope = TemplateScope::new(snapshot, event_data);
    let mut value = step.to_value();
    let Some(entries) = value.as_map_mut() else {
        return value;
    };

    for field in RENDERED_FIELDS {
        if let Some(Value::String(template)) = entries.get(field) {
            let rendered = render_template(template, scope);
            entries.insert(field.to_string(), Value::String(rendered));
        }
    }
    if let Some(task) = entries.get("task") {
        let resolved = resolve_placeholders(task, scope);
        entries.insert("task".to_string(), resolved);
    }
    if step.has_choices() {
        let choices = step
            .choices
            .iter()
            .map(|choice| {
                Value::object([
                    ("text", Value::from(render_template(&choice.text, scope))),
                    (
                        "nextStep",
                        choice.next_step.as_ref().map(Value::from).unwrap_or_default(),
                    ),
                ])
            })
            .collect();
        entries.insert("choices".to_string(), Value::Array(choices));
    }
    value
}
