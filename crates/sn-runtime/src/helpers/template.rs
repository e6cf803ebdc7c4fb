use std::sync::OnceLock;

use regex::Regex;
use sn_core::Value;

use super::value_path::resolve_path;

const EVENT_DATA_PREFIX: &str = "eventData";

/// Values a `${path}` placeholder may read from.
#[derive(Debug, Clone, Copy)]
pub struct TemplateScope<'a> {
    pub snapshot: &'a Value,
    pub event_data: Option<&'a Value>,
}

impl<'a> TemplateScope<'a> {
    pub fn new(snapshot: &'a Value, event_data: Option<&'a Value>) -> Self {
        Self {
            snapshot,
            event_data,
        }
    }

    /// `eventData.x` reads the event payload, anything else the snapshot.
    pub fn lookup(&self, path: &str) -> Option<&'a Value> {
        let path = path.trim();
        if path == EVENT_DATA_PREFIX {
            return self.event_data;
        }
        match path.strip_prefix("eventData.") {
            Some(rest) => self.event_data.and_then(|data| resolve_path(data, rest)),
            None => resolve_path(self.snapshot, path),
        }
    }
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\$\{([^{}]+)\}").expect("template regex must compile"))
}

/// Replaces every `${path}`; unresolved paths render as an empty string.
pub fn render_template(template: &str, scope: TemplateScope<'_>) -> String {
    let mut output = String::new();
    let mut last_index = 0usize;
    for captures in placeholder_regex().captures_iter(template) {
        let (Some(full), Some(path)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        output.push_str(&template[last_index..full.start()]);
        if let Some(value) = scope.lookup(path.as_str()) {
            output.push_str(&value.to_text());
        }
        last_index = full.end();
    }
    output.push_str(&template[last_index..]);
    output
}

/// Renders every string inside `value`, keeping its shape.
pub fn resolve_placeholders(value: &Value, scope: TemplateScope<'_>) -> Value {
    match value {
        Value::String(text) => Value::String(render_template(text, scope)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_placeholders(item, scope))
                .collect(),
        ),
        Value::Map(entries) => Value::Map(
            entries
                .iter()
                .map(|(key, item)| (key.clone(), resolve_placeholders(item, scope)))
                .collect(),
        ),
        other => other.clone(),
    }
}
