use std::collections::BTreeMap;

use sn_core::Value;

/// Supplies script definitions the bus can activate by id or by trigger.
pub trait ScriptSource {
    fn definition(&self, script_id: &str) -> Option<Value>;
    /// Script ids whose `trigger` equals `event`.
    fn triggered_by(&self, event: &str) -> Vec<String>;
}

/// Definitions held in memory, keyed by script id.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    definitions: BTreeMap<String, Value>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, script_id: impl Into<String>, definition: Value) {
        self.definitions.insert(script_id.into(), definition);
    }

    pub fn script_ids(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl FromIterator<(String, Value)> for MemorySource {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            definitions: iter.into_iter().collect(),
        }
    }
}

impl ScriptSource for MemorySource {
    fn definition(&self, script_id: &str) -> Option<Value> {
        self.definitions.get(script_id).cloned()
    }

    fn triggered_by(&self, event: &str) -> Vec<String> {
        self.definitions
            .iter()
            .filter(|(_, definition)| definition.get("trigger").and_then(Value::as_str) == Some(event))
            .map(|(script_id, _)| script_id.clone())
            .collect()
    }
}
