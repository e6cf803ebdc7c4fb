use sn_core::{NarrativeError, Value};
use sn_runtime::{assign_path, parse_path, resolve_path, resolve_segments, PathSegment};
use tracing::debug;

const TARGET: &str = "sn::world";

fn invalid(message: impl Into<String>) -> NarrativeError {
    NarrativeError::new("WORLD_UPDATE_INVALID", message)
}

fn required<'a>(payload: &'a Value, key: &str, action: &str) -> Result<&'a Value, NarrativeError> {
    payload
        .get_present(key)
        .ok_or_else(|| invalid(format!("\"{}\" request has no {}", action, key)))
}

/// `svm` requests address the keyed `svms` collection.
fn collection_name(target: &str) -> &str {
    match target {
        "svm" => "svms",
        other => other,
    }
}

/// World state owned outside the engines. Applies `requestWorldStateUpdate`
/// requests and answers snapshot reads.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldStore {
    state: Value,
}

impl Default for WorldStore {
    fn default() -> Self {
        Self::new(Value::empty_map())
    }
}

impl WorldStore {
    /// A non-map initial state is replaced by an empty map.
    pub fn new(state: Value) -> Self {
        let state = if state.as_map().is_some() {
            state
        } else {
            Value::empty_map()
        };
        Self { state }
    }

    pub fn state(&self) -> &Value {
        &self.state
    }

    pub fn into_state(self) -> Value {
        self.state
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        resolve_path(&self.state, path)
    }

    pub fn apply(&mut self, request: &Value) -> Result<(), NarrativeError> {
        let target = request
            .get("target")
            .and_then(Value::as_str)
            .filter(|target| !target.trim().is_empty())
            .ok_or_else(|| invalid("update request has no target"))?;
        debug!(target: TARGET, update_target = target, "applying world state update");
        match request.get("action").and_then(Value::as_str) {
            Some(action) => self.apply_action(target, action, request.get("payload").unwrap_or(&Value::Null)),
            None => self.apply_property(target, request),
        }
    }

    fn apply_property(&mut self, target: &str, request: &Value) -> Result<(), NarrativeError> {
        let mut segments = vec![PathSegment::Key(collection_name(target).to_string())];
        if let Some(id) = request.get_present("id") {
            segments.push(PathSegment::Lookup(id.to_text()));
        }
        if let Some(property) = request.get("property").and_then(Value::as_str) {
            segments.extend(parse_path(property));
        }

        let mut value = request.get("value").cloned().unwrap_or_default();
        if request.get("merge") == Some(&Value::Bool(true)) {
            if let Some(entries) = value.as_map_mut() {
                entries.remove("_update_");
            }
            let merged = match (resolve_segments(&self.state, &segments), &value) {
                (Some(Value::Map(current)), Value::Map(update)) => {
                    let mut merged = current.clone();
                    merged.extend(update.iter().map(|(key, item)| (key.clone(), item.clone())));
                    Some(Value::Map(merged))
                }
                _ => None,
            };
            if let Some(merged) = merged {
                value = merged;
            }
        }

        assign_path(&mut self.state, &segments, value)
            .map_err(|message| invalid(format!("cannot update {}: {}", target, message)))
    }

    fn apply_action(&mut self, target: &str, action: &str, payload: &Value) -> Result<(), NarrativeError> {
        match (target, action) {
            ("tasks", "unlock") => {
                let task_id = required(payload, "taskId", action)?.clone();
                self.push_unique("unlockedTasks", task_id)
            }
            ("tasks", "offer") => {
                let task = required(payload, "task", action)?.clone();
                self.push_unique("offeredTasks", task)
            }
            ("discoveredClues", "addById") => {
                let clue_id = required(payload, "clueId", action)?.clone();
                self.push_unique("discoveredClues", clue_id)
            }
            ("puzzleControl", "activatePuzzle") => {
                let puzzle_id = required(payload, "puzzleId", action)?.to_text();
                self.set_puzzle_status(&puzzle_id, "active")?;
                self.assign(vec![PathSegment::Key("activePuzzleId".to_string())], Value::from(puzzle_id))
            }
            ("puzzleStateProperty", "set") => {
                let puzzle_id = required(payload, "puzzleId", action)?.to_text();
                let path = required(payload, "path", action)?.to_text();
                let value = payload.get("value").cloned().unwrap_or_default();
                let mut segments = puzzle_segments(&puzzle_id);
                segments.extend(parse_path(&path));
                self.assign(segments, value)
            }
            _ => Err(invalid(format!(
                "unsupported update action \"{}\" on \"{}\"",
                action, target
            ))),
        }
    }

    /// Marks a task completed the way `WAIT_FOR_TASK_COMPLETED` reads it.
    pub fn complete_task(&mut self, task_id: Value) -> Result<(), NarrativeError> {
        self.push_unique("completedTasks", Value::object([("taskId", task_id)]))
    }

    pub fn solve_puzzle(&mut self, puzzle_id: &Value) -> Result<(), NarrativeError> {
        self.set_puzzle_status(&puzzle_id.to_text(), "solved")
    }

    fn set_puzzle_status(&mut self, puzzle_id: &str, status: &str) -> Result<(), NarrativeError> {
        let mut segments = puzzle_segments(puzzle_id);
        segments.push(PathSegment::Key("status".to_string()));
        self.assign(segments, Value::from(status))
    }

    fn assign(&mut self, segments: Vec<PathSegment>, value: Value) -> Result<(), NarrativeError> {
        assign_path(&mut self.state, &segments, value).map_err(invalid)
    }

    fn push_unique(&mut self, list: &str, item: Value) -> Result<(), NarrativeError> {
        let Some(entries) = self.state.as_map_mut() else {
            return Err(invalid("world state is not a map"));
        };
        let slot = entries
            .entry(list.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if slot.is_null() {
            *slot = Value::Array(Vec::new());
        }
        match slot {
            Value::Array(items) => {
                if !items.contains(&item) {
                    items.push(item);
                }
                Ok(())
            }
            other => Err(invalid(format!("\"{}\" is a {}, not a list", list, other.type_name()))),
        }
    }
}

fn puzzle_segments(puzzle_id: &str) -> Vec<PathSegment> {
    vec![
        PathSegment::Key("currentPuzzleState".to_string()),
        PathSegment::Key(puzzle_id.to_string()),
    ]
}
