//! Dotted/bracketed path expressions over [`Value`] trees.
//!
//! `player.inventory[0].name` walks maps by key and arrays by position.
//! Collections listed in [`KEYED_COLLECTIONS`] are arrays of records looked
//! up by their `id` field instead: `svms[5]` is the record whose id is 5.

use sn_core::{number_to_text, Value};

pub const KEYED_COLLECTIONS: [&str; 1] = ["svms"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Lookup(String),
}

pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    for part in path.split('.').map(str::trim).filter(|part| !part.is_empty()) {
        match split_lookups(part) {
            Some((name, lookups)) => {
                if !name.is_empty() {
                    segments.push(PathSegment::Key(name.to_string()));
                }
                segments.extend(lookups.into_iter().map(PathSegment::Lookup));
            }
            None => segments.push(PathSegment::Key(part.to_string())),
        }
    }
    segments
}

fn split_lookups(part: &str) -> Option<(&str, Vec<String>)> {
    let open = part.find('[')?;
    let (name, mut rest) = part.split_at(open);
    let mut lookups = Vec::new();
    while let Some(inner) = rest.strip_prefix('[') {
        let close = inner.find(']')?;
        lookups.push(inner[..close].trim().to_string());
        rest = &inner[close + 1..];
    }
    if !rest.is_empty() {
        return None;
    }
    Some((name, lookups))
}

pub fn resolve_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    resolve_segments(root, &parse_path(path))
}

pub fn resolve_segments<'a>(root: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    let mut current = root;
    let mut collection: Option<&str> = None;
    for segment in segments {
        match segment {
            PathSegment::Key(key) => {
                current = lookup_key(current, key)?;
                collection = Some(key.as_str());
            }
            PathSegment::Lookup(key) => {
                current = lookup_item(current, collection, key)?;
                collection = None;
            }
        }
    }
    Some(current)
}

fn lookup_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Map(entries) => entries.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    }
}

/// Bracket lookup. `collection` is the key the value was reached through.
pub fn lookup_item<'a>(value: &'a Value, collection: Option<&str>, key: &str) -> Option<&'a Value> {
    match value {
        Value::Map(entries) => entries.get(key),
        Value::Array(items) if is_keyed(collection) => items
            .iter()
            .find(|item| item.get("id").is_some_and(|id| id_matches(id, key))),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    }
}

pub fn is_keyed(collection: Option<&str>) -> bool {
    collection.is_some_and(|name| KEYED_COLLECTIONS.contains(&name))
}

pub fn id_matches(id: &Value, key: &str) -> bool {
    match id {
        Value::String(text) => text == key,
        Value::Number(number) => number_to_text(*number) == key,
        _ => false,
    }
}

/// Writes `value` at `segments`, creating intermediate maps as needed.
/// Array items must already exist.
pub fn assign_path(target: &mut Value, segments: &[PathSegment], value: Value) -> Result<(), String> {
    assign_at(target, None, segments, value)
}

fn assign_at(
    target: &mut Value,
    collection: Option<&str>,
    segments: &[PathSegment],
    value: Value,
) -> Result<(), String> {
    let Some((head, rest)) = segments.split_first() else {
        *target = value;
        return Ok(());
    };

    if target.is_null() {
        *target = Value::empty_map();
    }

    let (key, next_collection, keyed_lookup) = match head {
        PathSegment::Key(key) => (key, Some(key.as_str()), false),
        PathSegment::Lookup(key) => (key, None, is_keyed(collection)),
    };

    match target {
        Value::Map(entries) => {
            let slot = entries.entry(key.clone()).or_insert(Value::Null);
            assign_at(slot, next_collection, rest, value)
        }
        Value::Array(items) => {
            let slot = if keyed_lookup {
                items
                    .iter_mut()
                    .find(|item| item.get("id").is_some_and(|id| id_matches(id, key)))
            } else {
                key.parse::<usize>().ok().and_then(|index| items.get_mut(index))
            };
            let slot = slot.ok_or_else(|| format!("missing item \"{}\"", key))?;
            assign_at(slot, next_collection, rest, value)
        }
        other => Err(format!("cannot set \"{}\" on a {}", key, other.type_name())),
    }
}

#[cfg(test)]
mod value_path_tests {
    use super::*;

    fn state() -> Value {
        let raw: serde_json::Value = serde_json::from_str(
            r#"{
                "player": {"credits": 1000, "inventory": [{"name": "key"}, {"name": "map"}]},
                "svms": [{"id": 3, "status": "offline"}, {"id": 5, "status": "online"}],
                "tasks": {"t1": {"done": true}}
            }"#,
        )
        .expect("json should parse");
        Value::from(raw)
    }

    #[test]
    fn parse_path_splits_keys_and_lookups() {
        assert_eq!(
            parse_path("svms[5].status"),
            vec![
                PathSegment::Key("svms".to_string()),
                PathSegment::Lookup("5".to_string()),
                PathSegment::Key("status".to_string()),
            ]
        );
        assert_eq!(
            parse_path(" a . b "),
            vec![PathSegment::Key("a".to_string()), PathSegment::Key("b".to_string())]
        );
        assert_eq!(
            parse_path("grid[1][2]"),
            vec![
                PathSegment::Key("grid".to_string()),
                PathSegment::Lookup("1".to_string()),
                PathSegment::Lookup("2".to_string()),
            ]
        );
        assert_eq!(parse_path("broken[1"), vec![PathSegment::Key("broken[1".to_string())]);
        assert!(parse_path("").is_empty());
    }

    #[test]
    fn resolves_maps_positions_and_keyed_records() {
        let state = state();
        assert_eq!(resolve_path(&state, "player.credits"), Some(&Value::Number(1000.0)));
        assert_eq!(
            resolve_path(&state, "player.inventory[1].name"),
            Some(&Value::from("map"))
        );
        assert_eq!(resolve_path(&state, "svms[5].status"), Some(&Value::from("online")));
        assert_eq!(resolve_path(&state, "svms[0].status"), None);
        assert_eq!(resolve_path(&state, "tasks[t1].done"), Some(&Value::Bool(true)));
        assert_eq!(resolve_path(&state, "player.inventory.0.name"), Some(&Value::from("key")));
    }

    #[test]
    fn unresolved_paths_are_none() {
        let state = state();
        assert_eq!(resolve_path(&state, "foo.bar"), None);
        assert_eq!(resolve_path(&state, "player.credits.amount"), None);
        assert_eq!(resolve_path(&state, "player.inventory[9]"), None);
    }

    #[test]
    fn assign_path_creates_maps_and_updates_records() {
        let mut state = state();
        assign_path(&mut state, &parse_path("flags.intro.seen"), Value::Bool(true))
            .expect("assign should create maps");
        assert_eq!(resolve_path(&state, "flags.intro.seen"), Some(&Value::Bool(true)));

        assign_path(&mut state, &parse_path("svms[3].status"), Value::from("online"))
            .expect("assign should update keyed record");
        assert_eq!(resolve_path(&state, "svms[3].status"), Some(&Value::from("online")));

        let error = assign_path(&mut state, &parse_path("svms[42].status"), Value::Null)
            .expect_err("missing record should fail");
        assert!(error.contains("42"));

        let error = assign_path(&mut state, &parse_path("player.credits.amount"), Value::Null)
            .expect_err("scalar parent should fail");
        assert!(error.contains("number"));
    }
}
