//! RawEvent: a decoded record as an untyped field mapping

use serde_json::{Map, Value};

/// Field name → untyped value (string, number, boolean, nested mapping, list).
///
/// Field order carries no meaning. Duplicate keys in a source record
/// collapse last-write-wins during decoding.
pub type RawEvent = Map<String, Value>;

/// Look up a dotted path (`a.b.c`) through nested objects.
pub fn get_path<'a>(event: &'a RawEvent, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = event.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Remove the value at a dotted path, returning it.
pub fn remove_path(event: &mut RawEvent, path: &str) -> Option<Value> {
    match path.split_once('.') {
        None => event.remove(path),
        Some((head, rest)) => {
            let child = event.get_mut(head)?.as_object_mut()?;
            remove_path(child, rest)
        }
    }
}

/// Insert a value at a dotted path, creating intermediate objects.
///
/// Returns false if an intermediate segment exists but is not an object.
pub fn insert_path(event: &mut RawEvent, path: &str, value: Value) -> bool {
    match path.split_once('.') {
        None => {
            event.insert(path.to_string(), value);
            true
        }
        Some((head, rest)) => {
            let child = event
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            match child.as_object_mut() {
                Some(obj) => insert_path(obj, rest, value),
                None => false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event() -> RawEvent {
        json!({"a": 1, "loc": {"lat": 49.0, "lon": 8.4}})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn nested_paths_resolve() {
        let e = event();
        assert_eq!(get_path(&e, "a"), Some(&json!(1)));
        assert_eq!(get_path(&e, "loc.lat"), Some(&json!(49.0)));
        assert_eq!(get_path(&e, "loc.alt"), None);
        assert_eq!(get_path(&e, "a.b"), None);
    }

    #[test]
    fn remove_and_insert_nested() {
        let mut e = event();
        assert_eq!(remove_path(&mut e, "loc.lon"), Some(json!(8.4)));
        assert!(insert_path(&mut e, "meta.source.name", json!("s1")));
        assert_eq!(get_path(&e, "meta.source.name"), Some(&json!("s1")));
        assert!(!insert_path(&mut e, "a.b", json!(2)));
    }
}
