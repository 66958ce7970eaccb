//! Read/write-by-path access to structured bodies.
//!
//! Supports dot and bracket syntax (`a.b[0].c`). A purely numeric dot
//! segment indexes arrays (`responses.0.body` ≡ `responses[0].body`).

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

fn parse(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        if part.is_empty() {
            continue;
        }
        let mut rest = part;
        while let Some(open) = rest.find('[') {
            let key = &rest[..open];
            if !key.is_empty() {
                segments.push(Segment::Key(key.to_string()));
            }
            match rest[open + 1..].find(']') {
                Some(close) => {
                    let index = &rest[open + 1..open + 1 + close];
                    match index.parse::<usize>() {
                        Ok(i) => segments.push(Segment::Index(i)),
                        Err(_) => segments.push(Segment::Key(index.to_string())),
                    }
                    rest = &rest[open + close + 2..];
                }
                None => {
                    segments.push(Segment::Key(rest[open..].to_string()));
                    rest = "";
                }
            }
        }
        if !rest.is_empty() {
            segments.push(Segment::Key(rest.to_string()));
        }
    }
    segments
}

/// Handle over a resolved path.
#[derive(Debug, Clone, Copy)]
pub struct PathValue<'a> {
    value: Option<&'a Value>,
}

impl<'a> PathValue<'a> {
    pub fn exists(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<&'a Value> {
        self.value
    }

    /// Canonical string form: strings render unquoted, every other value
    /// as compact JSON.
    pub fn to_string_form(&self) -> String {
        match self.value {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

pub fn get<'a>(doc: &'a Value, path: &str) -> PathValue<'a> {
    let mut current = doc;
    for segment in parse(path) {
        let next = match (&segment, current) {
            (Segment::Key(key), Value::Object(map)) => map.get(key),
            (Segment::Key(key), Value::Array(items)) => {
                key.parse::<usize>().ok().and_then(|i| items.get(i))
            }
            (Segment::Index(i), Value::Array(items)) => items.get(*i),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return PathValue { value: None },
        }
    }
    PathValue {
        value: Some(current),
    }
}

/// Returns the document with `value` written at `path`, creating
/// intermediate objects (and extending arrays with nulls) as needed.
pub fn set(doc: Value, path: &str, value: Value) -> Value {
    let mut doc = doc;
    set_segments(&mut doc, &parse(path), value);
    doc
}

fn set_segments(current: &mut Value, segments: &[Segment], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *current = value;
        return;
    };
    match head {
        Segment::Key(key) => {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            let map = current.as_object_mut().expect("object just ensured");
            let slot = map.entry(key.clone()).or_insert(Value::Null);
            set_segments(slot, rest, value);
        }
        Segment::Index(i) => {
            if !current.is_array() {
                *current = Value::Array(Vec::new());
            }
            let items = current.as_array_mut().expect("array just ensured");
            while items.len() <= *i {
                items.push(Value::Null);
            }
            set_segments(&mut items[*i], rest, value);
        }
    }
}

/// Returns the document with the value at `path` removed. A missing path
/// leaves the document unchanged.
pub fn delete(doc: Value, path: &str) -> Value {
    let mut doc = doc;
    delete_segments(&mut doc, &parse(path));
    doc
}

fn delete_segments(current: &mut Value, segments: &[Segment]) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        match (head, current) {
            (Segment::Key(key), Value::Object(map)) => {
                map.remove(key);
            }
            (Segment::Index(i), Value::Array(items)) => {
                if *i < items.len() {
                    items.remove(*i);
                }
            }
            _ => {}
        }
        return;
    }
    let next = match (head, current) {
        (Segment::Key(key), Value::Object(map)) => map.get_mut(key),
        (Segment::Index(i), Value::Array(items)) => items.get_mut(*i),
        _ => None,
    };
    if let Some(next) = next {
        delete_segments(next, rest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "a": {"b": [{"c": 1}, {"c": 2}]},
            "name": "gopen",
            "flags": [true, false]
        })
    }

    #[test]
    fn test_get_dot_and_bracket() {
        assert_eq!(get(&doc(), "a.b[0].c").value(), Some(&json!(1)));
        assert_eq!(get(&doc(), "a.b[1].c").value(), Some(&json!(2)));
        assert_eq!(get(&doc(), "flags[1]").value(), Some(&json!(false)));
    }

    #[test]
    fn test_get_numeric_dot_segment_indexes_arrays() {
        assert_eq!(get(&doc(), "a.b.0.c").value(), Some(&json!(1)));
    }

    #[test]
    fn test_get_missing_path() {
        assert!(!get(&doc(), "a.missing").exists());
        assert!(!get(&doc(), "a.b[9].c").exists());
        assert!(!get(&doc(), "name.nested").exists());
    }

    #[test]
    fn test_string_form() {
        assert_eq!(get(&doc(), "name").to_string_form(), "gopen");
        assert_eq!(get(&doc(), "a.b[0].c").to_string_form(), "1");
        assert_eq!(get(&doc(), "a.b[0]").to_string_form(), r#"{"c":1}"#);
    }

    #[test]
    fn test_set_existing_and_new_paths() {
        let updated = set(doc(), "name", json!("renamed"));
        assert_eq!(get(&updated, "name").value(), Some(&json!("renamed")));

        let updated = set(doc(), "meta.created.by", json!("test"));
        assert_eq!(get(&updated, "meta.created.by").value(), Some(&json!("test")));
    }

    #[test]
    fn test_set_extends_arrays() {
        let updated = set(json!({}), "items[2]", json!("x"));
        assert_eq!(updated, json!({"items": [null, null, "x"]}));
    }

    #[test]
    fn test_delete() {
        let updated = delete(doc(), "a.b[0].c");
        assert!(!get(&updated, "a.b[0].c").exists());

        let unchanged = delete(doc(), "does.not.exist");
        assert_eq!(unchanged, doc());
    }
}
