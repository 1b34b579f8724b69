//! JSON Pointer (RFC 6901) helpers and JSON Patch application

use serde_json::Value;

use super::Patch;
use crate::error::ApplyError;

/// Escape one reference token
pub fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Unescape one reference token
pub fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Append a token to a pointer
pub fn join(base: &str, token: &str) -> String {
    format!("{}/{}", base, escape(token))
}

/// Split a pointer into unescaped tokens. The empty pointer is the root.
pub fn parse(pointer: &str) -> Result<Vec<String>, ApplyError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let rest = pointer
        .strip_prefix('/')
        .ok_or_else(|| ApplyError::InvalidPointer(pointer.to_string()))?;
    Ok(rest.split('/').map(unescape).collect())
}

/// Apply one patch operation in place
pub fn apply_patch(doc: &mut Value, patch: &Patch) -> Result<(), ApplyError> {
    match patch {
        Patch::Add { path, value } => add(doc, path, value.clone()),
        Patch::Remove { path } => remove(doc, path).map(|_| ()),
        Patch::Replace { path, value } => {
            let target = doc
                .pointer_mut(path)
                .ok_or_else(|| ApplyError::Missing(path.clone()))?;
            *target = value.clone();
            Ok(())
        }
        Patch::Move { from, path } => {
            if from == path {
                return doc.pointer(from).map(|_| ()).ok_or_else(|| ApplyError::Missing(from.clone()));
            }
            if path.starts_with(&format!("{}/", from)) {
                return Err(ApplyError::MoveIntoChild {
                    from: from.clone(),
                    path: path.clone(),
                });
            }
            let value = remove(doc, from)?;
            add(doc, path, value)
        }
        Patch::Copy { from, path } => {
            let value = doc
                .pointer(from)
                .cloned()
                .ok_or_else(|| ApplyError::Missing(from.clone()))?;
            add(doc, path, value)
        }
    }
}

fn split_last(path: &str) -> Result<(&str, String), ApplyError> {
    parse(path)?;
    let at = path
        .rfind('/')
        .ok_or_else(|| ApplyError::InvalidPointer(path.to_string()))?;
    Ok((&path[..at], unescape(&path[at + 1..])))
}

fn array_index(token: &str, len: usize, path: &str) -> Result<usize, ApplyError> {
    let valid = !token.is_empty()
        && token.bytes().all(|b| b.is_ascii_digit())
        && (token == "0" || !token.starts_with('0'));
    if !valid {
        return Err(ApplyError::InvalidPointer(path.to_string()));
    }
    let index: usize = token
        .parse()
        .map_err(|_| ApplyError::InvalidPointer(path.to_string()))?;
    if index > len {
        return Err(ApplyError::IndexOutOfRange(path.to_string()));
    }
    Ok(index)
}

fn add(doc: &mut Value, path: &str, value: Value) -> Result<(), ApplyError> {
    if path.is_empty() {
        *doc = value;
        return Ok(());
    }
    let (parent_path, token) = split_last(path)?;
    let parent = doc
        .pointer_mut(parent_path)
        .ok_or_else(|| ApplyError::Missing(parent_path.to_string()))?;
    match parent {
        Value::Object(map) => {
            map.insert(token, value);
            Ok(())
        }
        Value::Array(items) => {
            let index = if token == "-" {
                items.len()
            } else {
                array_index(&token, items.len(), path)?
            };
            items.insert(index, value);
            Ok(())
        }
        _ => Err(ApplyError::NotAContainer(path.to_string())),
    }
}

fn remove(doc: &mut Value, path: &str) -> Result<Value, ApplyError> {
    if path.is_empty() {
        return Ok(std::mem::take(doc));
    }
    let (parent_path, token) = split_last(path)?;
    let parent = doc
        .pointer_mut(parent_path)
        .ok_or_else(|| ApplyError::Missing(parent_path.to_string()))?;
    match parent {
        Value::Object(map) => map.remove(&token).ok_or_else(|| ApplyError::Missing(path.to_string())),
        Value::Array(items) => {
            let index = array_index(&token, items.len(), path)?;
            if index == items.len() {
                return Err(ApplyError::IndexOutOfRange(path.to_string()));
            }
            Ok(items.remove(index))
        }
        _ => Err(ApplyError::NotAContainer(path.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escape_round_trip() {
        assert_eq!(escape("a/b~c"), "a~1b~0c");
        assert_eq!(unescape("a~1b~0c"), "a/b~c");
        assert_eq!(join("/properties", "x/y"), "/properties/x~1y");
        assert_eq!(parse("/a~1b/0").unwrap(), vec!["a/b", "0"]);
        assert!(parse("a").is_err());
    }

    #[test]
    fn test_add_remove_replace() {
        let mut doc = json!({"a": [1, 2], "b": {"c": 1}});
        apply_patch(&mut doc, &Patch::Add { path: "/a/-".into(), value: json!(3) }).unwrap();
        apply_patch(&mut doc, &Patch::Add { path: "/a/0".into(), value: json!(0) }).unwrap();
        apply_patch(&mut doc, &Patch::Remove { path: "/b/c".into() }).unwrap();
        apply_patch(&mut doc, &Patch::Replace { path: "/b".into(), value: json!("x") }).unwrap();
        assert_eq!(doc, json!({"a": [0, 1, 2, 3], "b": "x"}));
    }

    #[test]
    fn test_move_and_copy() {
        let mut doc = json!({"a": {"x": 1}, "b": {}});
        apply_patch(&mut doc, &Patch::Copy { from: "/a/x".into(), path: "/b/y".into() }).unwrap();
        apply_patch(&mut doc, &Patch::Move { from: "/a".into(), path: "/c".into() }).unwrap();
        assert_eq!(doc, json!({"b": {"y": 1}, "c": {"x": 1}}));
    }

    #[test]
    fn test_failures() {
        let mut doc = json!({"a": [1], "s": "str"});
        assert_eq!(
            apply_patch(&mut doc, &Patch::Remove { path: "/missing".into() }),
            Err(ApplyError::Missing("/missing".into()))
        );
        assert_eq!(
            apply_patch(&mut doc, &Patch::Remove { path: "/a/1".into() }),
            Err(ApplyError::IndexOutOfRange("/a/1".into()))
        );
        assert_eq!(
            apply_patch(&mut doc, &Patch::Add { path: "/s/x".into(), value: json!(1) }),
            Err(ApplyError::NotAContainer("/s/x".into()))
        );
        assert!(matches!(
            apply_patch(&mut doc, &Patch::Move { from: "/a".into(), path: "/a/0".into() }),
            Err(ApplyError::MoveIntoChild { .. })
        ));
        assert_eq!(doc, json!({"a": [1], "s": "str"}));
    }
}
