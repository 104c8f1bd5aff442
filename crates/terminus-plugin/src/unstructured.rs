//! Dotted-path access into unstructured Kubernetes objects.
//!
//! Objects travel as `serde_json::Value`. A path such as `spec.hostPath.path`
//! names nested object fields; array indexing is not supported.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnstructuredError {
    #[error("missing field {path}")]
    Missing { path: String },

    #[error("field {path} is not {expected}")]
    WrongType {
        path: String,
        expected: &'static str,
    },
}

pub type UnstructuredResult<T> = Result<T, UnstructuredError>;

/// Value at `path`.
pub fn get_value<'a>(root: &'a Value, path: &str) -> UnstructuredResult<&'a Value> {
    let mut current = root;
    let mut walked = String::new();
    for part in path.split('.') {
        if !walked.is_empty() {
            walked.push('.');
        }
        walked.push_str(part);
        current = current
            .as_object()
            .ok_or_else(|| UnstructuredError::WrongType {
                path: parent_of(&walked).to_string(),
                expected: "an object",
            })?
            .get(part)
            .ok_or_else(|| UnstructuredError::Missing {
                path: walked.clone(),
            })?;
    }
    Ok(current)
}

pub fn exists(root: &Value, path: &str) -> bool {
    get_value(root, path).is_ok()
}

pub fn get_string<'a>(root: &'a Value, path: &str) -> UnstructuredResult<&'a str> {
    get_value(root, path)?
        .as_str()
        .ok_or_else(|| UnstructuredError::WrongType {
            path: path.to_string(),
            expected: "a string",
        })
}

pub fn get_map<'a>(root: &'a Value, path: &str) -> UnstructuredResult<&'a Map<String, Value>> {
    get_value(root, path)?
        .as_object()
        .ok_or_else(|| UnstructuredError::WrongType {
            path: path.to_string(),
            expected: "an object",
        })
}

/// Set `path` to `value`, creating missing intermediate objects.
///
/// Fails if an existing intermediate value is not an object.
pub fn set_value(root: &mut Value, path: &str, value: Value) -> UnstructuredResult<()> {
    let (parents, leaf) = match path.rsplit_once('.') {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, path),
    };

    let mut current = root;
    let mut walked = String::new();
    for part in parents.into_iter().flat_map(|p| p.split('.')) {
        let obj = current
            .as_object_mut()
            .ok_or_else(|| UnstructuredError::WrongType {
                path: if walked.is_empty() { ".".to_string() } else { walked.clone() },
                expected: "an object",
            })?;
        if !walked.is_empty() {
            walked.push('.');
        }
        walked.push_str(part);
        current = obj
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    current
        .as_object_mut()
        .ok_or_else(|| UnstructuredError::WrongType {
            path: if walked.is_empty() { ".".to_string() } else { walked },
            expected: "an object",
        })?
        .insert(leaf.to_string(), value);
    Ok(())
}

fn parent_of(path: &str) -> &str {
    match path.rsplit_once('.') {
        Some((parent, _)) => parent,
        None => ".",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pv() -> Value {
        json!({
            "kind": "PersistentVolume",
            "spec": {
                "hostPath": { "path": "/terminus/data/pv-1" },
                "capacity": { "storage": "1Gi" }
            }
        })
    }

    #[test]
    fn test_get_string_and_exists() {
        let pv = pv();
        assert!(exists(&pv, "spec.hostPath.path"));
        assert!(!exists(&pv, "spec.csi.volumeHandle"));
        assert_eq!(get_string(&pv, "spec.hostPath.path").unwrap(), "/terminus/data/pv-1");
        assert_eq!(get_string(&pv, "kind").unwrap(), "PersistentVolume");
    }

    #[test]
    fn test_errors_name_the_path() {
        let pv = pv();
        assert_eq!(
            get_string(&pv, "spec.nfs.path").unwrap_err(),
            UnstructuredError::Missing {
                path: "spec.nfs".to_string()
            }
        );
        assert_eq!(
            get_map(&pv, "spec.hostPath.path").unwrap_err(),
            UnstructuredError::WrongType {
                path: "spec.hostPath.path".to_string(),
                expected: "an object"
            }
        );
        // Walking through a string.
        assert!(matches!(
            get_value(&pv, "kind.name"),
            Err(UnstructuredError::WrongType { .. })
        ));
    }

    #[test]
    fn test_set_value_overwrites_and_creates() {
        let mut pv = pv();
        set_value(&mut pv, "spec.hostPath.path", json!("/new")).unwrap();
        assert_eq!(get_string(&pv, "spec.hostPath.path").unwrap(), "/new");

        set_value(&mut pv, "metadata.labels.app", json!("redis")).unwrap();
        assert_eq!(get_string(&pv, "metadata.labels.app").unwrap(), "redis");

        set_value(&mut pv, "spec.init", Value::Null).unwrap();
        assert_eq!(get_value(&pv, "spec.init").unwrap(), &Value::Null);
    }

    #[test]
    fn test_set_value_through_scalar_fails() {
        let mut pv = pv();
        let err = set_value(&mut pv, "kind.name", json!("x")).unwrap_err();
        assert!(matches!(err, UnstructuredError::WrongType { .. }));
        assert_eq!(pv, self::pv());
    }
}
