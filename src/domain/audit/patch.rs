//! Top-level JSON diff between two versions of an entity

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields that change on every write and carry no audit value
const IGNORED_FIELDS: [&str; 2] = ["updated_at", "created_at"];

/// Credentials never written to an audit patch, at any depth
const SECRET_FIELDS: [&str; 4] = ["password_hash", "client_secret", "key", "key_hash"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
}

/// One JSON-patch style operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Compute the operations turning `old` into `new`.
///
/// Objects are compared field by field at the top level; nested values are
/// replaced wholesale. A missing side is treated as an empty object.
pub fn diff(old: Option<&Value>, new: Option<&Value>) -> Vec<PatchOperation> {
    let empty = serde_json::Map::new();
    let old = old.and_then(Value::as_object).unwrap_or(&empty);
    let new = new.and_then(Value::as_object).unwrap_or(&empty);

    let mut operations = Vec::new();

    for (field, value) in old {
        if IGNORED_FIELDS.contains(&field.as_str()) {
            continue;
        }
        match new.get(field) {
            None => operations.push(PatchOperation {
                op: PatchOp::Remove,
                path: pointer(field),
                value: None,
            }),
            Some(new_value) if new_value != value => operations.push(PatchOperation {
                op: PatchOp::Replace,
                path: pointer(field),
                value: Some(new_value.clone()),
            }),
            Some(_) => {}
        }
    }

    for (field, value) in new {
        if IGNORED_FIELDS.contains(&field.as_str()) || old.contains_key(field) {
            continue;
        }
        operations.push(PatchOperation {
            op: PatchOp::Add,
            path: pointer(field),
            value: Some(value.clone()),
        });
    }

    operations
}

/// Diff two serializable versions of an entity
pub fn changes<T: Serialize>(old: Option<&T>, new: Option<&T>) -> Vec<PatchOperation> {
    let old = old.and_then(|value| serde_json::to_value(value).ok()).map(redact);
    let new = new.and_then(|value| serde_json::to_value(value).ok()).map(redact);
    diff(old.as_ref(), new.as_ref())
}

fn redact(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(field, _)| !SECRET_FIELDS.contains(&field.as_str()))
                .map(|(field, value)| (field, redact(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(redact).collect()),
        other => other,
    }
}

// RFC 6901 escaping
fn pointer(field: &str) -> String {
    format!("/{}", field.replace('~', "~0").replace('/', "~1"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_diff_replace_add_remove() {
        let old = json!({"name": "a", "version": "1", "picture": "p"});
        let new = json!({"name": "b", "version": "1", "tags": ["x"]});

        let ops = diff(Some(&old), Some(&new));

        assert_eq!(ops.len(), 3);
        assert!(ops.contains(&PatchOperation {
            op: PatchOp::Replace,
            path: "/name".into(),
            value: Some(json!("b")),
        }));
        assert!(ops.contains(&PatchOperation {
            op: PatchOp::Remove,
            path: "/picture".into(),
            value: None,
        }));
        assert!(ops.contains(&PatchOperation {
            op: PatchOp::Add,
            path: "/tags".into(),
            value: Some(json!(["x"])),
        }));
    }

    #[test]
    fn test_diff_ignores_timestamps() {
        let old = json!({"name": "a", "updated_at": "2024-01-01"});
        let new = json!({"name": "a", "updated_at": "2024-02-01"});

        assert!(diff(Some(&old), Some(&new)).is_empty());
    }

    #[test]
    fn test_diff_from_nothing() {
        let new = json!({"name": "a"});
        let ops = diff(None, Some(&new));

        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].op, PatchOp::Add);
    }

    #[test]
    fn test_changes_between_structs() {
        #[derive(Serialize)]
        struct Sample {
            name: &'static str,
            updated_at: u32,
        }

        let ops = changes(
            Some(&Sample { name: "a", updated_at: 1 }),
            Some(&Sample { name: "b", updated_at: 2 }),
        );
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].path, "/name");
    }

    #[test]
    fn test_changes_drop_secrets() {
        let old = json!({"name": "a", "settings": {"client_id": "c", "client_secret": "s1"}});
        let new = json!({"name": "a", "settings": {"client_id": "c", "client_secret": "s2"}});

        assert!(changes(Some(&old), Some(&new)).is_empty());

        let ops = changes(None, Some(&json!({"key": "apim_x", "application": "app"})));
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].path, "/application");
    }

    #[test]
    fn test_pointer_escaping() {
        assert_eq!(pointer("a/b~c"), "/a~1b~0c");
    }
}
