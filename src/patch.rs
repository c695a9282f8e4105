use std::collections::HashSet;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::PatchError;
use crate::json_pointer::{JsonPointer, PointerToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
}

/// One RFC 6902 operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    pub value: Value,
}

/// Default-value insertions collected while validating.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Vec<PatchOperation>")]
pub struct JsonPatch {
    operations: Vec<PatchOperation>,
    paths: HashSet<String>,
}

impl JsonPatch {
    /// Records an `add`. A second insertion at the same path is ignored.
    pub fn add(&mut self, location: &JsonPointer, value: Value) {
        self.push(PatchOperation {
            op: PatchOp::Add,
            path: location.to_string(),
            value,
        });
    }

    /// Appends the operations of `other`, keeping the first insertion per path.
    pub fn merge(&mut self, other: JsonPatch) {
        for operation in other.operations {
            self.push(operation);
        }
    }

    fn push(&mut self, operation: PatchOperation) {
        if self.paths.insert(operation.path.clone()) {
            self.operations.push(operation);
        }
    }

    pub fn operations(&self) -> &[PatchOperation] {
        &self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Applies every operation to `target`, in order.
    pub fn apply(&self, target: &mut Value) -> Result<(), PatchError> {
        for operation in &self.operations {
            let PatchOp::Add = operation.op;
            let pointer = JsonPointer::parse(&operation.path)
                .ok_or_else(|| PatchError::PathNotFound(operation.path.clone()))?;
            let Some((parent, last)) = pointer.split_last() else {
                *target = operation.value.clone();
                continue;
            };
            let container = parent
                .resolve_mut(target)
                .ok_or_else(|| PatchError::PathNotFound(operation.path.clone()))?;
            insert(container, last, operation.value.clone(), &operation.path)?;
        }
        Ok(())
    }
}

impl From<Vec<PatchOperation>> for JsonPatch {
    fn from(operations: Vec<PatchOperation>) -> Self {
        let mut patch = Self::default();
        for operation in operations {
            patch.push(operation);
        }
        patch
    }
}

impl Serialize for JsonPatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.operations.serialize(serializer)
    }
}

fn insert(
    container: &mut Value,
    token: &PointerToken,
    value: Value,
    path: &str,
) -> Result<(), PatchError> {
    match (container, token) {
        (Value::Object(map), PointerToken::Key(key)) => {
            map.insert(key.clone(), value);
        }
        (Value::Object(map), PointerToken::Index(index)) => {
            map.insert(index.to_string(), value);
        }
        (Value::Array(items), PointerToken::Key(key)) if key == "-" => items.push(value),
        (Value::Array(items), PointerToken::Key(key)) => {
            let index = key
                .parse::<usize>()
                .ok()
                .filter(|index| *index <= items.len())
                .ok_or_else(|| PatchError::PathNotFound(path.to_owned()))?;
            items.insert(index, value);
        }
        (Value::Array(items), PointerToken::Index(index)) if *index <= items.len() => {
            items.insert(*index, value);
        }
        (Value::Array(_), PointerToken::Index(_)) => {
            return Err(PatchError::PathNotFound(path.to_owned()));
        }
        _ => return Err(PatchError::NotAContainer(path.to_owned())),
    }
    Ok(())
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn serializes_as_operation_array() {
        let mut patch = JsonPatch::default();
        patch.add(&JsonPointer::root().join_key("x"), json!(5));

        assert_eq!(
            patch.to_json(),
            json!([{"op": "add", "path": "/x", "value": 5}])
        );
    }

    #[test]
    fn repeated_paths_are_recorded_once() {
        let mut patch = JsonPatch::default();
        let location = JsonPointer::root().join_key("x");
        patch.add(&location, json!(5));
        patch.add(&location, json!(6));

        assert_eq!(patch.len(), 1);
        assert_eq!(patch.operations()[0].value, json!(5));
    }

    #[test]
    fn many_insertions_keep_first_value_per_path() {
        let mut patch = JsonPatch::default();
        for round in 0..3 {
            let mut other = JsonPatch::default();
            for index in 0..2_000 {
                other.add(&JsonPointer::root().join_index(index), json!(round));
            }
            patch.merge(other);
        }

        assert_eq!(patch.len(), 2_000);
        assert!(patch.operations().iter().all(|op| op.value == json!(0)));
        assert_eq!(patch.operations()[1_999].path, "/1999");
    }

    #[test]
    fn deserialized_patch_drops_repeated_paths() -> Result<(), Box<dyn std::error::Error>> {
        let mut patch: JsonPatch = serde_json::from_value(json!([
            {"op": "add", "path": "/x", "value": 1},
            {"op": "add", "path": "/x", "value": 2}
        ]))?;
        patch.add(&JsonPointer::root().join_key("x"), json!(3));

        assert_eq!(
            patch.to_json(),
            json!([{"op": "add", "path": "/x", "value": 1}])
        );
        Ok(())
    }

    #[test]
    fn apply_materializes_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let patch: JsonPatch = serde_json::from_value(json!([
            {"op": "add", "path": "/runtime/tag", "value": "latest"},
            {"op": "add", "path": "/ports/-", "value": 80}
        ]))?;
        let mut document = json!({"runtime": {}, "ports": []});

        patch.apply(&mut document)?;

        assert_eq!(
            document,
            json!({"runtime": {"tag": "latest"}, "ports": [80]})
        );
        Ok(())
    }

    #[test]
    fn apply_reports_missing_parent() {
        let mut patch = JsonPatch::default();
        patch.add(
            &JsonPointer::root().join_key("missing").join_key("x"),
            json!(1),
        );
        let mut document = json!({});

        assert_eq!(
            patch.apply(&mut document),
            Err(PatchError::PathNotFound("/missing/x".to_owned()))
        );
    }
}
