use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::resource::ResourceKind;

/// Schema-less Kubernetes object as returned by a list call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Object(Map<String, Value>);

/// `items` of a list response. Everything else (`metadata.continue` etc.) is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct ObjectList {
    #[serde(default)]
    pub items: Vec<Object>,
}

impl Object {
    fn metadata_str(&self, key: &str) -> &str {
        self.0
            .get("metadata")
            .and_then(|md| md.get(key))
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.metadata_str("name")
    }

    /// 空文字の場合はクラスタスコープ
    pub fn namespace(&self) -> &str {
        self.metadata_str("namespace")
    }

    pub fn is_namespaced(&self) -> bool {
        !self.namespace().is_empty()
    }

    /// Fill `apiVersion` and `kind` when the server left them out of list items.
    pub fn ensure_type_meta(&mut self, resource: &ResourceKind) {
        self.0
            .entry("apiVersion")
            .or_insert_with(|| Value::String(resource.api_version()));

        if !resource.kind.is_empty() {
            self.0
                .entry("kind")
                .or_insert_with(|| Value::String(resource.kind.to_string()));
        }
    }

    /// Removes the value at `path`. Missing segments and non-map values are a no-op.
    pub fn remove_nested_field<S: AsRef<str>>(&mut self, path: &[S]) {
        let Some((last, parents)) = path.split_last() else {
            return;
        };

        let mut current = &mut self.0;

        for segment in parents {
            match current.get_mut(segment.as_ref()) {
                Some(Value::Object(map)) => current = map,
                _ => return,
            }
        }

        current.remove(last.as_ref());
    }
}
