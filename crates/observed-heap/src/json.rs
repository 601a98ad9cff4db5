//! Conversion between heap graphs and `serde_json` documents.

use std::collections::HashSet;

use serde_json::{Map, Value as Json};

use crate::heap::Heap;
use crate::value::{ObjectId, Shape, Value};

impl Heap {
    /// Allocate containers for a JSON document and return its root value.
    ///
    /// Allocation records nothing: the new containers have no subscribers yet.
    ///
    /// # Example
    ///
    /// ```
    /// use observed_heap::Heap;
    /// use serde_json::json;
    ///
    /// let heap = Heap::new();
    /// let root = heap.import_json(&json!({"tags": ["a", "b"]}));
    /// assert_eq!(heap.to_json(&root), json!({"tags": ["a", "b"]}));
    /// ```
    pub fn import_json(&self, json: &Json) -> Value {
        self.alloc_json(json)
    }

    /// Snapshot a value as JSON.
    ///
    /// Accessors are evaluated, holes become `null`, and a container reached
    /// again while it is still being serialized (a cycle) becomes `null`.
    pub fn to_json(&self, value: &Value) -> Json {
        let mut stack = HashSet::new();
        self.to_json_inner(value, &mut stack)
    }

    fn to_json_inner(&self, value: &Value, stack: &mut HashSet<ObjectId>) -> Json {
        let id = match value {
            Value::Null => return Json::Null,
            Value::Bool(b) => return Json::Bool(*b),
            Value::Number(n) => return Json::Number(n.clone()),
            Value::String(s) => return Json::String(s.clone()),
            Value::Object(id) => *id,
        };
        if !stack.insert(id) {
            return Json::Null;
        }
        let out = match self.shape(value) {
            Shape::Leaf => Json::Null,
            Shape::Record => {
                let mut map = Map::new();
                for (name, child) in self.entries(id) {
                    map.insert(name, self.to_json_inner(&child, stack));
                }
                Json::Object(map)
            }
            Shape::Ordered => {
                let len = self.len(id).unwrap_or(0);
                let items = (0..len)
                    .map(|i| match self.get_index(id, i) {
                        Some(child) => self.to_json_inner(&child, stack),
                        None => Json::Null,
                    })
                    .collect();
                Json::Array(items)
            }
        };
        stack.remove(&id);
        out
    }
}
