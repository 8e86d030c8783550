//! Recursive merging of configuration trees.

use serde_json::{Map, Value};

/// Merge `overlay` into `base` recursively.
///
/// Objects merge key by key; any other overlay value replaces the base value,
/// except `null`, which never clobbers an existing value.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (_, Value::Null) => {}
        (slot, value) => *slot = value,
    }
}

/// Merge a bundle `core` fragment into the host tree at `dotted_key`.
///
/// Intermediate nodes are created as objects. At the leaf the fragment is the
/// base and whatever the host already holds is merged over it, so host values
/// win on conflict.
pub fn merge_core_fragment(host: &mut Value, dotted_key: &str, fragment: &Value) {
    let mut props = dotted_key.split('.').peekable();
    let mut node = host;

    while let Some(prop) = props.next() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else { return };

        if props.peek().is_none() {
            let mut merged = fragment.clone();
            if let Some(existing) = map.remove(prop) {
                deep_merge(&mut merged, existing);
            }
            map.insert(prop.to_string(), merged);
            return;
        }

        node = map
            .entry(prop.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}
