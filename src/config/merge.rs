//! Merge helpers for configuration documents.

use std::collections::HashSet;

use serde_json::Value;

/// Merge `overlay` into `base`.
///
/// Mappings present on both sides are merged recursively; in every other case
/// the overlay value replaces the base value outright. Sequences are never
/// concatenated.
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
        (base, overlay) => *base = overlay,
    }
}

/// Union of two string lists, keeping the first occurrence of each entry.
pub fn union_dedup<'a>(
    first: impl IntoIterator<Item = &'a String>,
    second: impl IntoIterator<Item = &'a String>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    first
        .into_iter()
        .chain(second)
        .filter(|s| seen.insert(*s))
        .cloned()
        .collect()
}
