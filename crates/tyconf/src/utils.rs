//! Miscellaneous utils.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::value::{Plain, PlainMap};

/// Returns a process-unique ID used to compare records and classes by identity.
pub(crate) fn next_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Dotted path in a plain value, e.g. `trainer.layers.0.size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pointer<'a>(&'a str);

impl<'a> Pointer<'a> {
    fn segments(self) -> impl Iterator<Item = &'a str> {
        self.0
            .split('.')
            .take(if self.0.is_empty() { 0 } else { usize::MAX })
    }
}

/// Merges `value` into `target` at the specified dotted path.
///
/// - Intermediate mappings are created as necessary; scalars standing in the way are replaced with mappings.
/// - Numeric segments index into lists. An index equal to the list length appends a new element;
///   other out-of-range indexes make the list be replaced with a mapping.
/// - If both the existing value at the path and `value` are mappings, they are merged recursively;
///   otherwise, the existing value is replaced.
///
/// An empty path refers to `target` itself.
///
/// # Examples
///
/// ```
/// # use serde_json::json;
/// let mut plain = json!({ "trainer": { "lr": 0.1, "layers": [{ "size": 4 }] } });
/// tyconf::merge_at(&mut plain, "trainer.layers.0.size", json!(8));
/// tyconf::merge_at(&mut plain, "trainer.optimizer", json!({ "type": "sgd" }));
/// assert_eq!(
///     plain,
///     json!({
///         "trainer": {
///             "lr": 0.1,
///             "layers": [{ "size": 8 }],
///             "optimizer": { "type": "sgd" },
///         },
///     })
/// );
/// ```
pub fn merge_at(target: &mut Plain, path: &str, value: Plain) {
    let mut current = target;
    for segment in Pointer(path).segments() {
        current = child_mut(current, segment);
    }
    merge(current, value);
}

fn child_mut<'a>(parent: &'a mut Plain, segment: &str) -> &'a mut Plain {
    let list_idx = match &*parent {
        Plain::Array(items) => segment
            .parse::<usize>()
            .ok()
            .filter(|&idx| idx <= items.len()),
        _ => None,
    };
    match (parent, list_idx) {
        (Plain::Array(items), Some(idx)) => {
            if idx == items.len() {
                items.push(Plain::Null);
            }
            &mut items[idx]
        }
        (parent, _) => {
            if !parent.is_object() {
                *parent = Plain::Object(PlainMap::new());
            }
            // Inserts `null` if the key is missing.
            &mut parent[segment]
        }
    }
}

fn merge(dest: &mut Plain, source: Plain) {
    match (dest, source) {
        (Plain::Object(dest), Plain::Object(source)) => {
            for (key, value) in source {
                if let Some(existing) = dest.get_mut(&key) {
                    merge(existing, value);
                } else {
                    dest.insert(key, value);
                }
            }
        }
        (dest, source) => *dest = source,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn ids_are_unique() {
        let first = next_id();
        let second = next_id();
        assert_ne!(first, second);
    }

    #[test]
    fn merging_at_nested_path() {
        let mut plain = json!({});
        merge_at(&mut plain, "a.b.c", json!(1));
        merge_at(&mut plain, "a.b.d", json!("x"));
        assert_eq!(plain, json!({ "a": { "b": { "c": 1, "d": "x" } } }));

        merge_at(&mut plain, "a.b", json!(null));
        assert_eq!(plain, json!({ "a": { "b": null } }));
    }

    #[test]
    fn merging_replaces_scalars_in_the_way() {
        let mut plain = json!({ "a": 5 });
        merge_at(&mut plain, "a.b", json!(true));
        assert_eq!(plain, json!({ "a": { "b": true } }));
    }

    #[test]
    fn merging_into_lists() {
        let mut plain = json!({ "layers": [{ "size": 1 }, { "size": 2 }] });
        merge_at(&mut plain, "layers.1.size", json!(3));
        merge_at(&mut plain, "layers.2", json!({ "size": 4 }));
        assert_eq!(
            plain,
            json!({ "layers": [{ "size": 1 }, { "size": 3 }, { "size": 4 }] })
        );

        merge_at(&mut plain, "layers.10", json!(0));
        assert_eq!(plain, json!({ "layers": { "10": 0 } }));
    }

    #[test]
    fn merging_at_root() {
        let mut plain = json!({ "a": 1, "b": { "c": 2 } });
        merge_at(&mut plain, "", json!({ "b": { "d": 3 } }));
        assert_eq!(plain, json!({ "a": 1, "b": { "c": 2, "d": 3 } }));
    }
}
