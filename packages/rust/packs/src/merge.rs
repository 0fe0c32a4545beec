//! Pack inheritance: pairwise merge and `extends` graph resolution.

use std::collections::HashMap;

use tracing::{debug, instrument, warn};

use repath_shared::{Entity, Pack, RepathError, Result};

use crate::source::PackSource;

// ---------------------------------------------------------------------------
// Pairwise merge
// ---------------------------------------------------------------------------

/// Merge `child` on top of `base`, returning a new pack.
///
/// - Entity collections: child entries replace base entries with the same
///   identifier in place, new identifiers are appended, and entries without
///   an identifier are always appended.
/// - `variables`: key-wise, child wins.
/// - `extends` and every other field: the child's value replaces the base's
///   when present.
///
/// Neither input is modified.
pub fn merge_packs(base: &Pack, child: &Pack) -> Pack {
    let mut variables = base.variables.clone();
    variables.extend(child.variables.clone());

    let mut extra = base.extra.clone();
    extra.extend(child.extra.clone());

    Pack {
        pack_id: child.pack_id.clone().or_else(|| base.pack_id.clone()),
        pack_version: child
            .pack_version
            .clone()
            .or_else(|| base.pack_version.clone()),
        pack_schema_version: child
            .pack_schema_version
            .clone()
            .or_else(|| base.pack_schema_version.clone()),
        retrieved_at: child
            .retrieved_at
            .clone()
            .or_else(|| base.retrieved_at.clone()),
        municipality: child
            .municipality
            .clone()
            .or_else(|| base.municipality.clone()),
        jurisdiction: child
            .jurisdiction
            .clone()
            .or_else(|| base.jurisdiction.clone()),
        extends: child.extends.clone().or_else(|| base.extends.clone()),
        variables,
        channels: merge_entities(&base.channels, &child.channels),
        locations: merge_entities(&base.locations, &child.locations),
        rules: merge_entities(&base.rules, &child.rules),
        items: merge_entities(&base.items, &child.items),
        aliases: merge_entities(&base.aliases, &child.aliases),
        extra,
    }
}

/// Merge one entity collection by identifier, preserving base order.
pub fn merge_entities<T: Entity + Clone>(base: &[T], child: &[T]) -> Vec<T> {
    let mut merged = base.to_vec();
    let mut index_by_id: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| entry.entity_id().map(|id| (id.to_string(), index)))
        .collect();

    for entry in child {
        let Some(id) = entry.entity_id() else {
            merged.push(entry.clone());
            continue;
        };
        match index_by_id.get(id) {
            Some(&index) => merged[index] = entry.clone(),
            None => {
                index_by_id.insert(id.to_string(), merged.len());
                merged.push(entry.clone());
            }
        }
    }

    merged
}

// ---------------------------------------------------------------------------
// Inheritance resolution
// ---------------------------------------------------------------------------

/// A pack whose parents are still being folded in.
struct Frame {
    pack_id: String,
    pack: Pack,
    next_parent: usize,
    merged: Pack,
}

impl Frame {
    fn open<S: PackSource + ?Sized>(pack_id: String, source: &S) -> Result<Self> {
        let pack = source.fetch_pack(&pack_id)?;
        if let Some(declared) = pack.id() {
            if declared != pack_id {
                warn!(requested = %pack_id, declared, "pack declares a different pack_id");
            }
        }
        Ok(Self {
            pack_id,
            pack,
            next_parent: 0,
            merged: Pack::default(),
        })
    }
}

/// Load `pack_id` and fold its whole `extends` ancestry into one pack.
///
/// Parents are resolved depth-first in declared order, so later parents
/// override earlier ones and the requested pack overrides all ancestors.
/// The chain of in-progress packs is tracked on an explicit stack: a pack
/// that reappears in its own chain fails with [`RepathError::Cycle`].
/// Ancestors shared by several parents are resolved once per call.
#[instrument(skip(source))]
pub fn load_merged_pack<S: PackSource + ?Sized>(pack_id: &str, source: &S) -> Result<Pack> {
    let mut resolved: HashMap<String, Pack> = HashMap::new();
    let mut stack = vec![Frame::open(pack_id.to_string(), source)?];
    let mut root = None;

    while let Some(mut frame) = stack.pop() {
        let Some(parent_id) = frame.pack.parents().get(frame.next_parent).cloned() else {
            let merged = merge_packs(&frame.merged, &frame.pack);
            debug!(
                pack_id = %frame.pack_id,
                channels = merged.channels.len(),
                rules = merged.rules.len(),
                items = merged.items.len(),
                "pack resolved"
            );
            match stack.last_mut() {
                Some(child) => {
                    child.merged = merge_packs(&child.merged, &merged);
                    resolved.insert(frame.pack_id, merged);
                }
                None => root = Some(merged),
            }
            continue;
        };
        frame.next_parent += 1;

        let in_chain = frame.pack_id == parent_id || stack.iter().any(|f| f.pack_id == parent_id);
        if in_chain {
            let mut chain: Vec<String> = stack.iter().map(|f| f.pack_id.clone()).collect();
            chain.push(frame.pack_id);
            chain.push(parent_id);
            return Err(RepathError::Cycle { chain });
        }

        match resolved.get(&parent_id) {
            Some(done) => {
                frame.merged = merge_packs(&frame.merged, done);
                stack.push(frame);
            }
            None => {
                let parent = Frame::open(parent_id, source)?;
                stack.push(frame);
                stack.push(parent);
            }
        }
    }

    root.ok_or_else(|| RepathError::not_found(pack_id))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryPackStore;
    use pretty_assertions::assert_eq;
    use repath_shared::{Channel, Item};
    use serde_json::json;

    fn pack(value: serde_json::Value) -> Pack {
        serde_json::from_value(value).expect("valid pack")
    }

    fn channel_ids(pack: &Pack) -> Vec<&str> {
        pack.channels.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn child_entities_override_in_place() {
        let base = pack(json!({
            "channels": [
                {"id": "a", "name": "A base"},
                {"id": "b", "name": "B base"}
            ]
        }));
        let child = pack(json!({
            "channels": [
                {"id": "a", "name": "A child"},
                {"id": "c", "name": "C child"}
            ]
        }));

        let merged = merge_packs(&base, &child);
        assert_eq!(channel_ids(&merged), vec!["a", "b", "c"]);
        assert_eq!(merged.channels[0].name, "A child");
        assert_eq!(merged.channels[1].name, "B base");
    }

    #[test]
    fn entries_without_ids_are_appended() {
        let base = vec![Item {
            name: "nameless".into(),
            ..Default::default()
        }];
        let child = base.clone();
        let merged = merge_entities(&base, &child);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merge_with_self_keeps_entity_set() {
        let original = pack(json!({
            "pack_id": "p",
            "channels": [{"id": "a"}, {"id": "b"}],
            "items": [{"id": "chair", "name": "Chair"}]
        }));
        let merged = merge_packs(&original, &original);
        assert_eq!(merged, original);
    }

    #[test]
    fn variables_merge_keywise_and_scalars_replace() {
        let base = pack(json!({
            "pack_id": "base",
            "pack_version": "1.0.0",
            "extends": ["root"],
            "variables": {"craigslistSubdomain": "denver", "region": "CO"}
        }));
        let child = pack(json!({
            "pack_id": "child",
            "extends": ["base"],
            "variables": {"craigslistSubdomain": "fortcollins"}
        }));

        let merged = merge_packs(&base, &child);
        assert_eq!(merged.pack_id.as_deref(), Some("child"));
        assert_eq!(merged.pack_version.as_deref(), Some("1.0.0"));
        assert_eq!(merged.parents(), ["base".to_string()]);
        assert_eq!(merged.variable("craigslistSubdomain").as_deref(), Some("fortcollins"));
        assert_eq!(merged.variable("region").as_deref(), Some("CO"));
    }

    #[test]
    fn merge_does_not_touch_inputs() {
        let base = pack(json!({"channels": [{"id": "a", "name": "A"}]}));
        let child = pack(json!({"channels": [{"id": "a", "name": "A2"}]}));
        let before = base.clone();
        let _ = merge_packs(&base, &child);
        assert_eq!(base, before);
    }

    #[test]
    fn later_parents_override_earlier_ones() {
        let store = MemoryPackStore::from_iter([
            pack(json!({"pack_id": "left", "channels": [{"id": "x", "name": "left"}]})),
            pack(json!({"pack_id": "right", "channels": [{"id": "x", "name": "right"}]})),
            pack(json!({"pack_id": "child", "extends": ["left", "right"]})),
        ]);

        let merged = load_merged_pack("child", &store).expect("resolve");
        assert_eq!(merged.channels.len(), 1);
        assert_eq!(merged.channels[0].name, "right");
        assert_eq!(merged.pack_id.as_deref(), Some("child"));
    }

    #[test]
    fn child_wins_over_all_ancestors() {
        let store = MemoryPackStore::from_iter([
            pack(json!({"pack_id": "grand", "channels": [{"id": "x", "name": "grand"}, {"id": "g"}]})),
            pack(json!({"pack_id": "parent", "extends": ["grand"], "channels": [{"id": "x", "name": "parent"}]})),
            pack(json!({"pack_id": "child", "extends": ["parent"], "channels": [{"id": "x", "name": "child"}, {"id": "c"}]})),
        ]);

        let merged = load_merged_pack("child", &store).expect("resolve");
        assert_eq!(channel_ids(&merged), vec!["x", "g", "c"]);
        assert_eq!(merged.channels[0].name, "child");
    }

    #[test]
    fn diamond_inheritance_resolves() {
        let store = MemoryPackStore::from_iter([
            pack(json!({"pack_id": "base", "channels": [{"id": "shared"}]})),
            pack(json!({"pack_id": "a", "extends": ["base"], "channels": [{"id": "a"}]})),
            pack(json!({"pack_id": "b", "extends": ["base"], "channels": [{"id": "b"}]})),
            pack(json!({"pack_id": "top", "extends": ["a", "b"]})),
        ]);

        let merged = load_merged_pack("top", &store).expect("resolve");
        assert_eq!(channel_ids(&merged), vec!["shared", "a", "b"]);
    }

    #[test]
    fn two_pack_cycle_names_chain() {
        let store = MemoryPackStore::from_iter([
            pack(json!({"pack_id": "a", "extends": ["b"]})),
            pack(json!({"pack_id": "b", "extends": ["a"]})),
        ]);

        match load_merged_pack("a", &store) {
            Err(RepathError::Cycle { chain }) => assert_eq!(chain, vec!["a", "b", "a"]),
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn three_pack_cycle_names_chain() {
        let store = MemoryPackStore::from_iter([
            pack(json!({"pack_id": "a", "extends": ["b"]})),
            pack(json!({"pack_id": "b", "extends": ["c"]})),
            pack(json!({"pack_id": "c", "extends": ["a"]})),
        ]);

        let err = load_merged_pack("a", &store).unwrap_err();
        assert_eq!(
            err.to_string(),
            "pack inheritance cycle detected: a -> b -> c -> a"
        );
    }

    #[test]
    fn self_extension_is_a_cycle() {
        let store = MemoryPackStore::from_iter([pack(json!({"pack_id": "a", "extends": ["a"]}))]);
        match load_merged_pack("a", &store) {
            Err(RepathError::Cycle { chain }) => assert_eq!(chain, vec!["a", "a"]),
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_parent_is_not_found() {
        let store = MemoryPackStore::from_iter([pack(json!({"pack_id": "a", "extends": ["ghost"]}))]);
        match load_merged_pack("a", &store) {
            Err(RepathError::NotFound { pack_id }) => assert_eq!(pack_id, "ghost"),
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn pack_without_parents_resolves_to_itself() {
        let only = pack(json!({
            "pack_id": "solo",
            "channels": [{"id": "a"}],
            "variables": {"k": "v"}
        }));
        let store = MemoryPackStore::from_iter([only.clone()]);
        let merged = load_merged_pack("solo", &store).expect("resolve");
        assert_eq!(merged, only);
    }

    #[test]
    fn channels_default_when_absent() {
        let merged = merge_packs(&Pack::default(), &Pack::default());
        assert_eq!(merged.channels, Vec::<Channel>::new());
    }
}
