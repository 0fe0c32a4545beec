//! Location resolution for rule and legacy pathways.

use std::collections::HashMap;

use tracing::debug;

use repath_shared::{Action, Entity, Location, Pack, RuleThen};

/// Location type offered to `donate` pathways that name no locations.
pub const DONATION_LOCATION_TYPE: &str = "donation";

/// Pick locations for a rule: explicit ids, else wanted types, else donation
/// sites for a `donate` action.
pub fn resolve_rule_locations(then: &RuleThen, action: &Action, pack: &Pack) -> Vec<Location> {
    if !then.location_ids.is_empty() {
        return resolve_location_ids(then.location_ids.iter().map(String::as_str), pack);
    }

    let wanted_type = |location: &&Location| {
        location
            .location_type
            .as_deref()
            .is_some_and(|kind| then.location_types.iter().any(|t| t == kind))
    };
    if !then.location_types.is_empty() {
        return pack.locations.iter().filter(wanted_type).cloned().collect();
    }

    if *action == Action::Donate {
        return pack
            .locations
            .iter()
            .filter(|location| location.location_type.as_deref() == Some(DONATION_LOCATION_TYPE))
            .cloned()
            .collect();
    }

    Vec::new()
}

/// Look up locations by id in order, skipping ids the pack does not define.
pub fn resolve_location_ids<'a>(ids: impl IntoIterator<Item = &'a str>, pack: &Pack) -> Vec<Location> {
    let by_id: HashMap<&str, &Location> = pack
        .locations
        .iter()
        .filter_map(|location| location.entity_id().map(|id| (id, location)))
        .collect();

    ids.into_iter()
        .filter_map(|id| {
            let found = by_id.get(id).copied().cloned();
            if found.is_none() {
                debug!(location_id = id, "unknown location skipped");
            }
            found
        })
        .collect()
}
