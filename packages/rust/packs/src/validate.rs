//! Authoring-time pack validation.
//!
//! Runtime decisions tolerate incomplete packs; these checks are for pack
//! authors and CI. All issues are collected rather than failing fast.

use std::collections::{HashMap, HashSet};

use repath_shared::{Entity, Jurisdiction, Pack};

/// A single problem found in a pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Field location, e.g. `items[2].option_cards[0].kind`.
    pub location: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.location, self.message)
    }
}

fn blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

const NON_EMPTY: &str = "must be a non-empty string";

/// Check a single pack document's required fields and identifier uniqueness.
pub fn validate_pack(pack: &Pack) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for (field, value) in [
        ("pack_id", pack.pack_id.as_deref()),
        ("pack_version", pack.pack_version.as_deref()),
        ("retrieved_at", pack.retrieved_at.as_deref()),
    ] {
        if blank(value) {
            issues.push(ValidationIssue::new(field, NON_EMPTY));
        }
    }
    if pack.pack_schema_version.is_some() && blank(pack.pack_schema_version.as_deref()) {
        issues.push(ValidationIssue::new("pack_schema_version", NON_EMPTY));
    }

    match (&pack.municipality, &pack.jurisdiction) {
        (None, None) => issues.push(ValidationIssue::new(
            "(root)",
            "either municipality or jurisdiction must be provided",
        )),
        (municipality, jurisdiction) => {
            if let Some(m) = municipality {
                check_jurisdiction(&mut issues, "municipality", m, true);
            }
            if let Some(j) = jurisdiction {
                check_jurisdiction(&mut issues, "jurisdiction", j, false);
            }
        }
    }

    for (i, location) in pack.locations.iter().enumerate() {
        for (field, value) in [
            ("id", location.id.as_str()),
            ("name", location.name.as_str()),
            ("country", location.country.as_str()),
        ] {
            if value.trim().is_empty() {
                issues.push(ValidationIssue::new(format!("locations[{i}].{field}"), NON_EMPTY));
            }
        }
    }

    for (i, item) in pack.items.iter().enumerate() {
        for (field, value) in [("id", item.id.as_str()), ("name", item.name.as_str())] {
            if value.trim().is_empty() {
                issues.push(ValidationIssue::new(format!("items[{i}].{field}"), NON_EMPTY));
            }
        }
        for (j, card) in item.option_cards.iter().enumerate() {
            let at = format!("items[{i}].option_cards[{j}]");
            for (field, value) in [
                ("id", card.id.as_str()),
                ("kind", card.kind.as_str()),
                ("title", card.title.as_str()),
            ] {
                if value.trim().is_empty() {
                    issues.push(ValidationIssue::new(format!("{at}.{field}"), NON_EMPTY));
                }
            }
            if card.priority.is_none() {
                issues.push(ValidationIssue::new(format!("{at}.priority"), "must be a number"));
            }
            if card.confidence.is_none() {
                issues.push(ValidationIssue::new(format!("{at}.confidence"), "must be a number"));
            }
        }
    }

    check_unique(&mut issues, "channels", &pack.channels);
    check_unique(&mut issues, "locations", &pack.locations);
    check_unique(&mut issues, "rules", &pack.rules);
    check_unique(&mut issues, "items", &pack.items);
    check_unique(&mut issues, "aliases", &pack.aliases);

    if let Some(id) = pack.id() {
        if pack.parents().iter().any(|parent| parent == id) {
            issues.push(ValidationIssue::new("extends", "must not name the pack itself"));
        }
    }

    issues
}

fn check_jurisdiction(
    issues: &mut Vec<ValidationIssue>,
    block: &str,
    value: &Jurisdiction,
    needs_region: bool,
) {
    if blank(value.name.as_deref()) {
        issues.push(ValidationIssue::new(format!("{block}.name"), NON_EMPTY));
    }
    if needs_region && blank(value.region.as_deref()) {
        issues.push(ValidationIssue::new(format!("{block}.region"), NON_EMPTY));
    }
    if blank(value.country.as_deref()) {
        issues.push(ValidationIssue::new(format!("{block}.country"), NON_EMPTY));
    }
}

fn check_unique<T: Entity>(issues: &mut Vec<ValidationIssue>, collection: &str, entries: &[T]) {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (i, entry) in entries.iter().enumerate() {
        let Some(id) = entry.entity_id() else { continue };
        if let Some(previous) = seen.insert(id, i) {
            issues.push(ValidationIssue::new(
                format!("{collection}[{i}].id"),
                format!("duplicates {collection}[{previous}].id '{id}'"),
            ));
        }
    }
}

/// Check that a merged pack's rules only reference entities it contains.
pub fn validate_references(pack: &Pack) -> Vec<ValidationIssue> {
    let channel_ids: HashSet<&str> = pack.channels.iter().filter_map(Entity::entity_id).collect();
    let location_ids: HashSet<&str> = pack.locations.iter().filter_map(Entity::entity_id).collect();
    let item_ids: HashSet<&str> = pack.items.iter().filter_map(Entity::entity_id).collect();
    let mut issues = Vec::new();

    for (i, rule) in pack.rules.iter().enumerate() {
        for id in &rule.then.channel_ids {
            if !channel_ids.contains(id.as_str()) {
                issues.push(ValidationIssue::new(
                    format!("rules[{i}].then.channelIds"),
                    format!("names unknown channel '{id}'"),
                ));
            }
        }
        for id in &rule.then.location_ids {
            if !location_ids.contains(id.as_str()) {
                issues.push(ValidationIssue::new(
                    format!("rules[{i}].then.locationIds"),
                    format!("names unknown location '{id}'"),
                ));
            }
        }
        for id in &rule.when.item_ids {
            if !item_ids.contains(id.as_str()) {
                issues.push(ValidationIssue::new(
                    format!("rules[{i}].when.itemIds"),
                    format!("names unknown item '{id}'"),
                ));
            }
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pack(value: serde_json::Value) -> Pack {
        serde_json::from_value(value).expect("valid pack")
    }

    fn valid_pack() -> Pack {
        pack(json!({
            "pack_id": "repath.muni.test.v1",
            "pack_version": "1.0.0",
            "retrieved_at": "2026-01-01",
            "municipality": {"name": "Testville", "region": "CO", "country": "US"},
            "locations": [{"id": "loc", "name": "Depot", "country": "US"}],
            "items": [{
                "id": "chair",
                "name": "Chair",
                "option_cards": [{
                    "id": "chair-reuse", "kind": "reuse", "title": "Reuse",
                    "priority": 1, "confidence": 0.9, "actions": []
                }]
            }]
        }))
    }

    #[test]
    fn valid_pack_has_no_issues() {
        assert!(validate_pack(&valid_pack()).is_empty());
    }

    #[test]
    fn missing_metadata_is_reported() {
        let issues = validate_pack(&Pack::default());
        let locations: Vec<&str> = issues.iter().map(|i| i.location.as_str()).collect();
        assert!(locations.contains(&"pack_id"));
        assert!(locations.contains(&"pack_version"));
        assert!(locations.contains(&"retrieved_at"));
        assert!(locations.contains(&"(root)"));
    }

    #[test]
    fn option_card_fields_are_checked() {
        let mut pack = valid_pack();
        pack.items[0].option_cards[0].kind.clear();
        pack.items[0].option_cards[0].confidence = None;
        let issues = validate_pack(&pack);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].to_string(), "items[0].option_cards[0].kind must be a non-empty string");
        assert_eq!(issues[1].location, "items[0].option_cards[0].confidence");
    }

    #[test]
    fn mistyped_card_priority_loads_but_is_reported() {
        let mut raw = serde_json::to_value(valid_pack()).expect("serialize");
        raw["items"][0]["option_cards"][0]["priority"] = json!("1");
        let pack = pack(raw);
        let issues = validate_pack(&pack);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].to_string(), "items[0].option_cards[0].priority must be a number");
    }

    #[test]
    fn duplicate_ids_are_reported() {
        let mut pack = valid_pack();
        pack.locations.push(pack.locations[0].clone());
        let issues = validate_pack(&pack);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].location, "locations[1].id");
    }

    #[test]
    fn jurisdiction_does_not_need_region() {
        let mut pack = valid_pack();
        pack.municipality = None;
        pack.jurisdiction = Some(Jurisdiction {
            name: Some("United States".into()),
            country: Some("US".into()),
            ..Default::default()
        });
        assert!(validate_pack(&pack).is_empty());
    }

    #[test]
    fn dangling_rule_references_are_reported() {
        let pack = pack(json!({
            "channels": [{"id": "ebay"}],
            "rules": [{
                "id": "reuse",
                "when": {"itemIds": ["chair"]},
                "then": {"action": "reuse", "channelIds": ["ebay", "ghost"]}
            }]
        }));
        let issues = validate_references(&pack);
        assert_eq!(issues.len(), 2);
        assert!(issues[0].message.contains("ghost"));
        assert!(issues[1].message.contains("chair"));
    }
}
