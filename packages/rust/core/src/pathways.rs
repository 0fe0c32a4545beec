//! Pathway assembly, ranking, and follow-up question derivation.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, instrument};

use repath_shared::{Action, Item, Location, Pack, Rule};

use crate::channels::{ResolvedChannel, resolve_channels};
use crate::context::ResolvedContext;
use crate::locations::{resolve_location_ids, resolve_rule_locations};

/// Added to legacy card ranks so they sort after rule pathways.
pub const LEGACY_RANK_OFFSET: f64 = 200.0;

/// Where a pathway came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathwaySource {
    Rule,
    LegacyOptionCard,
}

/// One ranked recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pathway {
    pub id: String,
    pub action: Action,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<ResolvedChannel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    /// Lower sorts first. Whole ranks serialize as JSON integers.
    #[serde(serialize_with = "serialize_rank")]
    pub rank: f64,
    pub source: PathwaySource,
    /// Producing rule; `null` for legacy pathways.
    #[serde(default)]
    pub rule_id: Option<String>,
}

/// A follow-up prompt for information that would complete a channel URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    pub prompt: String,
}

impl Question {
    fn text(id: &str, label: &str, prompt: &str) -> Self {
        Self {
            id: id.into(),
            kind: "text".into(),
            label: label.into(),
            prompt: prompt.into(),
        }
    }
}

/// Largest magnitude below which every whole `f64` is exact in `i64`.
const MAX_EXACT_RANK: f64 = 9_007_199_254_740_992.0;

fn serialize_rank<S: Serializer>(rank: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if rank.fract() == 0.0 && rank.abs() < MAX_EXACT_RANK {
        serializer.serialize_i64(*rank as i64)
    } else {
        serializer.serialize_f64(*rank)
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Build the pathway a matched rule produces.
///
/// `then` fields win over the rule-level fallbacks; action defaults decide
/// rank and title when neither sets them.
pub fn pathway_from_rule(
    rule: &Rule,
    pack: &Pack,
    context: &ResolvedContext,
    query: &str,
) -> Pathway {
    let then = &rule.then;
    let action = then
        .action
        .clone()
        .or_else(|| rule.action.clone())
        .unwrap_or(Action::Unknown);
    let rank = then
        .priority
        .or(rule.priority)
        .unwrap_or_else(|| action.default_rank());
    let rule_id = Some(rule.id.trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string);
    let title = present(then.title.as_deref())
        .or(present(rule.title.as_deref()))
        .unwrap_or(action.default_title())
        .to_string();
    let rationale = present(then.rationale.as_deref())
        .or(present(rule.rationale.as_deref()))
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    Pathway {
        id: rule_id.clone().unwrap_or_else(|| format!("{action}-{rank}")),
        title,
        rationale,
        steps: then.steps.clone(),
        channels: resolve_channels(&then.channel_ids, pack, context, query),
        locations: resolve_rule_locations(then, &action, pack),
        rank,
        source: PathwaySource::Rule,
        rule_id,
        action,
    }
}

/// Map a legacy option-card kind to an action.
pub fn legacy_action(kind: &str) -> Action {
    match kind {
        "reuse" => Action::Reuse,
        "sell" => Action::Sell,
        "curbside_recycle" | "dropoff_recycle" | "dropoff_other" | "dropoff_hhw" | "compost" => {
            Action::Recycle
        }
        "trash" => Action::Trash,
        _ => Action::Unknown,
    }
}

/// Build one pathway per legacy option card on `item`.
///
/// The first `copy_text` becomes the rationale and the rest become steps;
/// `navigate` targets become locations.
pub fn pathways_from_legacy_cards(item: Option<&Item>, pack: &Pack) -> Vec<Pathway> {
    let Some(item) = item else {
        return Vec::new();
    };

    item.option_cards
        .iter()
        .map(|card| {
            let action = legacy_action(&card.kind);
            let mut texts = card
                .actions
                .iter()
                .filter_map(|a| a.copy_text())
                .map(str::to_string);
            let rationale = texts.next();
            let steps: Vec<String> = texts.collect();
            let locations = resolve_location_ids(
                card.actions.iter().filter_map(|a| a.navigate_target()),
                pack,
            );
            let id = match present(Some(card.id.as_str())) {
                Some(id) => id.to_string(),
                None => format!("{}-{action}", item.id),
            };

            Pathway {
                id,
                title: present(Some(card.title.as_str()))
                    .unwrap_or(action.default_title())
                    .to_string(),
                rationale,
                steps,
                channels: Vec::new(),
                locations,
                rank: LEGACY_RANK_OFFSET + card.priority.unwrap_or_else(|| action.default_rank()),
                source: PathwaySource::LegacyOptionCard,
                rule_id: None,
                action,
            }
        })
        .collect()
}

/// Combine rule and legacy pathways and order them.
///
/// A legacy pathway is dropped when any rule pathway already has its action.
/// Ordering is by rank, then id (byte-wise); the sort is stable.
#[instrument(skip_all, fields(rules = rule_pathways.len(), legacy = legacy_pathways.len()))]
pub fn merge_pathways(rule_pathways: Vec<Pathway>, legacy_pathways: Vec<Pathway>) -> Vec<Pathway> {
    let covered: HashSet<Action> = rule_pathways.iter().map(|p| p.action.clone()).collect();

    let mut merged = rule_pathways;
    for pathway in legacy_pathways {
        if covered.contains(&pathway.action) {
            debug!(pathway_id = %pathway.id, action = %pathway.action, "legacy pathway covered by rule");
            continue;
        }
        merged.push(pathway);
    }

    merged.sort_by(|a, b| a.rank.total_cmp(&b.rank).then_with(|| a.id.cmp(&b.id)));
    merged
}

/// Questions that would complete the top pathway's channel URLs.
pub fn build_questions(pathways: &[Pathway]) -> Vec<Question> {
    let Some(top) = pathways.first() else {
        return Vec::new();
    };
    let missing: BTreeSet<&str> = top
        .channels
        .iter()
        .flat_map(|channel| channel.missing.iter().map(String::as_str))
        .collect();

    let mut questions = Vec::new();
    if missing.contains("city") || missing.contains("citySlug") {
        questions.push(Question::text("city", "City", "What city are you in?"));
    }
    if missing.contains("zip") {
        questions.push(Question::text("zip", "ZIP code", "What ZIP code are you in?"));
    }
    questions
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn pack() -> Pack {
        serde_json::from_value(json!({
            "channels": [{
                "id": "craigslist",
                "scope": "global",
                "urlTemplate": "https://{{citySlug}}.craigslist.org/?q={{query}}",
                "requires": ["zip"]
            }],
            "locations": [
                {"id": "arc", "name": "ARC", "country": "US", "type": "donation"},
                {"id": "depot", "name": "Recycling depot", "country": "US"}
            ]
        }))
        .expect("pack")
    }

    fn rule(value: serde_json::Value) -> Rule {
        serde_json::from_value(value).expect("rule")
    }

    fn item(value: serde_json::Value) -> Item {
        serde_json::from_value(value).expect("item")
    }

    fn ctx() -> ResolvedContext {
        ResolvedContext::default()
    }

    fn ids(pathways: &[Pathway]) -> Vec<&str> {
        pathways.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn rule_pathway_uses_then_fields() {
        let r = rule(json!({
            "id": "chair-reuse",
            "title": "Rule title",
            "then": {
                "action": "reuse",
                "title": "Pass it on",
                "rationale": "  Keeps it in use.  ",
                "steps": ["Photograph it"],
                "channelIds": ["craigslist"],
                "priority": 5
            }
        }));
        let p = pathway_from_rule(&r, &pack(), &ctx(), "chair");
        assert_eq!(p.id, "chair-reuse");
        assert_eq!(p.action, Action::Reuse);
        assert_eq!(p.title, "Pass it on");
        assert_eq!(p.rationale.as_deref(), Some("Keeps it in use."));
        assert_eq!(p.rank, 5.0);
        assert_eq!(p.rule_id.as_deref(), Some("chair-reuse"));
        assert_eq!(p.channels.len(), 1);
        assert_eq!(p.channels[0].missing, vec!["zip".to_string(), "citySlug".to_string()]);
    }

    #[test]
    fn rule_pathway_falls_back_to_rule_and_action_defaults() {
        let r = rule(json!({"action": "donate", "rationale": "", "then": {"title": ""}}));
        let p = pathway_from_rule(&r, &pack(), &ctx(), "chair");
        assert_eq!(p.id, "donate-30");
        assert_eq!(p.title, "Donate to a local organization");
        assert_eq!(p.rationale, None);
        assert_eq!(p.rule_id, None);
        assert_eq!(p.locations.len(), 1);

        let r = rule(json!({"id": "x", "priority": 7}));
        let p = pathway_from_rule(&r, &pack(), &ctx(), "chair");
        assert_eq!(p.action, Action::Unknown);
        assert_eq!(p.rank, 7.0);
    }

    #[test]
    fn legacy_cards_become_pathways() {
        let chair = item(json!({
            "id": "chair",
            "name": "Chair",
            "option_cards": [
                {
                    "id": "chair-recycle",
                    "kind": "dropoff_recycle",
                    "title": "Drop off",
                    "priority": 3,
                    "actions": [
                        {"type": "copy_text", "text": "Metal frames only."},
                        {"type": "copy_text", "text": "Remove cushions."},
                        {"type": "navigate", "payload": {"location_id": "depot"}},
                        {"type": "navigate", "location_id": "ghost"}
                    ]
                },
                {"kind": "mystery", "title": ""}
            ]
        }));
        let out = pathways_from_legacy_cards(Some(&chair), &pack());
        assert_eq!(out.len(), 2);

        assert_eq!(out[0].action, Action::Recycle);
        assert_eq!(out[0].rank, 203.0);
        assert_eq!(out[0].rationale.as_deref(), Some("Metal frames only."));
        assert_eq!(out[0].steps, vec!["Remove cushions.".to_string()]);
        assert_eq!(out[0].locations[0].id, "depot");
        assert_eq!(out[0].locations.len(), 1);
        assert_eq!(out[0].source, PathwaySource::LegacyOptionCard);

        assert_eq!(out[1].id, "chair-unknown");
        assert_eq!(out[1].title, "Need more information");
        assert_eq!(out[1].rank, 350.0);
        assert_eq!(out[1].rationale, None);

        assert!(pathways_from_legacy_cards(None, &pack()).is_empty());
    }

    #[test]
    fn legacy_kinds_map_to_actions() {
        assert_eq!(legacy_action("compost"), Action::Recycle);
        assert_eq!(legacy_action("dropoff_hhw"), Action::Recycle);
        assert_eq!(legacy_action("sell"), Action::Sell);
        assert_eq!(legacy_action("donate"), Action::Unknown);
    }

    fn stub(id: &str, action: Action, rank: f64, source: PathwaySource) -> Pathway {
        Pathway {
            id: id.into(),
            title: action.default_title().into(),
            action,
            rationale: None,
            steps: Vec::new(),
            channels: Vec::new(),
            locations: Vec::new(),
            rank,
            source,
            rule_id: None,
        }
    }

    #[test]
    fn merge_drops_covered_legacy_actions_and_sorts() {
        let rules = vec![
            stub("reuse-b", Action::Reuse, 10.0, PathwaySource::Rule),
            stub("trash", Action::Trash, 100.0, PathwaySource::Rule),
            stub("reuse-a", Action::Reuse, 10.0, PathwaySource::Rule),
        ];
        let legacy = vec![
            stub("card-reuse", Action::Reuse, 201.0, PathwaySource::LegacyOptionCard),
            stub("card-recycle", Action::Recycle, 260.0, PathwaySource::LegacyOptionCard),
        ];
        let merged = merge_pathways(rules, legacy);
        assert_eq!(ids(&merged), vec!["reuse-a", "reuse-b", "trash", "card-recycle"]);
    }

    #[test]
    fn questions_come_from_top_pathway_only() {
        let p = pathway_from_rule(
            &rule(json!({"id": "top", "then": {"channelIds": ["craigslist"], "priority": 1}})),
            &pack(),
            &ctx(),
            "chair",
        );
        let questions = build_questions(&[p.clone()]);
        let ids: Vec<&str> = questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["city", "zip"]);
        assert_eq!(questions[1].prompt, "What ZIP code are you in?");

        let plain = stub("plain", Action::Reuse, 0.0, PathwaySource::Rule);
        assert!(build_questions(&[plain, p]).is_empty());
        assert!(build_questions(&[]).is_empty());
    }

    #[test]
    fn empty_fields_are_omitted_from_json() {
        let p = stub("card", Action::Trash, 300.0, PathwaySource::LegacyOptionCard);
        let value = serde_json::to_value(&p).expect("serialize");
        assert_eq!(
            value,
            json!({
                "id": "card",
                "action": "trash",
                "title": "Trash (last resort)",
                "rank": 300,
                "source": "legacy_option_card",
                "ruleId": null
            })
        );
    }

    #[test]
    fn fractional_priorities_rank_between_whole_ones() {
        let pack: Pack = serde_json::from_value(json!({
            "rules": [
                {"id": "b-later", "then": {"action": "reuse", "priority": 13}},
                {"id": "a-between", "then": {"action": "sell", "priority": 12.5}},
                {"then": {"action": "repair", "priority": 12.5}},
                {"then": {"action": "donate"}}
            ]
        }))
        .expect("pack");
        let built: Vec<Pathway> = pack
            .rules
            .iter()
            .map(|r| pathway_from_rule(r, &pack, &ctx(), "chair"))
            .collect();
        assert_eq!(built[2].id, "repair-12.5");
        assert_eq!(built[3].id, "donate-30");

        let merged = merge_pathways(built, Vec::new());
        assert_eq!(ids(&merged), vec!["a-between", "repair-12.5", "b-later", "donate-30"]);

        let value = serde_json::to_value(&merged[0]).expect("serialize");
        assert_eq!(value["rank"], json!(12.5));
        let value = serde_json::to_value(&merged[2]).expect("serialize");
        assert_eq!(value["rank"], json!(13));
    }
}
