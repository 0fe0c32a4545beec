//! Decision pipeline for repath.
//!
//! Takes a merged knowledge pack and a free-text request and produces ranked
//! disposal and reuse pathways, plus follow-up questions for information that
//! would complete channel links. Nothing here reads files or talks to the
//! network; packs come in through [`PackInput`].

pub mod channels;
pub mod context;
pub mod decide;
pub mod items;
pub mod locations;
pub mod pathways;
pub mod rules;

pub use channels::{
    REGIONAL_SUBDOMAIN_VARIABLE, RenderedTemplate, ResolvedChannel, build_template_values,
    channel_in_scope, render_url_template, resolve_channels,
};
pub use context::{DecideContext, GeoPoint, ResolvedContext};
pub use decide::{
    DecideRequest, DecideResponse, DecisionEngine, ItemSummary, PackInput, RuleTrace, decide,
    decide_with_pack,
};
pub use items::{resolve_best_item, score_item};
pub use locations::{DONATION_LOCATION_TYPE, resolve_location_ids, resolve_rule_locations};
pub use pathways::{
    LEGACY_RANK_OFFSET, Pathway, PathwaySource, Question, build_questions, legacy_action,
    merge_pathways, pathway_from_rule, pathways_from_legacy_cards,
};
pub use rules::{match_rules, rule_matches};
