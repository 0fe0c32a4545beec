//! Decision entry points: request in, ranked pathways out.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use repath_packs::{PackSource, load_merged_pack};
use repath_shared::{Pack, RepathError, Result};
use repath_text::Tokenizer;

use crate::context::{DecideContext, ResolvedContext};
use crate::items::resolve_best_item;
use crate::pathways::{
    Pathway, Question, build_questions, merge_pathways, pathway_from_rule,
    pathways_from_legacy_cards,
};
use crate::rules::match_rules;

/// A decision request.
///
/// `label` takes precedence over `query_text` when both are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecideRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<DecideContext>,
}

impl DecideRequest {
    /// The trimmed query, `label` first.
    pub fn query(&self) -> String {
        [self.label.as_deref(), self.query_text.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|q| !q.is_empty())
            .unwrap_or_default()
            .to_string()
    }
}

/// The matched catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: String,
    pub name: String,
}

/// Which item, rules, and pathways produced a response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleTrace {
    pub item_id: Option<String>,
    /// Matched rule ids in pack order; empty strings for rules without an id.
    pub matched_rule_ids: Vec<String>,
    pub pathway_ids: Vec<String>,
}

/// The result of a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecideResponse {
    pub pack_id: String,
    pub query: String,
    pub item: Option<ItemSummary>,
    pub pathways: Vec<Pathway>,
    pub questions: Vec<Question>,
    pub rule_trace: RuleTrace,
}

/// Where `decide` gets its pack from.
#[derive(Clone, Copy)]
pub enum PackInput<'a> {
    /// An already merged pack, used as is.
    Loaded(&'a Pack),
    /// A source to load and merge the requested pack from.
    Source(&'a dyn PackSource),
}

impl std::fmt::Debug for PackInput<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loaded(pack) => f.debug_tuple("Loaded").field(&pack.id()).finish(),
            Self::Source(_) => f.write_str("Source(..)"),
        }
    }
}

/// Runs decisions with a configured tokenizer.
#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    tokenizer: Tokenizer,
}

impl DecisionEngine {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self { tokenizer }
    }

    /// Decide against an already merged pack. Never fails; an unmatched
    /// query yields whatever unconditional rules produce.
    #[instrument(skip_all, fields(pack_id = pack.id()))]
    pub fn decide_with_pack(&self, pack: &Pack, request: &DecideRequest) -> DecideResponse {
        let pack_id = request
            .pack_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .or(pack.id())
            .unwrap_or_default()
            .to_string();
        let query_text = request.query();
        let context = ResolvedContext::resolve(request.context.as_ref(), pack, &pack_id);

        let item = resolve_best_item(pack, &query_text, &self.tokenizer);
        let query = if query_text.is_empty() {
            item.map(|i| i.name.trim().to_string()).unwrap_or_default()
        } else {
            query_text
        };
        let query_tokens = self.tokenizer.tokenize(&query);
        debug!(item_id = item.map(|i| i.id.as_str()), tokens = query_tokens.len(), "query resolved");

        let matched = match_rules(&pack.rules, &context, item, &query_tokens, &self.tokenizer);
        let rule_pathways = matched
            .iter()
            .map(|rule| pathway_from_rule(rule, pack, &context, &query))
            .collect();
        let legacy_pathways = pathways_from_legacy_cards(item, pack);
        let pathways = merge_pathways(rule_pathways, legacy_pathways);
        let questions = build_questions(&pathways);

        info!(
            matched_rules = matched.len(),
            pathways = pathways.len(),
            questions = questions.len(),
            "decision made"
        );

        DecideResponse {
            rule_trace: RuleTrace {
                item_id: item.map(|i| i.id.clone()),
                matched_rule_ids: matched.iter().map(|r| r.id.clone()).collect(),
                pathway_ids: pathways.iter().map(|p| p.id.clone()).collect(),
            },
            pack_id,
            query,
            item: item.map(|i| ItemSummary {
                id: i.id.clone(),
                name: i.name.clone(),
            }),
            pathways,
            questions,
        }
    }

    /// Validate the request, obtain the merged pack, and decide.
    ///
    /// The pack id is the request's `packId`, else the context's
    /// `municipalityId`. Fails before touching the pack when either the pack
    /// id or the query is missing.
    pub fn decide(&self, request: &DecideRequest, input: PackInput<'_>) -> Result<DecideResponse> {
        let pack_id = [
            request.pack_id.as_deref(),
            request.context.as_ref().and_then(|c| c.municipality_id.as_deref()),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| RepathError::invalid_request("packId is required"))?;
        if request.query().is_empty() {
            return Err(RepathError::invalid_request("label or queryText is required"));
        }

        let request = DecideRequest {
            pack_id: Some(pack_id.clone()),
            ..request.clone()
        };
        match input {
            PackInput::Loaded(pack) => Ok(self.decide_with_pack(pack, &request)),
            PackInput::Source(source) => {
                let pack = load_merged_pack(&pack_id, source)?;
                Ok(self.decide_with_pack(&pack, &request))
            }
        }
    }
}

/// [`DecisionEngine::decide_with_pack`] with the naive tokenizer.
pub fn decide_with_pack(pack: &Pack, request: &DecideRequest) -> DecideResponse {
    DecisionEngine::default().decide_with_pack(pack, request)
}

/// [`DecisionEngine::decide`] with the naive tokenizer.
pub fn decide(request: &DecideRequest, input: PackInput<'_>) -> Result<DecideResponse> {
    DecisionEngine::default().decide(request, input)
}
