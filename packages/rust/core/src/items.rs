//! Item resolution: map a free-text query to the best catalog item.

use std::collections::HashSet;

use tracing::{debug, instrument};

use repath_shared::{Item, Pack};
use repath_text::Tokenizer;

const NAME_TOKEN_SCORE: u32 = 5;
const KEYWORD_TOKEN_SCORE: u32 = 3;
const ACTION_TOKEN_SCORE: u32 = 1;
const FULL_NAME_BONUS: u32 = 4;

/// Find the item in `pack` that best matches `query`.
///
/// Matching tiers, first hit wins:
/// 1. exact (case-insensitive) item id
/// 2. exact item name
/// 3. exact item keyword
/// 4. highest token-overlap score, ties broken by catalog order
/// 5. item name containing the raw query
#[instrument(skip(pack, tokenizer), fields(items = pack.items.len()))]
pub fn resolve_best_item<'p>(pack: &'p Pack, query: &str, tokenizer: &Tokenizer) -> Option<&'p Item> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    let items = &pack.items;
    let query_lower = query.to_lowercase();

    let exact = items
        .iter()
        .find(|item| item.id.to_lowercase() == query_lower)
        .or_else(|| items.iter().find(|item| item.name.to_lowercase() == query_lower))
        .or_else(|| {
            items.iter().find(|item| {
                item.keywords
                    .iter()
                    .any(|keyword| keyword.to_lowercase() == query_lower)
            })
        });
    if let Some(item) = exact {
        debug!(item_id = %item.id, "exact item match");
        return Some(item);
    }

    let tokens = tokenizer.tokenize(query);
    let mut best: Option<(&Item, u32)> = None;
    for item in items {
        let score = score_item(item, &tokens, tokenizer);
        if score > 0 && best.is_none_or(|(_, top)| score > top) {
            best = Some((item, score));
        }
    }
    if let Some((item, score)) = best {
        debug!(item_id = %item.id, score, "scored item match");
        return Some(item);
    }

    items
        .iter()
        .find(|item| item.name.to_lowercase().contains(&query_lower))
}

/// Token-overlap score of `item` against normalized query `tokens`.
///
/// Each token scores once, against the first field it appears in: name (5),
/// keywords (3), or legacy option-card action text (1). A non-zero score
/// gets a bonus of 4 when the item name contains the space-joined tokens.
pub fn score_item(item: &Item, tokens: &[String], tokenizer: &Tokenizer) -> u32 {
    if tokens.is_empty() {
        return 0;
    }

    let name_tokens: HashSet<String> = tokenizer.tokenize(&item.name).into_iter().collect();
    let keyword_tokens: HashSet<String> = tokenizer
        .tokenize_all(item.keywords.iter().map(String::as_str))
        .into_iter()
        .collect();
    let action_tokens: HashSet<String> = tokenizer
        .tokenize_all(
            item.option_cards
                .iter()
                .flat_map(|card| &card.actions)
                .filter_map(|action| action.text.as_deref()),
        )
        .into_iter()
        .collect();

    let mut score = 0;
    for token in tokens {
        if name_tokens.contains(token) {
            score += NAME_TOKEN_SCORE;
        } else if keyword_tokens.contains(token) {
            score += KEYWORD_TOKEN_SCORE;
        } else if action_tokens.contains(token) {
            score += ACTION_TOKEN_SCORE;
        }
    }

    if score > 0 && item.name.to_lowercase().contains(&tokens.join(" ")) {
        score += FULL_NAME_BONUS;
    }
    score
}
