//! Typed records for repath knowledge packs.
//!
//! Pack documents are externally authored JSON, so every field that may be
//! absent defaults rather than failing the load. Field names follow the
//! published pack format, which mixes `snake_case` (`pack_id`,
//! `option_cards`) and `camelCase` (`urlTemplate`, `channelIds`).

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Entity identity
// ---------------------------------------------------------------------------

/// An entry in one of a pack's entity collections.
pub trait Entity {
    /// The entry's identifier, or `None` when it is missing or blank.
    fn entity_id(&self) -> Option<&str>;
}

fn non_blank(id: &str) -> Option<&str> {
    if id.trim().is_empty() { None } else { Some(id) }
}

/// Accept any JSON number; anything else (strings, booleans, objects) reads
/// as absent so one mistyped field does not reject the whole pack.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_f64))
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// What a pathway asks the user to do with an item.
///
/// Unrecognised tags are kept verbatim in [`Action::Other`] and ranked like
/// [`Action::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    Reuse,
    Sell,
    Giveaway,
    Exchange,
    Repair,
    Donate,
    Recycle,
    Trash,
    Unknown,
    Other(String),
}

impl Action {
    /// Wire name of the action.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Reuse => "reuse",
            Self::Sell => "sell",
            Self::Giveaway => "giveaway",
            Self::Exchange => "exchange",
            Self::Repair => "repair",
            Self::Donate => "donate",
            Self::Recycle => "recycle",
            Self::Trash => "trash",
            Self::Unknown => "unknown",
            Self::Other(tag) => tag,
        }
    }

    /// Rank used when a rule or legacy card does not set a priority.
    pub fn default_rank(&self) -> f64 {
        match self {
            Self::Reuse => 10.0,
            Self::Sell => 12.0,
            Self::Giveaway => 14.0,
            Self::Exchange => 16.0,
            Self::Repair => 20.0,
            Self::Donate => 30.0,
            Self::Recycle => 60.0,
            Self::Trash => 100.0,
            Self::Unknown | Self::Other(_) => 150.0,
        }
    }

    /// Title used when a rule or legacy card does not set one.
    pub fn default_title(&self) -> &'static str {
        match self {
            Self::Reuse => "Reuse first",
            Self::Sell => "Sell or pass along",
            Self::Giveaway => "Give away locally",
            Self::Exchange => "Exchange with community",
            Self::Repair => "Repair if practical",
            Self::Donate => "Donate to a local organization",
            Self::Recycle => "Recycle",
            Self::Trash => "Trash (last resort)",
            Self::Unknown | Self::Other(_) => "Need more information",
        }
    }
}

impl From<String> for Action {
    fn from(tag: String) -> Self {
        match tag.trim() {
            "reuse" => Self::Reuse,
            "sell" => Self::Sell,
            "giveaway" => Self::Giveaway,
            "exchange" => Self::Exchange,
            "repair" => Self::Repair,
            "donate" => Self::Donate,
            "recycle" => Self::Recycle,
            "trash" => Self::Trash,
            "unknown" | "" => Self::Unknown,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<&str> for Action {
    fn from(tag: &str) -> Self {
        Self::from(tag.to_string())
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_string()
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Geographic applicability tier of a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelScope {
    #[default]
    Global,
    Country,
    Municipality,
    /// Any other tag; such channels never pass scope filtering.
    #[serde(other)]
    Unknown,
}

/// An external avenue (marketplace, directory) a pathway can be acted on through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Free-form category tag (`marketplace`, `donation_directory`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub scope: ChannelScope,
    /// Allowed ISO country codes for `country` scope.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub countries: Vec<String>,
    /// Allowed municipality identifiers for `municipality` scope.
    #[serde(
        default,
        rename = "municipalityIds",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub municipality_ids: Vec<String>,
    /// URL with `{{field}}` placeholders.
    #[serde(
        default,
        rename = "urlTemplate",
        skip_serializing_if = "Option::is_none"
    )]
    pub url_template: Option<String>,
    /// Template fields that must resolve even when absent from the template.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Entity for Channel {
    fn entity_id(&self) -> Option<&str> {
        non_blank(&self.id)
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// A physical drop-off, donation, or service point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub country: String,
    /// Location type used for filtering (e.g. `donation`).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub location_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Entity for Location {
    fn entity_id(&self) -> Option<&str> {
        non_blank(&self.id)
    }
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// Conditions under which a rule applies. Absent conditions always hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleWhen {
    #[serde(default, rename = "itemIds", skip_serializing_if = "Vec::is_empty")]
    pub item_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Observation key to expected value.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub obs: BTreeMap<String, Value>,
}

/// The pathway a matching rule produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleThen {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
    #[serde(default, rename = "channelIds", skip_serializing_if = "Vec::is_empty")]
    pub channel_ids: Vec<String>,
    #[serde(default, rename = "locationIds", skip_serializing_if = "Vec::is_empty")]
    pub location_ids: Vec<String>,
    #[serde(
        default,
        rename = "locationTypes",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub location_types: Vec<String>,
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub priority: Option<f64>,
}

/// A condition/action pair mapping item and context matches to a pathway.
///
/// The rule-level `action`, `title`, `rationale`, and `priority` are
/// fallbacks for the same fields in `then`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub when: RuleWhen,
    #[serde(default)]
    pub then: RuleThen,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub priority: Option<f64>,
}

impl Entity for Rule {
    fn entity_id(&self) -> Option<&str> {
        non_blank(&self.id)
    }
}

// ---------------------------------------------------------------------------
// Item (with legacy option cards)
// ---------------------------------------------------------------------------

/// Location reference nested under a `navigate` action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardActionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
}

/// One step of a legacy option card (`copy_text`, `navigate`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardAction {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<CardActionPayload>,
}

impl CardAction {
    /// Text of a non-empty `copy_text` action.
    pub fn copy_text(&self) -> Option<&str> {
        match (self.kind.as_str(), self.text.as_deref()) {
            ("copy_text", Some(text)) if !text.is_empty() => Some(text),
            _ => None,
        }
    }

    /// Location referenced by a `navigate` action, payload first.
    pub fn navigate_target(&self) -> Option<&str> {
        if self.kind != "navigate" {
            return None;
        }
        self.payload
            .as_ref()
            .and_then(|p| p.location_id.as_deref())
            .or(self.location_id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

/// Pre-rule-engine, per-item action definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionCard {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub priority: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub actions: Vec<CardAction>,
}

/// A catalog entry the free-text query is matched against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub option_cards: Vec<OptionCard>,
}

impl Entity for Item {
    fn entity_id(&self) -> Option<&str> {
        non_blank(&self.id)
    }
}

// ---------------------------------------------------------------------------
// Alias
// ---------------------------------------------------------------------------

/// Alternate term for catalog content. Carried through merges untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alias {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Entity for Alias {
    fn entity_id(&self) -> Option<&str> {
        non_blank(&self.id)
    }
}

// ---------------------------------------------------------------------------
// Pack
// ---------------------------------------------------------------------------

/// Jurisdiction metadata (`municipality` or `jurisdiction` block).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Jurisdiction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_areas: Option<Vec<String>>,
}

/// A jurisdiction-scoped content bundle.
///
/// Scalar fields are `Option` so a merge can tell "absent" from "set".
/// Top-level keys this type does not model land in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pack {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_schema_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub municipality: Option<Jurisdiction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<Jurisdiction>,
    /// Parent pack identifiers, folded left to right.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, Value>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<Alias>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Pack {
    /// The pack's own identifier, if set and non-blank.
    pub fn id(&self) -> Option<&str> {
        self.pack_id.as_deref().and_then(non_blank)
    }

    /// Declared parents, empty when the pack extends nothing.
    pub fn parents(&self) -> &[String] {
        self.extends.as_deref().unwrap_or_default()
    }

    /// Country from the municipality block, else the jurisdiction block.
    pub fn country(&self) -> Option<&str> {
        self.municipality
            .as_ref()
            .and_then(|m| m.country.as_deref())
            .or_else(|| self.jurisdiction.as_ref().and_then(|j| j.country.as_deref()))
            .filter(|c| !c.trim().is_empty())
    }

    /// Look up a pack variable rendered as template text.
    pub fn variable(&self, name: &str) -> Option<String> {
        self.variables.get(name).and_then(value_as_text)
    }
}

/// Render a JSON scalar the way template substitution expects.
///
/// `null` has no text; strings are used as-is; other values use their JSON
/// representation.
pub fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
