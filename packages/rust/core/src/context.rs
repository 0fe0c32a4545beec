//! Per-request location and observation context.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use repath_shared::Pack;

/// Geographic coordinates supplied by the caller. Either may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
}

/// Keep `geo` only when it is a JSON object; non-numeric coordinates read as
/// absent.
fn geo_object<'de, D>(deserializer: D) -> Result<Option<GeoPoint>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Object(map)) => Some(GeoPoint {
            lat: map.get("lat").and_then(Value::as_f64),
            lon: map.get("lon").and_then(Value::as_f64),
        }),
        _ => None,
    })
}

/// Context as supplied on a decide request. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecideContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub municipality_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_slug: Option<String>,
    #[serde(
        default,
        deserialize_with = "geo_object",
        skip_serializing_if = "Option::is_none"
    )]
    pub geo: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_prefs: Option<Map<String, Value>>,
    /// Observation key to value; `"true"`/`"false"` strings count as booleans.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub obs: BTreeMap<String, Value>,
}

/// Context after trimming and defaulting from the pack.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedContext {
    pub municipality_id: String,
    /// Uppercased ISO country code, empty when unknown.
    pub country_code: String,
    pub city: String,
    pub zip: String,
    pub city_slug: String,
    pub geo: Option<GeoPoint>,
    pub user_prefs: Option<Map<String, Value>>,
    pub obs: BTreeMap<String, Value>,
}

fn first_non_blank<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> String {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

impl ResolvedContext {
    /// Fill in the municipality from the pack id (then the request pack id)
    /// and the country from the pack's municipality or jurisdiction block.
    pub fn resolve(raw: Option<&DecideContext>, pack: &Pack, request_pack_id: &str) -> Self {
        let empty = DecideContext::default();
        let raw = raw.unwrap_or(&empty);

        Self {
            municipality_id: first_non_blank([
                raw.municipality_id.as_deref(),
                pack.id(),
                Some(request_pack_id),
            ]),
            country_code: first_non_blank([raw.country_code.as_deref(), pack.country()])
                .to_uppercase(),
            city: first_non_blank([raw.city.as_deref()]),
            zip: first_non_blank([raw.zip.as_deref()]),
            city_slug: first_non_blank([raw.city_slug.as_deref()]),
            geo: raw.geo,
            user_prefs: raw.user_prefs.clone(),
            obs: raw.obs.clone(),
        }
    }
}
