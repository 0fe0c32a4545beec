//! Channel resolution: scope filtering and URL template rendering.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use repath_shared::{Channel, ChannelScope, Entity, Pack, value_as_text};
use repath_text::to_city_slug;

use crate::context::ResolvedContext;

/// Pack variable consulted for a city slug when the context has none.
pub const REGIONAL_SUBDOMAIN_VARIABLE: &str = "craigslistSubdomain";

/// `{{ field }}` placeholder, whitespace inside the braces ignored.
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([^}]+?)\s*\}\}").expect("placeholder regex is valid")
});

/// A channel as attached to a pathway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedChannel {
    #[serde(flatten)]
    pub channel: Channel,
    /// Rendered template, `None` when there is no template or a field is missing.
    pub url: Option<String>,
    /// Template or required fields without a usable value, first-seen order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
}

/// Whether `channel` applies to the request's location.
pub fn channel_in_scope(channel: &Channel, context: &ResolvedContext) -> bool {
    match channel.scope {
        ChannelScope::Global => true,
        ChannelScope::Country => {
            !context.country_code.is_empty()
                && channel
                    .countries
                    .iter()
                    .any(|c| c.trim().to_uppercase() == context.country_code)
        }
        ChannelScope::Municipality => {
            !context.municipality_id.is_empty()
                && channel
                    .municipality_ids
                    .iter()
                    .any(|id| *id == context.municipality_id)
        }
        ChannelScope::Unknown => false,
    }
}

/// Values available to `{{field}}` placeholders.
///
/// Pack variables overlaid with `query`, `city`, `zip`, and `citySlug`. The
/// slug comes from the context's city slug when one is given (even if it
/// normalizes to nothing), otherwise its city, then the pack's regional
/// subdomain variable.
pub fn build_template_values(
    query: &str,
    context: &ResolvedContext,
    pack: &Pack,
) -> BTreeMap<String, String> {
    let mut values: BTreeMap<String, String> = pack
        .variables
        .iter()
        .filter_map(|(key, value)| value_as_text(value).map(|text| (key.clone(), text)))
        .collect();

    let mut city_slug = if context.city_slug.is_empty() {
        to_city_slug(&context.city)
    } else {
        to_city_slug(&context.city_slug)
    };
    if city_slug.is_empty() {
        city_slug = pack
            .variable(REGIONAL_SUBDOMAIN_VARIABLE)
            .map(|hint| to_city_slug(&hint))
            .unwrap_or_default();
    }

    values.insert("query".into(), query.trim().to_string());
    values.insert("city".into(), context.city.clone());
    values.insert("zip".into(), context.zip.clone());
    values.insert("citySlug".into(), city_slug);
    values
}

/// Outcome of rendering one URL template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedTemplate {
    pub url: Option<String>,
    pub missing: Vec<String>,
}

fn usable<'v>(values: &'v BTreeMap<String, String>, key: &str) -> Option<&'v str> {
    values
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}

fn push_unique(missing: &mut Vec<String>, key: &str) {
    if !missing.iter().any(|m| m == key) {
        missing.push(key.to_string());
    }
}

/// Substitute each placeholder with its percent-encoded value.
///
/// Placeholders without a non-blank value stay in place and are reported in
/// `missing`; the URL is only returned when nothing is missing. Encoding
/// leaves RFC 3986 unreserved characters untouched.
pub fn render_url_template(template: &str, values: &BTreeMap<String, String>) -> RenderedTemplate {
    let mut missing = Vec::new();
    let rendered = PLACEHOLDER_RE.replace_all(template, |caps: &Captures<'_>| {
        let key = caps[1].trim();
        match usable(values, key) {
            Some(value) => urlencoding::encode(value).into_owned(),
            None => {
                push_unique(&mut missing, key);
                format!("{{{{{key}}}}}")
            }
        }
    });

    RenderedTemplate {
        url: missing.is_empty().then(|| rendered.into_owned()),
        missing,
    }
}

/// Resolve `channel_ids` against the pack, dropping unknown and out-of-scope
/// channels and rendering each survivor's URL.
#[instrument(skip_all, fields(requested = channel_ids.len()))]
pub fn resolve_channels(
    channel_ids: &[String],
    pack: &Pack,
    context: &ResolvedContext,
    query: &str,
) -> Vec<ResolvedChannel> {
    if channel_ids.is_empty() {
        return Vec::new();
    }

    let by_id: HashMap<&str, &Channel> = pack
        .channels
        .iter()
        .filter_map(|channel| channel.entity_id().map(|id| (id, channel)))
        .collect();
    let values = build_template_values(query, context, pack);

    let mut resolved = Vec::new();
    for id in channel_ids {
        let Some(channel) = by_id.get(id.as_str()).copied() else {
            warn!(channel_id = %id, "rule names unknown channel");
            continue;
        };
        if !channel_in_scope(channel, context) {
            debug!(channel_id = %id, scope = ?channel.scope, "channel out of scope");
            continue;
        }

        let mut missing = Vec::new();
        for field in &channel.requires {
            if usable(&values, field).is_none() {
                push_unique(&mut missing, field);
            }
        }

        let mut url = None;
        if let Some(template) = channel.url_template.as_deref().filter(|t| !t.is_empty()) {
            let rendered = render_url_template(template, &values);
            for key in &rendered.missing {
                push_unique(&mut missing, key);
            }
            if missing.is_empty() {
                url = rendered.url;
            }
        }

        resolved.push(ResolvedChannel {
            channel: channel.clone(),
            url,
            missing,
        });
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const CRAIGSLIST: &str = "https://{{citySlug}}.craigslist.org/search/sss?query={{query}}";

    fn pack() -> Pack {
        serde_json::from_value(json!({
            "variables": {"craigslistSubdomain": "Fort Collins", "radiusMiles": 25},
            "channels": [
                {
                    "id": "craigslist",
                    "name": "Craigslist",
                    "scope": "country",
                    "countries": ["us"],
                    "urlTemplate": CRAIGSLIST,
                    "requires": ["citySlug"]
                },
                {
                    "id": "ebay",
                    "name": "eBay",
                    "scope": "global",
                    "urlTemplate": "https://www.ebay.com/sch/i.html?_nkw={{ query }}"
                },
                {
                    "id": "buy-nothing",
                    "name": "Buy Nothing",
                    "scope": "municipality",
                    "municipalityIds": ["fort-collins"]
                },
                {
                    "id": "pickup",
                    "name": "Pickup service",
                    "requires": ["zip"]
                },
                {"id": "moon", "scope": "lunar"}
            ]
        }))
        .expect("pack")
    }

    fn ctx(country: &str, municipality: &str) -> ResolvedContext {
        ResolvedContext {
            country_code: country.into(),
            municipality_id: municipality.into(),
            ..Default::default()
        }
    }

    fn ids(channels: &[ResolvedChannel]) -> Vec<&str> {
        channels.iter().map(|c| c.channel.id.as_str()).collect()
    }

    fn request(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn scope_filtering() {
        let pack = pack();
        let all = request(&["craigslist", "ebay", "buy-nothing", "moon"]);

        let us = resolve_channels(&all, &pack, &ctx("US", "fort-collins"), "chair");
        assert_eq!(ids(&us), vec!["craigslist", "ebay", "buy-nothing"]);

        let ca = resolve_channels(&all, &pack, &ctx("CA", "toronto"), "chair");
        assert_eq!(ids(&ca), vec!["ebay"]);

        let unknown = resolve_channels(&all, &pack, &ctx("", ""), "chair");
        assert_eq!(ids(&unknown), vec!["ebay"]);
    }

    #[test]
    fn unknown_channel_ids_are_skipped() {
        let pack = pack();
        let out = resolve_channels(&request(&["ghost", "ebay"]), &pack, &ctx("US", ""), "x");
        assert_eq!(ids(&out), vec!["ebay"]);
    }

    #[test]
    fn subdomain_variable_fills_city_slug() {
        let pack = pack();
        let out = resolve_channels(&request(&["craigslist"]), &pack, &ctx("US", ""), "office chair");
        assert_eq!(
            out[0].url.as_deref(),
            Some("https://fortcollins.craigslist.org/search/sss?query=office%20chair")
        );
        assert!(out[0].missing.is_empty());
    }

    #[test]
    fn context_city_beats_subdomain_variable() {
        let pack = pack();
        let context = ResolvedContext {
            city: "Loveland".into(),
            ..ctx("US", "")
        };
        let out = resolve_channels(&request(&["craigslist"]), &pack, &context, "desk");
        assert_eq!(
            out[0].url.as_deref(),
            Some("https://loveland.craigslist.org/search/sss?query=desk")
        );

        let context = ResolvedContext {
            city_slug: "Greeley".into(),
            ..context
        };
        let values = build_template_values("desk", &context, &pack);
        assert_eq!(values["citySlug"], "greeley");
        assert_eq!(values["radiusMiles"], "25");
    }

    #[test]
    fn unusable_city_slug_skips_city() {
        let context = ResolvedContext {
            city: "Loveland".into(),
            city_slug: "!!".into(),
            ..ctx("US", "")
        };
        let values = build_template_values("desk", &context, &pack());
        assert_eq!(values["citySlug"], "fortcollins");

        let mut bare = pack();
        bare.variables.clear();
        let values = build_template_values("desk", &context, &bare);
        assert_eq!(values["citySlug"], "");
    }

    #[test]
    fn missing_city_slug_withholds_url() {
        let mut pack = pack();
        pack.variables.clear();
        let out = resolve_channels(&request(&["craigslist"]), &pack, &ctx("US", ""), "chair");
        assert_eq!(out[0].url, None);
        assert_eq!(out[0].missing, vec!["citySlug".to_string()]);
    }

    #[test]
    fn required_fields_are_checked_without_template() {
        let pack = pack();
        let out = resolve_channels(&request(&["pickup"]), &pack, &ctx("", ""), "chair");
        assert_eq!(out[0].url, None);
        assert_eq!(out[0].missing, vec!["zip".to_string()]);

        let context = ResolvedContext {
            zip: "80521".into(),
            ..ctx("", "")
        };
        let out = resolve_channels(&request(&["pickup"]), &pack, &context, "chair");
        assert!(out[0].missing.is_empty());
        assert_eq!(out[0].url, None);
    }

    #[test]
    fn render_keeps_unresolved_placeholders() {
        let values = BTreeMap::from([
            ("query".to_string(), "a&b".to_string()),
            ("blank".to_string(), "  ".to_string()),
        ]);
        let rendered = render_url_template("https://x.test/{{blank}}/{{ other }}?q={{query}}", &values);
        assert_eq!(rendered.url, None);
        assert_eq!(rendered.missing, vec!["blank".to_string(), "other".to_string()]);

        let rendered = render_url_template("https://x.test/?q={{query}}", &values);
        assert_eq!(rendered.url.as_deref(), Some("https://x.test/?q=a%26b"));
    }

    #[test]
    fn resolved_channel_serializes_flat() {
        let pack = pack();
        let out = resolve_channels(&request(&["ebay"]), &pack, &ctx("", ""), "lamp");
        let value = serde_json::to_value(&out[0]).expect("serialize");
        assert_eq!(value["id"], json!("ebay"));
        assert_eq!(value["url"], json!("https://www.ebay.com/sch/i.html?_nkw=lamp"));
        assert!(value.get("missing").is_none());
    }
}
