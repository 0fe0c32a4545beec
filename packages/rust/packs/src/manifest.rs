//! Deployment manifest and item search index.
//!
//! Built from raw (unmerged) pack documents so hashes match the published
//! files byte for byte.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};
use url::Url;

use repath_shared::{Jurisdiction, Pack, RepathError, Result};
use repath_text::Tokenizer;

use crate::source::{FsPackStore, PACK_FILE_NAME, parse_pack};

/// Schema version assumed for packs that do not declare one.
pub const DEFAULT_SCHEMA_VERSION: &str = "1.1.0";

/// Search index format version.
pub const SEARCH_INDEX_VERSION: u32 = 1;

/// Inputs to manifest generation beyond the packs themselves.
#[derive(Debug, Clone, Default)]
pub struct ManifestOptions {
    /// Public prefix; packs are published as `<base_url>/<pack_id>.json`.
    pub base_url: Option<Url>,
    /// SHA-256 of the pack JSON schema, when one is available.
    pub schema_sha256: Option<String>,
}

/// One pack's entry in `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub url: String,
    pub sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_version: Option<String>,
    pub pack_schema_version: String,
    pub pack_schema_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<Jurisdiction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub municipality: Option<Jurisdiction>,
}

/// One pack's entry in `search.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_version: Option<String>,
    pub pack_schema_version: String,
    pub pack_schema_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_at: Option<String>,
    /// Item id to display name.
    pub items: BTreeMap<String, String>,
    /// Token to sorted, unique item ids.
    pub index: BTreeMap<String, Vec<String>>,
}

/// Root of `search.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIndex {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub packs: BTreeMap<String, SearchEntry>,
}

/// Everything `repath manifest` writes.
#[derive(Debug, Clone)]
pub struct ManifestBundle {
    pub manifest: BTreeMap<String, ManifestEntry>,
    pub search: SearchIndex,
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Build the manifest and search index for every pack in `store`.
#[instrument(skip_all, fields(root = %store.root().display()))]
pub fn build_manifest(
    store: &FsPackStore,
    options: &ManifestOptions,
    tokenizer: &Tokenizer,
) -> Result<ManifestBundle> {
    let mut manifest = BTreeMap::new();
    let mut packs = BTreeMap::new();

    for dir_name in store.list_pack_ids()? {
        let raw = store.read_raw(&dir_name)?;
        let pack = parse_pack(&raw)
            .map_err(|e| RepathError::parse(format!("{dir_name}/{PACK_FILE_NAME}: {e}")))?;
        let pack_id = pack.id().unwrap_or(&dir_name).to_string();
        if pack_id != dir_name {
            warn!(%pack_id, %dir_name, "pack_id differs from its directory name");
        }
        let schema_version = pack
            .pack_schema_version
            .clone()
            .unwrap_or_else(|| DEFAULT_SCHEMA_VERSION.to_string());

        manifest.insert(
            pack_id.clone(),
            ManifestEntry {
                url: pack_url(store, options, &pack_id),
                sha256: sha256_hex(&raw),
                pack_version: pack.pack_version.clone(),
                pack_schema_version: schema_version.clone(),
                pack_schema_sha256: options.schema_sha256.clone(),
                retrieved_at: pack.retrieved_at.clone(),
                jurisdiction: pack.jurisdiction.clone().or_else(|| pack.municipality.clone()),
                municipality: pack.municipality.clone(),
            },
        );
        packs.insert(
            pack_id,
            search_entry(&pack, schema_version, options, tokenizer),
        );
    }

    info!(packs = manifest.len(), "manifest built");

    Ok(ManifestBundle {
        manifest,
        search: SearchIndex {
            version: SEARCH_INDEX_VERSION,
            generated_at: Utc::now(),
            packs,
        },
    })
}

fn pack_url(store: &FsPackStore, options: &ManifestOptions, pack_id: &str) -> String {
    match &options.base_url {
        Some(base) => format!("{}/{pack_id}.json", base.as_str().trim_end_matches('/')),
        None => format!(
            "{}/{pack_id}/{PACK_FILE_NAME}",
            store.root().display().to_string().trim_end_matches('/')
        ),
    }
}

fn search_entry(
    pack: &Pack,
    schema_version: String,
    options: &ManifestOptions,
    tokenizer: &Tokenizer,
) -> SearchEntry {
    let mut items = BTreeMap::new();
    let mut index: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for item in &pack.items {
        items.insert(item.id.clone(), item.name.clone());

        let action_texts = item
            .option_cards
            .iter()
            .flat_map(|card| &card.actions)
            .filter_map(|action| action.text.as_deref());
        let tokens: BTreeSet<String> = tokenizer
            .tokenize(&item.name)
            .into_iter()
            .chain(tokenizer.tokenize_all(item.keywords.iter().map(String::as_str)))
            .chain(tokenizer.tokenize_all(action_texts))
            .collect();

        for token in tokens {
            index.entry(token).or_default().insert(item.id.clone());
        }
    }

    SearchEntry {
        pack_version: pack.pack_version.clone(),
        pack_schema_version: schema_version,
        pack_schema_sha256: options.schema_sha256.clone(),
        retrieved_at: pack.retrieved_at.clone(),
        items,
        index: index
            .into_iter()
            .map(|(token, ids)| (token, ids.into_iter().collect()))
            .collect(),
    }
}

/// Write `manifest.json` and `search.json` into `out_dir`.
pub fn write_manifest(bundle: &ManifestBundle, out_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(out_dir).map_err(|e| RepathError::io(out_dir, e))?;

    let manifest_path = out_dir.join("manifest.json");
    let search_path = out_dir.join("search.json");
    write_json(&manifest_path, &bundle.manifest)?;
    write_json(&search_path, &bundle.search)?;

    Ok((manifest_path, search_path))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value)
        .map_err(|e| RepathError::parse(format!("failed to serialize {}: {e}", path.display())))?;
    json.push('\n');
    std::fs::write(path, json).map_err(|e| RepathError::io(path, e))
}
