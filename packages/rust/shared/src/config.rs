//! Application configuration for repath.
//!
//! User config lives at `~/.repath/repath.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{RepathError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "repath.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".repath";

/// Setting this to `1` forces the naive token normalizer.
pub const DISABLE_STEMMER_ENV: &str = "REPATH_DISABLE_STEMMER";

/// Overrides `[packs] base_url`.
pub const PACK_BASE_URL_ENV: &str = "REPATH_PACK_BASE_URL";

// ---------------------------------------------------------------------------
// Config structs (matching repath.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Pack storage settings.
    #[serde(default)]
    pub packs: PacksConfig,

    /// Text normalization settings.
    #[serde(default)]
    pub text: TextConfig,

    /// Manifest/search-index output settings.
    #[serde(default)]
    pub manifest: ManifestConfig,
}

/// `[packs]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacksConfig {
    /// Directory holding `<pack_id>/pack.json` documents.
    #[serde(default = "default_packs_root")]
    pub root: String,

    /// Public URL prefix for published packs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for PacksConfig {
    fn default() -> Self {
        Self {
            root: default_packs_root(),
            base_url: None,
        }
    }
}

fn default_packs_root() -> String {
    "packages/packs".into()
}

/// Which token stemmer to layer on top of the naive normalizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemmerKind {
    /// Naive plural stripping only.
    None,
    /// English Snowball stemming, when compiled in.
    #[default]
    Snowball,
}

/// `[text]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextConfig {
    #[serde(default)]
    pub stemmer: StemmerKind,
}

impl TextConfig {
    /// The stemmer to use after applying the `REPATH_DISABLE_STEMMER` override.
    pub fn effective_stemmer(&self) -> StemmerKind {
        self.stemmer_with_override(std::env::var(DISABLE_STEMMER_ENV).ok().as_deref())
    }

    fn stemmer_with_override(&self, disable: Option<&str>) -> StemmerKind {
        if disable.is_some_and(|v| v.trim() == "1") {
            StemmerKind::None
        } else {
            self.stemmer
        }
    }
}

/// `[manifest]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestConfig {
    /// Directory `manifest.json` and `search.json` are written to.
    #[serde(default = "default_out_dir")]
    pub out_dir: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
        }
    }
}

fn default_out_dir() -> String {
    "dist".into()
}

impl AppConfig {
    /// Resolve the pack base URL, environment first, and check it parses.
    pub fn pack_base_url(&self) -> Result<Option<Url>> {
        self.base_url_with_override(std::env::var(PACK_BASE_URL_ENV).ok())
    }

    fn base_url_with_override(&self, env_value: Option<String>) -> Result<Option<Url>> {
        let raw = env_value
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.packs.base_url.clone());

        match raw {
            Some(raw) => {
                let trimmed = raw.trim().trim_end_matches('/');
                Url::parse(trimmed).map(Some).map_err(|e| {
                    RepathError::config(format!("invalid pack base URL '{trimmed}': {e}"))
                })
            }
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.repath/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| RepathError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.repath/repath.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RepathError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| RepathError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| RepathError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| RepathError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| RepathError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
