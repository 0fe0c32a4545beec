//! Shared types, error model, and configuration for repath.
//!
//! This crate is the foundation depended on by all other repath crates.
//! It provides:
//! - [`RepathError`], the unified error type
//! - Pack records ([`Pack`], [`Channel`], [`Location`], [`Rule`], [`Item`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DISABLE_STEMMER_ENV, ManifestConfig, PACK_BASE_URL_ENV, PacksConfig, StemmerKind,
    TextConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{RepathError, Result};
pub use types::{
    Action, Alias, CardAction, CardActionPayload, Channel, ChannelScope, Entity, Item,
    Jurisdiction, Location, OptionCard, Pack, Rule, RuleThen, RuleWhen, value_as_text,
};
